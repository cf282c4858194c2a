// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of GrpcKit.
//
// GrpcKit is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// GrpcKit is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with GrpcKit. If not, see <https://www.gnu.org/licenses/>.
//! Methods exposed through the gateway.
//!
//! A [`GatewayMethod`] erases the payload types of a [`Method`] behind a JSON dispatch
//! function, so the gateway can route by path without knowing the message types.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use grpckit_client::GrpcCallInvoker;
use grpckit_common::method::short_type_name;
use grpckit_common::{CallOptions, Method, MethodInfo, MethodType};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tonic::Status;

use crate::error::GatewayError;
use crate::handlers::{ErrorHandler, ErrorResponse, StatusErrorHandler};
use crate::serializer::JsonSerializer;

type Dispatch = Arc<
    dyn Fn(Arc<GrpcCallInvoker>, Value, CallOptions, Option<String>) -> BoxFuture<'static, Result<Value, GatewayError>>
        + Send
        + Sync,
>;

/// One RPC method reachable over HTTP
#[derive(Clone)]
pub struct GatewayMethod {
    info: Arc<MethodInfo>,
    path: String,
    dispatch: Dispatch,
    serializer: Option<Arc<dyn JsonSerializer>>,
    status_handler: Option<StatusErrorHandler>,
    error_handler: Option<ErrorHandler>,
}

impl fmt::Debug for GatewayMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayMethod")
            .field("path", &self.path)
            .field("method_type", &self.info.method_type())
            .field("has_serializer", &self.serializer.is_some())
            .field("has_status_handler", &self.status_handler.is_some())
            .field("has_error_handler", &self.error_handler.is_some())
            .finish()
    }
}

impl GatewayMethod {
    /// Expose `method` at its full name (`/Service/Method`)
    ///
    /// Request-streaming methods take a JSON array body; response-streaming methods answer
    /// with a JSON array.
    pub fn new<Req, Resp>(method: Method<Req, Resp>) -> Self
    where
        Req: DeserializeOwned + Send + Sync + 'static,
        Resp: Serialize + Send + Sync + 'static,
    {
        let info = method.info().clone();
        let path = info.full_name().to_string();
        let method = Arc::new(method);
        let dispatch: Dispatch = Arc::new(
            move |invoker: Arc<GrpcCallInvoker>, body: Value, options: CallOptions, host: Option<String>| {
                let method = method.clone();
                async move { call_method(&invoker, &method, body, options, host.as_deref()).await }.boxed()
            },
        );
        Self {
            info,
            path,
            dispatch,
            serializer: None,
            status_handler: None,
            error_handler: None,
        }
    }

    /// Serve at a custom HTTP path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Serializer used instead of the gateway's
    pub fn with_serializer(mut self, serializer: Arc<dyn JsonSerializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    /// Status handler consulted before the gateway's
    pub fn with_status_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Status) -> Option<ErrorResponse> + Send + Sync + 'static,
    {
        self.status_handler = Some(Arc::new(handler));
        self
    }

    /// General error handler consulted before the gateway's
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&GatewayError) -> Option<ErrorResponse> + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Method descriptor
    pub fn info(&self) -> &Arc<MethodInfo> {
        &self.info
    }

    /// HTTP path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Call shape
    pub fn method_type(&self) -> MethodType {
        self.info.method_type()
    }

    pub(crate) fn serializer(&self) -> Option<&Arc<dyn JsonSerializer>> {
        self.serializer.as_ref()
    }

    pub(crate) fn status_handler(&self) -> Option<&StatusErrorHandler> {
        self.status_handler.as_ref()
    }

    pub(crate) fn error_handler(&self) -> Option<&ErrorHandler> {
        self.error_handler.as_ref()
    }

    pub(crate) async fn invoke(
        &self,
        invoker: Arc<GrpcCallInvoker>,
        body: Value,
        options: CallOptions,
        host: Option<String>,
    ) -> Result<Value, GatewayError> {
        (self.dispatch)(invoker, body, options, host).await
    }
}

async fn call_method<Req, Resp>(
    invoker: &GrpcCallInvoker,
    method: &Method<Req, Resp>,
    body: Value,
    options: CallOptions,
    host: Option<&str>,
) -> Result<Value, GatewayError>
where
    Req: DeserializeOwned + Send + Sync + 'static,
    Resp: Serialize + Send + Sync + 'static,
{
    match method.method_type() {
        MethodType::Unary => {
            let request: Req = from_json(body)?;
            let response = invoker.unary_call(method, host, options, &request).await?;
            to_json(&response)
        }
        MethodType::ClientStreaming => {
            let requests = requests_from_json::<Req>(body)?;
            let mut call = invoker.client_streaming(method, host, options).await?;
            let response = call.write_all_and_complete(requests).await.into_result()?;
            to_json(&response)
        }
        MethodType::ServerStreaming => {
            let request: Req = from_json(body)?;
            let mut call = invoker.server_streaming(method, host, options, &request).await?;
            let responses = call.read_all().await.into_result()?;
            to_json(&responses)
        }
        MethodType::DuplexStreaming => {
            let requests = requests_from_json::<Req>(body)?;
            let mut call = invoker.duplex_streaming(method, host, options).await?;
            let responses = call.write_read_all(requests).await.into_result()?;
            to_json(&responses)
        }
    }
}

fn from_json<T: DeserializeOwned>(body: Value) -> Result<T, GatewayError> {
    serde_json::from_value(body).map_err(|source| GatewayError::Deserialize {
        type_name: short_type_name::<T>().to_string(),
        source,
    })
}

/// A request stream arrives as a JSON array; `null` or an empty body means no requests
fn requests_from_json<T: DeserializeOwned>(body: Value) -> Result<Vec<T>, GatewayError> {
    let requests: Option<Vec<T>> = from_json(body)?;
    Ok(requests.unwrap_or_default())
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Value, GatewayError> {
    serde_json::to_value(value).map_err(|source| GatewayError::Serialize {
        type_name: short_type_name::<T>().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use grpckit_common::Marshaller;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Query {
        name: String,
    }

    fn method(method_type: MethodType) -> Method<Query, Query> {
        Method::new(method_type, "Teams", "Search", Marshaller::json(), Marshaller::json())
    }

    #[test]
    fn test_default_path_is_full_name() {
        let exposed = GatewayMethod::new(method(MethodType::Unary));
        assert_eq!(exposed.path(), "/Teams/Search");
        assert_eq!(exposed.with_path("/api/teams").path(), "/api/teams");
    }

    #[test]
    fn test_request_stream_from_array_or_null() {
        let requests: Vec<Query> = requests_from_json(json!([{"name": "a"}, {"name": "b"}])).unwrap();
        assert_eq!(requests.len(), 2);
        let empty: Vec<Query> = requests_from_json(Value::Null).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_single_object_is_not_a_request_stream() {
        let error = requests_from_json::<Query>(json!({"name": "a"})).unwrap_err();
        assert!(matches!(error, GatewayError::Deserialize { .. }));
    }

    #[test]
    fn test_wrong_shape_names_the_type() {
        let error = from_json::<Query>(json!({"nome": 1})).unwrap_err();
        assert!(error.to_string().contains("Query"), "{}", error);
    }
}
