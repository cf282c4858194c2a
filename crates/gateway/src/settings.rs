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
//! Gateway-wide settings.

use std::fmt;
use std::sync::Arc;

use grpckit_client::GrpcCallInvoker;
use grpckit_common::{CallOptions, Channel};
use http::HeaderMap;
use tonic::Status;

use crate::error::GatewayError;
use crate::handlers::{ErrorHandler, ErrorResponse, StatusErrorHandler};
use crate::serializer::{JsonSerializer, SerdeJsonSerializer};

/// Default prefix marking HTTP headers forwarded as call metadata
pub const DEFAULT_HEADER_PREFIX: &str = "grpc.";

/// Maps an HTTP header name to a metadata key, or `None` to drop the header
pub type HeaderFilter = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Forward headers whose name starts with `prefix`, with the prefix removed
///
/// A header consisting of the prefix alone is dropped.
pub fn prefix_header_filter(prefix: impl Into<String>) -> HeaderFilter {
    let prefix = prefix.into().to_ascii_lowercase();
    Arc::new(move |name: &str| {
        let name = name.to_ascii_lowercase();
        match name.strip_prefix(prefix.as_str()) {
            Some(key) if !key.is_empty() => Some(key.to_string()),
            _ => None,
        }
    })
}

/// Invoker, serializer, header forwarding and error handlers shared by every gateway route
#[derive(Clone)]
pub struct GatewaySettings {
    invoker: Arc<GrpcCallInvoker>,
    host: Option<String>,
    header_filter: HeaderFilter,
    serializer: Arc<dyn JsonSerializer>,
    status_handler: Option<StatusErrorHandler>,
    error_handler: Option<ErrorHandler>,
}

impl fmt::Debug for GatewaySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewaySettings")
            .field("host", &self.host)
            .field("has_status_handler", &self.status_handler.is_some())
            .field("has_error_handler", &self.error_handler.is_some())
            .finish()
    }
}

impl GatewaySettings {
    /// Settings calling through `channel` with a default invoker
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self::with_invoker(Arc::new(GrpcCallInvoker::new(channel)))
    }

    /// Settings calling through a configured invoker
    pub fn with_invoker(invoker: Arc<GrpcCallInvoker>) -> Self {
        Self {
            invoker,
            host: None,
            header_filter: prefix_header_filter(DEFAULT_HEADER_PREFIX),
            serializer: Arc::new(SerdeJsonSerializer::new()),
            status_handler: None,
            error_handler: None,
        }
    }

    /// Target host passed with every call
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Replace the header filter
    pub fn with_header_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.header_filter = Arc::new(filter);
        self
    }

    /// Forward headers starting with `prefix` instead of `grpc.`
    pub fn with_header_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.header_filter = prefix_header_filter(prefix);
        self
    }

    /// Default serializer for routes without their own
    pub fn with_serializer(mut self, serializer: Arc<dyn JsonSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// Status handler used when the route's handler passes
    pub fn with_status_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Status) -> Option<ErrorResponse> + Send + Sync + 'static,
    {
        self.status_handler = Some(Arc::new(handler));
        self
    }

    /// General error handler used when the route's handler passes
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&GatewayError) -> Option<ErrorResponse> + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Invoker used for every call
    pub fn invoker(&self) -> &Arc<GrpcCallInvoker> {
        &self.invoker
    }

    /// Target host
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Default serializer
    pub fn serializer(&self) -> &Arc<dyn JsonSerializer> {
        &self.serializer
    }

    pub(crate) fn status_handler(&self) -> Option<&StatusErrorHandler> {
        self.status_handler.as_ref()
    }

    pub(crate) fn error_handler(&self) -> Option<&ErrorHandler> {
        self.error_handler.as_ref()
    }

    /// Call options carrying the forwarded headers
    ///
    /// Only the first value of a repeated header is forwarded; values that are not visible
    /// ASCII are skipped.
    pub fn call_options(&self, headers: &HeaderMap) -> CallOptions {
        let mut options = CallOptions::new();
        for name in headers.keys() {
            let Some(key) = (self.header_filter)(name.as_str()) else {
                continue;
            };
            if let Some(value) = headers.get(name).and_then(|value| value.to_str().ok()) {
                options = options.with_header(&key, value);
            }
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grpckit_common::LocalChannel;
    use http::HeaderValue;

    fn settings() -> GatewaySettings {
        GatewaySettings::new(Arc::new(LocalChannel::new()))
    }

    #[test]
    fn test_default_filter_strips_prefix() {
        let filter = prefix_header_filter(DEFAULT_HEADER_PREFIX);
        assert_eq!(filter("grpc.callcounter").as_deref(), Some("callcounter"));
        assert_eq!(filter("GRPC.Trace").as_deref(), Some("trace"));
        assert_eq!(filter("grpc."), None);
        assert_eq!(filter("content-type"), None);
    }

    #[test]
    fn test_forwards_first_value_only() {
        let mut headers = HeaderMap::new();
        headers.append("grpc.callcounter", HeaderValue::from_static("1"));
        headers.append("grpc.callcounter", HeaderValue::from_static("2"));
        headers.insert("accept", HeaderValue::from_static("application/json"));

        let options = settings().call_options(&headers);
        assert_eq!(options.headers().get_all("callcounter").count(), 1);
        assert_eq!(options.headers().get_str("callcounter"), Some("1"));
        assert_eq!(options.headers().len(), 1);
    }

    #[test]
    fn test_custom_filter() {
        let settings = settings().with_header_filter(|name| (name == "x-user").then(|| "user".to_string()));
        let mut headers = HeaderMap::new();
        headers.insert("x-user", HeaderValue::from_static("alice"));
        headers.insert("grpc.trace", HeaderValue::from_static("t"));

        let options = settings.call_options(&headers);
        assert_eq!(options.headers().get_str("user"), Some("alice"));
        assert_eq!(options.headers().get_str("trace"), None);
    }
}
