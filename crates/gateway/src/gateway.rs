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
//! # JSON Gateway
//!
//! ## Purpose
//! Translates an HTTP request with a JSON body into an RPC call and the outcome back into a
//! JSON response.
//!
//! ## Request Flow
//! 1. Forward headers accepted by the header filter as call metadata
//! 2. Read the body as UTF-8 text and parse it with the route's serializer (or the gateway's)
//! 3. Dispatch by call shape and render the response, `200 OK` with `application/json`
//! 4. On failure walk the handler cascade described in [`crate::handlers`]

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request, Response, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::GatewayError;
use crate::handlers::ErrorResponse;
use crate::layer::GatewayLayer;
use crate::method::GatewayMethod;
use crate::serializer::JsonSerializer;
use crate::settings::GatewaySettings;

/// Routes keyed by HTTP path plus the shared settings
#[derive(Debug)]
pub struct Gateway {
    routes: HashMap<String, Arc<GatewayMethod>>,
    settings: GatewaySettings,
}

impl Gateway {
    /// Gateway without routes
    pub fn new(settings: GatewaySettings) -> Self {
        Self {
            routes: HashMap::new(),
            settings,
        }
    }

    /// Expose a method; a later method with the same path replaces the earlier one
    pub fn with_method(mut self, method: GatewayMethod) -> Self {
        let path = method.path().to_string();
        if self.routes.insert(path.clone(), Arc::new(method)).is_some() {
            warn!(path = %path, "Gateway route replaced");
        }
        self
    }

    /// Expose several methods
    pub fn with_methods(self, methods: impl IntoIterator<Item = GatewayMethod>) -> Self {
        methods.into_iter().fold(self, Gateway::with_method)
    }

    /// Shared settings
    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Route for an HTTP path
    pub fn route(&self, path: &str) -> Option<&Arc<GatewayMethod>> {
        self.routes.get(path)
    }

    /// Number of routes
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True when no method is exposed
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Tower layer serving this gateway in front of another service
    pub fn into_layer(self) -> GatewayLayer {
        GatewayLayer::new(self)
    }

    /// Serve one request routed to `method`
    ///
    /// Never fails: every failure becomes an HTTP response.
    pub async fn handle(&self, method: &GatewayMethod, request: Request<Body>) -> Response<Body> {
        let serializer = method
            .serializer()
            .unwrap_or(self.settings.serializer())
            .clone();
        match self.forward(method, serializer.as_ref(), request).await {
            Ok(text) => json_response(StatusCode::OK, text),
            Err(error) => self.respond_to_error(method, serializer.as_ref(), error),
        }
    }

    async fn forward(
        &self,
        method: &GatewayMethod,
        serializer: &dyn JsonSerializer,
        request: Request<Body>,
    ) -> Result<String, GatewayError> {
        let (parts, body) = request.into_parts();
        let options = self.settings.call_options(&parts.headers);

        let bytes = body
            .collect()
            .await
            .map_err(|e| GatewayError::Body(e.to_string()))?
            .to_bytes();
        let text = std::str::from_utf8(&bytes).map_err(|e| GatewayError::Body(e.to_string()))?;
        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            serializer
                .parse(text)
                .map_err(|source| GatewayError::Deserialize {
                    type_name: method.info().request_type().to_string(),
                    source,
                })?
        };

        debug!(
            path = %parts.uri.path(),
            method = %method.info().full_name(),
            method_type = %method.method_type(),
            forwarded_headers = options.headers().len(),
            "Forwarding HTTP request"
        );
        let response = method
            .invoke(
                self.settings.invoker().clone(),
                value,
                options,
                self.settings.host().map(str::to_string),
            )
            .await?;

        serializer
            .render(&response)
            .map_err(|source| GatewayError::Serialize {
                type_name: method.info().response_type().to_string(),
                source,
            })
    }

    fn respond_to_error(
        &self,
        method: &GatewayMethod,
        serializer: &dyn JsonSerializer,
        error: GatewayError,
    ) -> Response<Body> {
        let claimed = error
            .actual_status()
            .and_then(|status| {
                method
                    .status_handler()
                    .and_then(|handler| handler(status))
                    .or_else(|| self.settings.status_handler().and_then(|handler| handler(status)))
            })
            .or_else(|| {
                method
                    .error_handler()
                    .and_then(|handler| handler(&error))
                    .or_else(|| self.settings.error_handler().and_then(|handler| handler(&error)))
            });

        match claimed {
            Some(response) => {
                debug!(method = %method.info().full_name(), error = %error, "Gateway error handled");
                render_error(serializer, response)
            }
            None => {
                error!(method = %method.info().full_name(), error = %error, "Unhandled gateway error");
                empty_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

fn render_error(serializer: &dyn JsonSerializer, response: ErrorResponse) -> Response<Body> {
    let status = response.status.unwrap_or(StatusCode::OK);
    match response.body {
        None => empty_response(status),
        Some(body) => match serializer.render(&body) {
            Ok(text) => json_response(status, text),
            Err(e) => {
                error!(error = %e, "Failed to render error body");
                empty_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        },
    }
}

fn json_response(status: StatusCode, text: String) -> Response<Body> {
    let mut response = Response::new(Body::from(text));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn empty_response(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}
