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
//! Tower layer placing the gateway in front of an HTTP service.
//!
//! Requests whose path matches a gateway route are answered by the gateway; every other
//! request goes to the inner service untouched.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use http::{Request, Response};
use tower::{Layer, Service};

use crate::gateway::Gateway;

/// Layer wrapping services with a [`GatewayService`]
#[derive(Clone, Debug)]
pub struct GatewayLayer {
    gateway: Arc<Gateway>,
}

impl GatewayLayer {
    /// Layer serving `gateway`
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }

    /// Gateway served by this layer
    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }
}

impl<S> Layer<S> for GatewayLayer {
    type Service = GatewayService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GatewayService {
            gateway: self.gateway.clone(),
            inner,
        }
    }
}

/// Service answering gateway routes and passing everything else to `inner`
#[derive(Clone, Debug)]
pub struct GatewayService<S> {
    gateway: Arc<Gateway>,
    inner: S,
}

impl<S> Service<Request<Body>> for GatewayService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let route = self.gateway.route(request.uri().path()).cloned();
        let Some(method) = route else {
            return Box::pin(self.inner.call(request));
        };
        let gateway = self.gateway.clone();
        Box::pin(async move { Ok(gateway.handle(&method, request).await) })
    }
}
