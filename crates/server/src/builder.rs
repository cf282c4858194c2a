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
//! # Service Builder
//!
//! ## Purpose
//! Turns a service implementation into a [`ServiceDefinition`] whose handlers run the
//! instrumented pipeline of [`crate::handler`].
//!
//! ## Registration
//! A service lists its methods explicitly through [`GrpcService::methods`]. Each
//! [`ServiceMethod`] pairs a typed [`Method`] descriptor with a handler closure; the closure
//! shape determines the [`MethodSignature`] that is classified before the method is accepted.
//!
//! ## Skipped Methods
//! - methods marked ignored
//! - methods whose signature matches no call shape
//! - methods whose classified shape differs from the descriptor's shape
//! - a second method with the same name (the first one wins)
//!
//! ## Example
//! ```rust,ignore
//! impl GrpcService for Calculator {
//!     fn methods() -> Vec<ServiceMethod<Self>> {
//!         vec![ServiceMethod::unary(double_method(), |svc, value, _ctx| async move {
//!             svc.double(value)
//!         })]
//!     }
//! }
//!
//! let definition = GrpcServiceBuilder::new(settings).build(Calculator::default());
//! ```

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use grpckit_common::method::short_type_name;
use grpckit_common::{
    GrpcError, Method, MethodInfo, ServerCallContext, ServerCallHandler, ServerMethodDefinition,
    ServiceDefinition,
};
use tracing::{debug, info, warn};

use crate::handler::{
    client_streaming_handler, duplex_streaming_handler, server_streaming_handler, unary_handler,
    ClientStreamingBody, DuplexStreamingBody, MethodPipeline, ServerStreamingBody, UnaryBody,
};
use crate::reflection::{classify, MethodSignature};
use crate::settings::{GrpcServiceBuilderSettings, MethodOptions, ServiceOptions};
use crate::stream::{ServerRequestStream, ServerResponseStream};

/// A service implementation exposing its methods for registration
pub trait GrpcService: Send + Sync + 'static {
    /// Service name reported in logs; defaults to the type name
    fn service_name(&self) -> &str {
        short_type_name::<Self>()
    }

    /// Service-level interceptors and performance flag
    fn options(&self) -> ServiceOptions {
        ServiceOptions::default()
    }

    /// Methods of the service in declaration order
    fn methods() -> Vec<ServiceMethod<Self>>
    where
        Self: Sized;
}

type HandlerFactory<S> = Box<dyn FnOnce(Arc<S>, Arc<MethodPipeline>) -> ServerCallHandler + Send>;

/// One method of a service: descriptor, handler signature, options and handler
pub struct ServiceMethod<S> {
    info: Arc<MethodInfo>,
    signature: MethodSignature,
    options: MethodOptions,
    factory: HandlerFactory<S>,
}

impl<S> fmt::Debug for ServiceMethod<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceMethod")
            .field("method", &self.info.full_name())
            .field("signature", &self.signature)
            .field("options", &self.options)
            .finish()
    }
}

impl<S> ServiceMethod<S>
where
    S: Send + Sync + 'static,
{
    /// `(Req, context) -> Resp`
    pub fn unary<Req, Resp, F, Fut>(method: Method<Req, Resp>, body: F) -> Self
    where
        Req: Send + 'static,
        Resp: Send + 'static,
        F: Fn(Arc<S>, Req, ServerCallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, GrpcError>> + Send + 'static,
    {
        let body: UnaryBody<S, Req, Resp> =
            Arc::new(move |service: Arc<S>, request: Req, context: ServerCallContext| {
                body(service, request, context).boxed()
            });
        Self::from_parts(
            method.info().clone(),
            MethodSignature::unary::<Req, Resp>(),
            Box::new(move |service: Arc<S>, pipeline: Arc<MethodPipeline>| {
                let codec = pipeline.codec(&method);
                unary_handler(service, codec, pipeline, body)
            }),
        )
    }

    /// `(stream of Req, context) -> Resp`
    pub fn client_streaming<Req, Resp, F, Fut>(method: Method<Req, Resp>, body: F) -> Self
    where
        Req: Send + 'static,
        Resp: Send + 'static,
        F: Fn(Arc<S>, ServerRequestStream<Req>, ServerCallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, GrpcError>> + Send + 'static,
    {
        let body: ClientStreamingBody<S, Req, Resp> =
            Arc::new(
                move |service: Arc<S>, requests: ServerRequestStream<Req>, context: ServerCallContext| {
                    body(service, requests, context).boxed()
                },
            );
        Self::from_parts(
            method.info().clone(),
            MethodSignature::client_streaming::<Req, Resp>(),
            Box::new(move |service: Arc<S>, pipeline: Arc<MethodPipeline>| {
                let codec = pipeline.codec(&method);
                client_streaming_handler(service, codec, pipeline, body)
            }),
        )
    }

    /// `(Req, writer of Resp, context) -> ()`
    pub fn server_streaming<Req, Resp, F, Fut>(method: Method<Req, Resp>, body: F) -> Self
    where
        Req: Send + 'static,
        Resp: Send + 'static,
        F: Fn(Arc<S>, Req, ServerResponseStream<Resp>, ServerCallContext) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = Result<(), GrpcError>> + Send + 'static,
    {
        let body: ServerStreamingBody<S, Req, Resp> =
            Arc::new(
                move |service: Arc<S>,
                      request: Req,
                      responses: ServerResponseStream<Resp>,
                      context: ServerCallContext| {
                    body(service, request, responses, context).boxed()
                },
            );
        Self::from_parts(
            method.info().clone(),
            MethodSignature::server_streaming::<Req, Resp>(),
            Box::new(move |service: Arc<S>, pipeline: Arc<MethodPipeline>| {
                let codec = pipeline.codec(&method);
                server_streaming_handler(service, codec, pipeline, body)
            }),
        )
    }

    /// `(stream of Req, writer of Resp, context) -> ()`
    pub fn duplex_streaming<Req, Resp, F, Fut>(method: Method<Req, Resp>, body: F) -> Self
    where
        Req: Send + 'static,
        Resp: Send + 'static,
        F: Fn(Arc<S>, ServerRequestStream<Req>, ServerResponseStream<Resp>, ServerCallContext) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = Result<(), GrpcError>> + Send + 'static,
    {
        let body: DuplexStreamingBody<S, Req, Resp> =
            Arc::new(
                move |service: Arc<S>,
                      requests: ServerRequestStream<Req>,
                      responses: ServerResponseStream<Resp>,
                      context: ServerCallContext| {
                    body(service, requests, responses, context).boxed()
                },
            );
        Self::from_parts(
            method.info().clone(),
            MethodSignature::duplex_streaming::<Req, Resp>(),
            Box::new(move |service: Arc<S>, pipeline: Arc<MethodPipeline>| {
                let codec = pipeline.codec(&method);
                duplex_streaming_handler(service, codec, pipeline, body)
            }),
        )
    }

    fn from_parts(info: Arc<MethodInfo>, signature: MethodSignature, factory: HandlerFactory<S>) -> Self {
        Self {
            info,
            signature,
            options: MethodOptions::default(),
            factory,
        }
    }
}

impl<S> ServiceMethod<S> {
    /// Replace the method-level options
    pub fn with_options(mut self, options: MethodOptions) -> Self {
        self.options = options;
        self
    }

    /// Exclude the method from the built service
    pub fn ignored(mut self) -> Self {
        self.options.ignore = true;
        self
    }

    /// Override the signature used for classification
    pub fn with_signature(mut self, signature: MethodSignature) -> Self {
        self.signature = signature;
        self
    }

    /// Method identity
    pub fn info(&self) -> &Arc<MethodInfo> {
        &self.info
    }

    /// Handler signature
    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    /// Method-level options
    pub fn options(&self) -> &MethodOptions {
        &self.options
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Builds instrumented service definitions
#[derive(Debug, Clone, Default)]
pub struct GrpcServiceBuilder {
    settings: GrpcServiceBuilderSettings,
}

impl GrpcServiceBuilder {
    /// Builder applying the given global settings
    pub fn new(settings: GrpcServiceBuilderSettings) -> Self {
        Self { settings }
    }

    /// Global settings
    pub fn settings(&self) -> &GrpcServiceBuilderSettings {
        &self.settings
    }

    /// Build a service definition owning the implementation
    pub fn build<S: GrpcService>(&self, service: S) -> ServiceDefinition {
        self.build_shared(Arc::new(service))
    }

    /// Build a service definition sharing the implementation
    pub fn build_shared<S: GrpcService>(&self, service: Arc<S>) -> ServiceDefinition {
        let options = service.options();
        let mut definition = ServiceDefinition::new(service.service_name());
        let mut names = HashSet::new();

        for method in S::methods() {
            let full_name = method.info.full_name().to_string();
            if method.options.ignore {
                debug!(method = %full_name, "Skipping ignored method");
                continue;
            }
            let Some(classified) = classify(&method.signature) else {
                debug!(method = %full_name, "Skipping method matching no call shape");
                continue;
            };
            if classified.method_type != method.info.method_type() {
                warn!(
                    method = %full_name,
                    declared = %method.info.method_type(),
                    handler = %classified.method_type,
                    "Skipping method whose handler does not match its call shape"
                );
                continue;
            }
            if !names.insert(method.info.name().to_string()) {
                debug!(method = %full_name, "Skipping duplicate method name");
                continue;
            }

            let pipeline = Arc::new(MethodPipeline::new(
                method.info.clone(),
                &self.settings,
                &options,
                &method.options,
            ));
            let handler = (method.factory)(service.clone(), pipeline);
            definition.add_method(ServerMethodDefinition {
                info: method.info,
                handler,
            });
        }

        info!(
            service = definition.service_name(),
            methods = definition.len(),
            "Service built"
        );
        definition
    }
}
