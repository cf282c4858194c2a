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
//! # Server Method Pipeline
//!
//! ## Purpose
//! Wraps one service method into a raw [`ServerCallHandler`] that runs, in order:
//! 1. Before-invoke interceptors (global, service and method scopes merged by priority)
//! 2. `MethodCalling` event
//! 3. The method body, with typed stream proxies; failures are wrapped as
//!    [`GrpcError::MethodInvocation`] and `MethodCalled` is reported either way
//! 4. After-invoke interceptors
//!
//! ## Failure Path
//! Any failure in steps 1-4 goes to the exception handlers in priority order; the first
//! replacement wins. The resulting error is converted to a status (`Internal` with the error
//! message unless it carries a status), reported to the exception observers and returned to
//! the transport.
//!
//! Payload decoding and encoding happen outside the pipeline; serializer failures are
//! reported by the codec and surface as `Internal`.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use grpckit_common::telemetry::panic_message;
use grpckit_common::{
    merge_sorted, CallSide, ExceptionNotifier, GrpcError, InterceptorError, Method, MethodCodec,
    MethodInfo, PerformanceEventKind, PerformanceNotifier, RawRequestStream, RawResponseSender,
    ServerCallContext, ServerCallHandler,
};
use tonic::Status;
use tracing::{debug, warn};

use crate::interceptor::{
    ServerMethodExceptionHandler, ServerMethodInvokedInterceptor, ServerMethodInvokingInterceptor,
};
use crate::settings::{performance_enabled, GrpcServiceBuilderSettings, MethodOptions, ServiceOptions};
use crate::stream::{CallTracker, ServerRequestStream, ServerResponseStream};

// ============================================================================
// PIPELINE
// ============================================================================

/// Interceptors and observers resolved for one method
pub(crate) struct MethodPipeline {
    info: Arc<MethodInfo>,
    invoking: Vec<Arc<dyn ServerMethodInvokingInterceptor>>,
    invoked: Vec<Arc<dyn ServerMethodInvokedInterceptor>>,
    exception_handlers: Vec<Arc<dyn ServerMethodExceptionHandler>>,
    performance: PerformanceNotifier,
    exceptions: ExceptionNotifier,
}

impl MethodPipeline {
    /// Merge the three scopes; performance observers are dropped when the method has
    /// performance notification disabled
    pub(crate) fn new(
        info: Arc<MethodInfo>,
        settings: &GrpcServiceBuilderSettings,
        service: &ServiceOptions,
        method: &MethodOptions,
    ) -> Self {
        let global = &settings.interceptors;
        let performance = if performance_enabled(service, method) {
            settings.performance.clone()
        } else {
            PerformanceNotifier::new()
        };
        Self {
            info,
            invoking: merge_sorted(&[
                global.invoking.as_slice(),
                service.interceptors.invoking.as_slice(),
                method.interceptors.invoking.as_slice(),
            ]),
            invoked: merge_sorted(&[
                global.invoked.as_slice(),
                service.interceptors.invoked.as_slice(),
                method.interceptors.invoked.as_slice(),
            ]),
            exception_handlers: merge_sorted(&[
                global.exception_handlers.as_slice(),
                service.interceptors.exception_handlers.as_slice(),
                method.interceptors.exception_handlers.as_slice(),
            ]),
            performance,
            exceptions: settings.exceptions.clone(),
        }
    }

    /// Instrumented codecs sharing the pipeline's observers
    pub(crate) fn codec<Req, Resp>(&self, method: &Method<Req, Resp>) -> MethodCodec<Req, Resp> {
        MethodCodec::new(
            method,
            CallSide::Server,
            self.performance.clone(),
            self.exceptions.clone(),
        )
    }

    pub(crate) fn tracker(&self, context: &ServerCallContext) -> CallTracker {
        CallTracker::new(
            self.info.clone(),
            context.host().map(str::to_string),
            self.performance.clone(),
        )
    }

    /// Run the method body through the pipeline
    pub(crate) async fn run<T, F, Fut>(
        &self,
        context: &ServerCallContext,
        invoke: F,
    ) -> Result<T, Status>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, GrpcError>>,
    {
        let tracker = self.tracker(context);
        match self.execute(context, &tracker, invoke).await {
            Ok(value) => Ok(value),
            Err(error) => Err(self.fail(context, &tracker, error)),
        }
    }

    async fn execute<T, F, Fut>(
        &self,
        context: &ServerCallContext,
        tracker: &CallTracker,
        invoke: F,
    ) -> Result<T, GrpcError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, GrpcError>>,
    {
        for interceptor in &self.invoking {
            let started = Instant::now();
            let result = interceptor.on_invoking(context).await;
            tracker.intercepted(interceptor.name(), started.elapsed());
            result.map_err(|source| self.interceptor_failure(interceptor.name(), source))?;
        }

        tracker.notify(PerformanceEventKind::MethodCalling, None);
        let started = Instant::now();
        let outcome = AssertUnwindSafe(invoke()).catch_unwind().await;
        tracker.notify(PerformanceEventKind::MethodCalled, Some(started.elapsed()));
        let value = match outcome {
            Ok(Ok(value)) => value,
            Ok(Err(error)) => return Err(self.invocation_failure(error)),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(method = %self.info.full_name(), "Server method panicked: {}", message);
                return Err(self.invocation_failure(GrpcError::application(format!(
                    "method panicked: {}",
                    message
                ))));
            }
        };

        for interceptor in &self.invoked {
            let started = Instant::now();
            let result = interceptor.on_invoked(context).await;
            tracker.intercepted(interceptor.name(), started.elapsed());
            result.map_err(|source| self.interceptor_failure(interceptor.name(), source))?;
        }
        Ok(value)
    }

    /// Exception handlers, status conversion and exception notification
    fn fail(&self, context: &ServerCallContext, tracker: &CallTracker, error: GrpcError) -> Status {
        let error = self.replace_exception(context, tracker, error);
        debug!(
            method = %self.info.full_name(),
            peer = context.peer(),
            error = %error,
            "Server method failed"
        );
        let status = error.into_status();
        self.exceptions
            .notify_server(context, &GrpcError::Status(status.clone()));
        status
    }

    fn replace_exception(
        &self,
        context: &ServerCallContext,
        tracker: &CallTracker,
        error: GrpcError,
    ) -> GrpcError {
        for handler in &self.exception_handlers {
            let started = Instant::now();
            let outcome = catch_unwind(AssertUnwindSafe(|| handler.replace_exception(context, &error)));
            tracker.intercepted(handler.name(), started.elapsed());
            match outcome {
                Ok(Some(replacement)) => {
                    debug!(
                        method = %self.info.full_name(),
                        interceptor = handler.name(),
                        "Exception replaced by handler"
                    );
                    return replacement;
                }
                Ok(None) => {}
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    warn!(
                        method = %self.info.full_name(),
                        interceptor = handler.name(),
                        "Exception handler panicked: {}",
                        message
                    );
                    return self.invocation_failure(
                        self.interceptor_failure(handler.name(), InterceptorError::Panicked(message)),
                    );
                }
            }
        }
        error
    }

    fn interceptor_failure(&self, interceptor: &str, source: InterceptorError) -> GrpcError {
        GrpcError::Interceptor {
            method: self.info.full_name().to_string(),
            interceptor: interceptor.to_string(),
            source,
        }
    }

    fn invocation_failure(&self, error: GrpcError) -> GrpcError {
        GrpcError::MethodInvocation {
            method: self.info.full_name().to_string(),
            source: Box::new(error),
        }
    }
}

// ============================================================================
// RAW HANDLERS
// ============================================================================

/// Unary method body
pub(crate) type UnaryBody<S, Req, Resp> = Arc<
    dyn Fn(Arc<S>, Req, ServerCallContext) -> BoxFuture<'static, Result<Resp, GrpcError>>
        + Send
        + Sync,
>;

/// Client-streaming method body
pub(crate) type ClientStreamingBody<S, Req, Resp> = Arc<
    dyn Fn(
            Arc<S>,
            ServerRequestStream<Req>,
            ServerCallContext,
        ) -> BoxFuture<'static, Result<Resp, GrpcError>>
        + Send
        + Sync,
>;

/// Server-streaming method body
pub(crate) type ServerStreamingBody<S, Req, Resp> = Arc<
    dyn Fn(
            Arc<S>,
            Req,
            ServerResponseStream<Resp>,
            ServerCallContext,
        ) -> BoxFuture<'static, Result<(), GrpcError>>
        + Send
        + Sync,
>;

/// Duplex-streaming method body
pub(crate) type DuplexStreamingBody<S, Req, Resp> = Arc<
    dyn Fn(
            Arc<S>,
            ServerRequestStream<Req>,
            ServerResponseStream<Resp>,
            ServerCallContext,
        ) -> BoxFuture<'static, Result<(), GrpcError>>
        + Send
        + Sync,
>;

pub(crate) fn unary_handler<S, Req, Resp>(
    service: Arc<S>,
    codec: MethodCodec<Req, Resp>,
    pipeline: Arc<MethodPipeline>,
    body: UnaryBody<S, Req, Resp>,
) -> ServerCallHandler
where
    S: Send + Sync + 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    ServerCallHandler::Unary(Arc::new(move |bytes: Bytes, context: ServerCallContext| {
        let service = service.clone();
        let codec = codec.clone();
        let pipeline = pipeline.clone();
        let body = body.clone();
        async move {
            let request = codec
                .request
                .decode(&bytes, context.host())
                .map_err(GrpcError::into_status)?;
            let response = pipeline
                .run(&context, || body(service, request, context.clone()))
                .await?;
            codec
                .response
                .encode(&response, context.host())
                .map_err(GrpcError::into_status)
        }
        .boxed()
    }))
}

pub(crate) fn client_streaming_handler<S, Req, Resp>(
    service: Arc<S>,
    codec: MethodCodec<Req, Resp>,
    pipeline: Arc<MethodPipeline>,
    body: ClientStreamingBody<S, Req, Resp>,
) -> ServerCallHandler
where
    S: Send + Sync + 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    ServerCallHandler::ClientStreaming(Arc::new(
        move |requests: RawRequestStream, context: ServerCallContext| {
            let service = service.clone();
            let codec = codec.clone();
            let pipeline = pipeline.clone();
            let body = body.clone();
            async move {
                let reader =
                    ServerRequestStream::new(requests, codec.request.clone(), pipeline.tracker(&context));
                let response = pipeline
                    .run(&context, || body(service, reader, context.clone()))
                    .await?;
                codec
                    .response
                    .encode(&response, context.host())
                    .map_err(GrpcError::into_status)
            }
            .boxed()
        },
    ))
}

pub(crate) fn server_streaming_handler<S, Req, Resp>(
    service: Arc<S>,
    codec: MethodCodec<Req, Resp>,
    pipeline: Arc<MethodPipeline>,
    body: ServerStreamingBody<S, Req, Resp>,
) -> ServerCallHandler
where
    S: Send + Sync + 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    ServerCallHandler::ServerStreaming(Arc::new(
        move |bytes: Bytes, sender: RawResponseSender, context: ServerCallContext| {
            let service = service.clone();
            let codec = codec.clone();
            let pipeline = pipeline.clone();
            let body = body.clone();
            async move {
                let request = codec
                    .request
                    .decode(&bytes, context.host())
                    .map_err(GrpcError::into_status)?;
                let writer =
                    ServerResponseStream::new(sender, codec.response.clone(), pipeline.tracker(&context));
                pipeline
                    .run(&context, || body(service, request, writer, context.clone()))
                    .await
            }
            .boxed()
        },
    ))
}

pub(crate) fn duplex_streaming_handler<S, Req, Resp>(
    service: Arc<S>,
    codec: MethodCodec<Req, Resp>,
    pipeline: Arc<MethodPipeline>,
    body: DuplexStreamingBody<S, Req, Resp>,
) -> ServerCallHandler
where
    S: Send + Sync + 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    ServerCallHandler::DuplexStreaming(Arc::new(
        move |requests: RawRequestStream, sender: RawResponseSender, context: ServerCallContext| {
            let service = service.clone();
            let codec = codec.clone();
            let pipeline = pipeline.clone();
            let body = body.clone();
            async move {
                let tracker = pipeline.tracker(&context);
                let reader = ServerRequestStream::new(requests, codec.request.clone(), tracker.clone());
                let writer = ServerResponseStream::new(sender, codec.response.clone(), tracker);
                pipeline
                    .run(&context, || body(service, reader, writer, context.clone()))
                    .await
            }
            .boxed()
        },
    ))
}
