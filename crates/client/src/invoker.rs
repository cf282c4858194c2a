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

//! # Client Call Invoker
//!
//! ## Purpose
//! Wraps a [`Channel`] so every call runs through the client pipeline:
//!
//! 1. Resolve the cached instrumented codec for the method (keyed by full name)
//! 2. Report `MethodCalling`, then run the invoking interceptors in priority order
//! 3. Start the underlying call and time it
//! 4. Report `MethodCalled`, then run the invoked interceptors in priority order
//! 5. Streaming calls: register the call state and return a wrapper with instrumented
//!    stream proxies. Unary calls are not registered
//! 6. On failure: notify the exception listeners, then let the exception handlers replace
//!    the error (first replacement wins, otherwise the original error is returned)
//!
//! Each interceptor and exception handler reports a `MethodIntercepted` event with its
//! elapsed time. An interceptor failure aborts the call with [`GrpcError::Interceptor`].

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use grpckit_common::telemetry::panic_message;
use grpckit_common::{
    CallOptions, CallSide, Channel, GrpcError, InterceptorError, Method, MethodCodec, MethodInfo,
    MethodType, PerformanceEvent, PerformanceEventKind, RawCall, RawResponse,
};
use tonic::Status;
use tracing::debug;

use crate::call::{
    CallTracker, ClientStreamingCall, DuplexStreamingCall, RequestStreamWriter,
    ResponseStreamReader, ServerStreamingCall, UnaryCall,
};
use crate::interceptor::ClientInvocation;
use crate::registry::{CallRegistration, CallState, CallStateRegistry};
use crate::settings::GrpcClientSettings;

type CodecCache = Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>;

/// Instrumented client invoker over a [`Channel`]
pub struct GrpcCallInvoker {
    channel: Arc<dyn Channel>,
    settings: GrpcClientSettings,
    codecs: CodecCache,
}

impl std::fmt::Debug for GrpcCallInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrpcCallInvoker")
            .field("settings", &self.settings)
            .finish()
    }
}

impl GrpcCallInvoker {
    /// Invoker with default settings
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self::with_settings(channel, GrpcClientSettings::default())
    }

    /// Invoker with the given settings; interceptor lists are sorted here
    pub fn with_settings(channel: Arc<dyn Channel>, mut settings: GrpcClientSettings) -> Self {
        settings.sort_interceptors();
        Self {
            channel,
            settings,
            codecs: Mutex::new(HashMap::new()),
        }
    }

    /// Settings in use
    pub fn settings(&self) -> &GrpcClientSettings {
        &self.settings
    }

    /// Underlying channel
    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    /// Registry tracking this invoker's streaming calls
    pub fn registry(&self) -> &Arc<CallStateRegistry> {
        &self.settings.registry
    }

    /// Instrumented codec for a method, built once per full name
    fn codec<Req, Resp>(&self, method: &Method<Req, Resp>) -> Arc<MethodCodec<Req, Resp>>
    where
        Req: 'static,
        Resp: 'static,
    {
        let mut codecs = self
            .codecs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(cached) = codecs.get(method.full_name()) {
            if let Ok(codec) = cached.clone().downcast::<MethodCodec<Req, Resp>>() {
                return codec;
            }
            debug!(method = %method.full_name(), "Rebuilding codec for a different payload type");
        }
        let codec = Arc::new(MethodCodec::new(
            method,
            CallSide::Client,
            self.settings.performance.clone(),
            self.settings.exceptions.clone(),
        ));
        codecs.insert(method.full_name().to_string(), codec.clone());
        codec
    }

    fn check_shape<Req, Resp>(method: &Method<Req, Resp>, expected: MethodType) -> Result<(), GrpcError> {
        if method.method_type() == expected {
            Ok(())
        } else {
            Err(GrpcError::Status(Status::internal(format!(
                "Method {} is {} but was invoked as {}",
                method.full_name(),
                method.method_type(),
                expected
            ))))
        }
    }

    fn intercepted(&self, invocation: &ClientInvocation<'_>, name: &str, started: Instant) {
        self.settings.performance.notify_with(|| {
            PerformanceEvent::new(
                PerformanceEventKind::MethodIntercepted,
                CallSide::Client,
                invocation.method,
                invocation.host,
            )
            .with_interceptor(name)
            .with_elapsed(started.elapsed())
        });
    }

    fn interceptor_failure(
        invocation: &ClientInvocation<'_>,
        interceptor: &str,
        source: InterceptorError,
    ) -> GrpcError {
        GrpcError::Interceptor {
            method: invocation.method.full_name().to_string(),
            interceptor: interceptor.to_string(),
            source,
        }
    }

    async fn on_invoking(&self, invocation: &ClientInvocation<'_>) -> Result<(), GrpcError> {
        self.settings.performance.notify_with(|| {
            PerformanceEvent::new(
                PerformanceEventKind::MethodCalling,
                CallSide::Client,
                invocation.method,
                invocation.host,
            )
        });
        for interceptor in &self.settings.invoking_interceptors {
            let started = Instant::now();
            let result = interceptor.on_invoking(invocation).await;
            self.intercepted(invocation, interceptor.name(), started);
            result.map_err(|source| Self::interceptor_failure(invocation, interceptor.name(), source))?;
        }
        Ok(())
    }

    async fn on_invoked(
        &self,
        invocation: &ClientInvocation<'_>,
        started: Instant,
    ) -> Result<(), GrpcError> {
        let elapsed = started.elapsed();
        self.settings.performance.notify_with(|| {
            PerformanceEvent::new(
                PerformanceEventKind::MethodCalled,
                CallSide::Client,
                invocation.method,
                invocation.host,
            )
            .with_elapsed(elapsed)
        });
        for interceptor in &self.settings.invoked_interceptors {
            let started = Instant::now();
            let result = interceptor.on_invoked(invocation).await;
            self.intercepted(invocation, interceptor.name(), started);
            result.map_err(|source| Self::interceptor_failure(invocation, interceptor.name(), source))?;
        }
        Ok(())
    }

    /// Report a failure and let the exception handlers replace it
    ///
    /// ## Returns
    /// The first replacement offered by a handler, or `error` itself when no handler claims
    /// it. A panicking handler turns into [`GrpcError::Interceptor`] naming the handler.
    pub fn handle_exception(&self, invocation: &ClientInvocation<'_>, error: GrpcError) -> GrpcError {
        self.settings
            .exceptions
            .notify_client(invocation.method, invocation.host, &error);
        for handler in &self.settings.exception_handlers {
            let started = Instant::now();
            let outcome = catch_unwind(AssertUnwindSafe(|| handler.replace_exception(invocation, &error)));
            self.intercepted(invocation, handler.name(), started);
            match outcome {
                Ok(Some(replacement)) => {
                    debug!(
                        method = %invocation.method.full_name(),
                        interceptor = handler.name(),
                        "Exception replaced by handler"
                    );
                    return replacement;
                }
                Ok(None) => {}
                Err(panic) => {
                    let failure = Self::interceptor_failure(
                        invocation,
                        handler.name(),
                        InterceptorError::Panicked(panic_message(panic.as_ref())),
                    );
                    self.settings
                        .exceptions
                        .notify_client(invocation.method, invocation.host, &failure);
                    return failure;
                }
            }
        }
        error
    }

    /// Run the pipeline around `start`, which begins the underlying call
    async fn invoke<T>(
        &self,
        invocation: &ClientInvocation<'_>,
        start: impl FnOnce() -> Result<T, GrpcError>,
    ) -> Result<T, GrpcError> {
        let outcome = async {
            self.on_invoking(invocation).await?;
            let started = Instant::now();
            let call = start()?;
            self.on_invoked(invocation, started).await?;
            Ok(call)
        }
        .await;
        outcome.map_err(|error| self.handle_exception(invocation, error))
    }

    fn tracker(&self, method_info: &Arc<MethodInfo>, host: Option<&str>, raw: &RawCall) -> CallTracker {
        CallTracker::new(
            method_info.clone(),
            host.map(str::to_string),
            raw.completion.clone(),
            self.settings.performance.clone(),
            self.settings.exceptions.clone(),
        )
    }

    fn register(
        &self,
        method_info: &Arc<MethodInfo>,
        host: Option<&str>,
        options: &CallOptions,
    ) -> CallRegistration {
        CallRegistration::new(
            self.settings.registry.clone(),
            CallState::new(method_info.clone(), host.map(str::to_string), options.clone()),
        )
    }

    /// Start a unary call
    pub async fn unary<Req, Resp>(
        &self,
        method: &Method<Req, Resp>,
        host: Option<&str>,
        options: CallOptions,
        request: &Req,
    ) -> Result<UnaryCall<Resp>, GrpcError>
    where
        Req: 'static,
        Resp: 'static,
    {
        let invocation = ClientInvocation::new(method.info(), host, &options);
        self.invoke(&invocation, || {
            Self::check_shape(method, MethodType::Unary)?;
            let codec = self.codec(method);
            let payload = codec.request.encode(request, host)?;
            let raw = self.channel.unary(method.info(), host, &options, payload);
            let tracker = Arc::new(self.tracker(method.info(), host, &raw));
            match raw.response {
                RawResponse::Single(future) => Ok(UnaryCall::new(future, codec.response.clone(), tracker)),
                RawResponse::Stream(_) => Err(unexpected_response(method.full_name())),
            }
        })
        .await
    }

    /// Run a unary call to completion
    ///
    /// Failures surfacing while waiting for the response also go through the exception
    /// handlers.
    pub async fn unary_call<Req, Resp>(
        &self,
        method: &Method<Req, Resp>,
        host: Option<&str>,
        options: CallOptions,
        request: &Req,
    ) -> Result<Resp, GrpcError>
    where
        Req: 'static,
        Resp: 'static,
    {
        let mut call = self.unary(method, host, options.clone(), request).await?;
        match call.response().await {
            Ok(response) => Ok(response),
            Err(error) => {
                let invocation = ClientInvocation::new(method.info(), host, &options);
                Err(self.handle_exception(&invocation, error))
            }
        }
    }

    /// Start a client-streaming call
    pub async fn client_streaming<Req, Resp>(
        &self,
        method: &Method<Req, Resp>,
        host: Option<&str>,
        options: CallOptions,
    ) -> Result<ClientStreamingCall<Req, Resp>, GrpcError>
    where
        Req: 'static,
        Resp: 'static,
    {
        let invocation = ClientInvocation::new(method.info(), host, &options);
        self.invoke(&invocation, || {
            Self::check_shape(method, MethodType::ClientStreaming)?;
            let codec = self.codec(method);
            let raw = self.channel.client_streaming(method.info(), host, &options);
            let registration = self.register(method.info(), host, &options);
            let tracker = Arc::new(self.tracker(method.info(), host, &raw).with_registration(&registration));
            let sink = raw.request.ok_or_else(|| missing_request_stream(method.full_name()))?;
            let writer = RequestStreamWriter::new(sink, codec.request.clone(), tracker.clone());
            match raw.response {
                RawResponse::Single(future) => Ok(ClientStreamingCall::new(
                    writer,
                    future,
                    codec.response.clone(),
                    tracker,
                    registration,
                )),
                RawResponse::Stream(_) => Err(unexpected_response(method.full_name())),
            }
        })
        .await
    }

    /// Start a server-streaming call
    pub async fn server_streaming<Req, Resp>(
        &self,
        method: &Method<Req, Resp>,
        host: Option<&str>,
        options: CallOptions,
        request: &Req,
    ) -> Result<ServerStreamingCall<Resp>, GrpcError>
    where
        Req: 'static,
        Resp: 'static,
    {
        let invocation = ClientInvocation::new(method.info(), host, &options);
        self.invoke(&invocation, || {
            Self::check_shape(method, MethodType::ServerStreaming)?;
            let codec = self.codec(method);
            let payload = codec.request.encode(request, host)?;
            let raw = self
                .channel
                .server_streaming(method.info(), host, &options, payload);
            let registration = self.register(method.info(), host, &options);
            let tracker = Arc::new(self.tracker(method.info(), host, &raw).with_registration(&registration));
            match raw.response {
                RawResponse::Stream(stream) => {
                    let reader = ResponseStreamReader::new(stream, codec.response.clone(), tracker.clone());
                    Ok(ServerStreamingCall::new(reader, tracker, registration))
                }
                RawResponse::Single(_) => Err(unexpected_response(method.full_name())),
            }
        })
        .await
    }

    /// Start a duplex-streaming call
    pub async fn duplex_streaming<Req, Resp>(
        &self,
        method: &Method<Req, Resp>,
        host: Option<&str>,
        options: CallOptions,
    ) -> Result<DuplexStreamingCall<Req, Resp>, GrpcError>
    where
        Req: 'static,
        Resp: 'static,
    {
        let invocation = ClientInvocation::new(method.info(), host, &options);
        self.invoke(&invocation, || {
            Self::check_shape(method, MethodType::DuplexStreaming)?;
            let codec = self.codec(method);
            let raw = self.channel.duplex_streaming(method.info(), host, &options);
            let registration = self.register(method.info(), host, &options);
            let tracker = Arc::new(self.tracker(method.info(), host, &raw).with_registration(&registration));
            let sink = raw.request.ok_or_else(|| missing_request_stream(method.full_name()))?;
            let writer = RequestStreamWriter::new(sink, codec.request.clone(), tracker.clone());
            match raw.response {
                RawResponse::Stream(stream) => {
                    let reader = ResponseStreamReader::new(stream, codec.response.clone(), tracker.clone());
                    Ok(DuplexStreamingCall::new(writer, reader, tracker, registration))
                }
                RawResponse::Single(_) => Err(unexpected_response(method.full_name())),
            }
        })
        .await
    }
}

fn unexpected_response(method: &str) -> GrpcError {
    GrpcError::Status(Status::internal(format!(
        "Transport returned the wrong response shape for {}",
        method
    )))
}

fn missing_request_stream(method: &str) -> GrpcError {
    GrpcError::Status(Status::internal(format!(
        "Transport returned no request stream for {}",
        method
    )))
}
