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

//! # Call Wrappers
//!
//! ## Purpose
//! Typed handles returned by [`GrpcCallInvoker`](crate::GrpcCallInvoker) for the four call
//! shapes, with instrumented request/response stream proxies.
//!
//! ## Call State
//! Streaming wrappers own a [`CallRegistration`], so their registry entry is removed when the
//! wrapper is dropped. The proxies only hold the handle: once the wrapper is gone their flag
//! updates are ignored, and the flags read as set (a released call has nothing left to wait
//! for).
//!
//! | Wrapper | `request_stream_completed` | `response_ended` |
//! |---|---|---|
//! | [`UnaryCall`] | always | response awaited |
//! | [`ClientStreamingCall`] | writer completed | response awaited |
//! | [`ServerStreamingCall`] | always | reader exhausted |
//! | [`DuplexStreamingCall`] | writer completed | reader exhausted |

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, BoxStream, StreamExt};
use grpckit_common::rpc::{RawResponseFuture, RawResponseStream};
use grpckit_common::{
    CallCompletion, CallSide, ExceptionNotifier, GrpcError, MessageCodec, Metadata, MethodInfo,
    PerformanceEvent, PerformanceEventKind, PerformanceNotifier, RawRequestSink,
};
use tonic::Status;
use tracing::debug;

use crate::registry::{CallHandle, CallRegistration, CallStateRegistry};

/// Completion view of a call, shared by wrappers and result values
pub trait AsyncCallState {
    /// Whether the client finished sending requests
    fn is_request_stream_completed(&self) -> bool;

    /// Whether the response was fully received
    fn is_response_ended(&self) -> bool;

    /// Final status; `None` while the call is running
    fn status(&self) -> Option<Status>;

    /// Trailers; `None` while the call is running
    fn trailers(&self) -> Option<Metadata>;
}

/// Call state handed to result values
pub type SharedCallState = Arc<dyn AsyncCallState + Send + Sync>;

/// Per-call bookkeeping shared by a wrapper and its stream proxies
pub(crate) struct CallTracker {
    info: Arc<MethodInfo>,
    host: Option<String>,
    completion: CallCompletion,
    tracked: Option<(Arc<CallStateRegistry>, CallHandle)>,
    request_done: AtomicBool,
    response_done: AtomicBool,
    performance: PerformanceNotifier,
    exceptions: ExceptionNotifier,
}

impl CallTracker {
    pub(crate) fn new(
        info: Arc<MethodInfo>,
        host: Option<String>,
        completion: CallCompletion,
        performance: PerformanceNotifier,
        exceptions: ExceptionNotifier,
    ) -> Self {
        Self {
            info,
            host,
            completion,
            tracked: None,
            request_done: AtomicBool::new(false),
            response_done: AtomicBool::new(false),
            performance,
            exceptions,
        }
    }

    pub(crate) fn with_registration(mut self, registration: &CallRegistration) -> Self {
        self.tracked = Some((registration.registry().clone(), registration.handle()));
        self
    }

    pub(crate) fn info(&self) -> &Arc<MethodInfo> {
        &self.info
    }

    pub(crate) fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub(crate) fn completion(&self) -> &CallCompletion {
        &self.completion
    }

    pub(crate) fn notify(&self, kind: PerformanceEventKind, elapsed: Option<Duration>) {
        self.performance.notify_with(|| {
            let event = PerformanceEvent::new(kind, CallSide::Client, &self.info, self.host());
            match elapsed {
                Some(elapsed) => event.with_elapsed(elapsed),
                None => event,
            }
        });
    }

    /// Report a failure observed after the call was started
    pub(crate) fn report_failure(&self, error: &GrpcError) {
        self.exceptions.notify_client(&self.info, self.host(), error);
    }

    /// Flag from the registry, or the last value this tracker set once the entry is gone
    fn registry_flag(
        &self,
        local: &AtomicBool,
        read: impl FnOnce(&crate::registry::CallState) -> bool,
    ) -> bool {
        if local.load(Ordering::Acquire) {
            return true;
        }
        match &self.tracked {
            Some((registry, handle)) => registry.with_state(*handle, read).unwrap_or(false),
            None => false,
        }
    }

    pub(crate) fn mark_request_completed(&self) {
        self.request_done.store(true, Ordering::Release);
        if let Some((registry, handle)) = &self.tracked {
            if let Err(e) = registry.mark_request_completed(*handle) {
                debug!(method = %self.info.full_name(), "Ignoring request completion: {}", e);
            }
        }
    }

    pub(crate) fn mark_response_ended(&self) {
        self.response_done.store(true, Ordering::Release);
        if self.info.method_type().is_response_streaming() {
            if let Some((registry, handle)) = &self.tracked {
                if let Err(e) = registry.mark_response_ended(*handle) {
                    debug!(method = %self.info.full_name(), "Ignoring response end: {}", e);
                }
            }
        }
    }
}

impl AsyncCallState for CallTracker {
    fn is_request_stream_completed(&self) -> bool {
        if !self.info.method_type().is_request_streaming() {
            return true;
        }
        self.registry_flag(&self.request_done, |state| state.is_request_stream_completed())
    }

    fn is_response_ended(&self) -> bool {
        if self.info.method_type().is_response_streaming() {
            self.registry_flag(&self.response_done, |state| state.is_response_ended())
        } else {
            self.response_done.load(Ordering::Acquire)
        }
    }

    fn status(&self) -> Option<Status> {
        self.completion.status()
    }

    fn trailers(&self) -> Option<Metadata> {
        self.completion.trailers()
    }
}

// ============================================================================
// STREAM PROXIES
// ============================================================================

/// Instrumented request stream of a client-streaming or duplex call
pub struct RequestStreamWriter<Req> {
    sink: Box<dyn RawRequestSink>,
    codec: MessageCodec<Req>,
    tracker: Arc<CallTracker>,
}

impl<Req> RequestStreamWriter<Req> {
    pub(crate) fn new(
        sink: Box<dyn RawRequestSink>,
        codec: MessageCodec<Req>,
        tracker: Arc<CallTracker>,
    ) -> Self {
        Self {
            sink,
            codec,
            tracker,
        }
    }

    /// Send one request
    pub async fn write(&mut self, message: &Req) -> Result<(), GrpcError> {
        self.tracker.notify(PerformanceEventKind::RequestWriting, None);
        let bytes = self.codec.encode(message, self.tracker.host())?;
        let started = Instant::now();
        let result = self.sink.send(bytes).await;
        self.tracker
            .notify(PerformanceEventKind::RequestWrote, Some(started.elapsed()));
        result.map_err(GrpcError::from)
    }

    /// Signal that no more requests follow
    pub async fn complete(&mut self) -> Result<(), GrpcError> {
        self.sink.complete().await?;
        self.tracker.mark_request_completed();
        Ok(())
    }
}

/// Instrumented response stream of a server-streaming or duplex call
pub struct ResponseStreamReader<Resp> {
    stream: RawResponseStream,
    codec: MessageCodec<Resp>,
    tracker: Arc<CallTracker>,
    ended: bool,
}

impl<Resp> ResponseStreamReader<Resp> {
    pub(crate) fn new(
        stream: RawResponseStream,
        codec: MessageCodec<Resp>,
        tracker: Arc<CallTracker>,
    ) -> Self {
        Self {
            stream,
            codec,
            tracker,
            ended: false,
        }
    }

    /// Next response, or `None` once the stream ended
    pub async fn message(&mut self) -> Result<Option<Resp>, GrpcError> {
        if self.ended {
            return Ok(None);
        }
        self.tracker.notify(PerformanceEventKind::ResponseReading, None);
        let started = Instant::now();
        let next = self.stream.next().await;
        self.tracker
            .notify(PerformanceEventKind::ResponseRead, Some(started.elapsed()));
        match next {
            Some(Ok(bytes)) => self.codec.decode(&bytes, self.tracker.host()).map(Some),
            Some(Err(status)) => {
                self.finish();
                Err(GrpcError::Status(status))
            }
            None => {
                self.finish();
                Ok(None)
            }
        }
    }

    /// Whether the end of the stream was reached
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    fn finish(&mut self) {
        self.ended = true;
        self.tracker.mark_response_ended();
    }

    /// Turn the reader into a stream of responses
    pub fn into_stream(self) -> BoxStream<'static, Result<Resp, GrpcError>>
    where
        Resp: Send + 'static,
    {
        Box::pin(stream::unfold(self, |mut reader| async move {
            match reader.message().await {
                Ok(Some(message)) => Some((Ok(message), reader)),
                Ok(None) => None,
                Err(error) => Some((Err(error), reader)),
            }
        }))
    }
}

/// Single response of a unary or client-streaming call
struct SingleResponse<Resp> {
    future: Option<RawResponseFuture>,
    codec: MessageCodec<Resp>,
    tracker: Arc<CallTracker>,
}

impl<Resp> SingleResponse<Resp> {
    async fn get(&mut self) -> Result<Resp, GrpcError> {
        let future = self.future.take().ok_or_else(|| {
            GrpcError::Status(Status::failed_precondition("Response was already consumed"))
        })?;
        let result = future.await;
        self.tracker.mark_response_ended();
        let bytes = result?;
        self.codec.decode(&bytes, self.tracker.host())
    }
}

// ============================================================================
// WRAPPERS
// ============================================================================

macro_rules! call_accessors {
    () => {
        /// Target method
        pub fn method(&self) -> &Arc<MethodInfo> {
            self.tracker.info()
        }

        /// Wait for the response headers
        pub async fn response_headers(&self) -> Metadata {
            self.tracker.completion().response_headers().await
        }

        /// Final status; `None` while the call is running
        pub fn status(&self) -> Option<Status> {
            self.tracker.status()
        }

        /// Trailers; `None` while the call is running
        pub fn trailers(&self) -> Option<Metadata> {
            self.tracker.trailers()
        }

        /// Shareable completion view for result values
        pub fn call_state(&self) -> SharedCallState {
            self.tracker.clone()
        }
    };
}

macro_rules! delegate_call_state {
    ($wrapper:ident < $($param:ident),+ >) => {
        impl<$($param),+> AsyncCallState for $wrapper<$($param),+> {
            fn is_request_stream_completed(&self) -> bool {
                self.tracker.is_request_stream_completed()
            }

            fn is_response_ended(&self) -> bool {
                self.tracker.is_response_ended()
            }

            fn status(&self) -> Option<Status> {
                self.tracker.status()
            }

            fn trailers(&self) -> Option<Metadata> {
                self.tracker.trailers()
            }
        }
    };
}

/// Unary call; not registered in the call-state registry
pub struct UnaryCall<Resp> {
    response: SingleResponse<Resp>,
    tracker: Arc<CallTracker>,
}

impl<Resp> UnaryCall<Resp> {
    pub(crate) fn new(
        future: RawResponseFuture,
        codec: MessageCodec<Resp>,
        tracker: Arc<CallTracker>,
    ) -> Self {
        Self {
            response: SingleResponse {
                future: Some(future),
                codec,
                tracker: tracker.clone(),
            },
            tracker,
        }
    }

    /// Wait for the response; can be called once
    pub async fn response(&mut self) -> Result<Resp, GrpcError> {
        self.response.get().await
    }

    pub(crate) fn tracker(&self) -> &Arc<CallTracker> {
        &self.tracker
    }

    call_accessors!();
}

/// Client-streaming call
pub struct ClientStreamingCall<Req, Resp> {
    writer: RequestStreamWriter<Req>,
    response: SingleResponse<Resp>,
    tracker: Arc<CallTracker>,
    _registration: CallRegistration,
}

impl<Req, Resp> ClientStreamingCall<Req, Resp> {
    pub(crate) fn new(
        writer: RequestStreamWriter<Req>,
        future: RawResponseFuture,
        codec: MessageCodec<Resp>,
        tracker: Arc<CallTracker>,
        registration: CallRegistration,
    ) -> Self {
        Self {
            writer,
            response: SingleResponse {
                future: Some(future),
                codec,
                tracker: tracker.clone(),
            },
            tracker,
            _registration: registration,
        }
    }

    /// Request stream
    pub fn request_stream(&mut self) -> &mut RequestStreamWriter<Req> {
        &mut self.writer
    }

    /// Wait for the response; can be called once
    pub async fn response(&mut self) -> Result<Resp, GrpcError> {
        self.response.get().await
    }

    /// Handle of the registry entry
    pub fn handle(&self) -> CallHandle {
        self._registration.handle()
    }

    pub(crate) fn tracker(&self) -> &Arc<CallTracker> {
        &self.tracker
    }

    call_accessors!();
}

/// Server-streaming call
pub struct ServerStreamingCall<Resp> {
    reader: ResponseStreamReader<Resp>,
    tracker: Arc<CallTracker>,
    _registration: CallRegistration,
}

impl<Resp> ServerStreamingCall<Resp> {
    pub(crate) fn new(
        reader: ResponseStreamReader<Resp>,
        tracker: Arc<CallTracker>,
        registration: CallRegistration,
    ) -> Self {
        Self {
            reader,
            tracker,
            _registration: registration,
        }
    }

    /// Response stream
    pub fn response_stream(&mut self) -> &mut ResponseStreamReader<Resp> {
        &mut self.reader
    }

    /// Handle of the registry entry
    pub fn handle(&self) -> CallHandle {
        self._registration.handle()
    }

    pub(crate) fn tracker(&self) -> &Arc<CallTracker> {
        &self.tracker
    }

    call_accessors!();
}

/// Duplex-streaming call
pub struct DuplexStreamingCall<Req, Resp> {
    writer: RequestStreamWriter<Req>,
    reader: ResponseStreamReader<Resp>,
    tracker: Arc<CallTracker>,
    _registration: CallRegistration,
}

impl<Req, Resp> DuplexStreamingCall<Req, Resp> {
    pub(crate) fn new(
        writer: RequestStreamWriter<Req>,
        reader: ResponseStreamReader<Resp>,
        tracker: Arc<CallTracker>,
        registration: CallRegistration,
    ) -> Self {
        Self {
            writer,
            reader,
            tracker,
            _registration: registration,
        }
    }

    /// Request stream
    pub fn request_stream(&mut self) -> &mut RequestStreamWriter<Req> {
        &mut self.writer
    }

    /// Response stream
    pub fn response_stream(&mut self) -> &mut ResponseStreamReader<Resp> {
        &mut self.reader
    }

    /// Both streams at once, for concurrent writing and reading
    pub fn streams(&mut self) -> (&mut RequestStreamWriter<Req>, &mut ResponseStreamReader<Resp>) {
        (&mut self.writer, &mut self.reader)
    }

    /// Handle of the registry entry
    pub fn handle(&self) -> CallHandle {
        self._registration.handle()
    }

    pub(crate) fn tracker(&self) -> &Arc<CallTracker> {
        &self.tracker
    }

    call_accessors!();
}

delegate_call_state!(UnaryCall<Resp>);
delegate_call_state!(ClientStreamingCall<Req, Resp>);
delegate_call_state!(ServerStreamingCall<Resp>);
delegate_call_state!(DuplexStreamingCall<Req, Resp>);

// ============================================================================
// TESTS
// ============================================================================
