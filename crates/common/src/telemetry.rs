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

//! # Telemetry Notifiers
//!
//! ## Purpose
//! Event hooks fired around serialization, method invocation, stream reads/writes and
//! interceptor execution, plus exception notifications for client, server and marshaller
//! failures.
//!
//! ## Contract
//! - Observers return nothing; a notification can never change an RPC outcome
//! - A panicking observer is caught, logged with `tracing::warn!` and skipped
//! - Remaining observers still receive the event
//!
//! ## Examples
//! ```rust
//! use grpckit_common::telemetry::{PerformanceEvent, PerformanceNotifier};
//! use std::sync::Arc;
//!
//! let mut notifier = PerformanceNotifier::new();
//! notifier.add(Arc::new(|event: &PerformanceEvent| {
//!     println!("{} {}", event.kind.as_str(), event.method);
//! }));
//! assert!(notifier.is_enabled());
//! ```

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::GrpcError;
use crate::method::MethodInfo;
use crate::rpc::ServerCallContext;

/// Which side of the call produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallSide {
    /// Client invoker
    Client,
    /// Server handler
    Server,
}

impl CallSide {
    /// Lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            CallSide::Client => "client",
            CallSide::Server => "server",
        }
    }
}

/// Kind of performance event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PerformanceEventKind {
    /// Method is about to run
    MethodCalling,
    /// Method finished (success or failure); carries elapsed time
    MethodCalled,
    /// An interceptor or exception handler ran; carries elapsed time
    MethodIntercepted,
    /// Client is writing a request message
    RequestWriting,
    /// Client wrote a request message
    RequestWrote,
    /// Client is waiting for a response message
    ResponseReading,
    /// Client received a response message
    ResponseRead,
    /// Server is waiting for a request message
    RequestReading,
    /// Server received a request message
    RequestRead,
    /// Server is writing a response message
    ResponseWriting,
    /// Server wrote a response message
    ResponseWrote,
    /// A message was serialized; carries elapsed time and byte size
    Serialized,
    /// A message was deserialized; carries elapsed time and byte size
    Deserialized,
}

impl PerformanceEventKind {
    /// Snake-case label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceEventKind::MethodCalling => "method_calling",
            PerformanceEventKind::MethodCalled => "method_called",
            PerformanceEventKind::MethodIntercepted => "method_intercepted",
            PerformanceEventKind::RequestWriting => "request_writing",
            PerformanceEventKind::RequestWrote => "request_wrote",
            PerformanceEventKind::ResponseReading => "response_reading",
            PerformanceEventKind::ResponseRead => "response_read",
            PerformanceEventKind::RequestReading => "request_reading",
            PerformanceEventKind::RequestRead => "request_read",
            PerformanceEventKind::ResponseWriting => "response_writing",
            PerformanceEventKind::ResponseWrote => "response_wrote",
            PerformanceEventKind::Serialized => "serialized",
            PerformanceEventKind::Deserialized => "deserialized",
        }
    }
}

/// Ephemeral measurement passed to listeners; never persisted
#[derive(Debug, Clone)]
pub struct PerformanceEvent {
    /// What happened
    pub kind: PerformanceEventKind,
    /// Client or server
    pub side: CallSide,
    /// Service name
    pub service: String,
    /// Method name
    pub method: String,
    /// Target host (client) or caller host (server)
    pub host: Option<String>,
    /// Elapsed time for completion events
    pub elapsed: Option<Duration>,
    /// Payload size for serialization events
    pub byte_size: Option<usize>,
    /// Interceptor name for `MethodIntercepted`
    pub interceptor: Option<String>,
    /// Payload type for serialization events
    pub type_name: Option<String>,
}

impl PerformanceEvent {
    /// Event for a method
    pub fn new(
        kind: PerformanceEventKind,
        side: CallSide,
        method: &MethodInfo,
        host: Option<&str>,
    ) -> Self {
        Self {
            kind,
            side,
            service: method.service_name().to_string(),
            method: method.name().to_string(),
            host: host.map(str::to_string),
            elapsed: None,
            byte_size: None,
            interceptor: None,
            type_name: None,
        }
    }

    /// Attach elapsed time
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    /// Attach payload size
    pub fn with_byte_size(mut self, size: usize) -> Self {
        self.byte_size = Some(size);
        self
    }

    /// Attach interceptor name
    pub fn with_interceptor(mut self, name: &str) -> Self {
        self.interceptor = Some(name.to_string());
        self
    }

    /// Attach payload type name
    pub fn with_type_name(mut self, name: &str) -> Self {
        self.type_name = Some(name.to_string());
        self
    }

    /// Elapsed time in fractional milliseconds
    pub fn elapsed_ms(&self) -> Option<f64> {
        self.elapsed.map(|d| d.as_secs_f64() * 1000.0)
    }
}

/// Observer of performance events
pub trait PerformanceListener: Send + Sync {
    /// Receive one event
    fn on_event(&self, event: &PerformanceEvent);
}

impl<F> PerformanceListener for F
where
    F: Fn(&PerformanceEvent) + Send + Sync,
{
    fn on_event(&self, event: &PerformanceEvent) {
        self(event)
    }
}

/// Ordered list of performance observers with best-effort dispatch
#[derive(Clone, Default)]
pub struct PerformanceNotifier {
    listeners: Vec<Arc<dyn PerformanceListener>>,
}

impl PerformanceNotifier {
    /// Notifier without observers
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observer
    pub fn add(&mut self, listener: Arc<dyn PerformanceListener>) {
        self.listeners.push(listener);
    }

    /// Builder form of [`add`](Self::add)
    pub fn with_listener(mut self, listener: Arc<dyn PerformanceListener>) -> Self {
        self.add(listener);
        self
    }

    /// Whether at least one observer is registered
    pub fn is_enabled(&self) -> bool {
        !self.listeners.is_empty()
    }

    /// Number of observers
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether there are no observers
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Dispatch an event to every observer
    pub fn notify(&self, event: &PerformanceEvent) {
        for listener in &self.listeners {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                warn!(
                    kind = event.kind.as_str(),
                    service = %event.service,
                    method = %event.method,
                    "Performance listener panicked: {}",
                    panic_message(panic.as_ref())
                );
            }
        }
    }

    /// Build and dispatch an event only when observers exist
    pub fn notify_with<F>(&self, build: F)
    where
        F: FnOnce() -> PerformanceEvent,
    {
        if self.is_enabled() {
            self.notify(&build());
        }
    }
}

impl std::fmt::Debug for PerformanceNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceNotifier")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Observer logging every event through `tracing` at debug level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPerformanceListener;

impl PerformanceListener for TracingPerformanceListener {
    fn on_event(&self, event: &PerformanceEvent) {
        debug!(
            side = event.side.as_str(),
            kind = event.kind.as_str(),
            service = %event.service,
            method = %event.method,
            host = event.host.as_deref().unwrap_or(""),
            elapsed_ms = event.elapsed_ms().unwrap_or(0.0),
            bytes = event.byte_size.unwrap_or(0),
            interceptor = event.interceptor.as_deref().unwrap_or(""),
            "grpc performance event"
        );
    }
}

/// Observer of failures caught by the client invoker, the server pipeline or a marshaller
///
/// All methods default to doing nothing.
pub trait ExceptionListener: Send + Sync {
    /// A client call failed
    fn on_client_exception(&self, method: &MethodInfo, host: Option<&str>, error: &GrpcError) {
        let _ = (method, host, error);
    }

    /// A server method failed; `error` is the final error sent to the caller
    fn on_server_exception(&self, context: &ServerCallContext, error: &GrpcError) {
        let _ = (context, error);
    }

    /// A marshaller failed
    fn on_serializer_exception(&self, method: &MethodInfo, error: &GrpcError) {
        let _ = (method, error);
    }
}

/// Ordered list of exception observers with best-effort dispatch
#[derive(Clone, Default)]
pub struct ExceptionNotifier {
    listeners: Vec<Arc<dyn ExceptionListener>>,
}

impl ExceptionNotifier {
    /// Notifier without observers
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observer
    pub fn add(&mut self, listener: Arc<dyn ExceptionListener>) {
        self.listeners.push(listener);
    }

    /// Builder form of [`add`](Self::add)
    pub fn with_listener(mut self, listener: Arc<dyn ExceptionListener>) -> Self {
        self.add(listener);
        self
    }

    /// Whether at least one observer is registered
    pub fn is_enabled(&self) -> bool {
        !self.listeners.is_empty()
    }

    /// Report a client failure
    pub fn notify_client(&self, method: &MethodInfo, host: Option<&str>, error: &GrpcError) {
        self.dispatch("client", method.full_name(), |listener| {
            listener.on_client_exception(method, host, error)
        });
    }

    /// Report a server failure
    pub fn notify_server(&self, context: &ServerCallContext, error: &GrpcError) {
        self.dispatch("server", context.method().full_name(), |listener| {
            listener.on_server_exception(context, error)
        });
    }

    /// Report a marshaller failure
    pub fn notify_serializer(&self, method: &MethodInfo, error: &GrpcError) {
        self.dispatch("serializer", method.full_name(), |listener| {
            listener.on_serializer_exception(method, error)
        });
    }

    fn dispatch<F>(&self, source: &str, method: &str, f: F)
    where
        F: Fn(&dyn ExceptionListener),
    {
        for listener in &self.listeners {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| f(listener.as_ref()))) {
                warn!(
                    source,
                    method,
                    "Exception listener panicked: {}",
                    panic_message(panic.as_ref())
                );
            }
        }
    }
}

impl std::fmt::Debug for ExceptionNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExceptionNotifier")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Text of a caught panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ============================================================================
// TESTS
// ============================================================================
