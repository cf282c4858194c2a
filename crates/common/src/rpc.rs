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

//! # RPC Primitive Boundary
//!
//! ## Purpose
//! The call primitives GrpcKit is layered on. A transport implements [`Channel`] for the
//! client side and dispatches incoming calls to the [`ServerCallHandler`]s of a
//! [`ServiceDefinition`] on the server side.
//!
//! ## Client Side
//! Every call shape yields a [`RawCall`]:
//! - an optional request sink (client-streaming and duplex)
//! - a single-response future or a response stream
//! - a shared [`CallCompletion`] exposing response headers, final status and trailers
//!
//! ## Server Side
//! Handlers work on raw bytes and receive a cloneable [`ServerCallContext`] carrying the
//! request headers, the cancellation token and a settable response status.
//!
//! ## Design Note
//! Everything here is dyn-compatible: the typed layers above (invoker, service builder,
//! gateway) do the generic work once at registration time.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tonic::Status;

use crate::metadata::{CallOptions, Metadata};
use crate::method::{MethodInfo, MethodType};

/// Stream of raw messages; an `Err` item ends the stream with that status
pub type RawRequestStream = BoxStream<'static, Result<Bytes, Status>>;

/// Raw response stream seen by the client
pub type RawResponseStream = BoxStream<'static, Result<Bytes, Status>>;

/// Raw single-response future seen by the client
pub type RawResponseFuture = BoxFuture<'static, Result<Bytes, Status>>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// CLIENT SIDE
// ============================================================================

/// Write half of a client-streaming or duplex call
#[async_trait]
pub trait RawRequestSink: Send {
    /// Send one request message
    async fn send(&mut self, message: Bytes) -> Result<(), Status>;

    /// Signal that no more requests follow
    async fn complete(&mut self) -> Result<(), Status>;
}

/// Response side of a raw call
pub enum RawResponse {
    /// Unary and client-streaming calls
    Single(RawResponseFuture),
    /// Server-streaming and duplex calls
    Stream(RawResponseStream),
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawResponse::Single(_) => f.write_str("RawResponse::Single"),
            RawResponse::Stream(_) => f.write_str("RawResponse::Stream"),
        }
    }
}

/// Handle returned by a transport for one call
pub struct RawCall {
    /// Request sink (client-streaming and duplex only)
    pub request: Option<Box<dyn RawRequestSink>>,
    /// Response future or stream
    pub response: RawResponse,
    /// Headers, status and trailers of the call
    pub completion: CallCompletion,
}

impl fmt::Debug for RawCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawCall")
            .field("has_request_sink", &self.request.is_some())
            .field("response", &self.response)
            .field("completion", &self.completion)
            .finish()
    }
}

/// Client view of a transport
///
/// ## Contract
/// - Each method starts the call immediately and never blocks
/// - Failures are reported through the response future/stream and the completion cell
/// - The transport honours `options` cancellation and deadline
pub trait Channel: Send + Sync {
    /// Start a unary call
    fn unary(
        &self,
        method: &MethodInfo,
        host: Option<&str>,
        options: &CallOptions,
        request: Bytes,
    ) -> RawCall;

    /// Start a client-streaming call
    fn client_streaming(
        &self,
        method: &MethodInfo,
        host: Option<&str>,
        options: &CallOptions,
    ) -> RawCall;

    /// Start a server-streaming call
    fn server_streaming(
        &self,
        method: &MethodInfo,
        host: Option<&str>,
        options: &CallOptions,
        request: Bytes,
    ) -> RawCall;

    /// Start a duplex-streaming call
    fn duplex_streaming(
        &self,
        method: &MethodInfo,
        host: Option<&str>,
        options: &CallOptions,
    ) -> RawCall;
}

#[derive(Debug, Default)]
struct CompletionState {
    headers: Option<Metadata>,
    status: Option<Status>,
    trailers: Option<Metadata>,
}

#[derive(Debug, Default)]
struct CompletionInner {
    state: Mutex<CompletionState>,
    headers_ready: Notify,
}

/// Shared cell holding the response headers, final status and trailers of a call
///
/// Each value is set at most once; later writes are ignored.
#[derive(Debug, Clone, Default)]
pub struct CallCompletion {
    inner: Arc<CompletionInner>,
}

impl CallCompletion {
    /// Empty cell
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish response headers (first call wins)
    pub fn set_response_headers(&self, headers: Metadata) {
        let mut state = lock(&self.inner.state);
        if state.headers.is_none() {
            state.headers = Some(headers);
            drop(state);
            self.inner.headers_ready.notify_waiters();
        }
    }

    /// Record the final status and trailers (first call wins)
    ///
    /// Also publishes empty response headers if none were sent.
    pub fn complete(&self, status: Status, trailers: Metadata) {
        let mut state = lock(&self.inner.state);
        if state.status.is_some() {
            return;
        }
        state.status = Some(status);
        state.trailers = Some(trailers);
        let notify = state.headers.is_none();
        if notify {
            state.headers = Some(Metadata::new());
        }
        drop(state);
        if notify {
            self.inner.headers_ready.notify_waiters();
        }
    }

    /// Wait for the response headers
    pub async fn response_headers(&self) -> Metadata {
        loop {
            let notified = self.inner.headers_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(headers) = lock(&self.inner.state).headers.clone() {
                return headers;
            }
            notified.await;
        }
    }

    /// Final status; `None` while the call is still running
    pub fn status(&self) -> Option<Status> {
        lock(&self.inner.state).status.clone()
    }

    /// Trailers; `None` while the call is still running
    pub fn trailers(&self) -> Option<Metadata> {
        lock(&self.inner.state).trailers.clone()
    }

    /// Whether the final status is known
    pub fn is_completed(&self) -> bool {
        lock(&self.inner.state).status.is_some()
    }
}

// ============================================================================
// SERVER SIDE
// ============================================================================

#[derive(Debug, Default)]
struct ServerCallState {
    status: Option<Status>,
    response_headers: Metadata,
    response_trailers: Metadata,
}

#[derive(Debug)]
struct ServerCallInner {
    method: Arc<MethodInfo>,
    host: Option<String>,
    peer: String,
    request_headers: Metadata,
    deadline: Option<Instant>,
    cancellation: CancellationToken,
    state: Mutex<ServerCallState>,
}

/// Server-side view of one call
#[derive(Debug, Clone)]
pub struct ServerCallContext {
    inner: Arc<ServerCallInner>,
}

impl ServerCallContext {
    /// Create a context for an incoming call
    pub fn new(
        method: Arc<MethodInfo>,
        host: Option<String>,
        peer: impl Into<String>,
        request_headers: Metadata,
        deadline: Option<Instant>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(ServerCallInner {
                method,
                host,
                peer: peer.into(),
                request_headers,
                deadline,
                cancellation,
                state: Mutex::new(ServerCallState::default()),
            }),
        }
    }

    /// Method being served
    pub fn method(&self) -> &Arc<MethodInfo> {
        &self.inner.method
    }

    /// Host the caller addressed
    pub fn host(&self) -> Option<&str> {
        self.inner.host.as_deref()
    }

    /// Caller address
    pub fn peer(&self) -> &str {
        &self.inner.peer
    }

    /// Request headers
    pub fn request_headers(&self) -> &Metadata {
        &self.inner.request_headers
    }

    /// Call deadline
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Cancellation token of the call
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.inner.cancellation
    }

    /// Whether the caller cancelled
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancellation.is_cancelled()
    }

    /// Set the status returned when the handler finishes without error
    pub fn set_status(&self, status: Status) {
        lock(&self.inner.state).status = Some(status);
    }

    /// Status set by the handler
    pub fn status(&self) -> Option<Status> {
        lock(&self.inner.state).status.clone()
    }

    /// Add a response header
    pub fn add_response_header(&self, key: &str, value: impl Into<String>) {
        lock(&self.inner.state).response_headers.add(key, value);
    }

    /// Response headers set by the handler
    pub fn response_headers(&self) -> Metadata {
        lock(&self.inner.state).response_headers.clone()
    }

    /// Add a response trailer
    pub fn add_response_trailer(&self, key: &str, value: impl Into<String>) {
        lock(&self.inner.state).response_trailers.add(key, value);
    }

    /// Response trailers set by the handler
    pub fn response_trailers(&self) -> Metadata {
        lock(&self.inner.state).response_trailers.clone()
    }
}

/// Sender used by streaming handlers to emit responses
#[derive(Debug, Clone)]
pub struct RawResponseSender {
    tx: mpsc::Sender<Result<Bytes, Status>>,
}

impl RawResponseSender {
    /// Wrap a channel sender
    pub fn new(tx: mpsc::Sender<Result<Bytes, Status>>) -> Self {
        Self { tx }
    }

    /// Send one response message
    pub async fn send(&self, message: Bytes) -> Result<(), Status> {
        self.tx
            .send(Ok(message))
            .await
            .map_err(|_| Status::cancelled("Response stream closed by the caller"))
    }
}

/// Raw unary handler
pub type UnaryHandler =
    Arc<dyn Fn(Bytes, ServerCallContext) -> BoxFuture<'static, Result<Bytes, Status>> + Send + Sync>;

/// Raw client-streaming handler
pub type ClientStreamingHandler = Arc<
    dyn Fn(RawRequestStream, ServerCallContext) -> BoxFuture<'static, Result<Bytes, Status>>
        + Send
        + Sync,
>;

/// Raw server-streaming handler
pub type ServerStreamingHandler = Arc<
    dyn Fn(Bytes, RawResponseSender, ServerCallContext) -> BoxFuture<'static, Result<(), Status>>
        + Send
        + Sync,
>;

/// Raw duplex-streaming handler
pub type DuplexStreamingHandler = Arc<
    dyn Fn(
            RawRequestStream,
            RawResponseSender,
            ServerCallContext,
        ) -> BoxFuture<'static, Result<(), Status>>
        + Send
        + Sync,
>;

/// Handler for one method, tagged by call shape
#[derive(Clone)]
pub enum ServerCallHandler {
    /// Unary
    Unary(UnaryHandler),
    /// Client streaming
    ClientStreaming(ClientStreamingHandler),
    /// Server streaming
    ServerStreaming(ServerStreamingHandler),
    /// Duplex streaming
    DuplexStreaming(DuplexStreamingHandler),
}

impl ServerCallHandler {
    /// Call shape served by this handler
    pub fn method_type(&self) -> MethodType {
        match self {
            ServerCallHandler::Unary(_) => MethodType::Unary,
            ServerCallHandler::ClientStreaming(_) => MethodType::ClientStreaming,
            ServerCallHandler::ServerStreaming(_) => MethodType::ServerStreaming,
            ServerCallHandler::DuplexStreaming(_) => MethodType::DuplexStreaming,
        }
    }
}

impl fmt::Debug for ServerCallHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerCallHandler::{}", self.method_type())
    }
}

/// A method and its handler
#[derive(Debug, Clone)]
pub struct ServerMethodDefinition {
    /// Method identity
    pub info: Arc<MethodInfo>,
    /// Handler
    pub handler: ServerCallHandler,
}

/// Handler table for one service, keyed by full method name
#[derive(Debug, Clone, Default)]
pub struct ServiceDefinition {
    service_name: String,
    methods: HashMap<String, ServerMethodDefinition>,
    order: Vec<String>,
}

impl ServiceDefinition {
    /// Empty service
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            methods: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a method; a method with the same full name is replaced
    pub fn add_method(&mut self, definition: ServerMethodDefinition) {
        let key = definition.info.full_name().to_string();
        if self.methods.insert(key.clone(), definition).is_none() {
            self.order.push(key);
        }
    }

    /// Service name
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Look up a method by full name (`/Service/Method`)
    pub fn method(&self, full_name: &str) -> Option<&ServerMethodDefinition> {
        self.methods.get(full_name)
    }

    /// Methods in registration order
    pub fn methods(&self) -> impl Iterator<Item = &ServerMethodDefinition> {
        self.order.iter().filter_map(|key| self.methods.get(key))
    }

    /// Number of methods
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether the service has no methods
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
