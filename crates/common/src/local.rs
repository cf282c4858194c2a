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

//! # Local Transport
//!
//! ## Purpose
//! An in-process [`Channel`] that dispatches calls straight to registered
//! [`ServiceDefinition`]s. Used by the gateway's loopback mode, the sample binary and tests.
//!
//! ## Semantics
//! - Unknown method: `Unimplemented`
//! - Handler registered with another call shape: `Internal`
//! - Every call runs its handler on a spawned task
//! - The server-side cancellation token is a child of the caller's token; it is also
//!   cancelled when the deadline passes or the caller drops the response
//! - The final status is recorded before the response stream ends, so a reader that saw
//!   the end of the stream can read the status without waiting

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tonic::{Code, Status};
use tracing::debug;

use crate::metadata::{CallOptions, Metadata};
use crate::method::{MethodInfo, MethodType};
use crate::rpc::{
    CallCompletion, Channel, RawCall, RawRequestSink, RawRequestStream, RawResponse,
    RawResponseFuture, RawResponseSender, RawResponseStream, ServerCallContext,
    ServerCallHandler, ServerMethodDefinition, ServiceDefinition,
};

const CHANNEL_CAPACITY: usize = 32;
const CANCELLED_MESSAGE: &str = "Call cancelled by the client";
const DEADLINE_MESSAGE: &str = "Deadline exceeded";

/// In-process channel over a set of service definitions
#[derive(Debug, Clone)]
pub struct LocalChannel {
    methods: Arc<HashMap<String, ServerMethodDefinition>>,
    peer: String,
}

impl Default for LocalChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalChannel {
    /// Channel without services
    pub fn new() -> Self {
        Self {
            methods: Arc::new(HashMap::new()),
            peer: "local".to_string(),
        }
    }

    /// Channel serving the given services
    pub fn from_services<I>(services: I) -> Self
    where
        I: IntoIterator<Item = ServiceDefinition>,
    {
        let mut channel = Self::new();
        for service in services {
            channel.add_service(service);
        }
        channel
    }

    /// Add a service (builder style)
    pub fn with_service(mut self, service: ServiceDefinition) -> Self {
        self.add_service(service);
        self
    }

    /// Add a service; methods with the same full name are replaced
    pub fn add_service(&mut self, service: ServiceDefinition) {
        let methods = Arc::make_mut(&mut self.methods);
        for definition in service.methods() {
            methods.insert(definition.info.full_name().to_string(), definition.clone());
        }
    }

    /// Peer address reported to handlers
    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = peer.into();
        self
    }

    /// Whether a method is registered
    pub fn has_method(&self, full_name: &str) -> bool {
        self.methods.contains_key(full_name)
    }

    fn lookup(&self, method: &MethodInfo) -> Result<ServerMethodDefinition, Status> {
        self.methods.get(method.full_name()).cloned().ok_or_else(|| {
            Status::unimplemented(format!("Method {} is not implemented", method.full_name()))
        })
    }

    fn start(
        &self,
        info: Arc<MethodInfo>,
        host: Option<&str>,
        options: &CallOptions,
        completion: &CallCompletion,
    ) -> (ServerCallContext, CallGuard) {
        let server = options.cancellation_token().child_token();
        debug!(method = %info.full_name(), peer = %self.peer, "Dispatching local call");
        let context = ServerCallContext::new(
            info,
            host.map(str::to_string),
            self.peer.clone(),
            options.headers().clone(),
            options.deadline(),
            server.clone(),
        );
        let guard = CallGuard {
            client: options.cancellation_token().clone(),
            server,
            deadline: options.deadline(),
            completion: completion.clone(),
        };
        (context, guard)
    }
}

fn shape_mismatch(method: &MethodInfo, definition: &ServerMethodDefinition) -> Status {
    Status::internal(format!(
        "Method {} is registered as {} but was called as {}",
        method.full_name(),
        definition.handler.method_type(),
        method.method_type()
    ))
}

fn failed_call(status: Status, method_type: MethodType, completion: CallCompletion) -> RawCall {
    completion.complete(status.clone(), Metadata::new());
    let request = if method_type.is_request_streaming() {
        let (tx, _) = mpsc::channel(1);
        Some(LocalRequestSink::boxed(
            tx,
            CancellationToken::new(),
            completion.clone(),
        ))
    } else {
        None
    };
    let response = if method_type.is_response_streaming() {
        RawResponse::Stream(Box::pin(stream::once(async move { Err(status) })))
    } else {
        RawResponse::Single(Box::pin(async move { Err(status) }))
    };
    RawCall {
        request,
        response,
        completion,
    }
}

/// Apply the context status to the handler result and record the final status
fn settle<T>(
    result: Result<T, Status>,
    context: &ServerCallContext,
    completion: &CallCompletion,
) -> Result<T, Status> {
    let result = match result {
        Ok(value) => match context.status() {
            Some(status) if status.code() != Code::Ok => Err(status),
            _ => Ok(value),
        },
        Err(status) => Err(status),
    };
    completion.set_response_headers(context.response_headers());
    let status = match &result {
        Ok(_) => Status::ok(""),
        Err(status) => status.clone(),
    };
    completion.complete(status, context.response_trailers());
    result
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending::<()>().await,
    }
}

/// Client-side supervision of one call: cancellation, deadline and abandonment
struct CallGuard {
    client: CancellationToken,
    server: CancellationToken,
    deadline: Option<Instant>,
    completion: CallCompletion,
}

impl CallGuard {
    fn abort(&self, status: Status) -> Status {
        self.server.cancel();
        self.completion.complete(status.clone(), Metadata::new());
        status
    }

    async fn watch<F, T>(&self, work: F) -> Result<T, Status>
    where
        F: Future<Output = Option<Result<T, Status>>>,
    {
        tokio::select! {
            biased;
            _ = self.client.cancelled() => Err(self.abort(Status::cancelled(CANCELLED_MESSAGE))),
            _ = deadline_elapsed(self.deadline) => Err(self.abort(Status::deadline_exceeded(DEADLINE_MESSAGE))),
            outcome = work => match outcome {
                Some(result) => result,
                None => Err(self.abort(Status::internal("Handler ended without a status"))),
            },
        }
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.server.cancel();
    }
}

fn single_response(rx: oneshot::Receiver<Result<Bytes, Status>>, guard: CallGuard) -> RawResponseFuture {
    Box::pin(async move { guard.watch(async move { rx.await.ok() }).await })
}

fn response_stream(rx: mpsc::Receiver<Result<Bytes, Status>>, guard: CallGuard) -> RawResponseStream {
    Box::pin(stream::unfold(Some((rx, guard)), |state| async move {
        let (mut rx, guard) = state?;
        let next = guard
            .watch(async {
                match rx.recv().await {
                    Some(item) => Some(item.map(Some)),
                    // Ended cleanly only if the handler recorded a status first
                    None if guard.completion.is_completed() => Some(Ok(None)),
                    None => None,
                }
            })
            .await;
        match next {
            Ok(Some(message)) => Some((Ok(message), Some((rx, guard)))),
            Ok(None) => None,
            Err(status) => Some((Err(status), None)),
        }
    }))
}

fn request_stream(rx: mpsc::Receiver<Bytes>, token: CancellationToken) -> RawRequestStream {
    Box::pin(stream::unfold(Some((rx, token)), |state| async move {
        let (mut rx, token) = state?;
        tokio::select! {
            biased;
            _ = token.cancelled() => Some((Err(Status::cancelled(CANCELLED_MESSAGE)), None)),
            item = rx.recv() => item.map(|message| (Ok(message), Some((rx, token)))),
        }
    }))
}

struct LocalRequestSink {
    tx: Option<mpsc::Sender<Bytes>>,
    cancellation: CancellationToken,
    completion: CallCompletion,
}

impl LocalRequestSink {
    fn boxed(
        tx: mpsc::Sender<Bytes>,
        cancellation: CancellationToken,
        completion: CallCompletion,
    ) -> Box<dyn RawRequestSink> {
        Box::new(Self {
            tx: Some(tx),
            cancellation,
            completion,
        })
    }

    fn closed_status(&self) -> Status {
        self.completion
            .status()
            .filter(|status| status.code() != Code::Ok)
            .unwrap_or_else(|| Status::cancelled("Request stream closed by the server"))
    }
}

#[async_trait]
impl RawRequestSink for LocalRequestSink {
    async fn send(&mut self, message: Bytes) -> Result<(), Status> {
        if self.cancellation.is_cancelled() {
            return Err(Status::cancelled(CANCELLED_MESSAGE));
        }
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| Status::failed_precondition("Request stream already completed"))?;
        if tx.send(message).await.is_err() {
            return Err(self.closed_status());
        }
        Ok(())
    }

    async fn complete(&mut self) -> Result<(), Status> {
        self.tx.take();
        Ok(())
    }
}

fn spawn_single<F>(work: F, context: ServerCallContext, completion: CallCompletion) -> oneshot::Receiver<Result<Bytes, Status>>
where
    F: Future<Output = Result<Bytes, Status>> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let result = work.await;
        let _ = tx.send(settle(result, &context, &completion));
    });
    rx
}

fn spawn_streaming<F>(
    work: impl FnOnce(RawResponseSender) -> F,
    context: ServerCallContext,
    completion: CallCompletion,
) -> mpsc::Receiver<Result<Bytes, Status>>
where
    F: Future<Output = Result<(), Status>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let work = work(RawResponseSender::new(tx.clone()));
    tokio::spawn(async move {
        let result = work.await;
        if let Err(status) = settle(result, &context, &completion) {
            let _ = tx.send(Err(status)).await;
        }
    });
    rx
}

impl Channel for LocalChannel {
    fn unary(
        &self,
        method: &MethodInfo,
        host: Option<&str>,
        options: &CallOptions,
        request: Bytes,
    ) -> RawCall {
        let completion = CallCompletion::new();
        let (info, handler) = match self.lookup(method) {
            Ok(ServerMethodDefinition {
                info,
                handler: ServerCallHandler::Unary(handler),
            }) => (info, handler),
            Ok(other) => return failed_call(shape_mismatch(method, &other), MethodType::Unary, completion),
            Err(status) => return failed_call(status, MethodType::Unary, completion),
        };
        let (context, guard) = self.start(info, host, options, &completion);
        let rx = spawn_single(handler(request, context.clone()), context, completion.clone());
        RawCall {
            request: None,
            response: RawResponse::Single(single_response(rx, guard)),
            completion,
        }
    }

    fn client_streaming(
        &self,
        method: &MethodInfo,
        host: Option<&str>,
        options: &CallOptions,
    ) -> RawCall {
        let completion = CallCompletion::new();
        let (info, handler) = match self.lookup(method) {
            Ok(ServerMethodDefinition {
                info,
                handler: ServerCallHandler::ClientStreaming(handler),
            }) => (info, handler),
            Ok(other) => {
                return failed_call(shape_mismatch(method, &other), MethodType::ClientStreaming, completion)
            }
            Err(status) => return failed_call(status, MethodType::ClientStreaming, completion),
        };
        let (context, guard) = self.start(info, host, options, &completion);
        let (request_tx, request_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let requests = request_stream(request_rx, context.cancellation_token().clone());
        let rx = spawn_single(handler(requests, context.clone()), context, completion.clone());
        RawCall {
            request: Some(LocalRequestSink::boxed(
                request_tx,
                options.cancellation_token().clone(),
                completion.clone(),
            )),
            response: RawResponse::Single(single_response(rx, guard)),
            completion,
        }
    }

    fn server_streaming(
        &self,
        method: &MethodInfo,
        host: Option<&str>,
        options: &CallOptions,
        request: Bytes,
    ) -> RawCall {
        let completion = CallCompletion::new();
        let (info, handler) = match self.lookup(method) {
            Ok(ServerMethodDefinition {
                info,
                handler: ServerCallHandler::ServerStreaming(handler),
            }) => (info, handler),
            Ok(other) => {
                return failed_call(shape_mismatch(method, &other), MethodType::ServerStreaming, completion)
            }
            Err(status) => return failed_call(status, MethodType::ServerStreaming, completion),
        };
        let (context, guard) = self.start(info, host, options, &completion);
        let handler_context = context.clone();
        let rx = spawn_streaming(
            move |sender| handler(request, sender, handler_context),
            context,
            completion.clone(),
        );
        RawCall {
            request: None,
            response: RawResponse::Stream(response_stream(rx, guard)),
            completion,
        }
    }

    fn duplex_streaming(
        &self,
        method: &MethodInfo,
        host: Option<&str>,
        options: &CallOptions,
    ) -> RawCall {
        let completion = CallCompletion::new();
        let (info, handler) = match self.lookup(method) {
            Ok(ServerMethodDefinition {
                info,
                handler: ServerCallHandler::DuplexStreaming(handler),
            }) => (info, handler),
            Ok(other) => {
                return failed_call(shape_mismatch(method, &other), MethodType::DuplexStreaming, completion)
            }
            Err(status) => return failed_call(status, MethodType::DuplexStreaming, completion),
        };
        let (context, guard) = self.start(info, host, options, &completion);
        let (request_tx, request_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let requests = request_stream(request_rx, context.cancellation_token().clone());
        let handler_context = context.clone();
        let rx = spawn_streaming(
            move |sender| handler(requests, sender, handler_context),
            context,
            completion.clone(),
        );
        RawCall {
            request: Some(LocalRequestSink::boxed(
                request_tx,
                options.cancellation_token().clone(),
                completion.clone(),
            )),
            response: RawResponse::Stream(response_stream(rx, guard)),
            completion,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
