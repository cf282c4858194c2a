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
//! # Server Stream Proxies
//!
//! Typed request and response streams handed to service methods. Each read and write is
//! bracketed by `RequestReading`/`RequestRead` and `ResponseWriting`/`ResponseWrote` events and
//! payloads go through the instrumented method codec.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, BoxStream, StreamExt};
use grpckit_common::{
    CallSide, GrpcError, MessageCodec, MethodInfo, PerformanceEvent, PerformanceEventKind,
    PerformanceNotifier, RawRequestStream, RawResponseSender,
};

/// Event source shared by the proxies of one call
#[derive(Debug, Clone)]
pub(crate) struct CallTracker {
    info: Arc<MethodInfo>,
    host: Option<String>,
    performance: PerformanceNotifier,
}

impl CallTracker {
    pub(crate) fn new(
        info: Arc<MethodInfo>,
        host: Option<String>,
        performance: PerformanceNotifier,
    ) -> Self {
        Self {
            info,
            host,
            performance,
        }
    }

    pub(crate) fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub(crate) fn notify(&self, kind: PerformanceEventKind, elapsed: Option<Duration>) {
        self.performance.notify_with(|| {
            let event = PerformanceEvent::new(kind, CallSide::Server, &self.info, self.host());
            match elapsed {
                Some(elapsed) => event.with_elapsed(elapsed),
                None => event,
            }
        });
    }

    pub(crate) fn intercepted(&self, interceptor: &str, elapsed: Duration) {
        self.performance.notify_with(|| {
            PerformanceEvent::new(
                PerformanceEventKind::MethodIntercepted,
                CallSide::Server,
                &self.info,
                self.host(),
            )
            .with_interceptor(interceptor)
            .with_elapsed(elapsed)
        });
    }
}

// ============================================================================
// REQUEST STREAM
// ============================================================================

/// Incoming request messages of a client-streaming or duplex method
pub struct ServerRequestStream<Req> {
    stream: RawRequestStream,
    codec: MessageCodec<Req>,
    tracker: CallTracker,
    ended: bool,
}

impl<Req> ServerRequestStream<Req> {
    pub(crate) fn new(stream: RawRequestStream, codec: MessageCodec<Req>, tracker: CallTracker) -> Self {
        Self {
            stream,
            codec,
            tracker,
            ended: false,
        }
    }

    /// Next request, or `None` once the client completed the stream
    pub async fn message(&mut self) -> Result<Option<Req>, GrpcError> {
        if self.ended {
            return Ok(None);
        }
        self.tracker.notify(PerformanceEventKind::RequestReading, None);
        let started = Instant::now();
        let next = self.stream.next().await;
        self.tracker
            .notify(PerformanceEventKind::RequestRead, Some(started.elapsed()));
        match next {
            Some(Ok(bytes)) => self.codec.decode(&bytes, self.tracker.host()).map(Some),
            Some(Err(status)) => {
                self.ended = true;
                Err(GrpcError::Status(status))
            }
            None => {
                self.ended = true;
                Ok(None)
            }
        }
    }

    /// Whether the client completed the stream
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Drain every remaining request
    pub async fn collect_all(&mut self) -> Result<Vec<Req>, GrpcError> {
        let mut requests = Vec::new();
        while let Some(request) = self.message().await? {
            requests.push(request);
        }
        Ok(requests)
    }

    /// Turn the proxy into a stream of requests
    pub fn into_stream(self) -> BoxStream<'static, Result<Req, GrpcError>>
    where
        Req: Send + 'static,
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

// ============================================================================
// RESPONSE STREAM
// ============================================================================

/// Outgoing response messages of a server-streaming or duplex method
pub struct ServerResponseStream<Resp> {
    sender: RawResponseSender,
    codec: MessageCodec<Resp>,
    tracker: CallTracker,
}

impl<Resp> ServerResponseStream<Resp> {
    pub(crate) fn new(sender: RawResponseSender, codec: MessageCodec<Resp>, tracker: CallTracker) -> Self {
        Self {
            sender,
            codec,
            tracker,
        }
    }

    /// Send one response
    pub async fn write(&self, message: &Resp) -> Result<(), GrpcError> {
        self.tracker.notify(PerformanceEventKind::ResponseWriting, None);
        let started = Instant::now();
        let bytes = self.codec.encode(message, self.tracker.host())?;
        self.sender.send(bytes).await.map_err(GrpcError::Status)?;
        self.tracker
            .notify(PerformanceEventKind::ResponseWrote, Some(started.elapsed()));
        Ok(())
    }

    /// Send responses in order, stopping at the first failure
    pub async fn write_all<'a, I>(&self, messages: I) -> Result<(), GrpcError>
    where
        I: IntoIterator<Item = &'a Resp>,
        Resp: 'a,
    {
        for message in messages {
            self.write(message).await?;
        }
        Ok(())
    }
}
