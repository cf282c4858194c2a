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

//! # Streaming Extensions
//!
//! ## Purpose
//! Higher-level operations over the call wrappers, each producing a [`GrpcResult`]:
//!
//! - **Unary**: `into_result`
//! - **Request side** (client-streaming and duplex): `write`, `write_with`, `write_async`,
//!   `write_all`, `write_all_stream`, `write_all_batch`, `complete_request`
//! - **Client-streaming**: `write_all_and_complete` (plus stream/batch forms) and
//!   `response_result`
//! - **Response side** (server-streaming and duplex): `read_all`, `for_each`, `for_each_async`
//! - **Duplex**: `write_and_for_each`, `write_read_all`, running the writer and the reader
//!   concurrently
//!
//! Methods with a `_with` suffix take a response converter.
//!
//! ## Failures
//! A failure is reported to the exception listeners and returned as
//! [`GrpcResult::from_error`]. The call keeps whatever progress it made: flags already set in
//! the call state stay set.
//!
//! ## Duplex Concurrency
//! `write_and_for_each` and `write_read_all` join the write loop and the read loop. Neither
//! side waits for the other, and the result is produced once both have settled.

use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use grpckit_common::GrpcError;

use crate::call::{
    CallTracker, ClientStreamingCall, DuplexStreamingCall, RequestStreamWriter,
    ResponseStreamReader, ServerStreamingCall, UnaryCall,
};
use crate::result::GrpcResult;

fn settle<T>(tracker: &Arc<CallTracker>, outcome: Result<T, GrpcError>) -> GrpcResult<T> {
    match outcome {
        Ok(value) => GrpcResult::from_response(value, tracker.clone()),
        Err(error) => {
            tracker.report_failure(&error);
            GrpcResult::from_error(error)
        }
    }
}

async fn write_items<Req, S>(writer: &mut RequestStreamWriter<Req>, requests: S) -> Result<(), GrpcError>
where
    S: Stream<Item = Req>,
{
    futures::pin_mut!(requests);
    while let Some(request) = requests.next().await {
        writer.write(&request).await?;
    }
    Ok(())
}

/// Write everything, then complete the request stream; a failed write skips completion
async fn write_items_and_complete<Req, S>(
    writer: &mut RequestStreamWriter<Req>,
    requests: S,
) -> Result<(), GrpcError>
where
    S: Stream<Item = Req>,
{
    write_items(writer, requests).await?;
    writer.complete().await
}

async fn read_items<Resp, T, F>(
    reader: &mut ResponseStreamReader<Resp>,
    mut convert: F,
) -> Result<Vec<T>, GrpcError>
where
    F: FnMut(Resp) -> T,
{
    let mut items = Vec::new();
    while let Some(response) = reader.message().await? {
        items.push(convert(response));
    }
    Ok(items)
}

async fn visit_items<Resp, F, Fut>(
    reader: &mut ResponseStreamReader<Resp>,
    mut action: F,
) -> Result<(), GrpcError>
where
    F: FnMut(Resp) -> Fut,
    Fut: Future<Output = ()>,
{
    while let Some(response) = reader.message().await? {
        action(response).await;
    }
    Ok(())
}

/// Combine the outcomes of a concurrent write and read; the read failure wins
fn join_outcomes<T>(
    written: Result<(), GrpcError>,
    read: Result<T, GrpcError>,
) -> Result<T, GrpcError> {
    match (written, read) {
        (_, Err(error)) => Err(error),
        (Err(error), Ok(_)) => Err(error),
        (Ok(()), Ok(value)) => Ok(value),
    }
}

// ============================================================================
// UNARY
// ============================================================================

impl<Resp> UnaryCall<Resp> {
    /// Await the response
    pub async fn into_result(self) -> GrpcResult<Resp> {
        self.into_result_with(|response| response).await
    }

    /// Await the response and convert it
    pub async fn into_result_with<T, F>(mut self, convert: F) -> GrpcResult<T>
    where
        F: FnOnce(Resp) -> T,
    {
        let outcome = self.response().await.map(convert);
        settle(self.tracker(), outcome)
    }
}

// ============================================================================
// REQUEST SIDE
// ============================================================================

macro_rules! request_extensions {
    () => {
        /// Send one request
        pub async fn write(&mut self, request: &Req) -> GrpcResult {
            let outcome = self.request_stream().write(request).await;
            settle(self.tracker(), outcome)
        }

        /// Send the request built by `produce`
        pub async fn write_with<F>(&mut self, produce: F) -> GrpcResult
        where
            F: FnOnce() -> Req,
        {
            let request = produce();
            self.write(&request).await
        }

        /// Send the request produced by `request` once it resolves
        pub async fn write_async<Fut>(&mut self, request: Fut) -> GrpcResult
        where
            Fut: Future<Output = Req>,
        {
            let request = request.await;
            self.write(&request).await
        }

        /// Send every request without completing the request stream
        pub async fn write_all<I>(&mut self, requests: I) -> GrpcResult
        where
            I: IntoIterator<Item = Req>,
        {
            self.write_all_stream(stream::iter(requests)).await
        }

        /// Send every request of an asynchronous sequence without completing the stream
        pub async fn write_all_stream<S>(&mut self, requests: S) -> GrpcResult
        where
            S: Stream<Item = Req>,
        {
            let outcome = write_items(self.request_stream(), requests).await;
            settle(self.tracker(), outcome)
        }

        /// Send every request of a batch produced asynchronously without completing the stream
        pub async fn write_all_batch<Fut, I>(&mut self, requests: Fut) -> GrpcResult
        where
            Fut: Future<Output = I>,
            I: IntoIterator<Item = Req>,
        {
            let requests = requests.await;
            self.write_all(requests).await
        }

        /// Signal that no more requests follow
        pub async fn complete_request(&mut self) -> GrpcResult {
            let outcome = self.request_stream().complete().await;
            settle(self.tracker(), outcome)
        }
    };
}

impl<Req, Resp> ClientStreamingCall<Req, Resp> {
    request_extensions!();

    /// Send every request, complete the request stream and await the response
    pub async fn write_all_and_complete<I>(&mut self, requests: I) -> GrpcResult<Resp>
    where
        I: IntoIterator<Item = Req>,
    {
        self.write_all_and_complete_stream_with(stream::iter(requests), |response| response)
            .await
    }

    /// [`write_all_and_complete`](Self::write_all_and_complete) with a response converter
    pub async fn write_all_and_complete_with<I, T, F>(&mut self, requests: I, convert: F) -> GrpcResult<T>
    where
        I: IntoIterator<Item = Req>,
        F: FnOnce(Resp) -> T,
    {
        self.write_all_and_complete_stream_with(stream::iter(requests), convert)
            .await
    }

    /// Send an asynchronous sequence of requests, complete and await the response
    pub async fn write_all_and_complete_stream<S>(&mut self, requests: S) -> GrpcResult<Resp>
    where
        S: Stream<Item = Req>,
    {
        self.write_all_and_complete_stream_with(requests, |response| response)
            .await
    }

    /// [`write_all_and_complete_stream`](Self::write_all_and_complete_stream) with a response
    /// converter
    pub async fn write_all_and_complete_stream_with<S, T, F>(
        &mut self,
        requests: S,
        convert: F,
    ) -> GrpcResult<T>
    where
        S: Stream<Item = Req>,
        F: FnOnce(Resp) -> T,
    {
        if let Err(error) = write_items_and_complete(self.request_stream(), requests).await {
            return settle(self.tracker(), Err(error));
        }
        self.response_result_with(convert).await
    }

    /// Send a batch produced asynchronously, complete and await the response
    pub async fn write_all_and_complete_batch<Fut, I>(&mut self, requests: Fut) -> GrpcResult<Resp>
    where
        Fut: Future<Output = I>,
        I: IntoIterator<Item = Req>,
    {
        let requests = requests.await;
        self.write_all_and_complete(requests).await
    }

    /// Await the response
    pub async fn response_result(&mut self) -> GrpcResult<Resp> {
        self.response_result_with(|response| response).await
    }

    /// Await the response and convert it
    pub async fn response_result_with<T, F>(&mut self, convert: F) -> GrpcResult<T>
    where
        F: FnOnce(Resp) -> T,
    {
        let outcome = self.response().await.map(convert);
        settle(self.tracker(), outcome)
    }
}

// ============================================================================
// RESPONSE SIDE
// ============================================================================

macro_rules! response_extensions {
    () => {
        /// Drain the response stream in order
        pub async fn read_all(&mut self) -> GrpcResult<Vec<Resp>> {
            self.read_all_with(|response| response).await
        }

        /// Drain the response stream, converting each response
        pub async fn read_all_with<T, F>(&mut self, convert: F) -> GrpcResult<Vec<T>>
        where
            F: FnMut(Resp) -> T,
        {
            let outcome = read_items(self.response_stream(), convert).await;
            settle(self.tracker(), outcome)
        }

        /// Run `action` for every response
        pub async fn for_each<F>(&mut self, mut action: F) -> GrpcResult
        where
            F: FnMut(Resp),
        {
            self.for_each_async(|response| {
                action(response);
                futures::future::ready(())
            })
            .await
        }

        /// Run an asynchronous `action` for every response, one at a time
        pub async fn for_each_async<F, Fut>(&mut self, action: F) -> GrpcResult
        where
            F: FnMut(Resp) -> Fut,
            Fut: Future<Output = ()>,
        {
            let outcome = visit_items(self.response_stream(), action).await;
            settle(self.tracker(), outcome)
        }
    };
}

impl<Resp> ServerStreamingCall<Resp> {
    response_extensions!();
}

// ============================================================================
// DUPLEX
// ============================================================================

impl<Req, Resp> DuplexStreamingCall<Req, Resp> {
    request_extensions!();
    response_extensions!();

    /// Send every request and complete, while running `action` for every response
    pub async fn write_and_for_each<I, F>(&mut self, requests: I, mut action: F) -> GrpcResult
    where
        I: IntoIterator<Item = Req>,
        F: FnMut(Resp),
    {
        self.write_stream_and_for_each_async(stream::iter(requests), |response| {
            action(response);
            futures::future::ready(())
        })
        .await
    }

    /// Send every request and complete, while running an asynchronous `action` for every
    /// response
    pub async fn write_and_for_each_async<I, F, Fut>(&mut self, requests: I, action: F) -> GrpcResult
    where
        I: IntoIterator<Item = Req>,
        F: FnMut(Resp) -> Fut,
        Fut: Future<Output = ()>,
    {
        self.write_stream_and_for_each_async(stream::iter(requests), action)
            .await
    }

    /// Send an asynchronous sequence of requests and complete, while running `action` for
    /// every response
    pub async fn write_stream_and_for_each_async<S, F, Fut>(
        &mut self,
        requests: S,
        action: F,
    ) -> GrpcResult
    where
        S: Stream<Item = Req>,
        F: FnMut(Resp) -> Fut,
        Fut: Future<Output = ()>,
    {
        let (writer, reader) = self.streams();
        let (written, read) = tokio::join!(
            write_items_and_complete(writer, requests),
            visit_items(reader, action)
        );
        settle(self.tracker(), join_outcomes(written, read))
    }

    /// Send every request and complete, while collecting every response
    pub async fn write_read_all<I>(&mut self, requests: I) -> GrpcResult<Vec<Resp>>
    where
        I: IntoIterator<Item = Req>,
    {
        self.write_stream_read_all_with(stream::iter(requests), |response| response)
            .await
    }

    /// [`write_read_all`](Self::write_read_all) with a response converter
    pub async fn write_read_all_with<I, T, F>(&mut self, requests: I, convert: F) -> GrpcResult<Vec<T>>
    where
        I: IntoIterator<Item = Req>,
        F: FnMut(Resp) -> T,
    {
        self.write_stream_read_all_with(stream::iter(requests), convert)
            .await
    }

    /// Send an asynchronous sequence of requests and complete, while collecting and
    /// converting every response
    pub async fn write_stream_read_all_with<S, T, F>(
        &mut self,
        requests: S,
        convert: F,
    ) -> GrpcResult<Vec<T>>
    where
        S: Stream<Item = Req>,
        F: FnMut(Resp) -> T,
    {
        let (writer, reader) = self.streams();
        let (written, read) = tokio::join!(
            write_items_and_complete(writer, requests),
            read_items(reader, convert)
        );
        settle(self.tracker(), join_outcomes(written, read))
    }
}
