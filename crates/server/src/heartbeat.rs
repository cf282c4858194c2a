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
//! Heartbeat service answering each ping with a pong.

use std::sync::Arc;

use bytes::Bytes;
use futures::{FutureExt, StreamExt};
use grpckit_common::heartbeat::{
    heartbeat_method_named, DEFAULT_METHOD_NAME, DEFAULT_SERVICE_NAME, PONG,
};
use grpckit_common::{
    RawRequestStream, RawResponseSender, ServerCallContext, ServerCallHandler,
    ServerMethodDefinition, ServiceDefinition,
};
use tonic::Status;
use tracing::debug;

/// Heartbeat service with the default names
pub fn heartbeat_service() -> ServiceDefinition {
    heartbeat_service_named(DEFAULT_SERVICE_NAME, DEFAULT_METHOD_NAME)
}

/// Heartbeat service with custom service and method names
///
/// Each request is answered with a single `[1]` until the client completes its stream or the
/// call is cancelled.
pub fn heartbeat_service_named(service_name: &str, method_name: &str) -> ServiceDefinition {
    let method = heartbeat_method_named(service_name, method_name);
    let handler = ServerCallHandler::DuplexStreaming(Arc::new(
        |requests: RawRequestStream, responses: RawResponseSender, context: ServerCallContext| {
            answer_pings(requests, responses, context).boxed()
        },
    ));
    let mut definition = ServiceDefinition::new(service_name);
    definition.add_method(ServerMethodDefinition {
        info: method.info().clone(),
        handler,
    });
    definition
}

async fn answer_pings(
    mut requests: RawRequestStream,
    responses: RawResponseSender,
    context: ServerCallContext,
) -> Result<(), Status> {
    let mut answered = 0u64;
    loop {
        let next = tokio::select! {
            _ = context.cancellation_token().cancelled() => {
                context.set_status(Status::cancelled("Heartbeat cancelled"));
                break;
            }
            next = requests.next() => next,
        };
        match next {
            Some(Ok(_)) => {
                responses.send(Bytes::from_static(&[PONG])).await?;
                answered += 1;
            }
            Some(Err(status)) => return Err(status),
            None => break,
        }
    }
    debug!(peer = context.peer(), answered, "Heartbeat ended");
    Ok(())
}
