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

//! Shared fixtures: an in-process calculator service over decimal-text numbers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::StreamExt;
use grpckit_client::{CallStateRegistry, GrpcCallInvoker, GrpcClientSettings};
use grpckit_common::rpc::{
    ClientStreamingHandler, DuplexStreamingHandler, ServerStreamingHandler, UnaryHandler,
};
use grpckit_common::{
    ExceptionListener, GrpcError, LocalChannel, MarshalError, Marshaller, Method, MethodInfo,
    MethodType, PerformanceEvent, PerformanceEventKind, PerformanceListener, ServerCallHandler,
    ServerMethodDefinition, ServiceDefinition,
};
use tonic::Status;

pub const SERVICE: &str = "Calc";

pub fn number_marshaller() -> Marshaller<u32> {
    Marshaller::new(
        |value: &u32| Ok(Bytes::from(value.to_string())),
        |bytes: &[u8]| {
            std::str::from_utf8(bytes)
                .ok()
                .and_then(|text| text.parse().ok())
                .ok_or_else(|| MarshalError::Other("not a number".to_string()))
        },
    )
}

pub fn method(name: &str, method_type: MethodType) -> Method<u32, u32> {
    Method::new(method_type, SERVICE, name, number_marshaller(), number_marshaller())
}

fn parse(bytes: &[u8]) -> Result<u32, Status> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| Status::invalid_argument("not a number"))
}

fn encode(value: u32) -> Bytes {
    Bytes::from(value.to_string())
}

fn info(name: &str, method_type: MethodType) -> Arc<MethodInfo> {
    Arc::new(MethodInfo::new(method_type, SERVICE, name, "u32", "u32"))
}

pub fn calc_service() -> ServiceDefinition {
    let mut service = ServiceDefinition::new(SERVICE);

    let double: UnaryHandler = Arc::new(|request, _ctx| {
        Box::pin(async move {
            match parse(&request)? {
                0 => Err(Status::invalid_argument("zero is not allowed")),
                value => Ok(encode(value * 2)),
            }
        })
    });
    service.add_method(ServerMethodDefinition {
        info: info("Double", MethodType::Unary),
        handler: ServerCallHandler::Unary(double),
    });

    let sum: ClientStreamingHandler = Arc::new(|mut requests, _ctx| {
        Box::pin(async move {
            let mut total = 0;
            while let Some(message) = requests.next().await {
                total += parse(&message?)?;
            }
            Ok(encode(total))
        })
    });
    service.add_method(ServerMethodDefinition {
        info: info("Sum", MethodType::ClientStreaming),
        handler: ServerCallHandler::ClientStreaming(sum),
    });

    let reject: ClientStreamingHandler = Arc::new(|_requests, _ctx| {
        Box::pin(async move { Err(Status::resource_exhausted("quota exceeded")) })
    });
    service.add_method(ServerMethodDefinition {
        info: info("Reject", MethodType::ClientStreaming),
        handler: ServerCallHandler::ClientStreaming(reject),
    });

    let take_one: ClientStreamingHandler = Arc::new(|mut requests, _ctx| {
        Box::pin(async move {
            let _ = requests.next().await;
            Err(Status::aborted("only one request accepted"))
        })
    });
    service.add_method(ServerMethodDefinition {
        info: info("TakeOne", MethodType::ClientStreaming),
        handler: ServerCallHandler::ClientStreaming(take_one),
    });

    let count: ServerStreamingHandler = Arc::new(|request, sender, _ctx| {
        Box::pin(async move {
            for value in 1..=parse(&request)? {
                sender.send(encode(value)).await?;
            }
            Ok(())
        })
    });
    service.add_method(ServerMethodDefinition {
        info: info("Count", MethodType::ServerStreaming),
        handler: ServerCallHandler::ServerStreaming(count),
    });

    let echo: DuplexStreamingHandler = Arc::new(|mut requests, sender, _ctx| {
        Box::pin(async move {
            while let Some(message) = requests.next().await {
                sender.send(message?).await?;
            }
            Ok(())
        })
    });
    service.add_method(ServerMethodDefinition {
        info: info("Echo", MethodType::DuplexStreaming),
        handler: ServerCallHandler::DuplexStreaming(echo),
    });

    let fail: DuplexStreamingHandler = Arc::new(|mut requests, _sender, _ctx| {
        Box::pin(async move {
            let _ = requests.next().await;
            Err(Status::permission_denied("not allowed"))
        })
    });
    service.add_method(ServerMethodDefinition {
        info: info("Fail", MethodType::DuplexStreaming),
        handler: ServerCallHandler::DuplexStreaming(fail),
    });

    service
}

pub fn calc_channel() -> Arc<LocalChannel> {
    Arc::new(LocalChannel::new().with_service(calc_service()))
}

/// Invoker over the calculator with a private registry
pub fn invoker(settings: GrpcClientSettings) -> (GrpcCallInvoker, Arc<CallStateRegistry>) {
    let registry = Arc::new(CallStateRegistry::new());
    let invoker = GrpcCallInvoker::with_settings(calc_channel(), settings.with_registry(registry.clone()));
    (invoker, registry)
}

#[derive(Default)]
pub struct EventRecorder {
    events: Mutex<Vec<PerformanceEvent>>,
}

impl EventRecorder {
    pub fn events(&self) -> Vec<PerformanceEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<PerformanceEventKind> {
        self.events().into_iter().map(|event| event.kind).collect()
    }

    pub fn interceptors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| event.interceptor)
            .collect()
    }
}

impl PerformanceListener for EventRecorder {
    fn on_event(&self, event: &PerformanceEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[derive(Default)]
pub struct ExceptionCounter {
    client: AtomicUsize,
    last: Mutex<Option<String>>,
}

impl ExceptionCounter {
    pub fn client_count(&self) -> usize {
        self.client.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Option<String> {
        self.last.lock().unwrap().clone()
    }
}

impl ExceptionListener for ExceptionCounter {
    fn on_client_exception(&self, _method: &MethodInfo, _host: Option<&str>, error: &GrpcError) {
        self.client.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(error.to_string());
    }
}
