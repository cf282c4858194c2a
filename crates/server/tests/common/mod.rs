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
//! Shared fixtures: a calculator service built through the service builder.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use grpckit_client::{CallStateRegistry, GrpcCallInvoker, GrpcClientSettings};
use grpckit_common::{
    ExceptionListener, GrpcError, Interceptor, InterceptorError, LocalChannel, MarshalError,
    Marshaller, Method, MethodType, PerformanceEvent, PerformanceEventKind, PerformanceListener,
    ServerCallContext,
};
use grpckit_server::{
    GrpcService, GrpcServiceBuilder, GrpcServiceBuilderSettings, MethodOptions,
    MethodSignature, ServerMethodExceptionHandler, ServerMethodInvokedInterceptor,
    ServerMethodInvokingInterceptor, ServiceMethod, ServiceOptions,
};
use tonic::{Code, Status};

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

// ============================================================================
// INTERCEPTORS
// ============================================================================

/// Interceptor that only records that it ran (through `MethodIntercepted` events)
pub struct Tag {
    name: &'static str,
    priority: Option<i32>,
    failure: Option<Code>,
    rejects: bool,
}

impl Tag {
    pub fn new(name: &'static str, priority: Option<i32>) -> Arc<Self> {
        Arc::new(Self {
            name,
            priority,
            failure: None,
            rejects: false,
        })
    }

    pub fn failing(name: &'static str, code: Code) -> Arc<Self> {
        Arc::new(Self {
            name,
            priority: None,
            failure: Some(code),
            rejects: false,
        })
    }

    pub fn rejecting(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            priority: None,
            failure: None,
            rejects: true,
        })
    }

    fn run(&self) -> Result<(), InterceptorError> {
        if self.rejects {
            return Err(InterceptorError::Rejected(format!("{} said no", self.name)));
        }
        match self.failure {
            Some(code) => Err(InterceptorError::Status(Status::new(code, self.name))),
            None => Ok(()),
        }
    }
}

impl Interceptor for Tag {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> Option<i32> {
        self.priority
    }
}

#[async_trait]
impl ServerMethodInvokingInterceptor for Tag {
    async fn on_invoking(&self, _context: &ServerCallContext) -> Result<(), InterceptorError> {
        self.run()
    }
}

#[async_trait]
impl ServerMethodInvokedInterceptor for Tag {
    async fn on_invoked(&self, _context: &ServerCallContext) -> Result<(), InterceptorError> {
        self.run()
    }
}

/// Exception handler replacing errors with a fixed code, or panicking
pub struct Replace {
    name: &'static str,
    priority: Option<i32>,
    replacement: Option<Code>,
    panics: bool,
}

impl Replace {
    pub fn with(name: &'static str, priority: Option<i32>, code: Code) -> Arc<Self> {
        Arc::new(Self {
            name,
            priority,
            replacement: Some(code),
            panics: false,
        })
    }

    pub fn passing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            priority: None,
            replacement: None,
            panics: false,
        })
    }

    pub fn panicking(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            priority: None,
            replacement: None,
            panics: true,
        })
    }
}

impl Interceptor for Replace {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> Option<i32> {
        self.priority
    }
}

impl ServerMethodExceptionHandler for Replace {
    fn replace_exception(&self, _context: &ServerCallContext, _error: &GrpcError) -> Option<GrpcError> {
        if self.panics {
            panic!("{} handler", self.name);
        }
        self.replacement
            .map(|code| GrpcError::Status(Status::new(code, format!("replaced by {}", self.name))))
    }
}

// ============================================================================
// SERVICE
// ============================================================================

/// Calculator over decimal-text numbers
pub struct Calculator {
    pub calls: AtomicUsize,
    pub saw_cancellation: AtomicBool,
    options: ServiceOptions,
}

impl Calculator {
    pub fn new(options: ServiceOptions) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            saw_cancellation: AtomicBool::new(false),
            options,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GrpcService for Calculator {
    fn service_name(&self) -> &str {
        SERVICE
    }

    fn options(&self) -> ServiceOptions {
        self.options.clone()
    }

    fn methods() -> Vec<ServiceMethod<Self>> {
        vec![
            ServiceMethod::unary(method("Double", MethodType::Unary), |calc: Arc<Self>, value, _ctx| async move {
                calc.calls.fetch_add(1, Ordering::SeqCst);
                match value {
                    0 => Err(GrpcError::Status(Status::invalid_argument("zero is not allowed"))),
                    value => Ok(value * 2),
                }
            })
            .with_options(
                MethodOptions::new().with_invoking_interceptor(Tag::new("early", Some(1))),
            ),
            // Same name again: ignored in favor of the first registration
            ServiceMethod::unary(method("Double", MethodType::Unary), |_calc, value, _ctx| async move {
                Ok(value * 3)
            }),
            ServiceMethod::unary(method("Explode", MethodType::Unary), |_calc, _value, _ctx| async move {
                Err(GrpcError::application("boom"))
            }),
            ServiceMethod::unary(method("Panic", MethodType::Unary), |_calc, value, _ctx| async move {
                if value > 0 {
                    panic!("kaboom");
                }
                Ok(value)
            }),
            ServiceMethod::unary(method("Guarded", MethodType::Unary), |calc: Arc<Self>, value, _ctx| async move {
                calc.calls.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            })
            .with_options(
                MethodOptions::new()
                    .with_invoking_interceptor(Tag::failing("guard", Code::PermissionDenied)),
            ),
            ServiceMethod::unary(method("Hidden", MethodType::Unary), |_calc, value, _ctx| async move {
                Ok(value)
            })
            .ignored(),
            ServiceMethod::unary(
                method("Misdeclared", MethodType::ClientStreaming),
                |_calc, value, _ctx| async move { Ok(value) },
            ),
            ServiceMethod::unary(method("Odd", MethodType::Unary), |_calc, value, _ctx| async move {
                Ok(value)
            })
            .with_signature(MethodSignature::new(
                vec![grpckit_server::ParameterKind::Other("u32".into())],
                grpckit_server::ReturnKind::Unit,
            )),
            ServiceMethod::client_streaming(
                method("Sum", MethodType::ClientStreaming),
                |_calc, mut requests, _ctx| async move {
                    let mut total = 0;
                    while let Some(value) = requests.message().await? {
                        total += value;
                    }
                    Ok(total)
                },
            )
            .with_options(MethodOptions::new().with_performance_notify(true)),
            ServiceMethod::server_streaming(
                method("Count", MethodType::ServerStreaming),
                |_calc, count, responses, ctx| async move {
                    for value in 1..=count {
                        if ctx.is_cancelled() {
                            ctx.set_status(Status::cancelled("canceled by user."));
                            return Ok(());
                        }
                        responses.write(&value).await?;
                    }
                    Ok(())
                },
            ),
            ServiceMethod::server_streaming(
                method("Ticker", MethodType::ServerStreaming),
                |calc: Arc<Self>, _start, responses, ctx| async move {
                    let mut tick = 0;
                    loop {
                        tokio::select! {
                            biased;
                            _ = ctx.cancellation_token().cancelled() => {
                                calc.saw_cancellation.store(true, Ordering::SeqCst);
                                ctx.set_status(Status::cancelled("canceled by user."));
                                return Ok(());
                            }
                            _ = tokio::time::sleep(Duration::from_millis(5)) => {}
                        }
                        tick += 1;
                        responses.write(&tick).await?;
                    }
                },
            ),
            ServiceMethod::duplex_streaming(
                method("Echo", MethodType::DuplexStreaming),
                |_calc, mut requests, responses, _ctx| async move {
                    while let Some(value) = requests.message().await? {
                        responses.write(&value).await?;
                    }
                    Ok(())
                },
            ),
        ]
    }
}

/// Build the calculator and an invoker talking to it in process
pub fn serve(
    settings: GrpcServiceBuilderSettings,
    options: ServiceOptions,
) -> (GrpcCallInvoker, Arc<Calculator>) {
    let calculator = Arc::new(Calculator::new(options));
    let definition = GrpcServiceBuilder::new(settings).build_shared(calculator.clone());
    let channel = Arc::new(LocalChannel::new().with_service(definition));
    let client = GrpcClientSettings::new().with_registry(Arc::new(CallStateRegistry::new()));
    (GrpcCallInvoker::with_settings(channel, client), calculator)
}

// ============================================================================
// OBSERVERS
// ============================================================================

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

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl PerformanceListener for EventRecorder {
    fn on_event(&self, event: &PerformanceEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[derive(Default)]
pub struct ServerExceptions {
    seen: Mutex<Vec<(String, Code, String)>>,
}

impl ServerExceptions {
    /// `(full method name, code, message)` per reported failure
    pub fn seen(&self) -> Vec<(String, Code, String)> {
        self.seen.lock().unwrap().clone()
    }
}

impl ExceptionListener for ServerExceptions {
    fn on_server_exception(&self, context: &ServerCallContext, error: &GrpcError) {
        let status = error.actual_status().cloned().unwrap_or_else(|| Status::unknown(""));
        self.seen.lock().unwrap().push((
            context.method().full_name().to_string(),
            status.code(),
            status.message().to_string(),
        ));
    }
}
