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

//! Tests for the client call pipeline: interceptor ordering, telemetry, exception handling
//! and call-state registration.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use common::{invoker, method, EventRecorder, ExceptionCounter};
use grpckit_client::{
    ClientInvocation, ClientMethodExceptionHandler, ClientMethodInvokedInterceptor,
    ClientMethodInvokingInterceptor, GrpcClientSettings,
};
use grpckit_common::{
    CallOptions, GrpcError, Interceptor, InterceptorError, MethodType, PerformanceEventKind,
};
use tonic::{Code, Status};

struct Named {
    name: &'static str,
    priority: Option<i32>,
    reject: bool,
    runs: AtomicUsize,
}

impl Named {
    fn new(name: &'static str, priority: Option<i32>) -> Arc<Self> {
        Arc::new(Self {
            name,
            priority,
            reject: false,
            runs: AtomicUsize::new(0),
        })
    }

    fn rejecting(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            priority: None,
            reject: true,
            runs: AtomicUsize::new(0),
        })
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    fn run(&self) -> Result<(), InterceptorError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if self.reject {
            Err(InterceptorError::Rejected(format!("{} said no", self.name)))
        } else {
            Ok(())
        }
    }
}

impl Interceptor for Named {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> Option<i32> {
        self.priority
    }
}

#[async_trait]
impl ClientMethodInvokingInterceptor for Named {
    async fn on_invoking(&self, _invocation: &ClientInvocation<'_>) -> Result<(), InterceptorError> {
        self.run()
    }
}

#[async_trait]
impl ClientMethodInvokedInterceptor for Named {
    async fn on_invoked(&self, _invocation: &ClientInvocation<'_>) -> Result<(), InterceptorError> {
        self.run()
    }
}

struct Replace {
    name: &'static str,
    replacement: Option<Code>,
}

impl Interceptor for Replace {
    fn name(&self) -> &str {
        self.name
    }
}

impl ClientMethodExceptionHandler for Replace {
    fn replace_exception(
        &self,
        _invocation: &ClientInvocation<'_>,
        _error: &GrpcError,
    ) -> Option<GrpcError> {
        self.replacement
            .map(|code| GrpcError::Status(Status::new(code, format!("replaced by {}", self.name))))
    }
}

struct Panicky;

impl Interceptor for Panicky {
    fn name(&self) -> &str {
        "panicky"
    }
}

impl ClientMethodExceptionHandler for Panicky {
    fn replace_exception(
        &self,
        _invocation: &ClientInvocation<'_>,
        _error: &GrpcError,
    ) -> Option<GrpcError> {
        panic!("handler blew up")
    }
}

#[tokio::test]
async fn test_unary_call_runs_pipeline_in_order() {
    let recorder = Arc::new(EventRecorder::default());
    let audit = Named::new("audit", None);
    let auth = Named::new("auth", Some(1));
    let after = Named::new("after", Some(5));
    let settings = GrpcClientSettings::new()
        .with_invoking_interceptor(audit.clone())
        .with_invoking_interceptor(auth.clone())
        .with_invoked_interceptor(after.clone())
        .with_performance_listener(recorder.clone());
    let (invoker, _registry) = invoker(settings);

    let doubled = invoker
        .unary_call(&method("Double", MethodType::Unary), None, CallOptions::new(), &21)
        .await
        .unwrap();

    assert_eq!(doubled, 42);
    assert_eq!(
        recorder.kinds(),
        vec![
            PerformanceEventKind::MethodCalling,
            PerformanceEventKind::MethodIntercepted,
            PerformanceEventKind::MethodIntercepted,
            PerformanceEventKind::Serialized,
            PerformanceEventKind::MethodCalled,
            PerformanceEventKind::MethodIntercepted,
            PerformanceEventKind::Deserialized,
        ]
    );
    assert_eq!(recorder.interceptors(), vec!["auth", "audit", "after"]);
    assert!(recorder
        .events()
        .iter()
        .filter(|event| event.kind == PerformanceEventKind::MethodIntercepted)
        .all(|event| event.elapsed.is_some()));
    assert_eq!((audit.runs(), auth.runs(), after.runs()), (1, 1, 1));
}

#[tokio::test]
async fn test_invoking_interceptor_failure_aborts_call() {
    let recorder = Arc::new(EventRecorder::default());
    let exceptions = Arc::new(ExceptionCounter::default());
    let gate = Named::rejecting("gate");
    let after = Named::new("after", None);
    let settings = GrpcClientSettings::new()
        .with_invoking_interceptor(gate.clone())
        .with_invoked_interceptor(after.clone())
        .with_performance_listener(recorder.clone())
        .with_exception_listener(exceptions.clone());
    let (invoker, _registry) = invoker(settings);

    let error = invoker
        .unary_call(&method("Double", MethodType::Unary), None, CallOptions::new(), &3)
        .await
        .unwrap_err();

    match &error {
        GrpcError::Interceptor {
            method,
            interceptor,
            source: InterceptorError::Rejected(reason),
        } => {
            assert_eq!(method, "/Calc/Double");
            assert_eq!(interceptor, "gate");
            assert_eq!(reason, "gate said no");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(error.code(), Code::Unknown);
    assert_eq!(
        recorder.kinds(),
        vec![
            PerformanceEventKind::MethodCalling,
            PerformanceEventKind::MethodIntercepted,
        ]
    );
    assert_eq!(after.runs(), 0);
    assert_eq!(exceptions.client_count(), 1);
}

#[tokio::test]
async fn test_first_exception_replacement_wins() {
    let exceptions = Arc::new(ExceptionCounter::default());
    let settings = GrpcClientSettings::new()
        .with_exception_handler(Arc::new(Replace {
            name: "pass",
            replacement: None,
        }))
        .with_exception_handler(Arc::new(Replace {
            name: "mapper",
            replacement: Some(Code::Unavailable),
        }))
        .with_exception_handler(Arc::new(Replace {
            name: "late",
            replacement: Some(Code::DataLoss),
        }))
        .with_exception_listener(exceptions.clone());
    let (invoker, _registry) = invoker(settings);

    let error = invoker
        .unary_call(&method("Double", MethodType::Unary), None, CallOptions::new(), &0)
        .await
        .unwrap_err();

    assert_eq!(error.code(), Code::Unavailable);
    assert_eq!(error.actual_status().unwrap().message(), "replaced by mapper");
    assert_eq!(exceptions.client_count(), 1);
    assert!(exceptions.last().unwrap().contains("zero is not allowed"));
}

#[tokio::test]
async fn test_original_error_kept_without_replacement() {
    let settings = GrpcClientSettings::new().with_exception_handler(Arc::new(Replace {
        name: "pass",
        replacement: None,
    }));
    let (invoker, _registry) = invoker(settings);

    let error = invoker
        .unary_call(&method("Double", MethodType::Unary), None, CallOptions::new(), &0)
        .await
        .unwrap_err();

    assert_eq!(error.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn test_panicking_exception_handler_is_reported_by_name() {
    let settings = GrpcClientSettings::new().with_exception_handler(Arc::new(Panicky));
    let (invoker, _registry) = invoker(settings);

    let error = invoker
        .unary_call(&method("Double", MethodType::Unary), None, CallOptions::new(), &0)
        .await
        .unwrap_err();

    match error {
        GrpcError::Interceptor {
            interceptor,
            source: InterceptorError::Panicked(message),
            ..
        } => {
            assert_eq!(interceptor, "panicky");
            assert!(message.contains("handler blew up"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_only_streaming_calls_are_registered() {
    let (invoker, registry) = invoker(GrpcClientSettings::new());

    let mut unary = invoker
        .unary(&method("Double", MethodType::Unary), None, CallOptions::new(), &4)
        .await
        .unwrap();
    assert!(registry.is_empty());
    assert_eq!(unary.response().await.unwrap(), 8);

    let call = invoker
        .duplex_streaming(&method("Echo", MethodType::DuplexStreaming), None, CallOptions::new())
        .await
        .unwrap();
    assert_eq!(registry.len(), 1);
    assert!(registry.contains(call.handle()));

    let handle = call.handle();
    drop(call);
    assert!(registry.is_empty());
    assert!(!registry.contains(handle));
}

#[tokio::test]
async fn test_failed_duplex_call_is_deregistered() {
    let (invoker, registry) = invoker(GrpcClientSettings::new());
    assert!(Arc::ptr_eq(invoker.registry(), &registry));

    let mut call = invoker
        .duplex_streaming(&method("Fail", MethodType::DuplexStreaming), None, CallOptions::new())
        .await
        .unwrap();
    let handle = call.handle();
    assert!(registry.contains(handle));

    let result = call.write_read_all(vec![1, 2]).await;
    assert_eq!(result.status_code(), Some(Code::PermissionDenied));
    assert!(registry.contains(handle));

    drop(result);
    drop(call);
    assert!(invoker.registry().is_empty());
    assert!(!registry.contains(handle));
}

#[tokio::test]
async fn test_wrong_call_shape_is_rejected() {
    let (invoker, registry) = invoker(GrpcClientSettings::new());

    let error = invoker
        .unary(&method("Count", MethodType::ServerStreaming), None, CallOptions::new(), &1)
        .await
        .err()
        .unwrap();

    assert_eq!(error.code(), Code::Internal);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_unknown_method_surfaces_unimplemented() {
    let (invoker, _registry) = invoker(GrpcClientSettings::new());

    let error = invoker
        .unary_call(&method("Missing", MethodType::Unary), None, CallOptions::new(), &1)
        .await
        .unwrap_err();

    assert_eq!(error.code(), Code::Unimplemented);
}

#[tokio::test]
async fn test_codec_is_reused_per_method() {
    let recorder = Arc::new(EventRecorder::default());
    let (invoker, _registry) =
        invoker(GrpcClientSettings::new().with_performance_listener(recorder.clone()));
    let double = method("Double", MethodType::Unary);

    for value in 1..=3u32 {
        let doubled = invoker
            .unary_call(&double, Some("calc.local"), CallOptions::new(), &value)
            .await
            .unwrap();
        assert_eq!(doubled, value * 2);
    }

    let serialized: Vec<_> = recorder
        .events()
        .into_iter()
        .filter(|event| event.kind == PerformanceEventKind::Serialized)
        .collect();
    assert_eq!(serialized.len(), 3);
    assert!(serialized
        .iter()
        .all(|event| event.host.as_deref() == Some("calc.local") && event.byte_size == Some(1)));
}
