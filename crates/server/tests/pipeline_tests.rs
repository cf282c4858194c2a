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
//! Tests for the server method pipeline: interceptor scopes, telemetry, exception
//! replacement, status conversion and stream proxies.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{method, serve, EventRecorder, Replace, ServerExceptions, Tag};
use grpckit_common::{CallOptions, CallSide, MethodType, PerformanceEventKind};
use grpckit_server::{GrpcServiceBuilderSettings, ServiceOptions, WrappedStatusHandler};
use tonic::Code;

// ============================================================================
// STATUS CONVERSION
// ============================================================================

#[tokio::test]
async fn test_unary_round_trip() {
    let (invoker, calc) = serve(GrpcServiceBuilderSettings::new(), ServiceOptions::new());
    let value = invoker
        .unary_call(&method("Double", MethodType::Unary), None, CallOptions::new(), &4)
        .await
        .unwrap();
    assert_eq!(value, 8);
    assert_eq!(calc.calls(), 1);
}

#[tokio::test]
async fn test_method_status_becomes_internal() {
    let exceptions = Arc::new(ServerExceptions::default());
    let settings = GrpcServiceBuilderSettings::new().with_exception_listener(exceptions.clone());
    let (invoker, _calc) = serve(settings, ServiceOptions::new());

    let error = invoker
        .unary_call(&method("Double", MethodType::Unary), None, CallOptions::new(), &0)
        .await
        .unwrap_err();

    assert_eq!(error.code(), Code::Internal);
    let message = error.actual_status().unwrap().message().to_string();
    assert!(message.starts_with("Server method /Calc/Double failed"), "{}", message);
    assert!(message.contains("zero is not allowed"), "{}", message);

    let seen = exceptions.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "/Calc/Double");
    assert_eq!(seen[0].1, Code::Internal);
}

#[tokio::test]
async fn test_wrapped_status_handler_surfaces_method_status() {
    let exceptions = Arc::new(ServerExceptions::default());
    let settings = GrpcServiceBuilderSettings::new()
        .with_exception_handler(Arc::new(WrappedStatusHandler::new()))
        .with_exception_listener(exceptions.clone());
    let (invoker, _calc) = serve(settings, ServiceOptions::new());

    let error = invoker
        .unary_call(&method("Double", MethodType::Unary), None, CallOptions::new(), &0)
        .await
        .unwrap_err();

    assert_eq!(error.code(), Code::InvalidArgument);
    assert_eq!(error.actual_status().unwrap().message(), "zero is not allowed");
    assert_eq!(
        exceptions.seen(),
        vec![(
            "/Calc/Double".to_string(),
            Code::InvalidArgument,
            "zero is not allowed".to_string()
        )]
    );
}

#[tokio::test]
async fn test_application_error_becomes_internal() {
    let exceptions = Arc::new(ServerExceptions::default());
    let settings = GrpcServiceBuilderSettings::new().with_exception_listener(exceptions.clone());
    let (invoker, _calc) = serve(settings, ServiceOptions::new());

    let error = invoker
        .unary_call(&method("Explode", MethodType::Unary), None, CallOptions::new(), &1)
        .await
        .unwrap_err();

    assert_eq!(error.code(), Code::Internal);
    let message = error.actual_status().unwrap().message().to_string();
    assert_eq!(message, "Server method /Calc/Explode failed: boom");
    assert_eq!(exceptions.seen()[0].1, Code::Internal);
}

#[tokio::test]
async fn test_panicking_method_becomes_internal() {
    let (invoker, _calc) = serve(GrpcServiceBuilderSettings::new(), ServiceOptions::new());
    let error = invoker
        .unary_call(&method("Panic", MethodType::Unary), None, CallOptions::new(), &1)
        .await
        .unwrap_err();
    assert_eq!(error.code(), Code::Internal);
    assert!(error.actual_status().unwrap().message().contains("kaboom"));
}

// ============================================================================
// INTERCEPTORS
// ============================================================================

#[tokio::test]
async fn test_interceptor_status_rejects_before_body() {
    let (invoker, calc) = serve(GrpcServiceBuilderSettings::new(), ServiceOptions::new());
    let error = invoker
        .unary_call(&method("Guarded", MethodType::Unary), None, CallOptions::new(), &1)
        .await
        .unwrap_err();
    assert_eq!(error.code(), Code::Internal);
    let message = error.actual_status().unwrap().message().to_string();
    assert!(message.contains("Interceptor 'guard' failed"), "{}", message);
    assert_eq!(calc.calls(), 0);
}

#[tokio::test]
async fn test_invoked_interceptor_failure_after_body() {
    let settings = GrpcServiceBuilderSettings::new().with_invoked_interceptor(Tag::rejecting("audit"));
    let (invoker, calc) = serve(settings, ServiceOptions::new());

    let error = invoker
        .unary_call(&method("Double", MethodType::Unary), None, CallOptions::new(), &4)
        .await
        .unwrap_err();

    assert_eq!(error.code(), Code::Internal);
    let message = error.actual_status().unwrap().message().to_string();
    assert!(message.contains("Interceptor 'audit' failed"), "{}", message);
    assert!(message.contains("audit said no"), "{}", message);
    assert_eq!(calc.calls(), 1);
}

#[tokio::test]
async fn test_scopes_merge_by_priority_and_events_follow_pipeline() {
    let recorder = Arc::new(EventRecorder::default());
    let settings = GrpcServiceBuilderSettings::new()
        .with_invoking_interceptor(Tag::new("global", Some(20)))
        .with_invoked_interceptor(Tag::new("after", None))
        .with_performance_listener(recorder.clone());
    let options = ServiceOptions::new()
        .with_invoking_interceptor(Tag::new("service", None))
        .with_performance_notify(true);
    let (invoker, _calc) = serve(settings, options);

    invoker
        .unary_call(&method("Double", MethodType::Unary), None, CallOptions::new(), &4)
        .await
        .unwrap();

    assert_eq!(
        recorder.kinds(),
        vec![
            PerformanceEventKind::Deserialized,
            PerformanceEventKind::MethodIntercepted,
            PerformanceEventKind::MethodIntercepted,
            PerformanceEventKind::MethodIntercepted,
            PerformanceEventKind::MethodCalling,
            PerformanceEventKind::MethodCalled,
            PerformanceEventKind::MethodIntercepted,
            PerformanceEventKind::Serialized,
        ]
    );
    assert_eq!(recorder.interceptors(), vec!["early", "global", "service", "after"]);
    let events = recorder.events();
    assert!(events.iter().all(|event| event.side == CallSide::Server));
    assert!(events.iter().all(|event| event.method == "Double"));
    let called = events
        .iter()
        .find(|event| event.kind == PerformanceEventKind::MethodCalled)
        .unwrap();
    assert!(called.elapsed.is_some());
}

#[tokio::test]
async fn test_performance_disabled_reports_nothing() {
    let recorder = Arc::new(EventRecorder::default());
    let settings = GrpcServiceBuilderSettings::new().with_performance_listener(recorder.clone());
    let (invoker, _calc) = serve(settings, ServiceOptions::new());

    invoker
        .unary_call(&method("Double", MethodType::Unary), None, CallOptions::new(), &4)
        .await
        .unwrap();
    assert!(recorder.events().is_empty());

    // Sum enables notification at method level
    let mut call = invoker
        .client_streaming(&method("Sum", MethodType::ClientStreaming), None, CallOptions::new())
        .await
        .unwrap();
    assert_eq!(call.write_all_and_complete(vec![1, 2]).await.into_result().unwrap(), 3);

    let kinds = recorder.kinds();
    assert!(kinds.contains(&PerformanceEventKind::MethodCalling));
    assert!(kinds.contains(&PerformanceEventKind::RequestRead));
    assert!(kinds.contains(&PerformanceEventKind::Deserialized));
    assert!(recorder.events().iter().all(|event| event.method == "Sum"));
}

// ============================================================================
// EXCEPTION HANDLERS
// ============================================================================

#[tokio::test]
async fn test_first_replacement_wins() {
    let recorder = Arc::new(EventRecorder::default());
    let exceptions = Arc::new(ServerExceptions::default());
    let settings = GrpcServiceBuilderSettings::new()
        .with_exception_handler(Replace::with("second", Some(2), Code::Aborted))
        .with_exception_handler(Replace::passing("pass"))
        .with_exception_handler(Replace::with("first", Some(1), Code::FailedPrecondition))
        .with_performance_listener(recorder.clone())
        .with_exception_listener(exceptions.clone());
    let options = ServiceOptions::new().with_performance_notify(true);
    let (invoker, _calc) = serve(settings, options);

    let error = invoker
        .unary_call(&method("Double", MethodType::Unary), None, CallOptions::new(), &0)
        .await
        .unwrap_err();

    assert_eq!(error.code(), Code::FailedPrecondition);
    assert_eq!(error.actual_status().unwrap().message(), "replaced by first");
    assert_eq!(recorder.interceptors(), vec!["early", "first"]);
    assert_eq!(exceptions.seen().len(), 1);
    assert_eq!(exceptions.seen()[0].1, Code::FailedPrecondition);
}

#[tokio::test]
async fn test_unclaimed_error_becomes_internal() {
    let settings = GrpcServiceBuilderSettings::new().with_exception_handler(Replace::passing("pass"));
    let (invoker, _calc) = serve(settings, ServiceOptions::new());

    let error = invoker
        .unary_call(&method("Double", MethodType::Unary), None, CallOptions::new(), &0)
        .await
        .unwrap_err();
    assert_eq!(error.code(), Code::Internal);
    assert!(error.actual_status().unwrap().message().contains("zero is not allowed"));
}

#[tokio::test]
async fn test_panicking_handler_is_named_in_internal_status() {
    let settings =
        GrpcServiceBuilderSettings::new().with_exception_handler(Replace::panicking("fragile"));
    let (invoker, _calc) = serve(settings, ServiceOptions::new());

    let error = invoker
        .unary_call(&method("Double", MethodType::Unary), None, CallOptions::new(), &0)
        .await
        .unwrap_err();

    assert_eq!(error.code(), Code::Internal);
    let message = error.actual_status().unwrap().message().to_string();
    assert!(message.contains("Interceptor 'fragile' failed"), "{}", message);
    assert!(message.contains("fragile handler"), "{}", message);
}

// ============================================================================
// STREAMS
// ============================================================================

#[tokio::test]
async fn test_client_streaming_sum() {
    let (invoker, _calc) = serve(GrpcServiceBuilderSettings::new(), ServiceOptions::new());
    let mut call = invoker
        .client_streaming(&method("Sum", MethodType::ClientStreaming), None, CallOptions::new())
        .await
        .unwrap();
    let result = call.write_all_and_complete(1..=10).await;
    assert!(result.is_ok());
    assert_eq!(result.response(), Some(&55));
}

#[tokio::test]
async fn test_server_streaming_count() {
    let recorder = Arc::new(EventRecorder::default());
    let settings = GrpcServiceBuilderSettings::new().with_performance_listener(recorder.clone());
    let options = ServiceOptions::new().with_performance_notify(true);
    let (invoker, _calc) = serve(settings, options);

    let mut call = invoker
        .server_streaming(&method("Count", MethodType::ServerStreaming), None, CallOptions::new(), &5)
        .await
        .unwrap();
    let result = call.read_all().await;

    assert_eq!(result.into_result().unwrap(), vec![1, 2, 3, 4, 5]);
    let kinds = recorder.kinds();
    let wrote = kinds
        .iter()
        .filter(|kind| **kind == PerformanceEventKind::ResponseWrote)
        .count();
    assert_eq!(wrote, 5);
    let writing = kinds
        .iter()
        .filter(|kind| **kind == PerformanceEventKind::ResponseWriting)
        .count();
    assert_eq!(writing, 5);
}

#[tokio::test]
async fn test_duplex_echo() {
    let (invoker, _calc) = serve(GrpcServiceBuilderSettings::new(), ServiceOptions::new());
    let mut call = invoker
        .duplex_streaming(&method("Echo", MethodType::DuplexStreaming), None, CallOptions::new())
        .await
        .unwrap();
    let result = call.write_read_all(1..=50).await;
    assert_eq!(result.into_result().unwrap(), (1..=50).collect::<Vec<u32>>());
}

#[tokio::test]
async fn test_server_loop_observes_cancellation() {
    let (invoker, calc) = serve(GrpcServiceBuilderSettings::new(), ServiceOptions::new());
    let options = CallOptions::new();
    let mut call = invoker
        .server_streaming(&method("Ticker", MethodType::ServerStreaming), None, options.clone(), &0)
        .await
        .unwrap();

    assert_eq!(call.response_stream().message().await.unwrap(), Some(1));
    assert_eq!(call.response_stream().message().await.unwrap(), Some(2));
    options.cancellation_token().cancel();

    let error = call.response_stream().message().await.unwrap_err();
    assert!(error.is_cancelled());

    for _ in 0..100 {
        if calc.saw_cancellation.load(Ordering::SeqCst) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(calc.saw_cancellation.load(Ordering::SeqCst));
}
