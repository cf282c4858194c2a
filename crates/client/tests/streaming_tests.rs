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

//! Tests for the streaming extensions, the result wrapper over live calls and observable
//! response streams.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{invoker, method, EventRecorder, ExceptionCounter};
use futures::stream::{self, StreamExt};
use grpckit_client::{FnObserver, GrpcClientSettings, StreamingObservable};
use grpckit_common::{CallOptions, MethodType, PerformanceEventKind};
use tonic::Code;

#[tokio::test]
async fn test_write_all_and_complete_returns_response() {
    let (invoker, registry) = invoker(GrpcClientSettings::new());
    let mut call = invoker
        .client_streaming(&method("Sum", MethodType::ClientStreaming), None, CallOptions::new())
        .await
        .unwrap();
    let handle = call.handle();

    let result = call.write_all_and_complete(vec![1, 2, 3]).await;

    assert!(result.is_ok());
    assert_eq!(result.response(), Some(&6));
    assert_eq!(result.status_code(), Some(Code::Ok));
    assert!(registry.lookup(handle).unwrap().is_request_stream_completed());
    drop(call);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_write_all_and_complete_with_converter_and_stream() {
    let (invoker, _registry) = invoker(GrpcClientSettings::new());
    let sum = method("Sum", MethodType::ClientStreaming);

    let mut call = invoker
        .client_streaming(&sum, None, CallOptions::new())
        .await
        .unwrap();
    let result = call
        .write_all_and_complete_with(vec![4, 5], |total| format!("total={}", total))
        .await;
    assert_eq!(result.into_response().as_deref(), Some("total=9"));

    let mut call = invoker
        .client_streaming(&sum, None, CallOptions::new())
        .await
        .unwrap();
    let produced = stream::iter(1..=4u32);
    let result = call.write_all_and_complete_stream(produced).await;
    assert_eq!(result.into_result().unwrap(), 10);
}

#[tokio::test]
async fn test_partial_writes_then_explicit_completion() {
    let (invoker, _registry) = invoker(GrpcClientSettings::new());
    let mut call = invoker
        .client_streaming(&method("Sum", MethodType::ClientStreaming), None, CallOptions::new())
        .await
        .unwrap();

    assert!(!call.write(&7).await.is_error());
    assert!(!call.write_with(|| 8).await.is_error());
    assert!(!call.write_async(async { 9 }).await.is_error());
    let written = call.write_all(vec![10]).await;
    assert!(!written.can_get_status());
    assert!(!written.is_ok());

    let completed = call.complete_request().await;
    assert!(!completed.is_error());
    let result = call.response_result().await;
    assert_eq!(result.response(), Some(&34));
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_server_failure_becomes_error_result() {
    let exceptions = Arc::new(ExceptionCounter::default());
    let (invoker, _registry) =
        invoker(GrpcClientSettings::new().with_exception_listener(exceptions.clone()));
    let mut call = invoker
        .client_streaming(&method("Reject", MethodType::ClientStreaming), None, CallOptions::new())
        .await
        .unwrap();

    let result = call.write_all_and_complete(Vec::new()).await;

    assert!(result.is_error());
    assert!(!result.is_cancelled());
    assert!(result.can_get_status());
    assert!(!result.can_get_trailers());
    assert_eq!(result.status_code(), Some(Code::ResourceExhausted));
    assert_eq!(result.status_detail().as_deref(), Some("quota exceeded"));
    assert_eq!(exceptions.client_count(), 1);
}

#[tokio::test]
async fn test_failed_write_skips_request_completion() {
    let exceptions = Arc::new(ExceptionCounter::default());
    let (invoker, registry) =
        invoker(GrpcClientSettings::new().with_exception_listener(exceptions.clone()));
    let mut call = invoker
        .client_streaming(&method("TakeOne", MethodType::ClientStreaming), None, CallOptions::new())
        .await
        .unwrap();
    let handle = call.handle();
    let requests = stream::iter(vec![1u32]).chain(stream::once(async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        2
    }));

    let result = call.write_all_and_complete_stream(requests).await;

    assert!(result.is_error());
    assert_eq!(result.status_code(), Some(Code::Aborted));
    assert_eq!(exceptions.client_count(), 1);
    assert!(!registry.lookup(handle).unwrap().is_request_stream_completed());
    drop(call);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_read_all_and_for_each() {
    let recorder = Arc::new(EventRecorder::default());
    let (invoker, _registry) =
        invoker(GrpcClientSettings::new().with_performance_listener(recorder.clone()));
    let count = method("Count", MethodType::ServerStreaming);

    let mut call = invoker
        .server_streaming(&count, None, CallOptions::new(), &4)
        .await
        .unwrap();
    let result = call.read_all().await;
    assert!(result.is_ok());
    assert_eq!(result.response(), Some(&vec![1, 2, 3, 4]));
    let reads = recorder
        .kinds()
        .into_iter()
        .filter(|kind| *kind == PerformanceEventKind::ResponseRead)
        .count();
    assert_eq!(reads, 5);

    let mut call = invoker
        .server_streaming(&count, None, CallOptions::new(), &3)
        .await
        .unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let result = call.for_each(|value| sink.lock().unwrap().push(value)).await;
    assert!(result.is_ok());
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);

    let mut call = invoker
        .server_streaming(&count, None, CallOptions::new(), &2)
        .await
        .unwrap();
    let result = call.read_all_with(|value| value * 100).await;
    assert_eq!(result.into_response(), Some(vec![100, 200]));
}

#[tokio::test]
async fn test_duplex_write_read_all_runs_concurrently() {
    let (invoker, _registry) = invoker(GrpcClientSettings::new());
    let echo = method("Echo", MethodType::DuplexStreaming);

    let mut call = invoker
        .duplex_streaming(&echo, None, CallOptions::new())
        .await
        .unwrap();
    let requests: Vec<u32> = (1..=100).collect();
    let result = call.write_read_all(requests.clone()).await;

    assert!(result.is_ok());
    assert_eq!(result.into_response(), Some(requests));
}

#[tokio::test]
async fn test_duplex_write_and_for_each_async() {
    let (invoker, _registry) = invoker(GrpcClientSettings::new());
    let mut call = invoker
        .duplex_streaming(&method("Echo", MethodType::DuplexStreaming), None, CallOptions::new())
        .await
        .unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    let result = call
        .write_and_for_each_async(vec![3, 1, 2], move |value| {
            let sink = sink.clone();
            async move {
                tokio::task::yield_now().await;
                sink.lock().unwrap().push(value);
            }
        })
        .await;

    assert!(result.is_ok());
    assert_eq!(*seen.lock().unwrap(), vec![3, 1, 2]);
}

#[tokio::test]
async fn test_duplex_failure_propagates_after_both_sides_settle() {
    let exceptions = Arc::new(ExceptionCounter::default());
    let (invoker, _registry) =
        invoker(GrpcClientSettings::new().with_exception_listener(exceptions.clone()));
    let mut call = invoker
        .duplex_streaming(&method("Fail", MethodType::DuplexStreaming), None, CallOptions::new())
        .await
        .unwrap();

    let result = call.write_read_all(vec![1, 2, 3]).await;

    assert!(result.is_error());
    assert_eq!(result.status_code(), Some(Code::PermissionDenied));
    assert_eq!(exceptions.client_count(), 1);
    assert!(call.response_stream().is_ended());
}

#[tokio::test]
async fn test_unary_into_result() {
    let (invoker, _registry) = invoker(GrpcClientSettings::new());
    let double = method("Double", MethodType::Unary);

    let call = invoker
        .unary(&double, None, CallOptions::new(), &5)
        .await
        .unwrap();
    let result = call.into_result_with(|value| value + 1).await;
    assert!(result.is_ok());
    assert_eq!(result.into_response(), Some(11));

    let call = invoker
        .unary(&double, None, CallOptions::new(), &0)
        .await
        .unwrap();
    let result = call.into_result().await;
    assert_eq!(result.status_code(), Some(Code::InvalidArgument));
}

#[tokio::test]
async fn test_observable_delivers_to_current_observers() {
    let (invoker, _registry) = invoker(GrpcClientSettings::new());
    let call = invoker
        .server_streaming(&method("Count", MethodType::ServerStreaming), None, CallOptions::new(), &3)
        .await
        .unwrap();
    let mut observable = StreamingObservable::new(call);

    let kept = Arc::new(Mutex::new(Vec::new()));
    let completed = Arc::new(AtomicBool::new(false));
    let dropped = Arc::new(Mutex::new(Vec::new()));
    let kept_sink = kept.clone();
    let completed_flag = completed.clone();
    let dropped_sink = dropped.clone();

    let _subscription = observable.subscribe(Arc::new(
        FnObserver::new(move |value: &u32| kept_sink.lock().unwrap().push(*value))
            .on_completed(move || completed_flag.store(true, Ordering::SeqCst)),
    ));
    let removed = observable.subscribe(Arc::new(FnObserver::new(move |value: &u32| {
        dropped_sink.lock().unwrap().push(*value)
    })));
    assert_eq!(observable.observer_count(), 2);
    removed.unsubscribe();
    assert_eq!(observable.observer_count(), 1);

    observable.observe().await.unwrap();

    assert_eq!(*kept.lock().unwrap(), vec![1, 2, 3]);
    assert!(dropped.lock().unwrap().is_empty());
    assert!(completed.load(Ordering::SeqCst));
    assert_eq!(observable.observer_count(), 0);
}

#[tokio::test]
async fn test_observable_reports_errors_once() {
    let (invoker, _registry) = invoker(GrpcClientSettings::new());
    let call = invoker
        .duplex_streaming(&method("Fail", MethodType::DuplexStreaming), None, CallOptions::new())
        .await
        .unwrap();
    let mut observable = StreamingObservable::new(call);
    let errors = Arc::new(Mutex::new(Vec::new()));
    let error_sink = errors.clone();
    let _subscription = observable.subscribe(Arc::new(
        FnObserver::new(|_: &u32| {}).on_error(move |error| error_sink.lock().unwrap().push(error.code())),
    ));

    let outcome = observable.write_and_observe(vec![1]).await;

    assert_eq!(outcome.unwrap_err().code(), Code::PermissionDenied);
    assert_eq!(*errors.lock().unwrap(), vec![Code::PermissionDenied]);
    assert_eq!(observable.observer_count(), 0);
}
