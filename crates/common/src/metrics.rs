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

//! # Prometheus Metrics Listener
//!
//! ## Purpose
//! Turns performance events into Prometheus metrics so both the client invoker and the server
//! service builder can be scraped the same way.
//!
//! ## Metrics
//! - `grpckit_method_started_total` - Calls started (`MethodCalling`)
//! - `grpckit_method_handled_total` - Calls finished, success or failure (`MethodCalled`)
//! - `grpckit_method_handling_seconds` - Call latency histogram
//! - `grpckit_stream_messages_total` - Stream messages written or read
//! - `grpckit_message_bytes` - Serialized payload sizes
//! - `grpckit_interceptor_seconds` - Interceptor latency histogram
//!
//! Every metric carries `side`, `service` and `method` labels.

use lazy_static::lazy_static;
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};

use crate::telemetry::{PerformanceEvent, PerformanceEventKind, PerformanceListener};

lazy_static! {
    /// Global Prometheus registry for GrpcKit metrics
    pub static ref GRPCKIT_METRICS_REGISTRY: Registry = Registry::new();

    /// Total calls started
    pub static ref METHOD_STARTED: CounterVec = {
        let opts = Opts::new(
            "grpckit_method_started_total",
            "Total number of RPCs started",
        );
        let counter = CounterVec::new(opts, &["side", "service", "method"]).unwrap();
        GRPCKIT_METRICS_REGISTRY.register(Box::new(counter.clone())).unwrap();
        counter
    };

    /// Total calls handled
    pub static ref METHOD_HANDLED: CounterVec = {
        let opts = Opts::new(
            "grpckit_method_handled_total",
            "Total number of RPCs completed, regardless of success or failure",
        );
        let counter = CounterVec::new(opts, &["side", "service", "method"]).unwrap();
        GRPCKIT_METRICS_REGISTRY.register(Box::new(counter.clone())).unwrap();
        counter
    };

    /// Call latency histogram
    pub static ref METHOD_HANDLING_SECONDS: HistogramVec = {
        let opts = HistogramOpts::new(
            "grpckit_method_handling_seconds",
            "Histogram of RPC latency (seconds) measured around the underlying call",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]);
        let histogram = HistogramVec::new(opts, &["side", "service", "method"]).unwrap();
        GRPCKIT_METRICS_REGISTRY.register(Box::new(histogram.clone())).unwrap();
        histogram
    };

    /// Stream messages written or read
    pub static ref STREAM_MESSAGES: CounterVec = {
        let opts = Opts::new(
            "grpckit_stream_messages_total",
            "Total number of stream messages by direction",
        );
        let counter = CounterVec::new(opts, &["side", "service", "method", "kind"]).unwrap();
        GRPCKIT_METRICS_REGISTRY.register(Box::new(counter.clone())).unwrap();
        counter
    };

    /// Serialized payload sizes
    pub static ref MESSAGE_BYTES: HistogramVec = {
        let opts = HistogramOpts::new(
            "grpckit_message_bytes",
            "Histogram of serialized and deserialized payload sizes in bytes",
        )
        .buckets(vec![64.0, 256.0, 1024.0, 4096.0, 16384.0, 65536.0, 262144.0, 1048576.0]);
        let histogram = HistogramVec::new(opts, &["side", "service", "method", "kind"]).unwrap();
        GRPCKIT_METRICS_REGISTRY.register(Box::new(histogram.clone())).unwrap();
        histogram
    };

    /// Interceptor latency histogram
    pub static ref INTERCEPTOR_SECONDS: HistogramVec = {
        let opts = HistogramOpts::new(
            "grpckit_interceptor_seconds",
            "Histogram of interceptor execution time (seconds)",
        )
        .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]);
        let histogram =
            HistogramVec::new(opts, &["side", "service", "method", "interceptor"]).unwrap();
        GRPCKIT_METRICS_REGISTRY.register(Box::new(histogram.clone())).unwrap();
        histogram
    };
}

/// Metrics export failure
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Text encoding failed
    #[error("Failed to encode metrics: {0}")]
    Encode(String),
}

/// Performance listener recording Prometheus metrics
///
/// ## Design
/// - Stateless: all series live on [`GRPCKIT_METRICS_REGISTRY`]
/// - Events without the needed payload (elapsed time, byte size) are ignored
#[derive(Debug, Clone, Default)]
pub struct MetricsListener;

impl MetricsListener {
    /// Create a listener on the global registry
    pub fn new() -> Self {
        Self
    }

    /// Export metrics in Prometheus text format
    ///
    /// ## Returns
    /// String in Prometheus exposition format
    ///
    /// ## Example Output
    /// ```text
    /// # HELP grpckit_method_started_total Total number of RPCs started
    /// # TYPE grpckit_method_started_total counter
    /// grpckit_method_started_total{method="SearchTeam",service="PlayerSearch",side="client"} 3
    /// ```
    pub fn export_metrics(&self) -> Result<String, MetricsError> {
        export_metrics()
    }
}

/// Export the global registry in Prometheus text format
pub fn export_metrics() -> Result<String, MetricsError> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = GRPCKIT_METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| MetricsError::Encode(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| MetricsError::Encode(e.to_string()))
}

impl PerformanceListener for MetricsListener {
    fn on_event(&self, event: &PerformanceEvent) {
        let side = event.side.as_str();
        let labels = [side, event.service.as_str(), event.method.as_str()];
        match event.kind {
            PerformanceEventKind::MethodCalling => {
                METHOD_STARTED.with_label_values(&labels).inc();
            }
            PerformanceEventKind::MethodCalled => {
                METHOD_HANDLED.with_label_values(&labels).inc();
                if let Some(elapsed) = event.elapsed {
                    METHOD_HANDLING_SECONDS
                        .with_label_values(&labels)
                        .observe(elapsed.as_secs_f64());
                }
            }
            PerformanceEventKind::MethodIntercepted => {
                if let (Some(elapsed), Some(interceptor)) = (event.elapsed, &event.interceptor) {
                    INTERCEPTOR_SECONDS
                        .with_label_values(&[side, &event.service, &event.method, interceptor])
                        .observe(elapsed.as_secs_f64());
                }
            }
            PerformanceEventKind::RequestWrote
            | PerformanceEventKind::ResponseRead
            | PerformanceEventKind::RequestRead
            | PerformanceEventKind::ResponseWrote => {
                STREAM_MESSAGES
                    .with_label_values(&[side, &event.service, &event.method, event.kind.as_str()])
                    .inc();
            }
            PerformanceEventKind::Serialized | PerformanceEventKind::Deserialized => {
                if let Some(size) = event.byte_size {
                    MESSAGE_BYTES
                        .with_label_values(&[side, &event.service, &event.method, event.kind.as_str()])
                        .observe(size as f64);
                }
            }
            PerformanceEventKind::RequestWriting
            | PerformanceEventKind::ResponseReading
            | PerformanceEventKind::RequestReading
            | PerformanceEventKind::ResponseWriting => {}
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::{MethodInfo, MethodType};
    use crate::telemetry::CallSide;
    use std::time::Duration;

    fn method(service: &str) -> MethodInfo {
        MethodInfo::new(MethodType::Unary, service, "Lookup", "Req", "Resp")
    }

    #[test]
    fn test_started_and_handled_are_counted() {
        let listener = MetricsListener::new();
        let info = method("MetricsCountService");
        listener.on_event(&PerformanceEvent::new(
            PerformanceEventKind::MethodCalling,
            CallSide::Client,
            &info,
            None,
        ));
        listener.on_event(
            &PerformanceEvent::new(PerformanceEventKind::MethodCalled, CallSide::Client, &info, None)
                .with_elapsed(Duration::from_millis(3)),
        );

        let started = METHOD_STARTED
            .with_label_values(&["client", "MetricsCountService", "Lookup"])
            .get();
        assert_eq!(started, 1.0);
        let handled = METHOD_HANDLING_SECONDS
            .with_label_values(&["client", "MetricsCountService", "Lookup"])
            .get_sample_count();
        assert_eq!(handled, 1);
    }

    #[test]
    fn test_export_contains_interceptor_series() {
        let listener = MetricsListener::new();
        let info = method("MetricsExportService");
        listener.on_event(
            &PerformanceEvent::new(
                PerformanceEventKind::MethodIntercepted,
                CallSide::Server,
                &info,
                None,
            )
            .with_interceptor("auth")
            .with_elapsed(Duration::from_micros(250)),
        );
        let text = listener.export_metrics().unwrap();
        assert!(text.contains("grpckit_interceptor_seconds"));
        assert!(text.contains("MetricsExportService"));
    }

    #[test]
    fn test_events_without_payload_are_ignored() {
        let listener = MetricsListener::new();
        let info = method("MetricsIgnoredService");
        listener.on_event(&PerformanceEvent::new(
            PerformanceEventKind::Serialized,
            CallSide::Client,
            &info,
            None,
        ));
        let count = MESSAGE_BYTES
            .with_label_values(&["client", "MetricsIgnoredService", "Lookup", "serialized"])
            .get_sample_count();
        assert_eq!(count, 0);
    }
}
