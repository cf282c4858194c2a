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

//! # GrpcKit Common
//!
//! ## Purpose
//! Contracts shared by the client invoker, the server service builder and the HTTP gateway.
//!
//! ## Contents
//! - **Interceptors**: the named, prioritized `Interceptor` contract and its ordering rule
//! - **Telemetry**: performance and exception observers with a best-effort dispatch contract
//! - **Metrics**: Prometheus listener fed by performance events
//! - **Errors**: `GrpcError` taxonomy bridging to `tonic::Status`
//! - **Metadata**: ordered, case-normalized headers and per-call options
//! - **Methods**: method descriptors and pluggable marshallers
//! - **Codecs**: marshallers instrumented with size/timing events and serializer errors
//! - **RPC boundary**: the call primitives consumed by the client (`Channel`) and the
//!   handler table exposed by the server (`ServiceDefinition`)
//! - **Local transport**: an in-process `Channel` dispatching straight to service definitions
//!
//! ## Design Principles
//! 1. **Transport-agnostic**: everything above `rpc` works against raw bytes and status codes
//! 2. **Observable**: every layer reports through the same notifiers
//! 3. **Telemetry never breaks calls**: observer failures are logged and dropped

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod heartbeat;
pub mod interceptor;
pub mod local;
pub mod metadata;
pub mod method;
pub mod metrics;
pub mod rpc;
pub mod telemetry;

pub use codec::{MessageCodec, MethodCodec};
pub use error::{BoxError, GrpcError, InterceptorError, MarshalError};
pub use interceptor::{merge_sorted, sort_by_priority, Interceptor};
pub use local::LocalChannel;
pub use metadata::{CallOptions, Metadata, MetadataValue};
pub use method::{Marshaller, Method, MethodInfo, MethodType};
pub use metrics::{MetricsError, MetricsListener};
pub use rpc::{
    CallCompletion, Channel, RawCall, RawRequestSink, RawRequestStream, RawResponse,
    RawResponseSender, ServerCallContext, ServerCallHandler, ServerMethodDefinition,
    ServiceDefinition,
};
pub use telemetry::{
    CallSide, ExceptionListener, ExceptionNotifier, PerformanceEvent, PerformanceEventKind,
    PerformanceListener, PerformanceNotifier, TracingPerformanceListener,
};

/// Result type for operations that fail with a [`GrpcError`]
pub type Result<T> = std::result::Result<T, GrpcError>;
