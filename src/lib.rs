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
//! # GrpcKit
//!
//! Middleware around gRPC call primitives:
//! - Client and server interceptors ordered by priority
//! - Performance and exception telemetry through observer lists, with a Prometheus listener
//! - Call-state tracking and a result wrapper classifying ok, cancelled and failed calls
//! - Streaming helpers and observable response streams
//! - Method classification and a service builder wrapping handlers in an instrumented pipeline
//! - An HTTP JSON gateway as a tower layer
//!
//! This crate re-exports the member crates; see each crate for details.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub use grpckit_client as client;
pub use grpckit_common as common;
pub use grpckit_gateway as gateway;
pub use grpckit_sample as sample;
pub use grpckit_server as server;

pub use client::{GrpcCallInvoker, GrpcClientSettings, GrpcResult};
pub use common::{CallOptions, GrpcError, LocalChannel, Metadata, Method, MethodType};
pub use gateway::{Gateway, GatewayLayer, GatewayMethod, GatewaySettings};
pub use server::{GrpcService, GrpcServiceBuilder, GrpcServiceBuilderSettings, ServiceMethod};
