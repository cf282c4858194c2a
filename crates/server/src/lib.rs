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
//! # GrpcKit Server
//!
//! ## Purpose
//! Builds instrumented handler tables from plain service implementations.
//!
//! ## Components
//! - [`reflection`]: classification of handler signatures into the four call shapes
//! - [`builder`]: [`GrpcService`] registration and [`GrpcServiceBuilder`]
//! - `handler`: the per-method pipeline (interceptors, timing, exception replacement,
//!   status conversion)
//! - [`stream`]: instrumented request and response streams handed to methods
//! - [`settings`]: global, service and method options
//! - [`heartbeat`]: ping/pong liveness service
//!
//! ## Example
//! ```rust,ignore
//! let settings = GrpcServiceBuilderSettings::new()
//!     .with_invoking_interceptor(Arc::new(AuthInterceptor))
//!     .with_performance_listener(Arc::new(TracingPerformanceListener));
//! let definition = GrpcServiceBuilder::new(settings).build(PlayerSearchService::default());
//! let channel = LocalChannel::new().with_service(definition);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub(crate) mod handler;
pub mod heartbeat;
pub mod interceptor;
pub mod reflection;
pub mod settings;
pub mod stream;

pub use builder::{GrpcService, GrpcServiceBuilder, ServiceMethod};
pub use heartbeat::{heartbeat_service, heartbeat_service_named};
pub use interceptor::{
    ServerMethodExceptionHandler, ServerMethodInvokedInterceptor, ServerMethodInvokingInterceptor,
    WrappedStatusHandler,
};
pub use reflection::{classify, ClassifiedMethod, MethodSignature, ParameterKind, ReturnKind};
pub use settings::{GrpcServiceBuilderSettings, InterceptorScope, MethodOptions, ServiceOptions};
pub use stream::{ServerRequestStream, ServerResponseStream};
