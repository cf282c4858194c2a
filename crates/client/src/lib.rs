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

//! # GrpcKit Client
//!
//! ## Purpose
//! Instrumented client side of GrpcKit: every call made through [`GrpcCallInvoker`] runs
//! interceptors, reports performance events and routes failures through exception handlers.
//!
//! ## Components
//! - [`GrpcCallInvoker`]: the call pipeline over a transport [`Channel`](grpckit_common::Channel)
//! - [`CallStateRegistry`]: process-wide store of streaming call state
//! - Call wrappers ([`UnaryCall`], [`ClientStreamingCall`], [`ServerStreamingCall`],
//!   [`DuplexStreamingCall`]) with instrumented stream proxies
//! - [`GrpcResult`]: uniform outcome produced by the streaming extensions
//! - [`StreamingObservable`]: push-style consumption of response streams
//! - [`HeartbeatClient`]: keep-alive loop over the heartbeat method
//!
//! ## Example
//! ```rust,ignore
//! let invoker = GrpcCallInvoker::with_settings(channel, GrpcClientSettings::new()
//!     .with_performance_listener(Arc::new(MetricsListener)));
//! let mut call = invoker.duplex_streaming(&method, None, CallOptions::new()).await?;
//! let result = call.write_read_all(requests).await;
//! assert!(result.is_ok());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod call;
pub mod heartbeat;
pub mod interceptor;
pub mod invoker;
pub mod observable;
pub mod registry;
pub mod result;
pub mod settings;
pub mod streaming;

pub use call::{
    AsyncCallState, ClientStreamingCall, DuplexStreamingCall, RequestStreamWriter,
    ResponseStreamReader, ServerStreamingCall, SharedCallState, UnaryCall,
};
pub use heartbeat::HeartbeatClient;
pub use interceptor::{
    ClientInvocation, ClientMethodExceptionHandler, ClientMethodInvokedInterceptor,
    ClientMethodInvokingInterceptor,
};
pub use invoker::GrpcCallInvoker;
pub use observable::{FnObserver, ResponseObserver, ResponseSource, StreamingObservable, Subscription};
pub use registry::{global_registry, CallHandle, CallState, CallStateRegistry, RegistryError};
pub use result::GrpcResult;
pub use settings::GrpcClientSettings;
