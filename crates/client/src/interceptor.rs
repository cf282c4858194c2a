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

//! # Client Interceptors
//!
//! ## Purpose
//! Phase-specific extensions of the shared [`Interceptor`] contract:
//! - [`ClientMethodInvokingInterceptor`]: runs before the underlying call starts
//! - [`ClientMethodInvokedInterceptor`]: runs after the underlying call was started
//! - [`ClientMethodExceptionHandler`]: may replace the error of a failed call
//!
//! ## Failure Semantics
//! An `Err` from an invoking/invoked interceptor aborts the call with
//! [`GrpcError::Interceptor`] naming the interceptor. Exception handlers run in priority order
//! and the first one returning `Some` wins.

use async_trait::async_trait;
use grpckit_common::{CallOptions, GrpcError, Interceptor, InterceptorError, MethodInfo};

/// What the invoker knows about a call when it consults an interceptor
#[derive(Debug, Clone, Copy)]
pub struct ClientInvocation<'a> {
    /// Target method
    pub method: &'a MethodInfo,
    /// Target host
    pub host: Option<&'a str>,
    /// Options of the call
    pub options: &'a CallOptions,
}

impl<'a> ClientInvocation<'a> {
    /// Bundle the call parameters
    pub fn new(method: &'a MethodInfo, host: Option<&'a str>, options: &'a CallOptions) -> Self {
        Self {
            method,
            host,
            options,
        }
    }
}

/// Runs before the underlying call starts
#[async_trait]
pub trait ClientMethodInvokingInterceptor: Interceptor {
    /// Inspect the call; `Err` aborts it
    async fn on_invoking(&self, invocation: &ClientInvocation<'_>) -> Result<(), InterceptorError>;
}

/// Runs after the underlying call was started
#[async_trait]
pub trait ClientMethodInvokedInterceptor: Interceptor {
    /// Inspect the call; `Err` aborts it
    async fn on_invoked(&self, invocation: &ClientInvocation<'_>) -> Result<(), InterceptorError>;
}

/// Replaces the error of a failed call
pub trait ClientMethodExceptionHandler: Interceptor {
    /// Return a replacement, or `None` to leave the error to the next handler
    fn replace_exception(
        &self,
        invocation: &ClientInvocation<'_>,
        error: &GrpcError,
    ) -> Option<GrpcError>;
}
