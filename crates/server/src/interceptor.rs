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
//! # Server Interceptors
//!
//! ## Purpose
//! Phase-specific extensions of the shared [`Interceptor`] contract for service methods:
//! - [`ServerMethodInvokingInterceptor`]: runs before the method body
//! - [`ServerMethodInvokedInterceptor`]: runs after the method body returned successfully
//! - [`ServerMethodExceptionHandler`]: may replace the error of a failed method
//!
//! ## Scopes
//! Interceptors are registered globally (builder settings), per service and per method. The
//! pipeline merges the three scopes and sorts them by priority before every call.

use async_trait::async_trait;
use grpckit_common::{GrpcError, Interceptor, InterceptorError, ServerCallContext};

/// Runs before the method body
#[async_trait]
pub trait ServerMethodInvokingInterceptor: Interceptor {
    /// Inspect the call; `Err` fails it with an interceptor error
    async fn on_invoking(&self, context: &ServerCallContext) -> Result<(), InterceptorError>;
}

/// Runs after the method body returned successfully
#[async_trait]
pub trait ServerMethodInvokedInterceptor: Interceptor {
    /// Inspect the call; `Err` fails it with an interceptor error
    async fn on_invoked(&self, context: &ServerCallContext) -> Result<(), InterceptorError>;
}

/// Replaces the error of a failed method
pub trait ServerMethodExceptionHandler: Interceptor {
    /// Return a replacement, or `None` to leave the error to the next handler
    fn replace_exception(
        &self,
        context: &ServerCallContext,
        error: &GrpcError,
    ) -> Option<GrpcError>;
}

/// Exception handler surfacing the status wrapped inside a method or interceptor failure
///
/// Without it, any failure that is not directly a status reaches the caller as `Internal`.
#[derive(Debug, Clone)]
pub struct WrappedStatusHandler {
    priority: Option<i32>,
}

impl WrappedStatusHandler {
    /// Handler running after every prioritized handler
    pub fn new() -> Self {
        Self { priority: None }
    }

    /// Handler with an explicit priority
    pub fn with_priority(priority: i32) -> Self {
        Self {
            priority: Some(priority),
        }
    }
}

impl Default for WrappedStatusHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor for WrappedStatusHandler {
    fn name(&self) -> &str {
        "wrapped-status"
    }

    fn priority(&self) -> Option<i32> {
        self.priority
    }
}

impl ServerMethodExceptionHandler for WrappedStatusHandler {
    fn replace_exception(&self, _context: &ServerCallContext, error: &GrpcError) -> Option<GrpcError> {
        if error.is_status() {
            return None;
        }
        error.actual_status().cloned().map(GrpcError::Status)
    }
}
