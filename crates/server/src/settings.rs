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
//! # Service Builder Settings
//!
//! ## Purpose
//! Configuration consumed by [`GrpcServiceBuilder`](crate::GrpcServiceBuilder) at three scopes:
//! - [`GrpcServiceBuilderSettings`]: global interceptors and observers
//! - [`ServiceOptions`]: interceptors and the performance flag of one service
//! - [`MethodOptions`]: interceptors, the performance flag and the ignore marker of one method
//!
//! ## Performance Flag
//! Performance notification is resolved per method: the method flag wins, then the service
//! flag, then disabled. A disabled method reports no performance events at all, including
//! serializer timings.

use std::fmt;
use std::sync::Arc;

use grpckit_common::{ExceptionListener, ExceptionNotifier, PerformanceListener, PerformanceNotifier};

use crate::interceptor::{
    ServerMethodExceptionHandler, ServerMethodInvokedInterceptor, ServerMethodInvokingInterceptor,
};

// ============================================================================
// INTERCEPTOR SCOPE
// ============================================================================

/// Interceptors registered at one scope
#[derive(Clone, Default)]
pub struct InterceptorScope {
    /// Run before the method body
    pub invoking: Vec<Arc<dyn ServerMethodInvokingInterceptor>>,
    /// Run after the method body
    pub invoked: Vec<Arc<dyn ServerMethodInvokedInterceptor>>,
    /// Consulted when the method fails
    pub exception_handlers: Vec<Arc<dyn ServerMethodExceptionHandler>>,
}

impl fmt::Debug for InterceptorScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorScope")
            .field("invoking", &names(&self.invoking))
            .field("invoked", &names(&self.invoked))
            .field("exception_handlers", &names(&self.exception_handlers))
            .finish()
    }
}

fn names<T>(list: &[Arc<T>]) -> Vec<&str>
where
    T: grpckit_common::Interceptor + ?Sized,
{
    list.iter().map(|interceptor| interceptor.name()).collect()
}

// ============================================================================
// GLOBAL SETTINGS
// ============================================================================

/// Global interceptors and observers applied to every built service
#[derive(Clone, Default)]
pub struct GrpcServiceBuilderSettings {
    /// Interceptors applied to every method
    pub interceptors: InterceptorScope,
    /// Performance observers
    pub performance: PerformanceNotifier,
    /// Exception observers
    pub exceptions: ExceptionNotifier,
}

impl fmt::Debug for GrpcServiceBuilderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrpcServiceBuilderSettings")
            .field("interceptors", &self.interceptors)
            .field("performance", &self.performance)
            .field("exceptions", &self.exceptions)
            .finish()
    }
}

impl GrpcServiceBuilderSettings {
    /// Settings with no interceptors and no observers
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a global before-invoke interceptor
    pub fn with_invoking_interceptor(
        mut self,
        interceptor: Arc<dyn ServerMethodInvokingInterceptor>,
    ) -> Self {
        self.interceptors.invoking.push(interceptor);
        self
    }

    /// Add a global after-invoke interceptor
    pub fn with_invoked_interceptor(
        mut self,
        interceptor: Arc<dyn ServerMethodInvokedInterceptor>,
    ) -> Self {
        self.interceptors.invoked.push(interceptor);
        self
    }

    /// Add a global exception handler
    pub fn with_exception_handler(mut self, handler: Arc<dyn ServerMethodExceptionHandler>) -> Self {
        self.interceptors.exception_handlers.push(handler);
        self
    }

    /// Add a performance observer
    pub fn with_performance_listener(mut self, listener: Arc<dyn PerformanceListener>) -> Self {
        self.performance.add(listener);
        self
    }

    /// Add an exception observer
    pub fn with_exception_listener(mut self, listener: Arc<dyn ExceptionListener>) -> Self {
        self.exceptions.add(listener);
        self
    }
}

// ============================================================================
// SERVICE OPTIONS
// ============================================================================

/// Options declared for a whole service
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    /// Interceptors applied to every method of the service
    pub interceptors: InterceptorScope,
    /// Performance flag used by methods without their own
    pub performance_notify: Option<bool>,
}

impl ServiceOptions {
    /// No interceptors, performance flag unset
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service-level before-invoke interceptor
    pub fn with_invoking_interceptor(
        mut self,
        interceptor: Arc<dyn ServerMethodInvokingInterceptor>,
    ) -> Self {
        self.interceptors.invoking.push(interceptor);
        self
    }

    /// Add a service-level after-invoke interceptor
    pub fn with_invoked_interceptor(
        mut self,
        interceptor: Arc<dyn ServerMethodInvokedInterceptor>,
    ) -> Self {
        self.interceptors.invoked.push(interceptor);
        self
    }

    /// Add a service-level exception handler
    pub fn with_exception_handler(mut self, handler: Arc<dyn ServerMethodExceptionHandler>) -> Self {
        self.interceptors.exception_handlers.push(handler);
        self
    }

    /// Set the service-level performance flag
    pub fn with_performance_notify(mut self, enabled: bool) -> Self {
        self.performance_notify = Some(enabled);
        self
    }
}

// ============================================================================
// METHOD OPTIONS
// ============================================================================

/// Options declared for a single method
#[derive(Debug, Clone, Default)]
pub struct MethodOptions {
    /// Interceptors applied to this method only
    pub interceptors: InterceptorScope,
    /// Performance flag overriding the service flag
    pub performance_notify: Option<bool>,
    /// Exclude the method from the built service
    pub ignore: bool,
}

impl MethodOptions {
    /// No interceptors, performance flag unset, not ignored
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a method-level before-invoke interceptor
    pub fn with_invoking_interceptor(
        mut self,
        interceptor: Arc<dyn ServerMethodInvokingInterceptor>,
    ) -> Self {
        self.interceptors.invoking.push(interceptor);
        self
    }

    /// Add a method-level after-invoke interceptor
    pub fn with_invoked_interceptor(
        mut self,
        interceptor: Arc<dyn ServerMethodInvokedInterceptor>,
    ) -> Self {
        self.interceptors.invoked.push(interceptor);
        self
    }

    /// Add a method-level exception handler
    pub fn with_exception_handler(mut self, handler: Arc<dyn ServerMethodExceptionHandler>) -> Self {
        self.interceptors.exception_handlers.push(handler);
        self
    }

    /// Set the method-level performance flag
    pub fn with_performance_notify(mut self, enabled: bool) -> Self {
        self.performance_notify = Some(enabled);
        self
    }

    /// Exclude the method from the built service
    pub fn ignored(mut self) -> Self {
        self.ignore = true;
        self
    }
}

/// Resolve the performance flag of a method: method flag, then service flag, then disabled
pub fn performance_enabled(service: &ServiceOptions, method: &MethodOptions) -> bool {
    method
        .performance_notify
        .or(service.performance_notify)
        .unwrap_or(false)
}
