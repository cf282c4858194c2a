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

//! Client invoker settings.

use std::sync::Arc;

use grpckit_common::{
    sort_by_priority, ExceptionListener, ExceptionNotifier, PerformanceListener,
    PerformanceNotifier,
};

use crate::interceptor::{
    ClientMethodExceptionHandler, ClientMethodInvokedInterceptor, ClientMethodInvokingInterceptor,
};
use crate::registry::{global_registry, CallStateRegistry};

/// Interceptors, observers and the call-state registry used by a [`GrpcCallInvoker`]
///
/// Interceptor lists are sorted by priority once, when the invoker is built.
///
/// [`GrpcCallInvoker`]: crate::GrpcCallInvoker
#[derive(Clone)]
pub struct GrpcClientSettings {
    /// Run before each call
    pub invoking_interceptors: Vec<Arc<dyn ClientMethodInvokingInterceptor>>,
    /// Run after each call was started
    pub invoked_interceptors: Vec<Arc<dyn ClientMethodInvokedInterceptor>>,
    /// Consulted when a call fails
    pub exception_handlers: Vec<Arc<dyn ClientMethodExceptionHandler>>,
    /// Performance observers
    pub performance: PerformanceNotifier,
    /// Exception observers
    pub exceptions: ExceptionNotifier,
    /// Registry tracking streaming calls
    pub registry: Arc<CallStateRegistry>,
}

impl Default for GrpcClientSettings {
    fn default() -> Self {
        Self {
            invoking_interceptors: Vec::new(),
            invoked_interceptors: Vec::new(),
            exception_handlers: Vec::new(),
            performance: PerformanceNotifier::new(),
            exceptions: ExceptionNotifier::new(),
            registry: global_registry(),
        }
    }
}

impl std::fmt::Debug for GrpcClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrpcClientSettings")
            .field("invoking_interceptors", &self.invoking_interceptors.len())
            .field("invoked_interceptors", &self.invoked_interceptors.len())
            .field("exception_handlers", &self.exception_handlers.len())
            .field("performance", &self.performance)
            .field("exceptions", &self.exceptions)
            .finish()
    }
}

impl GrpcClientSettings {
    /// Settings with no interceptors, no observers and the global registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a before-invoke interceptor
    pub fn with_invoking_interceptor(
        mut self,
        interceptor: Arc<dyn ClientMethodInvokingInterceptor>,
    ) -> Self {
        self.invoking_interceptors.push(interceptor);
        self
    }

    /// Add an after-invoke interceptor
    pub fn with_invoked_interceptor(
        mut self,
        interceptor: Arc<dyn ClientMethodInvokedInterceptor>,
    ) -> Self {
        self.invoked_interceptors.push(interceptor);
        self
    }

    /// Add an exception handler
    pub fn with_exception_handler(mut self, handler: Arc<dyn ClientMethodExceptionHandler>) -> Self {
        self.exception_handlers.push(handler);
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

    /// Use a dedicated registry instead of the process-wide one
    pub fn with_registry(mut self, registry: Arc<CallStateRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Sort every interceptor list by ascending priority
    pub fn sort_interceptors(&mut self) {
        sort_by_priority(&mut self.invoking_interceptors);
        sort_by_priority(&mut self.invoked_interceptors);
        sort_by_priority(&mut self.exception_handlers);
    }
}
