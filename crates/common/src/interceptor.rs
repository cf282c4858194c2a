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

//! # Interceptor Contract
//!
//! ## Purpose
//! Base capability shared by every client and server interceptor: a name for diagnostics
//! and an optional priority for ordering.
//!
//! ## Ordering
//! - Interceptors run in ascending priority
//! - An interceptor without a priority sorts as `i32::MAX` (last)
//! - Equal priorities keep registration order (stable sort)
//!
//! Phase-specific traits (before invoke, after invoke, exception replacement) extend this
//! trait in the client and server crates.

use std::sync::Arc;

/// Named, prioritized interceptor
pub trait Interceptor: Send + Sync {
    /// Interceptor name for logging and failure reports
    fn name(&self) -> &str;

    /// Execution priority (lower runs earlier, `None` runs last)
    fn priority(&self) -> Option<i32> {
        None
    }
}

/// Sort key: undefined priority is treated as the maximum
pub fn priority_key(priority: Option<i32>) -> i32 {
    priority.unwrap_or(i32::MAX)
}

/// Sort interceptors by ascending priority, keeping registration order for ties
pub fn sort_by_priority<T>(interceptors: &mut [Arc<T>])
where
    T: Interceptor + ?Sized,
{
    interceptors.sort_by_key(|interceptor| priority_key(interceptor.priority()));
}

/// Concatenate interceptor scopes in order and sort the result
///
/// ## Arguments
/// * `scopes` - Lists in registration order, e.g. `[global, service, method]`
///
/// ## Returns
/// One list where equal priorities keep the scope order, then the order within a scope.
pub fn merge_sorted<T>(scopes: &[&[Arc<T>]]) -> Vec<Arc<T>>
where
    T: Interceptor + ?Sized,
{
    let mut merged: Vec<Arc<T>> = scopes
        .iter()
        .flat_map(|scope| scope.iter().cloned())
        .collect();
    sort_by_priority(&mut merged);
    merged
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct TestInterceptor {
        name: String,
        priority: Option<i32>,
    }

    impl TestInterceptor {
        fn new(name: &str, priority: Option<i32>) -> Arc<dyn Interceptor> {
            Arc::new(Self {
                name: name.to_string(),
                priority,
            })
        }
    }

    impl Interceptor for TestInterceptor {
        fn name(&self) -> &str {
            &self.name
        }

        fn priority(&self) -> Option<i32> {
            self.priority
        }
    }

    fn names(list: &[Arc<dyn Interceptor>]) -> Vec<&str> {
        list.iter().map(|i| i.name()).collect()
    }

    #[test]
    fn test_sort_ascending() {
        let mut list = vec![
            TestInterceptor::new("high", Some(90)),
            TestInterceptor::new("low", Some(10)),
            TestInterceptor::new("medium", Some(50)),
        ];
        sort_by_priority(&mut list);
        assert_eq!(names(&list), vec!["low", "medium", "high"]);
    }

    #[test]
    fn test_undefined_priority_runs_last_in_registration_order() {
        let mut list = vec![
            TestInterceptor::new("none-a", None),
            TestInterceptor::new("five", Some(5)),
            TestInterceptor::new("none-b", None),
            TestInterceptor::new("one", Some(1)),
        ];
        sort_by_priority(&mut list);
        assert_eq!(names(&list), vec!["one", "five", "none-a", "none-b"]);
    }

    #[test]
    fn test_equal_priorities_are_stable() {
        let mut list = vec![
            TestInterceptor::new("first", Some(3)),
            TestInterceptor::new("second", Some(3)),
            TestInterceptor::new("third", Some(3)),
        ];
        sort_by_priority(&mut list);
        assert_eq!(names(&list), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_any_registration_order_yields_same_result() {
        let permutations = [[0usize, 1, 2], [2, 1, 0], [1, 2, 0], [2, 0, 1]];
        let prototypes = [("a", 30), ("b", 10), ("c", 20)];
        for order in permutations {
            let mut list: Vec<Arc<dyn Interceptor>> = order
                .iter()
                .map(|&i| TestInterceptor::new(prototypes[i].0, Some(prototypes[i].1)))
                .collect();
            sort_by_priority(&mut list);
            assert_eq!(names(&list), vec!["b", "c", "a"]);
        }
    }

    #[test]
    fn test_merge_scopes() {
        let global = vec![TestInterceptor::new("global", Some(20))];
        let service = vec![TestInterceptor::new("service", None)];
        let method = vec![
            TestInterceptor::new("method", Some(20)),
            TestInterceptor::new("early", Some(1)),
        ];
        let merged = merge_sorted(&[global.as_slice(), service.as_slice(), method.as_slice()]);
        assert_eq!(names(&merged), vec!["early", "global", "method", "service"]);
    }
}
