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

//! # Call-State Registry
//!
//! ## Purpose
//! Process-wide table of in-flight streaming calls. Each entry records the target method,
//! host, call options and two completion flags (`request_stream_completed`,
//! `response_ended`) that the result wrapper reads to decide whether a final status is
//! available.
//!
//! ## Design
//! - **Arena with generations**: a [`CallHandle`] is a slot index plus the generation the
//!   slot had when the call was registered. Deregistering bumps the generation, so a stale
//!   handle can never observe a later call reusing the slot.
//! - **One lock**: every operation takes the same mutex for a map read or write only; the
//!   lock is never held across an await.
//! - **Scoped release**: [`CallRegistration`] deregisters its handle on drop, on every exit
//!   path.
//! - **Monotonic flags**: once set, a completion flag never reverts.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use grpckit_common::{CallOptions, MethodInfo};
use lazy_static::lazy_static;
use thiserror::Error;
use tracing::debug;

lazy_static! {
    static ref GLOBAL_REGISTRY: Arc<CallStateRegistry> = Arc::new(CallStateRegistry::new());
}

/// The process-wide registry used by invokers unless configured otherwise
pub fn global_registry() -> Arc<CallStateRegistry> {
    GLOBAL_REGISTRY.clone()
}

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The handle was never registered or was already deregistered
    #[error("Call handle {0} is not registered")]
    NotRegistered(CallHandle),
}

/// Generation-checked handle of a registered call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallHandle {
    index: u32,
    generation: u32,
}

impl fmt::Display for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.index, self.generation)
    }
}

/// Mutable record of one in-flight call
#[derive(Debug, Clone)]
pub struct CallState {
    method: Arc<MethodInfo>,
    host: Option<String>,
    options: CallOptions,
    request_stream_completed: bool,
    response_ended: bool,
}

impl CallState {
    /// New state with both flags cleared
    pub fn new(method: Arc<MethodInfo>, host: Option<String>, options: CallOptions) -> Self {
        Self {
            method,
            host,
            options,
            request_stream_completed: false,
            response_ended: false,
        }
    }

    /// Target method
    pub fn method(&self) -> &Arc<MethodInfo> {
        &self.method
    }

    /// Target host
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Options the call was started with
    pub fn options(&self) -> &CallOptions {
        &self.options
    }

    /// Whether the client finished writing requests
    pub fn is_request_stream_completed(&self) -> bool {
        self.request_stream_completed
    }

    /// Whether the response stream was read to its end
    pub fn is_response_ended(&self) -> bool {
        self.response_ended
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    state: Option<CallState>,
}

#[derive(Debug, Default)]
struct Arena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl Arena {
    fn slot(&self, handle: CallHandle) -> Option<&Slot> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.state.is_some())
    }

    fn state_mut(&mut self, handle: CallHandle) -> Result<&mut CallState, RegistryError> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.state.as_mut())
            .ok_or(RegistryError::NotRegistered(handle))
    }
}

/// Handle table of in-flight calls
#[derive(Debug, Default)]
pub struct CallStateRegistry {
    arena: Mutex<Arena>,
}

impl CallStateRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Arena> {
        self.arena.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a call and return its handle
    pub fn register(&self, state: CallState) -> CallHandle {
        let mut arena = self.lock();
        let index = match arena.free.pop() {
            Some(index) => index,
            None => {
                arena.slots.push(Slot::default());
                (arena.slots.len() - 1) as u32
            }
        };
        let slot = &mut arena.slots[index as usize];
        slot.state = Some(state);
        let handle = CallHandle {
            index,
            generation: slot.generation,
        };
        arena.len += 1;
        handle
    }

    /// Replace the target, host and options of a registered call
    ///
    /// Completion flags already set stay set; flags set on `state` are merged in.
    pub fn replace(&self, handle: CallHandle, state: CallState) -> Result<(), RegistryError> {
        let mut arena = self.lock();
        let current = arena.state_mut(handle)?;
        let request_stream_completed =
            current.request_stream_completed || state.request_stream_completed;
        let response_ended = current.response_ended || state.response_ended;
        *current = CallState {
            request_stream_completed,
            response_ended,
            ..state
        };
        Ok(())
    }

    /// Snapshot of a registered call
    pub fn lookup(&self, handle: CallHandle) -> Option<CallState> {
        self.lock().slot(handle).and_then(|slot| slot.state.clone())
    }

    /// Read a registered call without cloning it
    pub fn with_state<R>(&self, handle: CallHandle, f: impl FnOnce(&CallState) -> R) -> Option<R> {
        self.lock()
            .slot(handle)
            .and_then(|slot| slot.state.as_ref())
            .map(f)
    }

    /// Whether the handle refers to a registered call
    pub fn contains(&self, handle: CallHandle) -> bool {
        self.lock().slot(handle).is_some()
    }

    /// Remove a call; returns `false` when it was not registered
    pub fn deregister(&self, handle: CallHandle) -> bool {
        let mut arena = self.lock();
        let removed = match arena.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation && slot.state.is_some() => {
                slot.state = None;
                slot.generation = slot.generation.wrapping_add(1);
                true
            }
            _ => false,
        };
        if removed {
            arena.free.push(handle.index);
            arena.len -= 1;
        }
        removed
    }

    /// Set `request_stream_completed`
    pub fn mark_request_completed(&self, handle: CallHandle) -> Result<(), RegistryError> {
        self.lock().state_mut(handle)?.request_stream_completed = true;
        Ok(())
    }

    /// Set `response_ended`
    pub fn mark_response_ended(&self, handle: CallHandle) -> Result<(), RegistryError> {
        self.lock().state_mut(handle)?.response_ended = true;
        Ok(())
    }

    /// Number of registered calls
    pub fn len(&self) -> usize {
        self.lock().len
    }

    /// Whether no call is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scoped registration: deregisters the call when dropped
#[derive(Debug)]
pub struct CallRegistration {
    registry: Arc<CallStateRegistry>,
    handle: CallHandle,
}

impl CallRegistration {
    /// Register `state` in `registry`
    pub fn new(registry: Arc<CallStateRegistry>, state: CallState) -> Self {
        let handle = registry.register(state);
        debug!(handle = %handle, "Registered call state");
        Self { registry, handle }
    }

    /// Handle of the registered call
    pub fn handle(&self) -> CallHandle {
        self.handle
    }

    /// Registry holding the call
    pub fn registry(&self) -> &Arc<CallStateRegistry> {
        &self.registry
    }
}

impl Drop for CallRegistration {
    fn drop(&mut self) {
        if self.registry.deregister(self.handle) {
            debug!(handle = %self.handle, "Deregistered call state");
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use grpckit_common::MethodType;

    fn state() -> CallState {
        let info = Arc::new(MethodInfo::new(
            MethodType::DuplexStreaming,
            "PlayerSearch",
            "SearchPlayer_DuplexStream",
            "PlayerSearchRequest",
            "PlayerSearchResponse",
        ));
        CallState::new(info, Some("localhost".to_string()), CallOptions::new())
    }

    #[test]
    fn test_register_lookup_deregister() {
        let registry = CallStateRegistry::new();
        let handle = registry.register(state());
        assert_eq!(registry.len(), 1);
        let found = registry.lookup(handle).unwrap();
        assert_eq!(found.host(), Some("localhost"));
        assert!(!found.is_request_stream_completed());

        assert!(registry.deregister(handle));
        assert!(!registry.deregister(handle));
        assert!(registry.lookup(handle).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_stale_handle_does_not_see_reused_slot() {
        let registry = CallStateRegistry::new();
        let first = registry.register(state());
        registry.deregister(first);
        let second = registry.register(state());
        assert_eq!(first.index, second.index);
        assert_ne!(first, second);
        assert!(registry.lookup(first).is_none());
        assert!(registry.lookup(second).is_some());
        assert_eq!(
            registry.mark_response_ended(first),
            Err(RegistryError::NotRegistered(first))
        );
    }

    #[test]
    fn test_flags_are_monotonic() {
        let registry = CallStateRegistry::new();
        let handle = registry.register(state());
        registry.mark_request_completed(handle).unwrap();
        registry.mark_request_completed(handle).unwrap();
        registry.mark_response_ended(handle).unwrap();
        let snapshot = registry.lookup(handle).unwrap();
        assert!(snapshot.is_request_stream_completed());
        assert!(snapshot.is_response_ended());
    }

    #[test]
    fn test_replace_never_clears_flags() {
        let registry = CallStateRegistry::new();
        let handle = registry.register(state());
        registry.mark_response_ended(handle).unwrap();
        registry.replace(handle, state()).unwrap();
        let snapshot = registry.lookup(handle).unwrap();
        assert!(snapshot.is_response_ended());
        assert!(!snapshot.is_request_stream_completed());

        registry.mark_request_completed(handle).unwrap();
        registry.replace(handle, state()).unwrap();
        let snapshot = registry.lookup(handle).unwrap();
        assert!(snapshot.is_request_stream_completed());
        assert!(snapshot.is_response_ended());
    }

    #[test]
    fn test_replace_swaps_host_and_merges_set_flags() {
        let registry = CallStateRegistry::new();
        let handle = registry.register(state());
        let mut next = state();
        next.host = Some("replica".to_string());
        next.request_stream_completed = true;
        registry.replace(handle, next).unwrap();
        let snapshot = registry.lookup(handle).unwrap();
        assert_eq!(snapshot.host(), Some("replica"));
        assert!(snapshot.is_request_stream_completed());
        assert!(!snapshot.is_response_ended());
    }

    #[test]
    fn test_registration_guard_deregisters_on_every_path() {
        let registry = Arc::new(CallStateRegistry::new());

        let handle = {
            let registration = CallRegistration::new(registry.clone(), state());
            registration.handle()
        };
        assert!(!registry.contains(handle));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _registration = CallRegistration::new(registry.clone(), state());
            panic!("faulted call");
        }));
        assert!(result.is_err());
        assert!(registry.is_empty());
    }
}
