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

//! # Heartbeat Client
//!
//! Keeps a duplex heartbeat call open: send a ping, wait for the pong, sleep for the
//! interval, repeat until [`HeartbeatClient::stop`] cancels the call.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use grpckit_common::heartbeat::{heartbeat_method, heartbeat_method_named, PING};
use grpckit_common::{CallOptions, GrpcError, Method};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::invoker::GrpcCallInvoker;

/// Client side of the heartbeat method
pub struct HeartbeatClient {
    invoker: Arc<GrpcCallInvoker>,
    method: Method<Bytes, Bytes>,
    active: AtomicBool,
    cancellation: Mutex<Option<CancellationToken>>,
    pongs: AtomicU64,
}

impl std::fmt::Debug for HeartbeatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatClient")
            .field("method", &self.method.full_name())
            .field("active", &self.is_active())
            .field("pongs", &self.pong_count())
            .finish()
    }
}

/// Clears the active flag when the heartbeat loop exits
struct ActiveGuard<'a> {
    client: &'a HeartbeatClient,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.client.active.store(false, Ordering::Release);
        self.client.take_token();
    }
}

impl HeartbeatClient {
    /// Heartbeat client for the default service and method names
    pub fn new(invoker: Arc<GrpcCallInvoker>) -> Self {
        Self::with_method(invoker, heartbeat_method())
    }

    /// Heartbeat client for custom service and method names
    pub fn with_names(invoker: Arc<GrpcCallInvoker>, service_name: &str, method_name: &str) -> Self {
        Self::with_method(invoker, heartbeat_method_named(service_name, method_name))
    }

    fn with_method(invoker: Arc<GrpcCallInvoker>, method: Method<Bytes, Bytes>) -> Self {
        Self {
            invoker,
            method,
            active: AtomicBool::new(false),
            cancellation: Mutex::new(None),
            pongs: AtomicU64::new(0),
        }
    }

    /// Whether the heartbeat loop is running
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Pongs received since the client was created
    pub fn pong_count(&self) -> u64 {
        self.pongs.load(Ordering::Relaxed)
    }

    fn take_token(&self) -> Option<CancellationToken> {
        self.cancellation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Run the heartbeat loop until [`stop`](Self::stop)
    ///
    /// Waits `delay` before opening the call. Returns immediately when the loop is already
    /// running.
    ///
    /// ## Returns
    /// `Ok` when stopped or when the server ended the call, otherwise the failure that ended
    /// the loop.
    pub async fn start(&self, delay: Duration, interval: Duration) -> Result<(), GrpcError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(method = %self.method.full_name(), "Heartbeat already active");
            return Ok(());
        }
        let token = CancellationToken::new();
        *self
            .cancellation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token.clone());
        let _guard = ActiveGuard { client: self };

        tokio::select! {
            _ = token.cancelled() => return Ok(()),
            _ = tokio::time::sleep(delay) => {}
        }

        info!(method = %self.method.full_name(), "Heartbeat started");
        match self.run(&token, interval).await {
            Err(error) if error.is_cancelled() || token.is_cancelled() => Ok(()),
            outcome => outcome,
        }
    }

    async fn run(&self, token: &CancellationToken, interval: Duration) -> Result<(), GrpcError> {
        let options = CallOptions::new().with_cancellation(token.clone());
        let mut call = self
            .invoker
            .duplex_streaming(&self.method, None, options)
            .await?;
        let ping = Bytes::from_static(&[PING]);
        loop {
            call.request_stream().write(&ping).await?;
            if call.response_stream().message().await?.is_none() {
                debug!(method = %self.method.full_name(), "Heartbeat ended by server");
                return Ok(());
            }
            self.pongs.fetch_add(1, Ordering::Relaxed);
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Cancel the running heartbeat; a no-op when inactive
    ///
    /// [`is_active`](Self::is_active) turns `false` once the loop has exited.
    pub fn stop(&self) {
        if let Some(token) = self.take_token() {
            info!(method = %self.method.full_name(), "Heartbeat stopped");
            token.cancel();
        }
    }
}

impl Drop for HeartbeatClient {
    fn drop(&mut self) {
        if let Some(token) = self.take_token() {
            token.cancel();
        }
    }
}
