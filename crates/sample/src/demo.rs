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
//! Demo calls issued by the CLI.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use grpckit_client::{GrpcCallInvoker, GrpcResult};
use grpckit_common::{CallOptions, GrpcError};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::messages::{
    push_player_method, search_player_client_stream_method, search_player_duplex_stream_method,
    search_player_server_stream_method, search_team_method, PlayerSearchRequest, PlayerSearchResponse,
    TeamSearchRequest, TeamSearchResponse,
};
use crate::service::CALL_COUNTER_HEADER;

/// Call shape used for a player search
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SearchMode {
    /// `SearchPlayer_ServerStream`
    Server,
    /// `SearchPlayer_ClientStream`
    Client,
    /// `SearchPlayer_DuplexStream`
    Duplex,
}

/// Outcome of a push subscription
#[derive(Debug)]
pub struct PushOutcome {
    /// Batches received before the call ended
    pub batches: usize,
    /// Final result; cancelled when the subscription was stopped
    pub result: GrpcResult,
}

/// Client numbering its calls through the `CallCounter` header
#[derive(Debug)]
pub struct DemoClient {
    invoker: Arc<GrpcCallInvoker>,
    counter: AtomicU64,
    host: Option<String>,
}

impl DemoClient {
    /// Client calling through `invoker`
    pub fn new(invoker: Arc<GrpcCallInvoker>) -> Self {
        Self {
            invoker,
            counter: AtomicU64::new(0),
            host: None,
        }
    }

    /// Target host passed with every call
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Calls issued so far
    pub fn calls(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    fn options(&self) -> CallOptions {
        let call = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        CallOptions::new().with_header(CALL_COUNTER_HEADER, call.to_string())
    }

    /// `SearchTeam`
    pub async fn search_teams(&self, count: i32) -> Result<TeamSearchResponse, GrpcError> {
        let request = TeamSearchRequest {
            expected_data_count: count,
            ..Default::default()
        };
        self.invoker
            .unary_call(&search_team_method(), self.host.as_deref(), self.options(), &request)
            .await
    }

    /// Search `count` players with the given call shape
    ///
    /// Client and duplex modes split the count over two requests.
    pub async fn search_players(&self, mode: SearchMode, count: i32) -> GrpcResult<Vec<PlayerSearchResponse>> {
        let host = self.host.as_deref();
        let first = count / 2;
        let requests = vec![
            PlayerSearchRequest::with_count(first),
            PlayerSearchRequest::with_count(count - first),
        ];
        match mode {
            SearchMode::Server => {
                let request = PlayerSearchRequest::with_count(count);
                match self
                    .invoker
                    .server_streaming(&search_player_server_stream_method(), host, self.options(), &request)
                    .await
                {
                    Ok(mut call) => call.read_all().await,
                    Err(error) => GrpcResult::from_error(error),
                }
            }
            SearchMode::Client => {
                match self
                    .invoker
                    .client_streaming(&search_player_client_stream_method(), host, self.options())
                    .await
                {
                    Ok(mut call) => call.write_all_and_complete(requests).await.map(|response| vec![response]),
                    Err(error) => GrpcResult::from_error(error),
                }
            }
            SearchMode::Duplex => {
                match self
                    .invoker
                    .duplex_streaming(&search_player_duplex_stream_method(), host, self.options())
                    .await
                {
                    Ok(mut call) => call.write_read_all(requests).await,
                    Err(error) => GrpcResult::from_error(error),
                }
            }
        }
    }

    /// Receive pushed batches until `cancellation` fires
    pub async fn push_players(&self, count: i32, cancellation: CancellationToken) -> PushOutcome {
        let options = self.options().with_cancellation(cancellation);
        let request = PlayerSearchRequest::with_count(count);
        let mut batches = 0;
        let result = match self
            .invoker
            .server_streaming(&push_player_method(), self.host.as_deref(), options, &request)
            .await
        {
            Ok(mut call) => {
                call.for_each(|batch| {
                    batches += 1;
                    info!(batch = batches, players = batch.players.len(), "Pushed players");
                })
                .await
            }
            Err(error) => GrpcResult::from_error(error),
        };
        PushOutcome { batches, result }
    }
}
