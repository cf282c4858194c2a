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
//! # Player Search Service
//!
//! ## Purpose
//! Sample service covering every call shape. Data is generated on each call.
//!
//! ## Methods
//! - `SearchTeam`: unary, returns the requested number of teams
//! - `SearchPlayer_ServerStream`: streams players in batches of `fetch_size`
//! - `SearchPlayer_ClientStream`: accumulates players for every request into one response
//! - `SearchPlayer_DuplexStream`: answers each request with batches of `fetch_size`
//! - `PushPlayer`: pushes a batch at random intervals until the call is cancelled
//!
//! Each batch is written after waiting `delay`. Cancellation is checked before every player: the
//! response-streaming methods stop with a `Cancelled` status, the client-streaming method fails
//! with one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use grpckit_common::{GrpcError, Interceptor, InterceptorError, ServerCallContext, ServiceDefinition};
use grpckit_server::{
    GrpcService, GrpcServiceBuilder, GrpcServiceBuilderSettings, MethodOptions, ServerMethodInvokingInterceptor,
    ServerRequestStream, ServerResponseStream, ServiceMethod, ServiceOptions,
};
use rand::Rng;
use tonic::Status;
use tracing::{debug, info};

use crate::messages::{
    push_player_method, search_player_client_stream_method, search_player_duplex_stream_method,
    search_player_server_stream_method, search_team_method, PlayerSearchRequest, PlayerSearchResponse,
    TeamSearchRequest, TeamSearchResponse, SERVICE_NAME,
};
use crate::repository::{generate_players, generate_teams, teams_by_code};

/// Request header identifying the caller's call sequence number
pub const CALL_COUNTER_HEADER: &str = "CallCounter";

/// Size of the team set players are drawn from
pub const PLAYER_TEAM_COUNT: usize = 10;

const CANCELLED_MESSAGE: &str = "canceled by user.";

/// Batching and pacing of the streaming methods
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// Players per streamed batch
    pub fetch_size: usize,
    /// Wait before each batch is written
    pub delay: Duration,
    /// Shortest wait between pushed batches
    pub push_interval_min: Duration,
    /// Longest wait between pushed batches
    pub push_interval_max: Duration,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            fetch_size: 10,
            delay: Duration::from_millis(200),
            push_interval_min: Duration::from_secs(5),
            push_interval_max: Duration::from_secs(20),
        }
    }
}

/// Player search implementation
#[derive(Debug, Default)]
pub struct PlayerSearchService {
    options: SearchOptions,
}

impl PlayerSearchService {
    /// Service with the given pacing
    pub fn new(options: SearchOptions) -> Self {
        Self { options }
    }

    /// Pacing in use
    pub fn search_options(&self) -> &SearchOptions {
        &self.options
    }

    async fn search_team(
        &self,
        request: TeamSearchRequest,
        ctx: ServerCallContext,
    ) -> Result<TeamSearchResponse, GrpcError> {
        info!(
            call_counter = %call_counter(&ctx),
            count = request.expected_data_count,
            "Requested teams"
        );
        Ok(TeamSearchResponse {
            teams: generate_teams(count_of(request.expected_data_count)),
        })
    }

    async fn search_player_server_stream(
        &self,
        request: PlayerSearchRequest,
        responses: ServerResponseStream<PlayerSearchResponse>,
        ctx: ServerCallContext,
    ) -> Result<(), GrpcError> {
        info!(
            call_counter = %call_counter(&ctx),
            count = request.expected_data_count,
            "Requested players"
        );
        let teams = teams_by_code(PLAYER_TEAM_COUNT);
        let players = generate_players(
            &mut rand::thread_rng(),
            1,
            count_of(request.expected_data_count),
            &teams,
        );

        let mut batch = PlayerSearchResponse::default();
        for player in players {
            if stop_if_cancelled(&ctx) {
                return Ok(());
            }
            batch.push(player, &teams);
            if batch.players.len() >= self.fetch_size() {
                self.flush(&responses, &mut batch).await?;
            }
        }
        if !batch.players.is_empty() {
            self.flush(&responses, &mut batch).await?;
        }
        Ok(())
    }

    async fn search_player_client_stream(
        &self,
        mut requests: ServerRequestStream<PlayerSearchRequest>,
        ctx: ServerCallContext,
    ) -> Result<PlayerSearchResponse, GrpcError> {
        let call_counter = call_counter(&ctx);
        let teams = teams_by_code(PLAYER_TEAM_COUNT);
        let mut response = PlayerSearchResponse::default();
        let mut initial = 1;

        while let Some(request) = requests.message().await? {
            fail_if_cancelled(&ctx)?;
            info!(call_counter = %call_counter, count = request.expected_data_count, "Requested players");
            let count = count_of(request.expected_data_count);
            let players = generate_players(&mut rand::thread_rng(), initial, count, &teams);
            for player in players {
                fail_if_cancelled(&ctx)?;
                response.push(player, &teams);
            }
            initial += count;
        }
        Ok(response)
    }

    async fn search_player_duplex_stream(
        &self,
        mut requests: ServerRequestStream<PlayerSearchRequest>,
        responses: ServerResponseStream<PlayerSearchResponse>,
        ctx: ServerCallContext,
    ) -> Result<(), GrpcError> {
        let call_counter = call_counter(&ctx);
        let teams = teams_by_code(PLAYER_TEAM_COUNT);
        let mut initial = 1;

        while let Some(request) = requests.message().await? {
            if stop_if_cancelled(&ctx) {
                return Ok(());
            }
            info!(call_counter = %call_counter, count = request.expected_data_count, "Requested players");
            let count = count_of(request.expected_data_count);
            let players = generate_players(&mut rand::thread_rng(), initial, count, &teams);

            let mut batch = PlayerSearchResponse::default();
            for player in players {
                if stop_if_cancelled(&ctx) {
                    return Ok(());
                }
                batch.push(player, &teams);
                if batch.players.len() >= self.fetch_size() {
                    self.flush(&responses, &mut batch).await?;
                }
            }
            if !batch.players.is_empty() {
                self.flush(&responses, &mut batch).await?;
            }
            initial += count;
        }
        Ok(())
    }

    async fn push_player(
        &self,
        request: PlayerSearchRequest,
        responses: ServerResponseStream<PlayerSearchResponse>,
        ctx: ServerCallContext,
    ) -> Result<(), GrpcError> {
        info!(
            call_counter = %call_counter(&ctx),
            count = request.expected_data_count,
            "Requested player pushes"
        );
        let teams = teams_by_code(PLAYER_TEAM_COUNT);
        let count = count_of(request.expected_data_count);

        loop {
            let wait = self.push_interval();
            tokio::select! {
                _ = ctx.cancellation_token().cancelled() => {}
                _ = tokio::time::sleep(wait) => {}
            }
            if stop_if_cancelled(&ctx) {
                return Ok(());
            }

            let players = generate_players(&mut rand::thread_rng(), 1, count, &teams);
            let mut batch = PlayerSearchResponse::default();
            for player in players {
                batch.push(player, &teams);
            }
            if !batch.players.is_empty() {
                self.flush(&responses, &mut batch).await?;
            }
        }
    }

    async fn flush(
        &self,
        responses: &ServerResponseStream<PlayerSearchResponse>,
        batch: &mut PlayerSearchResponse,
    ) -> Result<(), GrpcError> {
        tokio::time::sleep(self.options.delay).await;
        responses.write(batch).await?;
        debug!(players = batch.players.len(), teams = batch.teams.len(), "Batch written");
        batch.clear();
        Ok(())
    }

    fn fetch_size(&self) -> usize {
        self.options.fetch_size.max(1)
    }

    fn push_interval(&self) -> Duration {
        let min = self.options.push_interval_min;
        let max = self.options.push_interval_max.max(min);
        rand::thread_rng().gen_range(min..=max)
    }
}

impl GrpcService for PlayerSearchService {
    fn service_name(&self) -> &str {
        SERVICE_NAME
    }

    fn options(&self) -> ServiceOptions {
        ServiceOptions::new().with_performance_notify(true)
    }

    fn methods() -> Vec<ServiceMethod<Self>> {
        vec![
            ServiceMethod::unary(search_team_method(), |service: Arc<Self>, request, ctx| async move {
                service.search_team(request, ctx).await
            })
            .with_options(MethodOptions::new().with_performance_notify(false)),
            ServiceMethod::server_streaming(
                search_player_server_stream_method(),
                |service: Arc<Self>, request, responses, ctx| async move {
                    service.search_player_server_stream(request, responses, ctx).await
                },
            ),
            ServiceMethod::client_streaming(
                search_player_client_stream_method(),
                |service: Arc<Self>, requests, ctx| async move {
                    service.search_player_client_stream(requests, ctx).await
                },
            ),
            ServiceMethod::duplex_streaming(
                search_player_duplex_stream_method(),
                |service: Arc<Self>, requests, responses, ctx| async move {
                    service.search_player_duplex_stream(requests, responses, ctx).await
                },
            ),
            ServiceMethod::server_streaming(
                push_player_method(),
                |service: Arc<Self>, request, responses, ctx| async move {
                    service.push_player(request, responses, ctx).await
                },
            ),
        ]
    }
}

/// Logs every incoming call with its peer
#[derive(Debug, Default)]
pub struct RequestLogInterceptor;

impl Interceptor for RequestLogInterceptor {
    fn name(&self) -> &str {
        "request-log"
    }

    fn priority(&self) -> Option<i32> {
        Some(0)
    }
}

#[async_trait]
impl ServerMethodInvokingInterceptor for RequestLogInterceptor {
    async fn on_invoking(&self, ctx: &ServerCallContext) -> Result<(), InterceptorError> {
        debug!(
            method = %ctx.method().full_name(),
            peer = %ctx.peer(),
            call_counter = %call_counter(ctx),
            "Incoming call"
        );
        Ok(())
    }
}

/// Build the player search service definition
pub fn build_definition(settings: GrpcServiceBuilderSettings, options: SearchOptions) -> ServiceDefinition {
    let settings = settings.with_invoking_interceptor(Arc::new(RequestLogInterceptor));
    GrpcServiceBuilder::new(settings).build(PlayerSearchService::new(options))
}

fn call_counter(ctx: &ServerCallContext) -> String {
    ctx.request_headers().get_str_or(CALL_COUNTER_HEADER, "")
}

fn count_of(expected: i32) -> usize {
    usize::try_from(expected).unwrap_or(0)
}

/// Set a `Cancelled` status when the call was cancelled; true means stop
fn stop_if_cancelled(ctx: &ServerCallContext) -> bool {
    if !ctx.is_cancelled() {
        return false;
    }
    ctx.set_status(Status::cancelled(CANCELLED_MESSAGE));
    true
}

fn fail_if_cancelled(ctx: &ServerCallContext) -> Result<(), GrpcError> {
    if ctx.is_cancelled() {
        return Err(GrpcError::Status(Status::cancelled(CANCELLED_MESSAGE)));
    }
    Ok(())
}
