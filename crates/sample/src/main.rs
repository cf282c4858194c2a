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
//! GrpcKit sample CLI
//!
//! ## Purpose
//! - Serve the HTTP gateway in front of an in-process player search server
//! - Run demo calls of every shape through the instrumented invoker

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use grpckit_client::{GrpcCallInvoker, GrpcClientSettings, HeartbeatClient};
use grpckit_common::{MetricsListener, TracingPerformanceListener};
use grpckit_sample::config::SampleSettings;
use grpckit_sample::demo::{DemoClient, SearchMode};
use grpckit_sample::host::{local_channel, router};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "grpckit-sample")]
#[command(about = "GrpcKit player search sample", long_about = None)]
struct Cli {
    /// Settings file (TOML); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP gateway until Ctrl-C
    Gateway,

    /// Search teams (unary)
    SearchTeams {
        /// Number of teams
        #[arg(long, default_value_t = 5)]
        count: i32,
    },

    /// Search players with a streaming call
    SearchPlayers {
        /// Call shape
        #[arg(long, value_enum, default_value_t = SearchMode::Server)]
        mode: SearchMode,

        /// Number of players
        #[arg(long, default_value_t = 25)]
        count: i32,
    },

    /// Subscribe to pushed players, then cancel
    PushPlayers {
        /// Players per batch
        #[arg(long, default_value_t = 5)]
        count: i32,

        /// Seconds before the subscription is cancelled
        #[arg(long, default_value_t = 30)]
        seconds: u64,
    },

    /// Ping the heartbeat service
    Heartbeat {
        /// Seconds to keep pinging
        #[arg(long, default_value_t = 3)]
        seconds: u64,

        /// Milliseconds between pings
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
    },

    /// Write the effective settings as TOML
    InitConfig {
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_ref()).await?;

    match cli.command {
        Commands::Gateway => serve_gateway(settings).await,
        Commands::SearchTeams { count } => {
            let response = demo_client(&settings).search_teams(count).await?;
            for team in &response.teams {
                info!(code = %team.code, name = %team.name, country = %team.country, "Team");
            }
            Ok(())
        }
        Commands::SearchPlayers { mode, count } => {
            let batches = demo_client(&settings)
                .search_players(mode, count)
                .await
                .into_result()?;
            for (i, batch) in batches.iter().enumerate() {
                info!(
                    batch = i + 1,
                    players = batch.players.len(),
                    teams = batch.teams.len(),
                    "Players received"
                );
            }
            Ok(())
        }
        Commands::PushPlayers { count, seconds } => {
            let cancellation = CancellationToken::new();
            let timer = cancellation.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(seconds)).await;
                timer.cancel();
            });
            let outcome = demo_client(&settings).push_players(count, cancellation).await;
            info!(
                batches = outcome.batches,
                cancelled = outcome.result.is_cancelled(),
                "Push subscription ended"
            );
            match outcome.result.into_result() {
                Err(error) if !error.is_cancelled() => Err(error.into()),
                _ => Ok(()),
            }
        }
        Commands::Heartbeat { seconds, interval_ms } => {
            let heartbeat = Arc::new(HeartbeatClient::new(invoker(&settings)));
            let running = heartbeat.clone();
            let task = tokio::spawn(async move {
                running
                    .start(Duration::ZERO, Duration::from_millis(interval_ms))
                    .await
            });
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            heartbeat.stop();
            task.await.context("heartbeat task panicked")??;
            info!(pongs = heartbeat.pong_count(), "Heartbeat stopped");
            Ok(())
        }
        Commands::InitConfig { output } => {
            settings.save(&output).await?;
            info!(path = %output.display(), "Settings written");
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

async fn load_settings(path: Option<&PathBuf>) -> Result<SampleSettings> {
    match path {
        Some(path) => Ok(SampleSettings::load(path).await?),
        None => {
            let mut settings = SampleSettings::default();
            settings.apply_env_overrides(|name| std::env::var(name).ok())?;
            Ok(settings)
        }
    }
}

fn invoker(settings: &SampleSettings) -> Arc<GrpcCallInvoker> {
    let client_settings = GrpcClientSettings::new()
        .with_performance_listener(Arc::new(MetricsListener::new()))
        .with_performance_listener(Arc::new(TracingPerformanceListener));
    Arc::new(GrpcCallInvoker::with_settings(local_channel(settings), client_settings))
}

fn demo_client(settings: &SampleSettings) -> DemoClient {
    DemoClient::new(invoker(settings)).with_host(settings.client.host.clone())
}

async fn serve_gateway(settings: SampleSettings) -> Result<()> {
    let app = router(&settings, local_channel(&settings));
    let listener = tokio::net::TcpListener::bind(&settings.gateway.listen)
        .await
        .with_context(|| format!("failed to bind {}", settings.gateway.listen))?;
    info!(listen = %settings.gateway.listen, "Gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
