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
//! In-process server and HTTP gateway wiring.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use grpckit_common::metrics::export_metrics;
use grpckit_common::{Channel, LocalChannel, MetricsListener, TracingPerformanceListener};
use grpckit_gateway::{respond_with_error, respond_with_status, Gateway, GatewayMethod, GatewaySettings};
use grpckit_server::{heartbeat_service, GrpcServiceBuilderSettings};

use crate::config::SampleSettings;
use crate::messages::{
    push_player_method, search_player_client_stream_method, search_player_duplex_stream_method,
    search_player_server_stream_method, search_team_method,
};
use crate::service::build_definition;

/// Server-side settings with Prometheus and tracing listeners
pub fn server_settings() -> GrpcServiceBuilderSettings {
    GrpcServiceBuilderSettings::new()
        .with_performance_listener(Arc::new(MetricsListener::new()))
        .with_performance_listener(Arc::new(TracingPerformanceListener))
}

/// In-process channel hosting the player search and heartbeat services
pub fn local_channel(settings: &SampleSettings) -> Arc<LocalChannel> {
    let definition = build_definition(server_settings(), settings.search_options());
    let peer = format!("{}:{}", settings.client.host, settings.client.port);
    Arc::new(
        LocalChannel::new()
            .with_service(definition)
            .with_service(heartbeat_service())
            .with_peer(peer),
    )
}

/// Gateway routes for every player search method except `PushPlayer`
///
/// `PushPlayer` only ends when cancelled, which an HTTP request cannot express.
pub fn player_search_routes() -> Vec<GatewayMethod> {
    vec![
        GatewayMethod::new(search_team_method()),
        GatewayMethod::new(search_player_server_stream_method()),
        GatewayMethod::new(search_player_client_stream_method()),
        GatewayMethod::new(search_player_duplex_stream_method()),
    ]
}

/// Gateway over `channel` configured from the `[gateway]` section
pub fn player_search_gateway(settings: &SampleSettings, channel: Arc<dyn Channel>) -> Gateway {
    let gateway_settings = GatewaySettings::new(channel)
        .with_header_prefix(settings.gateway.header_prefix.clone())
        .with_status_handler(respond_with_status)
        .with_error_handler(respond_with_error);
    Gateway::new(gateway_settings).with_methods(player_search_routes())
}

/// HTTP application: `/health`, `/metrics` and the gateway routes
pub fn router(settings: &SampleSettings, channel: Arc<dyn Channel>) -> Router {
    let gateway = player_search_gateway(settings, channel);
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/metrics", get(metrics))
        .fallback(|| async { StatusCode::NOT_FOUND })
        .layer(gateway.into_layer())
}

async fn metrics() -> Result<String, (StatusCode, String)> {
    export_metrics().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_use_full_names() {
        let gateway = player_search_gateway(&SampleSettings::default(), local_channel(&SampleSettings::default()));
        assert_eq!(gateway.len(), 4);
        assert!(gateway.route("/PlayerSearch/SearchTeam").is_some());
        assert!(gateway.route("/PlayerSearch/SearchPlayer_DuplexStream").is_some());
        assert!(gateway.route("/PlayerSearch/PushPlayer").is_none());
    }

    #[test]
    fn test_channel_hosts_heartbeat() {
        let channel = local_channel(&SampleSettings::default());
        assert!(channel.has_method("/PlayerSearch/PushPlayer"));
        assert!(channel.has_method("/GrpcHeartbeat/Heartbeat"));
    }
}
