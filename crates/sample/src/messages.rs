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
//! Player search messages and method descriptors.
//!
//! Messages are protobuf on the wire and JSON through the gateway, so each type derives both
//! `prost::Message` and serde.

use std::collections::BTreeMap;

use grpckit_common::{Marshaller, Method, MethodType};
use serde::{Deserialize, Serialize};

/// Service name shared by every method
pub const SERVICE_NAME: &str = "PlayerSearch";

/// A team
#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Team {
    /// Zero-padded code, unique within one generated set
    #[prost(string, tag = "1")]
    pub code: String,
    /// Display name
    #[prost(string, tag = "2")]
    pub name: String,
    /// Home country
    #[prost(string, tag = "3")]
    pub country: String,
}

/// A player
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Player {
    /// Display name
    #[prost(string, tag = "1")]
    pub name: String,
    /// Age in years
    #[prost(int32, tag = "2")]
    pub age: i32,
    /// Code of the player's team
    #[prost(string, tag = "3")]
    pub team_code: String,
    /// Playing positions (`FW`, `MF`, `DF` or `GK`)
    #[prost(string, repeated, tag = "4")]
    pub positions: Vec<String>,
}

/// Team search conditions
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamSearchRequest {
    /// Team name filter
    #[prost(string, tag = "1")]
    pub name: String,
    /// Country filter
    #[prost(string, tag = "2")]
    pub country: String,
    /// Number of teams to generate
    #[prost(int32, tag = "3")]
    pub expected_data_count: i32,
}

/// Teams found
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamSearchResponse {
    /// Teams in code order
    #[prost(message, repeated, tag = "1")]
    pub teams: Vec<Team>,
}

/// Player search conditions
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSearchRequest {
    /// Player name filter
    #[prost(string, tag = "1")]
    pub player_name: String,
    /// Team name filter
    #[prost(string, tag = "2")]
    pub team_name: String,
    /// Position filter
    #[prost(string, tag = "3")]
    pub position: String,
    /// Number of players to generate
    #[prost(int32, tag = "4")]
    pub expected_data_count: i32,
}

impl PlayerSearchRequest {
    /// Request for `count` players without filters
    pub fn with_count(count: i32) -> Self {
        Self {
            expected_data_count: count,
            ..Default::default()
        }
    }
}

/// A batch of players plus the teams they reference
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSearchResponse {
    /// Players in generation order
    #[prost(message, repeated, tag = "1")]
    pub players: Vec<Player>,
    /// Teams referenced by `players`, keyed by code
    #[prost(btree_map = "string, message", tag = "2")]
    pub teams: BTreeMap<String, Team>,
}

impl PlayerSearchResponse {
    /// Append a player and the team it references
    pub fn push(&mut self, player: Player, teams: &BTreeMap<String, Team>) {
        if !self.teams.contains_key(&player.team_code) {
            if let Some(team) = teams.get(&player.team_code) {
                self.teams.insert(team.code.clone(), team.clone());
            }
        }
        self.players.push(player);
    }

    /// Drop every player and team
    pub fn clear(&mut self) {
        self.players.clear();
        self.teams.clear();
    }
}

// ============================================================================
// METHODS
// ============================================================================

fn method<Req, Resp>(method_type: MethodType, name: &str) -> Method<Req, Resp>
where
    Req: prost::Message + Default + 'static,
    Resp: prost::Message + Default + 'static,
{
    Method::new(method_type, SERVICE_NAME, name, Marshaller::prost(), Marshaller::prost())
}

/// `SearchTeam` (unary)
pub fn search_team_method() -> Method<TeamSearchRequest, TeamSearchResponse> {
    method(MethodType::Unary, "SearchTeam")
}

/// `SearchPlayer_ServerStream`
pub fn search_player_server_stream_method() -> Method<PlayerSearchRequest, PlayerSearchResponse> {
    method(MethodType::ServerStreaming, "SearchPlayer_ServerStream")
}

/// `SearchPlayer_ClientStream`
pub fn search_player_client_stream_method() -> Method<PlayerSearchRequest, PlayerSearchResponse> {
    method(MethodType::ClientStreaming, "SearchPlayer_ClientStream")
}

/// `SearchPlayer_DuplexStream`
pub fn search_player_duplex_stream_method() -> Method<PlayerSearchRequest, PlayerSearchResponse> {
    method(MethodType::DuplexStreaming, "SearchPlayer_DuplexStream")
}

/// `PushPlayer` (server stream until cancelled)
pub fn push_player_method() -> Method<PlayerSearchRequest, PlayerSearchResponse> {
    method(MethodType::ServerStreaming, "PushPlayer")
}
