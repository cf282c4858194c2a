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
//! # GrpcKit Gateway
//!
//! ## Purpose
//! Exposes RPC methods as HTTP endpoints taking and returning JSON, as a tower layer that can
//! sit in front of any axum router.
//!
//! ## Usage
//! ```ignore
//! let gateway = Gateway::new(GatewaySettings::new(channel))
//!     .with_method(GatewayMethod::new(search_team_method()))
//!     .with_method(GatewayMethod::new(search_players_method()).with_path("/api/players"));
//! let app = axum::Router::new()
//!     .route("/health", get(|| async { "ok" }))
//!     .layer(gateway.into_layer());
//! ```
//!
//! ## Body Conventions
//! - Unary and server-streaming methods take a single JSON object
//! - Client-streaming and duplex methods take a JSON array (an empty body sends nothing)
//! - Server-streaming and duplex methods answer with a JSON array

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod gateway;
pub mod handlers;
pub mod layer;
pub mod method;
pub mod serializer;
pub mod settings;

pub use error::GatewayError;
pub use gateway::Gateway;
pub use handlers::{
    not_handle, respond_with_error, respond_with_status, status_code_to_http, ErrorHandler, ErrorResponse,
    StatusErrorHandler,
};
pub use layer::{GatewayLayer, GatewayService};
pub use method::GatewayMethod;
pub use serializer::{JsonSerializer, SerdeJsonSerializer};
pub use settings::{prefix_header_filter, GatewaySettings, HeaderFilter, DEFAULT_HEADER_PREFIX};
