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
//! # GrpcKit Sample
//!
//! ## Purpose
//! Player search service exercising every call shape through the middleware: interceptors,
//! telemetry, call-state tracking and the HTTP gateway.
//!
//! ## Components
//! - [`messages`]: protobuf/serde messages and method descriptors
//! - [`repository`]: generated teams and players
//! - [`service`]: the service implementation
//! - [`config`]: TOML settings with environment overrides
//! - [`host`]: in-process server and gateway wiring
//! - [`demo`]: demo client used by the CLI

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod demo;
pub mod host;
pub mod messages;
pub mod repository;
pub mod service;

pub use config::{SampleSettings, SettingsError};
pub use demo::{DemoClient, PushOutcome, SearchMode};
pub use service::{build_definition, PlayerSearchService, SearchOptions};
