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
//! JSON serializer seam.
//!
//! The gateway converts request bodies to [`serde_json::Value`] and back through a
//! [`JsonSerializer`]; typed conversion to the method's payload types happens afterwards with
//! `serde_json::from_value`/`to_value`. A serializer can be set per method or for the whole
//! gateway.

use serde_json::Value;

/// Text to JSON value and back
pub trait JsonSerializer: Send + Sync {
    /// Parse request text
    fn parse(&self, text: &str) -> Result<Value, serde_json::Error>;

    /// Render a response or error body
    fn render(&self, value: &Value) -> Result<String, serde_json::Error>;
}

/// `serde_json` based serializer
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeJsonSerializer {
    pretty: bool,
}

impl SerdeJsonSerializer {
    /// Compact output
    pub fn new() -> Self {
        Self { pretty: false }
    }

    /// Indented output
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl JsonSerializer for SerdeJsonSerializer {
    fn parse(&self, text: &str) -> Result<Value, serde_json::Error> {
        serde_json::from_str(text)
    }

    fn render(&self, value: &Value) -> Result<String, serde_json::Error> {
        if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
    }
}
