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
//! Gateway error types.

use grpckit_common::GrpcError;
use thiserror::Error;
use tonic::Status;

/// Failures while turning an HTTP request into an RPC call and back
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request body could not be read as UTF-8 text
    #[error("Failed to read request body: {0}")]
    Body(String),

    /// The request body is not valid JSON for the method's request type
    #[error("Invalid request JSON for {type_name}: {source}")]
    Deserialize {
        /// Expected request type
        type_name: String,
        /// Parser failure
        #[source]
        source: serde_json::Error,
    },

    /// A response could not be rendered as JSON
    #[error("Failed to serialize {type_name}: {source}")]
    Serialize {
        /// Response type
        type_name: String,
        /// Serializer failure
        #[source]
        source: serde_json::Error,
    },

    /// The RPC call failed
    #[error(transparent)]
    Rpc(#[from] GrpcError),
}

impl GatewayError {
    /// Protocol status carried by the error, looking through wrapped RPC errors
    pub fn actual_status(&self) -> Option<&Status> {
        match self {
            GatewayError::Rpc(error) => error.actual_status(),
            _ => None,
        }
    }
}
