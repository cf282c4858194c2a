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

//! Heartbeat method shared by the heartbeat service and client.
//!
//! A duplex call over raw bytes: the client sends `[0]` pings, the server answers each with `[1]`.

use bytes::Bytes;

use crate::method::{Marshaller, Method, MethodType};

/// Default heartbeat service name
pub const DEFAULT_SERVICE_NAME: &str = "GrpcHeartbeat";

/// Default heartbeat method name
pub const DEFAULT_METHOD_NAME: &str = "Heartbeat";

/// Payload sent by the client
pub const PING: u8 = 0;

/// Payload returned by the server
pub const PONG: u8 = 1;

/// Heartbeat method with the default names
pub fn heartbeat_method() -> Method<Bytes, Bytes> {
    heartbeat_method_named(DEFAULT_SERVICE_NAME, DEFAULT_METHOD_NAME)
}

/// Heartbeat method with custom service and method names
pub fn heartbeat_method_named(service_name: &str, method_name: &str) -> Method<Bytes, Bytes> {
    Method::new(
        MethodType::DuplexStreaming,
        service_name,
        method_name,
        Marshaller::bytes(),
        Marshaller::bytes(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_heartbeat_method() {
        let method = heartbeat_method();
        assert_eq!(method.full_name(), "/GrpcHeartbeat/Heartbeat");
        assert_eq!(method.method_type(), MethodType::DuplexStreaming);
        let bytes = method.request_marshaller().serialize(&Bytes::from_static(&[PING])).unwrap();
        assert_eq!(&bytes[..], &[PING]);
    }

    #[test]
    fn test_named_heartbeat_method() {
        let method = heartbeat_method_named("Health", "Beat");
        assert_eq!(method.full_name(), "/Health/Beat");
    }
}
