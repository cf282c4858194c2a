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

//! # Method Descriptors and Marshallers
//!
//! ## Purpose
//! Identifies an RPC method (service, name, call shape, payload types) and carries the
//! functions that turn its payloads into bytes and back.
//!
//! ## Design
//! - `MethodInfo` is untyped and shared (`Arc`) by call state, telemetry and handlers
//! - `Method<Req, Resp>` adds the typed marshallers; it is immutable once built
//! - Marshallers are plain function pairs so any encoding can be plugged in

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use prost::Message;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::MarshalError;

/// The four canonical RPC call shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodType {
    /// Single request, single response
    Unary,
    /// Request stream, single response
    ClientStreaming,
    /// Single request, response stream
    ServerStreaming,
    /// Request stream, response stream
    DuplexStreaming,
}

impl MethodType {
    /// Whether the client sends a stream of requests
    pub fn is_request_streaming(&self) -> bool {
        matches!(self, MethodType::ClientStreaming | MethodType::DuplexStreaming)
    }

    /// Whether the server answers with a stream of responses
    pub fn is_response_streaming(&self) -> bool {
        matches!(self, MethodType::ServerStreaming | MethodType::DuplexStreaming)
    }

    /// Lowercase label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodType::Unary => "unary",
            MethodType::ClientStreaming => "client_streaming",
            MethodType::ServerStreaming => "server_streaming",
            MethodType::DuplexStreaming => "duplex_streaming",
        }
    }
}

impl fmt::Display for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Untyped identity of an RPC method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodInfo {
    service_name: String,
    name: String,
    full_name: String,
    method_type: MethodType,
    request_type: String,
    response_type: String,
}

impl MethodInfo {
    /// Create a method identity
    ///
    /// ## Arguments
    /// * `method_type` - Call shape
    /// * `service_name` - Service name, e.g. `PlayerSearch` or `pkg.PlayerSearch`
    /// * `name` - Method name
    /// * `request_type` / `response_type` - Payload type names (informational)
    pub fn new(
        method_type: MethodType,
        service_name: impl Into<String>,
        name: impl Into<String>,
        request_type: impl Into<String>,
        response_type: impl Into<String>,
    ) -> Self {
        let service_name = service_name.into();
        let name = name.into();
        let full_name = format!("/{}/{}", service_name, name);
        Self {
            service_name,
            name,
            full_name,
            method_type,
            request_type: request_type.into(),
            response_type: response_type.into(),
        }
    }

    /// Service name
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully-qualified name, `/Service/Method`
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Call shape
    pub fn method_type(&self) -> MethodType {
        self.method_type
    }

    /// Request payload type name
    pub fn request_type(&self) -> &str {
        &self.request_type
    }

    /// Response payload type name
    pub fn response_type(&self) -> &str {
        &self.response_type
    }
}

/// Split a full method path into service and method
///
/// ## Examples
/// - `/examples.PlayerSearch/SearchTeam` → `("examples.PlayerSearch", "SearchTeam")`
/// - `/PlayerSearch/SearchTeam` → `("PlayerSearch", "SearchTeam")`
/// - `SearchTeam` → `None`
pub fn parse_full_name(path: &str) -> Option<(&str, &str)> {
    let trimmed = path.strip_prefix('/')?;
    let slash = trimmed.rfind('/')?;
    let (service, method) = (&trimmed[..slash], &trimmed[slash + 1..]);
    if service.is_empty() || method.is_empty() {
        return None;
    }
    Some((service, method))
}

/// Last path segment of a Rust type name (`grpckit_sample::messages::Team` → `Team`)
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

type SerializeFn<T> = Arc<dyn Fn(&T) -> Result<Bytes, MarshalError> + Send + Sync>;
type DeserializeFn<T> = Arc<dyn Fn(&[u8]) -> Result<T, MarshalError> + Send + Sync>;

/// Serialize/deserialize function pair for one payload type
pub struct Marshaller<T> {
    serializer: SerializeFn<T>,
    deserializer: DeserializeFn<T>,
}

impl<T> Clone for Marshaller<T> {
    fn clone(&self) -> Self {
        Self {
            serializer: self.serializer.clone(),
            deserializer: self.deserializer.clone(),
        }
    }
}

impl<T> fmt::Debug for Marshaller<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Marshaller")
            .field("type", &type_name::<T>())
            .finish()
    }
}

impl<T> Marshaller<T> {
    /// Build a marshaller from two functions
    pub fn new<S, D>(serializer: S, deserializer: D) -> Self
    where
        S: Fn(&T) -> Result<Bytes, MarshalError> + Send + Sync + 'static,
        D: Fn(&[u8]) -> Result<T, MarshalError> + Send + Sync + 'static,
    {
        Self {
            serializer: Arc::new(serializer),
            deserializer: Arc::new(deserializer),
        }
    }

    /// Serialize a message
    pub fn serialize(&self, value: &T) -> Result<Bytes, MarshalError> {
        (self.serializer)(value)
    }

    /// Deserialize a message
    pub fn deserialize(&self, bytes: &[u8]) -> Result<T, MarshalError> {
        (self.deserializer)(bytes)
    }
}

impl<T> Marshaller<T>
where
    T: Message + Default + 'static,
{
    /// Protobuf marshaller (the default wire contract)
    pub fn prost() -> Self {
        Self::new(
            |value: &T| Ok(Bytes::from(value.encode_to_vec())),
            |bytes: &[u8]| T::decode(bytes).map_err(MarshalError::from),
        )
    }
}

impl<T> Marshaller<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    /// JSON marshaller
    pub fn json() -> Self {
        Self::new(
            |value: &T| Ok(Bytes::from(serde_json::to_vec(value)?)),
            |bytes: &[u8]| serde_json::from_slice(bytes).map_err(MarshalError::from),
        )
    }
}

impl Marshaller<Bytes> {
    /// Pass-through marshaller for raw byte payloads
    pub fn bytes() -> Self {
        Self::new(
            |value: &Bytes| Ok(value.clone()),
            |bytes: &[u8]| Ok(Bytes::copy_from_slice(bytes)),
        )
    }
}

/// Typed method descriptor
pub struct Method<Req, Resp> {
    info: Arc<MethodInfo>,
    request_marshaller: Marshaller<Req>,
    response_marshaller: Marshaller<Resp>,
}

impl<Req, Resp> Clone for Method<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            info: self.info.clone(),
            request_marshaller: self.request_marshaller.clone(),
            response_marshaller: self.response_marshaller.clone(),
        }
    }
}

impl<Req, Resp> fmt::Debug for Method<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method").field("info", &self.info).finish()
    }
}

impl<Req, Resp> Method<Req, Resp> {
    /// Create a typed descriptor
    pub fn new(
        method_type: MethodType,
        service_name: impl Into<String>,
        name: impl Into<String>,
        request_marshaller: Marshaller<Req>,
        response_marshaller: Marshaller<Resp>,
    ) -> Self {
        let info = MethodInfo::new(
            method_type,
            service_name,
            name,
            short_type_name::<Req>(),
            short_type_name::<Resp>(),
        );
        Self {
            info: Arc::new(info),
            request_marshaller,
            response_marshaller,
        }
    }

    /// Replace both marshallers, keeping the identity
    pub fn with_marshallers<R2, S2>(
        &self,
        request_marshaller: Marshaller<R2>,
        response_marshaller: Marshaller<S2>,
    ) -> Method<R2, S2> {
        Method {
            info: self.info.clone(),
            request_marshaller,
            response_marshaller,
        }
    }

    /// Untyped identity
    pub fn info(&self) -> &Arc<MethodInfo> {
        &self.info
    }

    /// Full name, `/Service/Method`
    pub fn full_name(&self) -> &str {
        self.info.full_name()
    }

    /// Call shape
    pub fn method_type(&self) -> MethodType {
        self.info.method_type()
    }

    /// Request marshaller
    pub fn request_marshaller(&self) -> &Marshaller<Req> {
        &self.request_marshaller
    }

    /// Response marshaller
    pub fn response_marshaller(&self) -> &Marshaller<Resp> {
        &self.response_marshaller
    }
}

impl<Req, Resp> Method<Req, Resp>
where
    Req: Message + Default + 'static,
    Resp: Message + Default + 'static,
{
    /// Descriptor with protobuf marshallers
    pub fn prost(
        method_type: MethodType,
        service_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::new(
            method_type,
            service_name,
            name,
            Marshaller::prost(),
            Marshaller::prost(),
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Clone, PartialEq, Message)]
    struct Ping {
        #[prost(int32, tag = "1")]
        count: i32,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        text: String,
    }

    #[test]
    fn test_full_name_and_shape() {
        let method: Method<Ping, Ping> = Method::prost(MethodType::DuplexStreaming, "Echo", "Chat");
        assert_eq!(method.full_name(), "/Echo/Chat");
        assert_eq!(method.info().request_type(), "Ping");
        assert!(method.method_type().is_request_streaming());
        assert!(method.method_type().is_response_streaming());
        assert!(!MethodType::Unary.is_request_streaming());
        assert!(MethodType::ServerStreaming.is_response_streaming());
    }

    #[test]
    fn test_parse_full_name() {
        assert_eq!(
            parse_full_name("/examples.PlayerSearch/SearchTeam"),
            Some(("examples.PlayerSearch", "SearchTeam"))
        );
        assert_eq!(parse_full_name("/PlayerSearch/"), None);
        assert_eq!(parse_full_name("SearchTeam"), None);
    }

    #[test]
    fn test_prost_marshaller() {
        let marshaller = Marshaller::<Ping>::prost();
        let bytes = marshaller.serialize(&Ping { count: 42 }).unwrap();
        assert_eq!(marshaller.deserialize(&bytes).unwrap().count, 42);
        assert!(marshaller.deserialize(&[0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn test_json_marshaller_reports_errors() {
        let marshaller = Marshaller::<Note>::json();
        let err = marshaller.deserialize(b"{not json").unwrap_err();
        assert!(matches!(err, MarshalError::Json(_)));
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<Ping>(), "Ping");
        assert_eq!(short_type_name::<Vec<Ping>>(), "Vec");
    }
}
