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

//! # Error Taxonomy
//!
//! ## Purpose
//! One error type travels through the client invoker, the server pipeline and the gateway.
//!
//! ## Categories
//! - **Status**: a `tonic::Status`, the canonical cross-boundary representation
//! - **Interceptor**: an interceptor itself failed; carries the interceptor and method names
//! - **MethodInvocation**: a server method body failed; wraps the original error
//! - **Serializer**: a marshaller failed; carries service, method and payload type
//! - **Application**: anything else raised by user code
//!
//! Wrapped errors are walked by [`GrpcError::actual_status`] to find the status underneath.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;
use tonic::{Code, Status};

/// Boxed error used for application failures
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors raised while (de)serializing a message
#[derive(Debug, Error)]
pub enum MarshalError {
    /// Protobuf decoding failed
    #[error("protobuf decode failed: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Protobuf encoding failed
    #[error("protobuf encode failed: {0}")]
    Encode(#[from] prost::EncodeError),

    /// JSON (de)serialization failed
    #[error("json conversion failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Custom marshaller failure
    #[error("{0}")]
    Other(String),
}

/// Direction of a failed marshaller call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarshalOperation {
    /// Message to bytes
    Serialize,
    /// Bytes to message
    Deserialize,
}

impl fmt::Display for MarshalOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarshalOperation::Serialize => f.write_str("serialize"),
            MarshalOperation::Deserialize => f.write_str("deserialize"),
        }
    }
}

/// Errors returned by interceptors and exception handlers
#[derive(Debug, Error)]
pub enum InterceptorError {
    /// Call rejected by the interceptor
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Interceptor produced a status
    #[error(transparent)]
    Status(#[from] Status),

    /// Interceptor panicked
    #[error("Interceptor panicked: {0}")]
    Panicked(String),

    /// Generic failure
    #[error("Interceptor error: {0}")]
    Other(String),
}

/// Error flowing through client calls, server handlers and the gateway
#[derive(Debug, Error)]
pub enum GrpcError {
    /// Protocol status error
    #[error("{}", format_status(.0))]
    Status(#[from] Status),

    /// An interceptor or exception handler failed while processing a method
    #[error("Interceptor '{interceptor}' failed while processing {method}: {source}")]
    Interceptor {
        /// Full method name
        method: String,
        /// Name of the failing interceptor
        interceptor: String,
        /// What the interceptor raised
        #[source]
        source: InterceptorError,
    },

    /// A server method body failed
    #[error("Server method {method} failed: {source}")]
    MethodInvocation {
        /// Full method name
        method: String,
        /// Error raised by the method
        #[source]
        source: Box<GrpcError>,
    },

    /// A marshaller failed
    #[error("Failed to {operation} {type_name} for /{service}/{method}: {source}")]
    Serializer {
        /// Service name
        service: String,
        /// Method name
        method: String,
        /// Payload type
        type_name: String,
        /// Direction
        operation: MarshalOperation,
        /// Underlying failure
        #[source]
        source: MarshalError,
    },

    /// Failure raised by application code
    #[error("{0}")]
    Application(#[source] BoxError),
}

fn format_status(status: &Status) -> String {
    format!("status: {:?}, message: {:?}", status.code(), status.message())
}

impl GrpcError {
    /// Wrap an arbitrary application error
    pub fn application<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        GrpcError::Application(error.into())
    }

    /// Find the protocol status carried by this error or any error it wraps
    ///
    /// ## Returns
    /// The innermost `Status` reachable through interceptor failures, method-invocation
    /// wrappers and boxed application errors, or `None` when there is none.
    pub fn actual_status(&self) -> Option<&Status> {
        match self {
            GrpcError::Status(status) => Some(status),
            GrpcError::Interceptor {
                source: InterceptorError::Status(status),
                ..
            } => Some(status),
            GrpcError::Interceptor { .. } => None,
            GrpcError::MethodInvocation { source, .. } => source.actual_status(),
            GrpcError::Serializer { .. } => None,
            GrpcError::Application(error) => find_status(error.as_ref()),
        }
    }

    /// Whether this error is a status error directly (not wrapped)
    pub fn is_status(&self) -> bool {
        matches!(self, GrpcError::Status(_))
    }

    /// Status code of the actual status, `Unknown` when there is none
    pub fn code(&self) -> Code {
        self.actual_status()
            .map(|status| status.code())
            .unwrap_or(Code::Unknown)
    }

    /// Whether the actual status is `Cancelled`
    pub fn is_cancelled(&self) -> bool {
        self.actual_status()
            .map(|status| status.code() == Code::Cancelled)
            .unwrap_or(false)
    }

    /// Convert into a status crossing the RPC boundary
    ///
    /// Only a direct status error passes through unchanged. Anything else, including a
    /// wrapper around a status, becomes `Internal` carrying the error message.
    pub fn into_status(self) -> Status {
        match self {
            GrpcError::Status(status) => status,
            other => Status::internal(other.to_string()),
        }
    }
}

fn find_status<'a>(error: &'a (dyn StdError + 'static)) -> Option<&'a Status> {
    let mut current: Option<&'a (dyn StdError + 'static)> = Some(error);
    while let Some(err) = current {
        if let Some(status) = err.downcast_ref::<Status>() {
            return Some(status);
        }
        if let Some(grpc) = err.downcast_ref::<GrpcError>() {
            return grpc.actual_status();
        }
        current = err.source();
    }
    None
}

impl From<GrpcError> for Status {
    fn from(err: GrpcError) -> Status {
        err.into_status()
    }
}

/// Whether a status represents a cancelled call
pub fn is_cancelled(status: &Status) -> bool {
    status.code() == Code::Cancelled
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer failure")]
    struct Outer {
        #[source]
        inner: Status,
    }

    #[test]
    fn test_actual_status_direct() {
        let err = GrpcError::Status(Status::not_found("missing"));
        assert_eq!(err.code(), Code::NotFound);
        assert!(err.is_status());
    }

    #[test]
    fn test_actual_status_through_method_invocation() {
        let err = GrpcError::MethodInvocation {
            method: "/PlayerSearch/SearchTeam".to_string(),
            source: Box::new(GrpcError::Status(Status::cancelled("canceled by user."))),
        };
        assert!(err.is_cancelled());
        assert!(!err.is_status());
    }

    #[test]
    fn test_actual_status_through_source_chain() {
        let err = GrpcError::application(Outer {
            inner: Status::permission_denied("nope"),
        });
        assert_eq!(err.code(), Code::PermissionDenied);
    }

    #[test]
    fn test_into_status_wraps_non_status_as_internal() {
        let err = GrpcError::application("database exploded");
        let status = err.into_status();
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "database exploded");
    }

    #[test]
    fn test_into_status_does_not_unwrap_method_failures() {
        let err = GrpcError::MethodInvocation {
            method: "/Calc/Double".to_string(),
            source: Box::new(GrpcError::Status(Status::invalid_argument("zero"))),
        };
        assert_eq!(err.code(), Code::InvalidArgument);
        let status = err.into_status();
        assert_eq!(status.code(), Code::Internal);
        assert!(status.message().starts_with("Server method /Calc/Double failed"));
    }

    #[test]
    fn test_into_status_keeps_direct_status() {
        let status = GrpcError::Status(Status::not_found("missing")).into_status();
        assert_eq!(status.code(), Code::NotFound);
        assert_eq!(status.message(), "missing");
    }

    #[test]
    fn test_interceptor_error_message_names_interceptor() {
        let err = GrpcError::Interceptor {
            method: "/PlayerSearch/SearchTeam".to_string(),
            interceptor: "auth".to_string(),
            source: InterceptorError::Rejected("no token".to_string()),
        };
        let text = err.to_string();
        assert!(text.contains("auth"));
        assert!(text.contains("/PlayerSearch/SearchTeam"));
        assert_eq!(err.code(), Code::Unknown);
    }

    #[test]
    fn test_serializer_error_message() {
        let err = GrpcError::Serializer {
            service: "PlayerSearch".to_string(),
            method: "SearchTeam".to_string(),
            type_name: "TeamSearchRequest".to_string(),
            operation: MarshalOperation::Deserialize,
            source: MarshalError::Other("truncated".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Failed to deserialize TeamSearchRequest for /PlayerSearch/SearchTeam: truncated"
        );
    }
}
