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
//! # Method Classification
//!
//! ## Purpose
//! Decides the call shape of a service method from its handler signature and extracts the
//! request and response payload types.
//!
//! ## Shapes
//! | Shape            | Parameters                                 | Returns            |
//! |------------------|--------------------------------------------|--------------------|
//! | Unary            | (message, context)                         | response           |
//! | Client streaming | (request stream, context)                  | response           |
//! | Server streaming | (message, response stream, context)        | unit               |
//! | Duplex streaming | (request stream, response stream, context) | unit               |
//!
//! Anything else is not a service method and is skipped by the builder. Classification is a
//! pure function over [`MethodSignature`], so it can be checked without building a service.

use grpckit_common::method::short_type_name;
use grpckit_common::MethodType;

/// One parameter of a handler signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterKind {
    /// A single request message of the named type
    Message(String),
    /// A stream of request messages of the named type
    RequestStream(String),
    /// A writer of response messages of the named type
    ResponseStream(String),
    /// The server call context
    Context,
    /// Anything else
    Other(String),
}

/// Completion value of a handler signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnKind {
    /// Completes with a response message of the named type
    Response(String),
    /// Completes without a value
    Unit,
    /// Anything else
    Other(String),
}

/// Parameters and completion value of a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    /// Parameters in declaration order
    pub parameters: Vec<ParameterKind>,
    /// Completion value
    pub returns: ReturnKind,
}

impl MethodSignature {
    /// Signature from explicit parts
    pub fn new(parameters: Vec<ParameterKind>, returns: ReturnKind) -> Self {
        Self {
            parameters,
            returns,
        }
    }

    /// `(Req, context) -> Resp`
    pub fn unary<Req, Resp>() -> Self {
        Self::new(
            vec![ParameterKind::Message(type_name::<Req>()), ParameterKind::Context],
            ReturnKind::Response(type_name::<Resp>()),
        )
    }

    /// `(stream of Req, context) -> Resp`
    pub fn client_streaming<Req, Resp>() -> Self {
        Self::new(
            vec![
                ParameterKind::RequestStream(type_name::<Req>()),
                ParameterKind::Context,
            ],
            ReturnKind::Response(type_name::<Resp>()),
        )
    }

    /// `(Req, writer of Resp, context) -> ()`
    pub fn server_streaming<Req, Resp>() -> Self {
        Self::new(
            vec![
                ParameterKind::Message(type_name::<Req>()),
                ParameterKind::ResponseStream(type_name::<Resp>()),
                ParameterKind::Context,
            ],
            ReturnKind::Unit,
        )
    }

    /// `(stream of Req, writer of Resp, context) -> ()`
    pub fn duplex_streaming<Req, Resp>() -> Self {
        Self::new(
            vec![
                ParameterKind::RequestStream(type_name::<Req>()),
                ParameterKind::ResponseStream(type_name::<Resp>()),
                ParameterKind::Context,
            ],
            ReturnKind::Unit,
        )
    }
}

fn type_name<T>() -> String {
    short_type_name::<T>().to_string()
}

/// Outcome of a successful classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedMethod {
    /// Call shape
    pub method_type: MethodType,
    /// Request payload type
    pub request_type: String,
    /// Response payload type
    pub response_type: String,
}

impl ClassifiedMethod {
    fn new(method_type: MethodType, request_type: &str, response_type: &str) -> Self {
        Self {
            method_type,
            request_type: request_type.to_string(),
            response_type: response_type.to_string(),
        }
    }
}

/// Match a signature against the four call shapes
///
/// ## Returns
/// The shape and payload types, or `None` when the signature matches no shape.
pub fn classify(signature: &MethodSignature) -> Option<ClassifiedMethod> {
    use ParameterKind::{Context, Message, RequestStream, ResponseStream};

    match (signature.parameters.as_slice(), &signature.returns) {
        ([Message(request), Context], ReturnKind::Response(response)) => Some(
            ClassifiedMethod::new(MethodType::Unary, request, response),
        ),
        ([RequestStream(request), Context], ReturnKind::Response(response)) => Some(
            ClassifiedMethod::new(MethodType::ClientStreaming, request, response),
        ),
        ([Message(request), ResponseStream(response), Context], ReturnKind::Unit) => Some(
            ClassifiedMethod::new(MethodType::ServerStreaming, request, response),
        ),
        ([RequestStream(request), ResponseStream(response), Context], ReturnKind::Unit) => Some(
            ClassifiedMethod::new(MethodType::DuplexStreaming, request, response),
        ),
        _ => None,
    }
}

// ============================================================================
// TESTS
// ============================================================================
