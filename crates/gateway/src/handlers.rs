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
//! # Gateway Exception Handlers
//!
//! ## Purpose
//! Building blocks for the gateway's error cascade. A handler inspects a failure and either
//! claims it by returning an [`ErrorResponse`] or passes with `None`.
//!
//! ## Cascade
//! 1. Failures carrying a status go to the method's status handler, then the gateway's
//! 2. Unclaimed failures go to the method's general handler, then the gateway's
//! 3. Nothing claimed the failure: HTTP 500 without a body

use std::sync::Arc;

use http::StatusCode;
use serde_json::{json, Value};
use tonic::{Code, Status};

use crate::error::GatewayError;

/// How a claimed failure is answered
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorResponse {
    /// HTTP status; `200 OK` when unset
    pub status: Option<StatusCode>,
    /// JSON body; empty when unset
    pub body: Option<Value>,
}

impl ErrorResponse {
    /// Response with a status and a body
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self {
            status: Some(status),
            body: Some(body),
        }
    }
}

/// Handler for failures carrying a protocol status
pub type StatusErrorHandler = Arc<dyn Fn(&Status) -> Option<ErrorResponse> + Send + Sync>;

/// Handler for any gateway failure
pub type ErrorHandler = Arc<dyn Fn(&GatewayError) -> Option<ErrorResponse> + Send + Sync>;

/// Claim a status with the mapped HTTP code and a `{code, message}` body
pub fn respond_with_status(status: &Status) -> Option<ErrorResponse> {
    Some(ErrorResponse::new(
        status_code_to_http(status.code()),
        json!({
            "code": status.code() as i32,
            "message": status.message(),
        }),
    ))
}

/// Claim any failure with `500` and a `{message}` body
pub fn respond_with_error(error: &GatewayError) -> Option<ErrorResponse> {
    Some(ErrorResponse::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "message": error.to_string() }),
    ))
}

/// Never claim
pub fn not_handle<E: ?Sized>(_error: &E) -> Option<ErrorResponse> {
    None
}

/// HTTP status conventionally used for an RPC status code
pub fn status_code_to_http(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        Code::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        Code::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists => StatusCode::CONFLICT,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::FailedPrecondition => StatusCode::BAD_REQUEST,
        Code::Aborted => StatusCode::CONFLICT,
        Code::OutOfRange => StatusCode::BAD_REQUEST,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
    }
}
