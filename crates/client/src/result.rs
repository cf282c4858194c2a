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

//! # Result Wrapper
//!
//! ## Purpose
//! [`GrpcResult`] is the uniform outcome of the streaming extensions: either a response
//! together with the call it came from, or the error that ended the call.
//!
//! ## Status Classification
//! - Built from an error: the status is available at once; its code is the code of the
//!   actual status found inside the error, or `Unknown`
//! - Built from a response: the status becomes available once both
//!   `request_stream_completed` and `response_ended` are set on the call
//! - `is_ok`, `is_cancelled` and `is_error` are all `false` while the status is unknown

use std::fmt;

use grpckit_common::{GrpcError, Metadata};
use tonic::{Code, Status};

use crate::call::SharedCallState;

enum Outcome<T> {
    Response {
        value: T,
        call: Option<SharedCallState>,
    },
    Failure(GrpcError),
}

/// Outcome of a call: a response plus its call state, or an error
pub struct GrpcResult<T = ()> {
    outcome: Outcome<T>,
}

impl<T: fmt::Debug> fmt::Debug for GrpcResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Response { value, call } => f
                .debug_struct("GrpcResult")
                .field("response", value)
                .field("tracked", &call.is_some())
                .field("status_code", &self.status_code())
                .finish(),
            Outcome::Failure(error) => f
                .debug_struct("GrpcResult")
                .field("error", error)
                .finish(),
        }
    }
}

impl<T> GrpcResult<T> {
    /// Response of a call whose status is read from `call`
    pub fn from_response(value: T, call: SharedCallState) -> Self {
        Self {
            outcome: Outcome::Response {
                value,
                call: Some(call),
            },
        }
    }

    /// Response without a call; the status reads as `Ok`
    pub fn from_value(value: T) -> Self {
        Self {
            outcome: Outcome::Response { value, call: None },
        }
    }

    /// Failed call
    pub fn from_error(error: GrpcError) -> Self {
        Self {
            outcome: Outcome::Failure(error),
        }
    }

    /// Response, if the call succeeded
    pub fn response(&self) -> Option<&T> {
        match &self.outcome {
            Outcome::Response { value, .. } => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    /// Take the response
    pub fn into_response(self) -> Option<T> {
        match self.outcome {
            Outcome::Response { value, .. } => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    /// Error that ended the call
    pub fn error(&self) -> Option<&GrpcError> {
        match &self.outcome {
            Outcome::Response { .. } => None,
            Outcome::Failure(error) => Some(error),
        }
    }

    /// Convert into a plain `Result`
    pub fn into_result(self) -> Result<T, GrpcError> {
        match self.outcome {
            Outcome::Response { value, .. } => Ok(value),
            Outcome::Failure(error) => Err(error),
        }
    }

    /// Convert the response, keeping the call state or the error
    pub fn map<U, F>(self, convert: F) -> GrpcResult<U>
    where
        F: FnOnce(T) -> U,
    {
        GrpcResult {
            outcome: match self.outcome {
                Outcome::Response { value, call } => Outcome::Response {
                    value: convert(value),
                    call,
                },
                Outcome::Failure(error) => Outcome::Failure(error),
            },
        }
    }

    fn completed_call(&self) -> Option<&SharedCallState> {
        match &self.outcome {
            Outcome::Response {
                call: Some(call), ..
            } if call.is_request_stream_completed() && call.is_response_ended() => Some(call),
            _ => None,
        }
    }

    /// Whether the final status can be read
    pub fn can_get_status(&self) -> bool {
        match &self.outcome {
            Outcome::Failure(_) => true,
            Outcome::Response { call: None, .. } => true,
            Outcome::Response { .. } => self.completed_call().is_some(),
        }
    }

    /// Final status code, `None` while unknown
    pub fn status_code(&self) -> Option<Code> {
        match &self.outcome {
            Outcome::Failure(error) => Some(error.code()),
            Outcome::Response { call: None, .. } => Some(Code::Ok),
            Outcome::Response { .. } => self
                .completed_call()
                .and_then(|call| call.status())
                .map(|status| status.code()),
        }
    }

    /// Final status detail, `None` while unknown
    pub fn status_detail(&self) -> Option<String> {
        match &self.outcome {
            Outcome::Failure(error) => Some(match error.actual_status() {
                Some(status) => status.message().to_string(),
                None => error.to_string(),
            }),
            Outcome::Response { call: None, .. } => Some(String::new()),
            Outcome::Response { .. } => self
                .completed_call()
                .and_then(|call| call.status())
                .map(|status| status.message().to_string()),
        }
    }

    /// Final status, `None` while unknown
    pub fn status(&self) -> Option<Status> {
        match &self.outcome {
            Outcome::Failure(error) => Some(match error.actual_status() {
                Some(status) => status.clone(),
                None => Status::unknown(error.to_string()),
            }),
            Outcome::Response { call: None, .. } => Some(Status::ok("")),
            Outcome::Response { .. } => self.completed_call().and_then(|call| call.status()),
        }
    }

    /// Whether the call finished with `Ok`
    pub fn is_ok(&self) -> bool {
        self.status_code() == Some(Code::Ok)
    }

    /// Whether the call was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.status_code() == Some(Code::Cancelled)
    }

    /// Whether the call failed with anything but `Cancelled`
    pub fn is_error(&self) -> bool {
        matches!(self.status_code(), Some(code) if code != Code::Ok && code != Code::Cancelled)
    }

    /// Whether the call was cancelled or failed
    pub fn is_cancelled_or_error(&self) -> bool {
        self.is_cancelled() || self.is_error()
    }

    /// Whether trailers can be read
    pub fn can_get_trailers(&self) -> bool {
        self.completed_call().is_some()
    }

    /// Trailers of a completed call
    pub fn trailers(&self) -> Option<Metadata> {
        self.completed_call().and_then(|call| call.trailers())
    }
}

impl<T> From<GrpcError> for GrpcResult<T> {
    fn from(error: GrpcError) -> Self {
        Self::from_error(error)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::AsyncCallState;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct FakeCall {
        request_completed: AtomicBool,
        response_ended: AtomicBool,
        status: Status,
    }

    impl FakeCall {
        fn new(status: Status) -> Arc<Self> {
            Arc::new(Self {
                request_completed: AtomicBool::new(false),
                response_ended: AtomicBool::new(false),
                status,
            })
        }
    }

    impl AsyncCallState for FakeCall {
        fn is_request_stream_completed(&self) -> bool {
            self.request_completed.load(Ordering::SeqCst)
        }

        fn is_response_ended(&self) -> bool {
            self.response_ended.load(Ordering::SeqCst)
        }

        fn status(&self) -> Option<Status> {
            Some(self.status.clone())
        }

        fn trailers(&self) -> Option<Metadata> {
            let mut trailers = Metadata::new();
            trailers.add("served-by", "fake");
            Some(trailers)
        }
    }

    #[test]
    fn test_status_requires_both_flags() {
        let call = FakeCall::new(Status::ok(""));
        let result = GrpcResult::from_response(7, call.clone());
        assert!(!result.can_get_status());
        assert_eq!(result.status_code(), None);
        assert!(!result.is_ok() && !result.is_cancelled() && !result.is_error());

        call.request_completed.store(true, Ordering::SeqCst);
        assert!(!result.can_get_status());

        call.response_ended.store(true, Ordering::SeqCst);
        assert!(result.can_get_status());
        assert!(result.is_ok());
        assert_eq!(result.trailers().unwrap().get_str("served-by"), Some("fake"));
        assert_eq!(result.response(), Some(&7));
    }

    #[test]
    fn test_error_classification() {
        let cancelled: GrpcResult<()> =
            GrpcResult::from_error(GrpcError::Status(Status::cancelled("canceled by user.")));
        assert!(cancelled.can_get_status());
        assert!(cancelled.is_cancelled());
        assert!(!cancelled.is_error());
        assert!(cancelled.is_cancelled_or_error());
        assert_eq!(cancelled.status_detail().as_deref(), Some("canceled by user."));
        assert!(!cancelled.can_get_trailers());

        let failed: GrpcResult<()> = GrpcResult::from_error(GrpcError::application("boom"));
        assert_eq!(failed.status_code(), Some(Code::Unknown));
        assert!(failed.is_error());
        assert_eq!(failed.status_detail().as_deref(), Some("boom"));
    }

    #[test]
    fn test_wrapped_status_is_unwrapped() {
        let wrapped = GrpcError::MethodInvocation {
            method: "/PlayerSearch/SearchTeam".to_string(),
            source: Box::new(GrpcError::Status(Status::cancelled("stop"))),
        };
        let result: GrpcResult<()> = wrapped.into();
        assert!(result.is_cancelled());
    }

    #[test]
    fn test_map_keeps_call_state() {
        let call = FakeCall::new(Status::cancelled("late"));
        call.request_completed.store(true, Ordering::SeqCst);
        call.response_ended.store(true, Ordering::SeqCst);
        let result = GrpcResult::from_response(vec![1, 2, 3], call).map(|v| v.len());
        assert_eq!(result.response(), Some(&3));
        assert!(result.is_cancelled());
    }

    #[test]
    fn test_value_without_call_is_ok() {
        let result = GrpcResult::from_value("done");
        assert!(result.can_get_status());
        assert!(result.is_ok());
        assert!(result.trailers().is_none());
    }
}
