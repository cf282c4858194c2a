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

//! # Instrumented Codecs
//!
//! ## Purpose
//! Wraps the marshallers of a [`Method`] so every (de)serialization reports a
//! `Serialized`/`Deserialized` performance event with its byte size and elapsed time, and
//! every marshaller failure becomes a [`GrpcError::Serializer`] that is also reported to the
//! exception notifier.
//!
//! The client invoker and the server service builder build one [`MethodCodec`] per method
//! and reuse it for every call.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;

use crate::error::{GrpcError, MarshalOperation};
use crate::method::{Marshaller, Method, MethodInfo};
use crate::telemetry::{
    CallSide, ExceptionNotifier, PerformanceEvent, PerformanceEventKind, PerformanceNotifier,
};

/// Instrumented marshaller for one payload type of one method
pub struct MessageCodec<T> {
    info: Arc<MethodInfo>,
    type_name: Arc<str>,
    marshaller: Marshaller<T>,
    side: CallSide,
    performance: PerformanceNotifier,
    exceptions: ExceptionNotifier,
}

impl<T> Clone for MessageCodec<T> {
    fn clone(&self) -> Self {
        Self {
            info: self.info.clone(),
            type_name: self.type_name.clone(),
            marshaller: self.marshaller.clone(),
            side: self.side,
            performance: self.performance.clone(),
            exceptions: self.exceptions.clone(),
        }
    }
}

impl<T> fmt::Debug for MessageCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageCodec")
            .field("method", &self.info.full_name())
            .field("type_name", &self.type_name)
            .field("side", &self.side)
            .finish()
    }
}

impl<T> MessageCodec<T> {
    /// Wrap a marshaller
    pub fn new(
        info: Arc<MethodInfo>,
        type_name: &str,
        marshaller: Marshaller<T>,
        side: CallSide,
        performance: PerformanceNotifier,
        exceptions: ExceptionNotifier,
    ) -> Self {
        Self {
            info,
            type_name: Arc::from(type_name),
            marshaller,
            side,
            performance,
            exceptions,
        }
    }

    /// Method this codec belongs to
    pub fn info(&self) -> &Arc<MethodInfo> {
        &self.info
    }

    /// Serialize a message
    pub fn encode(&self, value: &T, host: Option<&str>) -> Result<Bytes, GrpcError> {
        let started = Instant::now();
        match self.marshaller.serialize(value) {
            Ok(bytes) => {
                self.report(PerformanceEventKind::Serialized, host, started, bytes.len());
                Ok(bytes)
            }
            Err(source) => Err(self.failure(MarshalOperation::Serialize, source)),
        }
    }

    /// Deserialize a message
    pub fn decode(&self, bytes: &[u8], host: Option<&str>) -> Result<T, GrpcError> {
        let started = Instant::now();
        match self.marshaller.deserialize(bytes) {
            Ok(value) => {
                self.report(PerformanceEventKind::Deserialized, host, started, bytes.len());
                Ok(value)
            }
            Err(source) => Err(self.failure(MarshalOperation::Deserialize, source)),
        }
    }

    fn report(&self, kind: PerformanceEventKind, host: Option<&str>, started: Instant, size: usize) {
        self.performance.notify_with(|| {
            PerformanceEvent::new(kind, self.side, &self.info, host)
                .with_elapsed(started.elapsed())
                .with_byte_size(size)
                .with_type_name(&self.type_name)
        });
    }

    fn failure(&self, operation: MarshalOperation, source: crate::error::MarshalError) -> GrpcError {
        let error = GrpcError::Serializer {
            service: self.info.service_name().to_string(),
            method: self.info.name().to_string(),
            type_name: self.type_name.to_string(),
            operation,
            source,
        };
        self.exceptions.notify_serializer(&self.info, &error);
        error
    }
}

/// Request and response codecs of one method
pub struct MethodCodec<Req, Resp> {
    /// Request payload codec
    pub request: MessageCodec<Req>,
    /// Response payload codec
    pub response: MessageCodec<Resp>,
}

impl<Req, Resp> Clone for MethodCodec<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            request: self.request.clone(),
            response: self.response.clone(),
        }
    }
}

impl<Req, Resp> fmt::Debug for MethodCodec<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodCodec")
            .field("request", &self.request)
            .field("response", &self.response)
            .finish()
    }
}

impl<Req, Resp> MethodCodec<Req, Resp> {
    /// Instrument both marshallers of a method
    pub fn new(
        method: &Method<Req, Resp>,
        side: CallSide,
        performance: PerformanceNotifier,
        exceptions: ExceptionNotifier,
    ) -> Self {
        let info = method.info().clone();
        Self {
            request: MessageCodec::new(
                info.clone(),
                info.request_type(),
                method.request_marshaller().clone(),
                side,
                performance.clone(),
                exceptions.clone(),
            ),
            response: MessageCodec::new(
                info.clone(),
                info.response_type(),
                method.response_marshaller().clone(),
                side,
                performance,
                exceptions,
            ),
        }
    }

    /// Method identity
    pub fn info(&self) -> &Arc<MethodInfo> {
        self.request.info()
    }
}
