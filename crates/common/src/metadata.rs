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

//! Call metadata and per-call options.
//!
//! Keys are lowercased on insert and lookup, so `CallCounter` and `callcounter` name the same
//! header. Keys ending in `-bin` carry binary values.

use std::str::FromStr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tonic::metadata::{
    Ascii, AsciiMetadataValue, Binary, BinaryMetadataValue, KeyAndValueRef, MetadataKey,
    MetadataMap,
};
use tracing::warn;

/// Suffix marking a binary metadata key
pub const BINARY_SUFFIX: &str = "-bin";

/// Metadata value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    /// Printable ASCII value
    Ascii(String),
    /// Binary value (key ends with `-bin`)
    Binary(Bytes),
}

impl MetadataValue {
    /// Text view of an ASCII value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Ascii(value) => Some(value),
            MetadataValue::Binary(_) => None,
        }
    }

    /// Bytes of the value
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            MetadataValue::Ascii(value) => value.as_bytes(),
            MetadataValue::Binary(value) => value,
        }
    }
}

/// Ordered header list with case-normalized keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, MetadataValue)>,
}

fn normalize_key(key: &str) -> String {
    key.to_ascii_lowercase()
}

impl Metadata {
    /// Create empty metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an ASCII entry, keeping existing entries with the same key
    pub fn add(&mut self, key: &str, value: impl Into<String>) {
        self.entries
            .push((normalize_key(key), MetadataValue::Ascii(value.into())));
    }

    /// Append a binary entry; the key gets a `-bin` suffix when missing
    pub fn add_binary(&mut self, key: &str, value: impl Into<Bytes>) {
        let mut key = normalize_key(key);
        if !key.ends_with(BINARY_SUFFIX) {
            key.push_str(BINARY_SUFFIX);
        }
        self.entries.push((key, MetadataValue::Binary(value.into())));
    }

    /// Replace every entry with this key by a single ASCII value
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.remove(key);
        self.add(key, value);
    }

    /// First value for the key
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        let key = normalize_key(key);
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// First ASCII value for the key
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetadataValue::as_str)
    }

    /// First ASCII value for the key, or `default` when missing
    pub fn get_str_or(&self, key: &str, default: &str) -> String {
        self.get_str(key).unwrap_or(default).to_string()
    }

    /// First value parsed as `T`, or `default` when missing or unparsable
    pub fn get_parsed_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get_str(key)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default)
    }

    /// All values for the key, in insertion order
    pub fn get_all<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a MetadataValue> + 'a {
        let key = normalize_key(key);
        self.entries
            .iter()
            .filter(move |(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Remove every entry for the key; returns whether anything was removed
    pub fn remove(&mut self, key: &str) -> bool {
        let key = normalize_key(key);
        let before = self.entries.len();
        self.entries.retain(|(k, _)| *k != key);
        before != self.entries.len()
    }

    /// Iterate entries in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append all entries of `other`
    pub fn extend(&mut self, other: &Metadata) {
        self.entries.extend(other.entries.iter().cloned());
    }

    /// Convert to a tonic metadata map, skipping entries tonic rejects
    pub fn to_metadata_map(&self) -> MetadataMap {
        let mut map = MetadataMap::with_capacity(self.entries.len());
        for (key, value) in &self.entries {
            match value {
                MetadataValue::Ascii(text) => {
                    let parsed_key = MetadataKey::<Ascii>::from_bytes(key.as_bytes());
                    let parsed_value = AsciiMetadataValue::try_from(text.as_str());
                    match (parsed_key, parsed_value) {
                        (Ok(k), Ok(v)) => {
                            map.append(k, v);
                        }
                        _ => warn!(key = %key, "Skipping metadata entry rejected by tonic"),
                    }
                }
                MetadataValue::Binary(bytes) => match MetadataKey::<Binary>::from_bytes(key.as_bytes()) {
                    Ok(k) => {
                        map.append_bin(k, BinaryMetadataValue::from_bytes(bytes));
                    }
                    Err(_) => warn!(key = %key, "Skipping binary metadata key rejected by tonic"),
                },
            }
        }
        map
    }

    /// Build from a tonic metadata map
    pub fn from_metadata_map(map: &MetadataMap) -> Self {
        let mut metadata = Metadata::new();
        for entry in map.iter() {
            match entry {
                KeyAndValueRef::Ascii(key, value) => {
                    if let Ok(text) = value.to_str() {
                        metadata.add(key.as_str(), text);
                    }
                }
                KeyAndValueRef::Binary(key, value) => {
                    if let Ok(bytes) = value.to_bytes() {
                        metadata.add_binary(key.as_str(), bytes);
                    }
                }
            }
        }
        metadata
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Metadata::new();
        for (key, value) in iter {
            metadata.add(key.as_ref(), value);
        }
        metadata
    }
}

/// Per-invocation parameters
///
/// Created fresh for each call. The cancellation token is never shared between calls
/// unless the caller deliberately passes the same one.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    headers: Metadata,
    deadline: Option<Instant>,
    cancellation: CancellationToken,
}

impl CallOptions {
    /// Options with no headers, no deadline and a fresh cancellation token
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request header
    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.add(key, value);
        self
    }

    /// Replace all request headers
    pub fn with_headers(mut self, headers: Metadata) -> Self {
        self.headers = headers;
        self
    }

    /// Set an absolute deadline
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline relative to now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Use the given cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Request headers
    pub fn headers(&self) -> &Metadata {
        &self.headers
    }

    /// Mutable request headers
    pub fn headers_mut(&mut self) -> &mut Metadata {
        &mut self.headers
    }

    /// Deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancellation token of this call
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
