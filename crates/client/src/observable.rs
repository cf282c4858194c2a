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

//! # Observable Response Streams
//!
//! ## Purpose
//! Push-style consumption of a server-streaming or duplex call: observers subscribe, then
//! [`StreamingObservable::observe`] drains the response stream and fans every response out
//! to the current observers.
//!
//! ## Delivery
//! - `on_next` goes to the observers subscribed when the response arrives
//! - `on_completed` or `on_error` is delivered once, after which the observer list is cleared
//! - Dropping a [`Subscription`] removes its observer; dropping the observable releases all of
//!   them (subscriptions only hold a weak reference to the observer list)

use std::sync::{Arc, Mutex, Weak};

use futures::stream::{self, Stream, StreamExt};
use grpckit_common::GrpcError;

use crate::call::{DuplexStreamingCall, RequestStreamWriter, ResponseStreamReader, ServerStreamingCall};

/// Receives the responses of an observed call
pub trait ResponseObserver<T>: Send + Sync {
    /// Next response
    fn on_next(&self, response: &T);

    /// The stream failed
    fn on_error(&self, _error: &GrpcError) {}

    /// The stream ended normally
    fn on_completed(&self) {}
}

/// Observer assembled from closures
pub struct FnObserver<T> {
    on_next: Box<dyn Fn(&T) + Send + Sync>,
    on_error: Option<Box<dyn Fn(&GrpcError) + Send + Sync>>,
    on_completed: Option<Box<dyn Fn() + Send + Sync>>,
}

impl<T> FnObserver<T> {
    /// Observer calling `on_next` for every response
    pub fn new<F>(on_next: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self {
            on_next: Box::new(on_next),
            on_error: None,
            on_completed: None,
        }
    }

    /// Also handle stream failures
    pub fn on_error<F>(mut self, on_error: F) -> Self
    where
        F: Fn(&GrpcError) + Send + Sync + 'static,
    {
        self.on_error = Some(Box::new(on_error));
        self
    }

    /// Also handle normal completion
    pub fn on_completed<F>(mut self, on_completed: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_completed = Some(Box::new(on_completed));
        self
    }
}

impl<T> ResponseObserver<T> for FnObserver<T> {
    fn on_next(&self, response: &T) {
        (self.on_next)(response);
    }

    fn on_error(&self, error: &GrpcError) {
        if let Some(on_error) = &self.on_error {
            on_error(error);
        }
    }

    fn on_completed(&self) {
        if let Some(on_completed) = &self.on_completed {
            on_completed();
        }
    }
}

/// A call whose responses can be observed
pub trait ResponseSource {
    /// Response payload type
    type Response;

    /// Response stream of the call
    fn response_reader(&mut self) -> &mut ResponseStreamReader<Self::Response>;
}

impl<Resp> ResponseSource for ServerStreamingCall<Resp> {
    type Response = Resp;

    fn response_reader(&mut self) -> &mut ResponseStreamReader<Resp> {
        self.response_stream()
    }
}

impl<Req, Resp> ResponseSource for DuplexStreamingCall<Req, Resp> {
    type Response = Resp;

    fn response_reader(&mut self) -> &mut ResponseStreamReader<Resp> {
        self.response_stream()
    }
}

struct ObserverList<T> {
    next_id: u64,
    entries: Vec<(u64, Arc<dyn ResponseObserver<T>>)>,
}

type SharedObservers<T> = Arc<Mutex<ObserverList<T>>>;

fn lock<T>(observers: &Mutex<ObserverList<T>>) -> std::sync::MutexGuard<'_, ObserverList<T>> {
    observers
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Keeps an observer subscribed until dropped
#[must_use = "dropping a Subscription unsubscribes the observer"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Remove the observer now
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Observable wrapper around a streaming call
pub struct StreamingObservable<C: ResponseSource> {
    call: C,
    observers: SharedObservers<C::Response>,
}

impl<C> StreamingObservable<C>
where
    C: ResponseSource,
    C::Response: 'static,
{
    /// Observe `call`; the observable owns the call until [`into_call`](Self::into_call)
    pub fn new(call: C) -> Self {
        Self {
            call,
            observers: Arc::new(Mutex::new(ObserverList {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Add an observer
    pub fn subscribe(&self, observer: Arc<dyn ResponseObserver<C::Response>>) -> Subscription {
        let id = {
            let mut list = lock(&self.observers);
            let id = list.next_id;
            list.next_id += 1;
            list.entries.push((id, observer));
            id
        };
        let weak: Weak<Mutex<ObserverList<C::Response>>> = Arc::downgrade(&self.observers);
        Subscription {
            release: Some(Box::new(move || {
                if let Some(observers) = weak.upgrade() {
                    lock(&observers).entries.retain(|(entry, _)| *entry != id);
                }
            })),
        }
    }

    /// Number of subscribed observers
    pub fn observer_count(&self) -> usize {
        lock(&self.observers).entries.len()
    }

    /// Observed call
    pub fn call(&self) -> &C {
        &self.call
    }

    /// Observed call, mutably
    pub fn call_mut(&mut self) -> &mut C {
        &mut self.call
    }

    /// Stop observing and return the call; current observers are released
    pub fn into_call(self) -> C {
        self.call
    }

    /// Drain the response stream, delivering every response to the observers
    ///
    /// ## Returns
    /// The stream failure after it was delivered through `on_error`.
    pub async fn observe(&mut self) -> Result<(), GrpcError> {
        let outcome = drain(self.call.response_reader(), &self.observers).await;
        finish(&self.observers, &outcome);
        outcome
    }

}

impl<Req, Resp> StreamingObservable<DuplexStreamingCall<Req, Resp>>
where
    Resp: 'static,
{
    /// Send one request
    pub async fn write_request(&mut self, request: &Req) -> Result<(), GrpcError> {
        self.call.request_stream().write(request).await
    }

    /// Signal that no more requests follow
    pub async fn complete_request(&mut self) -> Result<(), GrpcError> {
        self.call.request_stream().complete().await
    }

    /// Send every request and complete while observing the responses
    pub async fn write_and_observe<I>(&mut self, requests: I) -> Result<(), GrpcError>
    where
        I: IntoIterator<Item = Req>,
    {
        self.write_stream_and_observe(stream::iter(requests)).await
    }

    /// Send an asynchronous sequence of requests and complete while observing the responses
    pub async fn write_stream_and_observe<S>(&mut self, requests: S) -> Result<(), GrpcError>
    where
        S: Stream<Item = Req>,
    {
        let observers = self.observers.clone();
        let (writer, reader) = self.call.streams();
        let (written, read) = tokio::join!(write_then_complete(writer, requests), async {
            let outcome = drain(reader, &observers).await;
            finish(&observers, &outcome);
            outcome
        });
        read.and(written)
    }
}

async fn write_then_complete<Req, S>(
    writer: &mut RequestStreamWriter<Req>,
    requests: S,
) -> Result<(), GrpcError>
where
    S: Stream<Item = Req>,
{
    futures::pin_mut!(requests);
    let mut written = Ok(());
    while let Some(request) = requests.next().await {
        if let Err(error) = writer.write(&request).await {
            written = Err(error);
            break;
        }
    }
    let completed = writer.complete().await;
    written.and(completed)
}

fn snapshot<T>(observers: &Mutex<ObserverList<T>>) -> Vec<Arc<dyn ResponseObserver<T>>> {
    lock(observers)
        .entries
        .iter()
        .map(|(_, observer)| observer.clone())
        .collect()
}

async fn drain<T>(
    reader: &mut ResponseStreamReader<T>,
    observers: &Mutex<ObserverList<T>>,
) -> Result<(), GrpcError> {
    while let Some(response) = reader.message().await? {
        for observer in snapshot(observers) {
            observer.on_next(&response);
        }
    }
    Ok(())
}

fn finish<T>(observers: &Mutex<ObserverList<T>>, outcome: &Result<(), GrpcError>) {
    let taken = std::mem::take(&mut lock(observers).entries);
    for (_, observer) in taken {
        match outcome {
            Ok(()) => observer.on_completed(),
            Err(error) => observer.on_error(error),
        }
    }
}
