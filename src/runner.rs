//! Execution boundaries of the stream engine.
//!
//! The engine never invokes a language model itself. Everything that happens
//! inside one segment, from model calls to tool use, lives behind the
//! `TaskRunner` trait, injected into the engine at construction.
//! Progress flows back out through the per-segment `EventRouter` the engine
//! hands to each `execute` call, and canonical events reach the caller
//! through its `EventCallback`.

use anyhow::Result;
use std::future::Future;
use std::pin::Pin;

use crate::event::{Message, StreamEvent};
use crate::host::Host;
use crate::router::EventRouter;

/// Strategy for executing one segment's instruction against a host.
///
/// Implementations receive the resolved host configuration, the fully
/// assembled instruction text (dependency context included), a router bound
/// to the current segment, and the fresh per-segment message list. They may
/// route any number of progress events before resolving with the segment's
/// raw result text.
///
/// Errors are not caught by the engine: a failing runner aborts the whole
/// run and the caller sees the error directly.
pub trait TaskRunner: Send + Sync {
    /// Execute one segment and return its raw result text.
    fn execute<'a>(
        &'a self,
        host: &'a Host,
        instruction: &'a str,
        router: &'a mut EventRouter<'_>,
        messages: &'a [Message],
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}

/// Consumer for canonical stream events.
///
/// The engine awaits `deliver` in-line on every forwarded event, so a slow
/// callback stalls the run and an error aborts it mid-segment. There is no
/// timeout, isolation, or retry at this layer.
pub trait EventCallback: Send + Sync {
    /// Receive one canonical event.
    fn deliver<'a>(
        &'a self,
        event: StreamEvent,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}
