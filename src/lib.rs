//! Chronocast: a segment-orchestration engine for multi-host streams.
//!
//! Callers define [`Host`]s, submit an ordered list of segment records, and
//! drive a [`Stream`] run; the engine resolves hosts, threads earlier
//! results into later instructions, routes progress events to a callback
//! and queue, and assembles the final report. Model invocation itself lives
//! behind the injected [`TaskRunner`].

// Core engine
mod event;
mod host;
mod router;
mod runner;
mod segment;
mod stream;
mod types;

// Planning and SDK surface
mod compose;
mod config;
pub mod helpers;
mod logging;


// Re-export the engine types
pub use event::{
    EventReceiver, EventSender, EventStamp, Message, Role, RunnerEvent, StreamEvent, event_channel,
};
pub use host::{Host, HostRegistry, ModelBinding};
pub use router::EventRouter;
pub use runner::{EventCallback, TaskRunner};
pub use segment::SegmentInstruction;
pub use stream::{MAX_HOST_ITERATIONS, STREAM_TOOL, Stream, StreamError};
pub use types::{HostId, ModelId, SegmentId, ToolName};

// Re-export the SDK surface
pub use compose::compose_plan;
pub use config::{Config, DEFAULT_TIMEZONE};
pub use logging::configure_logging;
