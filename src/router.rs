//! Per-segment event routing.
//!
//! An `EventRouter` is constructed fresh for every segment the engine
//! processes and handed to the task runner for the duration of that
//! segment's execution. It turns the runner's raw `RunnerEvent` records into
//! canonical `StreamEvent`s scoped to the current host and segment, appends
//! delegation results to the shared message log, forwards events to the
//! caller's callback, and pushes them to the event queue.
//!
//! Because each router is a distinct value borrowing the run's state for one
//! loop iteration only, no closure captures leak between segments.

use anyhow::Result;
use std::collections::HashSet;

use crate::event::{EventSender, Message, Role, RunnerEvent, StreamEvent, now_iso8601};
use crate::host::Host;
use crate::runner::EventCallback;
use crate::stream::STREAM_TOOL;
use crate::types::SegmentId;

/// Execution context binding one segment's event flow to the run's observers.
pub struct EventRouter<'run> {
    host: &'run Host,
    segment_id: SegmentId,
    callback: Option<&'run dyn EventCallback>,
    queue: Option<&'run EventSender>,
    log: Option<&'run mut Vec<Message>>,
    signatures: &'run mut HashSet<String>,
}

impl<'run> EventRouter<'run> {
    /// Bind a router to one host/segment pair for the duration of its
    /// execution.
    pub fn new(
        host: &'run Host,
        segment_id: SegmentId,
        callback: Option<&'run dyn EventCallback>,
        queue: Option<&'run EventSender>,
        log: Option<&'run mut Vec<Message>>,
        signatures: &'run mut HashSet<String>,
    ) -> Self {
        Self {
            host,
            segment_id,
            callback,
            queue,
            log,
            signatures,
        }
    }

    /// The id of the segment this router is bound to.
    pub fn segment_id(&self) -> &SegmentId {
        &self.segment_id
    }

    /// Normalize, classify, and forward one progress event from the runner.
    ///
    /// Delegation results (and final responses, which canonicalize to the
    /// same shape) are appended to the shared message log when one is
    /// present. Every canonical event is delivered to the callback and
    /// pushed to the event queue unconditionally; the dedup signature is
    /// recorded per push but never consulted to suppress one. A closed queue
    /// receiver is not an error, a failing callback is.
    pub async fn route(&mut self, event: RunnerEvent) -> Result<()> {
        let event = event.normalized();
        let canonical = self.canonicalize(event);

        if let Some(message) = canonical.as_message() {
            if let Some(log) = self.log.as_deref_mut() {
                log.push(message);
            }
        }

        if let Some(callback) = self.callback {
            callback.deliver(canonical.clone()).await?;
        }

        if let Some(queue) = self.queue {
            let _ = queue.send(canonical.clone());
            if let Some(signature) = canonical.signature() {
                self.signatures.insert(signature);
            }
        }

        Ok(())
    }

    /// Wrap a raw runner event into the canonical shape scoped to this
    /// router's host and segment. The canonical timestamp is taken at
    /// routing time; the source record's own stamp was normalized earlier.
    fn canonicalize(&self, event: RunnerEvent) -> StreamEvent {
        let timestamp = now_iso8601();
        match event {
            RunnerEvent::DelegationResult {
                content,
                conducted_task_id,
                ..
            } => StreamEvent::DelegationResult {
                name: self.host.host_id.clone(),
                content,
                conducted_segment_id: self.segment_id.clone(),
                conducted_task_id,
                timestamp,
            },
            RunnerEvent::FinalResponse { content, .. } => StreamEvent::DelegationResult {
                name: self.host.host_id.clone(),
                content,
                conducted_segment_id: self.segment_id.clone(),
                conducted_task_id: None,
                timestamp,
            },
            RunnerEvent::ToolCall { tool, params, .. } => {
                // A nested orchestration call is a delegation, every other
                // tool surfaces as a plain function invocation.
                let role = if tool.as_str() == STREAM_TOOL {
                    Role::Delegation
                } else {
                    Role::Function
                };
                StreamEvent::ToolCall {
                    role,
                    tool,
                    params,
                    host_id: self.host.host_id.clone(),
                    conducted_segment_id: self.segment_id.clone(),
                    timestamp,
                }
            }
            RunnerEvent::ToolResult { tool, content, .. } => StreamEvent::ToolResult {
                tool,
                content,
                host_id: self.host.host_id.clone(),
                conducted_segment_id: self.segment_id.clone(),
                timestamp,
            },
            RunnerEvent::Other { kind, fields } => StreamEvent::Other {
                kind,
                fields,
                host_id: self.host.host_id.clone(),
                conducted_segment_id: self.segment_id.clone(),
                timestamp,
            },
        }
    }
}
