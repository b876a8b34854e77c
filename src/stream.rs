//! The segment-orchestration engine.
//!
//! A `Stream` sequences caller-submitted segments across independently
//! configured hosts: it validates and coerces the raw segment records,
//! announces the run with a Delegation-Start event, resolves each segment's
//! host, enforces the per-host iteration cap, assembles dependency context
//! from earlier results, delegates execution to the injected task runner,
//! and finally renders the accumulated results into one report string.
//!
//! Segments execute strictly in the order they were submitted; there is no
//! topological sort. A segment may reference any earlier segment's output
//! via `use_output_from`, but a reference to a segment that has not yet run
//! (or was skipped) resolves to nothing and is silently dropped. Callers
//! who need an output downstream must order their segments accordingly.

use anyhow::Result;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::event::{EventSender, Message, StreamEvent, now_iso8601};
use crate::host::HostRegistry;
use crate::router::EventRouter;
use crate::runner::{EventCallback, TaskRunner};
use crate::segment::SegmentInstruction;
use crate::types::{HostId, SegmentId};

/// Maximum number of segments one host may be dispatched to within a single
/// run. Further segments addressed to that host are skipped with a warning.
pub const MAX_HOST_ITERATIONS: u32 = 3;

/// Tool name reserved for nested orchestration. A tool call invoking this
/// name surfaces with a delegation role instead of a function role.
pub const STREAM_TOOL: &str = "stream_tool";

/// Validation failures raised by the engine before any segment executes.
///
/// Execution-time failures (task runner, callback) are not wrapped; they
/// propagate to the caller as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The caller submitted an empty segment list.
    NoSegments,

    /// A raw segment record failed coercion into a `SegmentInstruction`.
    MalformedSegment {
        /// Position of the offending record in the submitted list.
        index: usize,
        /// The underlying coercion failure.
        reason: String,
    },
}

impl StreamError {
    /// Wrap a coercion failure with the position of the offending record.
    pub fn malformed(index: usize, reason: impl fmt::Display) -> Self {
        Self::MalformedSegment {
            index,
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSegments => {
                write!(f, "segments must be a non-empty list of segment records")
            }
            Self::MalformedSegment { index, reason } => {
                write!(f, "segment record at index {} is malformed: {}", index, reason)
            }
        }
    }
}

impl std::error::Error for StreamError {}

/// Insertion-ordered accumulator for segment results.
///
/// Dependency resolution and the final report both read this strictly in
/// insertion order. A duplicate segment id overwrites the stored text in
/// place, keeping the position of the first insertion.
#[derive(Debug, Default)]
struct ResultLedger {
    entries: Vec<(SegmentId, String)>,
}

impl ResultLedger {
    fn get(&self, segment_id: &SegmentId) -> Option<&str> {
        self.entries
            .iter()
            .find(|(id, _)| id == segment_id)
            .map(|(_, text)| text.as_str())
    }

    fn insert(&mut self, segment_id: SegmentId, text: String) {
        match self.entries.iter().position(|(id, _)| *id == segment_id) {
            Some(index) => self.entries[index].1 = text,
            None => self.entries.push((segment_id, text)),
        }
    }

    fn iter(&self) -> impl Iterator<Item = (&SegmentId, &str)> {
        self.entries.iter().map(|(id, text)| (id, text.as_str()))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The orchestration engine. Holds the injected task runner and nothing
/// else; all run state is local to one `run` invocation.
pub struct Stream {
    runner: Arc<dyn TaskRunner>,
}

impl Stream {
    /// Create an engine around a shared task runner.
    pub fn new(runner: Arc<dyn TaskRunner>) -> Self {
        Self { runner }
    }

    /// Create an engine from a concrete runner, wrapping it in an `Arc`.
    pub fn with_runner<R: TaskRunner + 'static>(runner: R) -> Self {
        Self::new(Arc::new(runner))
    }

    /// Execute one orchestration run over the submitted segments.
    ///
    /// The raw records are validated and coerced up front: an empty list or
    /// a malformed record fails the run with a [`StreamError`] before any
    /// event is emitted. A single Delegation-Start event (carrying the
    /// ordered segment ids) is then appended to `messages` and delivered to
    /// `callback`, and the segments are processed in submitted order.
    ///
    /// A segment whose host is unknown, or whose host has already been
    /// dispatched [`MAX_HOST_ITERATIONS`] times, is skipped with a warning
    /// and contributes nothing to the report. Dependency references in
    /// `use_output_from` resolve only against segments that have already
    /// completed; forward references are silently dropped.
    ///
    /// Task runner and callback errors are not caught; they abort the run
    /// and the partial results are lost. On success, returns the aggregated
    /// report: one block per completed segment, in completion order.
    pub async fn run(
        &self,
        segments: &[Value],
        hosts: &HostRegistry,
        callback: Option<&dyn EventCallback>,
        event_queue: Option<&EventSender>,
        mut messages: Option<&mut Vec<Message>>,
    ) -> Result<String> {
        if segments.is_empty() {
            return Err(StreamError::NoSegments.into());
        }

        let mut instructions = Vec::with_capacity(segments.len());
        for (index, record) in segments.iter().enumerate() {
            let segment = SegmentInstruction::from_value(record)
                .map_err(|err| StreamError::malformed(index, err))?;
            instructions.push(segment);
        }

        let run_id = Uuid::new_v4();
        info!(%run_id, segments = instructions.len(), "starting stream run");

        let start = StreamEvent::DelegationStart {
            content: format!(
                "Starting multi-host flow with {} segments",
                instructions.len()
            ),
            segments: instructions
                .iter()
                .map(|segment| segment.segment_id.clone())
                .collect(),
            timestamp: now_iso8601(),
        };
        if let Some(log) = messages.as_deref_mut() {
            if let Some(message) = start.as_message() {
                log.push(message);
            }
        }
        if let Some(callback) = callback {
            callback.deliver(start).await?;
        }

        let mut host_call_counts: HashMap<HostId, u32> = HashMap::new();
        let mut results = ResultLedger::default();
        let mut sent_signatures: HashSet<String> = HashSet::new();

        for segment in &instructions {
            info!(
                %run_id,
                segment_id = %segment.segment_id,
                host_id = %segment.host_id,
                "processing segment"
            );

            let Some(host) = hosts.get(segment.host_id.as_str()) else {
                let available = hosts
                    .host_ids()
                    .iter()
                    .map(HostId::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                warn!(
                    %run_id,
                    host_id = %segment.host_id,
                    %available,
                    "host not found, skipping segment"
                );
                continue;
            };

            // The counter advances even when the attempt is skipped.
            let attempts = host_call_counts
                .entry(segment.host_id.clone())
                .and_modify(|count| *count += 1)
                .or_insert(1);
            if *attempts > MAX_HOST_ITERATIONS {
                warn!(
                    %run_id,
                    host_id = %segment.host_id,
                    "host exceeded maximum iterations, skipping segment"
                );
                continue;
            }

            let segment_messages = vec![Message::system_for(host)];
            let instruction_text = compose_instruction(segment, &results);

            let mut router = EventRouter::new(
                host,
                segment.segment_id.clone(),
                callback,
                event_queue,
                messages.as_deref_mut(),
                &mut sent_signatures,
            );

            let raw_result = self
                .runner
                .execute(host, &instruction_text, &mut router, &segment_messages)
                .await?;

            // Rebuilt rather than reused from the instruction text; no result
            // can change while the segment runs, so both computations agree.
            let context = dependency_blocks(&segment.use_output_from, &results).join("\n\n");
            let stored = if context.is_empty() {
                raw_result
            } else {
                format!("{}\n\n{}", context, raw_result)
            };
            results.insert(segment.segment_id.clone(), stored);
        }

        info!(%run_id, results = results.len(), "stream run complete");

        Ok(final_report(&results, &instructions))
    }
}

/// Labelled result blocks for the referenced segments, in the order they
/// are listed. References without a stored result are dropped.
fn dependency_blocks(references: &[SegmentId], results: &ResultLedger) -> Vec<String> {
    references
        .iter()
        .filter_map(|segment_id| {
            results
                .get(segment_id)
                .map(|text| format!("Results from segment '{}':\n{}", segment_id, text))
        })
        .collect()
}

/// The full instruction text handed to the task runner: the segment's own
/// instruction, plus a context section when the segment declares
/// dependencies. The section header appears whenever `use_output_from` is
/// non-empty, even if none of the references resolve.
fn compose_instruction(segment: &SegmentInstruction, results: &ResultLedger) -> String {
    if segment.use_output_from.is_empty() {
        return segment.instruction.clone();
    }
    format!(
        "{}\n\nUse the following information from previous segments:\n\n{}",
        segment.instruction,
        dependency_blocks(&segment.use_output_from, results).join("\n\n")
    )
}

/// Render the accumulated results as the final report, one block per
/// completed segment in insertion order. The instruction text is looked up
/// from the coerced segment list; a segment id without a match (possible
/// only through id collisions) renders with an empty instruction.
fn final_report(results: &ResultLedger, instructions: &[SegmentInstruction]) -> String {
    results
        .iter()
        .map(|(segment_id, result)| {
            let instruction = instructions
                .iter()
                .find(|segment| segment.segment_id == *segment_id)
                .map(|segment| segment.instruction.as_str())
                .unwrap_or("");
            format!(
                "Segment '{}':\nInstruction: {}\nResult: {}",
                segment_id, instruction, result
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
