//! Composition planning ahead of a stream run.
//!
//! `compose_plan` asks a transient "composer" host to draft an execution
//! plan for a goal before any segments are submitted: which segments are
//! needed, which registered host should take each one, and what information
//! flows between them. The plan text is meant to guide how the caller
//! structures the actual segment list.

use anyhow::{Result, anyhow};
use std::collections::HashSet;
use tracing::info;

use crate::event::{EventSender, Message};
use crate::host::{Host, HostRegistry};
use crate::router::EventRouter;
use crate::runner::{EventCallback, TaskRunner};
use crate::types::SegmentId;

const COMPOSER_ATTRIBUTES: &str = "You excel at planning and structuring \
multi-host work. Your plans give each segment a clear owner, explicit \
dependencies, and a natural flow of information from one host to the next.";

/// Draft an execution plan for `goal` over the registered hosts.
///
/// A transient composer host is built for the call, borrowing its model
/// binding from the first registered host (by sorted id). The planning
/// instruction is delegated through the same task runner the engine uses,
/// with progress events routed to `callback` and `event_queue` under the
/// synthetic segment id `composition`. Fails if the registry is empty;
/// runner and callback failures are logged and propagated.
pub async fn compose_plan(
    runner: &dyn TaskRunner,
    hosts: &HostRegistry,
    goal: &str,
    callback: Option<&dyn EventCallback>,
    event_queue: Option<&EventSender>,
) -> Result<String> {
    let first_host = hosts
        .host_ids()
        .first()
        .and_then(|id| hosts.get(id.as_str()))
        .ok_or_else(|| anyhow!("composition requires at least one registered host"))?;

    let mut composer = Host::new(
        "composer",
        "Composer",
        "To create structured, efficient plans for multi-host segment execution",
    )
    .with_attributes(COMPOSER_ATTRIBUTES);
    composer.llm = first_host.llm.clone();

    info!(goal, hosts = hosts.len(), "composing execution plan");

    let instruction = format!("Create a detailed plan for achieving this goal: {}", goal);
    let briefing = format!(
        "{}\n\nAvailable hosts and their capabilities:\n{}\n\n\
         Your plan should outline:\n\
         1. The sequence of segments needed\n\
         2. Which host should handle each segment\n\
         3. What information flows between segments",
        instruction,
        host_capabilities(hosts),
    );
    let messages = vec![Message::system_for(&composer), Message::user(briefing)];

    let mut signatures = HashSet::new();
    let mut router = EventRouter::new(
        &composer,
        SegmentId::new("composition"),
        callback,
        event_queue,
        None,
        &mut signatures,
    );

    runner
        .execute(&composer, &instruction, &mut router, &messages)
        .await
        .inspect_err(|e| tracing::error!("composition planning failed: {:?}", e))
}

/// One `- {host_id}: {goal}` line per registered host, sorted by id.
fn host_capabilities(hosts: &HostRegistry) -> String {
    hosts
        .host_ids()
        .iter()
        .filter_map(|id| hosts.get(id.as_str()))
        .map(|host| format!("- {}: {}", host.host_id, host.goal))
        .collect::<Vec<_>>()
        .join("\n")
}
