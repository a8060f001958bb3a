use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::run::{RunId, WorkerId};

/// Metadata envelope attached to every run event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventMeta {
    /// Envelope schema version.
    pub version: u16,
    /// Run the event belongs to.
    pub run_id: RunId,
    /// Stable key for de-duplicating redelivered events.
    pub idempotency_key: String,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
}

impl EventMeta {
    /// Version-1 envelope stamped with the current time.
    pub fn new(run_id: RunId, idempotency_key: impl Into<String>) -> Self {
        Self {
            version: 1,
            run_id,
            idempotency_key: idempotency_key.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Run lifecycle event with metadata and payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunEvent {
    /// Envelope shared by every event kind.
    pub meta: EventMeta,
    /// What happened.
    pub payload: RunEventPayload,
}

impl RunEvent {
    /// Wrap `payload` with fresh metadata for `run_id`.
    pub fn new(run_id: RunId, payload: RunEventPayload) -> Self {
        let key = payload.idempotency_key(run_id);
        Self {
            meta: EventMeta::new(run_id, key),
            payload,
        }
    }

    /// Run the event belongs to.
    pub fn run_id(&self) -> RunId {
        self.meta.run_id
    }
}

/// Event payload emitted for run lifecycle transitions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum RunEventPayload {
    /// Run was accepted and stored as QUEUED.
    Submitted,
    /// An attempt checked out a worker and entered RUNNING.
    Dispatched { worker: WorkerId, attempt: u32 },
    /// The executor passed the run.
    Completed { worker: WorkerId, attempt: u32 },
    /// An attempt failed; the run may still be retried.
    Failed {
        worker: Option<WorkerId>,
        attempt: u32,
        reason: String,
    },
    /// Another attempt is about to be made.
    Retried {
        next_attempt: u32,
        attempts_remaining: u32,
        delay_ms: u64,
    },
    /// The attempt budget is spent; the run stays FAILED.
    RetriesExhausted { attempts: u32 },
}

impl RunEventPayload {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RunEventPayload::Submitted => "submitted",
            RunEventPayload::Dispatched { .. } => "dispatched",
            RunEventPayload::Completed { .. } => "completed",
            RunEventPayload::Failed { .. } => "failed",
            RunEventPayload::Retried { .. } => "retried",
            RunEventPayload::RetriesExhausted { .. } => "retries_exhausted",
        }
    }

    fn idempotency_key(&self, run_id: RunId) -> String {
        match self {
            RunEventPayload::Dispatched { attempt, .. }
            | RunEventPayload::Completed { attempt, .. }
            | RunEventPayload::Failed { attempt, .. } => {
                format!("{}-{}-{}", self.kind(), run_id, attempt)
            }
            RunEventPayload::Retried { next_attempt, .. } => {
                format!("{}-{}-{}", self.kind(), run_id, next_attempt)
            }
            _ => format!("{}-{}", self.kind(), run_id),
        }
    }
}

/// Sink for run lifecycle events.
///
/// Publishing is fire-and-forget from the orchestrator's point of view: a
/// returned error is logged and never alters a run.
///
/// The orchestrator awaits `publish` inline, in lifecycle order, while a
/// dispatch holds its worker. Implementations must not block: hand the event
/// to a buffer or channel and return. A publish that has not finished within
/// a short bound is abandoned and the event dropped.
#[async_trait]
pub trait RunEventPublisher: Send + Sync {
    /// Publish an event to all subscribers. Must return promptly.
    async fn publish(&self, event: RunEvent) -> anyhow::Result<()>;
    /// Subscribe to events published after this call.
    fn subscribe(&self) -> broadcast::Receiver<RunEvent>;
}

/// In-process event bus using a tokio broadcast channel.
///
/// # Characteristics
///
/// - Non-blocking publish: publishers never wait for slow subscribers
/// - Fan-out: all subscribers receive all events (within capacity)
/// - Bounded: a subscriber that falls behind gets `RecvError::Lagged`
pub struct InProcEventBus {
    sender: broadcast::Sender<RunEvent>,
    capacity: usize,
}

impl std::fmt::Debug for InProcEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcEventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl InProcEventBus {
    /// Create a bus buffering at most `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Per-subscriber buffer size.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Broadcast an event. With no subscribers the event is dropped.
    pub fn publish_event(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for InProcEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl RunEventPublisher for InProcEventBus {
    async fn publish(&self, event: RunEvent) -> anyhow::Result<()> {
        self.publish_event(event);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }
}
