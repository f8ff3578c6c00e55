//! Bounded in-memory FIFO of change events that could not be indexed while
//! the embedding service was unhealthy, plus the drainer that replays them
//! on recovery.
//!
//! The queue is not persisted; start-up reconciliation is the recovery
//! mechanism after a restart.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::embedding::CircuitState;
use crate::health::HealthMonitor;
use crate::indexer::Indexer;
use crate::types::ChangeType;

/// A parked file-change event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredEvent {
    pub relative_path: String,
    pub change_type: ChangeType,
    pub detected_at: DateTime<Utc>,
    pub attempt_count: u32,
}

impl DeferredEvent {
    pub fn new(relative_path: impl Into<String>, change_type: ChangeType) -> Self {
        Self {
            relative_path: relative_path.into(),
            change_type,
            detected_at: Utc::now(),
            attempt_count: 0,
        }
    }
}

/// Bounded FIFO; on overflow the oldest entry is evicted with a warning
pub struct DeferredQueue {
    items: Mutex<VecDeque<DeferredEvent>>,
    capacity: usize,
}

impl DeferredQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Always succeeds; evicts the oldest entry when full
    pub fn enqueue(&self, item: DeferredEvent) -> bool {
        let mut items = self.items.lock().expect("deferred queue lock poisoned");
        if items.len() >= self.capacity {
            if let Some(dropped) = items.pop_front() {
                tracing::warn!(
                    "Deferred queue full ({}), dropping oldest event for {}",
                    self.capacity,
                    dropped.relative_path
                );
            }
        }
        items.push_back(item);
        true
    }

    pub fn try_dequeue(&self) -> Option<DeferredEvent> {
        self.items
            .lock()
            .expect("deferred queue lock poisoned")
            .pop_front()
    }

    pub fn try_peek(&self) -> Option<DeferredEvent> {
        self.items
            .lock()
            .expect("deferred queue lock poisoned")
            .front()
            .cloned()
    }

    pub fn count(&self) -> usize {
        self.items.lock().expect("deferred queue lock poisoned").len()
    }

    pub fn clear(&self) {
        self.items
            .lock()
            .expect("deferred queue lock poisoned")
            .clear();
    }
}

/// Replays deferred events once the embedding circuit closes.
///
/// A tokio mutex guarantees at most one drain in flight; the drain loop
/// re-checks health between items and pauses briefly so a recovering
/// generator is not flooded.
pub struct QueueDrainer {
    queue: Arc<DeferredQueue>,
    indexer: Arc<Indexer>,
    health: Arc<HealthMonitor>,
    max_retry_attempts: u32,
    pause: Duration,
    drain_lock: tokio::sync::Mutex<()>,
}

impl QueueDrainer {
    pub fn new(
        queue: Arc<DeferredQueue>,
        indexer: Arc<Indexer>,
        health: Arc<HealthMonitor>,
        max_retry_attempts: u32,
        pause: Duration,
    ) -> Self {
        Self {
            queue,
            indexer,
            health,
            max_retry_attempts,
            pause,
            drain_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Long-running task: wake on every circuit transition to closed and
    /// drain the queue. Exits on cancellation.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut transitions = self.health.subscribe();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                changed = transitions.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let state = *transitions.borrow_and_update();
                    if state == CircuitState::Closed {
                        self.drain(&cancel).await;
                    }
                }
            }
        }
    }

    /// Drain queued events in order. Skips out immediately when another drain
    /// holds the lock.
    pub async fn drain(&self, cancel: &CancellationToken) {
        let Ok(_guard) = self.drain_lock.try_lock() else {
            tracing::debug!("Drain already in flight, skipping");
            return;
        };

        let backlog = self.queue.count();
        if backlog == 0 {
            return;
        }
        tracing::info!("Draining {} deferred events", backlog);

        while let Some(mut event) = self.queue.try_dequeue() {
            if cancel.is_cancelled() {
                // Put the item back so reconciliation is not the only recovery
                self.queue.enqueue(event);
                return;
            }
            if !self.health.embedding_attemptable() {
                self.queue.enqueue(event);
                tracing::info!("Embedding circuit reopened mid-drain, stopping");
                return;
            }

            event.attempt_count += 1;
            match self
                .indexer
                .apply_change(&event.relative_path, event.change_type, cancel)
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_deferrable() => {
                    if event.attempt_count >= self.max_retry_attempts {
                        tracing::error!(
                            "Dropping {} after {} attempts: {}",
                            event.relative_path,
                            event.attempt_count,
                            e
                        );
                    } else {
                        self.queue.enqueue(event);
                    }
                    return;
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to replay deferred event for {}: {}",
                        event.relative_path,
                        e
                    );
                }
            }

            tokio::time::sleep(self.pause).await;
        }
        tracing::info!("Deferred queue drained");
    }
}
