//! Health monitor for the embedding service.
//!
//! Observes the circuit breaker and exposes a serializable snapshot plus a
//! transition stream. The file watcher consults the snapshot before
//! dispatching; the deferred-queue drainer wakes on circuit-closed
//! transitions.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::embedding::{CircuitBreaker, CircuitState};

/// A serializable health snapshot for the embedding service
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HealthSnapshot {
    /// Whether embedding calls are currently being attempted
    pub available: bool,
    /// Circuit state: "Closed", "Open" or "HalfOpen"
    pub state: String,
    /// Seconds until an open circuit admits a probe (0 when not open)
    pub retry_after_seconds: u64,
    /// Time of the last successful embedding call, RFC 3339
    pub last_success: Option<String>,
    /// Transient failures inside the current rolling window
    pub failure_count: u32,
    /// Platform-specific guidance shown when the service is unreachable
    pub platform_hint: Option<String>,
}

/// Tracks circuit state for the embedding service
pub struct HealthMonitor {
    breaker: Arc<CircuitBreaker>,
}

impl HealthMonitor {
    pub fn new(breaker: Arc<CircuitBreaker>) -> Self {
        Self { breaker }
    }

    /// Whether indexing work should be attempted right now.
    ///
    /// Closed and half-open circuits both admit an attempt; half-open lets the
    /// next indexing call double as the recovery probe.
    pub fn embedding_attemptable(&self) -> bool {
        matches!(
            self.breaker.state(),
            CircuitState::Closed | CircuitState::HalfOpen
        )
    }

    pub fn state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Subscribe to circuit transitions
    pub fn subscribe(&self) -> watch::Receiver<CircuitState> {
        self.breaker.subscribe()
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let state = self.breaker.state();
        let available = state == CircuitState::Closed;
        HealthSnapshot {
            available,
            state: format!("{state:?}"),
            retry_after_seconds: self.breaker.retry_after_seconds(),
            last_success: self.breaker.last_success().map(|t| t.to_rfc3339()),
            failure_count: self.breaker.failure_count(),
            platform_hint: platform_hint(available),
        }
    }
}

fn platform_hint(available: bool) -> Option<String> {
    if available {
        return None;
    }
    if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
        Some("Run the embedding generator natively on Apple Silicon (not under Rosetta).".into())
    } else {
        Some("Ensure the embedding service is running and reachable.".into())
    }
}
