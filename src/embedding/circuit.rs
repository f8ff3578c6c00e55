//! Circuit breaker guarding the embedding service.
//!
//! Failures inside a rolling window open the circuit; while open, calls fail
//! fast with a retry-after. After the break elapses a single probe is allowed
//! (half-open); its outcome closes or reopens the circuit.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Circuit state as observed by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Tuning for the breaker
#[derive(Debug, Clone)]
pub struct CircuitSettings {
    pub failure_threshold: u32,
    pub failure_window: Duration,
    pub break_duration: Duration,
}

impl Default for CircuitSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::from_secs(60),
            break_duration: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// Failure instants inside the rolling window
    failures: VecDeque<Instant>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    last_success: Option<DateTime<Utc>>,
    last_transition: Option<DateTime<Utc>>,
}

/// Outcome of asking the breaker for permission to call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPermit {
    /// Call may proceed
    Allowed,
    /// Circuit is open; retry after the given number of seconds
    Rejected { retry_after_seconds: u64 },
}

/// Shared circuit breaker; one instance guards one embedding endpoint
pub struct CircuitBreaker {
    settings: CircuitSettings,
    inner: Mutex<BreakerInner>,
    transitions: watch::Sender<CircuitState>,
}

impl CircuitBreaker {
    pub fn new(settings: CircuitSettings) -> Self {
        let (transitions, _) = watch::channel(CircuitState::Closed);
        Self {
            settings,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: VecDeque::new(),
                opened_at: None,
                probe_in_flight: false,
                last_success: None,
                last_transition: None,
            }),
            transitions,
        }
    }

    /// Subscribe to state transitions; the receiver yields the new state
    pub fn subscribe(&self) -> watch::Receiver<CircuitState> {
        self.transitions.subscribe()
    }

    /// Ask for permission to issue a call
    pub fn check(&self) -> CallPermit {
        let mut inner = self.inner.lock().expect("circuit lock poisoned");
        match inner.state {
            CircuitState::Closed => CallPermit::Allowed,
            CircuitState::Open => {
                let opened_at = inner.opened_at.unwrap_or_else(Instant::now);
                let elapsed = opened_at.elapsed();
                if elapsed >= self.settings.break_duration {
                    // Break elapsed: allow exactly one probe
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.probe_in_flight = true;
                    CallPermit::Allowed
                } else {
                    let remaining = self.settings.break_duration - elapsed;
                    CallPermit::Rejected {
                        retry_after_seconds: remaining.as_secs().max(1),
                    }
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    CallPermit::Rejected {
                        retry_after_seconds: 1,
                    }
                } else {
                    inner.probe_in_flight = true;
                    CallPermit::Allowed
                }
            }
        }
    }

    /// Record a successful call; closes the circuit
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("circuit lock poisoned");
        inner.failures.clear();
        inner.probe_in_flight = false;
        inner.last_success = Some(Utc::now());
        if inner.state != CircuitState::Closed {
            self.transition(&mut inner, CircuitState::Closed);
        }
    }

    /// Record a transient failure; may open the circuit
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("circuit lock poisoned");
        match inner.state {
            CircuitState::HalfOpen => {
                // Probe failed: back to open for a fresh break
                inner.probe_in_flight = false;
                inner.opened_at = Some(Instant::now());
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Open => {
                // Already open; nothing to count
            }
            CircuitState::Closed => {
                let now = Instant::now();
                inner.failures.push_back(now);
                let window = self.settings.failure_window;
                while inner
                    .failures
                    .front()
                    .is_some_and(|oldest| now.duration_since(*oldest) > window)
                {
                    inner.failures.pop_front();
                }
                if inner.failures.len() as u32 >= self.settings.failure_threshold {
                    inner.opened_at = Some(now);
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("circuit lock poisoned").state
    }

    /// Seconds until the next probe is admitted; 0 when not open
    pub fn retry_after_seconds(&self) -> u64 {
        let inner = self.inner.lock().expect("circuit lock poisoned");
        match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(opened_at)) => {
                let elapsed = opened_at.elapsed();
                if elapsed >= self.settings.break_duration {
                    0
                } else {
                    (self.settings.break_duration - elapsed).as_secs().max(1)
                }
            }
            _ => 0,
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().expect("circuit lock poisoned").failures.len() as u32
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().expect("circuit lock poisoned").last_success
    }

    pub fn last_transition(&self) -> Option<DateTime<Utc>> {
        self.inner
            .lock()
            .expect("circuit lock poisoned")
            .last_transition
    }

    fn transition(&self, inner: &mut BreakerInner, next: CircuitState) {
        let prev = inner.state;
        inner.state = next;
        inner.last_transition = Some(Utc::now());
        tracing::info!("Embedding circuit {:?} -> {:?}", prev, next);
        let _ = self.transitions.send(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, break_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(CircuitSettings {
            failure_threshold: threshold,
            failure_window: Duration::from_secs(60),
            break_duration: Duration::from_millis(break_ms),
        })
    }

    #[test]
    fn test_starts_closed_and_allows() {
        let cb = breaker(3, 100);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.check(), CallPermit::Allowed);
    }

    #[test]
    fn test_opens_after_threshold_failures() {
        let cb = breaker(3, 60_000);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        match cb.check() {
            CallPermit::Rejected {
                retry_after_seconds,
            } => assert!(retry_after_seconds >= 1),
            CallPermit::Allowed => panic!("open circuit must reject"),
        }
    }

    #[test]
    fn test_half_open_after_break_and_close_on_success() {
        let cb = breaker(1, 0);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        // Break duration of zero: the next check admits a probe
        assert_eq!(cb.check(), CallPermit::Allowed);
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        // Only one probe at a time
        assert!(matches!(cb.check(), CallPermit::Rejected { .. }));

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.check(), CallPermit::Allowed);
    }

    #[test]
    fn test_half_open_reopens_on_probe_failure() {
        let cb = breaker(1, 0);
        cb.record_failure();
        assert_eq!(cb.check(), CallPermit::Allowed); // probe admitted
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = breaker(3, 100);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.failure_count(), 0);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_transitions_are_observable() {
        let cb = breaker(1, 60_000);
        let rx = cb.subscribe();
        cb.record_failure();
        assert_eq!(*rx.borrow(), CircuitState::Open);
    }

    #[test]
    fn test_last_success_recorded() {
        let cb = breaker(3, 100);
        assert!(cb.last_success().is_none());
        cb.record_success();
        assert!(cb.last_success().is_some());
    }
}
