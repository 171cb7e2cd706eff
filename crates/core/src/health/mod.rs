//! API health monitoring (circuit breaker).
//!
//! Every external call reports its outcome here. When an endpoint looks
//! down (too many consecutive failures, or a high error rate over the
//! recent window) the monitor trips and stays tripped until an explicit
//! reset. The monitor never retries anything itself; call sites consult
//! it and stop issuing requests to an unhealthy endpoint.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Monitor thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Error-rate threshold over the window; strictly above trips.
    #[serde(default = "default_max_error_rate")]
    pub max_error_rate: f64,
    /// Sliding window length in seconds.
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// Minimum windowed attempts before the error rate is meaningful.
    #[serde(default = "default_min_attempts")]
    pub min_attempts: usize,
    /// Consecutive-failure count that trips immediately.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

fn default_max_error_rate() -> f64 {
    0.8
}
fn default_window_seconds() -> u64 {
    300
}
fn default_min_attempts() -> usize {
    10
}
fn default_max_consecutive_failures() -> u32 {
    5
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            max_error_rate: default_max_error_rate(),
            window_seconds: default_window_seconds(),
            min_attempts: default_min_attempts(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

/// Raised when the monitored endpoint is considered down.
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("endpoint '{endpoint}' unhealthy: {consecutive} consecutive failures")]
    ConsecutiveFailures { endpoint: String, consecutive: u32 },

    #[error(
        "endpoint '{endpoint}' unhealthy: {failures}/{attempts} failures ({rate:.0}%) in window"
    )]
    ErrorRate {
        endpoint: String,
        failures: usize,
        attempts: usize,
        rate: f64,
    },
}

/// Windowed attempt statistics, for end-of-run reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthStats {
    pub attempts: usize,
    pub failures: usize,
    pub success_rate: f64,
}

#[derive(Debug, Default)]
struct HealthState {
    window: VecDeque<(Instant, bool)>,
    consecutive_failures: u32,
    tripped: Option<TripCause>,
}

#[derive(Debug, Clone, Copy)]
enum TripCause {
    Consecutive(u32),
    ErrorRate { failures: usize, attempts: usize },
}

/// Circuit breaker for one external endpoint.
///
/// Owned explicitly and passed to every call site (`Arc<HealthMonitor>`),
/// never a global, so tests can substitute a fresh instance.
#[derive(Debug)]
pub struct HealthMonitor {
    endpoint: String,
    config: HealthConfig,
    state: Mutex<HealthState>,
}

impl HealthMonitor {
    pub fn new(endpoint: impl Into<String>, config: HealthConfig) -> Self {
        Self {
            endpoint: endpoint.into(),
            config,
            state: Mutex::new(HealthState::default()),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn prune(window: &mut VecDeque<(Instant, bool)>, now: Instant, window_len: Duration) {
        while let Some((t, _)) = window.front() {
            if now.duration_since(*t) > window_len {
                window.pop_front();
            } else {
                break;
            }
        }
    }

    // Trip conditions are evaluated here, on every recorded outcome.
    // Latching must not wait for a check() call: a success landing
    // right after the tripping failure would otherwise clear the
    // consecutive counter before the trip was ever observed.
    fn latch_if_unhealthy(&self, state: &mut HealthState) {
        if state.tripped.is_some() {
            return;
        }
        if state.consecutive_failures >= self.config.max_consecutive_failures {
            state.tripped = Some(TripCause::Consecutive(state.consecutive_failures));
        } else if state.window.len() >= self.config.min_attempts {
            let attempts = state.window.len();
            let failures = state.window.iter().filter(|(_, ok)| !ok).count();
            let rate = failures as f64 / attempts as f64;
            if rate > self.config.max_error_rate {
                state.tripped = Some(TripCause::ErrorRate { failures, attempts });
            }
        }
    }

    fn record_at(&self, at: Instant, success: bool) {
        let mut state = self.state.lock().unwrap();
        if success {
            state.consecutive_failures = 0;
        } else {
            state.consecutive_failures += 1;
        }
        state.window.push_back((at, success));
        let window_len = Duration::from_secs(self.config.window_seconds);
        Self::prune(&mut state.window, at, window_len);
        self.latch_if_unhealthy(&mut state);
    }

    /// Record a successful attempt. Resets the consecutive-failure
    /// counter but not the windowed error history.
    pub fn record_success(&self) {
        self.record_at(Instant::now(), true);
    }

    /// Record a failed attempt (timeout, transport error, 5xx).
    pub fn record_failure(&self) {
        self.record_at(Instant::now(), false);
    }

    /// Check endpoint health. Once tripped, the monitor stays unhealthy
    /// until [`reset`](Self::reset); there is no automatic recovery.
    pub fn check(&self) -> Result<(), HealthError> {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        let window_len = Duration::from_secs(self.config.window_seconds);
        Self::prune(&mut state.window, now, window_len);
        self.latch_if_unhealthy(&mut state);

        match state.tripped {
            None => Ok(()),
            Some(TripCause::Consecutive(consecutive)) => Err(HealthError::ConsecutiveFailures {
                endpoint: self.endpoint.clone(),
                consecutive,
            }),
            Some(TripCause::ErrorRate { failures, attempts }) => Err(HealthError::ErrorRate {
                endpoint: self.endpoint.clone(),
                failures,
                attempts,
                rate: failures as f64 / attempts as f64 * 100.0,
            }),
        }
    }

    pub fn is_unhealthy(&self) -> bool {
        self.check().is_err()
    }

    /// Windowed statistics for reporting.
    pub fn stats(&self) -> HealthStats {
        let mut state = self.state.lock().unwrap();
        let window_len = Duration::from_secs(self.config.window_seconds);
        Self::prune(&mut state.window, Instant::now(), window_len);
        let attempts = state.window.len();
        let failures = state.window.iter().filter(|(_, ok)| !ok).count();
        let success_rate = if attempts == 0 {
            100.0
        } else {
            (attempts - failures) as f64 / attempts as f64 * 100.0
        };
        HealthStats {
            attempts,
            failures,
            success_rate,
        }
    }

    /// Clear all state, including a tripped breaker.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        *state = HealthState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> HealthMonitor {
        HealthMonitor::new("catalog", HealthConfig::default())
    }

    #[test]
    fn test_healthy_initially() {
        assert!(monitor().check().is_ok());
    }

    #[test]
    fn test_consecutive_failures_trip_before_min_attempts() {
        let m = monitor();
        for _ in 0..5 {
            m.record_failure();
        }
        // Only 5 attempts, below min_attempts, but the consecutive rule fires
        let err = m.check().unwrap_err();
        assert!(matches!(err, HealthError::ConsecutiveFailures { consecutive: 5, .. }));
    }

    #[test]
    fn test_success_resets_consecutive_but_not_window() {
        let m = monitor();
        for _ in 0..4 {
            m.record_failure();
        }
        m.record_success();
        assert!(m.check().is_ok());
        let stats = m.stats();
        assert_eq!(stats.attempts, 5);
        assert_eq!(stats.failures, 4);
    }

    #[test]
    fn test_error_rate_trips_after_min_attempts() {
        let m = monitor();
        // Runs of four failures so the consecutive rule never fires;
        // 8/10 = 80% is not strictly above the threshold yet
        for _ in 0..2 {
            for _ in 0..4 {
                m.record_failure();
            }
            m.record_success();
        }
        assert!(m.check().is_ok());
        // 12/14 = 86% clears it
        for _ in 0..4 {
            m.record_failure();
        }
        let err = m.check().unwrap_err();
        assert!(matches!(err, HealthError::ErrorRate { .. }));
    }

    #[test]
    fn test_error_rate_needs_min_attempts() {
        let m = monitor();
        // 100% errors but only 4 attempts and never 5 consecutive
        m.record_failure();
        m.record_failure();
        m.record_failure();
        m.record_failure();
        assert!(m.check().is_ok());
    }

    #[test]
    fn test_trip_latches_without_intervening_check() {
        let m = monitor();
        for _ in 0..5 {
            m.record_failure();
        }
        // A success lands before anyone consults the monitor; the trip
        // must already be latched, not recomputed from the reset counter
        m.record_success();
        assert!(matches!(
            m.check().unwrap_err(),
            HealthError::ConsecutiveFailures { consecutive: 5, .. }
        ));
    }

    #[test]
    fn test_tripped_stays_tripped() {
        let m = monitor();
        for _ in 0..5 {
            m.record_failure();
        }
        assert!(m.check().is_err());
        // Successes do not recover a tripped breaker
        for _ in 0..20 {
            m.record_success();
        }
        assert!(m.check().is_err());
    }

    #[test]
    fn test_reset_recovers() {
        let m = monitor();
        for _ in 0..5 {
            m.record_failure();
        }
        assert!(m.check().is_err());
        m.reset();
        assert!(m.check().is_ok());
        assert_eq!(m.stats().attempts, 0);
    }

    #[test]
    fn test_old_entries_age_out() {
        let m = monitor();
        let old = Instant::now() - Duration::from_secs(400);
        m.record_at(old, false);
        m.record_at(old, false);
        m.record_success();
        assert_eq!(m.stats().attempts, 1);
        assert_eq!(m.stats().failures, 0);
    }

    #[test]
    fn test_boundary_rate_not_strictly_greater() {
        let m = HealthMonitor::new(
            "x",
            HealthConfig {
                max_error_rate: 0.8,
                min_attempts: 10,
                ..HealthConfig::default()
            },
        );
        // Exactly 8/10 failures = 0.8, not > 0.8: stays healthy
        for i in 0..10 {
            if i % 5 == 4 {
                m.record_success();
            } else {
                m.record_failure();
            }
        }
        assert!(m.check().is_ok());
    }
}
