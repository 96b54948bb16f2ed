/*!
 * Circuit breaker guarding the provider.
 *
 * Closed counts consecutive failures and trips to Open at the configured
 * threshold. Open rejects every dispatch until the cooldown elapses, then
 * admits a single half-open probe: a successful probe closes the breaker,
 * a failed one re-opens it for another full cooldown.
 */

use std::time::{Duration, Instant};

use log::{info, warn};
use parking_lot::Mutex;

use crate::app_config::EngineConfig;
use crate::errors::EngineError;

#[derive(Debug, Clone, Copy)]
enum State {
    Closed { consecutive_failures: u32 },
    Open { until: Instant },
    HalfOpen,
}

/// Shared failure gate for all dispatches of a job
pub struct CircuitBreaker {
    state: Mutex<State>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(State::Closed { consecutive_failures: 0 }),
            failure_threshold,
            cooldown,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.breaker_failure_threshold,
            Duration::from_millis(config.breaker_cooldown_ms),
        )
    }

    /// Check admission before a dispatch. An expired Open transitions to
    /// HalfOpen and admits the caller as the probe.
    pub fn preflight(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        match *state {
            State::Closed { .. } | State::HalfOpen => Ok(()),
            State::Open { until } => {
                let now = Instant::now();
                if now >= until {
                    info!("Circuit breaker half-open, admitting probe request");
                    *state = State::HalfOpen;
                    Ok(())
                } else {
                    Err(EngineError::CircuitOpen { cooldown: until - now })
                }
            }
        }
    }

    /// Record a successful dispatch, closing the breaker.
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        if matches!(*state, State::HalfOpen) {
            info!("Circuit breaker probe succeeded, closing");
        }
        *state = State::Closed { consecutive_failures: 0 };
    }

    /// Record a failed dispatch. Trips to Open at the threshold, and a
    /// failed half-open probe re-opens immediately.
    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        match *state {
            State::Closed { consecutive_failures } => {
                let failures = consecutive_failures + 1;
                if failures >= self.failure_threshold {
                    warn!(
                        "Circuit breaker tripped after {} consecutive failures, open for {:?}",
                        failures, self.cooldown
                    );
                    *state = State::Open { until: Instant::now() + self.cooldown };
                } else {
                    *state = State::Closed { consecutive_failures: failures };
                }
            }
            State::HalfOpen => {
                warn!("Circuit breaker probe failed, re-opening for {:?}", self.cooldown);
                *state = State::Open { until: Instant::now() + self.cooldown };
            }
            State::Open { .. } => {}
        }
    }

    /// Whether a dispatch would currently be admitted
    pub fn is_closed(&self) -> bool {
        matches!(*self.state.lock(), State::Closed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(threshold, Duration::from_millis(cooldown_ms))
    }

    #[test]
    fn test_closedBreaker_shouldAdmitRequests() {
        let breaker = breaker(3, 100);
        assert!(breaker.preflight().is_ok());
    }

    #[test]
    fn test_consecutiveFailures_atThreshold_shouldOpen() {
        let breaker = breaker(3, 10_000);
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.preflight().is_ok());

        breaker.record_failure();
        assert!(matches!(
            breaker.preflight(),
            Err(EngineError::CircuitOpen { .. })
        ));
    }

    #[test]
    fn test_successBeforeThreshold_shouldResetCounter() {
        let breaker = breaker(3, 10_000);
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();

        assert!(breaker.preflight().is_ok());
        assert!(breaker.is_closed());
    }

    #[test]
    fn test_expiredCooldown_shouldAdmitHalfOpenProbe() {
        let breaker = breaker(1, 10);
        breaker.record_failure();
        assert!(breaker.preflight().is_err());

        std::thread::sleep(Duration::from_millis(20));
        assert!(breaker.preflight().is_ok());
    }

    #[test]
    fn test_failedProbe_shouldReopen() {
        let breaker = breaker(1, 10);
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(20));
        assert!(breaker.preflight().is_ok());

        breaker.record_failure();
        assert!(breaker.preflight().is_err());
    }

    #[test]
    fn test_successfulProbe_shouldClose() {
        let breaker = breaker(1, 10);
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(20));
        assert!(breaker.preflight().is_ok());

        breaker.record_success();
        assert!(breaker.is_closed());
    }
}
