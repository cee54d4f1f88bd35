//! # Health Verifier
//!
//! The terminal gate of a run. Probes the restored service up to
//! `attempts` times, `interval` apart, and passes once `required_consecutive`
//! probes in a row succeed. A failed probe resets the streak.
//!
//! This is the only place a run waits: the loop sleeps cooperatively between
//! probes and gives up as soon as the remaining attempts can no longer produce
//! the required streak.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::RetryBudget;
use crate::error::{Result, RollbackError};
use crate::models::HealthReport;
use crate::orchestration::types::HealthProbe;

pub struct HealthVerifier {
    probe: Arc<dyn HealthProbe>,
    budget: RetryBudget,
}

impl HealthVerifier {
    pub fn new(probe: Arc<dyn HealthProbe>, budget: RetryBudget) -> Self {
        Self { probe, budget }
    }

    pub fn budget(&self) -> &RetryBudget {
        &self.budget
    }

    /// Poll until healthy or the budget is spent
    pub async fn verify(&self) -> Result<HealthReport> {
        let started = Instant::now();
        let required = self.budget.required_consecutive.max(1);
        let mut streak = 0u32;
        let mut attempts = 0u32;
        let mut last_error = String::from("no probe was attempted");

        info!(
            probe = %self.probe.target(),
            attempts = self.budget.attempts,
            interval_ms = self.budget.interval_ms,
            required_consecutive = required,
            "Verifying service health"
        );

        while attempts < self.budget.attempts {
            if attempts > 0 {
                tokio::time::sleep(self.budget.interval()).await;
            }
            attempts += 1;

            match self.probe.probe().await {
                Ok(()) => {
                    streak += 1;
                    debug!(attempt = attempts, streak, "Health probe succeeded");
                    if streak >= required {
                        let report = HealthReport {
                            attempts,
                            consecutive_successes: streak,
                            required_consecutive: required,
                            elapsed_ms: started.elapsed().as_millis() as u64,
                        };
                        info!(attempts, "Service is healthy");
                        return Ok(report);
                    }
                }
                Err(e) => {
                    streak = 0;
                    warn!(attempt = attempts, error = %e, "Health probe failed");
                    last_error = e.to_string();
                }
            }

            let remaining = self.budget.attempts - attempts;
            if streak + remaining < required {
                debug!(remaining, streak, "Required streak no longer reachable");
                break;
            }
        }

        Err(RollbackError::HealthCheckFailed {
            attempts,
            required_consecutive: required,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::types::ProbeError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays a fixed sequence of probe results; healthy once exhausted
    struct Sequence {
        results: Mutex<VecDeque<bool>>,
        calls: Mutex<u32>,
    }

    impl Sequence {
        fn new(results: &[bool]) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.iter().copied().collect()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock()
        }
    }

    #[async_trait]
    impl HealthProbe for Sequence {
        fn target(&self) -> String {
            "sequence".to_string()
        }

        async fn probe(&self) -> std::result::Result<(), ProbeError> {
            *self.calls.lock() += 1;
            match self.results.lock().pop_front() {
                Some(false) => Err(ProbeError("HTTP 503".to_string())),
                _ => Ok(()),
            }
        }
    }

    fn budget(attempts: u32, required_consecutive: u32) -> RetryBudget {
        RetryBudget {
            attempts,
            interval_ms: 0,
            required_consecutive,
        }
    }

    #[tokio::test]
    async fn test_first_probe_healthy() {
        let probe = Sequence::new(&[true]);
        let report = HealthVerifier::new(probe.clone(), budget(5, 1))
            .verify()
            .await
            .unwrap();

        assert_eq!(report.attempts, 1);
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_resets_streak() {
        let probe = Sequence::new(&[true, false, true, true]);
        let report = HealthVerifier::new(probe.clone(), budget(6, 2))
            .verify()
            .await
            .unwrap();

        assert_eq!(report.attempts, 4);
        assert_eq!(report.consecutive_successes, 2);
    }

    #[tokio::test]
    async fn test_budget_exhausted() {
        let probe = Sequence::new(&[false, false, false]);
        let err = HealthVerifier::new(probe.clone(), budget(3, 1))
            .verify()
            .await
            .unwrap_err();

        match err {
            RollbackError::HealthCheckFailed {
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error, "HTTP 503");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_gives_up_when_streak_unreachable() {
        // After the failure on attempt 3 one attempt remains but three in a row are needed
        let probe = Sequence::new(&[true, true, false]);
        let err = HealthVerifier::new(probe.clone(), budget(4, 3))
            .verify()
            .await
            .unwrap_err();

        assert!(matches!(err, RollbackError::HealthCheckFailed { attempts: 3, .. }));
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_interval_between_probes() {
        let probe = Sequence::new(&[false, true]);
        let verifier = HealthVerifier::new(
            probe,
            RetryBudget {
                attempts: 3,
                interval_ms: 3_000,
                required_consecutive: 1,
            },
        );

        let before = tokio::time::Instant::now();
        verifier.verify().await.unwrap();
        assert!(before.elapsed() >= std::time::Duration::from_millis(3_000));
    }
}
