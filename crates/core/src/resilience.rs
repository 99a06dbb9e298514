//! Bounded retry and timeout envelope for collaborator calls.
//!
//! Every call to something outside the process goes through a [`RetryPolicy`]:
//! each attempt runs under a fixed timeout, retryable failures are retried
//! after a fixed backoff, and once the budget is spent the last failure is
//! returned as [`ExternalCallFailed`].

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::config::ResilienceConfig;
use crate::errors::{CallFailure, CollaboratorError, ExternalCallFailed};

pub type RetryPredicate = fn(&CollaboratorError) -> bool;

/// Retries everything except calls to collaborators that were never configured.
pub fn retry_unless_unconfigured(error: &CollaboratorError) -> bool {
    !matches!(error, CollaboratorError::NotConfigured(_))
}

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub attempts: u32,
    pub timeout: Duration,
    pub backoff: Duration,
    pub retryable: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 1,
            timeout: Duration::from_secs(3),
            backoff: Duration::from_millis(100),
            retryable: retry_unless_unconfigured,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, timeout: Duration, backoff: Duration) -> Self {
        Self { attempts, timeout, backoff, retryable: retry_unless_unconfigured }
    }

    pub fn with_retryable(mut self, retryable: RetryPredicate) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn total_attempts(&self) -> u32 {
        self.attempts.saturating_add(1)
    }

    pub async fn call<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt_call: F,
    ) -> Result<T, ExternalCallFailed>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CollaboratorError>>,
    {
        let total = self.total_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let failure = match tokio::time::timeout(self.timeout, attempt_call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(cause)) => {
                    let retryable = (self.retryable)(&cause);
                    warn!(
                        event_name = "collaborator.call.failed",
                        operation,
                        attempt,
                        max_attempts = total,
                        retryable,
                        error = %cause,
                        "collaborator call failed"
                    );
                    if !retryable {
                        return Err(ExternalCallFailed {
                            operation,
                            attempts: attempt,
                            cause: CallFailure::Collaborator(cause),
                        });
                    }
                    CallFailure::Collaborator(cause)
                }
                Err(_) => {
                    warn!(
                        event_name = "collaborator.call.timed_out",
                        operation,
                        attempt,
                        max_attempts = total,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "collaborator call timed out"
                    );
                    CallFailure::TimedOut(self.timeout)
                }
            };

            if attempt >= total {
                error!(
                    event_name = "collaborator.call.exhausted",
                    operation,
                    attempts = attempt,
                    error = %failure,
                    "collaborator call failed after all attempts"
                );
                return Err(ExternalCallFailed { operation, attempts: attempt, cause: failure });
            }

            if !self.backoff.is_zero() {
                tokio::time::sleep(self.backoff).await;
            }
        }
    }
}

/// The two timeout profiles used across the runtime.
#[derive(Clone, Debug)]
pub struct ResiliencePolicies {
    /// Session, retrieval, order/catalog reads, analytics and reply delivery.
    pub lookup: RetryPolicy,
    /// Response generation and escalation notification.
    pub critical: RetryPolicy,
}

impl Default for ResiliencePolicies {
    fn default() -> Self {
        Self {
            lookup: RetryPolicy::default(),
            critical: RetryPolicy { timeout: Duration::from_secs(5), ..RetryPolicy::default() },
        }
    }
}

impl From<&ResilienceConfig> for ResiliencePolicies {
    fn from(config: &ResilienceConfig) -> Self {
        let backoff = Duration::from_millis(config.backoff_ms);
        Self {
            lookup: RetryPolicy::new(
                config.retry_attempts,
                Duration::from_millis(config.lookup_timeout_ms),
                backoff,
            ),
            critical: RetryPolicy::new(
                config.retry_attempts,
                Duration::from_millis(config.critical_timeout_ms),
                backoff,
            ),
        }
    }
}
