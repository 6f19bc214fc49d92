//! Bounded retry with backoff, modeled as an explicit state machine.
//!
//! Every attempt goes through a [`CallGate`], which holds one permit of the
//! shared call semaphore for the duration of the call and applies the
//! per-call timeout.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::llm::{LlmError, ReasoningRequest, ReasoningResponse, ReasoningService};

/// Retry tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Policy for `retries` retries after the first attempt.
    pub fn with_retries(retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: retries + 1,
            base_delay,
            max_delay,
            multiplier: 2,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStep {
    /// Sleep for the given delay, then try again.
    Wait(Duration),
    /// Stop: the failure is terminal.
    Stop,
}

/// Terminal state of a retried call.
#[derive(Debug, Clone)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempts: u32 },
    /// Every attempt failed with a transient error.
    Exhausted { attempts: u32, last_error: LlmError },
    /// A non-transient error ended the loop early.
    NonTransient { attempts: u32, error: LlmError },
}

impl<T> RetryOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::NonTransient { attempts, .. } => *attempts,
        }
    }

    /// Retries used beyond the first attempt.
    pub fn retries(&self) -> u32 {
        self.attempts().saturating_sub(1)
    }

    pub fn into_result(self) -> Result<T, LlmError> {
        match self {
            Self::Succeeded { value, .. } => Ok(value),
            Self::Exhausted { last_error, .. } => Err(last_error),
            Self::NonTransient { error, .. } => Err(error),
        }
    }
}

/// Attempt counter, last error and next delay for one retried call.
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempt: u32,
    last_error: Option<LlmError>,
    next_delay: Duration,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            last_error: None,
            next_delay: policy.base_delay,
        }
    }

    /// Attempts made so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn last_error(&self) -> Option<&LlmError> {
        self.last_error.as_ref()
    }

    pub fn next_delay(&self) -> Duration {
        self.next_delay
    }

    /// Record a failed attempt and decide whether to continue.
    pub fn record_failure(&mut self, error: LlmError) -> RetryStep {
        self.attempt += 1;
        let transient = error.is_transient();
        let suggested = error.retry_after();
        self.last_error = Some(error);

        if !transient || self.attempt >= self.policy.max_attempts {
            return RetryStep::Stop;
        }

        let delay = suggested.unwrap_or(self.next_delay);
        self.next_delay = (self.next_delay * self.policy.multiplier).min(self.policy.max_delay);
        RetryStep::Wait(delay)
    }

    /// Turn the final state into an outcome after `record_failure` said stop.
    pub fn finish<T>(self) -> RetryOutcome<T> {
        let attempts = self.attempt;
        match self.last_error {
            Some(error) if !error.is_transient() => RetryOutcome::NonTransient { attempts, error },
            Some(last_error) => RetryOutcome::Exhausted {
                attempts,
                last_error,
            },
            None => RetryOutcome::Exhausted {
                attempts,
                last_error: LlmError::Connection("no attempt was made".to_string()),
            },
        }
    }
}

/// Shared call discipline: global concurrency cap plus per-call timeout.
#[derive(Debug, Clone)]
pub struct CallGate {
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl CallGate {
    pub fn new(permits: Arc<Semaphore>, timeout: Duration) -> Self {
        Self { permits, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one call while holding a permit.
    pub async fn call(
        &self,
        service: &dyn ReasoningService,
        request: &ReasoningRequest,
    ) -> Result<ReasoningResponse, LlmError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| LlmError::Connection("call semaphore closed".to_string()))?;

        match tokio::time::timeout(self.timeout, service.invoke(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.timeout.as_secs())),
        }
    }

    /// Run a call with retries. `on_retry` is told about each scheduled retry.
    pub async fn call_with_retry<F>(
        &self,
        service: &dyn ReasoningService,
        request: &ReasoningRequest,
        policy: RetryPolicy,
        mut on_retry: F,
    ) -> RetryOutcome<ReasoningResponse>
    where
        F: FnMut(u32, &LlmError, Duration),
    {
        let mut state = RetryState::new(policy);
        loop {
            match self.call(service, request).await {
                Ok(value) => {
                    return RetryOutcome::Succeeded {
                        value,
                        attempts: state.attempt() + 1,
                    }
                }
                Err(error) => match state.record_failure(error) {
                    RetryStep::Wait(delay) => {
                        if let Some(err) = state.last_error() {
                            on_retry(state.attempt(), err, delay);
                        }
                        // The permit is released while sleeping.
                        tokio::time::sleep(delay).await;
                    }
                    RetryStep::Stop => return state.finish(),
                },
            }
        }
    }
}
