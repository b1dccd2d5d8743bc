//! Retry delay computation and the per-call retry state machine.
//!
//! The async and blocking clients drive the same [`RetryLoop`]; they differ
//! only in how they wait out a [`Step::Wait`] (cooperative `tokio` sleep vs.
//! a blocking thread sleep).

use std::time::{Duration, Instant};

use rand::Rng;
use reqwest::Method;
use tracing::{debug, error, warn};

use crate::{EvalHubError, Result, RetryPolicy};

/// Computes the delay in seconds after the failed attempt `attempt` (0-based).
///
/// `min(initial_delay * backoff_factor^attempt, max_delay)`, scaled into
/// `[0.5, 1.0)` of itself when `randomize` is set.
pub fn calculate_retry_delay(
    attempt: u32,
    initial_delay: f64,
    max_delay: f64,
    backoff_factor: f64,
    randomize: bool,
) -> f64 {
    // 0 * inf would be NaN for very large attempt counts.
    if initial_delay <= 0.0 {
        return 0.0;
    }

    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = (initial_delay * backoff_factor.powi(exponent)).min(max_delay);

    if randomize {
        let jitter: f64 = rand::thread_rng().gen_range(0.0..0.5);
        base * (0.5 + jitter)
    } else {
        base
    }
}

/// Whether a failed attempt may be repeated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureClass {
    Retryable,
    Fatal,
}

/// Classifies a failed attempt.
///
/// Timeouts, connection failures and 5xx responses are retryable; 401, 403
/// and every other status below 500 are fatal, as is anything that is not a
/// transport or status failure.
pub fn classify(err: &EvalHubError) -> FailureClass {
    match err {
        EvalHubError::Transport(err) => {
            if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
                FailureClass::Retryable
            } else {
                FailureClass::Fatal
            }
        }
        EvalHubError::Http { status, .. } if *status >= 500 => FailureClass::Retryable,
        _ => FailureClass::Fatal,
    }
}

/// Outcome of a single attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RetryableFailure,
    FatalFailure,
}

/// Ephemeral record of one attempt inside a logical call.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestAttempt {
    pub method: Method,
    pub url: String,
    pub attempt_index: u32,
    pub outcome: AttemptOutcome,
    /// Wait scheduled before the next attempt, if one follows.
    pub computed_delay: Option<Duration>,
}

/// What the caller does after reporting an attempt.
#[derive(Debug)]
pub enum Step<T> {
    /// The call is over; hand this result to the caller.
    Done(Result<T>),
    /// Suspend for the given duration, then attempt again.
    Wait(Duration),
}

/// Retry state for one logical call.
///
/// Starts in the attempting state with `attempt = 0`. Each call to
/// [`RetryLoop::record`] either ends the call or schedules a wait.
#[derive(Debug)]
pub struct RetryLoop<'a> {
    policy: &'a RetryPolicy,
    method: Method,
    url: String,
    attempt: u32,
    started: Instant,
    last: Option<RequestAttempt>,
}

impl<'a> RetryLoop<'a> {
    pub fn new(policy: &'a RetryPolicy, method: Method, url: impl Into<String>) -> Self {
        Self {
            policy,
            method,
            url: url.into(),
            attempt: 0,
            started: Instant::now(),
            last: None,
        }
    }

    /// Index of the attempt about to be made (0-based).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The most recently recorded attempt.
    pub fn last_attempt(&self) -> Option<&RequestAttempt> {
        self.last.as_ref()
    }

    /// Records the result of the current attempt and decides the next step.
    pub fn record<T>(&mut self, result: Result<T>) -> Step<T> {
        let err = match result {
            Ok(value) => {
                self.remember(AttemptOutcome::Success, None);
                return Step::Done(Ok(value));
            }
            Err(err) => err,
        };

        if classify(&err) == FailureClass::Fatal {
            self.log_fatal(&err);
            self.remember(AttemptOutcome::FatalFailure, None);
            return Step::Done(Err(err));
        }

        let max_retries = self.policy.max_retries;
        if self.attempt >= max_retries {
            error!(
                method = %self.method,
                url = %self.url,
                max_retries,
                error = %err,
                "request failed after exhausting retries"
            );
            self.remember(AttemptOutcome::RetryableFailure, None);
            return Step::Done(Err(err));
        }

        let delay = self.policy.delay_for(self.attempt);
        if let Some(deadline) = self.policy.overall_deadline {
            if self.started.elapsed() + delay > deadline {
                error!(
                    method = %self.method,
                    url = %self.url,
                    deadline_secs = deadline.as_secs_f64(),
                    error = %err,
                    "retry would exceed overall deadline, giving up"
                );
                self.remember(AttemptOutcome::RetryableFailure, None);
                return Step::Done(Err(err));
            }
        }

        warn!(
            method = %self.method,
            url = %self.url,
            delay_secs = delay.as_secs_f64(),
            attempt = self.attempt + 1,
            max_retries,
            error = %err,
            "{}, retrying",
            describe_retryable(&err)
        );
        self.remember(AttemptOutcome::RetryableFailure, Some(delay));
        self.attempt += 1;
        Step::Wait(delay)
    }

    fn remember(&mut self, outcome: AttemptOutcome, computed_delay: Option<Duration>) {
        let attempt = RequestAttempt {
            method: self.method.clone(),
            url: self.url.clone(),
            attempt_index: self.attempt,
            outcome,
            computed_delay,
        };
        debug!(?attempt, "request attempt finished");
        self.last = Some(attempt);
    }

    fn log_fatal(&self, err: &EvalHubError) {
        match err.status() {
            Some(401) => error!(
                url = %self.url,
                "authentication failed (401): ensure a valid service account token or API key is configured"
            ),
            Some(403) => error!(
                url = %self.url,
                "authorization failed (403): ensure the credential has the permissions required for this resource"
            ),
            _ => debug!(url = %self.url, error = %err, "request failed with non-retryable error"),
        }
    }
}

fn describe_retryable(err: &EvalHubError) -> String {
    match err {
        EvalHubError::Http { status, .. } => format!("server error {status}"),
        EvalHubError::Transport(err) if err.is_timeout() => "request timed out".to_owned(),
        _ => "connection error".to_owned(),
    }
}
