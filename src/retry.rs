//! Retry decisions for the metadata fetch loop.
//!
//! Attempts are retried immediately: the service is on the same host and a
//! delay only slows down detection.

use crate::config::DEFAULT_MAX_RETRIES;
use crate::error::MetadataError;

/// What the fetch loop does after a failed attempt.
#[derive(Debug)]
pub enum RetryResult {
    /// The error is not retryable, stop the loop.
    Permanent(MetadataError),
    /// The error is retryable but the retry budget is spent.
    Exhausted(MetadataError),
    /// The availability check hit a "service not present" condition.
    FailFast(MetadataError),
    /// Try again.
    Continue(MetadataError),
}

impl RetryResult {
    /// Whether the loop should make another attempt.
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue(_))
    }

    /// The error that produced this outcome.
    pub fn into_error(self) -> MetadataError {
        match self {
            Self::Permanent(e) | Self::Exhausted(e) | Self::FailFast(e) | Self::Continue(e) => e,
        }
    }
}

/// Bounded, immediate retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    fail_fast: bool,
}

impl RetryPolicy {
    /// Retry ordinary failures up to `max_retries` times after the first try.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            fail_fast: false,
        }
    }

    /// Same budget, but host-not-found and resource-not-found stop at once.
    pub fn fail_fast(max_retries: u32) -> Self {
        Self {
            max_retries,
            fail_fast: true,
        }
    }

    /// Retries allowed after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether fail-fast transport errors end the loop immediately.
    pub fn is_fail_fast(&self) -> bool {
        self.fail_fast
    }

    /// Classify the error from attempt number `state.attempts()`.
    pub fn on_error(&self, state: &RetryState, error: MetadataError) -> RetryResult {
        let fail_fast = self.fail_fast
            && error
                .as_transport()
                .is_some_and(|e| e.kind().is_fail_fast());
        let retryable = matches!(
            error,
            MetadataError::Transport(_) | MetadataError::UnsuccessfulResponse { .. }
        );

        if fail_fast {
            RetryResult::FailFast(error)
        } else if !retryable {
            RetryResult::Permanent(error)
        } else if state.retries_used() < self.max_retries {
            RetryResult::Continue(error)
        } else {
            RetryResult::Exhausted(error)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

/// Per-call attempt counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of an attempt, returning its 1-based number.
    pub fn start_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Attempts made beyond the first.
    pub fn retries_used(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}
