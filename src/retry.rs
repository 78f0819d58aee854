use crate::display::RenderError;
use tracing::warn;

/// Decision returned by the retry policy after a render attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// The display applied the value — go on and step the counter.
    Proceed,
    /// The render failed — try the same value again (1-based attempt number).
    Retry { attempt: u32 },
    /// Give up on this value and do not step the counter.
    Skip,
}

/// Bounded retry policy for failed render rendezvous.
///
/// Tracks attempts for the value currently being shown. A skipped value
/// does NOT advance the counter, so what was counted never runs ahead of
/// what was shown.
pub struct RetryPolicy {
    max_retries: u32,
    current_attempt: u32,
}

impl RetryPolicy {
    /// Create a new retry policy from config values.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            current_attempt: 0,
        }
    }

    /// Evaluate a render outcome and decide what to do next.
    ///
    /// Success returns `Proceed`. A failure returns `Retry` while attempts
    /// remain, `Skip` once they are exhausted. A terminal error skips at once.
    pub fn evaluate(&mut self, outcome: &Result<(), RenderError>) -> RetryDecision {
        let error = match outcome {
            Ok(()) => return RetryDecision::Proceed,
            Err(e) => e,
        };

        if error.is_terminal() {
            warn!(error = %error, "render failed permanently, not retrying");
            return RetryDecision::Skip;
        }

        self.current_attempt += 1;

        if self.current_attempt <= self.max_retries {
            warn!(
                error = %error,
                attempt = self.current_attempt,
                max_retries = self.max_retries,
                "render failed, retrying"
            );
            RetryDecision::Retry {
                attempt: self.current_attempt,
            }
        } else {
            warn!(
                error = %error,
                max_retries = self.max_retries,
                "render retries exhausted, skipping step"
            );
            RetryDecision::Skip
        }
    }

    /// Reset the retry counter for the next value.
    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    /// Current attempt count (0 = no retries yet).
    #[allow(dead_code)]
    pub fn current_attempt(&self) -> u32 {
        self.current_attempt
    }
}
