use std::time::Duration;

use crate::error::SubmitError;

const RATE_LIMIT_FLOOR: Duration = Duration::from_millis(2000);
const SERVER_ERROR_FLOOR: Duration = Duration::from_millis(1200);
const NETWORK_FAILURE_CEILING: Duration = Duration::from_millis(4000);

/// How a sample/submit cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The capture stream had nothing to read.
    Skipped,
    Success,
    Failed(SubmitError),
}

/// Picks the delay before the next cycle.
///
/// Rate limits and server errors back off from the base cadence, so a burst
/// of them never compounds. Network failures compound on the previous delay
/// up to a ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    base: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration) -> Self {
        Self { base }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn next_delay(&self, previous: Duration, outcome: &CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::Skipped => previous,
            CycleOutcome::Success => self.base,
            CycleOutcome::Failed(SubmitError::RateLimited) => (self.base * 2).max(RATE_LIMIT_FLOOR),
            CycleOutcome::Failed(SubmitError::ServerError(_)) => {
                self.base.mul_f64(1.5).max(SERVER_ERROR_FLOOR)
            }
            CycleOutcome::Failed(SubmitError::NetworkFailure(_)) => {
                previous.mul_f64(1.5).min(NETWORK_FAILURE_CEILING)
            }
        }
    }
}
