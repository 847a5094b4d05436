use chrono::{DateTime, Local};
use std::time::Duration;

use crate::pipeline::backoff::CycleOutcome;
use crate::error::SubmitError;

const ROUND_TRIP_ALPHA: f32 = 0.2;

/// Counters for the scheduling loop, shown in the UI footer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleStats {
    pub cycles: u64,
    pub skipped: u64,
    pub successes: u64,
    pub rate_limited: u64,
    pub server_errors: u64,
    pub network_failures: u64,
    /// EWMA of submit round trips, in milliseconds.
    pub avg_round_trip_ms: f32,
    pub last_round_trip: Option<Duration>,
    pub last_cycle_at: Option<DateTime<Local>>,
}

impl CycleStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &CycleOutcome, round_trip: Option<Duration>) {
        self.cycles += 1;
        self.last_cycle_at = Some(Local::now());
        match outcome {
            CycleOutcome::Skipped => self.skipped += 1,
            CycleOutcome::Success => self.successes += 1,
            CycleOutcome::Failed(SubmitError::RateLimited) => self.rate_limited += 1,
            CycleOutcome::Failed(SubmitError::ServerError(_)) => self.server_errors += 1,
            CycleOutcome::Failed(SubmitError::NetworkFailure(_)) => self.network_failures += 1,
        }
        if let Some(round_trip) = round_trip {
            let sample = round_trip.as_secs_f32() * 1000.0;
            self.avg_round_trip_ms = if self.last_round_trip.is_none() {
                sample
            } else {
                ROUND_TRIP_ALPHA * sample + (1.0 - ROUND_TRIP_ALPHA) * self.avg_round_trip_ms
            };
            self.last_round_trip = Some(round_trip);
        }
    }

    pub fn failures(&self) -> u64 {
        self.rate_limited + self.server_errors + self.network_failures
    }
}
