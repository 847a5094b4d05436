use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::capture::Facing;

// Phases of one sample/submit cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Sampling,
    Submitting,
    Rendering,
    BackingOff,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "Idle",
            Phase::Sampling => "Sampling",
            Phase::Submitting => "Submitting",
            Phase::Rendering => "Rendering",
            Phase::BackingOff => "BackingOff",
        };
        f.write_str(name)
    }
}

/// State threaded through the scheduling loop.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerState {
    pub current_delay: Duration,
    pub facing: Facing,
    phase: Phase,
    cycle: u64,
}

impl SchedulerState {
    pub fn new(base_delay: Duration, facing: Facing) -> Self {
        Self {
            current_delay: base_delay,
            facing,
            phase: Phase::Idle,
            cycle: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub(crate) fn begin_cycle(&mut self) {
        self.cycle += 1;
        self.enter(Phase::Sampling);
    }

    pub(crate) fn enter(&mut self, phase: Phase) {
        debug!("cycle {}: {} -> {}", self.cycle, self.phase, phase);
        self.phase = phase;
    }
}
