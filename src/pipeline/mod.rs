pub mod backoff;
pub mod metrics;
pub mod poller;
pub mod scheduler;
pub mod state;

pub use backoff::{BackoffPolicy, CycleOutcome};
pub use metrics::CycleStats;
pub use poller::SummaryPoller;
pub use scheduler::{AdaptiveScheduler, SchedulerCommand};
pub use state::{Phase, SchedulerState};
