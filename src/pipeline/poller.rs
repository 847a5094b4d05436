use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tower::{Service, ServiceExt};
use tracing::{debug, info, warn};

use crate::error::SubmitError;
use crate::inference::InferenceResult;
use crate::network::client::LatestSummary;
use crate::pipeline::scheduler::SchedulerCommand;
use crate::render::RenderSink;

/// Fetches the server's latest summary on a fixed interval.
///
/// Used when no capture device is configured. Failures are logged and the
/// previous summary stays on screen; the cadence never changes.
pub struct SummaryPoller<S, K> {
    service: S,
    sink: K,
    interval: Duration,
    commands: mpsc::Receiver<SchedulerCommand>,
}

impl<S, K> SummaryPoller<S, K>
where
    S: Service<LatestSummary, Response = InferenceResult, Error = SubmitError>,
    K: RenderSink,
{
    pub fn new(
        service: S,
        sink: K,
        interval: Duration,
        commands: mpsc::Receiver<SchedulerCommand>,
    ) -> Self {
        Self {
            service,
            sink,
            interval,
            commands,
        }
    }

    /// Polls until `Shutdown` arrives or the command sender is dropped.
    /// Returns the number of polls made.
    pub async fn run(mut self) -> u64 {
        info!("Polling latest summary every {}ms", self.interval.as_millis());
        self.sink.status("No camera configured, polling latest summary");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polls = 0;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    polls += 1;
                    self.poll_once().await;
                }
                command = self.commands.recv() => match command {
                    Some(SchedulerCommand::Shutdown) | None => break,
                    Some(other) => debug!("Ignoring {:?} while polling", other),
                },
            }
        }
        info!("Poller stopped after {} poll(s)", polls);
        polls
    }

    async fn poll_once(&mut self) {
        let result = match self.service.ready().await {
            Ok(service) => service.call(LatestSummary).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(result) => self.sink.render_summary(Some(&result)),
            Err(e) => warn!("Poll error: {}", e),
        }
    }
}
