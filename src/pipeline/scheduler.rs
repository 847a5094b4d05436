use chrono::Local;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tower::{Service, ServiceExt};
use tracing::{debug, error, info, instrument, warn};

use crate::capture::{Facing, FrameSampler};
use crate::common::EncodedFrame;
use crate::error::SubmitError;
use crate::inference::InferenceResult;
use crate::pipeline::backoff::{BackoffPolicy, CycleOutcome};
use crate::pipeline::metrics::CycleStats;
use crate::pipeline::state::{Phase, SchedulerState};
use crate::render::RenderSink;

/// Requests the loop handles between cycles.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerCommand {
    SwitchFacing(Facing),
    ToggleFacing,
    Shutdown,
}

/// Single-threaded sample/submit loop with one cycle in flight at a time.
///
/// The next cycle is scheduled only after the previous one has rendered or
/// reported its failure, so a slow submit delays the loop instead of piling
/// requests up.
pub struct AdaptiveScheduler<S, K> {
    sampler: FrameSampler,
    service: S,
    sink: K,
    policy: BackoffPolicy,
    state: SchedulerState,
    stats: CycleStats,
    commands: mpsc::Receiver<SchedulerCommand>,
}

impl<S, K> AdaptiveScheduler<S, K>
where
    S: Service<EncodedFrame, Response = InferenceResult, Error = SubmitError>,
    K: RenderSink,
{
    pub fn new(
        sampler: FrameSampler,
        service: S,
        sink: K,
        policy: BackoffPolicy,
        commands: mpsc::Receiver<SchedulerCommand>,
    ) -> Self {
        let facing = sampler.camera().facing();
        Self {
            sampler,
            service,
            sink,
            policy,
            state: SchedulerState::new(policy.base(), facing),
            stats: CycleStats::new(),
            commands,
        }
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Runs until `Shutdown` arrives or every command sender is dropped, then
    /// releases the capture stream.
    pub async fn run(mut self) -> SchedulerState {
        info!(
            "Scheduler starting, base cadence {}ms",
            self.policy.base().as_millis()
        );
        self.switch_camera(self.state.facing).await;

        loop {
            self.run_cycle().await;
            let delay = self.state.current_delay;
            if !self.wait(delay).await {
                break;
            }
        }

        self.sampler.camera_mut().release();
        info!("Scheduler stopped after {} cycle(s)", self.state.cycle());
        self.state
    }

    /// One sample/submit/render cycle. Updates the delay before returning.
    #[instrument(skip(self), fields(cycle = self.state.cycle() + 1))]
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.state.begin_cycle();

        let frame = match self.sampler.sample().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("Frame not ready, skipping cycle");
                return self.finish(CycleOutcome::Skipped, None);
            }
            Err(e) => {
                warn!("Sampling failed: {}", e);
                self.sink.status(&format!("Camera error: {}", e));
                return self.finish(CycleOutcome::Skipped, None);
            }
        };
        self.sink.frame(&frame);

        self.state.enter(Phase::Submitting);
        let started = Instant::now();
        let result = match self.service.ready().await {
            Ok(service) => service.call(frame.clone()).await,
            Err(e) => Err(e),
        };
        let round_trip = started.elapsed();

        let outcome = match result {
            Ok(result) => {
                self.state.enter(Phase::Rendering);
                self.sink.render(&result, &frame);
                self.sink
                    .status(&format!("Updated {}", Local::now().format("%H:%M:%S")));
                CycleOutcome::Success
            }
            Err(error) => {
                self.state.enter(Phase::BackingOff);
                warn!("Submit failed: {}", error);
                self.sink.status(&error.to_string());
                CycleOutcome::Failed(error)
            }
        };
        self.finish(outcome, Some(round_trip))
    }

    fn finish(&mut self, outcome: CycleOutcome, round_trip: Option<Duration>) -> CycleOutcome {
        let previous = self.state.current_delay;
        self.state.current_delay = self.policy.next_delay(previous, &outcome);
        if self.state.current_delay != previous {
            debug!(
                "Delay {}ms -> {}ms",
                previous.as_millis(),
                self.state.current_delay.as_millis()
            );
        }
        self.stats.record(&outcome, round_trip);
        self.sink.stats(&self.stats);
        outcome
    }

    /// Sleeps out `delay`, handling commands meanwhile. False means stop.
    async fn wait(&mut self, delay: Duration) -> bool {
        self.state.enter(Phase::Idle);
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                command = self.commands.recv() => match command {
                    Some(SchedulerCommand::SwitchFacing(facing)) => self.switch_camera(facing).await,
                    Some(SchedulerCommand::ToggleFacing) => {
                        let facing = self.state.facing.toggled();
                        self.switch_camera(facing).await;
                    }
                    Some(SchedulerCommand::Shutdown) | None => return false,
                },
            }
        }
    }

    async fn switch_camera(&mut self, facing: Facing) {
        match self.sampler.switch_facing(facing).await {
            Ok(label) => {
                self.state.facing = self.sampler.camera().facing();
                self.sink.camera(self.state.facing, Some(&label));
                self.sink.status("Camera ready");
            }
            Err(e) => {
                error!("Camera error: {}", e);
                self.state.facing = facing;
                self.sink.camera(facing, None);
                self.sink.status(&format!("Camera error: {}", e));
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::capture::Camera;
    use crate::capture::camera::tests::MockBackend;
    use crate::common::FrameSize;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tower::service_fn;

    #[derive(Clone, Default)]
    pub(crate) struct RecordingSink {
        pub statuses: Arc<Mutex<Vec<String>>>,
        pub renders: Arc<Mutex<usize>>,
        pub summaries: Arc<Mutex<Vec<bool>>>,
    }

    impl RenderSink for RecordingSink {
        fn frame(&mut self, _frame: &EncodedFrame) {}

        fn render(&mut self, _result: &InferenceResult, _frame: &EncodedFrame) {
            *self.renders.lock().unwrap() += 1;
        }

        fn render_summary(&mut self, result: Option<&InferenceResult>) {
            let has_overview = result.map(|r| r.overview.is_some()).unwrap_or(false);
            self.summaries.lock().unwrap().push(has_overview);
        }

        fn status(&mut self, message: &str) {
            self.statuses.lock().unwrap().push(message.to_string());
        }

        fn camera(&mut self, _facing: Facing, _device: Option<&str>) {}

        fn stats(&mut self, _stats: &CycleStats) {}
    }

    type Script = Vec<Result<InferenceResult, SubmitError>>;

    /// A service answering from `script`, then succeeding forever.
    fn scripted(
        script: Script,
    ) -> (
        impl Service<
            EncodedFrame,
            Response = InferenceResult,
            Error = SubmitError,
            Future = impl Future<Output = Result<InferenceResult, SubmitError>> + Send,
        > + Send,
        Arc<Mutex<Vec<tokio::time::Instant>>>,
    ) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let script = Arc::new(Mutex::new(VecDeque::from(script)));
        let recorded = Arc::clone(&calls);
        let service = service_fn(move |_frame: EncodedFrame| {
            let calls = Arc::clone(&recorded);
            let script = Arc::clone(&script);
            async move {
                calls.lock().unwrap().push(tokio::time::Instant::now());
                let next = script.lock().unwrap().pop_front();
                next.unwrap_or_else(|| Ok(InferenceResult::default()))
            }
        });
        (service, calls)
    }

    fn backend() -> MockBackend {
        let mut backend = MockBackend::new(&["Front camera", "Back camera"]);
        backend.size = FrameSize::new(640, 360);
        backend
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_asymmetry_holds_in_the_loop() {
        let backend = backend();
        let active = Arc::clone(&backend.active);
        let (service, calls) = scripted(vec![
            Ok(InferenceResult::default()),
            Err(SubmitError::RateLimited),
            Err(SubmitError::RateLimited),
            Err(SubmitError::ServerError(500)),
            Ok(InferenceResult::default()),
            Err(SubmitError::NetworkFailure("reset".to_string())),
            Err(SubmitError::NetworkFailure("reset".to_string())),
            Ok(InferenceResult::default()),
        ]);
        let sink = RecordingSink::default();
        let statuses = Arc::clone(&sink.statuses);
        let (tx, rx) = mpsc::channel(4);
        let sampler = FrameSampler::new(Camera::new(Box::new(backend), Facing::Back), 480, 0.5);
        let scheduler = AdaptiveScheduler::new(sampler, service, sink, BackoffPolicy::new(ms(500)), rx);

        let handle = tokio::spawn(scheduler.run());
        tokio::time::sleep(ms(9000)).await;
        tx.send(SchedulerCommand::Shutdown).await.unwrap();
        let state = handle.await.unwrap();

        let calls = calls.lock().unwrap();
        let intervals: Vec<Duration> = calls.windows(2).map(|pair| pair[1] - pair[0]).collect();
        let expected = [500, 2000, 2000, 1200, 500, 750, 1125, 500];
        assert!(intervals.len() >= expected.len());
        for (actual, expected) in intervals.iter().zip(expected) {
            assert!(
                *actual >= ms(expected) && *actual < ms(expected + 2),
                "expected {}ms, got {:?}",
                expected,
                actual
            );
        }

        let statuses = statuses.lock().unwrap();
        assert_eq!(statuses[0], "Camera ready");
        assert!(statuses.iter().any(|s| s == "Server busy, backing off"));
        assert!(statuses.iter().any(|s| s == "Predict error 500"));
        assert!(statuses.iter().any(|s| s == "Network error reset"));
        assert!(statuses.iter().any(|s| s.starts_with("Updated ")));

        assert_eq!(state.current_delay, ms(500));
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_submit_delays_the_next_cycle() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let service = {
            let calls = Arc::clone(&calls);
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            service_fn(move |_frame: EncodedFrame| {
                let calls = Arc::clone(&calls);
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    calls.lock().unwrap().push(tokio::time::Instant::now());
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(ms(3000)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, SubmitError>(InferenceResult::default())
                }
            })
        };
        let (tx, rx) = mpsc::channel(1);
        let sampler = FrameSampler::new(Camera::new(Box::new(backend()), Facing::Back), 480, 0.5);
        let scheduler = AdaptiveScheduler::new(
            sampler,
            service,
            RecordingSink::default(),
            BackoffPolicy::new(ms(500)),
            rx,
        );

        let handle = tokio::spawn(scheduler.run());
        // calls at 0, 3500 and 7000
        tokio::time::sleep(ms(8000)).await;
        tx.send(SchedulerCommand::Shutdown).await.unwrap();
        handle.await.unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert!(pair[1] - pair[0] >= ms(3500));
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_camera_between_cycles_keeps_one_stream() {
        let backend = backend();
        let active = Arc::clone(&backend.active);
        let (service, calls) = scripted(Vec::new());
        let (tx, rx) = mpsc::channel(4);
        let sampler = FrameSampler::new(Camera::new(Box::new(backend), Facing::Back), 480, 0.5);
        let scheduler = AdaptiveScheduler::new(
            sampler,
            service,
            RecordingSink::default(),
            BackoffPolicy::new(ms(500)),
            rx,
        );

        let handle = tokio::spawn(scheduler.run());
        tokio::time::sleep(ms(1200)).await;
        assert_eq!(active.load(Ordering::SeqCst), 1);

        tx.send(SchedulerCommand::SwitchFacing(Facing::Front)).await.unwrap();
        tokio::time::sleep(ms(1200)).await;
        assert_eq!(active.load(Ordering::SeqCst), 1);

        tx.send(SchedulerCommand::ToggleFacing).await.unwrap();
        tokio::time::sleep(ms(1200)).await;
        assert_eq!(active.load(Ordering::SeqCst), 1);

        drop(tx);
        let state = handle.await.unwrap();
        assert_eq!(state.facing, Facing::Back);
        assert_eq!(active.load(Ordering::SeqCst), 0);
        assert!(calls.lock().unwrap().len() >= 6);
    }

    #[tokio::test]
    async fn not_ready_cycle_skips_submit_and_keeps_delay() {
        let mut backend = backend();
        backend.ready = false;
        let (service, calls) = scripted(Vec::new());
        let sink = RecordingSink::default();
        let renders = Arc::clone(&sink.renders);
        let (_tx, rx) = mpsc::channel(1);
        let mut camera = Camera::new(Box::new(backend), Facing::Back);
        camera.start().await.unwrap();
        let sampler = FrameSampler::new(camera, 480, 0.5);
        let mut scheduler = AdaptiveScheduler::new(sampler, service, sink, BackoffPolicy::new(ms(500)), rx);
        scheduler.state.current_delay = ms(1125);

        assert_eq!(scheduler.run_cycle().await, CycleOutcome::Skipped);
        assert_eq!(scheduler.run_cycle().await, CycleOutcome::Skipped);

        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(*renders.lock().unwrap(), 0);
        assert_eq!(scheduler.state().current_delay, ms(1125));
        assert_eq!(scheduler.state().cycle(), 2);
        assert_eq!(scheduler.stats().skipped, 2);
    }

    #[tokio::test]
    async fn failed_camera_still_runs_cycles() {
        let mut backend = backend();
        backend.available = false;
        let (service, calls) = scripted(Vec::new());
        let sink = RecordingSink::default();
        let statuses = Arc::clone(&sink.statuses);
        let (_tx, rx) = mpsc::channel(1);
        let sampler = FrameSampler::new(Camera::new(Box::new(backend), Facing::Back), 480, 0.5);
        let mut scheduler = AdaptiveScheduler::new(sampler, service, sink, BackoffPolicy::new(ms(500)), rx);

        scheduler.switch_camera(Facing::Back).await;
        assert_eq!(scheduler.run_cycle().await, CycleOutcome::Skipped);
        assert!(calls.lock().unwrap().is_empty());
        assert!(statuses.lock().unwrap()[0].starts_with("Camera error: "));
    }

    #[tokio::test]
    async fn success_renders_before_returning() {
        let (service, _calls) = scripted(Vec::new());
        let sink = RecordingSink::default();
        let renders = Arc::clone(&sink.renders);
        let (_tx, rx) = mpsc::channel(1);
        let mut camera = Camera::new(Box::new(backend()), Facing::Back);
        camera.start().await.unwrap();
        let sampler = FrameSampler::new(camera, 480, 0.5);
        let mut scheduler = AdaptiveScheduler::new(sampler, service, sink, BackoffPolicy::new(ms(500)), rx);
        scheduler.state.current_delay = ms(4000);

        assert_eq!(scheduler.run_cycle().await, CycleOutcome::Success);
        assert_eq!(*renders.lock().unwrap(), 1);
        assert_eq!(scheduler.state().phase(), Phase::Rendering);
        assert_eq!(scheduler.state().current_delay, ms(500));
    }
}
