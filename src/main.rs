use ripecam::app::{AppChannels, GraderApp};
use ripecam::capture::{Camera, FrameSampler, StillImageBackend};
use ripecam::config::Settings;
use ripecam::error::AppError;
use ripecam::network::{InferenceClient, InstrumentLayer};
use ripecam::pipeline::{AdaptiveScheduler, BackoffPolicy, SchedulerCommand, SummaryPoller};
use ripecam::render::{DisplaySink, RenderSink, TracingSink, load_font};
use std::thread::JoinHandle;
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, watch};
use tower::ServiceBuilder;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const COMMAND_BUFFER: usize = 8;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_runtime() -> Result<Runtime, AppError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::Scheduler(e.to_string()))
}

/// Runs the capture loop, or the summary poller when no device is configured.
async fn run_loop<K: RenderSink>(
    settings: Settings,
    client: InferenceClient,
    sink: K,
    commands: mpsc::Receiver<SchedulerCommand>,
) {
    if settings.camera.devices.is_empty() {
        let service = ServiceBuilder::new()
            .layer(InstrumentLayer::new("latest_summary"))
            .service(client);
        SummaryPoller::new(service, sink, settings.poll_interval(), commands)
            .run()
            .await;
        return;
    }

    let backend = StillImageBackend::new(settings.camera.devices.clone());
    let camera = Camera::new(Box::new(backend), settings.camera.facing);
    let sampler = FrameSampler::new(
        camera,
        settings.inference.target_max,
        settings.inference.jpeg_quality,
    );
    let service = ServiceBuilder::new()
        .layer(InstrumentLayer::new("predict"))
        .service(client);
    let policy = BackoffPolicy::new(settings.base_delay());
    let state = AdaptiveScheduler::new(sampler, service, sink, policy, commands)
        .run()
        .await;
    info!(
        "Final delay {}ms, facing {}",
        state.current_delay.as_millis(),
        state.facing
    );
}

fn spawn_loop(
    settings: Settings,
    client: InferenceClient,
    sink: DisplaySink,
    commands: mpsc::Receiver<SchedulerCommand>,
) -> Result<JoinHandle<()>, AppError> {
    let runtime = build_runtime()?;
    std::thread::Builder::new()
        .name("ripecam-loop".to_string())
        .spawn(move || runtime.block_on(run_loop(settings, client, sink, commands)))
        .map_err(|e| AppError::Scheduler(e.to_string()))
}

async fn run_headless(
    settings: Settings,
    client: InferenceClient,
    commands_tx: mpsc::Sender<SchedulerCommand>,
    commands_rx: mpsc::Receiver<SchedulerCommand>,
) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted, shutting down");
                let _ = commands_tx.send(SchedulerCommand::Shutdown).await;
            }
            Err(e) => error!("Failed to listen for ctrl-c: {}", e),
        }
    });
    run_loop(settings, client, TracingSink::new(), commands_rx).await;
}

fn main() -> Result<(), AppError> {
    init_logging();
    let settings = Settings::load()?;
    let client = InferenceClient::new(settings.api_base())?;
    info!(
        "Inference endpoint {}, {} capture device(s)",
        client.url(""),
        settings.camera.devices.len()
    );
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);

    if settings.ui.headless {
        let runtime = build_runtime()?;
        runtime.block_on(run_headless(settings, client, commands_tx, commands_rx));
        return Ok(());
    }

    let has_camera = !settings.camera.devices.is_empty();
    let font = load_font(settings.font_path().as_deref());
    let (display_size, display_size_rx) = watch::channel(None);
    let (sink, state) = DisplaySink::new(font, display_size_rx);
    let worker = spawn_loop(settings, client, sink, commands_rx)?;

    let result = GraderApp::start_gui(
        AppChannels {
            state,
            display_size,
            commands: commands_tx.clone(),
        },
        has_camera,
    );
    let _ = commands_tx.try_send(SchedulerCommand::Shutdown);
    drop(commands_tx);
    worker
        .join()
        .map_err(|_| AppError::Scheduler("loop thread panicked".to_string()))?;
    result
}
