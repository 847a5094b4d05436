use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::app::views::{CameraView, SummaryPanel, View};
use crate::common::FrameSize;
use crate::error::AppError;
use crate::pipeline::{CycleStats, SchedulerCommand};
use crate::render::DisplayState;

const TITLE: &str = "Ripeness Grader";
const REPAINT_INTERVAL: Duration = Duration::from_millis(50);

/// Channels between the window and the loop thread.
pub struct AppChannels {
    pub state: watch::Receiver<DisplayState>,
    pub display_size: watch::Sender<Option<FrameSize>>,
    pub commands: mpsc::Sender<SchedulerCommand>,
}

pub struct GraderApp {
    channels: AppChannels,
    has_camera: bool,
    camera_view: CameraView,
    summary_panel: SummaryPanel,
    status: String,
    stats: CycleStats,
    camera_label: String,
}

impl GraderApp {
    pub fn new(channels: AppChannels, has_camera: bool) -> Self {
        Self {
            channels,
            has_camera,
            camera_view: CameraView::new(),
            summary_panel: SummaryPanel::new(),
            status: String::new(),
            stats: CycleStats::default(),
            camera_label: String::new(),
        }
    }

    /// Blocks on the event loop until the window is closed.
    pub fn start_gui(channels: AppChannels, has_camera: bool) -> Result<(), AppError> {
        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size(egui::vec2(1024.0, 900.0))
                .with_title(TITLE),
            ..Default::default()
        };
        eframe::run_native(
            TITLE,
            options,
            Box::new(move |_cc| Ok(Box::new(GraderApp::new(channels, has_camera)))),
        )
        .map_err(|e| AppError::Ui(e.to_string()))
    }

    fn sync(&mut self, ctx: &egui::Context) {
        if !self.channels.state.has_changed().unwrap_or(false) {
            return;
        }
        let state = self.channels.state.borrow_and_update().clone();
        self.camera_view
            .update(ctx, state.frame.as_ref(), state.overlay.as_ref());
        self.summary_panel.set(state.summary);
        self.status = state.status;
        self.stats = state.stats;
        self.camera_label = match (state.device, state.facing) {
            (Some(device), Some(facing)) => format!("{} ({})", device, facing),
            (None, Some(facing)) => format!("no {} camera", facing),
            _ => String::new(),
        };
    }

    fn report_display_size(&self) {
        let shown = self.camera_view.shown_size();
        self.channels.display_size.send_if_modified(|current| {
            if *current != shown {
                *current = shown;
                true
            } else {
                false
            }
        });
    }

    fn toggle_camera(&self) {
        info!("Camera switch requested");
        if let Err(e) = self
            .channels
            .commands
            .try_send(SchedulerCommand::ToggleFacing)
        {
            warn!("Camera switch not delivered: {}", e);
        }
    }
}

fn footer(stats: &CycleStats) -> String {
    let mut text = format!(
        "cycles {} | ok {} | skipped {} | busy {} | server {} | network {}",
        stats.cycles,
        stats.successes,
        stats.skipped,
        stats.rate_limited,
        stats.server_errors,
        stats.network_failures
    );
    if stats.last_round_trip.is_some() {
        text.push_str(&format!(" | avg {:.0}ms", stats.avg_round_trip_ms));
    }
    text
}

impl eframe::App for GraderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.sync(ctx);

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading(TITLE);
                ui.separator();
                if self.has_camera {
                    if ui.button("🔄 Switch camera").clicked() {
                        self.toggle_camera();
                    }
                    ui.label(&self.camera_label);
                }
            });
            ui.label(&self.status);
        });

        if self.has_camera {
            egui::TopBottomPanel::bottom("stats").show(ctx, |ui| {
                ui.small(footer(&self.stats));
            });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.has_camera {
                self.camera_view.draw(ui);
                ui.separator();
            }
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.summary_panel.draw(ui);
            });
        });

        self.report_display_size();
        ctx.request_repaint_after(REPAINT_INTERVAL);
    }
}

impl Drop for GraderApp {
    fn drop(&mut self) {
        let _ = self.channels.commands.try_send(SchedulerCommand::Shutdown);
    }
}
