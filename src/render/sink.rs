use ab_glyph::FontVec;
use image::RgbaImage;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::capture::Facing;
use crate::common::{EncodedFrame, FrameSize};
use crate::inference::InferenceResult;
use crate::pipeline::metrics::CycleStats;
use crate::render::overlay::{OverlayRenderer, scale_detections};
use crate::render::summary::{SummaryRenderer, SummaryView};

/// Where the scheduling loop sends everything it renders.
pub trait RenderSink: Send {
    /// A freshly sampled frame, before it is submitted.
    fn frame(&mut self, frame: &EncodedFrame);

    /// A successful result for `frame`: overlay and summary.
    fn render(&mut self, result: &InferenceResult, frame: &EncodedFrame);

    /// Summary only, used when polling without a camera.
    fn render_summary(&mut self, result: Option<&InferenceResult>);

    fn status(&mut self, message: &str);

    fn camera(&mut self, facing: Facing, device: Option<&str>);

    fn stats(&mut self, stats: &CycleStats);
}

/// Snapshot the UI draws from.
#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    pub status: String,
    pub frame: Option<Arc<RgbaImage>>,
    pub overlay: Option<Arc<RgbaImage>>,
    pub summary: Option<SummaryView>,
    pub stats: CycleStats,
    pub facing: Option<Facing>,
    pub device: Option<String>,
}

/// Renders into a `DisplayState` shared with the UI over a watch channel.
pub struct DisplaySink {
    overlay: OverlayRenderer,
    summary: SummaryRenderer,
    display_size: watch::Receiver<Option<FrameSize>>,
    state: watch::Sender<DisplayState>,
}

impl DisplaySink {
    pub fn new(
        font: Option<FontVec>,
        display_size: watch::Receiver<Option<FrameSize>>,
    ) -> (Self, watch::Receiver<DisplayState>) {
        let (state, state_rx) = watch::channel(DisplayState::default());
        (
            Self {
                overlay: OverlayRenderer::new(font),
                summary: SummaryRenderer::new(),
                display_size,
                state,
            },
            state_rx,
        )
    }

    /// Size the video is shown at, else the native frame size.
    fn display_size(&self, frame: &EncodedFrame) -> FrameSize {
        let shown = *self.display_size.borrow();
        shown
            .filter(|size| !size.is_empty())
            .unwrap_or_else(|| frame.source_size())
    }
}

impl RenderSink for DisplaySink {
    fn frame(&mut self, frame: &EncodedFrame) {
        let preview = frame.preview();
        self.state.send_modify(|state| state.frame = Some(preview));
    }

    fn render(&mut self, result: &InferenceResult, frame: &EncodedFrame) {
        let display = self.display_size(frame);
        let overlay = self
            .overlay
            .render(result.detections(), frame.inference_size(), display)
            .clone();
        let summary = self.summary.render(Some(result)).cloned();
        self.state.send_modify(|state| {
            state.overlay = Some(Arc::new(overlay));
            state.summary = summary;
        });
    }

    fn render_summary(&mut self, result: Option<&InferenceResult>) {
        let summary = self.summary.render(result).cloned();
        self.state.send_modify(|state| {
            state.overlay = None;
            state.summary = summary;
        });
    }

    fn status(&mut self, message: &str) {
        let message = message.to_string();
        self.state.send_modify(|state| state.status = message);
    }

    fn camera(&mut self, facing: Facing, device: Option<&str>) {
        let device = device.map(str::to_string);
        self.state.send_modify(|state| {
            state.facing = Some(facing);
            state.device = device;
        });
    }

    fn stats(&mut self, stats: &CycleStats) {
        let stats = stats.clone();
        self.state.send_modify(|state| state.stats = stats);
    }
}

/// Logs results instead of drawing them, for runs without a window.
#[derive(Default)]
pub struct TracingSink {
    summary: SummaryRenderer,
    last_status: String,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderSink for TracingSink {
    fn frame(&mut self, frame: &EncodedFrame) {
        debug!("Sampled frame {:?}", frame);
    }

    fn render(&mut self, result: &InferenceResult, frame: &EncodedFrame) {
        let boxes = scale_detections(
            result.detections(),
            frame.inference_size(),
            frame.source_size(),
        );
        for (detection, bounds) in result.detections().iter().zip(&boxes) {
            info!(
                "{} {} at [{:.0}, {:.0}, {:.0}, {:.0}]",
                detection.class_name,
                detection.confidence,
                bounds.x1,
                bounds.y1,
                bounds.x2,
                bounds.y2
            );
        }
        self.render_summary(Some(result));
    }

    fn render_summary(&mut self, result: Option<&InferenceResult>) {
        match self.summary.render(result) {
            Some(view) => info!("\n{}", view),
            None => info!("No inference data"),
        }
    }

    fn status(&mut self, message: &str) {
        if message != self.last_status {
            info!("{}", message);
            self.last_status = message.to_string();
        }
    }

    fn camera(&mut self, facing: Facing, device: Option<&str>) {
        info!("Camera {} ({} facing)", device.unwrap_or("none"), facing);
    }

    fn stats(&mut self, stats: &CycleStats) {
        debug!("{:?}", stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{Detection, Summary};

    fn frame(inference: FrameSize, source: FrameSize) -> EncodedFrame {
        EncodedFrame::new(
            "data:image/jpeg;base64,".to_string(),
            inference,
            source,
            RgbaImage::new(source.width, source.height),
        )
    }

    fn result() -> InferenceResult {
        InferenceResult {
            overview: Some(Summary {
                total: 1,
                grades: [("A".to_string(), 1)].into_iter().collect(),
                ..Default::default()
            }),
            details: None,
            raw: Some(vec![Detection {
                class_name: "mango".to_string(),
                confidence: 0.9,
                bbox: [10.0, 10.0, 100.0, 100.0],
            }]),
        }
    }

    #[test]
    fn overlay_uses_reported_display_size() {
        let (_size_tx, size_rx) = watch::channel(Some(FrameSize::new(960, 540)));
        let (mut sink, state) = DisplaySink::new(None, size_rx);

        sink.render(
            &result(),
            &frame(FrameSize::new(480, 270), FrameSize::new(1920, 1080)),
        );

        let state = state.borrow();
        assert_eq!(state.overlay.as_ref().unwrap().dimensions(), (960, 540));
        assert_eq!(state.summary.as_ref().unwrap().stats[0].value, 1);
    }

    #[test]
    fn overlay_falls_back_to_source_size() {
        let (_size_tx, size_rx) = watch::channel(None);
        let (mut sink, state) = DisplaySink::new(None, size_rx);

        sink.render(
            &result(),
            &frame(FrameSize::new(480, 270), FrameSize::new(640, 360)),
        );
        assert_eq!(
            state.borrow().overlay.as_ref().unwrap().dimensions(),
            (640, 360)
        );
    }

    #[test]
    fn missing_overview_clears_summary_and_overlay() {
        let (_size_tx, size_rx) = watch::channel(None);
        let (mut sink, state) = DisplaySink::new(None, size_rx);
        sink.render(
            &result(),
            &frame(FrameSize::new(480, 270), FrameSize::new(480, 270)),
        );
        assert!(state.borrow().summary.is_some());

        sink.render_summary(Some(&InferenceResult::default()));
        let state = state.borrow();
        assert!(state.summary.is_none());
        assert!(state.overlay.is_none());
    }

    #[test]
    fn status_and_camera_are_published() {
        let (_size_tx, size_rx) = watch::channel(None);
        let (mut sink, state) = DisplaySink::new(None, size_rx);
        sink.status("Camera ready");
        sink.camera(Facing::Front, Some("Front camera"));

        let state = state.borrow();
        assert_eq!(state.status, "Camera ready");
        assert_eq!(state.facing, Some(Facing::Front));
        assert_eq!(state.device.as_deref(), Some("Front camera"));
    }
}
