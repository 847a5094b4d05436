//! File-backed capture devices.
//!
//! Each configured device points at a single image or at a directory of
//! frames, which are played back in name order and looped. Useful for
//! machines without a camera and for replaying recorded sessions.

use async_trait::async_trait;
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::capture::device::{CameraBackend, CaptureStream, Constraints, DeviceInfo};
use crate::common::FrameSize;
use crate::config::DeviceSettings;
use crate::error::CaptureError;

const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

pub struct StillImageBackend {
    devices: Vec<DeviceSettings>,
}

impl StillImageBackend {
    pub fn new(devices: Vec<DeviceSettings>) -> Self {
        Self { devices }
    }

    fn device_info(device: &DeviceSettings) -> DeviceInfo {
        DeviceInfo {
            id: device.path.display().to_string(),
            label: device.label.clone(),
        }
    }

    async fn open_device(&self, device: &DeviceSettings) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let frames = list_frames(&device.path)?;
        let first = decode(frames[0].clone()).await?;
        info!(
            "Opened still image device {} with {} frame(s)",
            device.label,
            frames.len()
        );
        Ok(Box::new(StillImageStream {
            info: Self::device_info(device),
            frames,
            cursor: 0,
            pending: Some(first),
            size: None,
            stopped: false,
        }))
    }
}

#[async_trait]
impl CameraBackend for StillImageBackend {
    async fn open(
        &mut self,
        constraints: &Constraints,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let device = match constraints {
            Constraints::Facing(facing) => self
                .devices
                .iter()
                .find(|device| facing.matches_label(&device.label)),
            Constraints::Device(id) => self
                .devices
                .iter()
                .find(|device| &Self::device_info(device).id == id),
        };
        match device {
            Some(device) => self.open_device(device).await,
            None => Err(CaptureError::ConstraintRejected(format!(
                "no device satisfies {:?}",
                constraints
            ))),
        }
    }

    async fn enumerate(&mut self) -> Result<Vec<DeviceInfo>, CaptureError> {
        Ok(self.devices.iter().map(Self::device_info).collect())
    }
}

struct StillImageStream {
    info: DeviceInfo,
    frames: Vec<PathBuf>,
    cursor: usize,
    pending: Option<RgbImage>,
    size: Option<FrameSize>,
    stopped: bool,
}

#[async_trait]
impl CaptureStream for StillImageStream {
    fn device(&self) -> &DeviceInfo {
        &self.info
    }

    fn is_ready(&self) -> bool {
        !self.stopped && (self.pending.is_some() || self.size.is_some())
    }

    fn native_size(&self) -> FrameSize {
        match (&self.pending, self.size) {
            (Some(image), _) => FrameSize::new(image.width(), image.height()),
            (None, Some(size)) => size,
            (None, None) => FrameSize::new(0, 0),
        }
    }

    async fn read_frame(&mut self) -> Result<RgbImage, CaptureError> {
        if self.stopped {
            return Err(CaptureError::NotReady);
        }
        let image = match self.pending.take() {
            Some(image) => image,
            None => decode(self.frames[self.cursor].clone()).await?,
        };
        self.cursor = (self.cursor + 1) % self.frames.len();
        self.size = Some(FrameSize::new(image.width(), image.height()));
        Ok(image)
    }

    fn stop(&mut self) {
        if !self.stopped {
            debug!("Stopping still image device {}", self.info.label);
            self.stopped = true;
            self.pending = None;
        }
    }
}

fn is_frame(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn list_frames(path: &Path) -> Result<Vec<PathBuf>, CaptureError> {
    let unavailable = |e: std::io::Error| {
        CaptureError::DeviceUnavailable(format!("{}: {}", path.display(), e))
    };
    let frames = if path.is_dir() {
        let mut frames: Vec<PathBuf> = std::fs::read_dir(path)
            .map_err(unavailable)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file() && is_frame(path))
            .collect();
        frames.sort();
        frames
    } else if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        Vec::new()
    };

    if frames.is_empty() {
        return Err(CaptureError::DeviceUnavailable(format!(
            "{} has no frames",
            path.display()
        )));
    }
    Ok(frames)
}

async fn decode(path: PathBuf) -> Result<RgbImage, CaptureError> {
    tokio::task::spawn_blocking(move || {
        image::open(&path)
            .map(|image| image.to_rgb8())
            .map_err(|e| CaptureError::Decode(format!("{}: {}", path.display(), e)))
    })
    .await
    .map_err(|e| CaptureError::Decode(e.to_string()))?
}
