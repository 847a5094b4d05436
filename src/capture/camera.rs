use tracing::{debug, info, warn};

use crate::capture::device::{
    CameraBackend, CaptureStream, Constraints, DeviceInfo, Facing,
};
use crate::error::CaptureError;

/// Owns the backend and the single active capture stream.
pub struct Camera {
    backend: Box<dyn CameraBackend>,
    stream: Option<Box<dyn CaptureStream>>,
    facing: Facing,
}

impl Camera {
    pub fn new(backend: Box<dyn CameraBackend>, facing: Facing) -> Self {
        Self {
            backend,
            stream: None,
            facing,
        }
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    pub fn device(&self) -> Option<&DeviceInfo> {
        self.stream.as_ref().map(|stream| stream.device())
    }

    pub fn stream_mut(&mut self) -> Option<&mut (dyn CaptureStream + 'static)> {
        self.stream.as_deref_mut()
    }

    /// Stops and drops the active stream, if any.
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            info!("Releasing capture stream {}", stream.device().label);
            stream.stop();
        }
    }

    /// Opens a stream for the current facing.
    pub async fn start(&mut self) -> Result<&DeviceInfo, CaptureError> {
        self.switch_to(self.facing).await
    }

    /// Releases the current stream, then acquires one for `facing`.
    ///
    /// A failed `Back` request is retried once as `Front` before the error is
    /// surfaced.
    pub async fn switch_to(&mut self, facing: Facing) -> Result<&DeviceInfo, CaptureError> {
        self.release();

        let (stream, facing) = match self.acquire(facing).await {
            Ok(stream) => (stream, facing),
            Err(error) if facing == Facing::Back => {
                warn!("Back camera unavailable ({}), trying front camera", error);
                let stream = self
                    .acquire(Facing::Front)
                    .await
                    .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
                (stream, Facing::Front)
            }
            Err(error) => return Err(CaptureError::DeviceUnavailable(error.to_string())),
        };

        info!(
            "Capture stream {} acquired ({} facing)",
            stream.device().label,
            facing
        );
        self.facing = facing;
        Ok(self.stream.insert(stream).device())
    }

    async fn acquire(&mut self, facing: Facing) -> Result<Box<dyn CaptureStream>, CaptureError> {
        match self.backend.open(&Constraints::Facing(facing)).await {
            Ok(stream) => Ok(stream),
            Err(rejected) => {
                debug!(
                    "Facing constraint {} rejected ({}), enumerating devices",
                    facing, rejected
                );
                let devices = self.backend.enumerate().await?;
                let device = pick_device(&devices, facing).ok_or_else(|| {
                    CaptureError::DeviceUnavailable("no capture devices found".to_string())
                })?;
                debug!("Opening {} by device id", device.label);
                self.backend
                    .open(&Constraints::Device(device.id.clone()))
                    .await
            }
        }
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.release();
    }
}

/// The first device whose label names `facing`, else the first device.
pub fn pick_device(devices: &[DeviceInfo], facing: Facing) -> Option<&DeviceInfo> {
    devices
        .iter()
        .find(|device| facing.matches_label(&device.label))
        .or_else(|| devices.first())
}
