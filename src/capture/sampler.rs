use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{RgbImage, RgbaImage, imageops};
use tracing::{debug, warn};

use crate::capture::{Camera, Facing};
use crate::common::{EncodedFrame, FrameSize};
use crate::error::CaptureError;

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Off-screen surface reused across samples: downscaled pixels plus the JPEG
/// byte buffer. Only re-sized when the target dimensions change.
struct EncodingSurface {
    pixels: RgbImage,
    jpeg: Vec<u8>,
    resizes: usize,
}

impl EncodingSurface {
    fn new() -> Self {
        Self {
            pixels: RgbImage::new(0, 0),
            jpeg: Vec::new(),
            resizes: 0,
        }
    }

    fn size(&self) -> FrameSize {
        let (width, height) = self.pixels.dimensions();
        FrameSize::new(width, height)
    }

    fn prepare(&mut self, size: FrameSize) -> &mut RgbImage {
        if self.size() != size {
            let len = size.width as usize * size.height as usize * 3;
            let mut buffer = std::mem::take(&mut self.pixels).into_raw();
            buffer.resize(len, 0);
            self.pixels = RgbImage::from_raw(size.width, size.height, buffer)
                .unwrap_or_else(|| RgbImage::new(size.width, size.height));
            self.resizes += 1;
        }
        &mut self.pixels
    }

    /// Downscales `source` into the surface with a triangle filter.
    fn draw(&mut self, source: &RgbImage, size: FrameSize) {
        if source.dimensions() == (size.width, size.height) {
            self.prepare(size).copy_from_slice(source.as_raw());
            return;
        }
        let resized = imageops::resize(source, size.width, size.height, FilterType::Triangle);
        self.prepare(size).copy_from_slice(resized.as_raw());
    }

    fn encode(&mut self, quality: u8) -> Result<String, CaptureError> {
        self.jpeg.clear();
        JpegEncoder::new_with_quality(&mut self.jpeg, quality)
            .encode_image(&self.pixels)
            .map_err(|e| CaptureError::Encode(e.to_string()))?;
        let mut data_url = String::with_capacity(DATA_URL_PREFIX.len() + self.jpeg.len() * 4 / 3 + 4);
        data_url.push_str(DATA_URL_PREFIX);
        STANDARD.encode_string(&self.jpeg, &mut data_url);
        Ok(data_url)
    }
}

/// Produces downscaled JPEG snapshots from the active capture stream.
pub struct FrameSampler {
    camera: Camera,
    target_max: u32,
    quality: u8,
    surface: EncodingSurface,
}

impl FrameSampler {
    /// `quality` is in 0..1 and mapped onto the encoder's 1..=100 scale.
    pub fn new(camera: Camera, target_max: u32, quality: f32) -> Self {
        Self {
            camera,
            target_max,
            quality: ((quality * 100.0).round() as i32).clamp(1, 100) as u8,
            surface: EncodingSurface::new(),
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub async fn switch_facing(&mut self, facing: Facing) -> Result<String, CaptureError> {
        self.camera
            .switch_to(facing)
            .await
            .map(|device| device.label.clone())
    }

    /// Takes one sample. `Ok(None)` means the stream is not ready and the
    /// cycle should be skipped.
    pub async fn sample(&mut self) -> Result<Option<EncodedFrame>, CaptureError> {
        let Some(stream) = self.camera.stream_mut() else {
            debug!("No active capture stream");
            return Ok(None);
        };
        if !stream.is_ready() {
            debug!("Capture stream not ready");
            return Ok(None);
        }

        let source = match stream.read_frame().await {
            Ok(source) => source,
            Err(CaptureError::NotReady) => return Ok(None),
            Err(e) => return Err(e),
        };
        let source_size = FrameSize::new(source.width(), source.height());
        if source_size.is_empty() {
            warn!("Capture stream produced an empty frame");
            return Ok(None);
        }

        let inference_size = source_size.fit_within(self.target_max);
        self.surface.draw(&source, inference_size);
        let data_url = self.surface.encode(self.quality)?;
        let preview: RgbaImage = source.convert();

        debug!(
            "Sampled {}x{} -> {}x{} ({} bytes)",
            source_size.width,
            source_size.height,
            inference_size.width,
            inference_size.height,
            data_url.len()
        );
        Ok(Some(EncodedFrame::new(
            data_url,
            inference_size,
            source_size,
            preview,
        )))
    }
}
