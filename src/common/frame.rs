use chrono::{DateTime, Utc};
use image::RgbaImage;
use std::sync::Arc;
use uuid::Uuid;

/// Pixel dimensions of an image or surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn max_side(&self) -> u32 {
        self.width.max(self.height)
    }

    /// Largest size with the same aspect ratio whose longest side is at most
    /// `target_max`. Never upscales.
    pub fn fit_within(&self, target_max: u32) -> FrameSize {
        let longest = self.max_side();
        if longest <= target_max || longest == 0 {
            return *self;
        }
        let scale = target_max as f64 / longest as f64;
        FrameSize {
            width: ((self.width as f64 * scale).round() as u32).max(1),
            height: ((self.height as f64 * scale).round() as u32).max(1),
        }
    }
}

/// A sampled frame, encoded and ready to submit.
#[derive(Clone)]
pub struct EncodedFrame {
    id: Uuid,
    data_url: Arc<str>,
    inference_size: FrameSize,
    source_size: FrameSize,
    preview: Arc<RgbaImage>,
    captured_at: DateTime<Utc>,
}

impl EncodedFrame {
    pub fn new(
        data_url: String,
        inference_size: FrameSize,
        source_size: FrameSize,
        preview: RgbaImage,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            data_url: Arc::from(data_url),
            inference_size,
            source_size,
            preview: Arc::new(preview),
            captured_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// `data:image/jpeg;base64,...`
    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    /// Dimensions of the image actually transmitted.
    pub fn inference_size(&self) -> FrameSize {
        self.inference_size
    }

    /// Native dimensions of the capture source.
    pub fn source_size(&self) -> FrameSize {
        self.source_size
    }

    pub fn preview(&self) -> Arc<RgbaImage> {
        Arc::clone(&self.preview)
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

impl std::fmt::Debug for EncodedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedFrame")
            .field("id", &self.id)
            .field("inference_size", &self.inference_size)
            .field("source_size", &self.source_size)
            .field("bytes", &self.data_url.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_within_downscales_longest_side() {
        let size = FrameSize::new(1920, 1080).fit_within(480);
        assert_eq!(size, FrameSize::new(480, 270));

        let portrait = FrameSize::new(720, 1280).fit_within(480);
        assert_eq!(portrait, FrameSize::new(270, 480));
    }

    #[test]
    fn fit_within_never_upscales() {
        let size = FrameSize::new(320, 240);
        assert_eq!(size.fit_within(480), size);
        assert_eq!(size.fit_within(320), size);
    }

    #[test]
    fn cloning_frame_shares_preview_buffer() {
        let frame = EncodedFrame::new(
            "data:image/jpeg;base64,".to_string(),
            FrameSize::new(4, 4),
            FrameSize::new(4, 4),
            RgbaImage::new(4, 4),
        );
        let copy = frame.clone();
        assert!(Arc::ptr_eq(&frame.preview(), &copy.preview()));
        assert_eq!(frame.id(), copy.id());
    }
}
