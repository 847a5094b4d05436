use async_trait::async_trait;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::FrameSize;
use crate::error::CaptureError;

/// Which physical camera is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Front,
    Back,
}

impl Facing {
    pub fn toggled(self) -> Facing {
        match self {
            Facing::Front => Facing::Back,
            Facing::Back => Facing::Front,
        }
    }

    /// Lowercase words a device label carries when it points this way.
    pub fn label_keywords(self) -> &'static [&'static str] {
        match self {
            Facing::Front => &["front", "user", "face"],
            Facing::Back => &["back", "rear", "environment"],
        }
    }

    pub fn matches_label(self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.label_keywords()
            .iter()
            .any(|keyword| label.contains(keyword))
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Facing::Front => write!(f, "front"),
            Facing::Back => write!(f, "back"),
        }
    }
}

/// What to ask the backend for when opening a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraints {
    /// Any device declared as pointing this way.
    Facing(Facing),
    /// An exact device, by the id reported from enumeration.
    Device(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub label: String,
}

/// An open capture stream. Holding one holds the underlying device.
#[async_trait]
pub trait CaptureStream: Send {
    fn device(&self) -> &DeviceInfo;

    /// True once the stream has decoded data to read a frame from.
    fn is_ready(&self) -> bool;

    fn native_size(&self) -> FrameSize;

    async fn read_frame(&mut self) -> Result<RgbImage, CaptureError>;

    /// Releases the device. Further reads report `NotReady`.
    fn stop(&mut self);
}

/// Source of capture streams.
#[async_trait]
pub trait CameraBackend: Send {
    async fn open(
        &mut self,
        constraints: &Constraints,
    ) -> Result<Box<dyn CaptureStream>, CaptureError>;

    async fn enumerate(&mut self) -> Result<Vec<DeviceInfo>, CaptureError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_match_facing_keywords() {
        assert!(Facing::Back.matches_label("Rear Camera 0"));
        assert!(Facing::Back.matches_label("camera2 0, facing back"));
        assert!(Facing::Front.matches_label("FaceTime HD Camera"));
        assert!(Facing::Front.matches_label("User facing"));
        assert!(!Facing::Front.matches_label("USB2.0 HD UVC WebCam"));
        assert!(!Facing::Back.matches_label("Front camera"));
    }

    #[test]
    fn toggled_flips_facing() {
        assert_eq!(Facing::Front.toggled(), Facing::Back);
        assert_eq!(Facing::Back.toggled(), Facing::Front);
    }
}
