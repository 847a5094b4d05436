pub mod camera;
pub mod device;
pub mod sampler;
pub mod still;

pub use camera::Camera;
pub use device::{CameraBackend, CaptureStream, Constraints, DeviceInfo, Facing};
pub use sampler::FrameSampler;
pub use still::StillImageBackend;
