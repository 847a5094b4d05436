pub mod frame;

pub use frame::{EncodedFrame, FrameSize};
