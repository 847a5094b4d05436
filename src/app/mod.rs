pub mod grader_app;
pub mod views;

pub use grader_app::{AppChannels, GraderApp};
