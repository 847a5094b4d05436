pub mod app;
pub mod capture;
pub mod common;
pub mod config;
pub mod error;
pub mod inference;
pub mod network;
pub mod pipeline;
pub mod render;

pub use error::{AppError, CaptureError, SubmitError};
