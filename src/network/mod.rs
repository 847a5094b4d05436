pub mod client;
pub mod instrument;

pub use client::InferenceClient;
pub use instrument::{InstrumentLayer, Instrumented};
