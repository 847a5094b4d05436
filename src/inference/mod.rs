pub mod result;

pub use result::{DefectScore, Detection, GradedObject, InferenceResult, ObjectId, Summary};
