use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single raw detection, in inference-pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "class")]
    pub class_name: String,
    pub confidence: f32,
    /// `[x1, y1, x2, y2]`
    #[serde(rename = "box")]
    pub bbox: [f32; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefectScore {
    pub name: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Object identifiers arrive either as numbers or as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Number(n) => write!(f, "{}", n),
            ObjectId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One physical object recognized in a frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GradedObject {
    #[serde(default)]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub ripeness: Option<String>,
    #[serde(default)]
    pub ripeness_confidence: Option<f32>,
    #[serde(default)]
    pub defects: Vec<DefectScore>,
    #[serde(default, rename = "box")]
    pub bbox: Option<Vec<f32>>,
}

/// Aggregate counts for one result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub grades: IndexMap<String, u32>,
    #[serde(default)]
    pub ripeness: IndexMap<String, u32>,
    #[serde(default)]
    pub defects: IndexMap<String, u32>,
}

impl Summary {
    /// Derives an overview from per-object details.
    ///
    /// Each object counts once towards its grade and ripeness level, and once
    /// per defect occurrence. Objects without a grade or ripeness are counted
    /// in `total` only.
    pub fn from_details(details: &[GradedObject]) -> Self {
        let mut summary = Summary {
            total: details.len() as u32,
            ..Default::default()
        };
        for object in details {
            if let Some(grade) = &object.grade {
                *summary.grades.entry(grade.clone()).or_insert(0) += 1;
            }
            if let Some(ripeness) = &object.ripeness {
                *summary.ripeness.entry(ripeness.clone()).or_insert(0) += 1;
            }
            for defect in &object.defects {
                *summary.defects.entry(defect.name.clone()).or_insert(0) += 1;
            }
        }
        summary
    }

    pub fn graded_count(&self) -> u32 {
        self.grades.values().sum()
    }
}

/// The unit exchanged with the inference endpoint.
///
/// Every field may be missing: `GET /latest_summary` answers `{}` before the
/// first inference, and renderers treat a missing `overview` as "no data".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InferenceResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<Summary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<GradedObject>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Vec<Detection>>,
}

impl InferenceResult {
    pub fn is_empty(&self) -> bool {
        self.overview.is_none() && self.details.is_none() && self.raw.is_none()
    }

    pub fn detections(&self) -> &[Detection] {
        self.raw.as_deref().unwrap_or(&[])
    }
}
