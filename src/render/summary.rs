use indexmap::IndexMap;
use std::fmt;

use crate::inference::{DefectScore, GradedObject, InferenceResult};

const MISSING: &str = "-";

#[derive(Debug, Clone, PartialEq)]
pub struct StatBox {
    pub label: &'static str,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub name: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagGroup {
    pub title: &'static str,
    pub icon: &'static str,
    pub tags: Vec<Tag>,
}

/// A defect name and how many times it was reported on one object.
#[derive(Debug, Clone, PartialEq)]
pub struct DefectTally {
    pub name: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailRow {
    pub index: usize,
    pub id: String,
    pub grade: String,
    pub ripeness: String,
    pub confidence: String,
    pub defects: Vec<DefectTally>,
    pub bbox: String,
}

/// Everything the summary panel shows for one result.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryView {
    pub stats: Vec<StatBox>,
    pub groups: Vec<TagGroup>,
    pub details: Vec<DetailRow>,
}

/// Collapses repeated defect names into one tally each, in first-seen order.
pub fn collapse_defects(defects: &[DefectScore]) -> Vec<DefectTally> {
    let mut tallies: IndexMap<&str, u32> = IndexMap::new();
    for defect in defects {
        *tallies.entry(defect.name.as_str()).or_insert(0) += 1;
    }
    tallies
        .into_iter()
        .map(|(name, count)| DefectTally {
            name: name.to_string(),
            count,
        })
        .collect()
}

fn tags(counts: &IndexMap<String, u32>) -> Vec<Tag> {
    counts
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(name, count)| Tag {
            name: name.clone(),
            count: *count,
        })
        .collect()
}

fn or_missing<T: ToString>(value: Option<T>) -> String {
    value
        .map(|value| value.to_string())
        .unwrap_or_else(|| MISSING.to_string())
}

fn detail_row(index: usize, object: &GradedObject) -> DetailRow {
    DetailRow {
        index: index + 1,
        id: or_missing(object.id.as_ref()),
        grade: or_missing(object.grade.as_ref()),
        ripeness: or_missing(object.ripeness.as_ref()),
        confidence: or_missing(object.ripeness_confidence),
        defects: collapse_defects(&object.defects),
        bbox: object
            .bbox
            .as_ref()
            .map(|bbox| {
                let coords: Vec<String> = bbox.iter().map(|v| v.to_string()).collect();
                format!("[{}]", coords.join(", "))
            })
            .unwrap_or_else(|| MISSING.to_string()),
    }
}

/// Builds the view for a result. `None` when the overview is missing.
pub fn build_view(result: &InferenceResult) -> Option<SummaryView> {
    let overview = result.overview.as_ref()?;

    let groups: Vec<TagGroup> = [
        ("Grade", "🍽️ ", &overview.grades),
        ("Ripeness", "🥭 ", &overview.ripeness),
        ("Defects / disease", "⚠️ ", &overview.defects),
    ]
    .into_iter()
    .map(|(title, icon, counts)| TagGroup {
        title,
        icon,
        tags: tags(counts),
    })
    .collect();

    let stats = vec![
        StatBox {
            label: "Total fruit",
            value: overview.total,
        },
        StatBox {
            label: "Grades",
            value: groups[0].tags.len() as u32,
        },
        StatBox {
            label: "Ripeness levels",
            value: groups[1].tags.len() as u32,
        },
        StatBox {
            label: "Defect types",
            value: groups[2].tags.len() as u32,
        },
    ];

    let details = result
        .details
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .enumerate()
        .map(|(index, object)| detail_row(index, object))
        .collect();

    Some(SummaryView {
        stats,
        groups: groups
            .into_iter()
            .filter(|group| !group.tags.is_empty())
            .collect(),
        details,
    })
}

/// Holds the current summary view; each render replaces it wholesale.
#[derive(Debug, Default)]
pub struct SummaryRenderer {
    view: Option<SummaryView>,
}

impl SummaryRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, result: Option<&InferenceResult>) -> Option<&SummaryView> {
        self.view = result.and_then(build_view);
        self.view.as_ref()
    }

    pub fn view(&self) -> Option<&SummaryView> {
        self.view.as_ref()
    }
}

impl fmt::Display for DefectTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ×{}", self.name, self.count)
    }
}

impl fmt::Display for SummaryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats: Vec<String> = self
            .stats
            .iter()
            .map(|stat| format!("{}: {}", stat.label, stat.value))
            .collect();
        writeln!(f, "{}", stats.join(" | "))?;
        for group in &self.groups {
            let tags: Vec<String> = group
                .tags
                .iter()
                .map(|tag| format!("{} ({})", tag.name, tag.count))
                .collect();
            writeln!(f, "{}{}: {}", group.icon, group.title, tags.join(", "))?;
        }
        for row in &self.details {
            let defects = if row.defects.is_empty() {
                MISSING.to_string()
            } else {
                row.defects
                    .iter()
                    .map(|defect| defect.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            writeln!(
                f,
                "#{} id={} grade={} ripeness={} conf={} defects={} box={}",
                row.index, row.id, row.grade, row.ripeness, row.confidence, defects, row.bbox
            )?;
        }
        Ok(())
    }
}
