use egui::RichText;
use egui_extras::{Column, TableBuilder};

use crate::app::views::View;
use crate::render::summary::{DefectTally, DetailRow, SummaryView};

const DETAIL_HEADERS: [&str; 7] = ["#", "ID", "Grade", "Ripeness", "Conf.", "Defects", "Box"];

/// Stat boxes, tag groups and the per-object table for the latest result.
#[derive(Default)]
pub struct SummaryPanel {
    view: Option<SummaryView>,
}

impl SummaryPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, view: Option<SummaryView>) {
        self.view = view;
    }

    fn draw_stats(ui: &mut egui::Ui, view: &SummaryView) {
        ui.horizontal_wrapped(|ui| {
            for stat in &view.stats {
                ui.group(|ui| {
                    ui.vertical(|ui| {
                        ui.label(RichText::new(stat.value.to_string()).heading().strong());
                        ui.label(RichText::new(stat.label).small());
                    });
                });
            }
        });
    }

    fn draw_groups(ui: &mut egui::Ui, view: &SummaryView) {
        for group in &view.groups {
            ui.label(RichText::new(format!("{}{}", group.icon, group.title)).strong());
            ui.horizontal_wrapped(|ui| {
                for tag in &group.tags {
                    ui.label(
                        RichText::new(format!("{} ({})", tag.name, tag.count))
                            .background_color(ui.visuals().faint_bg_color),
                    );
                }
            });
        }
    }

    fn draw_details(ui: &mut egui::Ui, rows: &[DetailRow]) {
        if rows.is_empty() {
            return;
        }
        ui.separator();
        TableBuilder::new(ui)
            .striped(true)
            .columns(Column::auto().resizable(true), DETAIL_HEADERS.len())
            .header(20.0, |mut header| {
                for title in DETAIL_HEADERS {
                    header.col(|ui| {
                        ui.strong(title);
                    });
                }
            })
            .body(|mut body| {
                for row in rows {
                    body.row(18.0, |mut cells| {
                        for text in [
                            row.index.to_string(),
                            row.id.clone(),
                            row.grade.clone(),
                            row.ripeness.clone(),
                            row.confidence.clone(),
                            defect_cell(&row.defects),
                            row.bbox.clone(),
                        ] {
                            cells.col(|ui| {
                                ui.label(text);
                            });
                        }
                    });
                }
            });
    }
}

fn defect_cell(defects: &[DefectTally]) -> String {
    if defects.is_empty() {
        return "-".to_string();
    }
    defects
        .iter()
        .map(DefectTally::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl View for SummaryPanel {
    fn draw(&mut self, ui: &mut egui::Ui) {
        match &self.view {
            Some(view) => {
                Self::draw_stats(ui, view);
                Self::draw_groups(ui, view);
                Self::draw_details(ui, &view.details);
            }
            None => {
                ui.weak("No inference data");
            }
        }
    }
}
