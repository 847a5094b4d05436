pub mod camera_view;
pub mod summary_view;

pub use camera_view::CameraView;
pub use summary_view::SummaryPanel;

pub trait View {
    fn draw(&mut self, ui: &mut egui::Ui);
}
