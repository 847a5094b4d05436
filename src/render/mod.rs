pub mod overlay;
pub mod sink;
pub mod summary;

pub use overlay::{DisplayBox, OverlayRenderer, load_font, scale_detections};
pub use sink::{DisplaySink, DisplayState, RenderSink, TracingSink};
pub use summary::{SummaryRenderer, SummaryView};
