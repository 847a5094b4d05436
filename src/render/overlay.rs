//! Bounding-box overlay.
//!
//! Boxes arrive in inference-pixel coordinates (the size of the JPEG that was
//! submitted) and are drawn on a transparent surface the size of the display,
//! which the UI paints over the video.

use ab_glyph::FontVec;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::common::FrameSize;
use crate::inference::Detection;

const BOX_COLOR: Rgba<u8> = Rgba([255, 179, 0, 255]);

const LABEL_BACKGROUND: Rgba<u8> = Rgba([255, 179, 0, 217]);

const LABEL_TEXT_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

const LINE_WIDTH: i32 = 2;
const FONT_SCALE: f32 = 14.0;
const LABEL_PAD: f32 = 4.0;
const LABEL_TEXT_HEIGHT: f32 = 16.0;
const LABEL_GAP: f32 = 4.0;
/// Used to size label backgrounds when no font is available.
const FALLBACK_CHAR_WIDTH: f32 = 7.0;

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/System/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// A box in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl DisplayBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

/// Independent horizontal and vertical factors from inference to display.
pub fn scale_factors(inference: FrameSize, display: FrameSize) -> Option<(f32, f32)> {
    if inference.is_empty() {
        return None;
    }
    Some((
        display.width as f32 / inference.width as f32,
        display.height as f32 / inference.height as f32,
    ))
}

pub fn scale_box(bbox: [f32; 4], sx: f32, sy: f32) -> DisplayBox {
    let [x1, y1, x2, y2] = bbox;
    DisplayBox {
        x1: x1 * sx,
        y1: y1 * sy,
        x2: x2 * sx,
        y2: y2 * sy,
    }
}

/// Maps every detection onto the display.
pub fn scale_detections(
    detections: &[Detection],
    inference: FrameSize,
    display: FrameSize,
) -> Vec<DisplayBox> {
    let Some((sx, sy)) = scale_factors(inference, display) else {
        return Vec::new();
    };
    detections
        .iter()
        .map(|detection| scale_box(detection.bbox, sx, sy))
        .collect()
}

/// Top edge of a label for a box whose top edge is `y1`. Never above the
/// surface, so boxes touching the top get their label inside the box.
pub fn label_top(y1: f32) -> f32 {
    (y1 - LABEL_TEXT_HEIGHT - LABEL_GAP).max(0.0)
}

pub fn label_text(detection: &Detection) -> String {
    format!("{} {}", detection.class_name, detection.confidence)
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLabel {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayItem {
    pub bounds: DisplayBox,
    pub label: OverlayLabel,
}

/// Loads the configured font, else the first system font found.
pub fn load_font(path: Option<&Path>) -> Option<FontVec> {
    if let Some(path) = path {
        match std::fs::read(path).map(FontVec::try_from_vec) {
            Ok(Ok(font)) => {
                info!("Loaded overlay font: {}", path.display());
                return Some(font);
            }
            Ok(Err(_)) => warn!("Failed to parse font file: {}", path.display()),
            Err(e) => warn!("Failed to read font file {}: {}", path.display(), e),
        }
    }
    for path in SYSTEM_FONTS {
        if let Ok(data) = std::fs::read(path) {
            if let Ok(font) = FontVec::try_from_vec(data) {
                info!("Loaded system font: {}", path);
                return Some(font);
            }
        }
    }
    debug!("No font found, overlay labels will have no text");
    None
}

/// Keeps a coordinate within one surface length of the surface, so rect
/// arithmetic in the drawing routines stays far from `i32` overflow.
fn clamp_to_surface(value: f32, extent: u32) -> f32 {
    let extent = extent as f32;
    if value.is_nan() {
        return -extent;
    }
    value.clamp(-extent, 2.0 * extent)
}

/// Owns the overlay surface and redraws it from scratch on every render.
pub struct OverlayRenderer {
    surface: RgbaImage,
    items: Vec<OverlayItem>,
    font: Option<FontVec>,
}

impl OverlayRenderer {
    pub fn new(font: Option<FontVec>) -> Self {
        Self {
            surface: RgbaImage::new(0, 0),
            items: Vec::new(),
            font,
        }
    }

    pub fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    pub fn items(&self) -> &[OverlayItem] {
        &self.items
    }

    /// Clears the surface, sized to `display`.
    pub fn clear(&mut self, display: FrameSize) {
        if self.surface.dimensions() != (display.width, display.height) {
            self.surface = RgbaImage::from_pixel(display.width, display.height, CLEAR);
        } else {
            self.surface.pixels_mut().for_each(|pixel| *pixel = CLEAR);
        }
        self.items.clear();
    }

    pub fn render(
        &mut self,
        detections: &[Detection],
        inference: FrameSize,
        display_size: FrameSize,
    ) -> &RgbaImage {
        self.clear(display_size);
        let boxes = scale_detections(detections, inference, display_size);
        for (detection, bounds) in detections.iter().zip(boxes) {
            let text = label_text(detection);
            let label = OverlayLabel {
                x: bounds.x1,
                y: label_top(bounds.y1),
                width: self.measure(&text) + LABEL_PAD * 2.0,
                height: LABEL_TEXT_HEIGHT + LABEL_GAP,
                text,
            };
            self.items.push(OverlayItem { bounds, label });
        }
        let items = std::mem::take(&mut self.items);
        for item in &items {
            self.draw_item(item);
        }
        self.items = items;
        debug!(
            "Overlay rendered {} box(es) at {}x{}",
            self.items.len(),
            display_size.width,
            display_size.height
        );
        &self.surface
    }

    fn measure(&self, text: &str) -> f32 {
        match &self.font {
            Some(font) => text_size(FONT_SCALE, font, text).0 as f32,
            None => text.chars().count() as f32 * FALLBACK_CHAR_WIDTH,
        }
    }

    fn draw_item(&mut self, item: &OverlayItem) {
        let (surface_w, surface_h) = self.surface.dimensions();
        let x1 = clamp_to_surface(item.bounds.x1, surface_w);
        let y1 = clamp_to_surface(item.bounds.y1, surface_h);
        let x2 = clamp_to_surface(item.bounds.x2, surface_w);
        let y2 = clamp_to_surface(item.bounds.y2, surface_h);
        let left = x1.round() as i32;
        let top = y1.round() as i32;
        let width = (x2 - x1).round() as i32;
        let height = (y2 - y1).round() as i32;
        for inset in 0..LINE_WIDTH {
            let w = width - 2 * inset;
            let h = height - 2 * inset;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(left + inset, top + inset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(&mut self.surface, rect, BOX_COLOR);
        }

        let label = &item.label;
        let label_x = clamp_to_surface(label.x, surface_w);
        let label_y = clamp_to_surface(label.y, surface_h);
        let background = Rect::at(label_x.round() as i32, label_y.round() as i32).of_size(
            label.width.clamp(1.0, surface_w.max(1) as f32).round() as u32,
            label.height.clamp(1.0, surface_h.max(1) as f32).round() as u32,
        );
        draw_filled_rect_mut(&mut self.surface, background, LABEL_BACKGROUND);

        if let Some(font) = &self.font {
            draw_text_mut(
                &mut self.surface,
                LABEL_TEXT_COLOR,
                (label_x + LABEL_PAD).round() as i32,
                (label_y + LABEL_GAP / 2.0).round() as i32,
                FONT_SCALE,
                font,
                &label.text,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(bbox: [f32; 4]) -> Detection {
        Detection {
            class_name: "mango".to_string(),
            confidence: 0.87,
            bbox,
        }
    }

    #[test]
    fn doubles_boxes_when_display_is_twice_inference() {
        let boxes = scale_detections(
            &[detection([10.0, 10.0, 100.0, 100.0])],
            FrameSize::new(480, 270),
            FrameSize::new(960, 540),
        );
        assert_eq!(
            boxes,
            vec![DisplayBox {
                x1: 20.0,
                y1: 20.0,
                x2: 200.0,
                y2: 200.0
            }]
        );
    }

    #[test]
    fn axes_scale_independently() {
        let (sx, sy) = scale_factors(FrameSize::new(480, 270), FrameSize::new(640, 540)).unwrap();
        let mapped = scale_box([30.0, 27.0, 60.0, 54.0], sx, sy);
        assert!((mapped.x1 - 40.0).abs() < 1e-4);
        assert!((mapped.x2 - 80.0).abs() < 1e-4);
        assert!((mapped.y1 - 54.0).abs() < 1e-4);
        assert!((mapped.y2 - 108.0).abs() < 1e-4);
    }

    #[test]
    fn empty_inference_size_draws_nothing() {
        assert!(scale_factors(FrameSize::new(0, 270), FrameSize::new(960, 540)).is_none());
        let mut renderer = OverlayRenderer::new(None);
        renderer.render(
            &[detection([1.0, 1.0, 5.0, 5.0])],
            FrameSize::new(0, 0),
            FrameSize::new(10, 10),
        );
        assert!(renderer.items().is_empty());
    }

    #[test]
    fn label_stays_on_surface() {
        assert_eq!(label_top(100.0), 80.0);
        assert_eq!(label_top(5.0), 0.0);
        assert_eq!(label_top(0.0), 0.0);
    }

    #[test]
    fn label_shows_class_and_confidence() {
        assert_eq!(label_text(&detection([0.0; 4])), "mango 0.87");
    }

    #[test]
    fn rendering_replaces_previous_overlay() {
        let mut renderer = OverlayRenderer::new(None);
        let display = FrameSize::new(200, 100);
        renderer.render(&[detection([0.0, 40.0, 50.0, 90.0])], display, display);
        assert_eq!(renderer.surface().get_pixel(0, 60), &BOX_COLOR);

        renderer.render(&[detection([120.0, 40.0, 180.0, 90.0])], display, display);
        assert_eq!(renderer.items().len(), 1);
        assert_eq!(renderer.surface().get_pixel(0, 60), &CLEAR);
        assert_eq!(renderer.surface().get_pixel(120, 60), &BOX_COLOR);

        renderer.render(&[], display, display);
        assert!(renderer.surface().pixels().all(|pixel| *pixel == CLEAR));
    }

    #[test]
    fn rendering_twice_is_identical() {
        let mut renderer = OverlayRenderer::new(None);
        let detections = [
            detection([10.0, 2.0, 60.0, 40.0]),
            detection([70.0, 50.0, 150.0, 90.0]),
        ];
        let inference = FrameSize::new(160, 100);
        let display = FrameSize::new(320, 200);

        let first = renderer.render(&detections, inference, display).clone();
        let first_items = renderer.items().to_vec();
        let second = renderer.render(&detections, inference, display).clone();

        assert_eq!(first, second);
        assert_eq!(first_items, renderer.items());
        // box near the top edge keeps its label inside the surface
        assert_eq!(renderer.items()[0].label.y, 0.0);
    }

    #[test]
    fn far_out_of_range_boxes_are_clipped() {
        let mut renderer = OverlayRenderer::new(None);
        let detections = [
            detection([3e9, 10.0, 3e9 + 50.0, 60.0]),
            detection([-3e9, -3e9, 3e9, 3e9]),
            detection([f32::NAN, 10.0, 40.0, f32::INFINITY]),
        ];
        let surface = renderer.render(
            &detections,
            FrameSize::new(480, 270),
            FrameSize::new(960, 540),
        );
        assert_eq!(surface.dimensions(), (960, 540));
        assert_eq!(renderer.items().len(), 3);
    }

    #[test]
    fn box_overhanging_the_edge_draws_the_visible_part() {
        let mut renderer = OverlayRenderer::new(None);
        let display = FrameSize::new(100, 100);
        renderer.render(&[detection([50.0, 50.0, 400.0, 400.0])], display, display);
        assert_eq!(renderer.surface().get_pixel(50, 80), &BOX_COLOR);
        assert_eq!(renderer.surface().get_pixel(80, 80), &CLEAR);
    }

    #[test]
    fn surface_follows_display_size() {
        let mut renderer = OverlayRenderer::new(None);
        renderer.render(&[], FrameSize::new(10, 10), FrameSize::new(30, 20));
        assert_eq!(renderer.surface().dimensions(), (30, 20));
        renderer.render(&[], FrameSize::new(10, 10), FrameSize::new(60, 40));
        assert_eq!(renderer.surface().dimensions(), (60, 40));
    }
}
