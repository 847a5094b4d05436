use egui::{ColorImage, TextureHandle, TextureOptions};
use image::RgbaImage;
use std::sync::Arc;

use crate::app::views::View;
use crate::common::FrameSize;

/// Share of the panel height the video may take; the summary gets the rest.
const MAX_HEIGHT_SHARE: f32 = 0.6;

fn color_image(image: &RgbaImage) -> ColorImage {
    ColorImage::from_rgba_unmultiplied(
        [image.width() as usize, image.height() as usize],
        image.as_raw().as_slice(),
    )
}

/// A texture that is re-uploaded only when a different image arrives.
#[derive(Default)]
struct Layer {
    source: Option<Arc<RgbaImage>>,
    texture: Option<TextureHandle>,
}

impl Layer {
    fn update(&mut self, ctx: &egui::Context, name: &str, image: Option<&Arc<RgbaImage>>) {
        let Some(image) = image else {
            self.source = None;
            self.texture = None;
            return;
        };
        if self.source.as_ref().is_some_and(|seen| Arc::ptr_eq(seen, image)) {
            return;
        }
        let pixels = color_image(image);
        match &mut self.texture {
            Some(texture) => texture.set(pixels, TextureOptions::LINEAR),
            None => self.texture = Some(ctx.load_texture(name, pixels, TextureOptions::LINEAR)),
        }
        self.source = Some(Arc::clone(image));
    }
}

/// Live video with the detection overlay stacked on the same rect.
#[derive(Default)]
pub struct CameraView {
    video: Layer,
    overlay: Layer,
    shown: Option<FrameSize>,
}

impl CameraView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(
        &mut self,
        ctx: &egui::Context,
        frame: Option<&Arc<RgbaImage>>,
        overlay: Option<&Arc<RgbaImage>>,
    ) {
        self.video.update(ctx, "camera_frame", frame);
        self.overlay.update(ctx, "detection_overlay", overlay);
    }

    /// Size the video was last painted at, in points.
    pub fn shown_size(&self) -> Option<FrameSize> {
        self.shown
    }
}

/// Largest size with the source aspect ratio inside `available`.
pub fn fit_size(source: egui::Vec2, available: egui::Vec2) -> egui::Vec2 {
    if source.x <= 0.0 || source.y <= 0.0 {
        return egui::Vec2::ZERO;
    }
    let scale = (available.x / source.x).min(available.y / source.y).max(0.0);
    source * scale
}

impl View for CameraView {
    fn draw(&mut self, ui: &mut egui::Ui) {
        let Some(texture) = &self.video.texture else {
            self.shown = None;
            ui.weak("Waiting for camera");
            return;
        };
        let available = egui::vec2(
            ui.available_width(),
            ui.available_height() * MAX_HEIGHT_SHARE,
        );
        let size = fit_size(texture.size_vec2(), available);
        let response = ui.add(egui::Image::new(texture).fit_to_exact_size(size));

        if let Some(overlay) = &self.overlay.texture {
            egui::Image::new(overlay).paint_at(ui, response.rect);
        }
        self.shown = Some(FrameSize::new(
            response.rect.width().round() as u32,
            response.rect.height().round() as u32,
        ));
    }
}
