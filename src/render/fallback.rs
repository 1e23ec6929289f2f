use image::{RgbaImage, imageops::FilterType};

use crate::{foundation::core::Bound, media::frame::VideoFrame};

/// 2D canvas for contexts that cannot sample video frames as textures.
///
/// It holds the raw side-by-side frame scaled to `2 * width` by `height`. No compositing
/// happens here.
#[derive(Clone, Debug)]
pub struct FallbackCanvas {
    image: RgbaImage,
}

impl FallbackCanvas {
    pub fn new(bound: Bound) -> Self {
        let size = bound.source_size();
        Self {
            image: RgbaImage::new(size.width, size.height),
        }
    }

    pub fn draw(&mut self, frame: &VideoFrame) {
        let (w, h) = self.image.dimensions();
        if let Err(err) = frame.validate() {
            tracing::warn!(error = %err, "fallback canvas got a malformed frame");
            return;
        }
        let Some(src) = frame.to_image() else {
            tracing::warn!("fallback canvas got a malformed frame");
            return;
        };
        self.image = if src.dimensions() == (w, h) {
            src
        } else {
            image::imageops::resize(&src, w, h, FilterType::Triangle)
        };
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}
