use std::sync::Arc;

use crate::foundation::{
    core::PixelSize,
    error::{AlphaVideoError, AlphaVideoResult},
};

/// One decoded video frame.
#[derive(Clone, Debug)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Straight-alpha RGBA8, row-major with the top row first, tightly packed.
    pub rgba8: Arc<Vec<u8>>,
}

impl VideoFrame {
    pub fn new(width: u32, height: u32, rgba8: Vec<u8>) -> AlphaVideoResult<Self> {
        let frame = Self {
            width,
            height,
            rgba8: Arc::new(rgba8),
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Check that the buffer matches the dimensions.
    ///
    /// The fields are public, so a frame built by hand may not hold; backends call this
    /// before touching the texels.
    pub fn validate(&self) -> AlphaVideoResult<()> {
        let (width, height) = (self.width, self.height);
        if width == 0 || height == 0 {
            return Err(AlphaVideoError::validation(
                "video frame width/height must be non-zero",
            ));
        }
        let expected = PixelSize::new(width, height).rgba8_len()?;
        if self.rgba8.len() != expected {
            return Err(AlphaVideoError::validation(format!(
                "video frame has {} bytes, expected {expected} for {width}x{height}",
                self.rgba8.len()
            )));
        }
        Ok(())
    }

    /// A frame filled with a single colour.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> AlphaVideoResult<Self> {
        let len = PixelSize::new(width, height).rgba8_len()?;
        let data = rgba.iter().copied().cycle().take(len).collect();
        Self::new(width, height, data)
    }

    /// The 1x1 transparent placeholder used before the first real frame arrives.
    pub fn transparent_pixel() -> Self {
        Self {
            width: 1,
            height: 1,
            rgba8: Arc::new(vec![0, 0, 0, 0]),
        }
    }

    /// Pack a colour half and a mask half side by side, as an alpha-video encoder would.
    ///
    /// `mask` fills the left half and `color` the right half.
    pub fn split(half_width: u32, height: u32, mask: [u8; 4], color: [u8; 4]) -> AlphaVideoResult<Self> {
        let width = half_width
            .checked_mul(2)
            .ok_or_else(|| AlphaVideoError::validation("split frame width overflow"))?;
        let len = PixelSize::new(width, height).rgba8_len()?;
        let mut data = Vec::with_capacity(len);
        for _ in 0..height {
            for x in 0..width {
                data.extend_from_slice(if x < half_width { &mask } else { &color });
            }
        }
        Self::new(width, height, data)
    }

    pub fn from_image(img: image::RgbaImage) -> AlphaVideoResult<Self> {
        let (width, height) = img.dimensions();
        Self::new(width, height, img.into_raw())
    }

    pub fn to_image(&self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.rgba8.as_ref().clone())
    }

    pub fn size(&self) -> PixelSize {
        PixelSize::new(self.width, self.height)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let p = &self.rgba8[idx..idx + 4];
        Some([p[0], p[1], p[2], p[3]])
    }

    /// Rows in upload order. With `flip_y` the bottom row comes first, matching a texture
    /// whose `v = 0` addresses the bottom of the image.
    pub fn upload_rows(&self, flip_y: bool) -> std::borrow::Cow<'_, [u8]> {
        if !flip_y || self.width == 0 {
            return std::borrow::Cow::Borrowed(self.rgba8.as_slice());
        }
        let row_bytes = self.width as usize * 4;
        let mut out = Vec::with_capacity(self.rgba8.len());
        for row in self.rgba8.chunks_exact(row_bytes).rev() {
            out.extend_from_slice(row);
        }
        std::borrow::Cow::Owned(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_validates_length() {
        assert!(VideoFrame::new(2, 2, vec![0; 15]).is_err());
        assert!(VideoFrame::new(0, 2, vec![]).is_err());
        assert!(VideoFrame::new(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn validate_catches_hand_built_frames() {
        let empty = VideoFrame {
            width: 4,
            height: 2,
            rgba8: Arc::new(Vec::new()),
        };
        assert!(empty.validate().is_err());

        let zero_wide = VideoFrame {
            width: 0,
            height: 2,
            rgba8: Arc::new(vec![0; 8]),
        };
        assert!(zero_wide.validate().is_err());
        assert_eq!(zero_wide.upload_rows(true).len(), 8);
        assert!(VideoFrame::transparent_pixel().validate().is_ok());
    }

    #[test]
    fn split_places_mask_left_and_color_right() {
        let f = VideoFrame::split(3, 2, [128, 128, 128, 255], [255, 0, 0, 255]).unwrap();
        assert_eq!(f.width, 6);
        assert_eq!(f.pixel(0, 0), Some([128, 128, 128, 255]));
        assert_eq!(f.pixel(2, 1), Some([128, 128, 128, 255]));
        assert_eq!(f.pixel(3, 0), Some([255, 0, 0, 255]));
        assert_eq!(f.pixel(5, 1), Some([255, 0, 0, 255]));
        assert_eq!(f.pixel(6, 0), None);
    }

    #[test]
    fn upload_rows_flips_only_when_asked() {
        let mut data = vec![0u8; 4];
        data.extend_from_slice(&[9, 9, 9, 9]);
        let f = VideoFrame::new(1, 2, data).unwrap();
        assert_eq!(&f.upload_rows(false)[..4], &[0, 0, 0, 0]);
        assert_eq!(&f.upload_rows(true)[..4], &[9, 9, 9, 9]);
    }

    #[test]
    fn image_conversion_keeps_pixels() {
        let f = VideoFrame::solid(2, 1, [1, 2, 3, 4]).unwrap();
        let img = f.to_image().unwrap();
        let back = VideoFrame::from_image(img).unwrap();
        assert_eq!(back.pixel(1, 0), Some([1, 2, 3, 4]));
    }
}
