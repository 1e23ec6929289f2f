use std::time::Duration;

use crate::foundation::error::{AlphaVideoError, AlphaVideoResult};

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32, // must be > 0
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> AlphaVideoResult<Self> {
        if den == 0 {
            return Err(AlphaVideoError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(AlphaVideoError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Duration of one frame.
    pub fn frame_duration(self) -> Duration {
        Duration::from_secs_f64(self.frame_duration_secs())
    }

    /// Playback length of `frames` frames.
    pub fn frames_to_duration(self, frames: u64) -> Duration {
        Duration::from_secs_f64((frames as f64) * self.frame_duration_secs())
    }

    /// Index of the frame shown at `t`, using floor semantics.
    pub fn frame_at(self, t: Duration) -> u64 {
        // Nudge by a nanosecond-scale epsilon so exact frame boundaries land on the new frame.
        (t.as_secs_f64() * self.as_f64() + 1e-9).floor().max(0.0) as u64
    }
}

/// Logical surface dimensions, fixed at construction.
///
/// The source stream is expected to be `2 * width` wide: one half carries colour, the other
/// the luma mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Bound {
    pub width: u32,
    pub height: u32,
}

impl Bound {
    pub fn new(width: u32, height: u32) -> AlphaVideoResult<Self> {
        if width == 0 || height == 0 {
            return Err(AlphaVideoError::validation(
                "bound width/height must be non-zero",
            ));
        }
        Ok(Self { width, height })
    }

    /// Dimensions of the packed source frame (colour and mask side by side).
    pub fn source_size(self) -> PixelSize {
        PixelSize {
            width: self.width.saturating_mul(2),
            height: self.height,
        }
    }

    /// Backing-store size for a surface shown at `device_pixel_ratio`.
    pub fn scaled(self, device_pixel_ratio: f64) -> PixelSize {
        let dpr = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };
        PixelSize {
            width: ((f64::from(self.width) * dpr).round() as u32).max(1),
            height: ((f64::from(self.height) * dpr).round() as u32).max(1),
        }
    }
}

/// Physical pixel dimensions of a texture, frame or render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Byte length of a tightly packed RGBA8 image of this size.
    pub fn rgba8_len(self) -> AlphaVideoResult<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| AlphaVideoError::validation("rgba8 buffer size overflow"))
    }
}
