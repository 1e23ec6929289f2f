use std::path::Path;

use crate::{
    foundation::{
        core::Fps,
        error::{AlphaVideoError, AlphaVideoResult},
    },
    player::PlayerOptions,
    render::{backend::BackendKind, surface::SurfaceHost},
};

/// Serializable subset of [`PlayerOptions`], as stored in a JSON file.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlayerConfig {
    pub src: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub loop_playback: bool,
    #[serde(default)]
    pub use_blob: bool,
    #[serde(default = "default_true")]
    pub autoplay: bool,
    #[serde(default = "default_dpr")]
    pub device_pixel_ratio: f64,
    #[serde(default = "default_backend")]
    pub backend: BackendKind,
    /// Frame rate assigned to image-sequence sources, which carry no timing of their own.
    #[serde(default = "default_sequence_fps")]
    pub sequence_fps: Fps,
}

fn default_true() -> bool {
    true
}

fn default_dpr() -> f64 {
    1.0
}

fn default_backend() -> BackendKind {
    BackendKind::Cpu
}

fn default_sequence_fps() -> Fps {
    Fps { num: 30, den: 1 }
}

impl PlayerConfig {
    pub fn new(src: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            src: src.into(),
            width,
            height,
            loop_playback: false,
            use_blob: false,
            autoplay: default_true(),
            device_pixel_ratio: default_dpr(),
            backend: default_backend(),
            sequence_fps: default_sequence_fps(),
        }
    }

    pub fn from_json_str(s: &str) -> AlphaVideoResult<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| AlphaVideoError::validation(format!("player config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: &Path) -> AlphaVideoResult<Self> {
        use anyhow::Context as _;

        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read player config '{}'", path.display()))?;
        Self::from_json_str(&s)
    }

    pub fn validate(&self) -> AlphaVideoResult<()> {
        if self.src.trim().is_empty() {
            return Err(AlphaVideoError::validation("player config: src must not be empty"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(AlphaVideoError::validation(
                "player config: width and height must be non-zero",
            ));
        }
        if !(self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0) {
            return Err(AlphaVideoError::validation(
                "player config: device_pixel_ratio must be finite and > 0",
            ));
        }
        Fps::new(self.sequence_fps.num, self.sequence_fps.den)?;
        Ok(())
    }

    /// Player options for `el` with every hook unset.
    pub fn into_options(self, el: impl Into<SurfaceHost>) -> PlayerOptions {
        PlayerOptions::new(el, self.src, self.width, self.height)
            .loop_playback(self.loop_playback)
            .use_blob(self.use_blob)
            .autoplay(self.autoplay)
            .device_pixel_ratio(self.device_pixel_ratio)
            .backend(self.backend)
    }
}
