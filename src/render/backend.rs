use std::path::Path;

use crate::{
    foundation::{
        core::PixelSize,
        error::{AlphaVideoError, AlphaVideoResult},
    },
    media::frame::VideoFrame,
    render::{
        pipeline::{DrawPass, QuadGeometry, TextureParams},
        shader::ProgramSource,
    },
};

/// Composited surface contents, top row first.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl FrameRGBA {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let p = &self.data[idx..idx + 4];
        Some([p[0], p[1], p[2], p[3]])
    }

    pub fn save_png(&self, path: &Path) -> AlphaVideoResult<()> {
        image::save_buffer_with_format(
            path,
            &self.data,
            self.width,
            self.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .map_err(|e| AlphaVideoError::render(format!("write '{}': {e}", path.display())))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Cpu,
    #[cfg(feature = "gpu")]
    Gpu,
}

/// A rendering context acquired from a [`Surface`](crate::Surface).
///
/// The [`Compositor`](crate::Compositor) drives it in a fixed order: `build_program`,
/// `create_geometry`, `create_frame_texture`, then `upload_frame` + `draw` per tick.
pub trait CompositorBackend {
    fn kind(&self) -> BackendKind;

    /// Compile and link. On error nothing from this call stays allocated.
    fn build_program(&mut self, program: &ProgramSource) -> AlphaVideoResult<()>;

    fn create_geometry(&mut self, geometry: &QuadGeometry) -> AlphaVideoResult<()>;

    /// Allocate the frame texture holding `placeholder` until the first upload.
    fn create_frame_texture(
        &mut self,
        params: &TextureParams,
        placeholder: &VideoFrame,
    ) -> AlphaVideoResult<()>;

    /// Replace the whole frame texture, resizing it if the frame size changed.
    fn upload_frame(&mut self, frame: &VideoFrame) -> AlphaVideoResult<()>;

    fn draw(&mut self, pass: &DrawPass) -> AlphaVideoResult<()>;

    fn read_pixels(&mut self) -> AlphaVideoResult<FrameRGBA>;

    fn target_size(&self) -> PixelSize;

    /// Free every resource. Safe to call more than once.
    fn release(&mut self);
}

pub fn create_backend(
    kind: BackendKind,
    size: PixelSize,
) -> AlphaVideoResult<Box<dyn CompositorBackend>> {
    match kind {
        BackendKind::Cpu => Ok(Box::new(crate::render::cpu::CpuBackend::new(size))),
        #[cfg(feature = "gpu")]
        BackendKind::Gpu => Ok(Box::new(crate::render::gpu::GpuBackend::new(size)?)),
    }
}
