use crate::{
    foundation::{core::Bound, error::AlphaVideoResult},
    media::frame::VideoFrame,
    render::{
        backend::{CompositorBackend, FrameRGBA},
        fallback::FallbackCanvas,
        pipeline::{DrawPass, QuadGeometry, TextureParams},
        shader::ProgramSource,
        surface::Surface,
    },
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompositorStats {
    pub draws: u64,
    pub uploads: u64,
    pub failures: u64,
}

/// Composites side-by-side alpha video frames onto a surface.
///
/// Construction never fails. Without a rendering context, or when the program does not link,
/// the compositor stays disabled and [`draw`](Self::draw) does nothing.
pub struct Compositor {
    bound: Bound,
    backend: Option<Box<dyn CompositorBackend>>,
    texture_params: TextureParams,
    supports_video: Option<bool>,
    fallback: Option<FallbackCanvas>,
    stats: CompositorStats,
}

impl Compositor {
    pub fn new(surface: &Surface, bound: Bound) -> Self {
        Self::with_program(surface, bound, ProgramSource::dual_sample_alpha())
    }

    pub fn with_program(surface: &Surface, bound: Bound, program: ProgramSource) -> Self {
        Self::with_context(surface.acquire_context(), bound, program)
    }

    pub fn with_context(
        context: Option<Box<dyn CompositorBackend>>,
        bound: Bound,
        program: ProgramSource,
    ) -> Self {
        let mut out = Self {
            bound,
            backend: None,
            texture_params: TextureParams::default(),
            supports_video: None,
            fallback: None,
            stats: CompositorStats::default(),
        };

        let Some(mut backend) = context else {
            tracing::warn!("no rendering context available, compositor disabled");
            return out;
        };

        match Self::init(backend.as_mut(), &program, &out.texture_params) {
            Ok(()) => {
                tracing::debug!(
                    backend = ?backend.kind(),
                    width = bound.width,
                    height = bound.height,
                    program = %program.label,
                    "compositor ready"
                );
                out.backend = Some(backend);
            }
            Err(err) => {
                tracing::error!(program = %program.label, error = %err, "compositor init failed");
                backend.release();
            }
        }
        out
    }

    fn init(
        backend: &mut dyn CompositorBackend,
        program: &ProgramSource,
        params: &TextureParams,
    ) -> AlphaVideoResult<()> {
        backend.build_program(program)?;
        backend.create_geometry(&QuadGeometry::FULL_VIEWPORT)?;
        backend.create_frame_texture(params, &VideoFrame::transparent_pixel())
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn bound(&self) -> Bound {
        self.bound
    }

    pub fn texture_params(&self) -> &TextureParams {
        &self.texture_params
    }

    pub fn stats(&self) -> CompositorStats {
        self.stats
    }

    /// Upload `frame` as the whole frame texture and draw the quad.
    pub fn draw(&mut self, frame: &VideoFrame) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };

        if let Err(err) = backend.upload_frame(frame) {
            self.stats.failures += 1;
            tracing::error!(error = %err, "frame upload failed");
            return;
        }
        self.stats.uploads += 1;

        if let Err(err) = backend.draw(&DrawPass::QUAD) {
            self.stats.failures += 1;
            tracing::error!(error = %err, "draw failed");
            return;
        }
        self.stats.draws += 1;
        tracing::trace!(
            draws = self.stats.draws,
            frame_w = frame.width,
            frame_h = frame.height,
            "frame composited"
        );
    }

    /// The last composited surface, or `None` when disabled.
    pub fn read_pixels(&mut self) -> Option<FrameRGBA> {
        let backend = self.backend.as_mut()?;
        match backend.read_pixels() {
            Ok(frame) => Some(frame),
            Err(err) => {
                tracing::error!(error = %err, "readback failed");
                None
            }
        }
    }

    /// Decide once whether frames can be sampled as textures.
    ///
    /// When they cannot, the frame goes to the 2D fallback canvas if one was created and that
    /// canvas is returned. Nothing in [`draw`](Self::draw) calls this.
    pub fn probe_video_texture(&mut self, frame: &VideoFrame) -> Option<&FallbackCanvas> {
        if self.supports_video == Some(true) {
            return None;
        }

        if self.supports_video.is_none() {
            let supported = match self.backend.as_mut() {
                Some(backend) => match backend.upload_frame(frame) {
                    Ok(()) => true,
                    Err(err) => {
                        tracing::debug!(error = %err, "video texture probe failed");
                        false
                    }
                },
                None => false,
            };
            self.supports_video = Some(supported);
            if supported {
                return None;
            }
        }

        match self.fallback.as_mut() {
            None => {
                tracing::error!("video frames cannot be uploaded as textures and no fallback canvas exists");
                None
            }
            Some(canvas) => {
                canvas.draw(frame);
                Some(&*canvas)
            }
        }
    }

    pub fn supports_video(&self) -> Option<bool> {
        self.supports_video
    }

    /// Create the 2D fallback canvas sized `2 * width` by `height`.
    pub fn create_fallback_canvas(&mut self) -> &FallbackCanvas {
        let bound = self.bound;
        self.fallback.get_or_insert_with(|| FallbackCanvas::new(bound))
    }

    /// Release every backend resource. Idempotent.
    pub fn dispose(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.release();
            tracing::debug!(draws = self.stats.draws, "compositor disposed");
        }
        self.fallback = None;
    }
}

impl Drop for Compositor {
    fn drop(&mut self) {
        self.dispose();
    }
}
