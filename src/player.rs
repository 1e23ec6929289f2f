use std::{cell::RefCell, rc::Rc, time::Duration};

use crate::{
    foundation::{
        core::{Bound, PixelSize},
        error::AlphaVideoResult,
    },
    media::{
        decode::{AutoDecoder, FrameDecoder},
        element::VideoElement,
        events::MediaError,
        fetch::{BlobFetcher, FsFetcher},
        source::{MediaSource, VideoHooks, VideoOptions},
    },
    render::{
        backend::{BackendKind, FrameRGBA},
        compositor::Compositor,
        surface::{Container, Surface, SurfaceHost},
    },
    schedule::{ManualScheduler, RenderLoop, SharedScheduler},
};

/// Everything needed to build an [`AlphaVideoPlayer`].
pub struct PlayerOptions {
    /// Draw onto this surface, or append a new one to this container.
    pub el: SurfaceHost,
    pub src: String,
    /// Logical width of the visible output. Source frames are twice as wide.
    pub width: u32,
    pub height: u32,
    pub loop_playback: bool,
    pub use_blob: bool,
    pub autoplay: bool,
    pub device_pixel_ratio: f64,
    /// Context kind for a surface the player creates inside a container.
    pub backend: BackendKind,
    pub hooks: VideoHooks,
    pub decoder: Option<Box<dyn FrameDecoder>>,
    pub fetcher: Option<Box<dyn BlobFetcher>>,
    /// Owned by this player alone; defaults to a fresh [`ManualScheduler`].
    pub scheduler: Option<SharedScheduler>,
}

impl PlayerOptions {
    pub fn new(el: impl Into<SurfaceHost>, src: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            el: el.into(),
            src: src.into(),
            width,
            height,
            loop_playback: false,
            use_blob: false,
            autoplay: false,
            device_pixel_ratio: 1.0,
            backend: BackendKind::Cpu,
            hooks: VideoHooks::default(),
            decoder: None,
            fetcher: None,
            scheduler: None,
        }
    }

    pub fn loop_playback(mut self, on: bool) -> Self {
        self.loop_playback = on;
        self
    }

    pub fn use_blob(mut self, on: bool) -> Self {
        self.use_blob = on;
        self
    }

    pub fn autoplay(mut self, on: bool) -> Self {
        self.autoplay = on;
        self
    }

    pub fn device_pixel_ratio(mut self, dpr: f64) -> Self {
        self.device_pixel_ratio = dpr;
        self
    }

    pub fn backend(mut self, kind: BackendKind) -> Self {
        self.backend = kind;
        self
    }

    pub fn on_end(mut self, f: impl FnMut() + 'static) -> Self {
        self.hooks.end_callback = Some(Box::new(f));
        self
    }

    pub fn on_update(mut self, f: impl FnMut() + 'static) -> Self {
        self.hooks.update_callback = Some(Box::new(f));
        self
    }

    pub fn on_error_callback(mut self, f: impl FnMut() + 'static) -> Self {
        self.hooks.error_callback = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(&MediaError) + 'static) -> Self {
        self.hooks.on_error = Some(Box::new(f));
        self
    }

    pub fn decoder(mut self, decoder: impl FrameDecoder + 'static) -> Self {
        self.decoder = Some(Box::new(decoder));
        self
    }

    pub fn fetcher(mut self, fetcher: impl BlobFetcher + 'static) -> Self {
        self.fetcher = Some(Box::new(fetcher));
        self
    }

    /// Drive the render loop from `scheduler`.
    ///
    /// Each `pump` drains every due frame from it, so it must not be shared with another
    /// player.
    pub fn scheduler(mut self, scheduler: SharedScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }
}

/// Plays one alpha video onto one surface.
///
/// The host calls [`pump`](Self::pump) once per display refresh. Each pump advances the media
/// clock and then runs the render step if one is due.
pub struct AlphaVideoPlayer {
    media: MediaSource,
    compositor: Compositor,
    render_loop: RenderLoop,
    surface: Surface,
    /// Set when the surface was created by us and must be detached on dispose.
    owner: Option<Container>,
    disposed: bool,
}

impl AlphaVideoPlayer {
    pub fn new(opts: PlayerOptions) -> AlphaVideoResult<Self> {
        let PlayerOptions {
            el,
            src,
            width,
            height,
            loop_playback,
            use_blob,
            autoplay,
            device_pixel_ratio,
            backend,
            mut hooks,
            decoder,
            fetcher,
            scheduler,
        } = opts;

        let bound = Bound::new(width, height)?;
        let pixels = bound.scaled(device_pixel_ratio);
        let (surface, owner) = match el {
            SurfaceHost::Surface(mut s) => {
                s.set_size(pixels);
                (s, None)
            }
            SurfaceHost::Container(c) => {
                let s = Surface::new(pixels, backend);
                c.append(s.clone());
                (s, Some(c))
            }
        };

        let scheduler: SharedScheduler =
            scheduler.unwrap_or_else(|| Rc::new(RefCell::new(ManualScheduler::new())));
        let render_loop = RenderLoop::new(scheduler);

        let canceller = render_loop.canceller();
        let mut user_end = hooks.end_callback.take();
        hooks.end_callback = Some(Box::new(move || {
            canceller.cancel();
            if let Some(cb) = user_end.as_mut() {
                cb();
            }
        }));

        let decoder = decoder.unwrap_or_else(|| Box::new(AutoDecoder::default()));
        let fetcher = fetcher.unwrap_or_else(|| Box::new(FsFetcher));
        let element = VideoElement::new(decoder, bound.source_size());
        let media = MediaSource::from_element(
            src,
            VideoOptions {
                bound,
                loop_playback,
                use_blob,
                hooks,
            },
            Box::new(element),
            fetcher,
        );
        let compositor = Compositor::new(&surface, bound);

        tracing::debug!(
            src = %media.src(),
            width,
            height,
            surface_w = pixels.width,
            surface_h = pixels.height,
            compositor = compositor.is_enabled(),
            "player created"
        );

        let mut player = Self {
            media,
            compositor,
            render_loop,
            surface,
            owner,
            disposed: false,
        };
        if autoplay {
            player.play();
        }
        Ok(player)
    }

    fn render_step(&mut self) {
        if self.media.ready()
            && let Some(frame) = self.media.current_frame()
        {
            self.compositor.draw(&frame);
        }
        self.render_loop.reschedule();
    }

    /// One display refresh: advance the media clock by `dt`, then fire due frames.
    pub fn pump(&mut self, dt: Duration) {
        if self.disposed {
            return;
        }
        self.media.poll(dt);

        let due = self.render_loop.scheduler().borrow_mut().take_due();
        for handle in due {
            if self.render_loop.accept(handle) {
                self.render_step();
            }
        }
    }

    /// Restart from the beginning.
    pub fn play(&mut self) {
        if self.disposed {
            return;
        }
        self.render_loop.stop();
        self.media.play();
        self.render_loop.start();
        self.render_step();
    }

    pub fn resume(&mut self) {
        if self.disposed {
            return;
        }
        self.render_loop.stop();
        self.media.resume();
        self.render_loop.start();
        self.render_step();
    }

    pub fn pause(&mut self) {
        if self.disposed {
            return;
        }
        self.render_loop.stop();
        self.media.pause();
    }

    /// Stop rendering and free media, GPU resources and a surface we created. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.render_loop.stop();
        self.media.dispose();
        self.compositor.dispose();
        if let Some(container) = self.owner.take() {
            container.remove(self.surface.id());
        }
        self.disposed = true;
        tracing::debug!(src = %self.media.src(), "player disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn is_rendering(&self) -> bool {
        self.render_loop.is_live()
    }

    pub fn media(&self) -> &MediaSource {
        &self.media
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn surface_size(&self) -> PixelSize {
        self.surface.size()
    }

    pub fn scheduler(&self) -> SharedScheduler {
        self.render_loop.scheduler()
    }

    /// The last composited output, if the compositor is enabled.
    pub fn read_pixels(&mut self) -> Option<FrameRGBA> {
        self.compositor.read_pixels()
    }
}

impl Drop for AlphaVideoPlayer {
    fn drop(&mut self) {
        self.dispose();
    }
}
