use std::{cell::RefCell, rc::Rc, time::Duration};

use crate::{
    foundation::core::Bound,
    media::{
        decode::{FrameDecoder, MediaResource},
        element::{MediaElement, VideoElement},
        events::{MediaError, MediaEvent, MediaEventKind, Subscription},
        fetch::{BlobFetcher, FsFetcher},
        frame::VideoFrame,
        readiness::{Readiness, ReadinessSignal},
    },
};

pub type Callback = Box<dyn FnMut()>;
pub type ErrorCallback = Box<dyn FnMut(&MediaError)>;

/// Caller hooks fired from media events.
#[derive(Default)]
pub struct VideoHooks {
    /// Playback reached the end of a non-looping stream.
    pub end_callback: Option<Callback>,
    /// The playback clock moved.
    pub update_callback: Option<Callback>,
    /// A load, decode or fetch failure happened (no diagnostic).
    pub error_callback: Option<Callback>,
    /// A load, decode or fetch failure happened.
    pub on_error: Option<ErrorCallback>,
}

impl std::fmt::Debug for VideoHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoHooks")
            .field("end_callback", &self.end_callback.is_some())
            .field("update_callback", &self.update_callback.is_some())
            .field("error_callback", &self.error_callback.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[derive(Debug)]
pub struct VideoOptions {
    pub bound: Bound,
    pub loop_playback: bool,
    /// Fetch the whole resource first and decode from memory.
    pub use_blob: bool,
    pub hooks: VideoHooks,
}

impl VideoOptions {
    pub fn new(bound: Bound) -> Self {
        Self {
            bound,
            loop_playback: false,
            use_blob: false,
            hooks: VideoHooks::default(),
        }
    }
}

struct SourceState {
    readiness: Readiness,
    hooks: VideoHooks,
    error_reported: bool,
}

impl SourceState {
    fn report_error(&mut self, err: &MediaError) {
        if self.error_reported {
            tracing::debug!(error = %err, "suppressing repeated media error");
            return;
        }
        self.error_reported = true;
        tracing::error!(error = %err, "media stream failed");
        if let Some(cb) = self.hooks.on_error.as_mut() {
            cb(err);
        }
        if let Some(cb) = self.hooks.error_callback.as_mut() {
            cb();
        }
    }
}

/// Owns the decoding element, tracks readiness and drives the caller hooks.
pub struct MediaSource {
    src: String,
    element: Box<dyn MediaElement>,
    state: Rc<RefCell<SourceState>>,
    subscriptions: Vec<Subscription>,
    pending_blob: bool,
    fetcher: Box<dyn BlobFetcher>,
    disposed: bool,
}

impl MediaSource {
    /// Build a source over a fresh [`VideoElement`] sized `2 * width` by `height`.
    pub fn new(src: impl Into<String>, opts: VideoOptions, decoder: Box<dyn FrameDecoder>) -> Self {
        let element = VideoElement::new(decoder, opts.bound.source_size());
        Self::from_element(src, opts, Box::new(element), Box::new(FsFetcher))
    }

    /// Build a source over any element. Loading starts immediately (or, in blob mode, on the
    /// first [`poll`](Self::poll)); failures only ever reach the error hooks.
    pub fn from_element(
        src: impl Into<String>,
        opts: VideoOptions,
        mut element: Box<dyn MediaElement>,
        fetcher: Box<dyn BlobFetcher>,
    ) -> Self {
        let src = src.into();
        let state = Rc::new(RefCell::new(SourceState {
            readiness: Readiness::new(),
            hooks: opts.hooks,
            error_reported: false,
        }));

        element.set_loop(opts.loop_playback);
        let subscriptions = Self::subscribe(element.as_ref(), &state);

        if !opts.use_blob {
            element.load(MediaResource::Url(src.clone()));
        }

        Self {
            src,
            element,
            state,
            subscriptions,
            pending_blob: opts.use_blob,
            fetcher,
            disposed: false,
        }
    }

    fn subscribe(element: &dyn MediaElement, state: &Rc<RefCell<SourceState>>) -> Vec<Subscription> {
        let events = element.events();
        let mut subs = Vec::with_capacity(5);

        subs.push(events.subscribe(MediaEventKind::CanPlay, |_| {
            tracing::debug!("media can play");
        }));

        let st = Rc::clone(state);
        subs.push(events.subscribe(MediaEventKind::Playing, move |_| {
            if st.borrow_mut().readiness.observe(ReadinessSignal::Playing) {
                tracing::debug!("media ready");
            }
        }));

        let st = Rc::clone(state);
        subs.push(events.subscribe(MediaEventKind::TimeUpdate, move |_| {
            let mut st = st.borrow_mut();
            if st.readiness.observe(ReadinessSignal::TimeUpdate) {
                tracing::debug!("media ready");
            }
            if let Some(cb) = st.hooks.update_callback.as_mut() {
                cb();
            }
        }));

        let st = Rc::clone(state);
        subs.push(events.subscribe(MediaEventKind::Ended, move |_| {
            tracing::debug!("media ended");
            if let Some(cb) = st.borrow_mut().hooks.end_callback.as_mut() {
                cb();
            }
        }));

        let st = Rc::clone(state);
        subs.push(events.subscribe(MediaEventKind::Error, move |event| {
            if let MediaEvent::Error(err) = event {
                st.borrow_mut().report_error(err);
            }
        }));

        subs
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    /// `true` once the stream has both started playing and reported progress.
    pub fn ready(&self) -> bool {
        self.state.borrow().readiness.is_ready()
    }

    pub fn current_frame(&self) -> Option<VideoFrame> {
        if self.disposed {
            return None;
        }
        self.element.current_frame()
    }

    pub fn current_time(&self) -> Duration {
        self.element.current_time()
    }

    pub fn is_paused(&self) -> bool {
        self.element.is_paused()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn element(&self) -> &dyn MediaElement {
        self.element.as_ref()
    }

    /// Live listener registrations on the element.
    pub fn listener_count(&self) -> usize {
        self.element.events().listener_count()
    }

    /// Let the element make progress: finish a pending blob fetch, advance the clock by `dt`
    /// and dispatch the resulting events.
    pub fn poll(&mut self, dt: Duration) {
        if self.disposed {
            return;
        }
        if self.pending_blob {
            self.pending_blob = false;
            match self.fetcher.fetch(&self.src) {
                Ok(bytes) => self.element.load(MediaResource::Blob(bytes)),
                Err(err) => {
                    tracing::error!(src = %self.src, error = %err, "blob fetch failed");
                    self.state
                        .borrow_mut()
                        .report_error(&MediaError::from_load_error(&err));
                }
            }
        }
        self.element.advance(dt);
    }

    /// Restart from time zero.
    ///
    /// Readiness is cleared so that no frame from before the seek is composited until
    /// `playing` and `timeupdate` fire again.
    pub fn play(&mut self) {
        if self.disposed {
            return;
        }
        self.state.borrow_mut().readiness.reset();
        self.element.seek(Duration::ZERO);
        self.element.play();
    }

    /// Continue from the current position.
    pub fn resume(&mut self) {
        if self.disposed {
            return;
        }
        self.element.play();
    }

    pub fn pause(&mut self) {
        if self.disposed {
            return;
        }
        self.element.pause();
    }

    /// Stop playback, release every listener and detach the element. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.element.pause();
        self.subscriptions.clear();
        self.element.detach();
        self.state.borrow_mut().readiness.reset();
        self.pending_blob = false;
        self.disposed = true;
    }
}

impl Drop for MediaSource {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, sync::Arc};

    use super::*;
    use crate::{
        foundation::{core::Fps, error::AlphaVideoError},
        media::decode::SyntheticDecoder,
    };

    const STEP: Duration = Duration::from_millis(10);

    fn decoder(frames: usize) -> Box<dyn FrameDecoder> {
        Box::new(
            SyntheticDecoder::split_frames(
                Fps::new(25, 1).unwrap(),
                frames,
                2,
                2,
                [128, 128, 128, 255],
                [255, 0, 0, 255],
            )
            .unwrap(),
        )
    }

    fn counter() -> (Rc<Cell<u32>>, Callback) {
        let n = Rc::new(Cell::new(0));
        let c = Rc::clone(&n);
        (n, Box::new(move || c.set(c.get() + 1)))
    }

    fn opts() -> VideoOptions {
        VideoOptions::new(Bound::new(2, 2).unwrap())
    }

    struct FailingFetcher;
    impl BlobFetcher for FailingFetcher {
        fn fetch(&mut self, url: &str) -> crate::AlphaVideoResult<Arc<[u8]>> {
            Err(AlphaVideoError::fetch(format!("404 for {url}")))
        }
    }

    struct MemFetcher(Rc<Cell<u32>>);
    impl BlobFetcher for MemFetcher {
        fn fetch(&mut self, _url: &str) -> crate::AlphaVideoResult<Arc<[u8]>> {
            self.0.set(self.0.get() + 1);
            Ok(Arc::from(vec![0u8; 8]))
        }
    }

    #[test]
    fn becomes_ready_after_playing_and_progress() {
        let mut src = MediaSource::new("mem", opts(), decoder(4));
        assert!(!src.ready());
        src.poll(STEP);
        assert!(!src.ready(), "loaded but not playing");
        src.play();
        src.poll(STEP);
        assert!(src.ready());
        assert!(src.current_frame().is_some());
    }

    #[test]
    fn update_callback_fires_per_time_update() {
        let (updates, cb) = counter();
        let mut o = opts();
        o.hooks.update_callback = Some(cb);
        let mut src = MediaSource::new("mem", o, decoder(10));
        src.play();
        for _ in 0..3 {
            src.poll(STEP);
        }
        assert_eq!(updates.get(), 3);
    }

    #[test]
    fn decode_failure_reports_exactly_once_to_both_hooks() {
        let (plain, cb) = counter();
        let seen: Rc<RefCell<Vec<MediaError>>> = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let mut o = opts();
        o.hooks.error_callback = Some(cb);
        o.hooks.on_error = Some(Box::new(move |e| s.borrow_mut().push(e.clone())));

        let mut src = MediaSource::new("mem", o, Box::new(SyntheticDecoder::failing("bad")));
        src.play();
        for _ in 0..5 {
            src.poll(STEP);
        }
        assert_eq!(plain.get(), 1);
        assert_eq!(seen.borrow().len(), 1);
        assert!(seen.borrow()[0].message.contains("bad"));
        assert!(!src.ready());
    }

    #[test]
    fn blob_fetch_failure_surfaces_on_poll_not_construction() {
        let (errors, cb) = counter();
        let mut o = opts();
        o.use_blob = true;
        o.hooks.error_callback = Some(cb);
        let element = VideoElement::new(decoder(2), o.bound.source_size());
        let mut src =
            MediaSource::from_element("https://x/a.mp4", o, Box::new(element), Box::new(FailingFetcher));
        assert_eq!(errors.get(), 0);
        src.poll(STEP);
        src.poll(STEP);
        assert_eq!(errors.get(), 1);
    }

    #[test]
    fn blob_mode_fetches_once_then_loads() {
        let fetches = Rc::new(Cell::new(0));
        let mut o = opts();
        o.use_blob = true;
        let element = VideoElement::new(decoder(4), o.bound.source_size());
        let mut src = MediaSource::from_element(
            "a.mp4",
            o,
            Box::new(element),
            Box::new(MemFetcher(Rc::clone(&fetches))),
        );
        src.play();
        src.poll(STEP);
        src.poll(STEP);
        assert_eq!(fetches.get(), 1);
        assert!(src.ready());
    }

    #[test]
    fn replay_resets_readiness_but_resume_keeps_it() {
        let mut src = MediaSource::new("mem", opts(), decoder(10));
        src.play();
        src.poll(STEP);
        assert!(src.ready());

        src.pause();
        src.resume();
        assert!(src.ready());

        src.play();
        assert!(!src.ready());
        assert_eq!(src.current_time(), Duration::ZERO);
        src.poll(STEP);
        assert!(src.ready());
    }

    #[test]
    fn end_callback_fires_once() {
        let (ends, cb) = counter();
        let mut o = opts();
        o.hooks.end_callback = Some(cb);
        let mut src = MediaSource::new("mem", o, decoder(2));
        src.play();
        for _ in 0..30 {
            src.poll(STEP);
        }
        assert_eq!(ends.get(), 1);
    }

    #[test]
    fn dispose_twice_is_same_as_once() {
        let mut src = MediaSource::new("mem", opts(), decoder(2));
        assert_eq!(src.listener_count(), 5);
        src.play();
        src.poll(STEP);

        src.dispose();
        assert_eq!(src.listener_count(), 0);
        assert!(!src.ready());
        assert!(src.current_frame().is_none());

        src.dispose();
        assert_eq!(src.listener_count(), 0);
        assert!(src.is_disposed());
        src.poll(STEP);
        src.play();
        assert!(!src.ready());
    }
}
