use std::{cell::RefCell, rc::Rc, time::Duration};

use alphavid::{
    Bound, EventTarget, FsFetcher, MediaElement, MediaError, MediaErrorKind, MediaEvent,
    MediaResource, MediaSource, PixelSize, VideoFrame, VideoOptions,
};

/// Dispatches whatever the test queued on the next `advance`.
struct ScriptedElement {
    events: EventTarget,
    script: Rc<RefCell<Vec<MediaEvent>>>,
    paused: bool,
}

impl MediaElement for ScriptedElement {
    fn load(&mut self, _resource: MediaResource) {}
    fn play(&mut self) {
        self.paused = false;
    }
    fn pause(&mut self) {
        self.paused = true;
    }
    fn seek(&mut self, _t: Duration) {}
    fn set_loop(&mut self, _loop_playback: bool) {}
    fn is_paused(&self) -> bool {
        self.paused
    }
    fn current_time(&self) -> Duration {
        Duration::ZERO
    }
    fn duration(&self) -> Option<Duration> {
        None
    }
    fn current_frame(&self) -> Option<VideoFrame> {
        Some(VideoFrame::transparent_pixel())
    }
    fn size(&self) -> PixelSize {
        PixelSize::new(2, 1)
    }
    fn events(&self) -> &EventTarget {
        &self.events
    }
    fn advance(&mut self, _dt: Duration) {
        let pending: Vec<_> = self.script.borrow_mut().drain(..).collect();
        for e in pending {
            self.events.dispatch(&e);
        }
    }
    fn detach(&mut self) {
        self.events.clear();
    }
}

fn scripted(opts: VideoOptions) -> (MediaSource, Rc<RefCell<Vec<MediaEvent>>>, EventTarget) {
    let script = Rc::new(RefCell::new(Vec::new()));
    let events = EventTarget::new();
    let element = ScriptedElement {
        events: events.clone(),
        script: Rc::clone(&script),
        paused: true,
    };
    let src = MediaSource::from_element("scripted", opts, Box::new(element), Box::new(FsFetcher));
    (src, script, events)
}

fn opts() -> VideoOptions {
    VideoOptions::new(Bound::new(1, 1).unwrap())
}

fn time_update() -> MediaEvent {
    MediaEvent::TimeUpdate {
        current_time: Duration::from_millis(1),
    }
}

/// Every sequence of up to four signals drawn from {playing, timeupdate, canplay}.
fn sequences() -> Vec<Vec<MediaEvent>> {
    let alphabet = [MediaEvent::Playing, time_update(), MediaEvent::CanPlay];
    let mut out = vec![Vec::new()];
    for len in 1..=4 {
        let mut idx = vec![0usize; len];
        loop {
            out.push(idx.iter().map(|&i| alphabet[i].clone()).collect());
            let mut k = 0;
            while k < len {
                idx[k] += 1;
                if idx[k] < alphabet.len() {
                    break;
                }
                idx[k] = 0;
                k += 1;
            }
            if k == len {
                break;
            }
        }
    }
    out
}

#[test]
fn readiness_is_conjunctive_and_monotonic_for_every_ordering() {
    for seq in sequences() {
        let (mut src, script, _events) = scripted(opts());
        let mut seen_playing = false;
        let mut seen_update = false;
        let mut was_ready = false;

        for event in seq.iter() {
            match event {
                MediaEvent::Playing => seen_playing = true,
                MediaEvent::TimeUpdate { .. } => seen_update = true,
                _ => {}
            }
            script.borrow_mut().push(event.clone());
            src.poll(Duration::from_millis(1));

            assert_eq!(src.ready(), seen_playing && seen_update, "sequence {seq:?}");
            assert!(!was_ready || src.ready(), "readiness dropped in {seq:?}");
            was_ready = src.ready();
        }
    }
}

#[test]
fn dispose_removes_every_listener_and_is_idempotent() {
    let (mut src, _script, events) = scripted(opts());
    assert_eq!(events.listener_count(), 5);

    src.dispose();
    assert_eq!(events.listener_count(), 0);
    assert!(!src.ready());
    assert!(src.current_frame().is_none());

    src.dispose();
    assert!(src.is_disposed());
    assert_eq!(events.listener_count(), 0);
}

#[test]
fn events_after_dispose_reach_no_hook() {
    let errors = Rc::new(RefCell::new(0u32));
    let mut o = opts();
    let e = Rc::clone(&errors);
    o.hooks.on_error = Some(Box::new(move |_| *e.borrow_mut() += 1));
    let (mut src, _script, events) = scripted(o);

    src.dispose();
    events.dispatch(&MediaEvent::Error(MediaError::new(MediaErrorKind::Decode, "late")));
    assert_eq!(*errors.borrow(), 0);
}

#[test]
fn repeated_errors_report_once() {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let mut o = opts();
    let e = Rc::clone(&errors);
    o.hooks.on_error = Some(Box::new(move |err| e.borrow_mut().push(err.kind)));
    let (mut src, script, _events) = scripted(o);

    script.borrow_mut().extend([
        MediaEvent::Error(MediaError::new(MediaErrorKind::Network, "first")),
        MediaEvent::Error(MediaError::new(MediaErrorKind::Decode, "second")),
    ]);
    src.poll(Duration::ZERO);
    assert_eq!(*errors.borrow(), vec![MediaErrorKind::Network]);
}
