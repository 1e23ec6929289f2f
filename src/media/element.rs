use std::time::Duration;

use crate::{
    foundation::core::PixelSize,
    media::{
        decode::{DecodedStream, FrameDecoder, MediaResource},
        events::{EventTarget, MediaError, MediaEvent},
        frame::VideoFrame,
    },
};

/// The decoding element behind a [`MediaSource`](crate::MediaSource).
///
/// Effects of `load`, `play` and `seek` are observed asynchronously: events are queued and
/// dispatched from the next [`advance`](MediaElement::advance).
pub trait MediaElement {
    fn load(&mut self, resource: MediaResource);
    fn play(&mut self);
    fn pause(&mut self);
    /// Move the clock to `t`. If playing, the next `advance` emits `Playing` again.
    fn seek(&mut self, t: Duration);
    fn set_loop(&mut self, loop_playback: bool);

    fn is_paused(&self) -> bool;
    fn current_time(&self) -> Duration;
    /// `None` until a stream has been loaded.
    fn duration(&self) -> Option<Duration>;
    fn current_frame(&self) -> Option<VideoFrame>;
    /// Nominal display size (`2 * width` by `height` for alpha video).
    fn size(&self) -> PixelSize;

    fn events(&self) -> &EventTarget;

    /// Move the playback clock forward by `dt` and dispatch the resulting events.
    fn advance(&mut self, dt: Duration);

    /// Stop playback, drop the stream and remove every listener.
    fn detach(&mut self);
}

enum LoadState {
    Empty,
    Pending(MediaResource),
    Loaded(DecodedStream),
    Failed,
}

/// [`MediaElement`] over a pluggable [`FrameDecoder`].
pub struct VideoElement {
    decoder: Box<dyn FrameDecoder>,
    events: EventTarget,
    size: PixelSize,
    loop_playback: bool,
    state: LoadState,
    clock: Duration,
    paused: bool,
    playing_emitted: bool,
    ended: bool,
    queued: Vec<MediaEvent>,
}

impl VideoElement {
    pub fn new(decoder: Box<dyn FrameDecoder>, size: PixelSize) -> Self {
        Self {
            decoder,
            events: EventTarget::new(),
            size,
            loop_playback: false,
            state: LoadState::Empty,
            clock: Duration::ZERO,
            paused: true,
            playing_emitted: false,
            ended: false,
            queued: Vec::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, LoadState::Loaded(_))
    }

    fn finish_load(&mut self) {
        let LoadState::Pending(resource) = std::mem::replace(&mut self.state, LoadState::Empty)
        else {
            return;
        };
        match self.decoder.decode(&resource) {
            Ok(stream) => {
                tracing::debug!(
                    source = %resource.describe(),
                    frames = stream.frames.len(),
                    "media loaded"
                );
                self.state = LoadState::Loaded(stream);
                self.queued.push(MediaEvent::CanPlay);
            }
            Err(err) => {
                tracing::error!(source = %resource.describe(), error = %err, "media load failed");
                self.state = LoadState::Failed;
                self.queued
                    .push(MediaEvent::Error(MediaError::from_load_error(&err)));
            }
        }
    }

    fn step_clock(&mut self, dt: Duration) {
        let LoadState::Loaded(stream) = &self.state else {
            return;
        };
        if self.paused {
            return;
        }
        if !self.playing_emitted {
            self.playing_emitted = true;
            self.queued.push(MediaEvent::Playing);
        }

        let duration = stream.duration();
        let next = self.clock.saturating_add(dt);
        if next < duration {
            self.clock = next;
            self.queued.push(MediaEvent::TimeUpdate {
                current_time: self.clock,
            });
        } else if self.loop_playback && !duration.is_zero() {
            self.clock = Duration::from_nanos((next.as_nanos() % duration.as_nanos()) as u64);
            self.queued.push(MediaEvent::TimeUpdate {
                current_time: self.clock,
            });
        } else {
            self.clock = duration;
            self.paused = true;
            self.playing_emitted = false;
            self.ended = true;
            self.queued.push(MediaEvent::TimeUpdate {
                current_time: self.clock,
            });
            self.queued.push(MediaEvent::Ended);
        }
    }
}

impl MediaElement for VideoElement {
    fn load(&mut self, resource: MediaResource) {
        self.state = LoadState::Pending(resource);
        self.clock = Duration::ZERO;
        self.ended = false;
        self.playing_emitted = false;
    }

    fn play(&mut self) {
        // Playing a finished, non-looping stream restarts it.
        if self.ended {
            self.clock = Duration::ZERO;
            self.ended = false;
        }
        self.paused = false;
    }

    fn pause(&mut self) {
        self.paused = true;
        self.playing_emitted = false;
    }

    fn seek(&mut self, t: Duration) {
        self.clock = match self.duration() {
            Some(d) => t.min(d),
            None => t,
        };
        self.ended = false;
        // Playback after a seek is announced again.
        self.playing_emitted = false;
    }

    fn set_loop(&mut self, loop_playback: bool) {
        self.loop_playback = loop_playback;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn current_time(&self) -> Duration {
        self.clock
    }

    fn duration(&self) -> Option<Duration> {
        match &self.state {
            LoadState::Loaded(s) => Some(s.duration()),
            _ => None,
        }
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        match &self.state {
            LoadState::Loaded(s) => Some(s.frame_at(self.clock).clone()),
            _ => None,
        }
    }

    fn size(&self) -> PixelSize {
        self.size
    }

    fn events(&self) -> &EventTarget {
        &self.events
    }

    fn advance(&mut self, dt: Duration) {
        if matches!(self.state, LoadState::Pending(_)) {
            self.finish_load();
        }
        self.step_clock(dt);

        for event in std::mem::take(&mut self.queued) {
            tracing::trace!(?event, "media event");
            self.events.dispatch(&event);
        }
    }

    fn detach(&mut self) {
        self.paused = true;
        self.playing_emitted = false;
        self.queued.clear();
        self.state = LoadState::Empty;
        self.events.clear();
    }
}
