//! Media lifecycle events and scoped listener subscriptions.
//!
//! Listeners are registered once per event kind and removed through the [`Subscription`] that
//! registration returns. Dropping the subscription removes exactly the closure it registered.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
    time::Duration,
};

use crate::foundation::error::AlphaVideoError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaEventKind {
    CanPlay,
    Playing,
    TimeUpdate,
    Ended,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaErrorKind {
    /// The resource could not be fetched.
    Network,
    /// The resource was fetched but could not be decoded.
    Decode,
    /// No decoder handles this resource.
    Unsupported,
}

/// Diagnostic handed to error hooks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaError {
    pub kind: MediaErrorKind,
    pub message: String,
}

impl MediaError {
    pub fn new(kind: MediaErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify a crate error raised while loading a stream.
    pub fn from_load_error(err: &AlphaVideoError) -> Self {
        let kind = match err {
            AlphaVideoError::Fetch(_) => MediaErrorKind::Network,
            AlphaVideoError::Capability(_) => MediaErrorKind::Unsupported,
            _ => MediaErrorKind::Decode,
        };
        Self::new(kind, err.to_string())
    }
}

impl std::fmt::Display for MediaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MediaEvent {
    CanPlay,
    Playing,
    TimeUpdate { current_time: Duration },
    Ended,
    Error(MediaError),
}

impl MediaEvent {
    pub fn kind(&self) -> MediaEventKind {
        match self {
            MediaEvent::CanPlay => MediaEventKind::CanPlay,
            MediaEvent::Playing => MediaEventKind::Playing,
            MediaEvent::TimeUpdate { .. } => MediaEventKind::TimeUpdate,
            MediaEvent::Ended => MediaEventKind::Ended,
            MediaEvent::Error(_) => MediaEventKind::Error,
        }
    }
}

type Listener = Rc<dyn Fn(&MediaEvent)>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, MediaEventKind, Listener)>,
}

/// Single-threaded event dispatcher owned by a media element.
#[derive(Clone, Default)]
pub struct EventTarget {
    registry: Rc<RefCell<Registry>>,
}

impl EventTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        kind: MediaEventKind,
        listener: impl Fn(&MediaEvent) + 'static,
    ) -> Subscription {
        let mut reg = self.registry.borrow_mut();
        let id = reg.next_id;
        reg.next_id += 1;
        reg.listeners.push((id, kind, Rc::new(listener)));
        Subscription {
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    /// Call every listener registered for the event's kind, in registration order.
    ///
    /// Listeners may subscribe or unsubscribe while being called; changes apply to the next
    /// dispatch.
    pub fn dispatch(&self, event: &MediaEvent) {
        let kind = event.kind();
        let targets: Vec<Listener> = self
            .registry
            .borrow()
            .listeners
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, l)| Rc::clone(l))
            .collect();
        for listener in targets {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry.borrow().listeners.len()
    }

    /// Drop every listener. Outstanding subscriptions become inert.
    pub fn clear(&self) {
        self.registry.borrow_mut().listeners.clear();
    }
}

/// Handle for one registered listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes its listener immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<Registry>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// `true` while the listener is still registered.
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|reg| reg.borrow().listeners.iter().any(|(id, _, _)| *id == self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(reg) = self.registry.upgrade() else {
            return;
        };
        if let Ok(mut reg) = reg.try_borrow_mut() {
            reg.listeners.retain(|(id, _, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn dispatch_reaches_only_matching_kind() {
        let target = EventTarget::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _sub = target.subscribe(MediaEventKind::Playing, move |_| h.set(h.get() + 1));

        target.dispatch(&MediaEvent::Playing);
        target.dispatch(&MediaEvent::Ended);
        target.dispatch(&MediaEvent::Playing);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn dropping_subscription_removes_listener() {
        let target = EventTarget::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sub = target.subscribe(MediaEventKind::Ended, move |_| h.set(h.get() + 1));
        assert!(sub.is_active());
        assert_eq!(target.listener_count(), 1);

        sub.unsubscribe();
        target.dispatch(&MediaEvent::Ended);
        assert_eq!(hits.get(), 0);
        assert_eq!(target.listener_count(), 0);
    }

    #[test]
    fn subscription_outliving_target_is_harmless() {
        let target = EventTarget::new();
        let sub = target.subscribe(MediaEventKind::CanPlay, |_| {});
        drop(target);
        assert!(!sub.is_active());
        drop(sub);
    }

    #[test]
    fn clear_makes_subscriptions_inert() {
        let target = EventTarget::new();
        let sub = target.subscribe(MediaEventKind::CanPlay, |_| {});
        target.clear();
        assert!(!sub.is_active());
        assert_eq!(target.listener_count(), 0);
    }

    #[test]
    fn listener_may_unsubscribe_another_during_dispatch() {
        let target = EventTarget::new();
        let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let v = Rc::clone(&victim);
        let _killer = target.subscribe(MediaEventKind::Playing, move |_| {
            v.borrow_mut().take();
        });
        *victim.borrow_mut() = Some(target.subscribe(MediaEventKind::Playing, |_| {}));
        assert_eq!(target.listener_count(), 2);

        target.dispatch(&MediaEvent::Playing);
        assert_eq!(target.listener_count(), 1);
    }

    #[test]
    fn load_errors_are_classified() {
        let net = MediaError::from_load_error(&AlphaVideoError::fetch("404"));
        assert_eq!(net.kind, MediaErrorKind::Network);
        let dec = MediaError::from_load_error(&AlphaVideoError::media("bad codec"));
        assert_eq!(dec.kind, MediaErrorKind::Decode);
        assert!(dec.message.contains("bad codec"));
    }
}
