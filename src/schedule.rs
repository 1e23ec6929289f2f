//! Per-frame callbacks and the cancelable render loop built on them.

use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// The host's "call me before the next repaint" primitive.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;

    /// Cancelling an unknown or already-fired handle does nothing.
    fn cancel_frame(&mut self, handle: FrameHandle);

    /// Handles whose callback is due now, oldest first. They are no longer pending.
    fn take_due(&mut self) -> Vec<FrameHandle>;
}

/// Queues requests until the host drains them, once per display refresh.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next: u64,
    pending: Vec<FrameHandle>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.next += 1;
        let handle = FrameHandle(self.next);
        self.pending.push(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.pending.retain(|h| *h != handle);
    }

    fn take_due(&mut self) -> Vec<FrameHandle> {
        std::mem::take(&mut self.pending)
    }
}

pub type SharedScheduler = Rc<RefCell<dyn FrameScheduler>>;

struct LoopShared {
    live: Cell<bool>,
    pending: Cell<Option<FrameHandle>>,
    scheduler: SharedScheduler,
}

impl LoopShared {
    fn stop(&self) {
        self.live.set(false);
        let Some(handle) = self.pending.take() else {
            return;
        };
        match self.scheduler.try_borrow_mut() {
            Ok(mut s) => s.cancel_frame(handle),
            // The frame still fires; `accept` rejects it once the loop is not live.
            Err(_) => tracing::trace!(?handle, "scheduler busy, frame left to expire"),
        }
    }
}

/// A chain of frame requests where each step schedules the next one.
///
/// The live flag is checked on every re-entry, so once [`stop`](Self::stop) returns no
/// further step runs until [`start`](Self::start) is called again.
pub struct RenderLoop {
    shared: Rc<LoopShared>,
}

impl RenderLoop {
    pub fn new(scheduler: SharedScheduler) -> Self {
        Self {
            shared: Rc::new(LoopShared {
                live: Cell::new(false),
                pending: Cell::new(None),
                scheduler,
            }),
        }
    }

    /// Mark the loop live. The caller runs the first step itself.
    pub fn start(&self) {
        self.shared.live.set(true);
    }

    /// Idempotent.
    pub fn stop(&self) {
        self.shared.stop();
    }

    pub fn is_live(&self) -> bool {
        self.shared.live.get()
    }

    pub fn pending(&self) -> Option<FrameHandle> {
        self.shared.pending.get()
    }

    /// Request the next step. Does nothing once stopped.
    pub fn reschedule(&self) {
        if !self.is_live() {
            return;
        }
        let mut scheduler = self.shared.scheduler.borrow_mut();
        if let Some(prev) = self.shared.pending.take() {
            scheduler.cancel_frame(prev);
        }
        self.shared.pending.set(Some(scheduler.request_frame()));
    }

    /// Claim a due handle. `true` means the caller should run one step now.
    pub fn accept(&self, handle: FrameHandle) -> bool {
        if !self.is_live() || self.shared.pending.get() != Some(handle) {
            return false;
        }
        self.shared.pending.set(None);
        true
    }

    pub fn scheduler(&self) -> SharedScheduler {
        Rc::clone(&self.shared.scheduler)
    }

    pub fn canceller(&self) -> LoopCanceller {
        LoopCanceller {
            shared: Rc::downgrade(&self.shared),
        }
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

/// Stops a [`RenderLoop`] from code that does not own it, such as a media hook.
#[derive(Clone)]
pub struct LoopCanceller {
    shared: Weak<LoopShared>,
}

impl LoopCanceller {
    pub fn cancel(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.stop();
        }
    }
}

impl std::fmt::Debug for LoopCanceller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopCanceller")
            .field("attached", &(self.shared.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual() -> (Rc<RefCell<ManualScheduler>>, RenderLoop) {
        let sched = Rc::new(RefCell::new(ManualScheduler::new()));
        let lp = RenderLoop::new(sched.clone());
        (sched, lp)
    }

    #[test]
    fn manual_scheduler_cancels_and_drains() {
        let mut s = ManualScheduler::new();
        let a = s.request_frame();
        let b = s.request_frame();
        s.cancel_frame(a);
        assert_eq!(s.take_due(), vec![b]);
        assert_eq!(s.pending_len(), 0);
    }

    #[test]
    fn reschedule_keeps_one_request_pending() {
        let (sched, lp) = manual();
        lp.start();
        lp.reschedule();
        lp.reschedule();
        assert_eq!(sched.borrow().pending_len(), 1);
    }

    #[test]
    fn stale_handles_are_rejected() {
        let (sched, lp) = manual();
        lp.start();
        lp.reschedule();
        let due = sched.borrow_mut().take_due();
        assert!(lp.accept(due[0]));
        assert!(!lp.accept(due[0]));
    }

    #[test]
    fn not_live_until_started() {
        let (sched, lp) = manual();
        lp.reschedule();
        assert_eq!(sched.borrow().pending_len(), 0);
        assert!(!lp.is_live());
    }

    #[test]
    fn canceller_outlives_loop() {
        let (sched, lp) = manual();
        let c = lp.canceller();
        lp.start();
        lp.reschedule();
        drop(lp);
        assert_eq!(sched.borrow().pending_len(), 0);
        c.cancel();
    }
}
