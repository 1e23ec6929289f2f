use std::{cell::RefCell, rc::Rc};

use alphavid::{FrameScheduler, ManualScheduler, RenderLoop};

fn setup() -> (Rc<RefCell<ManualScheduler>>, RenderLoop) {
    let sched = Rc::new(RefCell::new(ManualScheduler::new()));
    let lp = RenderLoop::new(sched.clone());
    (sched, lp)
}

/// Drain the scheduler once and run every accepted step, rescheduling after each.
fn tick(sched: &Rc<RefCell<ManualScheduler>>, lp: &RenderLoop, steps: &mut u32) {
    let due = sched.borrow_mut().take_due();
    for h in due {
        if lp.accept(h) {
            *steps += 1;
            lp.reschedule();
        }
    }
}

#[test]
fn stop_is_terminal() {
    let (sched, lp) = setup();
    let mut steps = 0;
    lp.start();
    lp.reschedule();
    tick(&sched, &lp, &mut steps);
    tick(&sched, &lp, &mut steps);
    assert_eq!(steps, 2);

    lp.stop();
    assert!(!lp.is_live());
    assert_eq!(sched.borrow().pending_len(), 0);
    for _ in 0..5 {
        tick(&sched, &lp, &mut steps);
    }
    assert_eq!(steps, 2);
}

#[test]
fn stop_twice_is_harmless() {
    let (sched, lp) = setup();
    lp.start();
    lp.reschedule();
    lp.stop();
    lp.stop();
    assert!(lp.pending().is_none());
    assert_eq!(sched.borrow().pending_len(), 0);
}

#[test]
fn frame_already_handed_out_is_rejected_after_stop() {
    let (sched, lp) = setup();
    lp.start();
    lp.reschedule();
    let due = sched.borrow_mut().take_due();
    lp.stop();
    assert!(due.iter().all(|h| !lp.accept(*h)));
}

#[test]
fn canceller_stops_from_inside_a_step() {
    let (sched, lp) = setup();
    let canceller = lp.canceller();
    lp.start();
    lp.reschedule();

    let mut steps = 0;
    for _ in 0..4 {
        let due = sched.borrow_mut().take_due();
        for h in due {
            if lp.accept(h) {
                steps += 1;
                if steps == 2 {
                    canceller.cancel();
                }
                lp.reschedule();
            }
        }
    }
    assert_eq!(steps, 2);
    assert_eq!(sched.borrow().pending_len(), 0);
}

#[test]
fn cancel_while_scheduler_is_borrowed_still_halts() {
    let (sched, lp) = setup();
    lp.start();
    lp.reschedule();
    let pending = lp.pending().unwrap();

    {
        let _busy = sched.borrow_mut();
        lp.stop();
    }
    assert!(!lp.is_live());
    let due = sched.borrow_mut().take_due();
    assert_eq!(due, vec![pending]);
    assert!(!lp.accept(pending));
}

#[test]
fn restart_after_stop_resumes_stepping() {
    let (sched, lp) = setup();
    let mut steps = 0;
    lp.start();
    lp.reschedule();
    lp.stop();
    lp.start();
    lp.reschedule();
    tick(&sched, &lp, &mut steps);
    assert_eq!(steps, 1);
    assert_eq!(sched.borrow_mut().take_due().len(), 1);
}
