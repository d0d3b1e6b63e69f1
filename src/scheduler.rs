//! Timing strategies for the loop controller.
//!
//! A scheduler never calls anything itself. It hands out a handle for the
//! recurring task and answers "is a tick due now?". The event loop asks that
//! question, so cancelling a task takes effect immediately: once `cancel`
//! returns, `take_due` is false for that handle forever.

use std::time::{Duration, Instant};

/// opaque handle to a recurring task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskId(u64);

pub trait Scheduler {
    /// start a recurring task, replacing any task already scheduled
    fn schedule_recurring(&mut self, now: Instant) -> TaskId;

    /// stop a task; false if it wasn't the active one
    fn cancel(&mut self, task: TaskId) -> bool;

    /// true if the task should tick now; consumes that tick
    fn take_due(&mut self, task: TaskId, now: Instant) -> bool;

    /// when the next tick falls due, if anything is scheduled
    fn next_deadline(&self) -> Option<Instant>;

    /// the host has been hidden or shown again
    fn set_visible(&mut self, _visible: bool) {}
}

#[derive(Debug)]
struct Recurring {
    id: TaskId,
    deadline: Instant,
}

/// next deadline one period on; if we've fallen more than a period behind
/// the missed ticks are dropped rather than run back to back
fn advance(deadline: Instant, period: Duration, now: Instant) -> Instant {
    let next = deadline + period;
    if next <= now {
        log::trace!("tick ran {:?} late, skipping missed ticks", now - deadline);
        now + period
    } else {
        next
    }
}

/// Fires at a fixed period regardless of what the display is doing, and
/// keeps going while the terminal is in the background.
#[derive(Debug)]
pub struct IntervalScheduler {
    period: Duration,
    next_id: u64,
    active: Option<Recurring>,
}

impl IntervalScheduler {
    pub fn new(period: Duration) -> Self {
        IntervalScheduler {
            period,
            next_id: 0,
            active: None,
        }
    }
}

impl Scheduler for IntervalScheduler {
    fn schedule_recurring(&mut self, now: Instant) -> TaskId {
        self.next_id += 1;
        let id = TaskId(self.next_id);
        // the first tick comes one period after scheduling, like setInterval
        self.active = Some(Recurring {
            id,
            deadline: now + self.period,
        });
        id
    }

    fn cancel(&mut self, task: TaskId) -> bool {
        match &self.active {
            Some(r) if r.id == task => {
                self.active = None;
                true
            }
            _ => false,
        }
    }

    fn take_due(&mut self, task: TaskId, now: Instant) -> bool {
        match &mut self.active {
            Some(r) if r.id == task && now >= r.deadline => {
                r.deadline = advance(r.deadline, self.period, now);
                true
            }
            _ => false,
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.active.as_ref().map(|r| r.deadline)
    }
}

/// Paced to a display refresh rate. Ticks stop while the host is hidden
/// and pick up again from the moment it is shown, without catching up.
#[derive(Debug)]
pub struct FrameScheduler {
    frame: Duration,
    visible: bool,
    resync: bool,
    next_id: u64,
    active: Option<Recurring>,
}

impl FrameScheduler {
    pub fn new(refresh_hz: u32) -> Self {
        FrameScheduler {
            frame: Duration::from_secs(1) / refresh_hz.max(1),
            visible: true,
            resync: false,
            next_id: 0,
            active: None,
        }
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame
    }
}

impl Scheduler for FrameScheduler {
    fn schedule_recurring(&mut self, now: Instant) -> TaskId {
        self.next_id += 1;
        let id = TaskId(self.next_id);
        // draw on the next frame, which is now
        self.active = Some(Recurring { id, deadline: now });
        self.resync = false;
        id
    }

    fn cancel(&mut self, task: TaskId) -> bool {
        match &self.active {
            Some(r) if r.id == task => {
                self.active = None;
                true
            }
            _ => false,
        }
    }

    fn take_due(&mut self, task: TaskId, now: Instant) -> bool {
        if !self.visible {
            return false;
        }
        let resync = std::mem::replace(&mut self.resync, false);
        match &mut self.active {
            Some(r) if r.id == task && resync => {
                r.deadline = now + self.frame;
                true
            }
            Some(r) if r.id == task && now >= r.deadline => {
                r.deadline = advance(r.deadline, self.frame, now);
                true
            }
            _ => false,
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        if self.visible {
            self.active.as_ref().map(|r| r.deadline)
        } else {
            None
        }
    }

    fn set_visible(&mut self, visible: bool) {
        if visible && !self.visible {
            self.resync = true;
        }
        log::debug!("display {}", if visible { "visible" } else { "hidden" });
        self.visible = visible;
    }
}
