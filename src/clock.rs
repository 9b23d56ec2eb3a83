//! Timer primitives used by the playback, polling and frame loops.
//!
//! All loops obtain their timers from a [`Clock`] so the same code runs on
//! browser timers (see `web::BrowserClock`) and on [`ManualClock`], a
//! deterministic clock advanced by hand in headless hosts and tests.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Source of repeating and refresh-synchronized timers.
pub trait Clock {
    /// Calls `tick` every `period_ms` until the returned guard is dropped.
    fn every(&self, period_ms: u32, tick: Box<dyn FnMut()>) -> TimerGuard;

    /// Calls `callback` once, on the next display refresh.
    fn next_refresh(&self, callback: Box<dyn FnOnce()>) -> TimerGuard;
}

/// Owned timer registration; dropping it cancels the timer.
pub struct TimerGuard {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl TimerGuard {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Cancels now. Same as dropping, but reads better at call sites.
    pub fn cancel(self) {}
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

enum Callback {
    Repeating(Box<dyn FnMut()>),
    Once(Box<dyn FnOnce()>),
}

struct Entry {
    due: u64,
    period: u64,
    // `None` while the callback is running.
    callback: Option<Callback>,
}

#[derive(Default)]
struct ManualInner {
    now: u64,
    next_id: u64,
    entries: BTreeMap<u64, Entry>,
}

/// Deterministic clock: nothing fires until [`ManualClock::advance`] is called.
///
/// Timers fire in due-time order; ties fire in registration order. Callbacks
/// may register or cancel timers (including their own) while running.
#[derive(Clone)]
pub struct ManualClock {
    inner: Rc<RefCell<ManualInner>>,
    refresh_ms: u64,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(16)
    }
}

impl ManualClock {
    /// `refresh_ms` is the simulated display refresh period.
    pub fn new(refresh_ms: u32) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ManualInner::default())),
            refresh_ms: u64::from(refresh_ms.max(1)),
        }
    }

    pub fn now(&self) -> u64 {
        self.inner.borrow().now
    }

    /// Number of live timer registrations.
    pub fn pending_timers(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Moves time forward by `ms`, firing every timer that falls due on the way.
    pub fn advance(&self, ms: u64) {
        let target = self.now() + ms;
        while let Some((id, due, callback)) = self.take_due(target) {
            match callback {
                Callback::Repeating(mut tick) => {
                    tick();
                    let mut inner = self.inner.borrow_mut();
                    // Only re-arm if the callback did not cancel its own timer.
                    if let Some(entry) = inner.entries.get_mut(&id) {
                        entry.due = due + entry.period;
                        entry.callback = Some(Callback::Repeating(tick));
                    }
                }
                Callback::Once(callback) => {
                    self.inner.borrow_mut().entries.remove(&id);
                    callback();
                }
            }
        }
        self.inner.borrow_mut().now = target;
    }

    fn take_due(&self, target: u64) -> Option<(u64, u64, Callback)> {
        let mut inner = self.inner.borrow_mut();
        let (id, due) = inner
            .entries
            .iter()
            .filter(|(_, e)| e.callback.is_some() && e.due <= target)
            .map(|(id, e)| (*id, e.due))
            .min_by_key(|(id, due)| (*due, *id))?;
        inner.now = due;
        let callback = inner.entries.get_mut(&id)?.callback.take()?;
        Some((id, due, callback))
    }

    fn register(&self, delay: u64, period: u64, callback: Callback) -> TimerGuard {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            let due = inner.now + delay;
            inner.entries.insert(
                id,
                Entry {
                    due,
                    period,
                    callback: Some(callback),
                },
            );
            id
        };
        let weak = Rc::downgrade(&self.inner);
        TimerGuard::new(move || {
            if let Some(inner) = weak.upgrade() {
                // Take the entry out first so its closure drops after the borrow ends.
                let removed = inner.borrow_mut().entries.remove(&id);
                drop(removed);
            }
        })
    }
}

impl Clock for ManualClock {
    fn every(&self, period_ms: u32, tick: Box<dyn FnMut()>) -> TimerGuard {
        let period = u64::from(period_ms.max(1));
        self.register(period, period, Callback::Repeating(tick))
    }

    fn next_refresh(&self, callback: Box<dyn FnOnce()>) -> TimerGuard {
        self.register(self.refresh_ms, 0, Callback::Once(callback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn interval_fires_once_per_period() {
        let clock = ManualClock::default();
        let hits = Rc::new(RefCell::new(Vec::new()));
        let (c, h) = (clock.clone(), hits.clone());
        let _guard = clock.every(500, Box::new(move || h.borrow_mut().push(c.now())));

        clock.advance(499);
        assert!(hits.borrow().is_empty());
        clock.advance(1_001);
        assert_eq!(*hits.borrow(), vec![500, 1000, 1500]);
    }

    #[test]
    fn dropping_guard_cancels() {
        let clock = ManualClock::default();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let guard = clock.every(100, Box::new(move || c.set(c.get() + 1)));
        clock.advance(250);
        guard.cancel();
        clock.advance(1_000);
        assert_eq!(count.get(), 2);
        assert_eq!(clock.pending_timers(), 0);
    }

    #[test]
    fn callback_can_cancel_its_own_timer() {
        let clock = ManualClock::default();
        let slot: Rc<RefCell<Option<TimerGuard>>> = Rc::new(RefCell::new(None));
        let count = Rc::new(Cell::new(0));
        let (s, c) = (slot.clone(), count.clone());
        let guard = clock.every(
            10,
            Box::new(move || {
                c.set(c.get() + 1);
                if c.get() == 3 {
                    s.borrow_mut().take();
                }
            }),
        );
        *slot.borrow_mut() = Some(guard);
        clock.advance(100);
        assert_eq!(count.get(), 3);
        assert_eq!(clock.pending_timers(), 0);
    }

    #[test]
    fn refresh_is_one_shot() {
        let clock = ManualClock::new(16);
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let _guard = clock.next_refresh(Box::new(move || c.set(c.get() + 1)));
        clock.advance(100);
        assert_eq!(count.get(), 1);
        assert_eq!(clock.pending_timers(), 0);
    }
}
