//! Timed playback of a frame batch.
//!
//! Seeding a non-empty batch starts one repeating timer. Every tick publishes
//! the next queued frame as the current frame; the tick that drains the queue
//! publishes the last frame and then stops the timer.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::debug;

use crate::clock::{Clock, TimerGuard};
use crate::frame::Frame;
use crate::published::Published;
use crate::queue::FrameQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Animating,
}

struct Inner {
    clock: Rc<dyn Clock>,
    interval_ms: u32,
    queue: RefCell<FrameQueue>,
    timer: RefCell<Option<TimerGuard>>,
    state: Published<PlaybackState>,
    current: Published<Option<Frame>>,
}

/// Drains a [`FrameQueue`] into the current-frame cell at a fixed cadence.
pub struct PlaybackScheduler {
    inner: Rc<Inner>,
}

impl PlaybackScheduler {
    pub fn new(clock: Rc<dyn Clock>, interval_ms: u32, current: Published<Option<Frame>>) -> Self {
        Self {
            inner: Rc::new(Inner {
                clock,
                interval_ms,
                queue: RefCell::new(FrameQueue::new()),
                timer: RefCell::new(None),
                state: Published::new("playback state", PlaybackState::Idle),
                current,
            }),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.state.get()
    }

    pub fn state_cell(&self) -> Published<PlaybackState> {
        self.inner.state.clone()
    }

    pub fn is_animating(&self) -> bool {
        self.state() == PlaybackState::Animating
    }

    /// Frames still waiting to be shown.
    pub fn queued(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Replaces the queue with `frames` and makes sure the timer runs.
    ///
    /// An empty batch is ignored: the queue is left alone and no timer starts.
    /// Returns whether playback was (re)started.
    pub fn seed(&self, frames: Vec<Frame>) -> bool {
        if frames.is_empty() {
            debug!("ignoring empty frame batch");
            return false;
        }
        if self.inner.state.is_sealed() {
            return false;
        }
        debug!("seeding playback with {} frames", frames.len());
        self.inner.queue.borrow_mut().replace(frames);

        // At most one timer per scheduler.
        if self.inner.timer.borrow().is_none() {
            let weak = Rc::downgrade(&self.inner);
            let guard = self
                .inner
                .clock
                .every(self.inner.interval_ms, Box::new(move || tick(&weak)));
            *self.inner.timer.borrow_mut() = Some(guard);
        }
        self.inner.state.set(PlaybackState::Animating);
        true
    }

    /// Cancels the timer and drops any queued frames.
    pub fn stop(&self) {
        let timer = self.inner.timer.borrow_mut().take();
        drop(timer);
        self.inner.queue.borrow_mut().clear();
        self.inner.state.set(PlaybackState::Idle);
    }

    /// Stops for good; later seeds are refused.
    pub fn dispose(&self) {
        self.stop();
        self.inner.state.seal();
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        let timer = self.inner.timer.borrow_mut().take();
        drop(timer);
    }
}

fn tick(weak: &Weak<Inner>) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let (frame, drained) = {
        let mut queue = inner.queue.borrow_mut();
        let frame = queue.take_next();
        (frame, queue.is_empty())
    };
    if let Some(frame) = frame {
        inner.current.set(Some(frame));
    }
    if drained {
        let timer = inner.timer.borrow_mut().take();
        drop(timer);
        inner.state.set(PlaybackState::Idle);
        debug!("playback finished");
    }
}
