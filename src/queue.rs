//! FIFO of frames waiting to be played back.

use std::collections::VecDeque;

use crate::frame::Frame;

/// Ordered, finite sequence of pending frames. Insertion order is playback order.
///
/// A new batch always replaces the queue wholesale; there is no append.
#[derive(Debug, Default)]
pub struct FrameQueue {
    frames: VecDeque<Frame>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards whatever is still queued and installs `frames`.
    pub fn replace<I>(&mut self, frames: I)
    where
        I: IntoIterator<Item = Frame>,
    {
        self.frames.clear();
        self.frames.extend(frames);
    }

    /// Pops the head, or `None` when nothing is left.
    pub fn take_next(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
