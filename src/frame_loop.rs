//! Refresh-driven raw frame streaming for the canvas variant.
//!
//! On every display refresh one raw RGBA frame is fetched and painted. The next
//! refresh is requested once that fetch settles, successful or not, so at most
//! one frame request is in flight and a failed fetch leaves the last good frame
//! on screen.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use futures::future::{abortable, AbortHandle};
use futures::task::{LocalSpawn, LocalSpawnExt};
use log::{debug, error, warn};

use crate::clock::{Clock, TimerGuard};
use crate::frame::{Frame, RawFrame};
use crate::polling::Backoff;
use crate::published::Published;
use crate::transport::Transport;

/// A persistent pixel surface, e.g. a 2D canvas.
pub trait PixelSurface {
    fn paint(&self, frame: &RawFrame);
}

struct Inner {
    clock: Rc<dyn Clock>,
    spawner: Rc<dyn LocalSpawn>,
    transport: Rc<dyn Transport>,
    path: String,
    width: u32,
    height: u32,
    surface: RefCell<Option<Rc<dyn PixelSurface>>>,
    current: Published<Option<Frame>>,
    running: Cell<bool>,
    pending: RefCell<Option<TimerGuard>>,
    in_flight: RefCell<Option<AbortHandle>>,
    backoff: RefCell<Backoff>,
}

pub struct ContinuousFrameLoop {
    inner: Rc<Inner>,
}

impl ContinuousFrameLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: Rc<dyn Clock>,
        spawner: Rc<dyn LocalSpawn>,
        transport: Rc<dyn Transport>,
        path: &str,
        width: u32,
        height: u32,
        current: Published<Option<Frame>>,
        backoff_cap: u32,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                clock,
                spawner,
                transport,
                path: path.to_string(),
                width,
                height,
                surface: RefCell::new(None),
                current,
                running: Cell::new(false),
                pending: RefCell::new(None),
                in_flight: RefCell::new(None),
                backoff: RefCell::new(Backoff::new(backoff_cap)),
            }),
        }
    }

    /// Frames are still published without a surface; they are painted once one is attached.
    pub fn attach_surface(&self, surface: Rc<dyn PixelSurface>) {
        *self.inner.surface.borrow_mut() = Some(surface);
    }

    pub fn detach_surface(&self) {
        self.inner.surface.borrow_mut().take();
    }

    pub fn start(&self) {
        if self.inner.running.replace(true) {
            return;
        }
        debug!("frame loop started for {}", self.inner.path);
        schedule(&self.inner);
    }

    pub fn stop(&self) {
        self.inner.running.set(false);
        let pending = self.inner.pending.borrow_mut().take();
        drop(pending);
        if let Some(handle) = self.inner.in_flight.borrow_mut().take() {
            handle.abort();
        }
        self.inner.backoff.borrow_mut().reset();
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }
}

impl Drop for ContinuousFrameLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn schedule(inner: &Rc<Inner>) {
    let weak = Rc::downgrade(inner);
    let guard = inner
        .clock
        .next_refresh(Box::new(move || on_refresh(&weak)));
    *inner.pending.borrow_mut() = Some(guard);
}

fn on_refresh(weak: &Weak<Inner>) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    if !inner.running.get() {
        return;
    }
    if inner.backoff.borrow_mut().should_skip() {
        schedule(&inner);
        return;
    }

    let (request, handle) = abortable(inner.transport.fetch_binary(&inner.path));
    *inner.in_flight.borrow_mut() = Some(handle);

    let weak = weak.clone();
    let spawned = inner.spawner.spawn_local(async move {
        let Ok(result) = request.await else {
            return;
        };
        let Some(inner) = weak.upgrade() else {
            return;
        };
        inner.in_flight.borrow_mut().take();
        match result {
            Ok(bytes) => match RawFrame::new(inner.width, inner.height, bytes) {
                Ok(frame) => {
                    inner.backoff.borrow_mut().record_success();
                    paint(&inner, frame);
                }
                Err(err) => {
                    inner.backoff.borrow_mut().record_failure();
                    warn!("Error decoding frame: {}", err);
                }
            },
            Err(err) => {
                inner.backoff.borrow_mut().record_failure();
                warn!("Error fetching frame: {}", err);
            }
        }
        if inner.running.get() {
            schedule(&inner);
        }
    });
    if let Err(err) = spawned {
        inner.in_flight.borrow_mut().take();
        error!("could not spawn frame fetch: {}", err);
        schedule(&inner);
    }
}

fn paint(inner: &Inner, frame: RawFrame) {
    let surface = inner.surface.borrow().clone();
    if let Some(surface) = surface {
        surface.paint(&frame);
    }
    inner.current.set(Some(Frame::Raw(frame)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::transport::{Method, TransportError};
    use futures::executor::LocalPool;
    use futures::future::{self, FutureExt, LocalBoxFuture};

    /// Serves frames whose every byte is the request number; request 1 fails.
    struct Counter {
        calls: Cell<u8>,
    }

    impl Transport for Counter {
        fn fetch_json(
            &self,
            path: &str,
            _method: Method,
        ) -> LocalBoxFuture<'static, Result<serde_json::Value, TransportError>> {
            future::ready(Err(TransportError::status(path, 404))).boxed_local()
        }

        fn fetch_binary(
            &self,
            path: &str,
        ) -> LocalBoxFuture<'static, Result<Vec<u8>, TransportError>> {
            let n = self.calls.get();
            self.calls.set(n + 1);
            let result = if n == 1 {
                Err(TransportError::network(path, "reset"))
            } else {
                Ok(vec![n; 2 * 2 * 4])
            };
            future::ready(result).boxed_local()
        }

        fn send(
            &self,
            path: &str,
            _method: Method,
        ) -> LocalBoxFuture<'static, Result<(), TransportError>> {
            future::ready(Err(TransportError::status(path, 404))).boxed_local()
        }
    }

    struct Recorder {
        painted: RefCell<Vec<u8>>,
    }

    impl PixelSurface for Recorder {
        fn paint(&self, frame: &RawFrame) {
            self.painted.borrow_mut().push(frame.pixels()[0]);
        }
    }

    #[test]
    fn keeps_streaming_across_failures_and_stops_cleanly() {
        let clock = ManualClock::new(16);
        let mut pool = LocalPool::new();
        let transport = Rc::new(Counter { calls: Cell::new(0) });
        let current = Published::new("current frame", None);
        let surface = Rc::new(Recorder {
            painted: RefCell::new(Vec::new()),
        });
        let frame_loop = ContinuousFrameLoop::new(
            Rc::new(clock.clone()),
            Rc::new(pool.spawner()),
            transport.clone(),
            "/frame",
            2,
            2,
            current.clone(),
            0,
        );
        frame_loop.attach_surface(surface.clone());
        frame_loop.start();

        for _ in 0..3 {
            clock.advance(16);
            pool.run_until_stalled();
        }
        // Request 1 failed; the surface kept frame 0 and the loop carried on.
        assert_eq!(*surface.painted.borrow(), vec![0, 2]);
        assert_eq!(current.get().and_then(|f| f.as_raw().map(|r| r.pixels()[0])), Some(2));

        frame_loop.stop();
        clock.advance(1_000);
        pool.run_until_stalled();
        assert_eq!(transport.calls.get(), 3);
        assert_eq!(clock.pending_timers(), 0);
    }
}
