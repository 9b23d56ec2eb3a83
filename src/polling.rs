//! Keeps the local [`ServerState`] mirror in sync with the backend.
//!
//! The controller only sees a [`StateFeed`]. [`PollingLoop`] is the feed used
//! today: it re-fetches state on a fixed cadence through a [`StateSource`]. A
//! push-based feed (server-sent events, websocket) can replace it without
//! touching playback or the controller.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use futures::future::{abortable, AbortHandle, FutureExt, LocalBoxFuture};
use futures::task::{LocalSpawn, LocalSpawnExt};
use log::{debug, error, warn};

use crate::clock::{Clock, TimerGuard};
use crate::published::Published;
use crate::state::{ServerState, StateResponse};
use crate::transport::{decode_json, Method, Transport, TransportError};

/// Something that keeps a published [`ServerState`] current while running.
pub trait StateFeed {
    fn start(&self);
    fn stop(&self);
    fn is_running(&self) -> bool;
}

/// One-shot read of the authoritative state.
pub trait StateSource {
    fn fetch_state(&self) -> LocalBoxFuture<'static, Result<ServerState, TransportError>>;
}

/// Reads `{current_problem, game_over, animating}` from a JSON endpoint.
pub struct HttpStateSource {
    transport: Rc<dyn Transport>,
    path: String,
    last_problem_index: usize,
}

impl HttpStateSource {
    pub fn new(transport: Rc<dyn Transport>, path: &str, last_problem_index: usize) -> Self {
        Self {
            transport,
            path: path.to_string(),
            last_problem_index,
        }
    }
}

impl StateSource for HttpStateSource {
    fn fetch_state(&self) -> LocalBoxFuture<'static, Result<ServerState, TransportError>> {
        let request = self.transport.fetch_json(&self.path, Method::Get);
        let path = self.path.clone();
        let last = self.last_problem_index;
        async move {
            let value = request.await?;
            let response: StateResponse = decode_json(&path, value)?;
            Ok(ServerState::from_poll(&response, last))
        }
        .boxed_local()
    }
}

/// Exponential tick skipping after consecutive failures.
///
/// After the n-th failure in a row the next `min(2^(n-1), cap)` ticks are
/// skipped. A cap of zero never skips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    cap: u32,
    failures: u32,
    skip: u32,
}

impl Backoff {
    pub fn new(cap: u32) -> Self {
        Self {
            cap,
            failures: 0,
            skip: 0,
        }
    }

    /// Consumes one skip if any are pending.
    pub fn should_skip(&mut self) -> bool {
        if self.skip > 0 {
            self.skip -= 1;
            true
        } else {
            false
        }
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
        self.skip = 0;
    }

    pub fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
        if self.cap > 0 {
            let exp = 1u32.checked_shl(self.failures - 1).unwrap_or(u32::MAX);
            self.skip = exp.min(self.cap);
        }
    }

    pub fn reset(&mut self) {
        self.record_success();
    }
}

struct Inner {
    clock: Rc<dyn Clock>,
    spawner: Rc<dyn LocalSpawn>,
    source: Rc<dyn StateSource>,
    target: Published<ServerState>,
    interval_ms: u32,
    timer: RefCell<Option<TimerGuard>>,
    in_flight: RefCell<Option<AbortHandle>>,
    backoff: RefCell<Backoff>,
}

/// Fixed-cadence poller writing into a published [`ServerState`].
pub struct PollingLoop {
    inner: Rc<Inner>,
}

impl PollingLoop {
    pub fn new(
        clock: Rc<dyn Clock>,
        spawner: Rc<dyn LocalSpawn>,
        source: Rc<dyn StateSource>,
        target: Published<ServerState>,
        interval_ms: u32,
        backoff_cap: u32,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                clock,
                spawner,
                source,
                target,
                interval_ms,
                timer: RefCell::new(None),
                in_flight: RefCell::new(None),
                backoff: RefCell::new(Backoff::new(backoff_cap)),
            }),
        }
    }
}

impl StateFeed for PollingLoop {
    fn start(&self) {
        if self.is_running() {
            return;
        }
        let weak = Rc::downgrade(&self.inner);
        let guard = self
            .inner
            .clock
            .every(self.inner.interval_ms, Box::new(move || poll(&weak)));
        *self.inner.timer.borrow_mut() = Some(guard);
        debug!("state polling every {} ms", self.inner.interval_ms);
    }

    fn stop(&self) {
        let timer = self.inner.timer.borrow_mut().take();
        drop(timer);
        if let Some(handle) = self.inner.in_flight.borrow_mut().take() {
            handle.abort();
        }
        self.inner.backoff.borrow_mut().reset();
    }

    fn is_running(&self) -> bool {
        self.inner.timer.borrow().is_some()
    }
}

impl Drop for PollingLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn poll(weak: &Weak<Inner>) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    // A slow response must not be overtaken by a newer one.
    if inner.in_flight.borrow().is_some() {
        debug!("previous state poll still in flight, skipping tick");
        return;
    }
    if inner.backoff.borrow_mut().should_skip() {
        return;
    }

    let (request, handle) = abortable(inner.source.fetch_state());
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
            Ok(state) => {
                inner.backoff.borrow_mut().record_success();
                inner.target.set(state);
            }
            Err(err) => {
                inner.backoff.borrow_mut().record_failure();
                warn!("Error fetching state: {}", err);
            }
        }
    });
    if let Err(err) = spawned {
        inner.in_flight.borrow_mut().take();
        error!("could not spawn state poll: {}", err);
    }
}
