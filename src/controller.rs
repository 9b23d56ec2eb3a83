//! Orchestrates user actions, playback and state sync for one view.
//!
//! A [`Controller`] owns every piece of mutable state the view reads: the
//! current frame, the mirrored server state and the playback state. Actions
//! fetch from the backend on a spawned task and apply the response when it
//! lands; failures are logged and leave the published state untouched.
//!
//! Lifecycle: [`Controller::mount`] fetches the initial frame and starts the
//! state feed and frame loop the configuration asks for; [`Controller::dispose`]
//! cancels every timer and in-flight request, then seals the published cells.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures::future::{abortable, AbortHandle};
use futures::task::{LocalSpawn, LocalSpawnExt};
use log::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::{ControllerConfig, Endpoints};
use crate::frame::Frame;
use crate::frame_loop::{ContinuousFrameLoop, PixelSurface};
use crate::playback::{PlaybackScheduler, PlaybackState};
use crate::polling::{HttpStateSource, PollingLoop, StateFeed};
use crate::published::{ListenerId, Published};
use crate::state::{BatchResponse, ServerState, SnapshotResponse};
use crate::transport::{decode_json, Method, Transport};

/// Collaborators injected into a controller.
#[derive(Clone)]
pub struct ControllerDeps {
    pub transport: Rc<dyn Transport>,
    pub clock: Rc<dyn Clock>,
    pub spawner: Rc<dyn LocalSpawn>,
}

/// Abort handles of the controller's in-flight requests.
#[derive(Default)]
struct TaskSet {
    next_id: u64,
    handles: HashMap<u64, AbortHandle>,
}

impl TaskSet {
    fn insert(&mut self, handle: AbortHandle) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.handles.insert(id, handle);
        id
    }

    fn remove(&mut self, id: u64) {
        self.handles.remove(&id);
    }

    fn abort_all(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }
}

struct Inner {
    config: ControllerConfig,
    endpoints: Endpoints,
    transport: Rc<dyn Transport>,
    spawner: Rc<dyn LocalSpawn>,
    current_frame: Published<Option<Frame>>,
    server_state: Published<ServerState>,
    playback: PlaybackScheduler,
    state_feed: Option<Box<dyn StateFeed>>,
    frame_loop: Option<ContinuousFrameLoop>,
    tasks: RefCell<TaskSet>,
    batch_pending: Cell<bool>,
    advance_pending: Cell<bool>,
    mounted: Cell<bool>,
    disposed: Cell<bool>,
}

/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Controller {
    inner: Rc<Inner>,
}

impl Controller {
    pub fn new(config: ControllerConfig, deps: ControllerDeps) -> Self {
        let endpoints = config.endpoints();
        let current_frame = Published::new("current frame", None);
        let server_state = Published::new(
            "server state",
            ServerState::initial(config.default_total_steps),
        );
        let playback = PlaybackScheduler::new(
            deps.clock.clone(),
            config.playback_interval_ms,
            current_frame.clone(),
        );

        let state_feed = endpoints.state.as_deref().map(|path| {
            let source = Rc::new(HttpStateSource::new(
                deps.transport.clone(),
                path,
                config.last_problem_index,
            ));
            Box::new(PollingLoop::new(
                deps.clock.clone(),
                deps.spawner.clone(),
                source,
                server_state.clone(),
                config.poll_interval_ms,
                config.backoff_cap,
            )) as Box<dyn StateFeed>
        });

        let frame_loop = endpoints.frame.as_deref().map(|path| {
            ContinuousFrameLoop::new(
                deps.clock.clone(),
                deps.spawner.clone(),
                deps.transport.clone(),
                path,
                config.surface_width,
                config.surface_height,
                current_frame.clone(),
                config.backoff_cap,
            )
        });

        Self {
            inner: Rc::new(Inner {
                config,
                endpoints,
                transport: deps.transport,
                spawner: deps.spawner,
                current_frame,
                server_state,
                playback,
                state_feed,
                frame_loop,
                tasks: RefCell::new(TaskSet::default()),
                batch_pending: Cell::new(false),
                advance_pending: Cell::new(false),
                mounted: Cell::new(false),
                disposed: Cell::new(false),
            }),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Fetches the initial frame and starts the configured loops. Runs once.
    pub fn mount(&self) {
        if self.inner.disposed.get() || self.inner.mounted.replace(true) {
            return;
        }
        info!("mounting {:?} controller", self.inner.config.variant);
        self.init();
        if let Some(feed) = &self.inner.state_feed {
            feed.start();
        }
        if let Some(frame_loop) = &self.inner.frame_loop {
            frame_loop.start();
        }
    }

    /// Cancels every timer and request, then freezes the published state.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.playback.dispose();
        if let Some(feed) = &self.inner.state_feed {
            feed.stop();
        }
        if let Some(frame_loop) = &self.inner.frame_loop {
            frame_loop.stop();
            frame_loop.detach_surface();
        }
        self.inner.tasks.borrow_mut().abort_all();
        self.inner.current_frame.seal();
        self.inner.server_state.seal();
        info!("controller disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    pub fn attach_surface(&self, surface: Rc<dyn PixelSurface>) {
        if let Some(frame_loop) = &self.inner.frame_loop {
            frame_loop.attach_surface(surface);
        }
    }

    // ── Actions ──────────────────────────────────────────────────────────────

    /// Loads the initial frame and progress. Returns whether a request was issued.
    pub fn init(&self) -> bool {
        let Some(path) = self.inner.endpoints.init.clone() else {
            return false;
        };
        if self.inner.disposed.get() {
            return false;
        }
        let request = self.inner.transport.fetch_json(&path, Method::Get);
        let weak = Rc::downgrade(&self.inner);
        self.spawn("init", async move {
            let result = request.await.and_then(|v| decode_json::<SnapshotResponse>(&path, v));
            let Some(inner) = weak.upgrade() else {
                return;
            };
            match result {
                Ok(snapshot) => apply_snapshot(&inner, snapshot),
                Err(err) => warn!("Error loading initial frame: {}", err),
            }
        })
    }

    /// Fetches a frame batch and plays it back.
    ///
    /// Rejected while animating or while a batch or advance request is still
    /// in flight, so two responses never race over the current frame.
    pub fn solve_or_start(&self) -> bool {
        let Some(path) = self.inner.endpoints.batch.clone() else {
            return false;
        };
        if !self.can_solve()
            || self.inner.batch_pending.get()
            || self.inner.advance_pending.get()
        {
            debug!("batch request rejected");
            return false;
        }
        self.inner.batch_pending.set(true);
        let request = self.inner.transport.fetch_json(&path, Method::Get);
        let weak = Rc::downgrade(&self.inner);
        let spawned = self.spawn("batch", async move {
            let result = request.await.and_then(|v| decode_json::<BatchResponse>(&path, v));
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.batch_pending.set(false);
            match result {
                Ok(batch) => {
                    let format = inner.config.image_format.clone();
                    let frames: Vec<Frame> = batch
                        .frames
                        .into_iter()
                        .map(|payload| Frame::encoded(&format, payload))
                        .collect();
                    if !inner.playback.seed(frames) {
                        info!("{} returned no frames", path);
                    }
                }
                Err(err) => warn!("Error fetching animation frames: {}", err),
            }
        });
        if !spawned {
            self.inner.batch_pending.set(false);
        }
        spawned
    }

    /// Steps to the next example, bypassing the queue.
    ///
    /// Rejected while animating and once the last example is showing.
    pub fn advance(&self) -> bool {
        let Some(path) = self.inner.endpoints.advance.clone() else {
            return false;
        };
        if !self.can_advance() || self.inner.advance_pending.get() {
            debug!("advance rejected");
            return false;
        }
        self.inner.advance_pending.set(true);
        let request = self.inner.transport.fetch_json(&path, Method::Get);
        let weak = Rc::downgrade(&self.inner);
        let spawned = self.spawn("advance", async move {
            let result = request.await.and_then(|v| decode_json::<SnapshotResponse>(&path, v));
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.advance_pending.set(false);
            match result {
                Ok(snapshot) => apply_snapshot(&inner, snapshot),
                Err(err) => warn!("Error advancing: {}", err),
            }
        });
        if !spawned {
            self.inner.advance_pending.set(false);
        }
        spawned
    }

    /// Asks the server to start (canvas variant). The effect arrives via polling.
    pub fn start_command(&self) -> bool {
        let allowed = self.can_start_command();
        self.command(self.inner.endpoints.start_command.clone(), allowed, "start")
    }

    /// Asks the server for the next problem (canvas variant).
    pub fn next_command(&self) -> bool {
        let allowed = self.can_next_command();
        self.command(self.inner.endpoints.next_command.clone(), allowed, "next")
    }

    fn command(&self, path: Option<String>, allowed: bool, label: &'static str) -> bool {
        let Some(path) = path else {
            return false;
        };
        if !allowed {
            debug!("{} command rejected", label);
            return false;
        }
        let request = self.inner.transport.send(&path, Method::Post);
        self.spawn(label, async move {
            if let Err(err) = request.await {
                warn!("Error sending {} command: {}", label, err);
            }
        })
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn current_frame(&self) -> Option<Frame> {
        self.inner.current_frame.get()
    }

    pub fn server_state(&self) -> ServerState {
        self.inner.server_state.get()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.inner.playback.state()
    }

    pub fn is_animating(&self) -> bool {
        self.inner.playback.is_animating()
    }

    pub fn can_solve(&self) -> bool {
        self.inner.endpoints.batch.is_some()
            && !self.inner.disposed.get()
            && !self.inner.playback.is_animating()
    }

    pub fn can_advance(&self) -> bool {
        self.inner.endpoints.advance.is_some()
            && !self.inner.disposed.get()
            && !self.inner.playback.is_animating()
            && !self.inner.server_state.with(ServerState::is_last_step)
    }

    pub fn can_start_command(&self) -> bool {
        self.inner.endpoints.start_command.is_some()
            && !self.inner.disposed.get()
            && self.inner.server_state.with(ServerState::can_start)
    }

    pub fn can_next_command(&self) -> bool {
        self.inner.endpoints.next_command.is_some()
            && !self.inner.disposed.get()
            && self.inner.server_state.with(ServerState::can_next)
    }

    /// Calls `listener` whenever anything the view reads changes.
    pub fn subscribe(&self, listener: impl Fn() + 'static) -> Subscription {
        let listener: Rc<dyn Fn()> = Rc::new(listener);
        let (l1, l2, l3) = (listener.clone(), listener.clone(), listener);
        let playback = self.inner.playback.state_cell();
        Subscription {
            frame: self.inner.current_frame.subscribe(move || l1()),
            state: self.inner.server_state.subscribe(move || l2()),
            playback: playback.subscribe(move || l3()),
            controller: Rc::downgrade(&self.inner),
        }
    }

    fn spawn(&self, label: &'static str, task: impl Future<Output = ()> + 'static) -> bool {
        let (task, handle) = abortable(task);
        let id = self.inner.tasks.borrow_mut().insert(handle);
        let weak = Rc::downgrade(&self.inner);
        let spawned = self.inner.spawner.spawn_local(async move {
            let _ = task.await;
            if let Some(inner) = weak.upgrade() {
                inner.tasks.borrow_mut().remove(id);
            }
        });
        match spawned {
            Ok(()) => true,
            Err(err) => {
                self.inner.tasks.borrow_mut().remove(id);
                error!("could not spawn {} request: {}", label, err);
                false
            }
        }
    }
}

/// Listener registration returned by [`Controller::subscribe`]; dropping it unsubscribes.
pub struct Subscription {
    frame: ListenerId,
    state: ListenerId,
    playback: ListenerId,
    controller: Weak<Inner>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.controller.upgrade() {
            inner.current_frame.unsubscribe(self.frame);
            inner.server_state.unsubscribe(self.state);
            inner.playback.state_cell().unsubscribe(self.playback);
        }
    }
}

fn apply_snapshot(inner: &Inner, snapshot: SnapshotResponse) {
    // A late init or advance response must not interleave with a playing batch.
    if inner.playback.is_animating() {
        info!("dropping snapshot that arrived during playback");
        return;
    }
    let state = ServerState::from_snapshot(&snapshot, inner.config.default_total_steps);
    let frame = Frame::encoded(&inner.config.image_format, snapshot.frame);
    inner.current_frame.set(Some(frame));
    inner.server_state.set(state);
}
