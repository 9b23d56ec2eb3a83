#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use futures::channel::oneshot;
use futures::executor::LocalPool;
use futures::future::{self, FutureExt, LocalBoxFuture};
use replay_view::{
    Controller, ControllerConfig, ControllerDeps, Frame, ManualClock, Method, Transport,
    TransportError,
};
use serde_json::{json, Value};

/// Canned response for one request.
#[derive(Clone, Debug)]
pub enum Reply {
    Json(Value),
    Bytes(Vec<u8>),
    Ack,
    Status(u16),
}

/// Transport that answers from per-path scripts and records every call.
///
/// Lookup order: an open gate, then the next queued reply, then the sticky
/// reply for the path, otherwise 404.
#[derive(Default)]
pub struct FakeTransport {
    queued: RefCell<HashMap<String, VecDeque<Reply>>>,
    sticky: RefCell<HashMap<String, Reply>>,
    gates: RefCell<HashMap<String, oneshot::Receiver<Reply>>>,
    calls: RefCell<Vec<(Method, String)>>,
}

impl FakeTransport {
    pub fn push(&self, path: &str, reply: Reply) {
        self.queued
            .borrow_mut()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn always(&self, path: &str, reply: Reply) {
        self.sticky.borrow_mut().insert(path.to_string(), reply);
    }

    /// The next request to `path` stays in flight until the sender fires.
    pub fn gate(&self, path: &str) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.gates.borrow_mut().insert(path.to_string(), rx);
        tx
    }

    pub fn calls(&self) -> Vec<(Method, String)> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, path: &str) -> usize {
        self.calls.borrow().iter().filter(|(_, p)| p == path).count()
    }

    fn answer(&self, path: &str, method: Method) -> LocalBoxFuture<'static, Reply> {
        self.calls.borrow_mut().push((method, path.to_string()));
        if let Some(rx) = self.gates.borrow_mut().remove(path) {
            return rx.map(|r| r.unwrap_or(Reply::Status(499))).boxed_local();
        }
        let queued = self
            .queued
            .borrow_mut()
            .get_mut(path)
            .and_then(|q| q.pop_front());
        let reply = queued
            .or_else(|| self.sticky.borrow().get(path).cloned())
            .unwrap_or(Reply::Status(404));
        future::ready(reply).boxed_local()
    }
}

impl Transport for FakeTransport {
    fn fetch_json(
        &self,
        path: &str,
        method: Method,
    ) -> LocalBoxFuture<'static, Result<Value, TransportError>> {
        let endpoint = path.to_string();
        self.answer(path, method)
            .map(move |reply| match reply {
                Reply::Json(value) => Ok(value),
                Reply::Status(code) => Err(TransportError::status(&endpoint, code)),
                other => Err(TransportError::decode(&endpoint, format!("{:?}", other))),
            })
            .boxed_local()
    }

    fn fetch_binary(&self, path: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, TransportError>> {
        let endpoint = path.to_string();
        self.answer(path, Method::Get)
            .map(move |reply| match reply {
                Reply::Bytes(bytes) => Ok(bytes),
                Reply::Status(code) => Err(TransportError::status(&endpoint, code)),
                other => Err(TransportError::decode(&endpoint, format!("{:?}", other))),
            })
            .boxed_local()
    }

    fn send(
        &self,
        path: &str,
        method: Method,
    ) -> LocalBoxFuture<'static, Result<(), TransportError>> {
        let endpoint = path.to_string();
        self.answer(path, method)
            .map(move |reply| match reply {
                Reply::Status(code) => Err(TransportError::status(&endpoint, code)),
                _ => Ok(()),
            })
            .boxed_local()
    }
}

/// Fake clock, single-threaded executor and scripted backend.
pub struct Harness {
    pub clock: ManualClock,
    pub pool: LocalPool,
    pub transport: Rc<FakeTransport>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            clock: ManualClock::new(16),
            pool: LocalPool::new(),
            transport: Rc::new(FakeTransport::default()),
        }
    }

    pub fn controller(&self, config: ControllerConfig) -> Controller {
        Controller::new(
            config,
            ControllerDeps {
                transport: self.transport.clone(),
                clock: Rc::new(self.clock.clone()),
                spawner: Rc::new(self.pool.spawner()),
            },
        )
    }

    /// Runs every ready task.
    pub fn settle(&mut self) {
        self.pool.run_until_stalled();
    }

    /// Advances one millisecond at a time, letting tasks run in between.
    pub fn advance(&mut self, ms: u64) {
        for _ in 0..ms {
            self.clock.advance(1);
            self.pool.run_until_stalled();
        }
    }
}

pub fn png(payload: &str) -> Frame {
    Frame::encoded("png", payload)
}

pub fn batch(frames: &[&str]) -> Reply {
    Reply::Json(json!({ "frames": frames }))
}

pub fn snapshot(frame: &str, current: usize, total: usize) -> Reply {
    Reply::Json(json!({ "frame": frame, "currentExample": current, "totalExamples": total }))
}

pub fn game_state(current_problem: usize, game_over: bool, animating: bool) -> Reply {
    Reply::Json(json!({
        "current_problem": current_problem,
        "game_over": game_over,
        "animating": animating,
    }))
}
