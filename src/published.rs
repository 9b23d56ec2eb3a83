//! Single-owner observable values.
//!
//! The controller publishes the current frame, the mirrored server state and
//! the playback state through [`Published`] cells. The view layer subscribes
//! to them to re-render. On teardown the owner seals each cell, after which
//! writes are dropped, so a callback that slipped past cancellation can never
//! mutate a disposed controller's state.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::debug;

type Listener = Rc<dyn Fn()>;

struct Inner<T> {
    value: RefCell<T>,
    listeners: RefCell<Vec<(u64, Listener)>>,
    next_listener: Cell<u64>,
    sealed: Cell<bool>,
    label: &'static str,
}

/// Shared handle to an observable value.
pub struct Published<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Published<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Token returned by [`Published::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

impl<T: Clone> Published<T> {
    pub fn new(label: &'static str, value: T) -> Self {
        Self {
            inner: Rc::new(Inner {
                value: RefCell::new(value),
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(0),
                sealed: Cell::new(false),
                label,
            }),
        }
    }

    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Reads without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Replaces the value and notifies listeners. Returns `false` once sealed.
    pub fn set(&self, value: T) -> bool {
        if self.inner.sealed.get() {
            debug!("dropping write to sealed {}", self.inner.label);
            return false;
        }
        *self.inner.value.borrow_mut() = value;
        self.notify();
        true
    }

    pub fn subscribe(&self, listener: impl Fn() + 'static) -> ListenerId {
        let id = self.inner.next_listener.get();
        self.inner.next_listener.set(id + 1);
        let listener: Listener = Rc::new(listener);
        self.inner.listeners.borrow_mut().push((id, listener));
        ListenerId(id)
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        self.inner
            .listeners
            .borrow_mut()
            .retain(|(lid, _)| *lid != id.0);
    }

    /// Freezes the value and drops all listeners.
    pub fn seal(&self) {
        self.inner.sealed.set(true);
        self.inner.listeners.borrow_mut().clear();
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.sealed.get()
    }

    fn notify(&self) {
        // Snapshot so listeners may subscribe or unsubscribe while being called.
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener();
        }
    }
}
