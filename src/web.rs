//! Browser bindings: fetch, timers, task spawning, canvas painting, logging.

use std::cell::RefCell;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use futures::task::{LocalFutureObj, LocalSpawn, SpawnError};
use gloo_timers::callback::{Interval, Timeout};
use log::{debug, warn, Level, LevelFilter, Log, Metadata, Record};
use wasm_bindgen::prelude::*;
use wasm_bindgen::{Clamped, JsCast};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    CanvasRenderingContext2d, HtmlCanvasElement, ImageData, Request, RequestInit, RequestMode,
    Response,
};
use yew::NodeRef;

use crate::clock::{Clock, TimerGuard};
use crate::config::{ControllerConfig, CONFIG_ELEMENT_ID};
use crate::controller::{Controller, ControllerDeps};
use crate::frame::RawFrame;
use crate::frame_loop::PixelSurface;
use crate::transport::{join_url, Method, Transport, TransportError};

// Fallback refresh period when requestAnimationFrame is unavailable.
const FALLBACK_REFRESH_MS: u32 = 16;

/// Controller wired to `window.fetch`, gloo timers and `spawn_local`.
pub fn browser_controller(config: ControllerConfig) -> Controller {
    let deps = ControllerDeps {
        transport: Rc::new(FetchTransport::new(&config.base_url)),
        clock: Rc::new(BrowserClock),
        spawner: Rc::new(BrowserSpawner),
    };
    Controller::new(config, deps)
}

/// Reads the JSON config embedded in the page, falling back to defaults.
pub fn load_page_config() -> ControllerConfig {
    let text = gloo_utils::document()
        .get_element_by_id(CONFIG_ELEMENT_ID)
        .and_then(|element| element.text_content());
    let Some(text) = text else {
        return ControllerConfig::default();
    };
    ControllerConfig::from_json(&text).unwrap_or_else(|err| {
        warn!("{}; using defaults", err);
        ControllerConfig::default()
    })
}

fn js_message(value: &JsValue) -> String {
    value
        .as_string()
        .unwrap_or_else(|| format!("{:?}", value))
}

// ──────────────────────────────────────────────────────────────────────────────
// Transport

#[derive(Clone)]
pub struct FetchTransport {
    base_url: Rc<str>,
}

impl FetchTransport {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: Rc::from(base_url),
        }
    }
}

async fn fetch(url: String, endpoint: &str, method: Method) -> Result<Response, TransportError> {
    let init = RequestInit::new();
    init.set_method(method.as_str());
    init.set_mode(RequestMode::Cors);
    let request = Request::new_with_str_and_init(&url, &init)
        .map_err(|e| TransportError::network(endpoint, js_message(&e)))?;
    let window = web_sys::window().ok_or_else(|| TransportError::network(endpoint, "no window"))?;
    let value = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(|e| TransportError::network(endpoint, js_message(&e)))?;
    let response: Response = value
        .dyn_into()
        .map_err(|_| TransportError::decode(endpoint, "fetch did not resolve to a Response"))?;
    if !response.ok() {
        return Err(TransportError::status(endpoint, response.status()));
    }
    Ok(response)
}

async fn body_text(response: &Response, endpoint: &str) -> Result<String, TransportError> {
    let promise = response
        .text()
        .map_err(|e| TransportError::decode(endpoint, js_message(&e)))?;
    let value = JsFuture::from(promise)
        .await
        .map_err(|e| TransportError::network(endpoint, js_message(&e)))?;
    value
        .as_string()
        .ok_or_else(|| TransportError::decode(endpoint, "body is not text"))
}

impl Transport for FetchTransport {
    fn fetch_json(
        &self,
        path: &str,
        method: Method,
    ) -> LocalBoxFuture<'static, Result<serde_json::Value, TransportError>> {
        let url = join_url(&self.base_url, path);
        let endpoint = path.to_string();
        async move {
            let response = fetch(url, &endpoint, method).await?;
            let text = body_text(&response, &endpoint).await?;
            serde_json::from_str(&text)
                .map_err(|e| TransportError::decode(&endpoint, e.to_string()))
        }
        .boxed_local()
    }

    fn fetch_binary(&self, path: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, TransportError>> {
        let url = join_url(&self.base_url, path);
        let endpoint = path.to_string();
        async move {
            let response = fetch(url, &endpoint, Method::Get).await?;
            let promise = response
                .array_buffer()
                .map_err(|e| TransportError::decode(&endpoint, js_message(&e)))?;
            let buffer = JsFuture::from(promise)
                .await
                .map_err(|e| TransportError::network(&endpoint, js_message(&e)))?;
            Ok(js_sys::Uint8Array::new(&buffer).to_vec())
        }
        .boxed_local()
    }

    fn send(
        &self,
        path: &str,
        method: Method,
    ) -> LocalBoxFuture<'static, Result<(), TransportError>> {
        let url = join_url(&self.base_url, path);
        let endpoint = path.to_string();
        async move {
            fetch(url, &endpoint, method).await?;
            Ok(())
        }
        .boxed_local()
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Timers and tasks

/// Drops `value` after the current callback has returned.
///
/// Cancelling a timer from inside its own callback would otherwise free the
/// closure that is still executing.
fn release_later<T: 'static>(value: T) {
    wasm_bindgen_futures::spawn_local(async move {
        drop(value);
    });
}

pub struct BrowserClock;

impl Clock for BrowserClock {
    fn every(&self, period_ms: u32, tick: Box<dyn FnMut()>) -> TimerGuard {
        let interval = Interval::new(period_ms, tick);
        TimerGuard::new(move || release_later(interval.cancel()))
    }

    fn next_refresh(&self, callback: Box<dyn FnOnce()>) -> TimerGuard {
        let slot = Rc::new(RefCell::new(Some(callback)));
        let fire = move || {
            let callback = slot.borrow_mut().take();
            if let Some(callback) = callback {
                callback();
            }
        };

        let Some(window) = web_sys::window() else {
            let timeout = Timeout::new(FALLBACK_REFRESH_MS, fire);
            return TimerGuard::new(move || release_later(timeout.cancel()));
        };
        let fire = Rc::new(fire);
        let raf_fire = fire.clone();
        let closure = Closure::<dyn FnMut(f64)>::new(move |_timestamp: f64| raf_fire());
        match window.request_animation_frame(closure.as_ref().unchecked_ref()) {
            Ok(id) => TimerGuard::new(move || {
                if let Err(err) = window.cancel_animation_frame(id) {
                    debug!("cancelAnimationFrame failed: {}", js_message(&err));
                }
                release_later(closure);
            }),
            Err(err) => {
                warn!("requestAnimationFrame failed: {}", js_message(&err));
                let timeout = Timeout::new(FALLBACK_REFRESH_MS, move || fire());
                TimerGuard::new(move || release_later(timeout.cancel()))
            }
        }
    }
}

/// Runs tasks on the browser microtask queue.
pub struct BrowserSpawner;

impl LocalSpawn for BrowserSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        wasm_bindgen_futures::spawn_local(future);
        Ok(())
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Canvas

/// Paints raw frames onto the `<canvas>` behind a [`NodeRef`].
pub struct CanvasSurface {
    canvas: NodeRef,
}

impl CanvasSurface {
    pub fn new(canvas: NodeRef) -> Self {
        Self { canvas }
    }

    fn context(&self) -> Option<CanvasRenderingContext2d> {
        let canvas = self.canvas.cast::<HtmlCanvasElement>()?;
        canvas
            .get_context("2d")
            .ok()
            .flatten()?
            .dyn_into::<CanvasRenderingContext2d>()
            .ok()
    }
}

impl PixelSurface for CanvasSurface {
    fn paint(&self, frame: &RawFrame) {
        let Some(context) = self.context() else {
            warn!("canvas not ready, frame dropped");
            return;
        };
        let image = ImageData::new_with_u8_clamped_array_and_sh(
            Clamped(frame.pixels()),
            frame.width(),
            frame.height(),
        );
        match image {
            Ok(image) => {
                if let Err(err) = context.put_image_data(&image, 0.0, 0.0) {
                    warn!("putImageData failed: {}", js_message(&err));
                }
            }
            Err(err) => warn!("could not build ImageData: {}", js_message(&err)),
        }
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Logging

struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format!("[{}] {}", record.target(), record.args()));
        match record.level() {
            Level::Error => web_sys::console::error_1(&line),
            Level::Warn => web_sys::console::warn_1(&line),
            Level::Info => web_sys::console::info_1(&line),
            Level::Debug | Level::Trace => web_sys::console::log_1(&line),
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

/// Routes `log` records to the browser console.
pub fn init_logging(level: LevelFilter) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
