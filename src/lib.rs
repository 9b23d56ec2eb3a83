//! Client-side playback and synchronization for server-rendered animations.
//!
//! The backend computes frames (tree balancing, path search, game state) and
//! this crate replays them: it fetches an initial frame, requests frame
//! batches and plays them back at a fixed cadence, steps through examples,
//! and mirrors server progress by polling. The canvas variant streams raw RGBA
//! frames on every display refresh.
//!
//! The core ([`controller`], [`playback`], [`polling`], [`frame_loop`]) only
//! talks to the outside world through the [`transport::Transport`],
//! [`clock::Clock`] and `LocalSpawn` seams, so it runs unchanged on browser
//! primitives ([`web`]) and on [`clock::ManualClock`] with a local executor.

pub mod clock;
pub mod components;
pub mod config;
pub mod controller;
pub mod frame;
pub mod frame_loop;
pub mod hooks;
pub mod playback;
pub mod polling;
pub mod published;
pub mod queue;
pub mod state;
pub mod transport;
pub mod web;

pub use clock::{Clock, ManualClock, TimerGuard};
pub use config::{ControllerConfig, Endpoints, Variant};
pub use controller::{Controller, ControllerDeps, Subscription};
pub use frame::{EncodedImage, Frame, FrameError, RawFrame};
pub use frame_loop::{ContinuousFrameLoop, PixelSurface};
pub use playback::{PlaybackScheduler, PlaybackState};
pub use polling::{Backoff, HttpStateSource, PollingLoop, StateFeed, StateSource};
pub use published::Published;
pub use queue::FrameQueue;
pub use state::{Outcome, ServerState};
pub use transport::{Method, Transport, TransportCause, TransportError};
