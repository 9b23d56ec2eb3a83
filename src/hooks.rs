use yew::prelude::*;

use crate::config::ControllerConfig;
use crate::controller::Controller;
use crate::frame::Frame;
use crate::playback::PlaybackState;
use crate::state::ServerState;
use crate::web::browser_controller;

/// Snapshot of a controller's published state for one render.
#[derive(Clone)]
pub struct ControllerView {
    /// Handle for wiring actions into callbacks.
    pub controller: Controller,
    pub frame: Option<Frame>,
    pub state: ServerState,
    pub playback: PlaybackState,
}

impl ControllerView {
    pub fn is_animating(&self) -> bool {
        self.playback == PlaybackState::Animating
    }
}

/// Creates a browser-backed controller for the component's lifetime.
///
/// The controller is mounted after the first render and disposed on unmount,
/// which cancels its timers and in-flight requests. Any published change
/// re-renders the component.
#[hook]
pub fn use_controller(config: ControllerConfig) -> ControllerView {
    let controller = use_memo((), move |_| browser_controller(config));
    let force_update = use_force_update();

    {
        let controller = (*controller).clone();
        use_effect_with((), move |_| {
            let subscription = controller.subscribe(move || force_update.force_update());
            controller.mount();
            move || {
                drop(subscription);
                controller.dispose();
            }
        });
    }

    ControllerView {
        controller: (*controller).clone(),
        frame: controller.current_frame(),
        state: controller.server_state(),
        playback: controller.playback_state(),
    }
}
