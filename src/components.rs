//! Pure Yew view components for the replay UI.
//!
//! These render from props only; all state lives in the controller.

use yew::prelude::*;

use crate::frame::Frame;
use crate::state::Outcome;

#[derive(Properties, PartialEq)]
pub struct FrameImageProps {
    pub frame: Option<Frame>,
    #[prop_or(AttrValue::Static("visualization"))]
    pub alt: AttrValue,
}

/// Shows an encoded frame through a data URI. Nothing is drawn before the first frame.
#[function_component(FrameImage)]
pub fn frame_image(props: &FrameImageProps) -> Html {
    match props.frame.as_ref().and_then(Frame::as_encoded) {
        Some(image) => html! {
            <img class="frame" src={image.data_uri()} alt={props.alt.clone()} />
        },
        None => html! { <div class="frame frame-placeholder"></div> },
    }
}

#[derive(Properties, PartialEq)]
pub struct FrameCanvasProps {
    pub width: u32,
    pub height: u32,
    pub node_ref: NodeRef,
}

#[function_component(FrameCanvas)]
pub fn frame_canvas(props: &FrameCanvasProps) -> Html {
    html! {
        <canvas
            class="frame-canvas"
            ref={props.node_ref.clone()}
            width={props.width.to_string()}
            height={props.height.to_string()}
        />
    }
}

#[derive(Properties, PartialEq)]
pub struct ActionButtonProps {
    pub label: AttrValue,
    pub disabled: bool,
    pub onclick: Callback<MouseEvent>,
}

#[function_component(ActionButton)]
pub fn action_button(props: &ActionButtonProps) -> Html {
    let class = classes!("action-button", props.disabled.then_some("disabled"));
    html! {
        <button {class} disabled={props.disabled} onclick={props.onclick.clone()}>
            { props.label.to_string() }
        </button>
    }
}

#[derive(Properties, PartialEq)]
pub struct ProgressLabelProps {
    pub current: usize,
    pub total: usize,
}

/// "Example N of M", one based.
#[function_component(ProgressLabel)]
pub fn progress_label(props: &ProgressLabelProps) -> Html {
    html! {
        <div class="progress-label">
            { format!("Example {} of {}", props.current + 1, props.total) }
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct StatusBannerProps {
    pub outcome: Outcome,
}

#[function_component(StatusBanner)]
pub fn status_banner(props: &StatusBannerProps) -> Html {
    match props.outcome {
        Outcome::GameOver => html! {
            <div class="status status-game-over">{ "Game Over!" }</div>
        },
        Outcome::AllSolved => html! {
            <div class="status status-success">{ "Success! All problems solved!" }</div>
        },
        Outcome::InProgress => html! {},
    }
}
