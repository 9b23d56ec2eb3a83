//! Entry point for the replay viewer.
//! Picks the front-end variant from the page config and renders it with Yew.

use std::rc::Rc;

use log::LevelFilter;
use replay_view::{
    components::{ActionButton, FrameCanvas, FrameImage, ProgressLabel, StatusBanner},
    hooks::use_controller,
    web::{init_logging, load_page_config, CanvasSurface},
    ControllerConfig, Variant,
};
use yew::prelude::*;

#[derive(Properties, PartialEq)]
struct ViewerProps {
    config: ControllerConfig,
}

/// Init frame, batch playback and (optionally) stepping through examples.
#[function_component(BatchViewer)]
fn batch_viewer(props: &ViewerProps) -> Html {
    let view = use_controller(props.config.clone());
    let variant = props.config.variant;
    let steps = props.config.endpoints().advance.is_some();

    let on_solve = {
        let controller = view.controller.clone();
        Callback::from(move |_: MouseEvent| {
            controller.solve_or_start();
        })
    };
    let on_next = {
        let controller = view.controller.clone();
        Callback::from(move |_: MouseEvent| {
            controller.advance();
        })
    };

    let solve_label = if view.is_animating() {
        "Animating..."
    } else {
        variant.batch_label()
    };

    html! {
        <div class="viewer">
            <div class="controls">
                <ActionButton
                    label={solve_label}
                    disabled={!view.controller.can_solve()}
                    onclick={on_solve}
                />
                if steps {
                    <ActionButton
                        label="Next Example"
                        disabled={!view.controller.can_advance()}
                        onclick={on_next}
                    />
                }
            </div>
            <FrameImage frame={view.frame.clone()} />
            if steps {
                <ProgressLabel current={view.state.current_index} total={view.state.total} />
            }
        </div>
    }
}

/// Raw canvas stream driven by server commands and polled state.
#[function_component(CanvasViewer)]
fn canvas_viewer(props: &ViewerProps) -> Html {
    let view = use_controller(props.config.clone());
    let canvas_ref = use_node_ref();

    {
        let controller = view.controller.clone();
        let canvas_ref = canvas_ref.clone();
        use_effect_with((), move |_| {
            controller.attach_surface(Rc::new(CanvasSurface::new(canvas_ref)));
            || ()
        });
    }

    let on_start = {
        let controller = view.controller.clone();
        Callback::from(move |_: MouseEvent| {
            controller.start_command();
        })
    };
    let on_next = {
        let controller = view.controller.clone();
        Callback::from(move |_: MouseEvent| {
            controller.next_command();
        })
    };

    html! {
        <div class="viewer">
            <FrameCanvas
                width={props.config.surface_width}
                height={props.config.surface_height}
                node_ref={canvas_ref}
            />
            <div class="controls">
                <ActionButton
                    label="Start"
                    disabled={!view.controller.can_start_command()}
                    onclick={on_start}
                />
                <ActionButton
                    label="Next"
                    disabled={!view.controller.can_next_command()}
                    onclick={on_next}
                />
            </div>
            <StatusBanner outcome={view.state.outcome()} />
        </div>
    }
}

#[function_component]
pub fn App() -> Html {
    let config = use_memo((), |_| load_page_config());
    let config = (*config).clone();
    match config.variant {
        Variant::CanvasGame => html! { <CanvasViewer {config} /> },
        _ => html! { <BatchViewer {config} /> },
    }
}

fn main() {
    console_error_panic_hook::set_once();
    init_logging(LevelFilter::Info);
    yew::Renderer::<App>::new().render();
}
