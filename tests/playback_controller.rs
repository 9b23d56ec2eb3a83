mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{batch, png, snapshot, Harness, Reply};
use replay_view::{ControllerConfig, PlaybackState, Variant};
use serde_json::json;

fn tree_config() -> ControllerConfig {
    ControllerConfig::for_variant(Variant::TreeSolver)
}

fn bst_config() -> ControllerConfig {
    ControllerConfig::for_variant(Variant::BstExamples)
}

#[test]
fn mount_loads_initial_frame() {
    let mut h = Harness::new();
    h.transport
        .push("/api/init", Reply::Json(json!({"frame": "INIT", "totalTrees": 9})));
    let controller = h.controller(tree_config());

    controller.mount();
    controller.mount();
    h.settle();

    assert_eq!(controller.current_frame(), Some(png("INIT")));
    assert_eq!(h.transport.count("/api/init"), 1);
    assert_eq!(controller.playback_state(), PlaybackState::Idle);
}

#[test]
fn batch_plays_at_500ms_cadence() {
    let mut h = Harness::new();
    h.transport.push("/api/init", snapshot("INIT", 0, 1));
    h.transport.push("/api/solve", batch(&["A", "B", "C"]));
    let controller = h.controller(tree_config());
    controller.mount();
    h.settle();

    assert!(controller.solve_or_start());
    h.settle();
    assert!(controller.is_animating());

    h.advance(499);
    assert_eq!(controller.current_frame(), Some(png("INIT")));
    h.advance(1);
    assert_eq!(controller.current_frame(), Some(png("A")));
    h.advance(500);
    assert_eq!(controller.current_frame(), Some(png("B")));
    h.advance(499);
    assert_eq!(controller.playback_state(), PlaybackState::Animating);
    h.advance(1);
    assert_eq!(controller.current_frame(), Some(png("C")));
    assert_eq!(controller.playback_state(), PlaybackState::Idle);
    assert_eq!(h.clock.pending_timers(), 0);
    assert!(controller.can_solve());
}

#[test]
fn every_batch_is_published_in_order() {
    let batches: Vec<Vec<&str>> = vec![
        vec!["only"],
        vec!["A", "B"],
        vec!["x", "x", "y"],
        vec!["1", "2", "3", "4", "5", "6"],
        vec!["A", ""],
    ];

    for frames in batches {
        let mut h = Harness::new();
        h.transport.push("/api/solve", batch(&frames));
        let controller = h.controller(tree_config());

        controller.solve_or_start();
        h.settle();
        let mut published = Vec::new();
        while controller.is_animating() {
            h.advance(500);
            published.push(controller.current_frame());
        }

        let expected: Vec<_> = frames.iter().map(|f| Some(png(f))).collect();
        assert_eq!(published, expected);
        assert_eq!(controller.current_frame(), expected.last().cloned().flatten());
    }
}

#[test]
fn empty_batch_never_animates() {
    let mut h = Harness::new();
    h.transport.push("/api/solve", batch(&[]));
    let controller = h.controller(tree_config());

    assert!(controller.solve_or_start());
    h.settle();

    assert_eq!(controller.playback_state(), PlaybackState::Idle);
    assert_eq!(h.clock.pending_timers(), 0);
    assert!(controller.can_solve());
}

#[test]
fn solve_while_animating_is_a_no_op() {
    let mut h = Harness::new();
    h.transport.push("/api/solve", batch(&["A", "B", "C"]));
    h.transport.push("/api/solve", batch(&["X", "Y"]));
    let controller = h.controller(tree_config());

    controller.solve_or_start();
    h.settle();
    h.advance(500);

    assert!(!controller.can_solve());
    assert!(!controller.solve_or_start());
    h.settle();
    assert_eq!(h.transport.count("/api/solve"), 1);
    assert_eq!(h.clock.pending_timers(), 1);

    h.advance(1_000);
    assert_eq!(controller.current_frame(), Some(png("C")));
}

#[test]
fn overlapping_batch_requests_are_rejected() {
    let mut h = Harness::new();
    let gate = h.transport.gate("/api/solve");
    let controller = h.controller(tree_config());

    assert!(controller.solve_or_start());
    h.settle();
    assert!(!controller.solve_or_start());
    assert_eq!(h.transport.count("/api/solve"), 1);

    gate.send(batch(&["A"])).unwrap();
    h.settle();
    assert!(controller.is_animating());
    h.advance(500);
    assert_eq!(controller.current_frame(), Some(png("A")));
    assert!(controller.solve_or_start());
}

#[test]
fn failed_batch_request_leaves_state_untouched() {
    let mut h = Harness::new();
    h.transport.push("/api/init", snapshot("INIT", 0, 1));
    h.transport.push("/api/solve", Reply::Status(500));
    h.transport
        .push("/api/solve", Reply::Json(json!({"frames": "not a list"})));
    let controller = h.controller(tree_config());
    controller.mount();
    h.settle();

    for _ in 0..2 {
        assert!(controller.solve_or_start());
        h.settle();
        assert_eq!(controller.playback_state(), PlaybackState::Idle);
        assert_eq!(h.clock.pending_timers(), 0);
        assert_eq!(controller.current_frame(), Some(png("INIT")));
    }
    // The guard is released after a failure.
    assert!(controller.can_solve());
}

#[test]
fn dispose_while_animating_stops_all_writes() {
    let mut h = Harness::new();
    h.transport.push("/api/solve", batch(&["A", "B", "C"]));
    let controller = h.controller(tree_config());
    let notified = Rc::new(RefCell::new(0));
    let n = notified.clone();
    let _subscription = controller.subscribe(move || *n.borrow_mut() += 1);

    controller.solve_or_start();
    h.settle();
    h.advance(500);
    assert_eq!(controller.current_frame(), Some(png("A")));

    controller.dispose();
    let before = *notified.borrow();
    assert_eq!(h.clock.pending_timers(), 0);

    h.advance(2_000);
    assert_eq!(controller.current_frame(), Some(png("A")));
    assert_eq!(*notified.borrow(), before);
    assert!(!controller.solve_or_start());
    assert!(controller.is_disposed());
}

#[test]
fn dispose_aborts_in_flight_requests() {
    let mut h = Harness::new();
    h.transport.push("/api/init", snapshot("INIT", 0, 3));
    let gate = h.transport.gate("/api/start");
    let controller = h.controller(bst_config());
    controller.mount();
    h.settle();

    controller.solve_or_start();
    h.settle();
    controller.dispose();

    // The response arrives after teardown and must be ignored.
    let _ = gate.send(batch(&["late"]));
    h.advance(1_000);
    assert_eq!(controller.current_frame(), Some(png("INIT")));
    assert_eq!(controller.playback_state(), PlaybackState::Idle);
    assert_eq!(h.clock.pending_timers(), 0);
}

#[test]
fn advance_steps_until_last_example() {
    let mut h = Harness::new();
    h.transport.push("/api/init", snapshot("E0", 0, 3));
    h.transport.push("/api/next", snapshot("E1", 1, 3));
    h.transport.push("/api/next", snapshot("E2", 2, 3));
    let controller = h.controller(bst_config());
    controller.mount();
    h.settle();

    assert!(controller.advance());
    h.settle();
    assert_eq!(controller.current_frame(), Some(png("E1")));
    assert_eq!(controller.server_state().current_index, 1);

    assert!(controller.advance());
    h.settle();
    assert_eq!(controller.server_state().current_index, 2);

    // currentExample == totalExamples - 1: rejected, nothing changes.
    let state = controller.server_state();
    assert!(!controller.can_advance());
    assert!(!controller.advance());
    h.settle();
    assert_eq!(h.transport.count("/api/next"), 2);
    assert_eq!(controller.server_state(), state);
    assert_eq!(controller.current_frame(), Some(png("E2")));
}

#[test]
fn advance_is_disabled_while_animating() {
    let mut h = Harness::new();
    h.transport.push("/api/init", snapshot("E0", 0, 3));
    h.transport.push("/api/start", batch(&["A", "B"]));
    let controller = h.controller(bst_config());
    controller.mount();
    h.settle();

    controller.solve_or_start();
    h.settle();
    assert!(!controller.advance());
    assert_eq!(h.transport.count("/api/next"), 0);

    h.advance(1_000);
    assert!(controller.can_advance());
}

#[test]
fn failed_advance_keeps_previous_snapshot() {
    let mut h = Harness::new();
    h.transport.push("/api/init", snapshot("E0", 0, 3));
    h.transport.push("/api/next", Reply::Status(502));
    let controller = h.controller(bst_config());
    controller.mount();
    h.settle();

    assert!(controller.advance());
    h.settle();
    assert_eq!(controller.current_frame(), Some(png("E0")));
    assert_eq!(controller.server_state().current_index, 0);
    assert!(controller.can_advance());
}

#[test]
fn graph_snapshot_uses_problem_index_and_default_total() {
    let mut h = Harness::new();
    h.transport
        .push("/api/init", Reply::Json(json!({"frame": "P0", "problem": 0})));
    h.transport
        .push("/api/next", Reply::Json(json!({"frame": "P1", "problem": 1})));
    let controller = h.controller(ControllerConfig::for_variant(Variant::GraphSearch));
    controller.mount();
    h.settle();

    assert_eq!(controller.server_state().total, 3);
    controller.advance();
    h.settle();
    assert_eq!(controller.server_state().current_index, 1);
    assert!(controller.can_advance());
}

#[test]
fn batch_waits_for_pending_advance() {
    let mut h = Harness::new();
    h.transport.push("/api/init", snapshot("E0", 0, 3));
    let gate = h.transport.gate("/api/next");
    h.transport.push("/api/start", batch(&["A", "B", "C"]));
    let controller = h.controller(bst_config());
    controller.mount();
    h.settle();

    assert!(controller.advance());
    h.settle();
    assert!(!controller.solve_or_start());
    assert_eq!(h.transport.count("/api/start"), 0);

    gate.send(snapshot("E1", 1, 3)).unwrap();
    h.settle();
    assert_eq!(controller.current_frame(), Some(png("E1")));
    assert!(controller.solve_or_start());
}

#[test]
fn late_snapshot_does_not_interrupt_playback() {
    let mut h = Harness::new();
    let gate = h.transport.gate("/api/init");
    h.transport.push("/api/start", batch(&["A", "B", "C"]));
    let controller = h.controller(bst_config());
    controller.mount();
    h.settle();

    assert!(controller.solve_or_start());
    h.settle();
    h.advance(500);
    assert_eq!(controller.current_frame(), Some(png("A")));

    gate.send(snapshot("E1", 1, 3)).unwrap();
    h.settle();
    assert_eq!(controller.current_frame(), Some(png("A")));
    assert_eq!(controller.server_state().current_index, 0);

    let mut published = Vec::new();
    while controller.is_animating() {
        h.advance(500);
        published.push(controller.current_frame());
    }
    assert_eq!(published, vec![Some(png("B")), Some(png("C"))]);
}
