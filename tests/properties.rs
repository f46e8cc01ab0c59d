//! Structural invariants of the tree.

mod common;

use common::{map_tiled, new_state, settle};
use hayward::tree::arrange;
use hayward::tree::workspace::{MIN_SANE_HEIGHT, MIN_SANE_WIDTH};

/// Every window is either a column child or in its workspace's floating list, never both and
/// never neither.
#[test]
fn window_ownership_is_exclusive() {
    let (_event_loop, mut state) = new_state();

    let (a, ca) = map_tiled(&mut state, 1);
    let (b, cb) = map_tiled(&mut state, 2);
    state.server.window_set_floating(&b, true);
    settle(&mut state, &[(&a, &ca), (&b, &cb)]);

    for window in [&a, &b] {
        let workspace = window.workspace().expect("window is attached");
        let in_floating = workspace
            .pending
            .borrow()
            .floating
            .iter()
            .any(|other| other == window);
        let has_parent = window.column().is_some();
        assert!(
            in_floating != has_parent,
            "window must be exactly one of tiled or floating"
        );
        if let Some(column) = window.column() {
            assert!(column
                .pending
                .borrow()
                .children
                .iter()
                .any(|child| child == window));
        }
    }
}

/// The workspace fullscreen pointer refers to one of its windows, and that window knows.
#[test]
fn fullscreen_pointer_is_consistent() {
    let (_event_loop, mut state) = new_state();

    let (a, ca) = map_tiled(&mut state, 1);
    settle(&mut state, &[(&a, &ca)]);
    let workspace = state.server.root.get_active_workspace().unwrap();

    assert_eq!(workspace.pending.borrow().fullscreen, None);

    state.server.window_set_fullscreen(&a, true);
    settle(&mut state, &[(&a, &ca)]);
    {
        let pending = workspace.pending.borrow();
        let fullscreen = pending.fullscreen.clone().expect("fullscreen set");
        assert_eq!(fullscreen, a);
        assert!(fullscreen.is_fullscreen());
        assert!(workspace
            .find_window(|window| window == &fullscreen)
            .is_some());
    }

    state.server.window_set_fullscreen(&a, false);
    settle(&mut state, &[(&a, &ca)]);
    assert_eq!(workspace.pending.borrow().fullscreen, None);
    assert!(!a.is_fullscreen());
}

/// Arranging twice changes nothing: geometry stabilizes after one pass.
#[test]
fn arrangement_is_idempotent() {
    let (_event_loop, mut state) = new_state();

    let (a, ca) = map_tiled(&mut state, 1);
    let (b, cb) = map_tiled(&mut state, 2);
    let (c, cc) = map_tiled(&mut state, 3);
    state.server.window_set_floating(&c, true);
    settle(&mut state, &[(&a, &ca), (&b, &cb), (&c, &cc)]);

    arrange::arrange_root(&state.server.root);
    let first: Vec<_> = [&a, &b, &c]
        .iter()
        .map(|window| (window.get_box(), window.pending.borrow().content))
        .collect();

    arrange::arrange_root(&state.server.root);
    let second: Vec<_> = [&a, &b, &c]
        .iter()
        .map(|window| (window.get_box(), window.pending.borrow().content))
        .collect();

    for ((rect_a, content_a), (rect_b, content_b)) in first.iter().zip(second.iter()) {
        assert!((rect_a.x - rect_b.x).abs() < 1e-9);
        assert!((rect_a.y - rect_b.y).abs() < 1e-9);
        assert!((rect_a.width - rect_b.width).abs() < 1e-9);
        assert!((rect_a.height - rect_b.height).abs() < 1e-9);
        assert!((content_a.x - content_b.x).abs() < 1e-9);
        assert!((content_a.width - content_b.width).abs() < 1e-9);
    }
}

/// Ridiculous gaps still leave a minimum sane working area.
#[test]
fn gaps_clamp_to_a_sane_area() {
    let (_event_loop, mut state) = new_state();

    let (a, ca) = map_tiled(&mut state, 1);
    let (b, cb) = map_tiled(&mut state, 2);
    {
        let mut config = state.server.config.borrow_mut();
        config.gaps.inner = 2000;
        config.gaps.outer = 2000;
    }
    arrange::arrange_root(&state.server.root);
    settle(&mut state, &[(&a, &ca), (&b, &cb)]);

    let workspace = state.server.root.get_active_workspace().unwrap();
    let workspace_box = workspace.get_box();
    assert!(workspace_box.width >= MIN_SANE_WIDTH - 1e-9);
    assert!(workspace_box.height >= MIN_SANE_HEIGHT - 1e-9);
}

/// `has_focus` tracks the top of the focus stack.
#[test]
fn focus_stack_matches_has_focus() {
    let (_event_loop, mut state) = new_state();
    let seat = state.server.input.current_seat();

    assert!(!seat.has_focus.get());
    assert_eq!(seat.focused_window(), None);

    let (a, ca) = map_tiled(&mut state, 1);
    settle(&mut state, &[(&a, &ca)]);
    assert!(seat.has_focus.get());
    assert_eq!(seat.focused_window(), Some(a.clone()));
    assert_eq!(seat.windows_in_focus_order().first(), Some(&a));

    state.server.handle_view_unmap(&a);
    assert!(!seat.has_focus.get());
    assert_eq!(seat.focused_window(), None);
}

/// A window hidden behind a fullscreen window refuses focus.
#[test]
fn fullscreen_obstruction_refuses_focus() {
    let (_event_loop, mut state) = new_state();
    let seat = state.server.input.current_seat();

    let (a, ca) = map_tiled(&mut state, 1);
    let (b, cb) = map_tiled(&mut state, 2);
    state.server.seat_set_focus_window(&seat, Some(a.clone()));
    state.server.window_set_fullscreen(&a, true);
    settle(&mut state, &[(&a, &ca), (&b, &cb)]);

    state.server.seat_set_focus_window(&seat, Some(b.clone()));
    assert_eq!(
        seat.focused_window(),
        Some(a.clone()),
        "focus stays on the fullscreen window"
    );
}
