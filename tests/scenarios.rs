//! End-to-end behaviour of the tree, transactions and focus engine on the headless backend.

mod common;

use std::time::{Duration, Instant};

use common::{map_tiled, new_state, settle};
use hayward::backend::headless::headless_view;
use hayward::shell::ClientId;

#[test]
fn open_in_split() {
    let (_event_loop, mut state) = new_state();

    let (a, ca) = map_tiled(&mut state, 1);
    let (b, cb) = map_tiled(&mut state, 2);
    let (c, cc) = map_tiled(&mut state, 3);
    settle(&mut state, &[(&a, &ca), (&b, &cb), (&c, &cc)]);

    let workspace = state.server.root.get_active_workspace().unwrap();
    let tiling = workspace.pending.borrow().tiling.clone();
    assert_eq!(tiling.len(), 1, "all three windows share one column");

    let column = &tiling[0];
    let children = column.pending.borrow().children.clone();
    assert_eq!(children, vec![a.clone(), b.clone(), c.clone()]);
    assert_eq!(column.pending.borrow().active_child, Some(c.clone()));

    let seat = state.server.input.current_seat();
    assert_eq!(seat.focused_window(), Some(c.clone()));

    let column_height = column.get_box().height;
    for window in &children {
        let height = window.get_box().height;
        assert!(
            (height - column_height / 3.0).abs() < 1e-6,
            "each window gets a third of the column, got {height}"
        );
    }
}

#[test]
fn floating_round_trip() {
    let (_event_loop, mut state) = new_state();

    let (a, ca) = map_tiled(&mut state, 1);
    let workspace = state.server.root.get_active_workspace().unwrap();
    let workspace_box = workspace.get_box();

    state.server.window_set_floating(&a, true);
    settle(&mut state, &[(&a, &ca)]);

    assert!(a.is_floating());
    assert!(a.is_current_floating(), "the promoted state agrees");
    assert_eq!(a.get_current_siblings(), vec![a.clone()]);
    {
        let pending = workspace.pending.borrow();
        assert_eq!(pending.floating, vec![a.clone()]);
        assert!(pending.tiling.is_empty(), "the emptied column is freed");
    }

    let content = a.pending.borrow().content;
    assert!((content.width - workspace_box.width * 0.5).abs() < 1e-6);
    assert!((content.height - workspace_box.height * 0.75).abs() < 1e-6);

    // Centered on the output.
    let output = state.server.root.active_output().unwrap();
    let output_box = output.rect();
    assert!((content.x - (output_box.x + (output_box.width - content.width) / 2.0)).abs() < 1e-6);

    state.server.window_set_floating(&a, false);
    settle(&mut state, &[(&a, &ca)]);

    assert!(a.is_tiling());
    assert_eq!(workspace.pending.borrow().tiling.len(), 1);
}

#[test]
fn fullscreen_hides_siblings() {
    let (_event_loop, mut state) = new_state();

    let (a, ca) = map_tiled(&mut state, 1);
    let (b, cb) = map_tiled(&mut state, 2);
    settle(&mut state, &[(&a, &ca), (&b, &cb)]);

    let seat = state.server.input.current_seat();
    state.server.seat_set_focus_window(&seat, Some(a.clone()));
    state.server.window_set_fullscreen(&a, true);
    settle(&mut state, &[(&a, &ca), (&b, &cb)]);

    let workspace = state.server.root.get_active_workspace().unwrap();
    assert_eq!(workspace.pending.borrow().fullscreen, Some(a.clone()));

    let output_box = state.server.root.active_output().unwrap().rect();
    assert_eq!(a.get_box(), output_box);
    assert_eq!(a.pending.borrow().content, output_box, "no borders when fullscreen");
    assert!(!b.is_visible());
    assert!(a.is_visible());

    state.server.handle_view_unmap(&a);
    settle(&mut state, &[(&b, &cb)]);

    assert_eq!(workspace.pending.borrow().fullscreen, None);
    assert_eq!(seat.focused_window(), Some(b.clone()));
    assert!(b.is_visible());
}

#[test]
fn transaction_timeout_via_event_loop() {
    let (mut event_loop, mut state) = new_state();

    // This client never acks its resize.
    let (view, client, _surface) = headless_view(ClientId(1));
    let window = state.server.handle_view_map(view);
    assert!(client.last_configure().is_some());
    assert!(state.server.transactions.has_queued());
    assert!(window.view().has_saved_buffers(), "stale content keeps showing");

    let deadline = Instant::now() + Duration::from_secs(2);
    while state.server.transactions.has_queued() && Instant::now() < deadline {
        event_loop
            .dispatch(Some(Duration::from_millis(25)), &mut state)
            .expect("dispatch failed");
    }

    assert!(
        !state.server.transactions.has_queued(),
        "the timer promoted the transaction"
    );
    assert_eq!(
        window.current.borrow().content,
        window.pending.borrow().content
    );
    assert!(!window.view().has_saved_buffers());

    // Nothing is blocked: the next commit proceeds normally.
    let (b, cb) = map_tiled(&mut state, 2);
    settle(&mut state, &[(&b, &cb)]);
    assert_eq!(b.current.borrow().content, b.pending.borrow().content);
}

#[test]
fn focus_replacement_across_floating() {
    let (_event_loop, mut state) = new_state();

    let (f1, c1) = map_tiled(&mut state, 1);
    let (f2, c2) = map_tiled(&mut state, 2);
    let (t1, c3) = map_tiled(&mut state, 3);
    state.server.window_set_floating(&f1, true);
    state.server.window_set_floating(&f2, true);
    settle(&mut state, &[(&f1, &c1), (&f2, &c2), (&t1, &c3)]);

    let seat = state.server.input.current_seat();
    state.server.seat_set_focus_window(&seat, Some(f1.clone()));
    assert_eq!(seat.focused_window(), Some(f1.clone()));

    state.server.handle_view_unmap(&f1);
    settle(&mut state, &[(&f2, &c2), (&t1, &c3)]);
    assert_eq!(
        seat.focused_window(),
        Some(f2.clone()),
        "a floating window prefers a floating successor"
    );

    state.server.handle_view_unmap(&f2);
    settle(&mut state, &[(&t1, &c3)]);
    assert_eq!(
        seat.focused_window(),
        Some(t1.clone()),
        "falling back to a tiling window on a visible workspace"
    );

    state.server.handle_view_unmap(&t1);
    assert_eq!(seat.focused_window(), None, "focus is left cleared");
    assert!(!seat.has_focus.get());
}
