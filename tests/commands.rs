//! The IPC command surface.

mod common;

use common::{map_tiled, new_state, settle};
use hayward::commands;
use hayward_ipc::CommandStatus;

fn run(state: &mut hayward::state::State, argv: &[&str]) -> hayward_ipc::CommandResult {
    let argv: Vec<String> = argv.iter().map(|arg| String::from(*arg)).collect();
    commands::execute(&mut state.server, &argv)
}

#[test]
fn unknown_commands_are_invalid() {
    let (_event_loop, mut state) = new_state();
    let result = run(&mut state, &["frobnicate"]);
    assert_eq!(result.status, CommandStatus::Invalid);
    assert_eq!(result.message.as_deref(), Some("Unknown command 'frobnicate'"));
}

#[test]
fn kill_asks_the_client_to_close() {
    let (_event_loop, mut state) = new_state();

    let result = run(&mut state, &["kill"]);
    assert_eq!(result.status, CommandStatus::Failure);
    assert_eq!(result.message.as_deref(), Some("No window has focus"));

    let (a, ca) = map_tiled(&mut state, 1);
    settle(&mut state, &[(&a, &ca)]);

    let result = run(&mut state, &["kill"]);
    assert_eq!(result.status, CommandStatus::Success);
    assert!(ca.close_requested());
    // The window stays in the tree until the client actually unmaps.
    assert!(a.workspace().is_some());
}

#[test]
fn focus_moves_within_the_column() {
    let (_event_loop, mut state) = new_state();
    let seat = state.server.input.current_seat();

    let (a, ca) = map_tiled(&mut state, 1);
    let (b, cb) = map_tiled(&mut state, 2);
    settle(&mut state, &[(&a, &ca), (&b, &cb)]);

    // A and B share a column; up/down moves between them.
    state.server.seat_set_focus_window(&seat, Some(b.clone()));
    let result = run(&mut state, &["focus", "up"]);
    assert_eq!(result.status, CommandStatus::Success);
    assert_eq!(seat.focused_window(), Some(a.clone()));

    let result = run(&mut state, &["focus", "down"]);
    assert_eq!(result.status, CommandStatus::Success);
    assert_eq!(seat.focused_window(), Some(b.clone()));
}

#[test]
fn focus_mode_toggle_switches_populations() {
    let (_event_loop, mut state) = new_state();
    let seat = state.server.input.current_seat();

    let (tiled, ct) = map_tiled(&mut state, 1);
    let (floater, cf) = map_tiled(&mut state, 2);
    state.server.window_set_floating(&floater, true);
    settle(&mut state, &[(&tiled, &ct), (&floater, &cf)]);

    state.server.seat_set_focus_window(&seat, Some(tiled.clone()));
    let result = run(&mut state, &["focus", "mode_toggle"]);
    assert_eq!(result.status, CommandStatus::Success);
    assert_eq!(seat.focused_window(), Some(floater.clone()));

    let result = run(&mut state, &["focus", "mode_toggle"]);
    assert_eq!(result.status, CommandStatus::Success);
    assert_eq!(seat.focused_window(), Some(tiled.clone()));
}

#[test]
fn floating_toggle_round_trips() {
    let (_event_loop, mut state) = new_state();

    let (a, ca) = map_tiled(&mut state, 1);
    settle(&mut state, &[(&a, &ca)]);

    let result = run(&mut state, &["floating", "toggle"]);
    assert_eq!(result.status, CommandStatus::Success);
    assert!(a.is_floating());

    let result = run(&mut state, &["floating", "toggle"]);
    assert_eq!(result.status, CommandStatus::Success);
    assert!(a.is_tiling());
}

#[test]
fn border_changes_kind_and_thickness() {
    let (_event_loop, mut state) = new_state();

    let (a, ca) = map_tiled(&mut state, 1);
    settle(&mut state, &[(&a, &ca)]);

    let result = run(&mut state, &["border", "pixel", "4"]);
    assert_eq!(result.status, CommandStatus::Success);
    {
        let pending = a.pending.borrow();
        assert_eq!(pending.border, hayward::tree::BorderKind::Pixel);
        assert_eq!(pending.border_thickness, 4.0);
    }
    // Content insets follow the new border.
    let pending = a.pending.borrow();
    assert_eq!(pending.content.y, pending.rect.y + 4.0);
    drop(pending);

    let result = run(&mut state, &["border", "whatever"]);
    assert_eq!(result.status, CommandStatus::Invalid);
}

#[test]
fn exit_stops_the_compositor() {
    let (_event_loop, mut state) = new_state();
    assert!(!state.server.stop);
    let result = run(&mut state, &["exit"]);
    assert_eq!(result.status, CommandStatus::Success);
    assert!(state.server.stop);
}

#[test]
fn fullscreen_toggle() {
    let (_event_loop, mut state) = new_state();

    let (a, ca) = map_tiled(&mut state, 1);
    settle(&mut state, &[(&a, &ca)]);

    let result = run(&mut state, &["fullscreen", "toggle"]);
    assert_eq!(result.status, CommandStatus::Success);
    assert!(a.is_fullscreen());

    let result = run(&mut state, &["fullscreen", "disable"]);
    assert_eq!(result.status, CommandStatus::Success);
    assert!(!a.is_fullscreen());
}
