//! Supplemental tree operations: marks, moves, stacked columns, session lock, exclusivity,
//! sticky floaters, scene layers and the IPC tree description.

mod common;

use std::rc::Rc;

use common::{map_tiled, new_state, settle};
use hayward::input::seat::IdleSource;
use hayward::shell::{ClientId, Popup, Surface, SurfaceEvent};
use hayward::tree::root::UnmanagedSurface;
use hayward::tree::{Column, ColumnLayout, Workspace};
use hayward::utils::{Direction, Rect};
use hayward_ipc::NodeKind;

#[test]
fn marks_find_windows() {
    let (_event_loop, mut state) = new_state();

    let (a, ca) = map_tiled(&mut state, 1);
    let (b, cb) = map_tiled(&mut state, 2);
    settle(&mut state, &[(&a, &ca), (&b, &cb)]);

    a.add_mark("scratch");
    assert!(a.has_mark("scratch"));
    assert_eq!(state.server.root.window_by_mark("scratch"), Some(a.clone()));
    assert_eq!(state.server.root.window_by_mark("nope"), None);

    a.clear_marks();
    assert!(!a.has_mark("scratch"));
    assert_eq!(state.server.root.window_by_mark("scratch"), None);
}

#[test]
fn move_to_workspace_reparents_tiling_windows() {
    let (_event_loop, mut state) = new_state();

    let (a, ca) = map_tiled(&mut state, 1);
    let (b, cb) = map_tiled(&mut state, 2);
    settle(&mut state, &[(&a, &ca), (&b, &cb)]);

    let ws2 = Workspace::new(&state.server.root, "2");
    assert_eq!(state.server.root.workspace_by_name("2"), Some(ws2.clone()));
    a.move_to_workspace(&ws2);

    assert_eq!(a.workspace(), Some(ws2.clone()));
    assert_eq!(ws2.num_tiling_windows(), 1);
    let old_workspace = b.workspace().unwrap();
    assert_eq!(old_workspace.num_tiling_windows(), 1);

    // Floating windows keep floating across workspaces.
    state.server.window_set_floating(&b, true);
    b.move_to_workspace(&ws2);
    assert!(b.is_floating());
    assert!(ws2.pending.borrow().floating.contains(&b));
}

#[test]
fn move_to_column_from_direction_picks_the_insertion_point() {
    let (_event_loop, mut state) = new_state();

    let (a, ca) = map_tiled(&mut state, 1);
    let (b, cb) = map_tiled(&mut state, 2);
    settle(&mut state, &[(&a, &ca), (&b, &cb)]);

    let workspace = state.server.root.get_active_workspace().unwrap();
    let output = state.server.root.active_output().unwrap();
    let column = Column::new(&state.server.root);
    let index = workspace.pending.borrow().tiling.len();
    workspace.insert_tiling(&output, &column, index);

    // Moving "down" into a column enters at the top.
    a.move_to_column_from_direction(&column, Direction::Down);
    b.move_to_column_from_direction(&column, Direction::Down);
    let children = column.pending.borrow().children.clone();
    assert_eq!(children, vec![b.clone(), a.clone()]);

    assert_eq!(b.get_next_sibling(), Some(a.clone()));
    assert_eq!(a.get_previous_sibling(), Some(b.clone()));
    assert_eq!(a.sibling_index(), Some(1));
}

#[test]
fn stacked_columns_reserve_titlebars_and_show_one_child() {
    let (_event_loop, mut state) = new_state();

    let (a, ca) = map_tiled(&mut state, 1);
    let (b, cb) = map_tiled(&mut state, 2);
    settle(&mut state, &[(&a, &ca), (&b, &cb)]);

    let column = a.column().unwrap();
    column.set_layout(ColumnLayout::Stacked);
    hayward::tree::arrange::arrange_workspace(&a.workspace().unwrap());
    settle(&mut state, &[(&a, &ca), (&b, &cb)]);

    let titlebar_height = state.server.root.titlebar_height();
    let column_box = column.get_box();
    for window in [&a, &b] {
        assert_eq!(window.get_box(), column_box);
        let content = window.pending.borrow().content;
        assert!((content.y - (column_box.y + titlebar_height * 2.0)).abs() < 1e-6);
    }

    // Only the active child is visible (and hit-testable).
    let active = column.pending.borrow().active_child.clone().unwrap();
    let hidden = if active == a { b.clone() } else { a.clone() };
    assert!(active.is_visible());
    assert!(!hidden.is_visible());

    let (cx, cy) = column_box.center();
    let hit = state.server.node_at_coords(cx, cy);
    assert_eq!(hit.window, Some(active));
}

#[test]
fn session_lock_gates_focus() {
    let (_event_loop, mut state) = new_state();
    let seat = state.server.input.current_seat();

    let (a, ca) = map_tiled(&mut state, 1);
    settle(&mut state, &[(&a, &ca)]);
    assert_eq!(seat.focused_window(), Some(a.clone()));

    state.server.lock_session();
    assert!(state.server.is_locked());
    assert!(!seat.has_focus.get());
    assert!(!ca.activated());

    // Windows cannot take focus while locked.
    state.server.seat_set_focus_window(&seat, Some(a.clone()));
    assert_eq!(seat.focused_window(), None);

    // The lock surface receives the keyboard.
    let output = state.server.root.active_output().unwrap();
    let lock_surface = Surface::new(ClientId(7));
    state.server.set_lock_surface(&output, Rc::clone(&lock_surface));
    assert_eq!(
        seat.keyboard.focused_surface().map(|surface| surface.id()),
        Some(lock_surface.id())
    );

    state.server.unlock_session();
    assert!(!state.server.is_locked());
    assert_eq!(seat.focused_window(), Some(a.clone()));
}

#[test]
fn exclusive_client_filters_focus() {
    let (_event_loop, mut state) = new_state();
    let seat = state.server.input.current_seat();

    let (a, ca) = map_tiled(&mut state, 1);
    let (b, cb) = map_tiled(&mut state, 2);
    settle(&mut state, &[(&a, &ca), (&b, &cb)]);

    // Make client 1 (window A) exclusive: B cannot be focused anymore.
    state
        .server
        .seat_set_exclusive_client(&seat, Some(ClientId(1)));
    assert_eq!(seat.focused_window(), None, "focused non-exclusive window is dropped");

    state.server.seat_set_focus_window(&seat, Some(b.clone()));
    assert_eq!(seat.focused_window(), None);

    state.server.seat_set_focus_window(&seat, Some(a.clone()));
    assert_eq!(seat.focused_window(), Some(a.clone()));

    state.server.seat_set_exclusive_client(&seat, None);
    state.server.seat_set_focus_window(&seat, Some(b.clone()));
    assert_eq!(seat.focused_window(), Some(b.clone()));
}

#[test]
fn sticky_floaters_follow_the_workspace() {
    let (_event_loop, mut state) = new_state();
    let seat = state.server.input.current_seat();

    let (f, cf) = map_tiled(&mut state, 1);
    state.server.window_set_floating(&f, true);
    settle(&mut state, &[(&f, &cf)]);
    f.set_sticky(true);
    assert!(f.is_sticky());

    let ws1 = state.server.root.get_active_workspace().unwrap();
    let ws2 = Workspace::new(&state.server.root, "2");
    state.server.seat_set_focus_workspace(&seat, &ws2);

    assert_eq!(f.workspace(), Some(ws2.clone()));
    assert!(ws2.pending.borrow().floating.contains(&f));
    assert_eq!(ws2.num_sticky_windows(), 1);
    // The emptied workspace is gone.
    assert!(ws1.node.is_destroying());
}

#[test]
fn popups_and_unmanaged_surfaces_hit_first() {
    let (_event_loop, mut state) = new_state();

    let (a, ca) = map_tiled(&mut state, 1);
    settle(&mut state, &[(&a, &ca)]);

    let unmanaged_surface = Surface::new(ClientId(5));
    state.server.root.unmanaged.borrow_mut().push(Rc::new(UnmanagedSurface {
        surface: Rc::clone(&unmanaged_surface),
        rect: std::cell::Cell::new(Rect::new(100.0, 100.0, 200.0, 150.0)),
    }));

    let hit = state.server.node_at_coords(150.0, 150.0);
    assert_eq!(
        hit.surface.as_ref().map(|surface| surface.id()),
        Some(unmanaged_surface.id())
    );
    assert_eq!(hit.window, None);

    // Popups beat unmanaged surfaces.
    let popup_surface = Surface::new(ClientId(1));
    popup_surface.attach_buffer(hayward::shell::Buffer::new(300.0, 200.0), 300.0, 200.0);
    let popup = Popup::new(Rc::clone(&popup_surface), &a, (50.0, 50.0));
    state.server.root.popups.borrow_mut().push(popup);

    let content = a.current.borrow().content;
    let hit = state
        .server
        .node_at_coords(content.x + 60.0, content.y + 60.0);
    assert_eq!(
        hit.surface.as_ref().map(|surface| surface.id()),
        Some(popup_surface.id())
    );
    assert_eq!(hit.window, Some(a.clone()));
}

#[test]
fn workspace_output_priority_prefers_connected_outputs() {
    let (_event_loop, mut state) = new_state();

    let workspace = state.server.root.get_active_workspace().unwrap();
    workspace.output_add_priority("DP-3");
    workspace.output_raise_priority("DP-2");
    assert_eq!(workspace.output_priority(), vec!["DP-2", "DP-3"]);

    // Neither is connected, so the first connected output wins.
    assert_eq!(
        workspace
            .output_get_highest_available()
            .map(|output| output.name().to_string()),
        Some(String::from("headless-0"))
    );

    let dp2 = state.server.add_output("DP-2", 1280.0, 1024.0);
    assert_eq!(workspace.output_get_highest_available(), Some(dp2));
}

#[test]
fn removing_an_output_evacuates_its_columns() {
    let (_event_loop, mut state) = new_state();

    let (a, ca) = map_tiled(&mut state, 1);
    settle(&mut state, &[(&a, &ca)]);

    let second = state.server.add_output("DP-1", 1280.0, 1024.0);
    a.move_to_output_from_direction(&second, Direction::Right);
    settle(&mut state, &[(&a, &ca)]);
    assert_eq!(a.output(), Some(second.clone()));

    state.server.remove_output(&second);
    settle(&mut state, &[(&a, &ca)]);

    let first = state.server.root.active_output().unwrap();
    assert_eq!(first.name(), "headless-0");
    assert_eq!(state.backend.headless().output(), &first);
    assert_eq!(a.output(), Some(first));
    assert!(second.node.is_destroying());
}

#[test]
fn ipc_tree_description_mirrors_the_tree() {
    let (_event_loop, mut state) = new_state();

    let (a, ca) = map_tiled(&mut state, 1);
    let (b, cb) = map_tiled(&mut state, 2);
    state.server.window_set_floating(&b, true);
    settle(&mut state, &[(&a, &ca), (&b, &cb)]);

    let tree = hayward::ipc::describe_tree(&state.server.root);
    assert_eq!(tree.kind, NodeKind::Root);
    assert_eq!(tree.children.len(), 1, "one output");

    let output = &tree.children[0];
    assert_eq!(output.kind, NodeKind::Output);
    let workspace = &output.children[0];
    assert_eq!(workspace.kind, NodeKind::Workspace);

    let kinds: Vec<NodeKind> = workspace.children.iter().map(|child| child.kind).collect();
    assert_eq!(kinds, vec![NodeKind::Column, NodeKind::Window]);
    assert_eq!(workspace.children[0].children[0].id, a.node.id().get());
    assert_eq!(workspace.children[1].id, b.node.id().get());
}

#[test]
fn ipc_events_are_queued_for_tree_changes() {
    let (_event_loop, mut state) = new_state();
    state.server.root.drain_ipc_events();

    let (a, ca) = map_tiled(&mut state, 1);
    settle(&mut state, &[(&a, &ca)]);

    let events = state.server.root.drain_ipc_events();
    let mut saw_new = false;
    let mut saw_focus = false;
    for event in &events {
        if let hayward::tree::IpcEvent::Window { change, window } = event {
            match change {
                hayward_ipc::WindowChange::New => {
                    saw_new = true;
                    assert_eq!(window.as_ref(), Some(&a));
                }
                hayward_ipc::WindowChange::Focus => saw_focus = true,
                _ => {}
            }
        }
    }
    assert!(saw_new, "window::new was emitted");
    assert!(saw_focus, "window::focus was emitted");
    assert!(state.server.root.drain_ipc_events().is_empty());
}

#[test]
fn activation_policy_controls_focus_stealing() {
    let (_event_loop, mut state) = new_state();
    let seat = state.server.input.current_seat();

    let (a, ca) = map_tiled(&mut state, 1);
    let (b, cb) = map_tiled(&mut state, 2);
    settle(&mut state, &[(&a, &ca), (&b, &cb)]);
    assert_eq!(seat.focused_window(), Some(b.clone()));

    // Smart: both on the visible workspace, so activation focuses.
    state.server.handle_view_request_activate(&a);
    assert_eq!(seat.focused_window(), Some(a.clone()));

    state.server.config.borrow_mut().general.focus_on_window_activation =
        hayward_config::FocusOnWindowActivation::Urgent;
    state.server.handle_view_request_activate(&b);
    assert_eq!(seat.focused_window(), Some(a.clone()), "focus did not move");
    assert!(b.is_urgent());
}

#[test]
fn client_resize_requests_skip_the_configure_round_trip() {
    let (_event_loop, mut state) = new_state();

    let (a, ca) = map_tiled(&mut state, 1);
    state.server.window_set_floating(&a, true);
    settle(&mut state, &[(&a, &ca)]);
    let configures_before = ca.configures().len();

    state.server.handle_view_resize_request(&a, 640.0, 480.0);

    assert_eq!(a.pending.borrow().content.width, 640.0);
    assert_eq!(
        ca.configures().len(),
        configures_before,
        "client-initiated changes are not configured back"
    );
    assert!(!state.server.transactions.has_queued());
    assert_eq!(a.current.borrow().content.width, 640.0);
}

#[test]
fn transients_of_the_fullscreen_window_stay_focusable() {
    let (_event_loop, mut state) = new_state();
    let seat = state.server.input.current_seat();

    let (a, ca) = map_tiled(&mut state, 1);
    state.server.seat_set_focus_window(&seat, Some(a.clone()));
    state.server.window_set_fullscreen(&a, true);
    settle(&mut state, &[(&a, &ca)]);

    let (dialog, cd) = map_tiled(&mut state, 1);
    dialog.view().set_transient_parent(Some(&a));
    settle(&mut state, &[(&a, &ca), (&dialog, &cd)]);

    assert!(dialog.is_transient_for(&a));
    assert!(dialog.obstructing_fullscreen_window().is_none());
    state.server.seat_set_focus_window(&seat, Some(dialog.clone()));
    assert_eq!(seat.focused_window(), Some(dialog.clone()));
    assert!(dialog.is_visible());
}

#[test]
fn floating_windows_take_their_natural_size() {
    let (_event_loop, mut state) = new_state();

    let (a, ca) = map_tiled(&mut state, 1);
    a.view().set_natural_size(300.0, 200.0);
    state.server.window_set_floating(&a, true);
    settle(&mut state, &[(&a, &ca)]);

    let content = a.pending.borrow().content;
    assert_eq!((content.width, content.height), (300.0, 200.0));
}

#[test]
fn title_changes_are_published() {
    let (_event_loop, mut state) = new_state();

    let (a, ca) = map_tiled(&mut state, 1);
    settle(&mut state, &[(&a, &ca)]);
    state.server.root.drain_ipc_events();

    state
        .server
        .handle_view_title(&a, Some(String::from("systemd journal")));
    assert_eq!(a.title().as_deref(), Some("systemd journal"));

    let events = state.server.root.drain_ipc_events();
    assert!(events.iter().any(|event| matches!(
        event,
        hayward::tree::IpcEvent::Window {
            change: hayward_ipc::WindowChange::Title,
            ..
        }
    )));
}

#[test]
fn view_commits_ack_by_serial_or_geometry() {
    let (_event_loop, mut state) = new_state();

    // Serial path.
    let (view, client, surface) =
        hayward::backend::headless::headless_view(ClientId(1));
    let window = state.server.handle_view_map(view);
    let configure = client.last_configure().unwrap();
    surface.attach_buffer(
        hayward::shell::Buffer::new(configure.rect.width, configure.rect.height),
        configure.rect.width,
        configure.rect.height,
    );
    state.server.handle_view_commit(&window, Some(configure.serial));
    assert!(!state.server.transactions.has_queued());
    assert_eq!(window.current.borrow().content, configure.rect);

    // Geometry path: the client commits a buffer of the right size without echoing serials.
    state.server.window_set_floating(&window, true);
    state.server.flush();
    assert!(state.server.transactions.has_queued());
    let content = window.pending.borrow().content;
    surface.attach_buffer(
        hayward::shell::Buffer::new(content.width, content.height),
        content.width,
        content.height,
    );
    state.server.handle_view_commit(&window, None);
    assert!(!state.server.transactions.has_queued());
    assert_eq!(window.current.borrow().content, content);
}

#[test]
fn set_cursor_requests_respect_the_active_seatop() {
    let (_event_loop, mut state) = new_state();
    let seat = state.server.input.current_seat();

    let (a, ca) = map_tiled(&mut state, 1);
    settle(&mut state, &[(&a, &ca)]);

    // The default seatop lets clients set the cursor.
    state.server.handle_set_cursor_request(&seat, Some("text"));
    assert_eq!(seat.cursor.image(), Some(String::from("text")));

    // An interactive move draws its own feedback.
    state.server.seatop_begin_move_floating(&seat, &a);
    state.server.handle_set_cursor_request(&seat, Some("grab"));
    assert_eq!(seat.cursor.image(), Some(String::from("text")));
    state.server.seatop_begin_default(&seat);
}

#[test]
fn keyboard_enter_replays_held_keycodes() {
    let (_event_loop, mut state) = new_state();
    let seat = state.server.input.current_seat();

    let (a, ca) = map_tiled(&mut state, 1);
    let (b, cb) = map_tiled(&mut state, 2);
    settle(&mut state, &[(&a, &ca), (&b, &cb)]);
    assert_eq!(seat.focused_window(), Some(b.clone()));

    state.server.keyboard_key(&seat, 30, true);
    a.surface().unwrap().take_events();

    state.server.seat_set_focus_window(&seat, Some(a.clone()));
    let events = a.surface().unwrap().take_events();
    assert!(events.contains(&SurfaceEvent::KeyboardEnter { pressed: vec![30] }));

    state.server.keyboard_key(&seat, 30, false);
    assert!(seat.keyboard.pressed_keycodes().is_empty());
}

#[test]
fn idle_wake_sources_mask_activity() {
    let (_event_loop, state) = new_state();
    let seat = state.server.input.current_seat();

    seat.set_idle_wake_sources(IdleSource::KEYBOARD);
    let before = seat.last_activity();
    seat.idle_notify_activity(IdleSource::POINTER);
    assert_eq!(seat.last_activity(), before, "masked sources do not wake");
    seat.idle_notify_activity(IdleSource::KEYBOARD);
    assert!(seat.last_activity() >= before);

    seat.set_idle_inhibit_sources(IdleSource::KEYBOARD | IdleSource::POINTER);
    assert!(seat.idle_activity_inhibits(IdleSource::POINTER));
    assert!(!seat.idle_activity_inhibits(IdleSource::TOUCH));
    assert_eq!(seat.idle_wake_sources(), IdleSource::KEYBOARD);
}
