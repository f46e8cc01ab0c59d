use std::rc::Rc;

use hayward_config::FocusWrapping;
use hayward_ipc::CommandResult;

use crate::state::Server;
use crate::tree::{Window, Workspace};
use crate::utils::Direction;

/// `focus <left|right|up|down|mode_toggle|output <name>>`
pub fn run(server: &mut Server, args: &[String]) -> CommandResult {
    let seat = server.input.current_seat();

    let Some(arg) = args.first() else {
        // Bare `focus` re-asserts focus on the active window of the active workspace.
        let Some(workspace) = server.root.get_active_workspace() else {
            return CommandResult::failure("No workspace to focus");
        };
        server.seat_set_focus_workspace(&seat, &workspace);
        return CommandResult::success();
    };

    match arg.as_str() {
        "left" => focus_direction(server, Direction::Left),
        "right" => focus_direction(server, Direction::Right),
        "up" => focus_direction(server, Direction::Up),
        "down" => focus_direction(server, Direction::Down),
        "mode_toggle" => mode_toggle(server),
        "output" => {
            let Some(name) = args.get(1) else {
                return CommandResult::invalid("Expected 'focus output <name>'");
            };
            focus_output(server, name)
        }
        unknown => CommandResult::invalid(format!("Unknown focus target '{unknown}'")),
    }
}

fn focus_direction(server: &mut Server, direction: Direction) -> CommandResult {
    let seat = server.input.current_seat();
    let Some(current) = seat.focused_window() else {
        return CommandResult::failure("No window has focus");
    };
    if current.is_floating() {
        return CommandResult::failure("Cannot move focus out of floating windows directionally");
    }

    let Some(next) = neighbor_in_direction(server, &current, direction) else {
        return CommandResult::failure("No window in that direction");
    };
    let previous_output = current.output();
    server.seat_set_focus_window(&seat, Some(Rc::clone(&next)));
    warp_cursor_after_focus(server, &seat, &next, previous_output.as_ref());
    CommandResult::success()
}

/// Keyboard-driven focus optionally pulls the cursor along.
fn warp_cursor_after_focus(
    server: &mut Server,
    seat: &Rc<crate::input::Seat>,
    window: &Rc<Window>,
    previous_output: Option<&Rc<crate::tree::Output>>,
) {
    match server.config.borrow().general.mouse_warping {
        hayward_config::MouseWarping::No => {}
        hayward_config::MouseWarping::Container => {
            let (cx, cy) = window.get_box().center();
            seat.cursor.warp(cx, cy);
        }
        hayward_config::MouseWarping::Output => {
            let output = window.output();
            if let Some(output) = output {
                let changed = previous_output.is_none_or(|previous| *previous != output);
                if changed {
                    let (cx, cy) = output.rect().center();
                    seat.cursor.warp(cx, cy);
                }
            }
        }
    }
}

/// The window focus moves to: siblings within the column vertically, adjacent columns
/// horizontally, wrapping per the `focus_wrapping` setting.
fn neighbor_in_direction(
    server: &Server,
    window: &Rc<Window>,
    direction: Direction,
) -> Option<Rc<Window>> {
    let wrapping = server.config.borrow().general.focus_wrapping;
    let wrap = !matches!(wrapping, FocusWrapping::No);

    match direction {
        Direction::Up | Direction::Down => {
            let column = window.column()?;
            // A stacked column shows one child; vertical focus still cycles through them.
            let children = column.pending.borrow().children.clone();
            let index = children.iter().position(|child| child == window)?;
            let next = match direction {
                Direction::Up if index > 0 => Some(index - 1),
                Direction::Up if wrap => Some(children.len() - 1),
                Direction::Down if index + 1 < children.len() => Some(index + 1),
                Direction::Down if wrap => Some(0),
                _ => None,
            }?;
            children.get(next).cloned()
        }
        Direction::Left | Direction::Right => {
            let column = window.column()?;
            let siblings = column.get_siblings();
            let index = siblings.iter().position(|sibling| sibling == &column)?;
            let next = match direction {
                Direction::Left if index > 0 => Some(index - 1),
                Direction::Left if wrap && siblings.len() > 1 => Some(siblings.len() - 1),
                Direction::Right if index + 1 < siblings.len() => Some(index + 1),
                Direction::Right if wrap && siblings.len() > 1 => Some(0),
                _ => None,
            }?;
            let target = siblings.get(next)?;
            let active_child = target.pending.borrow().active_child.clone();
            active_child
        }
    }
}

/// Toggle between the tiling and floating populations of the focused workspace.
fn mode_toggle(server: &mut Server) -> CommandResult {
    let seat = server.input.current_seat();
    let Some(workspace) = seat
        .focused_workspace()
        .or_else(|| server.root.get_active_workspace())
    else {
        return CommandResult::failure("No workspace to focus");
    };

    let target = {
        let pending = workspace.pending.borrow();
        match pending.focus_mode {
            crate::tree::FocusMode::Tiling => pending.floating.last().cloned(),
            crate::tree::FocusMode::Floating => None,
        }
    };
    let target = match target {
        Some(window) => Some(window),
        None => workspace.get_active_tiling_window(),
    };

    let Some(target) = target else {
        return CommandResult::failure("No window to focus on in that direction");
    };
    server.seat_set_focus_window(&seat, Some(target));
    CommandResult::success()
}

fn focus_output(server: &mut Server, name: &str) -> CommandResult {
    let Some(output) = server.root.output_by_name(name) else {
        return CommandResult::failure(format!("Unknown output '{name}'"));
    };
    server.root.set_active_output(&output);

    // Focus the most recent workspace shown on that output.
    let seat = server.input.current_seat();
    let workspace: Option<Rc<Workspace>> = seat
        .active_workspace_for_output(&output)
        .or_else(|| server.root.get_active_workspace());
    if let Some(workspace) = workspace {
        server.seat_set_focus_workspace(&seat, &workspace);
    }
    CommandResult::success()
}
