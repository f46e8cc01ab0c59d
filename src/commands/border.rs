use hayward_ipc::CommandResult;

use crate::state::Server;
use crate::tree::{arrange, BorderKind};

/// `border <none|pixel|normal|csd|toggle> [thickness]`
pub fn run(server: &mut Server, args: &[String]) -> CommandResult {
    let Some(window) = super::focused_window(server) else {
        return CommandResult::failure("No window has focus");
    };
    let Some(kind) = args.first() else {
        return CommandResult::invalid("Expected 'border <none|pixel|normal|csd|toggle> [<n>]'");
    };

    let current = window.pending.borrow().border;
    let new_border = match kind.as_str() {
        "none" => BorderKind::None,
        "pixel" => BorderKind::Pixel,
        "normal" => BorderKind::Normal,
        "csd" => BorderKind::Csd,
        "toggle" => match current {
            BorderKind::None => BorderKind::Pixel,
            BorderKind::Pixel => BorderKind::Normal,
            BorderKind::Normal | BorderKind::Csd => BorderKind::None,
        },
        unknown => {
            return CommandResult::invalid(format!("Unknown border style '{unknown}'"));
        }
    };

    let thickness = match args.get(1) {
        Some(raw) => match raw.parse::<i32>() {
            Ok(thickness) if thickness >= 0 => Some(f64::from(thickness)),
            _ => return CommandResult::invalid("Expected a non-negative border thickness"),
        },
        None => None,
    };

    {
        let mut pending = window.pending.borrow_mut();
        pending.border = new_border;
        if let Some(thickness) = thickness {
            pending.border_thickness = thickness;
        }
    }
    window.node.set_dirty();

    if let Some(workspace) = window.workspace() {
        arrange::arrange_workspace(&workspace);
    }
    CommandResult::success()
}
