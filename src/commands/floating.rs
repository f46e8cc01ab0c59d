use hayward_ipc::CommandResult;

use crate::state::Server;

/// `floating <enable|disable|toggle>`
pub fn run(server: &mut Server, args: &[String]) -> CommandResult {
    let Some(window) = super::focused_window(server) else {
        return CommandResult::failure("No window has focus");
    };

    let enable = match args.first().map(String::as_str) {
        Some("enable") => true,
        Some("disable") => false,
        Some("toggle") | None => !window.is_floating(),
        Some(unknown) => {
            return CommandResult::invalid(format!("Unknown floating argument '{unknown}'"));
        }
    };

    server.window_set_floating(&window, enable);
    CommandResult::success()
}
