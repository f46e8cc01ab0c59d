use hayward_ipc::CommandResult;

use crate::state::Server;

/// `fullscreen <enable|disable|toggle>`
pub fn run(server: &mut Server, args: &[String]) -> CommandResult {
    let Some(window) = super::focused_window(server) else {
        return CommandResult::failure("No window has focus");
    };

    let enable = match args.first().map(String::as_str) {
        Some("enable") => true,
        Some("disable") => false,
        Some("toggle") | None => !window.is_fullscreen(),
        Some(unknown) => {
            return CommandResult::invalid(format!("Unknown fullscreen argument '{unknown}'"));
        }
    };

    server.window_set_fullscreen(&window, enable);
    CommandResult::success()
}
