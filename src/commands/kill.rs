use hayward_ipc::CommandResult;

use crate::state::Server;

/// `kill`: ask the focused window's client to close. The window leaves the tree when the
/// client actually unmaps.
pub fn run(server: &mut Server, args: &[String]) -> CommandResult {
    if !args.is_empty() {
        return CommandResult::invalid("Expected 'kill'");
    }
    let Some(window) = super::focused_window(server) else {
        return CommandResult::failure("No window has focus");
    };
    window.close();
    CommandResult::success()
}
