use hayward_ipc::CommandResult;

use crate::state::Server;
use crate::tree::arrange;

/// `reload`: re-read the configuration file and re-apply everything derived from it.
pub fn run(server: &mut Server, args: &[String]) -> CommandResult {
    if !args.is_empty() {
        return CommandResult::invalid("Expected 'reload'");
    }

    let new_config = match hayward_config::load(None) {
        Ok(config) => config,
        Err(err) => {
            return CommandResult::failure(format!("Failed to load configuration: {err}"));
        }
    };

    *server.config.borrow_mut() = new_config;
    server.reconfigure_input_devices();
    arrange::arrange_root(&server.root);

    for workspace in server.root.workspaces() {
        crate::ipc::workspace_event(
            &server.root,
            hayward_ipc::WorkspaceChange::Reload,
            Some(&workspace),
        );
    }

    CommandResult::success()
}
