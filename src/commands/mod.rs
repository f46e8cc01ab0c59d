//! Command handlers for the IPC `Command` request.
//!
//! Commands are argument vectors. Results carry a status and, for failures, a stable English
//! message that scripts can match against.

mod border;
mod floating;
mod focus;
mod fullscreen;
mod kill;
mod reload;

use hayward_ipc::CommandResult;

use crate::state::Server;

/// Execute one command. Errors never propagate past the IPC boundary.
pub fn execute(server: &mut Server, argv: &[String]) -> CommandResult {
    let Some((name, args)) = argv.split_first() else {
        return CommandResult::invalid("Expected a command");
    };

    match name.as_str() {
        "focus" => focus::run(server, args),
        "kill" => kill::run(server, args),
        "border" => border::run(server, args),
        "floating" => floating::run(server, args),
        "fullscreen" => fullscreen::run(server, args),
        "reload" => reload::run(server, args),
        "exit" => {
            info!("Exiting hayward");
            server.stop = true;
            CommandResult::success()
        }
        unknown => CommandResult::invalid(format!("Unknown command '{unknown}'")),
    }
}

/// The window most commands operate on.
fn focused_window(server: &Server) -> Option<std::rc::Rc<crate::tree::Window>> {
    let seat = server.input.current_seat();
    seat.focused_window()
}
