use calloop::EventLoop;
use clap::{CommandFactory, Parser};
use hayward::cli;
use hayward::ipc::IpcServer;
use hayward::state::State;
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error,hayward=info"));
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(filter)
        .init();

    let cli = cli::Cli::parse();
    match cli.command {
        Some(cli::Command::CheckConfiguration) => check_configuration(cli),
        Some(cli::Command::GenerateCompletions { shell }) => {
            let mut command = cli::Cli::command();
            let name = command.get_name().to_string();
            clap_complete::generate(shell, &mut command, name, &mut std::io::stdout());
            std::process::exit(0);
        }
        None => (),
    }

    info!(
        version = std::env!("CARGO_PKG_VERSION"),
        "Starting hayward."
    );

    let config = match hayward_config::load(cli.config_path) {
        Ok(config) => config,
        Err(err) => {
            error!(?err, "Failed to load the configuration");
            std::process::exit(1);
        }
    };

    let mut event_loop: EventLoop<'static, State> = EventLoop::try_new()?;
    let loop_handle = event_loop.handle();

    // The IPC socket is the compositor's externally visible surface; a session without one is
    // unreachable.
    let ipc = IpcServer::start(&loop_handle)?;

    let mut state = State::new(
        loop_handle,
        event_loop.get_signal(),
        config,
        Some(ipc),
    );

    event_loop
        .run(None, &mut state, |state| {
            if state.server.stop {
                state.server.loop_signal.stop();
                state.server.loop_signal.wakeup();
                return;
            }
            state.dispatch();
        })
        .map_err(|err| anyhow::anyhow!("Failed to run the event loop: {err}"))?;

    info!("Shutting down! Goodbye~");
    Ok(())
}

fn check_configuration(cli: cli::Cli) -> ! {
    match hayward_config::load(cli.config_path) {
        Ok(_) => {
            info!("There are no issues with your configuration");
            std::process::exit(0)
        }
        Err(err) => match err {
            hayward_config::Error::IO(err) => {
                error!(?err, "Failed to load your configuration");
                std::process::exit(1)
            }
            hayward_config::Error::Parse(err) => {
                print!("\n{err}");
                std::process::exit(1)
            }
        },
    }
}
