use std::path::PathBuf;

#[derive(Debug, clap::Parser)]
#[command(name = "hayward", version, about)]
pub struct Cli {
    /// The configuration path to use.
    #[arg(short, long, value_name = "PATH")]
    pub config_path: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, clap::Subcommand)]
pub enum Command {
    /// Check the compositor configuration for any errors.
    CheckConfiguration,
    /// Generate shell completions.
    GenerateCompletions { shell: clap_complete::Shell },
}
