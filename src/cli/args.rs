use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone, PartialEq, Eq)]
#[command(name = "persona-chat")]
#[command(
    about = "Chat backend that answers as a configured persona",
    long_about = "Chat backend that answers as a configured persona\n\nConfig file loading:\n  - --config <path> (explicit file, overrides default path discovery)\n  - Default probe path when --config is not provided:\n    1. $XDG_CONFIG_HOME/persona-chat/config.toml\n    2. ~/.config/persona-chat/config.toml\n\nEnvironment variables (and a local .env file) override config file values."
)]
pub struct CliArgs {
    /// Load config from this file path instead of the default discovery path.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Listen on this port, overriding PORT and the config file.
    #[arg(long)]
    pub port: Option<u16>,

    /// Log at debug level, including redacted outbound HTTP traffic.
    #[arg(short, long)]
    pub verbose: bool,
}
