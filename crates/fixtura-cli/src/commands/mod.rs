//! CLI command definitions and dispatch.

pub mod check;
pub mod sweep;
pub mod up;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use fixtura_common::config::FixturaConfig;
use fixtura_common::constants::{
    BIN_NAME, DEFAULT_HOST, DEFAULT_NAMESPACE_PREFIX, DEFAULT_POLL_INTERVAL_MS, ENV_DOCKER, ENV_EXPIRE_SECS,
    ENV_HOST, ENV_POLL_INTERVAL_MS, ENV_PREFIX, ENV_READY_TIMEOUT_SECS,
};

/// Fixtura — disposable, health-checked container fixtures.
#[derive(Parser, Debug)]
#[command(name = BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Engine settings shared by every subcommand.
    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Engine settings. Each flag falls back to its environment variable.
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Path to the docker binary (default: looked up on `PATH`).
    #[arg(long, global = true, env = ENV_DOCKER)]
    pub docker: Option<PathBuf>,

    /// Prefix of every fixture container name.
    #[arg(long, global = true, env = ENV_PREFIX, default_value = DEFAULT_NAMESPACE_PREFIX)]
    pub prefix: String,

    /// Pause between health inspections, in milliseconds.
    #[arg(long, global = true, env = ENV_POLL_INTERVAL_MS, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// Give up waiting for health after this many seconds.
    #[arg(long, global = true, env = ENV_READY_TIMEOUT_SECS)]
    pub ready_timeout_secs: Option<u64>,

    /// Schedule forced removal this many seconds after start.
    #[arg(long, global = true, env = ENV_EXPIRE_SECS)]
    pub expire_secs: Option<u64>,

    /// Host address reported for published ports.
    #[arg(long, global = true, env = ENV_HOST, default_value = DEFAULT_HOST)]
    pub host: String,
}

impl EngineArgs {
    /// Converts the flags into an engine configuration.
    #[must_use]
    pub fn to_config(&self) -> FixturaConfig {
        FixturaConfig {
            docker_binary: self.docker.clone(),
            namespace_prefix: self.prefix.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            ready_timeout: self.ready_timeout_secs.map(Duration::from_secs),
            default_expiry: self.expire_secs.map(Duration::from_secs),
            host: self.host.clone(),
        }
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Handshake with the container engine and report its version.
    Check(check::CheckArgs),
    /// Build and start a fixture, print its endpoints, purge on Ctrl+C.
    Up(up::UpArgs),
    /// Purge leftover fixture containers.
    Sweep(sweep::SweepArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = cli.engine.to_config();
    tracing::debug!(?config, "engine configuration");
    match cli.command {
        Command::Check(args) => check::execute(args, config),
        Command::Up(args) => up::execute(args, config),
        Command::Sweep(args) => sweep::execute(args, config),
    }
}
