//! `fixtura check` — Handshake with the container engine.

use anyhow::Context;
use clap::Args;
use fixtura_common::config::FixturaConfig;
use fixtura_common::constants::APP_NAME;
use fixtura_runtime::engine::Engine;

use crate::output::{BOLD, DIM, GREEN, RESET};

/// Arguments for the `check` command.
#[derive(Args, Debug)]
pub struct CheckArgs {}

/// Executes the `check` command.
///
/// # Errors
///
/// Returns an error if the engine cannot be reached.
pub fn execute(_args: CheckArgs, config: FixturaConfig) -> anyhow::Result<()> {
    let engine = Engine::connect(config).context("container engine is not reachable")?;

    eprintln!();
    eprintln!("  {BOLD}{APP_NAME}{RESET} {DIM}v{}{RESET}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "  {GREEN}●{RESET} engine {BOLD}{}{RESET} reachable",
        engine.server_version()
    );
    eprintln!(
        "  {DIM}prefix {} · host {}{RESET}",
        engine.config().namespace_prefix,
        engine.config().host
    );
    eprintln!();
    Ok(())
}
