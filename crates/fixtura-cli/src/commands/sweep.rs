//! `fixtura sweep` — Purge fixture containers left behind by killed runs.

use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::Args;
use fixtura_common::config::FixturaConfig;
use fixtura_runtime::engine::Engine;

use crate::output::{BOLD, DIM, GREEN, RESET, format_age};

/// Arguments for the `sweep` command.
#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Only purge containers older than this many seconds.
    #[arg(long)]
    pub older_than_secs: Option<u64>,

    /// List what would be purged without purging.
    #[arg(long)]
    pub dry_run: bool,
}

/// Executes the `sweep` command.
///
/// # Errors
///
/// Returns an error if the engine is unreachable or cannot list containers.
pub fn execute(args: SweepArgs, config: FixturaConfig) -> anyhow::Result<()> {
    let engine = Engine::connect(config).context("container engine is not reachable")?;
    let prefix = engine.config().namespace_prefix.clone();

    let older_than = args.older_than_secs.map(Duration::from_secs);
    let containers = if args.dry_run {
        engine.sweep_candidates(older_than)?
    } else {
        engine.sweep(older_than)?
    };

    let verb = if args.dry_run { "Found" } else { "Purged" };
    eprintln!();
    eprintln!(
        "  {GREEN}{BOLD}{verb} {}{RESET} container(s) under {BOLD}{prefix}{RESET}",
        containers.len()
    );
    let now = Utc::now();
    for container in &containers {
        let age = container
            .created_at
            .map_or_else(|| "unknown age".to_string(), |created| format_age(now - created));
        eprintln!("    {GREEN}●{RESET} {} {DIM}[{}] {age}{RESET}", container.name, container.id);
    }
    eprintln!();
    Ok(())
}
