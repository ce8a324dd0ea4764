//! `fixtura up` — Bring up one fixture by hand.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Args;
use fixtura_common::config::FixturaConfig;
use fixtura_runtime::engine::Engine;
use fixtura_sdk::{Fixture, FixtureFactory, FixtureSpec};

use crate::output::{BOLD, CYAN, DIM, GREEN, RESET, format_duration};

/// Arguments for the `up` command.
#[derive(Args, Debug)]
pub struct UpArgs {
    /// Path to the build file. Its directory is the build context.
    #[arg(default_value = "Dockerfile")]
    pub file: PathBuf,

    /// Label inserted into the container name.
    #[arg(short, long)]
    pub label: Option<String>,

    /// Environment variable for the container, as KEY=VALUE.
    #[arg(short, long = "env", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Build-time argument, as KEY=VALUE.
    #[arg(long = "build-arg", value_parser = parse_key_value)]
    pub build_args: Vec<(String, String)>,
}

/// Executes the `up` command.
///
/// # Errors
///
/// Returns an error if the engine is unreachable or the fixture never
/// becomes healthy.
pub fn execute(args: UpArgs, config: FixturaConfig) -> anyhow::Result<()> {
    if !args.file.is_file() {
        return Err(anyhow::anyhow!(
            "Build file not found: {}\n\
             Specify a path: fixtura up <file>",
            args.file.display()
        ));
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {e}"))?;

    let engine = Arc::new(Engine::connect(config).context("container engine is not reachable")?);
    let started = Instant::now();
    let fixture = up_fixture(&engine, to_spec(args), &shutdown)?;

    report(&fixture, started.elapsed());
    eprintln!();
    eprintln!("  Press {BOLD}Ctrl+C{RESET} to purge the fixture...");
    hold_until_shutdown(fixture, &shutdown)
}

/// Creates the fixture. A Ctrl+C during the readiness wait purges the
/// container before returning.
fn up_fixture(engine: &Arc<Engine>, spec: FixtureSpec, shutdown: &Arc<AtomicBool>) -> anyhow::Result<Fixture> {
    FixtureFactory::new(Arc::clone(engine))
        .with_cancellation(Arc::clone(shutdown))
        .create(spec)
        .context("fixture setup failed")
}

fn to_spec(args: UpArgs) -> FixtureSpec {
    let mut spec = FixtureSpec::new(args.file);
    if let Some(label) = args.label {
        spec = spec.label(label);
    }
    for (key, value) in args.env {
        spec = spec.env(key, value);
    }
    for (key, value) in args.build_args {
        spec = spec.build_arg(key, value);
    }
    spec
}

fn report(fixture: &Fixture, elapsed: Duration) {
    eprintln!();
    eprintln!(
        "  {GREEN}{BOLD}Healthy{RESET} in {}: {BOLD}{}{RESET} {DIM}[{}]{RESET}",
        format_duration(elapsed),
        fixture.name(),
        fixture.id()
    );
    eprintln!();
    for (port, endpoint) in fixture.endpoints() {
        eprintln!("    {GREEN}●{RESET} {port} {CYAN}->{RESET} {BOLD}{endpoint}{RESET}");
    }
}

fn hold_until_shutdown(fixture: Fixture, shutdown: &AtomicBool) -> anyhow::Result<()> {
    while !shutdown.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(250));
    }

    eprintln!();
    eprintln!("  Purging {}...", fixture.name());
    fixture.purge().context("purge failed")?;
    eprintln!("  {GREEN}Fixture purged.{RESET}");
    Ok(())
}

/// Parses `KEY=VALUE`.
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {s:?}")),
    }
}
