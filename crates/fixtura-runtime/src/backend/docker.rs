//! Docker backend driven through the `docker` command-line client.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::Duration;

use chrono::{DateTime, Utc};
use fixtura_common::config::FixturaConfig;
use fixtura_common::constants::{DOCKER_BINARY, MANAGED_LABEL};
use fixtura_common::error::{FixturaError, Result};
use fixtura_common::types::InstanceName;

use super::{ContainerBackend, InstanceRef, ManagedContainer, RunRequest};
use crate::inspect::InspectionRecord;

/// Maximum number of engine output lines carried into an error message.
const ERROR_TAIL_LINES: usize = 20;

/// Shell script that backgrounds a delayed container removal and exits.
///
/// Positional arguments: `$0` seconds, `$1` docker binary, `$2` container.
const EXPIRY_SCRIPT: &str =
    r#"(sleep "$0" && exec "$1" rm --force --volumes "$2") >/dev/null 2>&1 &"#;

/// Engine messages meaning the daemon itself is unreachable.
const DAEMON_UNREACHABLE: &[&str] = &[
    "Cannot connect to the Docker daemon",
    "error during connect",
    "Is the docker daemon running",
    "permission denied while trying to connect",
];

/// Backend that shells out to the Docker CLI.
#[derive(Debug, Clone)]
pub struct DockerCliBackend {
    binary: PathBuf,
}

impl DockerCliBackend {
    /// Creates a backend using the given Docker binary.
    #[must_use]
    pub const fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Creates a backend from the configured binary, or the one on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns `FixturaError::Connection` if no binary is configured and
    /// none is found on `PATH`.
    pub fn from_config(config: &FixturaConfig) -> Result<Self> {
        match &config.docker_binary {
            Some(path) => Ok(Self::new(path.clone())),
            None => find_docker().map(Self::new),
        }
    }

    /// Returns the Docker binary this backend invokes.
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Runs `docker <args>` to completion.
    fn docker(&self, args: &[String]) -> Result<Output> {
        tracing::trace!(binary = %self.binary.display(), ?args, "invoking docker");
        Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| FixturaError::Connection {
                message: format!("cannot execute {}: {e}", self.binary.display()),
            })
    }

    fn build_image(&self, request: &RunRequest) -> Result<()> {
        tracing::info!(
            build_file = %request.build.build_file.display(),
            tag = %request.build.tag,
            "building fixture image"
        );
        let output = self.docker(&build_args(request))?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = tail(&output.stderr);
        if is_daemon_unreachable(&stderr) {
            return Err(FixturaError::Connection { message: stderr });
        }
        Err(FixturaError::Build {
            build_file: request.build.build_file.clone(),
            message: stderr,
        })
    }

    fn run_container(&self, request: &RunRequest) -> Result<InstanceRef> {
        let output = self.docker(&run_args(request))?;
        if output.status.success() {
            let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
            tracing::info!(name = %request.name, id = %id, "fixture container started");
            return Ok(InstanceRef {
                id,
                name: request.name.clone(),
            });
        }

        let stderr = tail(&output.stderr);
        if is_daemon_unreachable(&stderr) {
            return Err(FixturaError::Connection { message: stderr });
        }
        // `docker run` may fail after the container was created.
        self.remove_by_name(&request.name);
        Err(FixturaError::Start {
            name: request.name.to_string(),
            message: stderr,
        })
    }

    fn remove_by_name(&self, name: &InstanceName) {
        let args = rm_args(name.as_str());
        match self.docker(&args) {
            Ok(output) if output.status.success() || is_missing(&tail(&output.stderr)) => {}
            Ok(output) => {
                tracing::warn!(name = %name, stderr = %tail(&output.stderr), "cleanup after failed start failed");
            }
            Err(e) => tracing::warn!(name = %name, error = %e, "cleanup after failed start failed"),
        }
    }
}

impl ContainerBackend for DockerCliBackend {
    fn ping(&self) -> Result<String> {
        let output = self.docker(&strings(&["version", "--format", "{{.Server.Version}}"]))?;
        if !output.status.success() {
            return Err(FixturaError::Connection {
                message: tail(&output.stderr),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn build_and_run(&self, request: &RunRequest) -> Result<InstanceRef> {
        self.build_image(request)?;
        self.run_container(request)
    }

    fn inspect(&self, name: &InstanceName) -> Result<Option<InspectionRecord>> {
        let output = self.docker(&strings(&["inspect", "--type", "container", name.as_str()]))?;
        if !output.status.success() {
            let stderr = tail(&output.stderr);
            if is_missing(&stderr) {
                return Ok(None);
            }
            return Err(FixturaError::Connection {
                message: format!("docker inspect {name} failed: {stderr}"),
            });
        }
        let json = String::from_utf8_lossy(&output.stdout);
        Ok(InspectionRecord::parse_docker(&json)?.into_iter().next())
    }

    fn purge(&self, instance: &InstanceRef) -> Result<()> {
        let output = self.docker(&rm_args(&instance.id))?;
        if output.status.success() {
            tracing::info!(name = %instance.name, id = %instance.id, "fixture container purged");
            return Ok(());
        }
        let stderr = tail(&output.stderr);
        if is_missing(&stderr) {
            tracing::debug!(name = %instance.name, "container already removed");
            return Ok(());
        }
        Err(FixturaError::Purge {
            name: instance.name.to_string(),
            message: stderr,
        })
    }

    fn schedule_expiry(&self, instance: &InstanceRef, after: Duration) -> Result<()> {
        let secs = whole_seconds(after);
        spawn_expiry(&self.binary, &instance.id, secs)?;
        tracing::info!(name = %instance.name, secs, "fixture expiry scheduled");
        Ok(())
    }

    fn list_managed(&self, prefix: &str) -> Result<Vec<ManagedContainer>> {
        let output = self.docker(&strings(&[
            "ps",
            "--all",
            "--no-trunc",
            "--filter",
            &format!("label={MANAGED_LABEL}=true"),
            "--format",
            "{{.ID}}\t{{.Names}}\t{{.CreatedAt}}",
        ]))?;
        if !output.status.success() {
            return Err(FixturaError::Connection {
                message: tail(&output.stderr),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(parse_ps_line)
            .filter(|c| c.name.as_str().starts_with(prefix))
            .collect())
    }

    fn is_available(&self) -> bool {
        self.binary.is_file() || which::which(&self.binary).is_ok()
    }
}

// ---------------------------------------------------------------------------
// Free helper functions
// ---------------------------------------------------------------------------

/// Finds the Docker binary on `PATH`.
fn find_docker() -> Result<PathBuf> {
    which::which(DOCKER_BINARY).map_err(|_| FixturaError::Connection {
        message: format!("{DOCKER_BINARY} not found on PATH (install Docker or set FIXTURA_DOCKER)"),
    })
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| (*a).to_string()).collect()
}

/// Arguments for `docker build`.
fn build_args(request: &RunRequest) -> Vec<String> {
    let mut args = strings(&["build", "--file"]);
    args.push(request.build.build_file.display().to_string());
    args.push("--tag".into());
    args.push(request.build.tag.to_string());
    args.push("--label".into());
    args.push(format!("{MANAGED_LABEL}=true"));
    for (key, value) in &request.build_args {
        args.push("--build-arg".into());
        args.push(format!("{key}={value}"));
    }
    args.push(request.build.context_dir.display().to_string());
    args
}

/// Arguments for `docker run`.
fn run_args(request: &RunRequest) -> Vec<String> {
    let mut args = strings(&["run", "--detach", "--name"]);
    args.push(request.name.to_string());
    if request.auto_remove {
        args.push("--rm".into());
    }
    if request.publish_all {
        args.push("--publish-all".into());
    }
    args.push("--label".into());
    args.push(format!("{MANAGED_LABEL}=true"));
    for (key, value) in &request.labels {
        args.push("--label".into());
        args.push(format!("{key}={value}"));
    }
    for (key, value) in &request.env {
        args.push("--env".into());
        args.push(format!("{key}={value}"));
    }
    args.push(request.build.tag.to_string());
    args.extend(request.command.iter().cloned());
    args
}

fn rm_args(target: &str) -> Vec<String> {
    strings(&["rm", "--force", "--volumes", target])
}

/// Keeps the last lines of engine output for error messages.
fn tail(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(ERROR_TAIL_LINES);
    lines[start..].join("\n").trim().to_string()
}

fn is_daemon_unreachable(stderr: &str) -> bool {
    DAEMON_UNREACHABLE.iter().any(|p| stderr.contains(p))
}

fn is_missing(stderr: &str) -> bool {
    stderr.contains("No such container")
        || stderr.contains("No such object")
        || stderr.contains("is already in progress")
}

/// Rounds a duration up to whole seconds, at least one.
fn whole_seconds(after: Duration) -> u64 {
    let secs = after.as_secs() + u64::from(after.subsec_nanos() > 0);
    secs.max(1)
}

/// Parses one `ID<TAB>Names<TAB>CreatedAt` line from `docker ps`.
fn parse_ps_line(line: &str) -> Option<ManagedContainer> {
    let mut fields = line.split('\t');
    let id = fields.next()?.trim();
    let name = fields.next()?.trim();
    if id.is_empty() || name.is_empty() {
        return None;
    }
    let created_at = fields.next().and_then(parse_ps_timestamp);
    Some(ManagedContainer {
        id: id.to_string(),
        name: InstanceName::new(name),
        created_at,
    })
}

/// Parses `2026-10-16 09:12:44 +0000 UTC`, ignoring the zone name.
fn parse_ps_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let head: Vec<&str> = raw.split_whitespace().take(3).collect();
    if head.len() < 3 {
        return None;
    }
    DateTime::parse_from_str(&head.join(" "), "%Y-%m-%d %H:%M:%S %z")
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Starts the removal in a new process group. The launching shell exits
/// immediately, leaving the sleeper orphaned so it outlives the test
/// process.
#[cfg(unix)]
fn spawn_expiry(binary: &Path, container: &str, secs: u64) -> Result<()> {
    use std::os::unix::process::CommandExt;

    let status = Command::new("sh")
        .arg("-c")
        .arg(EXPIRY_SCRIPT)
        .arg(secs.to_string())
        .arg(binary)
        .arg(container)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .status()
        .map_err(|e| FixturaError::Io {
            path: PathBuf::from("sh"),
            source: e,
        })?;
    if !status.success() {
        return Err(FixturaError::Purge {
            name: container.to_string(),
            message: format!("could not schedule expiry: shell exited with {status}"),
        });
    }
    Ok(())
}

/// Expiry needs a POSIX shell, which non-Unix hosts do not provide.
#[cfg(not(unix))]
fn spawn_expiry(_binary: &Path, _container: &str, _secs: u64) -> Result<()> {
    Err(FixturaError::Config {
        message: "container expiry requires a Unix host".into(),
    })
}
