//! Fixture specification: what to build and how to run it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fixtura_common::constants::DEFAULT_LABEL;

/// Describes one fixture. Consumed by value when a fixture is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureSpec {
    build_file: PathBuf,
    label: Option<String>,
    env: Vec<(String, String)>,
    command: Vec<String>,
    container_labels: Vec<(String, String)>,
    build_args: Vec<(String, String)>,
    auto_remove: bool,
    expire_after: Option<Duration>,
    ready_timeout: Option<Duration>,
}

impl FixtureSpec {
    /// Creates a specification for the given build file.
    ///
    /// The directory containing the build file is the build context.
    #[must_use]
    pub fn new(build_file: impl Into<PathBuf>) -> Self {
        Self {
            build_file: build_file.into(),
            label: None,
            env: Vec::new(),
            command: Vec::new(),
            container_labels: Vec::new(),
            build_args: Vec::new(),
            auto_remove: true,
            expire_after: None,
            ready_timeout: None,
        }
    }

    /// Sets the label inserted between the namespace prefix and the unique
    /// suffix of the instance name.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Adds an environment variable for the container process.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Overrides the image's default command.
    #[must_use]
    pub fn command(mut self, cmd: Vec<String>) -> Self {
        self.command = cmd;
        self
    }

    /// Adds a container label.
    #[must_use]
    pub fn container_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.container_labels.push((key.into(), value.into()));
        self
    }

    /// Adds a build-time argument.
    #[must_use]
    pub fn build_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.build_args.push((key.into(), value.into()));
        self
    }

    /// Sets whether the engine removes the container once it stops.
    /// Enabled by default.
    #[must_use]
    pub const fn auto_remove(mut self, enabled: bool) -> Self {
        self.auto_remove = enabled;
        self
    }

    /// Schedules forced removal this long after the container starts,
    /// even if the test process is killed before its scope ends.
    #[must_use]
    pub const fn expire_after(mut self, after: Duration) -> Self {
        self.expire_after = Some(after);
        self
    }

    /// Bounds the readiness wait.
    #[must_use]
    pub const fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = Some(timeout);
        self
    }

    /// Returns the build file reference.
    #[must_use]
    pub fn build_file(&self) -> &Path {
        &self.build_file
    }

    /// Returns the label, or the default label when none was set.
    #[must_use]
    pub fn label_or_default(&self) -> &str {
        self.label.as_deref().unwrap_or(DEFAULT_LABEL)
    }

    /// Returns the environment variables.
    #[must_use]
    pub fn env_vars(&self) -> &[(String, String)] {
        &self.env
    }

    /// Returns the command override.
    #[must_use]
    pub fn command_override(&self) -> &[String] {
        &self.command
    }

    /// Returns the extra container labels.
    #[must_use]
    pub fn container_labels(&self) -> &[(String, String)] {
        &self.container_labels
    }

    /// Returns the build-time arguments.
    #[must_use]
    pub fn build_args(&self) -> &[(String, String)] {
        &self.build_args
    }

    /// Returns whether the container is removed once it stops.
    #[must_use]
    pub const fn is_auto_remove(&self) -> bool {
        self.auto_remove
    }

    /// Returns the expiry requested for this fixture.
    #[must_use]
    pub const fn expiry(&self) -> Option<Duration> {
        self.expire_after
    }

    /// Returns the readiness timeout requested for this fixture.
    #[must_use]
    pub const fn readiness_timeout(&self) -> Option<Duration> {
        self.ready_timeout
    }
}
