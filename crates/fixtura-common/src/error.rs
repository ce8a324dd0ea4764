//! Unified error type for the fixtura workspace.
//!
//! Errors on the setup path (connect, build, start, readiness) are fatal for
//! the test that asked for the fixture. Errors on the teardown path are only
//! ever logged. Endpoint lookups are recoverable by the caller.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum FixturaError {
    /// The runtime engine cannot be reached at all.
    #[error("cannot connect to container engine: {message}")]
    Connection {
        /// Description of the connection failure.
        message: String,
    },

    /// The build file is invalid or the image failed to build.
    #[error("failed to build {}: {message}", build_file.display())]
    Build {
        /// Build file that was being built.
        build_file: PathBuf,
        /// Engine output or description of the failure.
        message: String,
    },

    /// The engine refused to start the container.
    #[error("failed to start container {name}: {message}")]
    Start {
        /// Instance name that failed to start.
        name: String,
        /// Engine output or description of the failure.
        message: String,
    },

    /// The container disappeared from the engine before becoming healthy.
    #[error("container {name} vanished before becoming healthy")]
    Vanished {
        /// Instance name.
        name: String,
    },

    /// The container stopped running before becoming healthy.
    #[error("container {name} exited before becoming healthy (status {status}, exit code {exit_code:?})")]
    Exited {
        /// Instance name.
        name: String,
        /// Engine status string (`exited`, `dead`, ...).
        status: String,
        /// Exit code reported by the engine, if any.
        exit_code: Option<i64>,
    },

    /// The opt-in readiness timeout elapsed.
    #[error("container {name} not healthy after {waited:?}")]
    ReadinessTimeout {
        /// Instance name.
        name: String,
        /// Time spent polling.
        waited: Duration,
    },

    /// The requested internal port has no host binding.
    #[error("port {port} is not published by container {name}")]
    PortNotPublished {
        /// Instance name.
        name: String,
        /// Requested internal port specification.
        port: String,
    },

    /// Forced removal of a container failed.
    #[error("failed to purge container {name}: {message}")]
    Purge {
        /// Instance name.
        name: String,
        /// Engine output or description of the failure.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// The readiness wait was interrupted by the caller.
    #[error("readiness wait for container {name} was cancelled")]
    Cancelled {
        /// Instance name.
        name: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl FixturaError {
    /// Returns whether this error means a fixture could not be set up.
    ///
    /// Setup failures cannot be recovered from at the fixture layer; the
    /// test-framework adapter turns them into an aborted test.
    #[must_use]
    pub const fn is_setup_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::Build { .. }
                | Self::Start { .. }
                | Self::Vanished { .. }
                | Self::Exited { .. }
                | Self::ReadinessTimeout { .. }
                | Self::Cancelled { .. }
        )
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, FixturaError>;
