//! System-wide constants and defaults.

/// Prefix prepended to every fixture container name.
pub const DEFAULT_NAMESPACE_PREFIX: &str = "fixtura-";

/// Label used when the caller does not supply one.
pub const DEFAULT_LABEL: &str = "fixture";

/// Repository under which built fixture images are tagged.
pub const IMAGE_REPOSITORY: &str = "fixtura";

/// Number of hex characters of the build-file digest used as the image tag.
pub const IMAGE_TAG_HEX_LENGTH: usize = 16;

/// Container label marking a container as created by fixtura.
pub const MANAGED_LABEL: &str = "io.fixtura.managed";

/// Container label carrying the caller-supplied fixture label.
pub const FIXTURE_LABEL: &str = "io.fixtura.label";

/// Delay between two readiness polls, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Host substituted for unspecified bind addresses (`0.0.0.0`, `::`).
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Name of the Docker CLI binary looked up on `PATH`.
pub const DOCKER_BINARY: &str = "docker";

/// Environment variable overriding the Docker binary path.
pub const ENV_DOCKER: &str = "FIXTURA_DOCKER";
/// Environment variable overriding the namespace prefix.
pub const ENV_PREFIX: &str = "FIXTURA_PREFIX";
/// Environment variable overriding the poll interval (milliseconds).
pub const ENV_POLL_INTERVAL_MS: &str = "FIXTURA_POLL_INTERVAL_MS";
/// Environment variable setting a readiness timeout (seconds).
pub const ENV_READY_TIMEOUT_SECS: &str = "FIXTURA_READY_TIMEOUT_SECS";
/// Environment variable setting a default expiry for every fixture (seconds).
pub const ENV_EXPIRE_SECS: &str = "FIXTURA_EXPIRE_SECS";
/// Environment variable overriding the host used in endpoints.
pub const ENV_HOST: &str = "FIXTURA_HOST";

/// Application name used in CLI output.
pub const APP_NAME: &str = "fixtura";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "fixtura";
