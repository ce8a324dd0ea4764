//! The engine connection shared by every fixture.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use fixtura_common::config::FixturaConfig;
use fixtura_common::error::Result;
use fixtura_common::types::InstanceName;

use crate::backend::{self, ContainerBackend, InstanceRef, ManagedContainer, RunRequest};
use crate::inspect::InspectionRecord;

/// A handshaken connection to a container engine.
///
/// Construct one per test process and share it (it is `Send + Sync`);
/// the engine keeps no per-fixture state.
pub struct Engine {
    backend: Box<dyn ContainerBackend>,
    config: FixturaConfig,
    server_version: String,
}

impl Engine {
    /// Connects to the Docker engine described by the configuration.
    ///
    /// # Errors
    ///
    /// Returns `FixturaError::Connection` if Docker cannot be found or
    /// does not answer the handshake.
    pub fn connect(config: FixturaConfig) -> Result<Self> {
        let backend = backend::detect_backend(&config)?;
        Self::with_backend(backend, config)
    }

    /// Connects using configuration read from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment is invalid or the engine is
    /// unreachable.
    pub fn from_env() -> Result<Self> {
        Self::connect(FixturaConfig::from_env()?)
    }

    /// Connects through an explicit backend.
    ///
    /// # Errors
    ///
    /// Returns `FixturaError::Connection` if the backend handshake fails.
    pub fn with_backend(backend: Box<dyn ContainerBackend>, config: FixturaConfig) -> Result<Self> {
        let server_version = backend.ping()?;
        tracing::info!(version = %server_version, "connected to container engine");
        Ok(Self {
            backend,
            config,
            server_version,
        })
    }

    /// Returns the configuration this engine was created with.
    #[must_use]
    pub const fn config(&self) -> &FixturaConfig {
        &self.config
    }

    /// Returns the engine version reported during the handshake.
    #[must_use]
    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Builds an image and starts a container from it.
    ///
    /// # Errors
    ///
    /// Returns `FixturaError::Build` or `FixturaError::Start`.
    pub fn build_and_run(&self, request: &RunRequest) -> Result<InstanceRef> {
        self.backend.build_and_run(request)
    }

    /// Inspects a container by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried.
    pub fn inspect(&self, name: &InstanceName) -> Result<Option<InspectionRecord>> {
        self.backend.inspect(name)
    }

    /// Force-removes a container.
    ///
    /// # Errors
    ///
    /// Returns `FixturaError::Purge` if the engine refuses.
    pub fn purge(&self, instance: &InstanceRef) -> Result<()> {
        self.backend.purge(instance)
    }

    /// Schedules forced removal of a container after `after`.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal cannot be scheduled.
    pub fn schedule_expiry(&self, instance: &InstanceRef, after: Duration) -> Result<()> {
        self.backend.schedule_expiry(instance, after)
    }

    /// Lists managed containers whose name starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried.
    pub fn list_managed(&self, prefix: &str) -> Result<Vec<ManagedContainer>> {
        self.backend.list_managed(prefix)
    }

    /// Lists the managed containers a sweep would purge.
    ///
    /// With `older_than` set, containers younger than that (or with no
    /// known creation time) are left out.
    ///
    /// # Errors
    ///
    /// Returns an error if the containers cannot be listed.
    pub fn sweep_candidates(&self, older_than: Option<Duration>) -> Result<Vec<ManagedContainer>> {
        let now = Utc::now();
        let mut candidates = self.list_managed(&self.config.namespace_prefix)?;
        if let Some(min_age) = older_than {
            candidates.retain(|container| {
                container
                    .created_at
                    .is_some_and(|created| (now - created).to_std().is_ok_and(|age| age >= min_age))
            });
        }
        Ok(candidates)
    }

    /// Purges the containers returned by [`sweep_candidates`](Self::sweep_candidates).
    ///
    /// Individual purge failures are logged and skipped. Returns the
    /// containers that were purged.
    ///
    /// # Errors
    ///
    /// Returns an error if the containers cannot be listed.
    pub fn sweep(&self, older_than: Option<Duration>) -> Result<Vec<ManagedContainer>> {
        let mut purged = Vec::new();
        for container in self.sweep_candidates(older_than)? {
            match self.purge(&container.instance()) {
                Ok(()) => purged.push(container),
                Err(e) => tracing::warn!(name = %container.name, error = %e, "sweep could not purge container"),
            }
        }

        tracing::info!(count = purged.len(), prefix = %self.config.namespace_prefix, "sweep finished");
        Ok(purged)
    }

    /// Returns whether the backend is usable on this host.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("server_version", &self.server_version)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use fixtura_common::error::FixturaError;
    use fixtura_common::types::ImageTag;

    use super::*;
    use crate::backend::memory::InMemoryBackend;
    use crate::image::BuildContext;

    fn request(name: &str) -> RunRequest {
        RunRequest {
            name: InstanceName::new(name),
            build: BuildContext {
                build_file: PathBuf::from("/src/test/Dockerfile"),
                context_dir: PathBuf::from("/src/test"),
                tag: ImageTag::new("fixtura/test:0011223344556677"),
            },
            build_args: Vec::new(),
            auto_remove: true,
            publish_all: true,
            env: Vec::new(),
            labels: Vec::new(),
            command: Vec::new(),
        }
    }

    #[test]
    fn handshake_failure_is_a_connection_error() {
        let err = Engine::with_backend(
            Box::new(InMemoryBackend::new().offline()),
            FixturaConfig::default(),
        )
        .expect_err("offline");
        assert!(matches!(err, FixturaError::Connection { .. }));
    }

    #[test]
    fn handshake_records_server_version() {
        let engine = Engine::with_backend(Box::new(InMemoryBackend::new()), FixturaConfig::default())
            .expect("connect");
        assert_eq!(engine.server_version(), "simulated");
        assert!(engine.is_available());
    }

    #[test]
    fn sweep_purges_only_prefixed_containers() {
        let sim = Arc::new(InMemoryBackend::new());
        let engine = Engine::with_backend(Box::new(Arc::clone(&sim)), FixturaConfig::default())
            .expect("connect");
        let mine = engine.build_and_run(&request("fixtura-web-1")).expect("mine");
        let theirs = engine.build_and_run(&request("postgres-dev")).expect("theirs");

        let purged = engine.sweep(None).expect("sweep");

        assert_eq!(purged.len(), 1);
        assert!(!sim.contains(&mine.name));
        assert!(sim.contains(&theirs.name));
    }

    #[test]
    fn sweep_respects_minimum_age() {
        let sim = Arc::new(InMemoryBackend::new());
        let engine = Engine::with_backend(Box::new(Arc::clone(&sim)), FixturaConfig::default())
            .expect("connect");
        let fresh = engine.build_and_run(&request("fixtura-fresh")).expect("fresh");

        let purged = engine.sweep(Some(Duration::from_secs(3600))).expect("sweep");

        assert!(purged.is_empty());
        assert!(sim.contains(&fresh.name));
    }

    #[test]
    fn sweep_candidates_match_what_sweep_purges() {
        let sim = Arc::new(InMemoryBackend::new());
        let engine = Engine::with_backend(Box::new(Arc::clone(&sim)), FixturaConfig::default())
            .expect("connect");
        let old = engine.build_and_run(&request("fixtura-old")).expect("old");
        let fresh = engine.build_and_run(&request("fixtura-fresh")).expect("fresh");
        let _ = engine.build_and_run(&request("postgres-dev")).expect("theirs");
        sim.backdate(&old.name, chrono::TimeDelta::hours(2));

        let min_age = Some(Duration::from_secs(3600));
        let listed: Vec<_> = engine
            .sweep_candidates(min_age)
            .expect("candidates")
            .into_iter()
            .map(|c| c.name)
            .collect();
        let purged: Vec<_> = engine.sweep(min_age).expect("sweep").into_iter().map(|c| c.name).collect();

        assert_eq!(listed, vec![old.name.clone()]);
        assert_eq!(listed, purged);
        assert!(sim.contains(&fresh.name));

        let listed: Vec<_> = engine
            .sweep_candidates(None)
            .expect("candidates")
            .into_iter()
            .map(|c| c.name)
            .collect();
        let purged: Vec<_> = engine.sweep(None).expect("sweep").into_iter().map(|c| c.name).collect();
        assert_eq!(listed, vec![fresh.name]);
        assert_eq!(listed, purged);
    }
}
