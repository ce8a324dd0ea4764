//! Shared scaffolding for unit tests.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fixtura_common::config::FixturaConfig;
use fixtura_runtime::backend::memory::InMemoryBackend;
use fixtura_runtime::engine::Engine;

/// Connects an engine to the simulation with a 1 ms poll interval.
pub fn engine_for(sim: &Arc<InMemoryBackend>) -> Arc<Engine> {
    let config = FixturaConfig {
        poll_interval: Duration::from_millis(1),
        ..FixturaConfig::default()
    };
    Arc::new(Engine::with_backend(Box::new(Arc::clone(sim)), config).expect("connect"))
}

/// Writes a minimal build file into a fresh directory.
pub fn build_file() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("Dockerfile");
    std::fs::write(
        &path,
        "FROM busybox\nEXPOSE 80\nHEALTHCHECK --interval=1s CMD wget -q -O- http://localhost/ || exit 1\n",
    )
    .expect("write Dockerfile");
    (dir, path)
}
