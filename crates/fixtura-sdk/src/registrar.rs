//! Cleanup registrar: scope-bound purge of a fixture container.
//!
//! A [`CleanupGuard`] is created as soon as the engine confirms the
//! container exists. Dropping it, on any exit path including panic
//! unwinding, runs the registered teardown hooks in reverse order and then
//! purges the container. The purge is attempted exactly once.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use fixtura_common::error::Result;
use fixtura_runtime::backend::InstanceRef;
use fixtura_runtime::engine::Engine;

type TeardownHook = Box<dyn FnOnce() + Send>;

/// Owns the obligation to purge one container.
pub struct CleanupGuard {
    engine: Arc<Engine>,
    instance: Option<InstanceRef>,
    hooks: Vec<TeardownHook>,
}

impl CleanupGuard {
    /// Binds the purge of `instance` to the lifetime of the returned guard.
    #[must_use]
    pub fn register(engine: Arc<Engine>, instance: InstanceRef) -> Self {
        tracing::debug!(name = %instance.name, "cleanup registered");
        Self {
            engine,
            instance: Some(instance),
            hooks: Vec::new(),
        }
    }

    /// Adds an action that runs before the purge. Hooks run last-added
    /// first.
    pub fn on_teardown(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.hooks.push(Box::new(hook));
    }

    /// Returns whether the purge already ran.
    #[must_use]
    pub const fn is_purged(&self) -> bool {
        self.instance.is_none()
    }

    /// Runs the teardown hooks and purges the container now.
    ///
    /// Later calls, including the one from `Drop`, do nothing.
    ///
    /// # Errors
    ///
    /// Returns `FixturaError::Purge` if the engine refused. The purge is
    /// not retried.
    pub fn purge(&mut self) -> Result<()> {
        let Some(instance) = self.instance.take() else {
            return Ok(());
        };

        while let Some(hook) = self.hooks.pop() {
            if catch_unwind(AssertUnwindSafe(hook)).is_err() {
                tracing::warn!(name = %instance.name, "teardown hook panicked");
            }
        }

        self.engine.purge(&instance)
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let name = self.instance.as_ref().map(|i| i.name.clone());
        if let Err(e) = self.purge() {
            if let Some(name) = name {
                tracing::warn!(name = %name, error = %e, "fixture purge failed");
            }
        }
    }
}

impl std::fmt::Debug for CleanupGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupGuard")
            .field("instance", &self.instance)
            .field("hooks", &self.hooks.len())
            .finish_non_exhaustive()
    }
}
