//! Container engine abstraction.

pub mod docker;
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fixtura_common::config::FixturaConfig;
use fixtura_common::error::Result;
use fixtura_common::types::InstanceName;

use crate::image::BuildContext;
use crate::inspect::InspectionRecord;

/// Everything the engine needs to build an image and start one container
/// from it.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Unique container name.
    pub name: InstanceName,
    /// Resolved build file, context and image tag.
    pub build: BuildContext,
    /// Build-time arguments.
    pub build_args: Vec<(String, String)>,
    /// Remove the container as soon as it stops.
    pub auto_remove: bool,
    /// Publish every exposed port on a random host port.
    pub publish_all: bool,
    /// Environment variables for the container process.
    pub env: Vec<(String, String)>,
    /// Container labels.
    pub labels: Vec<(String, String)>,
    /// Command override. Empty keeps the image default.
    pub command: Vec<String>,
}

/// Reference to a container the engine has confirmed exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceRef {
    /// Engine-assigned container ID.
    pub id: String,
    /// Container name.
    pub name: InstanceName,
}

/// A container carrying the fixtura management label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedContainer {
    /// Engine-assigned container ID.
    pub id: String,
    /// Container name.
    pub name: InstanceName,
    /// Creation timestamp, when the engine reports one.
    pub created_at: Option<DateTime<Utc>>,
}

impl ManagedContainer {
    /// Returns the reference used to purge this container.
    #[must_use]
    pub fn instance(&self) -> InstanceRef {
        InstanceRef {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// Operations fixtura consumes from a container engine.
///
/// Calls are synchronous; a backend blocks the calling thread until the
/// engine answers.
pub trait ContainerBackend: Send + Sync {
    /// Performs a handshake and returns the engine's server version.
    ///
    /// # Errors
    ///
    /// Returns `FixturaError::Connection` if the engine is unreachable.
    fn ping(&self) -> Result<String>;

    /// Builds the image described by the request and starts one container.
    ///
    /// On failure no container with the requested name is left behind.
    ///
    /// # Errors
    ///
    /// Returns `FixturaError::Build` or `FixturaError::Start`.
    fn build_and_run(&self, request: &RunRequest) -> Result<InstanceRef>;

    /// Inspects a container by name. `Ok(None)` means it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried.
    fn inspect(&self, name: &InstanceName) -> Result<Option<InspectionRecord>>;

    /// Force-stops and removes a container. A container that is already
    /// gone counts as purged.
    ///
    /// # Errors
    ///
    /// Returns `FixturaError::Purge` if the engine refuses.
    fn purge(&self, instance: &InstanceRef) -> Result<()>;

    /// Schedules a forced removal after `after`, independent of this process.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal cannot be scheduled.
    fn schedule_expiry(&self, instance: &InstanceRef, after: Duration) -> Result<()>;

    /// Lists managed containers whose name starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried.
    fn list_managed(&self, prefix: &str) -> Result<Vec<ManagedContainer>>;

    /// Returns whether this backend can be used on the current host.
    fn is_available(&self) -> bool;
}

impl<T: ContainerBackend + ?Sized> ContainerBackend for Arc<T> {
    fn ping(&self) -> Result<String> {
        (**self).ping()
    }

    fn build_and_run(&self, request: &RunRequest) -> Result<InstanceRef> {
        (**self).build_and_run(request)
    }

    fn inspect(&self, name: &InstanceName) -> Result<Option<InspectionRecord>> {
        (**self).inspect(name)
    }

    fn purge(&self, instance: &InstanceRef) -> Result<()> {
        (**self).purge(instance)
    }

    fn schedule_expiry(&self, instance: &InstanceRef, after: Duration) -> Result<()> {
        (**self).schedule_expiry(instance, after)
    }

    fn list_managed(&self, prefix: &str) -> Result<Vec<ManagedContainer>> {
        (**self).list_managed(prefix)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

/// Creates the Docker CLI backend described by the configuration.
///
/// # Errors
///
/// Returns `FixturaError::Connection` if no Docker binary can be found.
pub fn detect_backend(config: &FixturaConfig) -> Result<Box<dyn ContainerBackend>> {
    let backend = docker::DockerCliBackend::from_config(config)?;
    Ok(Box::new(backend))
}
