//! Instance handle: a healthy fixture container and its published endpoints.

use std::sync::Arc;
use std::time::Duration;

use fixtura_common::error::{FixturaError, Result};
use fixtura_common::types::{HealthState, HostEndpoint, InstanceName, PortSpec};
use fixtura_runtime::backend::InstanceRef;
use fixtura_runtime::engine::Engine;
use fixtura_runtime::inspect::InspectionRecord;

/// A running, healthy fixture container.
///
/// The handle carries the inspection taken when readiness was confirmed;
/// port bindings do not change for the life of the container. It is only
/// reachable through the owning `Fixture` and cannot be cloned out of it.
///
/// ```compile_fail
/// fn outlives_fixture<T: Clone>() {}
/// outlives_fixture::<fixtura_sdk::InstanceHandle>();
/// ```
#[derive(Debug)]
pub struct InstanceHandle {
    engine: Arc<Engine>,
    instance: InstanceRef,
    record: InspectionRecord,
}

impl InstanceHandle {
    pub(crate) const fn new(engine: Arc<Engine>, instance: InstanceRef, record: InspectionRecord) -> Self {
        Self {
            engine,
            instance,
            record,
        }
    }

    /// Returns the instance name.
    #[must_use]
    pub const fn name(&self) -> &InstanceName {
        &self.instance.name
    }

    /// Returns the engine-assigned container id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.instance.id
    }

    /// Returns the engine reference for this container.
    #[must_use]
    pub const fn instance(&self) -> &InstanceRef {
        &self.instance
    }

    /// Returns the inspection that confirmed readiness.
    #[must_use]
    pub const fn record(&self) -> &InspectionRecord {
        &self.record
    }

    /// Returns the health observed at readiness.
    #[must_use]
    pub const fn health(&self) -> HealthState {
        self.record.health
    }

    /// Returns the host endpoint for an internal port such as `"80/tcp"`.
    ///
    /// # Errors
    ///
    /// Returns `FixturaError::Config` if `port` does not parse and
    /// `FixturaError::PortNotPublished` if the container has no binding for
    /// it.
    pub fn host_endpoint(&self, port: &str) -> Result<HostEndpoint> {
        self.endpoint_for(port.parse()?)
    }

    /// Returns the host endpoint for an internal port.
    ///
    /// # Errors
    ///
    /// Returns `FixturaError::PortNotPublished` if the container has no
    /// binding for `port`.
    pub fn endpoint_for(&self, port: PortSpec) -> Result<HostEndpoint> {
        self.record
            .binding(&port)
            .map(|b| b.endpoint(&self.engine.config().host))
            .ok_or_else(|| FixturaError::PortNotPublished {
                name: self.instance.name.to_string(),
                port: port.to_string(),
            })
    }

    /// Returns `host:port` for an internal port such as `"80/tcp"`.
    ///
    /// # Errors
    ///
    /// Same as [`host_endpoint`](Self::host_endpoint).
    pub fn host_port(&self, port: &str) -> Result<String> {
        self.host_endpoint(port).map(|e| e.to_string())
    }

    /// Lists every published internal port with its host endpoint.
    #[must_use]
    pub fn endpoints(&self) -> Vec<(PortSpec, HostEndpoint)> {
        let host = &self.engine.config().host;
        self.record
            .ports
            .iter()
            .filter_map(|(port, bindings)| bindings.first().map(|b| (*port, b.endpoint(host))))
            .collect()
    }

    /// Schedules forced removal of the container after `after`, independent
    /// of this process. Calling it again schedules another removal; the
    /// earliest one wins.
    ///
    /// # Errors
    ///
    /// Returns an engine error if the schedule could not be placed.
    pub fn expire(&self, after: Duration) -> Result<()> {
        tracing::debug!(name = %self.instance.name, ?after, "scheduling expiry");
        self.engine.schedule_expiry(&self.instance, after)
    }

    /// Same as [`expire`](Self::expire) with a delay in whole seconds.
    ///
    /// # Errors
    ///
    /// Returns an engine error if the schedule could not be placed.
    pub fn expire_secs(&self, secs: u64) -> Result<()> {
        self.expire(Duration::from_secs(secs))
    }
}
