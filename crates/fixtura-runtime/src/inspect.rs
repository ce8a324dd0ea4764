//! Container inspection records.
//!
//! An [`InspectionRecord`] is the engine's snapshot of one container at the
//! moment it was queried: lifecycle status, health, and the published-port
//! map used for endpoint lookup.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use fixtura_common::error::Result;
use fixtura_common::types::{HealthState, HostEndpoint, InstanceName, PortSpec};
use serde::Deserialize;

/// A single host-side binding of a published port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBinding {
    /// Address the port is bound to on the host (may be unspecified).
    pub host_ip: String,
    /// Port on the host.
    pub host_port: u16,
}

impl HostBinding {
    /// Converts the binding into a reachable endpoint.
    ///
    /// Unspecified addresses (`0.0.0.0`, `::`, empty) are replaced by
    /// `fallback_host`.
    #[must_use]
    pub fn endpoint(&self, fallback_host: &str) -> HostEndpoint {
        let host = match self.host_ip.as_str() {
            "" | "0.0.0.0" | "::" => fallback_host,
            ip => ip,
        };
        HostEndpoint::new(host, self.host_port)
    }
}

/// Snapshot of a container as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectionRecord {
    /// Engine-assigned container ID.
    pub id: String,
    /// Container name.
    pub name: InstanceName,
    /// Engine lifecycle status (`created`, `running`, `exited`, ...).
    pub status: String,
    /// Whether the container's main process is running.
    pub running: bool,
    /// Exit code, meaningful once the container stopped.
    pub exit_code: Option<i64>,
    /// Result of the declared health check.
    pub health: HealthState,
    /// Published ports and their host bindings.
    pub ports: BTreeMap<PortSpec, Vec<HostBinding>>,
    /// Creation timestamp.
    pub created_at: Option<DateTime<Utc>>,
}

impl InspectionRecord {
    /// Returns the first host binding for an internal port, if published.
    #[must_use]
    pub fn binding(&self, port: &PortSpec) -> Option<&HostBinding> {
        self.ports.get(port).and_then(|bindings| bindings.first())
    }

    /// Returns whether the container has stopped for good.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        !self.running && matches!(self.status.as_str(), "exited" | "dead" | "removing")
    }

    /// Parses the JSON array printed by `docker inspect`.
    ///
    /// # Errors
    ///
    /// Returns `FixturaError::Serialization` if the document is malformed.
    pub fn parse_docker(json: &str) -> Result<Vec<Self>> {
        let raw: Vec<RawContainer> = serde_json::from_str(json)?;
        Ok(raw.into_iter().map(Self::from).collect())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawContainer {
    id: String,
    name: String,
    #[serde(default)]
    created: Option<String>,
    state: RawState,
    #[serde(default)]
    network_settings: Option<RawNetworkSettings>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawState {
    #[serde(default)]
    status: String,
    #[serde(default)]
    running: bool,
    #[serde(default)]
    exit_code: Option<i64>,
    #[serde(default)]
    health: Option<RawHealth>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawHealth {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawNetworkSettings {
    #[serde(default)]
    ports: Option<HashMap<String, Option<Vec<RawBinding>>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawBinding {
    #[serde(default)]
    host_ip: String,
    #[serde(default)]
    host_port: String,
}

impl From<RawContainer> for InspectionRecord {
    fn from(raw: RawContainer) -> Self {
        let mut ports = BTreeMap::new();
        let raw_ports = raw
            .network_settings
            .and_then(|n| n.ports)
            .unwrap_or_default();
        for (key, bindings) in raw_ports {
            let Ok(spec) = key.parse::<PortSpec>() else {
                tracing::debug!(port = %key, "skipping unparsable port key");
                continue;
            };
            let bindings: Vec<HostBinding> = bindings
                .unwrap_or_default()
                .into_iter()
                .filter_map(|b| {
                    Some(HostBinding {
                        host_port: b.host_port.parse().ok()?,
                        host_ip: b.host_ip,
                    })
                })
                .collect();
            let _ = ports.insert(spec, bindings);
        }

        Self {
            id: raw.id,
            name: InstanceName::new(raw.name.trim_start_matches('/')),
            status: raw.state.status,
            running: raw.state.running,
            exit_code: raw.state.exit_code,
            health: raw
                .state
                .health
                .map_or(HealthState::Unknown, |h| HealthState::from_status(&h.status)),
            ports,
            created_at: raw
                .created
                .and_then(|c| DateTime::parse_from_rfc3339(&c).ok())
                .map(|c| c.with_timezone(&Utc)),
        }
    }
}
