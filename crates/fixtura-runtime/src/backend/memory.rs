//! In-memory container engine for exercising fixture lifecycles without
//! Docker.
//!
//! Each simulated container replays a scripted sequence of health states,
//! one per inspection, and keeps the last state once the script runs out.
//! Counters record every purge, inspection and expiry so tests can assert on
//! lifecycle guarantees.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use fixtura_common::error::{FixturaError, Result};
use fixtura_common::types::{HealthState, InstanceName, PortSpec};

use super::{ContainerBackend, InstanceRef, ManagedContainer, RunRequest};
use crate::inspect::{HostBinding, InspectionRecord};

/// First host port handed out by the simulation.
const FIRST_HOST_PORT: u16 = 32768;

/// What happens to a simulated container after a number of inspections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedFate {
    /// The container keeps running.
    Stays,
    /// The main process exits once `polls` inspections have been answered.
    ExitsAfter {
        /// Inspections answered before the exit.
        polls: usize,
        /// Exit code reported afterwards.
        exit_code: i64,
    },
    /// The container disappears once `polls` inspections have been answered.
    VanishesAfter {
        /// Inspections answered before it disappears.
        polls: usize,
    },
}

#[derive(Debug)]
struct SimContainer {
    id: String,
    script: VecDeque<HealthState>,
    health: HealthState,
    ports: BTreeMap<PortSpec, Vec<HostBinding>>,
    running: bool,
    status: String,
    exit_code: Option<i64>,
    polls: usize,
    created_at: DateTime<Utc>,
    expires_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct SimState {
    containers: BTreeMap<InstanceName, SimContainer>,
    purges: HashMap<InstanceName, usize>,
    inspections: HashMap<InstanceName, usize>,
    last_health: HashMap<InstanceName, HealthState>,
    expiries: Vec<(InstanceName, Duration)>,
    runs: Vec<RunRequest>,
    next_id: u64,
}

impl SimState {
    fn reap_expired(&mut self) {
        let now = Instant::now();
        self.containers
            .retain(|_, c| c.expires_at.is_none_or(|deadline| deadline > now));
    }
}

/// Simulated engine holding containers in memory.
#[derive(Debug)]
pub struct InMemoryBackend {
    state: Mutex<SimState>,
    health_script: Vec<HealthState>,
    published: Vec<PortSpec>,
    fate: SimulatedFate,
    build_failure: Option<String>,
    start_failure: Option<String>,
    purge_failure: Option<String>,
    offline: bool,
    next_port: AtomicU16,
}

impl InMemoryBackend {
    /// Creates a simulation whose containers are immediately healthy and
    /// publish `80/tcp`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState::default()),
            health_script: vec![HealthState::Healthy],
            published: vec![PortSpec::tcp(80)],
            fate: SimulatedFate::Stays,
            build_failure: None,
            start_failure: None,
            purge_failure: None,
            offline: false,
            next_port: AtomicU16::new(FIRST_HOST_PORT),
        }
    }

    /// Sets the health states reported by successive inspections.
    #[must_use]
    pub fn with_health_script(mut self, script: Vec<HealthState>) -> Self {
        self.health_script = script;
        self
    }

    /// Sets the internal ports every container publishes.
    #[must_use]
    pub fn with_published_ports(mut self, ports: Vec<PortSpec>) -> Self {
        self.published = ports;
        self
    }

    /// Sets what happens to containers after some inspections.
    #[must_use]
    pub const fn with_fate(mut self, fate: SimulatedFate) -> Self {
        self.fate = fate;
        self
    }

    /// Makes every image build fail with the given engine output.
    #[must_use]
    pub fn failing_build(mut self, message: impl Into<String>) -> Self {
        self.build_failure = Some(message.into());
        self
    }

    /// Makes every container start fail with the given engine output.
    #[must_use]
    pub fn failing_start(mut self, message: impl Into<String>) -> Self {
        self.start_failure = Some(message.into());
        self
    }

    /// Makes every purge fail with the given engine output.
    #[must_use]
    pub fn failing_purge(mut self, message: impl Into<String>) -> Self {
        self.purge_failure = Some(message.into());
        self
    }

    /// Simulates an unreachable engine.
    #[must_use]
    pub const fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    /// Returns how many times a purge was requested for `name`.
    #[must_use]
    pub fn purge_count(&self, name: &InstanceName) -> usize {
        self.lock().purges.get(name).copied().unwrap_or(0)
    }

    /// Returns how many times `name` was inspected.
    #[must_use]
    pub fn inspect_count(&self, name: &InstanceName) -> usize {
        self.lock().inspections.get(name).copied().unwrap_or(0)
    }

    /// Returns the health state reported by the most recent inspection.
    #[must_use]
    pub fn last_reported_health(&self, name: &InstanceName) -> Option<HealthState> {
        self.lock().last_health.get(name).copied()
    }

    /// Returns whether a container named `name` currently exists.
    #[must_use]
    pub fn contains(&self, name: &InstanceName) -> bool {
        let mut state = self.lock();
        state.reap_expired();
        state.containers.contains_key(name)
    }

    /// Returns the names of all existing containers.
    #[must_use]
    pub fn live_names(&self) -> Vec<InstanceName> {
        let mut state = self.lock();
        state.reap_expired();
        state.containers.keys().cloned().collect()
    }

    /// Moves the creation time of `name` back by `by`, making it look older
    /// to age-filtered sweeps.
    pub fn backdate(&self, name: &InstanceName, by: chrono::TimeDelta) {
        if let Some(container) = self.lock().containers.get_mut(name) {
            container.created_at -= by;
        }
    }

    /// Returns every expiry scheduled so far.
    #[must_use]
    pub fn expiries(&self) -> Vec<(InstanceName, Duration)> {
        self.lock().expiries.clone()
    }

    /// Returns every run request received so far, including failed ones.
    #[must_use]
    pub fn runs(&self) -> Vec<RunRequest> {
        self.lock().runs.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_online(&self) -> Result<()> {
        if self.offline {
            return Err(FixturaError::Connection {
                message: "simulated engine is offline".into(),
            });
        }
        Ok(())
    }

    fn allocate_ports(&self) -> BTreeMap<PortSpec, Vec<HostBinding>> {
        self.published
            .iter()
            .map(|spec| {
                let host_port = self.next_port.fetch_add(1, Ordering::Relaxed);
                let binding = HostBinding {
                    host_ip: "0.0.0.0".into(),
                    host_port,
                };
                (*spec, vec![binding])
            })
            .collect()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBackend for InMemoryBackend {
    fn ping(&self) -> Result<String> {
        self.check_online()?;
        Ok("simulated".into())
    }

    fn build_and_run(&self, request: &RunRequest) -> Result<InstanceRef> {
        self.check_online()?;
        let mut state = self.lock();
        state.runs.push(request.clone());
        state.reap_expired();

        if let Some(message) = &self.build_failure {
            return Err(FixturaError::Build {
                build_file: request.build.build_file.clone(),
                message: message.clone(),
            });
        }
        if let Some(message) = &self.start_failure {
            return Err(FixturaError::Start {
                name: request.name.to_string(),
                message: message.clone(),
            });
        }
        if state.containers.contains_key(&request.name) {
            return Err(FixturaError::Start {
                name: request.name.to_string(),
                message: format!("container name {} is already in use", request.name),
            });
        }

        state.next_id += 1;
        let id = format!("sim{:012x}", state.next_id);
        let container = SimContainer {
            id: id.clone(),
            script: self.health_script.iter().copied().collect(),
            health: HealthState::Unknown,
            ports: self.allocate_ports(),
            running: true,
            status: "running".into(),
            exit_code: None,
            polls: 0,
            created_at: Utc::now(),
            expires_at: None,
        };
        let _ = state.containers.insert(request.name.clone(), container);
        tracing::debug!(name = %request.name, id = %id, "simulated container started");

        Ok(InstanceRef {
            id,
            name: request.name.clone(),
        })
    }

    fn inspect(&self, name: &InstanceName) -> Result<Option<InspectionRecord>> {
        self.check_online()?;
        let mut state = self.lock();
        state.reap_expired();
        *state.inspections.entry(name.clone()).or_insert(0) += 1;

        let Some(container) = state.containers.get_mut(name) else {
            return Ok(None);
        };
        let answered = container.polls;
        container.polls += 1;

        match self.fate {
            SimulatedFate::VanishesAfter { polls } if answered >= polls => {
                let _ = state.containers.remove(name);
                return Ok(None);
            }
            SimulatedFate::ExitsAfter { polls, exit_code } if answered >= polls => {
                container.running = false;
                container.status = "exited".into();
                container.exit_code = Some(exit_code);
            }
            _ => {}
        }
        if let Some(next) = container.script.pop_front() {
            container.health = next;
        }

        let record = InspectionRecord {
            id: container.id.clone(),
            name: name.clone(),
            status: container.status.clone(),
            running: container.running,
            exit_code: container.exit_code,
            health: container.health,
            ports: container.ports.clone(),
            created_at: Some(container.created_at),
        };
        let _ = state.last_health.insert(name.clone(), record.health);
        Ok(Some(record))
    }

    fn purge(&self, instance: &InstanceRef) -> Result<()> {
        self.check_online()?;
        let mut state = self.lock();
        *state.purges.entry(instance.name.clone()).or_insert(0) += 1;
        if let Some(message) = &self.purge_failure {
            return Err(FixturaError::Purge {
                name: instance.name.to_string(),
                message: message.clone(),
            });
        }
        let _ = state.containers.remove(&instance.name);
        Ok(())
    }

    fn schedule_expiry(&self, instance: &InstanceRef, after: Duration) -> Result<()> {
        self.check_online()?;
        let mut state = self.lock();
        state.expiries.push((instance.name.clone(), after));
        if let Some(container) = state.containers.get_mut(&instance.name) {
            container.expires_at = Some(Instant::now() + after);
        }
        Ok(())
    }

    fn list_managed(&self, prefix: &str) -> Result<Vec<ManagedContainer>> {
        self.check_online()?;
        let mut state = self.lock();
        state.reap_expired();
        Ok(state
            .containers
            .iter()
            .filter(|(name, _)| name.as_str().starts_with(prefix))
            .map(|(name, c)| ManagedContainer {
                id: c.id.clone(),
                name: name.clone(),
                created_at: Some(c.created_at),
            })
            .collect())
    }

    fn is_available(&self) -> bool {
        !self.offline
    }
}
