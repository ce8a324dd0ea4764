//! Readiness poller: blocks until the engine reports a container healthy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use fixtura_common::config::FixturaConfig;
use fixtura_common::constants::DEFAULT_POLL_INTERVAL_MS;
use fixtura_common::error::{FixturaError, Result};
use fixtura_common::types::HealthState;
use fixtura_runtime::backend::InstanceRef;
use fixtura_runtime::engine::Engine;
use fixtura_runtime::inspect::InspectionRecord;

/// How often to inspect, and for how long at most.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause between inspections.
    pub interval: Duration,
    /// Upper bound on the whole wait. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            timeout: None,
        }
    }
}

impl PollPolicy {
    /// Takes interval and timeout from the configuration.
    #[must_use]
    pub const fn from_config(config: &FixturaConfig) -> Self {
        Self {
            interval: config.poll_interval,
            timeout: config.ready_timeout,
        }
    }

    /// Replaces the timeout when `timeout` is set.
    #[must_use]
    pub const fn with_timeout(self, timeout: Option<Duration>) -> Self {
        match timeout {
            Some(t) => Self {
                timeout: Some(t),
                ..self
            },
            None => self,
        }
    }
}

/// Inspects `instance` until it reports healthy and returns that
/// inspection.
///
/// # Errors
///
/// - `FixturaError::Vanished` if the container no longer exists.
/// - `FixturaError::Exited` if its main process stopped.
/// - `FixturaError::ReadinessTimeout` if the policy timeout elapsed.
/// - Any engine error from the inspection itself.
pub fn await_healthy(
    engine: &Engine,
    instance: &InstanceRef,
    policy: PollPolicy,
) -> Result<InspectionRecord> {
    await_healthy_until(engine, instance, policy, &AtomicBool::new(false))
}

/// Same as [`await_healthy`], but gives up as soon as `cancel` is set.
///
/// The flag is checked before every inspection, so a signal handler that
/// sets it interrupts the wait within one poll interval.
///
/// # Errors
///
/// Everything [`await_healthy`] returns, plus `FixturaError::Cancelled`
/// once `cancel` is observed set.
pub fn await_healthy_until(
    engine: &Engine,
    instance: &InstanceRef,
    policy: PollPolicy,
    cancel: &AtomicBool,
) -> Result<InspectionRecord> {
    let started = Instant::now();
    let mut last = HealthState::Unknown;
    let mut attempts: u64 = 0;

    loop {
        if cancel.load(Ordering::SeqCst) {
            tracing::info!(name = %instance.name, attempts, "readiness wait cancelled");
            return Err(FixturaError::Cancelled {
                name: instance.name.to_string(),
            });
        }
        attempts += 1;
        let Some(record) = engine.inspect(&instance.name)? else {
            return Err(FixturaError::Vanished {
                name: instance.name.to_string(),
            });
        };

        if record.has_exited() {
            return Err(FixturaError::Exited {
                name: instance.name.to_string(),
                status: record.status,
                exit_code: record.exit_code,
            });
        }

        if record.health.is_healthy() {
            tracing::info!(
                name = %instance.name,
                attempts,
                elapsed_ms = started.elapsed().as_millis(),
                "fixture healthy"
            );
            return Ok(record);
        }

        if record.health != last {
            tracing::debug!(name = %instance.name, health = ?record.health, "health changed");
            last = record.health;
        }

        if let Some(timeout) = policy.timeout {
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(FixturaError::ReadinessTimeout {
                    name: instance.name.to_string(),
                    waited,
                });
            }
        }

        std::thread::sleep(policy.interval);
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use fixtura_common::types::{ImageTag, InstanceName};
    use fixtura_runtime::backend::RunRequest;
    use fixtura_runtime::backend::memory::{InMemoryBackend, SimulatedFate};
    use fixtura_runtime::image::BuildContext;

    use super::*;
    use crate::test_support::engine_for;

    const FAST: PollPolicy = PollPolicy {
        interval: Duration::from_millis(1),
        timeout: None,
    };

    fn start(engine: &Engine) -> InstanceRef {
        engine
            .build_and_run(&RunRequest {
                name: InstanceName::new("fixtura-poll"),
                build: BuildContext {
                    build_file: PathBuf::from("/src/Dockerfile"),
                    context_dir: PathBuf::from("/src"),
                    tag: ImageTag::new("fixtura/src:00"),
                },
                build_args: Vec::new(),
                auto_remove: true,
                publish_all: true,
                env: Vec::new(),
                labels: Vec::new(),
                command: Vec::new(),
            })
            .expect("run")
    }

    #[test]
    fn waits_through_non_healthy_states() {
        let sim = Arc::new(InMemoryBackend::new().with_health_script(vec![
            HealthState::Unknown,
            HealthState::Starting,
            HealthState::Unhealthy,
            HealthState::Starting,
            HealthState::Healthy,
        ]));
        let engine = engine_for(&sim);
        let instance = start(&engine);

        let record = await_healthy(&engine, &instance, FAST).expect("healthy");
        assert_eq!(record.health, HealthState::Healthy);
        assert_eq!(sim.inspect_count(&instance.name), 5);
        assert_eq!(sim.last_reported_health(&instance.name), Some(HealthState::Healthy));
    }

    #[test]
    fn vanished_container_fails_fast() {
        let sim = Arc::new(
            InMemoryBackend::new()
                .with_health_script(vec![HealthState::Starting])
                .with_fate(SimulatedFate::VanishesAfter { polls: 2 }),
        );
        let engine = engine_for(&sim);
        let instance = start(&engine);

        let err = await_healthy(&engine, &instance, FAST).expect_err("vanished");
        assert!(matches!(err, FixturaError::Vanished { .. }));
        assert_eq!(sim.inspect_count(&instance.name), 3);
    }

    #[test]
    fn exited_container_reports_exit_code() {
        let sim = Arc::new(
            InMemoryBackend::new()
                .with_health_script(vec![HealthState::Starting])
                .with_fate(SimulatedFate::ExitsAfter {
                    polls: 1,
                    exit_code: 3,
                }),
        );
        let engine = engine_for(&sim);
        let instance = start(&engine);

        let err = await_healthy(&engine, &instance, FAST).expect_err("exited");
        match err {
            FixturaError::Exited { exit_code, .. } => assert_eq!(exit_code, Some(3)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn timeout_bounds_the_wait() {
        let sim = Arc::new(InMemoryBackend::new().with_health_script(vec![HealthState::Starting]));
        let engine = engine_for(&sim);
        let instance = start(&engine);

        let policy = FAST.with_timeout(Some(Duration::from_millis(20)));
        let err = await_healthy(&engine, &instance, policy).expect_err("timeout");
        match err {
            FixturaError::ReadinessTimeout { waited, .. } => {
                assert!(waited >= Duration::from_millis(20));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn set_cancel_flag_stops_the_wait() {
        let sim = Arc::new(InMemoryBackend::new().with_health_script(vec![HealthState::Starting]));
        let engine = engine_for(&sim);
        let instance = start(&engine);
        let cancel = Arc::new(AtomicBool::new(false));

        let setter = {
            let cancel = Arc::clone(&cancel);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10));
                cancel.store(true, Ordering::SeqCst);
            })
        };
        let err = await_healthy_until(&engine, &instance, FAST, &cancel).expect_err("cancelled");
        setter.join().expect("setter thread");

        assert!(matches!(err, FixturaError::Cancelled { .. }));
        assert!(sim.inspect_count(&instance.name) >= 1);
    }

    #[test]
    fn cancel_flag_set_upfront_skips_inspection() {
        let sim = Arc::new(InMemoryBackend::new());
        let engine = engine_for(&sim);
        let instance = start(&engine);

        let err = await_healthy_until(&engine, &instance, FAST, &AtomicBool::new(true))
            .expect_err("cancelled");
        assert!(matches!(err, FixturaError::Cancelled { .. }));
        assert_eq!(sim.inspect_count(&instance.name), 0);
    }

    #[test]
    fn with_timeout_keeps_existing_when_unset() {
        let policy = PollPolicy {
            interval: Duration::from_millis(5),
            timeout: Some(Duration::from_secs(1)),
        };
        assert_eq!(policy.with_timeout(None), policy);
        assert_eq!(
            policy.with_timeout(Some(Duration::from_secs(9))).timeout,
            Some(Duration::from_secs(9))
        );
    }

    #[test]
    fn policy_follows_config() {
        let config = FixturaConfig {
            poll_interval: Duration::from_millis(7),
            ready_timeout: Some(Duration::from_secs(30)),
            ..FixturaConfig::default()
        };
        let policy = PollPolicy::from_config(&config);
        assert_eq!(policy.interval, Duration::from_millis(7));
        assert_eq!(policy.timeout, Some(Duration::from_secs(30)));
    }
}
