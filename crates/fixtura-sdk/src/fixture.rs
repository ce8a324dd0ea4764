//! Fixture façade: build, register cleanup, wait for health, hand back.

use std::ops::Deref;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, OnceLock};

use fixtura_common::error::Result;
use fixtura_runtime::engine::Engine;

use crate::builder::build_instance;
use crate::handle::InstanceHandle;
use crate::identity::{IdentityProvider, UuidIdentity};
use crate::poller::{PollPolicy, await_healthy_until};
use crate::registrar::CleanupGuard;
use crate::spec::FixtureSpec;

/// A healthy fixture container owned by the current scope.
///
/// Dereferences to [`InstanceHandle`]. Dropping it runs any teardown hooks
/// and purges the container.
#[derive(Debug)]
pub struct Fixture {
    handle: InstanceHandle,
    guard: CleanupGuard,
}

impl Fixture {
    /// Returns the instance handle.
    #[must_use]
    pub const fn handle(&self) -> &InstanceHandle {
        &self.handle
    }

    /// Adds an action that runs before the container is purged. Hooks run
    /// last-added first.
    pub fn on_teardown(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.guard.on_teardown(hook);
    }

    /// Purges the container now and reports the outcome.
    ///
    /// # Errors
    ///
    /// Returns `FixturaError::Purge` if the engine refused. Nothing is
    /// retried.
    pub fn purge(mut self) -> Result<()> {
        self.guard.purge()
    }
}

impl Deref for Fixture {
    type Target = InstanceHandle;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

/// Creates fixtures against one engine.
#[derive(Clone)]
pub struct FixtureFactory {
    engine: Arc<Engine>,
    identity: Arc<dyn IdentityProvider>,
    policy: PollPolicy,
    cancel: Option<Arc<AtomicBool>>,
}

impl FixtureFactory {
    /// Creates a factory using UUID names and the engine's poll settings.
    #[must_use]
    pub fn new(engine: Arc<Engine>) -> Self {
        let policy = PollPolicy::from_config(engine.config());
        Self {
            engine,
            identity: Arc::new(UuidIdentity),
            policy,
            cancel: None,
        }
    }

    /// Replaces the source of unique name suffixes.
    #[must_use]
    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    /// Replaces the poll policy.
    #[must_use]
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Interrupts the readiness wait once `flag` is set, typically from a
    /// Ctrl+C handler. The container is purged and creation returns
    /// `FixturaError::Cancelled`.
    #[must_use]
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Returns the engine fixtures are created on.
    #[must_use]
    pub const fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Builds, starts and waits for a fixture.
    ///
    /// Cleanup is registered as soon as the container exists, so a failure
    /// while waiting purges it before the error is returned. Expiry from the
    /// specification, or the configured default, is scheduled before the
    /// wait begins.
    ///
    /// # Errors
    ///
    /// Any setup error: build, start, connection, vanished, exited,
    /// readiness timeout or a cancelled wait.
    pub fn create(&self, spec: FixtureSpec) -> Result<Fixture> {
        let instance = build_instance(&self.engine, &spec, self.identity.as_ref())?;
        let mut guard = CleanupGuard::register(Arc::clone(&self.engine), instance.clone());

        if let Some(after) = spec.expiry().or(self.engine.config().default_expiry) {
            self.engine.schedule_expiry(&instance, after)?;
        }

        let policy = self.policy.with_timeout(spec.readiness_timeout());
        let never = AtomicBool::new(false);
        let cancel = self.cancel.as_deref().unwrap_or(&never);
        let record = match await_healthy_until(&self.engine, &instance, policy, cancel) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(name = %instance.name, error = %e, "fixture never became healthy");
                if let Err(purge_err) = guard.purge() {
                    tracing::warn!(name = %instance.name, error = %purge_err, "fixture purge failed");
                }
                return Err(e);
            }
        };

        Ok(Fixture {
            handle: InstanceHandle::new(Arc::clone(&self.engine), instance, record),
            guard,
        })
    }
}

impl std::fmt::Debug for FixtureFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureFactory")
            .field("engine", &self.engine)
            .field("policy", &self.policy)
            .field("cancellable", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}

/// Creates a fixture on `engine` with default naming and polling.
///
/// # Errors
///
/// See [`FixtureFactory::create`].
pub fn create_fixture(engine: &Arc<Engine>, spec: FixtureSpec) -> Result<Fixture> {
    FixtureFactory::new(Arc::clone(engine)).create(spec)
}

static SHARED_ENGINE: OnceLock<Arc<Engine>> = OnceLock::new();

/// Returns the process-wide engine, connecting from the environment on
/// first use.
///
/// # Errors
///
/// Returns the connection error if the first connection attempt fails.
/// A failed attempt is not cached.
pub fn shared_engine() -> Result<Arc<Engine>> {
    if let Some(engine) = SHARED_ENGINE.get() {
        return Ok(Arc::clone(engine));
    }
    let engine = Arc::new(Engine::from_env()?);
    Ok(Arc::clone(SHARED_ENGINE.get_or_init(|| engine)))
}

/// Builds and starts a fixture from `build_file` and blocks until it is
/// healthy.
///
/// # Panics
///
/// Panics with the setup error if the engine is unreachable, the build or
/// start fails, or the container never becomes healthy. Inside a test this
/// fails the test.
#[track_caller]
#[allow(clippy::panic)]
#[must_use]
pub fn run_dockerfile(build_file: impl AsRef<Path>) -> Fixture {
    let build_file = build_file.as_ref();
    let result =
        shared_engine().and_then(|engine| create_fixture(&engine, FixtureSpec::new(build_file)));
    match result {
        Ok(fixture) => fixture,
        Err(e) => panic!("fixture setup failed for {}: {e}", build_file.display()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::time::Duration;

    use fixtura_common::error::FixturaError;
    use fixtura_common::types::{HealthState, PortSpec};
    use fixtura_runtime::backend::memory::{InMemoryBackend, SimulatedFate};

    use super::*;
    use crate::test_support::{build_file, engine_for};

    #[test]
    fn create_returns_healthy_fixture_with_endpoint() {
        let sim = Arc::new(InMemoryBackend::new().with_health_script(vec![
            HealthState::Starting,
            HealthState::Healthy,
        ]));
        let engine = engine_for(&sim);
        let (_dir, path) = build_file();

        let fixture = create_fixture(&engine, FixtureSpec::new(&path)).expect("fixture");
        assert_eq!(fixture.health(), HealthState::Healthy);
        assert_eq!(sim.last_reported_health(fixture.name()), Some(HealthState::Healthy));

        let endpoint = fixture.host_endpoint("80/tcp").expect("80 published");
        assert_eq!(endpoint.host, "127.0.0.1");
        assert!(endpoint.port >= 32768);
        assert_eq!(fixture.host_port("80").expect("bare port"), endpoint.to_string());
    }

    #[test]
    fn unpublished_port_is_a_distinct_error() {
        let sim = Arc::new(InMemoryBackend::new());
        let engine = engine_for(&sim);
        let (_dir, path) = build_file();

        let fixture = create_fixture(&engine, FixtureSpec::new(&path)).expect("fixture");
        let err = fixture.host_port("9999/tcp").expect_err("not published");
        assert!(matches!(err, FixturaError::PortNotPublished { .. }));
        assert!(!err.is_setup_fatal());
    }

    #[test]
    fn concurrent_fixtures_get_distinct_names_and_ports() {
        let sim = Arc::new(InMemoryBackend::new());
        let engine = engine_for(&sim);
        let (_dir, path) = build_file();

        let fixtures: Vec<_> = (0..4)
            .map(|_| create_fixture(&engine, FixtureSpec::new(&path).label("web")).expect("fixture"))
            .collect();

        let names: HashSet<_> = fixtures.iter().map(|f| f.name().clone()).collect();
        let ports: HashSet<_> = fixtures
            .iter()
            .map(|f| f.endpoint_for(PortSpec::tcp(80)).expect("80").port)
            .collect();
        assert_eq!(names.len(), 4);
        assert_eq!(ports.len(), 4);
    }

    #[test]
    fn drop_purges_once() {
        let sim = Arc::new(InMemoryBackend::new());
        let engine = engine_for(&sim);
        let (_dir, path) = build_file();

        let name = {
            let fixture = create_fixture(&engine, FixtureSpec::new(&path)).expect("fixture");
            fixture.name().clone()
        };
        assert_eq!(sim.purge_count(&name), 1);
        assert!(sim.live_names().is_empty());
    }

    #[test]
    fn explicit_purge_is_not_repeated_on_drop() {
        let sim = Arc::new(InMemoryBackend::new());
        let engine = engine_for(&sim);
        let (_dir, path) = build_file();

        let fixture = create_fixture(&engine, FixtureSpec::new(&path)).expect("fixture");
        let name = fixture.name().clone();
        fixture.purge().expect("purge");
        assert_eq!(sim.purge_count(&name), 1);
    }

    #[test]
    fn panicking_test_body_still_purges() {
        let sim = Arc::new(InMemoryBackend::new());
        let engine = engine_for(&sim);
        let (_dir, path) = build_file();

        let result = catch_unwind(AssertUnwindSafe(|| {
            let fixture = create_fixture(&engine, FixtureSpec::new(&path)).expect("fixture");
            assert_eq!(fixture.health(), HealthState::Unhealthy, "deliberate failure");
        }));

        assert!(result.is_err());
        assert!(sim.live_names().is_empty());
        assert_eq!(sim.runs().len(), 1);
        assert_eq!(sim.purge_count(&sim.runs()[0].name), 1);
    }

    #[test]
    fn build_failure_leaves_nothing_behind() {
        let sim = Arc::new(InMemoryBackend::new().failing_build("syntax error"));
        let engine = engine_for(&sim);
        let (_dir, path) = build_file();

        let err = create_fixture(&engine, FixtureSpec::new(&path)).expect_err("build fails");
        assert!(matches!(err, FixturaError::Build { .. }));
        assert!(sim.live_names().is_empty());
    }

    #[test]
    fn start_failure_leaves_nothing_behind() {
        let sim = Arc::new(InMemoryBackend::new().failing_start("port already allocated"));
        let engine = engine_for(&sim);
        let (_dir, path) = build_file();

        let err = create_fixture(&engine, FixtureSpec::new(&path)).expect_err("start fails");
        assert!(matches!(err, FixturaError::Start { .. }));
        assert!(sim.live_names().is_empty());
    }

    #[test]
    fn exit_during_wait_is_purged_and_reported() {
        let sim = Arc::new(
            InMemoryBackend::new()
                .with_health_script(vec![HealthState::Starting])
                .with_fate(SimulatedFate::ExitsAfter {
                    polls: 2,
                    exit_code: 1,
                }),
        );
        let engine = engine_for(&sim);
        let (_dir, path) = build_file();

        let err = create_fixture(&engine, FixtureSpec::new(&path)).expect_err("exits");
        assert!(matches!(err, FixturaError::Exited { .. }));
        let name = sim.runs()[0].name.clone();
        assert_eq!(sim.purge_count(&name), 1);
        assert!(!sim.contains(&name));
    }

    #[test]
    fn spec_timeout_purges_unhealthy_container() {
        let sim = Arc::new(InMemoryBackend::new().with_health_script(vec![HealthState::Unhealthy]));
        let engine = engine_for(&sim);
        let (_dir, path) = build_file();

        let spec = FixtureSpec::new(&path).ready_timeout(Duration::from_millis(10));
        let err = create_fixture(&engine, spec).expect_err("timeout");
        assert!(matches!(err, FixturaError::ReadinessTimeout { .. }));
        assert!(sim.live_names().is_empty());
    }

    #[test]
    fn spec_expiry_is_scheduled_before_wait() {
        let sim = Arc::new(InMemoryBackend::new());
        let engine = engine_for(&sim);
        let (_dir, path) = build_file();

        let spec = FixtureSpec::new(&path).expire_after(Duration::from_secs(600));
        let fixture = create_fixture(&engine, spec).expect("fixture");
        assert_eq!(
            sim.expiries(),
            vec![(fixture.name().clone(), Duration::from_secs(600))]
        );
    }

    #[test]
    fn expire_removes_container_independently() {
        let sim = Arc::new(InMemoryBackend::new());
        let engine = engine_for(&sim);
        let (_dir, path) = build_file();

        let fixture = create_fixture(&engine, FixtureSpec::new(&path)).expect("fixture");
        fixture.expire(Duration::from_millis(5)).expect("expire");
        std::thread::sleep(Duration::from_millis(30));
        assert!(!sim.contains(fixture.name()));

        let name = fixture.name().clone();
        drop(fixture);
        assert_eq!(sim.purge_count(&name), 1);
    }

    #[test]
    fn teardown_hooks_run_before_purge() {
        let sim = Arc::new(InMemoryBackend::new());
        let engine = engine_for(&sim);
        let (_dir, path) = build_file();

        let mut fixture = create_fixture(&engine, FixtureSpec::new(&path)).expect("fixture");
        let seen = Arc::new(std::sync::Mutex::new(None));
        {
            let seen = Arc::clone(&seen);
            let sim = Arc::clone(&sim);
            let name = fixture.name().clone();
            fixture.on_teardown(move || {
                *seen.lock().expect("lock") = Some(sim.contains(&name));
            });
        }
        drop(fixture);
        assert_eq!(*seen.lock().expect("lock"), Some(true));
    }

    #[test]
    fn factory_uses_custom_identity() {
        struct Counter(std::sync::atomic::AtomicU32);
        impl IdentityProvider for Counter {
            fn generate(&self) -> String {
                self.0
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
                    .to_string()
            }
        }

        let sim = Arc::new(InMemoryBackend::new());
        let engine = engine_for(&sim);
        let (_dir, path) = build_file();

        let factory = FixtureFactory::new(Arc::clone(&engine))
            .with_identity(Arc::new(Counter(std::sync::atomic::AtomicU32::new(7))));
        let fixture = factory.create(FixtureSpec::new(&path).label("db")).expect("fixture");
        assert_eq!(fixture.name().as_str(), "fixtura-db-7");
    }

    #[test]
    fn factory_poll_policy_bounds_the_wait() {
        let sim = Arc::new(InMemoryBackend::new().with_health_script(vec![HealthState::Starting]));
        let engine = engine_for(&sim);
        let (_dir, path) = build_file();

        let factory = FixtureFactory::new(Arc::clone(&engine)).with_poll_policy(PollPolicy {
            interval: Duration::from_millis(2),
            timeout: Some(Duration::from_millis(15)),
        });
        let err = factory.create(FixtureSpec::new(&path)).expect_err("timeout");
        assert!(matches!(err, FixturaError::ReadinessTimeout { .. }));
        let name = sim.runs()[0].name.clone();
        assert!(sim.inspect_count(&name) >= 2);
        assert_eq!(sim.purge_count(&name), 1);
    }

    #[test]
    fn spec_timeout_overrides_factory_policy() {
        let sim = Arc::new(InMemoryBackend::new().with_health_script(vec![HealthState::Starting]));
        let engine = engine_for(&sim);
        let (_dir, path) = build_file();

        let factory = FixtureFactory::new(Arc::clone(&engine)).with_poll_policy(PollPolicy {
            interval: Duration::from_millis(1),
            timeout: Some(Duration::from_secs(3600)),
        });
        let spec = FixtureSpec::new(&path).ready_timeout(Duration::from_millis(10));
        let err = factory.create(spec).expect_err("timeout");
        assert!(matches!(err, FixturaError::ReadinessTimeout { .. }));
    }

    #[test]
    fn cancelled_wait_purges_container() {
        let sim = Arc::new(InMemoryBackend::new().with_health_script(vec![HealthState::Starting]));
        let engine = engine_for(&sim);
        let (_dir, path) = build_file();

        let flag = Arc::new(AtomicBool::new(true));
        let factory = FixtureFactory::new(Arc::clone(&engine)).with_cancellation(flag);
        let err = factory.create(FixtureSpec::new(&path)).expect_err("cancelled");
        assert!(matches!(err, FixturaError::Cancelled { .. }));
        let name = sim.runs()[0].name.clone();
        assert_eq!(sim.purge_count(&name), 1);
        assert!(sim.live_names().is_empty());
    }

    #[test]
    fn endpoints_lists_published_ports() {
        let sim = Arc::new(
            InMemoryBackend::new().with_published_ports(vec![PortSpec::tcp(80), PortSpec::udp(53)]),
        );
        let engine = engine_for(&sim);
        let (_dir, path) = build_file();

        let fixture = create_fixture(&engine, FixtureSpec::new(&path)).expect("fixture");
        let ports: Vec<_> = fixture.endpoints().into_iter().map(|(p, _)| p).collect();
        assert_eq!(ports, vec![PortSpec::udp(53), PortSpec::tcp(80)]);
    }
}
