//! # fixtura-sdk
//!
//! Disposable container fixtures for tests. A fixture is built from a build
//! file, started under a unique name, waited on until its health check
//! passes, and purged when the owning scope ends, whether the test passed,
//! failed an assertion, or returned early.
//!
//! Entry points:
//! - [`run_dockerfile`](fixture::run_dockerfile): one-line fixture that
//!   panics (fails the test) if setup fails.
//! - [`create_fixture`](fixture::create_fixture) and
//!   [`FixtureFactory`](fixture::FixtureFactory): `Result`-returning
//!   creation through an explicit [`Engine`](fixtura_runtime::engine::Engine).
//!
//! # Health check precondition
//!
//! The build file **must** declare a `HEALTHCHECK`. Creation blocks until the
//! engine reports the container healthy; without a health check that never
//! happens and the wait never ends unless a readiness timeout is configured
//! (`FixtureSpec::ready_timeout` or `FIXTURA_READY_TIMEOUT_SECS`).
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! let web = fixtura_sdk::run_dockerfile("tests/fixtures/web/Dockerfile");
//! web.expire(Duration::from_secs(300)).ok();
//! let addr = web.host_port("80/tcp").expect("80/tcp is published");
//! // `web` is purged when it goes out of scope.
//! # let _ = addr;
//! ```

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod builder;
pub mod fixture;
pub mod handle;
pub mod identity;
pub mod poller;
pub mod registrar;
pub mod spec;

#[cfg(test)]
pub(crate) mod test_support;

pub use fixture::{Fixture, FixtureFactory, create_fixture, run_dockerfile, shared_engine};
pub use handle::InstanceHandle;
pub use spec::FixtureSpec;
