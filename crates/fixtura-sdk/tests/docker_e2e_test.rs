//! End-to-end tests against a real Docker engine.
//!
//! Ignored by default. Run with `cargo test -p fixtura-sdk -- --ignored`
//! on a host with a reachable Docker daemon and access to `busybox`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fixtura_common::error::FixturaError;
use fixtura_runtime::engine::Engine;
use fixtura_sdk::{FixtureSpec, create_fixture, run_dockerfile, shared_engine};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
        .join("Dockerfile")
}

fn http_get(addr: &str) -> String {
    let mut stream = TcpStream::connect(addr).expect("connect to fixture");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("set timeout");
    stream
        .write_all(b"GET / HTTP/1.0\r\nHost: localhost\r\n\r\n")
        .expect("send request");
    let mut body = String::new();
    let _ = stream.read_to_string(&mut body).expect("read response");
    body
}

#[test]
#[ignore = "requires a Docker daemon"]
fn docker_web_fixture_serves_http_then_disappears() {
    let engine = shared_engine().expect("docker reachable");
    let name = {
        let web = run_dockerfile(fixture_path("web"));
        web.expire(Duration::from_secs(300)).expect("expire");
        let addr = web.host_port("80/tcp").expect("80/tcp published");
        assert!(http_get(&addr).contains("fixtura"));
        web.name().clone()
    };
    assert!(engine.inspect(&name).expect("inspect").is_none());
}

#[test]
#[ignore = "requires a Docker daemon"]
fn docker_same_file_twice_gets_two_containers() {
    let a = run_dockerfile(fixture_path("web"));
    let b = run_dockerfile(fixture_path("web"));
    assert_ne!(a.name(), b.name());
    assert_ne!(
        a.host_endpoint("80/tcp").expect("a").port,
        b.host_endpoint("80/tcp").expect("b").port
    );
}

#[test]
#[ignore = "requires a Docker daemon"]
fn docker_unhealthy_fixture_times_out_and_is_purged() {
    let engine: Arc<Engine> = shared_engine().expect("docker reachable");
    let spec = FixtureSpec::new(fixture_path("never-healthy"))
        .label("never")
        .ready_timeout(Duration::from_secs(5));

    let err = create_fixture(&engine, spec).expect_err("never healthy");
    assert!(matches!(err, FixturaError::ReadinessTimeout { .. }));
    let leftovers = engine
        .list_managed(&format!("{}never-", engine.config().namespace_prefix))
        .expect("list");
    assert!(leftovers.is_empty());
}
