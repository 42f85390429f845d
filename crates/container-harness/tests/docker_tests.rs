//! Tests against a real Docker daemon
//!
//! Run with `cargo test -p container-harness --features docker-tests -- --ignored`.

#![cfg(feature = "docker-tests")]

use container_harness::docker::DockerCli;
use container_harness::testing::init_tracing;
use container_harness::{
    CancelToken, ContainerPort, EngineClient, Error, Options, Step, docker, ready,
};
use futures::{AsyncReadExt, AsyncWriteExt};
use std::time::Duration;

const NGINX: &str = "nginx:alpine";
const ALPINE: &str = "alpine:3.20";

#[smol_potat::test]
#[ignore = "requires a Docker daemon"]
async fn test_nginx_serves_on_resolved_port() {
    init_tracing();
    let opts = Options::new()
        .with_port_required(true)
        .with_ready_fn(ready::tcp_connect(80));

    let response = docker::run(NGINX, opts, |info| async move {
        let endpoint = info.port(80).expect("port 80 is published");
        let mut stream = async_net::TcpStream::connect(endpoint.socket_addr())
            .await
            .expect("connect to nginx");
        stream
            .write_all(b"GET / HTTP/1.0\r\nHost: localhost\r\n\r\n")
            .await
            .expect("send request");
        let mut response = String::new();
        stream
            .read_to_string(&mut response)
            .await
            .expect("read response");
        response
    })
    .await
    .expect("nginx container runs");

    assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
}

#[smol_potat::test]
#[ignore = "requires a Docker daemon"]
async fn test_container_is_gone_after_run() {
    init_tracing();
    let engine = DockerCli::from_env().expect("settings load");
    let opts = Options::new().with_cmd(["sleep", "300"]).with_stop_timeout(Duration::from_secs(1));

    let id = container_harness::run(&engine, &CancelToken::new(), ALPINE, opts, |info| async move {
        info.id().to_string()
    })
    .await
    .expect("alpine container runs");

    assert!(engine.inspect_container(&id).await.is_err());
}

#[smol_potat::test]
#[ignore = "requires a Docker daemon"]
async fn test_missing_image_fails_at_create() {
    init_tracing();
    let err = docker::run(
        "container-harness/does-not-exist:never",
        Options::new(),
        |_| async {},
    )
    .await
    .unwrap_err();
    assert_eq!(err.step(), Step::Create);
}

#[smol_potat::test]
#[ignore = "requires a Docker daemon"]
async fn test_port_required_without_exposed_ports() {
    init_tracing();
    let opts = Options::new()
        .with_cmd(["sleep", "300"])
        .with_port_required(true)
        .with_stop_timeout(Duration::from_secs(1));
    let err = docker::run(ALPINE, opts, |_| async {}).await.unwrap_err();
    assert!(err.is_config_mismatch(), "{}", err);
}

#[smol_potat::test]
#[ignore = "requires a Docker daemon"]
async fn test_explicit_udp_port_is_published() {
    init_tracing();
    let opts = Options::new()
        .with_cmd(["sleep", "300"])
        .with_exposed_port(ContainerPort::udp(5353))
        .with_stop_timeout(Duration::from_secs(1));

    let bound = docker::run(ALPINE, opts, |info| async move {
        info.port(ContainerPort::udp(5353)).is_some()
    })
    .await
    .expect("alpine container runs");
    assert!(bound);
}

#[test]
#[ignore = "requires a Docker daemon"]
fn test_never_ready_reports_not_ready() -> anyhow::Result<()> {
    smol::block_on(async {
        init_tracing();
        let opts = Options::new()
            .with_cmd(["sleep", "300"])
            .with_timeout(Duration::from_secs(5))
            .with_ready(|_| async { false })
            .with_stop_timeout(Duration::from_secs(1));
        let result = docker::run(ALPINE, opts, |_| async {}).await;
        anyhow::ensure!(matches!(result, Err(Error::NotReady { .. })));
        Ok(())
    })
}
