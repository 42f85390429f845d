//! Container launch: create, start, inspect.

use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::engine::{EngineClient, guarded};
use crate::error::{Error, LaunchFailure};
use crate::info::ContainerInfo;
use crate::options::Options;
use crate::resolve::resolve_endpoints;

/// Create, start and inspect a container from `image`.
///
/// Steps run strictly in order and stop at the first failure. Once creation
/// has succeeded every failure carries the container identifier, and the
/// caller is responsible for removing it.
pub async fn run_image(
    cancel: &CancelToken,
    engine: &dyn EngineClient,
    image: &str,
    opts: &Options,
) -> Result<ContainerInfo, LaunchFailure> {
    let config = opts.container_config();
    let id = guarded(cancel, engine.create_container(image, &config))
        .await
        .map_err(|source| {
            LaunchFailure::not_created(Error::Create {
                image: image.to_string(),
                source,
            })
        })?;
    debug!("Created container {} from {}", id, image);

    if let Err(source) = guarded(cancel, engine.start_container(&id)).await {
        return Err(LaunchFailure::created(
            id.clone(),
            Error::Start { id, source },
        ));
    }
    debug!("Started container {}", id);

    let inspected = match guarded(cancel, engine.inspect_container(&id)).await {
        Ok(inspected) => inspected,
        Err(source) => {
            return Err(LaunchFailure::created(
                id.clone(),
                Error::Inspect { id, source },
            ));
        }
    };

    let ports = match &inspected.network {
        Some(network) => resolve_endpoints(&network.ports),
        None if opts.port_required => {
            return Err(LaunchFailure::created(
                id.clone(),
                Error::NoNetworkSettings { id },
            ));
        }
        None => Default::default(),
    };
    if opts.port_required && ports.is_empty() {
        return Err(LaunchFailure::created(
            id.clone(),
            Error::NoPortBindings { id },
        ));
    }

    let container_id = if inspected.id.is_empty() { id } else { inspected.id };
    let info = ContainerInfo::new(container_id, inspected.name, image, ports);
    info!("Launched container {}", info);
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ContainerPort, HostBinding, InspectedContainer, NetworkSettings};
    use crate::error::Step;
    use crate::mock::{EngineOp, MockEngine};
    use std::collections::BTreeMap;

    fn inspected(ports: &[(&str, &str, &str)]) -> InspectedContainer {
        let mut map: BTreeMap<ContainerPort, Vec<HostBinding>> = BTreeMap::new();
        for (port, ip, host_port) in ports {
            map.entry(port.parse().unwrap())
                .or_default()
                .push(HostBinding::new(*ip, *host_port));
        }
        InspectedContainer {
            id: String::new(),
            name: "web".to_string(),
            network: Some(NetworkSettings { ports: map }),
        }
    }

    #[smol_potat::test]
    async fn launches_and_resolves_ports() {
        let engine = MockEngine::new().with_inspect(inspected(&[("80/tcp", "0.0.0.0", "8181")]));
        let info = run_image(&CancelToken::new(), &engine, "nginx", &Options::new())
            .await
            .unwrap();
        assert_eq!(info.id(), engine.container_id());
        assert_eq!(info.name(), "web");
        assert_eq!(info.image(), "nginx");
        assert_eq!(info.port(80).unwrap().to_string(), "127.0.0.1:8181");
        assert_eq!(
            engine.ops(),
            vec![EngineOp::Create, EngineOp::Start, EngineOp::Inspect]
        );
    }

    #[smol_potat::test]
    async fn create_failure_stops_everything() {
        let engine = MockEngine::new().fail_create();
        let failure = run_image(&CancelToken::new(), &engine, "nginx", &Options::new())
            .await
            .unwrap_err();
        assert!(failure.container_id.is_none());
        assert_eq!(failure.error.step(), Step::Create);
        assert_eq!(engine.ops(), vec![EngineOp::Create]);
    }

    #[smol_potat::test]
    async fn start_failure_hands_back_the_container() {
        let engine = MockEngine::new().fail_start();
        let failure = run_image(&CancelToken::new(), &engine, "nginx", &Options::new())
            .await
            .unwrap_err();
        assert_eq!(failure.container_id.as_deref(), Some(engine.container_id()));
        assert_eq!(failure.error.step(), Step::Start);
        assert_eq!(engine.count(EngineOp::Inspect), 0);
    }

    #[smol_potat::test]
    async fn inspect_failure_hands_back_the_container() {
        let engine = MockEngine::new().fail_inspect();
        let failure = run_image(&CancelToken::new(), &engine, "nginx", &Options::new())
            .await
            .unwrap_err();
        assert_eq!(failure.container_id.as_deref(), Some(engine.container_id()));
        assert_eq!(failure.error.step(), Step::Inspect);
    }

    #[smol_potat::test]
    async fn required_port_without_network_settings() {
        let engine = MockEngine::new().with_inspect(InspectedContainer::default());
        let opts = Options::new().with_port_required(true);
        let failure = run_image(&CancelToken::new(), &engine, "nginx", &opts)
            .await
            .unwrap_err();
        assert!(matches!(failure.error, Error::NoNetworkSettings { .. }));
        assert!(failure.container_id.is_some());
    }

    #[smol_potat::test]
    async fn required_port_without_bindings() {
        let engine = MockEngine::new().with_inspect(inspected(&[]));
        let opts = Options::new().with_port_required(true);
        let failure = run_image(&CancelToken::new(), &engine, "nginx", &opts)
            .await
            .unwrap_err();
        assert!(matches!(failure.error, Error::NoPortBindings { .. }));
        assert!(failure.error.is_config_mismatch());
    }

    #[smol_potat::test]
    async fn optional_port_tolerates_missing_network() {
        let engine = MockEngine::new().with_inspect(InspectedContainer::default());
        let info = run_image(&CancelToken::new(), &engine, "nginx", &Options::new())
            .await
            .unwrap();
        assert!(info.ports().is_empty());
        assert_eq!(info.first_port(), None);
    }

    #[smol_potat::test]
    async fn required_port_satisfied_by_any_binding() {
        let engine = MockEngine::new().with_inspect(inspected(&[
            ("53/udp", "", "32768"),
            ("80/tcp", "10.0.0.1", "8181"),
        ]));
        let opts = Options::new().with_port_required(true);
        let info = run_image(&CancelToken::new(), &engine, "nginx", &opts)
            .await
            .unwrap();
        assert_eq!(info.port(80).unwrap().to_string(), "10.0.0.1:8181");
        assert_eq!(
            info.port(ContainerPort::udp(53)).unwrap().to_string(),
            "127.0.0.1:32768"
        );
    }

    #[smol_potat::test]
    async fn create_receives_harness_label() {
        let engine = MockEngine::new();
        run_image(&CancelToken::new(), &engine, "nginx", &Options::new())
            .await
            .unwrap();
        let config = engine.last_config().unwrap();
        assert_eq!(config.labels[crate::options::HARNESS_LABEL], "true");
    }
}
