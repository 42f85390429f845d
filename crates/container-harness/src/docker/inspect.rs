//! Parsing of `docker inspect` output.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::engine::{ContainerPort, HostBinding, InspectedContainer, NetworkSettings};
use crate::error::EngineError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawContainer {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    network_settings: Option<RawNetworkSettings>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawNetworkSettings {
    // Unpublished ports map to null
    #[serde(default)]
    ports: Option<BTreeMap<String, Option<Vec<RawBinding>>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawBinding {
    #[serde(default)]
    host_ip: String,
    #[serde(default)]
    host_port: String,
}

/// Parse the JSON array printed by `docker inspect --type container <id>`
pub(crate) fn parse_inspect(json: &str) -> Result<InspectedContainer, EngineError> {
    let containers: Vec<RawContainer> = serde_json::from_str(json)
        .map_err(|e| EngineError::Malformed(format!("docker inspect output: {}", e)))?;
    let raw = containers.into_iter().next().ok_or_else(|| {
        EngineError::Malformed("docker inspect returned no containers".to_string())
    })?;

    let network = match raw.network_settings {
        Some(settings) => {
            let mut ports = BTreeMap::new();
            for (port, bindings) in settings.ports.unwrap_or_default() {
                let port: ContainerPort = port.parse()?;
                let bindings = bindings
                    .unwrap_or_default()
                    .into_iter()
                    .map(|b| HostBinding::new(b.host_ip, b.host_port))
                    .collect();
                ports.insert(port, bindings);
            }
            Some(NetworkSettings { ports })
        }
        None => None,
    };

    Ok(InspectedContainer {
        id: raw.id,
        name: raw.name.trim_start_matches('/').to_string(),
        network,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NGINX: &str = r#"[
      {
        "Id": "4f66ad9a0b2e8e1c",
        "Name": "/eager_turing",
        "State": {"Status": "running"},
        "NetworkSettings": {
          "IPAddress": "172.17.0.2",
          "Ports": {
            "443/tcp": null,
            "80/tcp": [
              {"HostIp": "0.0.0.0", "HostPort": "32768"},
              {"HostIp": "::", "HostPort": "32768"}
            ]
          }
        }
      }
    ]"#;

    #[test]
    fn parses_ports_and_name() {
        let inspected = parse_inspect(NGINX).unwrap();
        assert_eq!(inspected.id, "4f66ad9a0b2e8e1c");
        assert_eq!(inspected.name, "eager_turing");

        let ports = inspected.network.unwrap().ports;
        assert_eq!(ports[&ContainerPort::tcp(443)], vec![]);
        assert_eq!(
            ports[&ContainerPort::tcp(80)],
            vec![
                HostBinding::new("0.0.0.0", "32768"),
                HostBinding::new("::", "32768")
            ]
        );
    }

    #[test]
    fn missing_network_settings_is_none() {
        let inspected = parse_inspect(r#"[{"Id": "abc"}]"#).unwrap();
        assert!(inspected.network.is_none());
        assert_eq!(inspected.name, "");
    }

    #[test]
    fn null_ports_is_empty_network() {
        let inspected =
            parse_inspect(r#"[{"Id": "abc", "NetworkSettings": {"Ports": null}}]"#).unwrap();
        assert!(inspected.network.unwrap().ports.is_empty());
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse_inspect("[]"), Err(EngineError::Malformed(_))));
        assert!(matches!(parse_inspect("not json"), Err(EngineError::Malformed(_))));
        let bad_port = r#"[{"Id": "abc", "NetworkSettings": {"Ports": {"x/tcp": null}}}]"#;
        assert!(parse_inspect(bad_port).is_err());
    }
}
