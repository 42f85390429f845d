//! What a test body gets to see of its container.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::engine::ContainerPort;

/// A dialable host address and port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Host address to connect to
    pub ip: IpAddr,
    /// Host port to connect to
    pub port: u16,
}

impl Endpoint {
    /// The endpoint as a socket address
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.socket_addr().fmt(f)
    }
}

/// A started, inspected container
///
/// Produced once by the launcher and handed read-only to the readiness
/// predicate and the test body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    id: String,
    name: String,
    image: String,
    ports: BTreeMap<ContainerPort, Vec<Endpoint>>,
}

impl ContainerInfo {
    /// Assemble container info; every port must map to at least one endpoint
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        image: impl Into<String>,
        ports: BTreeMap<ContainerPort, Vec<Endpoint>>,
    ) -> Self {
        let mut ports = ports;
        ports.retain(|_, endpoints| !endpoints.is_empty());
        Self {
            id: id.into(),
            name: name.into(),
            image: image.into(),
            ports,
        }
    }

    /// Engine-assigned container identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Container name, may be empty
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Image the container was created from
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Every resolved port and its endpoints
    pub fn ports(&self) -> &BTreeMap<ContainerPort, Vec<Endpoint>> {
        &self.ports
    }

    /// All endpoints bound for `port`, in engine order
    pub fn endpoints(&self, port: impl Into<ContainerPort>) -> &[Endpoint] {
        self.ports
            .get(&port.into())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The preferred endpoint for `port`: the first IPv4 binding, else the first binding
    pub fn port(&self, port: impl Into<ContainerPort>) -> Option<Endpoint> {
        preferred(self.endpoints(port))
    }

    /// The preferred endpoint of the lowest bound container port
    pub fn first_port(&self) -> Option<Endpoint> {
        self.ports
            .values()
            .next()
            .and_then(|endpoints| preferred(endpoints))
    }
}

fn preferred(endpoints: &[Endpoint]) -> Option<Endpoint> {
    endpoints
        .iter()
        .find(|endpoint| endpoint.ip.is_ipv4())
        .or_else(|| endpoints.first())
        .copied()
}

impl fmt::Display for ContainerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short_id = self.id.get(..12).unwrap_or(&self.id);
        write!(f, "{{image: {}, id: {}", self.image, short_id)?;
        if !self.name.is_empty() {
            write!(f, ", name: {}", self.name)?;
        }
        if !self.ports.is_empty() {
            let ports = self
                .ports
                .iter()
                .flat_map(|(port, endpoints)| {
                    endpoints
                        .iter()
                        .map(move |endpoint| format!("{}->{}", endpoint, port))
                })
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, ", ports: [{}]", ports)?;
        }
        write!(f, "}}")
    }
}
