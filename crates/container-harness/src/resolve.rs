//! Normalize raw engine port bindings into dialable endpoints.
//!
//! Engines report a wildcard bind (`0.0.0.0`, `::` or an empty string) when a
//! port listens on every host interface. Those addresses cannot be dialed, so
//! they are replaced with the matching loopback address. A specific address
//! means the engine bound one interface and is kept verbatim.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::warn;

use crate::engine::{ContainerPort, HostBinding};
use crate::info::Endpoint;

/// Resolve every binding of every port.
///
/// Ports whose bindings all fail to resolve (or that have none, i.e. exposed
/// but unpublished) are left out, so each entry of the result is non-empty.
pub fn resolve_endpoints(
    ports: &BTreeMap<ContainerPort, Vec<HostBinding>>,
) -> BTreeMap<ContainerPort, Vec<Endpoint>> {
    ports
        .iter()
        .filter_map(|(port, bindings)| {
            let endpoints: Vec<Endpoint> = bindings
                .iter()
                .filter_map(|binding| {
                    let endpoint = resolve_binding(binding);
                    if endpoint.is_none() {
                        warn!(
                            "Ignoring unusable binding {}:{} for port {}",
                            binding.host_ip, binding.host_port, port
                        );
                    }
                    endpoint
                })
                .collect();
            (!endpoints.is_empty()).then_some((*port, endpoints))
        })
        .collect()
}

/// Resolve a single binding, `None` if its address or port is unusable
pub fn resolve_binding(binding: &HostBinding) -> Option<Endpoint> {
    let ip = resolve_host(&binding.host_ip)?;
    let port = binding.host_port.trim().parse::<u16>().ok()?;
    Some(Endpoint { ip, port })
}

/// Map a bound host address to one that can be dialed from this host
pub fn resolve_host(host_ip: &str) -> Option<IpAddr> {
    let host_ip = host_ip.trim();
    if host_ip.is_empty() {
        return Some(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    let trimmed = host_ip
        .strip_prefix('[')
        .and_then(|ip| ip.strip_suffix(']'))
        .unwrap_or(host_ip);

    match trimmed.parse::<IpAddr>().ok()? {
        IpAddr::V4(ip) if ip.is_unspecified() => Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        IpAddr::V6(ip) if ip.is_unspecified() => Some(IpAddr::V6(Ipv6Addr::LOCALHOST)),
        ip => Some(ip),
    }
}
