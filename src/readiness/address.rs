//! Choosing the address the service is advertised on.

use ipnetwork::IpNetwork;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Rules for picking the host's externally reachable address.
///
/// # Example
///
/// ```rust
/// use vendor_deploy::AddressPolicy;
///
/// let policy = AddressPolicy::default();
/// let chosen = policy.select("127.0.0.1 192.168.122.1 fe80::1 10.20.0.7");
/// assert_eq!(chosen, Some("10.20.0.7".parse().unwrap()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressPolicy {
    /// Use this address and skip discovery.
    pub explicit_host: Option<IpAddr>,

    /// Networks never advertised.
    ///
    /// Default: loopback and the libvirt bridge `192.168.122.0/24`.
    pub excluded: Vec<IpNetwork>,
}

impl Default for AddressPolicy {
    fn default() -> Self {
        Self {
            explicit_host: None,
            excluded: default_exclusions(),
        }
    }
}

/// Loopback for both families plus the libvirt default bridge.
pub fn default_exclusions() -> Vec<IpNetwork> {
    [
        (IpAddr::V4(Ipv4Addr::new(127, 0, 0, 0)), 8),
        (IpAddr::V6(Ipv6Addr::LOCALHOST), 128),
        (IpAddr::V4(Ipv4Addr::new(192, 168, 122, 0)), 24),
    ]
    .into_iter()
    .filter_map(|(ip, prefix)| IpNetwork::new(ip, prefix).ok())
    .collect()
}

impl AddressPolicy {
    /// Pick an address from whitespace-separated `candidates` (the output
    /// of `hostname -I`). The first eligible one wins.
    pub fn select(&self, candidates: &str) -> Option<IpAddr> {
        if let Some(host) = self.explicit_host {
            return Some(host);
        }
        candidates
            .split_whitespace()
            .filter_map(|word| word.parse::<IpAddr>().ok())
            .find(|ip| self.is_eligible(*ip))
    }

    /// Whether `ip` may be advertised. Link-local addresses never are.
    pub fn is_eligible(&self, ip: IpAddr) -> bool {
        !is_link_local(ip) && !self.excluded.iter().any(|net| net.contains(ip))
    }
}

fn is_link_local(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_link_local(),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}
