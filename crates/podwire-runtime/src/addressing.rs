//! Address lifecycle: family selection, route derivation, release.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;
use podwire_common::error::{PodwireError, Result};
use podwire_common::result::{IpConfig, RouteEntry};
use podwire_common::types::{AddressFamily, Route};

use crate::daemon::DaemonApi;
use crate::daemon::models::{AddressPair, Allocation, HostAddressing};

/// Families in the order they are prepared.
pub const PREPARE_ORDER: [AddressFamily; 2] = [AddressFamily::V6, AddressFamily::V4];

/// Families in the order they are configured inside the sandbox.
pub const CONFIGURE_ORDER: [AddressFamily; 2] = [AddressFamily::V4, AddressFamily::V6];

/// Address and routes of one family, ready to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedFamily {
    /// Address family.
    pub family: AddressFamily,
    /// Endpoint address with a single-host prefix.
    pub address: IpNet,
    /// Router IP of the node.
    pub gateway: IpAddr,
    /// Routes in install order.
    pub routes: Vec<Route>,
}

impl PreparedFamily {
    /// IP entry of the result document.
    #[must_use]
    pub fn ip_config(&self) -> IpConfig {
        IpConfig::new(self.family, self.address, self.gateway)
    }

    /// Route entries of the result document.
    #[must_use]
    pub fn route_entries(&self) -> Vec<RouteEntry> {
        self.routes.iter().map(RouteEntry::from).collect()
    }
}

/// Whether `family` should be configured for this allocation.
///
/// The daemon must have allocated an address, and the node must not have
/// the family disabled.
#[must_use]
pub fn family_enabled(allocation: &Allocation, family: AddressFamily) -> bool {
    if allocation.address.get(family).is_empty() {
        return false;
    }
    allocation
        .host_addressing
        .entry(family)
        .is_none_or(|entry| entry.enabled)
}

/// Validates the allocated address of `family` and derives its routes.
///
/// # Errors
///
/// Returns `PodwireError::Allocation` if the address, router IP or
/// allocation range cannot be parsed.
pub fn prepare(family: AddressFamily, allocation: &Allocation, route_mtu: u32) -> Result<PreparedFamily> {
    let raw = allocation.address.get(family);
    let ip = raw
        .parse::<IpAddr>()
        .map_err(|e| allocation_error(format!("invalid {family} address {raw:?}: {e}")))?;
    if !family.matches(&ip) {
        return Err(allocation_error(format!("{ip} is not an {family} address")));
    }

    let gateway = router_ip(&allocation.host_addressing, family)?;
    let routes = derive_routes(family, &allocation.host_addressing, route_mtu)?;

    tracing::debug!(%family, address = %ip, %gateway, routes = routes.len(), "prepared addressing");
    Ok(PreparedFamily {
        family,
        address: IpNet::from(ip),
        gateway,
        routes,
    })
}

/// Routes of `family` from the node addressing snapshot, sorted for
/// installation.
///
/// # Errors
///
/// Returns `PodwireError::Allocation` if the router IP or allocation range
/// is malformed.
pub fn derive_routes(family: AddressFamily, host: &HostAddressing, mtu: u32) -> Result<Vec<Route>> {
    let router = router_ip(host, family)?;
    let mut routes = vec![Route {
        prefix: IpNet::from(router),
        nexthop: None,
        mtu,
    }];

    if let Some(range) = host.entry(family).map(|e| e.alloc_range.as_str()).filter(|r| !r.is_empty()) {
        let prefix = range
            .parse::<IpNet>()
            .map_err(|e| allocation_error(format!("invalid {family} allocation range {range:?}: {e}")))?;
        routes.push(Route {
            prefix: prefix.trunc(),
            nexthop: Some(router),
            mtu,
        });
    }

    let unspecified = match family {
        AddressFamily::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        AddressFamily::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    let default = IpNet::new(unspecified, 0)
        .map_err(|e| allocation_error(format!("invalid default route: {e}")))?;
    routes.push(Route {
        prefix: default,
        nexthop: Some(router),
        mtu,
    });

    sort_routes(&mut routes);
    Ok(routes)
}

/// Orders routes by descending prefix length so narrower routes, which may
/// serve as nexthops of wider ones, go in first. Ties keep their order.
pub fn sort_routes(routes: &mut [Route]) {
    routes.sort_by(|a, b| b.prefix.prefix_len().cmp(&a.prefix.prefix_len()));
}

/// Returns every allocated address to the daemon.
///
/// Best effort: failures are logged, never returned.
pub fn release<D: DaemonApi>(daemon: &D, addresses: &AddressPair) {
    for family in PREPARE_ORDER {
        let ip = addresses.get(family);
        if ip.is_empty() {
            continue;
        }
        match daemon.release_address(ip) {
            Ok(()) => tracing::debug!(%ip, "released address"),
            Err(e) => tracing::warn!(%ip, error = %e, "unable to release address"),
        }
    }
}

fn router_ip(host: &HostAddressing, family: AddressFamily) -> Result<IpAddr> {
    let raw = host.entry(family).map_or("", |e| e.ip.as_str());
    raw.parse::<IpAddr>()
        .ok()
        .filter(|ip| family.matches(ip))
        .ok_or_else(|| allocation_error(format!("invalid {family} gateway address {raw:?}")))
}

fn allocation_error(message: String) -> PodwireError {
    PodwireError::Allocation { message }
}
