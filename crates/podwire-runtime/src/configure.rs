//! Interface, address and route configuration inside the sandbox.

use std::path::Path;

use podwire_common::constants::IPV6_DISABLE_ALL_SYSCTL;
use podwire_common::error::{PodwireError, Result};
use podwire_core::error::{KernelError, KernelResult, tolerate_exists, tolerate_missing};
use podwire_core::host::HostNetwork;

use crate::addressing::{PreparedFamily, sort_routes};

/// Applies prepared addressing to an interface in a sandbox namespace.
#[derive(Debug)]
pub struct NamespaceConfigurator<'h, H> {
    host: &'h H,
}

impl<'h, H: HostNetwork> NamespaceConfigurator<'h, H> {
    /// Creates a configurator over `host`.
    #[must_use]
    pub const fn new(host: &'h H) -> Self {
        Self { host }
    }

    /// Configures `ifname` inside `ns` and returns its MAC address.
    ///
    /// `families` are applied in the given order. Addresses and routes that
    /// are already present are left alone.
    ///
    /// # Errors
    ///
    /// Returns `PodwireError::Provisioning` if the interface is missing or
    /// any address, route or link operation fails.
    pub fn configure(
        &self,
        ns: &H::Namespace,
        ifname: &str,
        families: &[&PreparedFamily],
    ) -> Result<String> {
        let host = self.host;
        host.run_in(ns, || -> Result<String> {
            if let Err(e) = host.write_sysctl(Path::new(IPV6_DISABLE_ALL_SYSCTL), "0\n") {
                tracing::warn!(error = %e, "unable to enable ipv6 on all interfaces");
            }

            host.set_link_up(ifname)
                .map_err(|e| provisioning(format!("failed to set {ifname} up: {e}")))?;

            for prepared in families {
                apply_family(host, ifname, prepared).map_err(|e| {
                    provisioning(format!("error configuring {}: {e}", prepared.family))
                })?;
            }

            host.set_link_up(ifname)
                .map_err(|e| provisioning(format!("failed to set {ifname} up: {e}")))?;
            let link = host.link(ifname)?;
            Ok(link.mac)
        })
    }

    /// Deletes `ifname` inside `ns` if it exists.
    ///
    /// Returns whether an interface was removed.
    ///
    /// # Errors
    ///
    /// Returns `PodwireError::Provisioning` if the namespace cannot be
    /// entered or the delete fails for a reason other than absence.
    pub fn remove_interface_if_exists(&self, ns: &H::Namespace, ifname: &str) -> Result<bool> {
        let host = self.host;
        let removed = host.run_in(ns, || tolerate_missing(host.delete_link(ifname)))?;
        if removed {
            tracing::debug!(ifname, "removed interface from namespace");
        }
        Ok(removed)
    }
}

fn apply_family<H: HostNetwork>(
    host: &H,
    ifname: &str,
    prepared: &PreparedFamily,
) -> KernelResult<()> {
    tracing::debug!(ifname, address = %prepared.address, "configuring link");
    if !tolerate_exists(host.add_address(ifname, prepared.address))? {
        tracing::debug!(address = %prepared.address, "address already present");
    }

    // ipvlan devices only accept routes once up, and only go up with an address.
    host.set_link_up(ifname)?;

    let mut routes = prepared.routes.clone();
    sort_routes(&mut routes);
    for route in &routes {
        tracing::debug!(%route, "adding route");
        match tolerate_exists(host.add_route(ifname, route)) {
            Ok(true) => {}
            Ok(false) => tracing::debug!(%route, "route already present"),
            Err(e) => {
                return Err(KernelError::CommandFailed {
                    command: format!("route add {route} dev {ifname}"),
                    message: e.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn provisioning(message: String) -> PodwireError {
    PodwireError::Provisioning { message }
}
