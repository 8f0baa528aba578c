//! Attach path for sandboxes already wired by an upstream bridge plugin.
//!
//! When a bridging plugin ran earlier in the chain, the veth pair, the
//! bridge and the sandbox address already exist. Only the endpoint has to
//! be registered, with the facts recovered from the prior result and the
//! host's view of the listed devices.

use std::net::IpAddr;

use podwire_common::args::InvocationArguments;
use podwire_common::error::{PodwireError, PriorResultElement, Result};
use podwire_common::result::CniResult;
use podwire_common::types::AddressFamily;
use podwire_core::host::{HostNetwork, LinkKind};

use crate::daemon::DaemonApi;
use crate::endpoint::{EndpointRegistrar, new_descriptor};

/// Facts about an existing bridge attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeAttachment {
    /// MAC of the bridge device.
    pub bridge_mac: String,
    /// Name of the host-side veth.
    pub host_link_name: String,
    /// Kernel index of the host-side veth.
    pub host_link_index: u32,
    /// MAC of the sandbox-side veth.
    pub sandbox_mac: String,
    /// IPv4 address of the sandbox interface.
    pub sandbox_address: IpAddr,
}

impl BridgeAttachment {
    /// Recovers the attachment from a prior result.
    ///
    /// Host-side interfaces are classified by looking them up on the host;
    /// interfaces the host does not know are skipped.
    ///
    /// # Errors
    ///
    /// Returns `PodwireError::PriorResult` naming the first element that
    /// could not be determined.
    pub fn from_prior_result<H: HostNetwork>(host: &H, prior: &CniResult) -> Result<Self> {
        let mut bridge_mac = None;
        let mut host_link = None;
        let mut sandbox = None;

        for (position, iface) in prior.interfaces.iter().enumerate() {
            if !iface.sandbox.is_empty() {
                sandbox = Some((position, iface.mac.clone()));
                continue;
            }
            let Ok(link) = host.link(&iface.name) else {
                tracing::debug!(name = %iface.name, "prior result interface not found on host");
                continue;
            };
            match link.kind {
                LinkKind::Veth => host_link = Some((iface.name.clone(), link.index)),
                LinkKind::Bridge => bridge_mac = Some(iface.mac.clone()),
                _ => {}
            }
        }

        let sandbox_address = sandbox.as_ref().and_then(|(position, _)| {
            prior
                .ips
                .iter()
                .filter(|ip| ip.interface == Some(*position))
                .map(|ip| ip.address.addr())
                .find(|addr| AddressFamily::V4.matches(addr))
        });

        let missing = |element| PodwireError::PriorResult { missing: element };
        let bridge_mac = bridge_mac
            .filter(|mac| !mac.is_empty())
            .ok_or_else(|| missing(PriorResultElement::BridgeMac))?;
        let (host_link_name, host_link_index) =
            host_link.ok_or_else(|| missing(PriorResultElement::HostLinkName))?;
        let sandbox_mac = sandbox
            .map(|(_, mac)| mac)
            .filter(|mac| !mac.is_empty())
            .ok_or_else(|| missing(PriorResultElement::SandboxMac))?;
        let sandbox_address =
            sandbox_address.ok_or_else(|| missing(PriorResultElement::SandboxAddress))?;
        if host_link_index == 0 {
            return Err(missing(PriorResultElement::HostLinkIndex));
        }

        Ok(Self {
            bridge_mac,
            host_link_name,
            host_link_index,
            sandbox_mac,
            sandbox_address,
        })
    }
}

/// Registers endpoints for bridge-wired sandboxes.
#[derive(Debug)]
pub struct BridgeAdapter<'a, H, D> {
    host: &'a H,
    daemon: &'a D,
}

impl<'a, H: HostNetwork, D: DaemonApi> BridgeAdapter<'a, H, D> {
    /// Creates an adapter.
    #[must_use]
    pub const fn new(host: &'a H, daemon: &'a D) -> Self {
        Self { host, daemon }
    }

    /// Registers the endpoint described by `prior` and returns the empty
    /// result this path reports.
    ///
    /// # Errors
    ///
    /// Returns `PodwireError::PriorResult` if the prior result is
    /// incomplete, or `PodwireError::Registration` if the daemon rejects
    /// the endpoint.
    pub fn attach(
        &self,
        args: &InvocationArguments,
        prior: &CniResult,
        cni_version: &str,
    ) -> Result<CniResult> {
        let attachment = BridgeAttachment::from_prior_result(self.host, prior).inspect_err(|e| {
            tracing::error!(error = %e, "unable to create endpoint from prior result");
        })?;

        let mut descriptor = new_descriptor(&args.container_id);
        descriptor.addressing.ipv4 = attachment.sandbox_address.to_string();
        descriptor.host_mac = attachment.bridge_mac;
        descriptor.interface_index = attachment.host_link_index;
        descriptor.interface_name = attachment.host_link_name;
        descriptor.mac = attachment.sandbox_mac;
        descriptor.k8s_pod_name.clone_from(&args.pod.name);
        descriptor.k8s_namespace.clone_from(&args.pod.namespace);

        EndpointRegistrar::new(self.daemon).register(&args.container_id, descriptor)?;
        Ok(CniResult::new(cni_version))
    }
}
