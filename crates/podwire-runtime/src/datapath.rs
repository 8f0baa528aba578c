//! Datapath device provisioning.
//!
//! The daemon picks one of two strategies for wiring a sandbox:
//!
//! - **paired-link** (`veth`): a veth pair whose host end stays in the host
//!   namespace and whose peer moves into the sandbox.
//! - **slave-link** (`ipvlan`): an ipvlan device bound to a daemon-chosen
//!   master, moved wholesale into the sandbox.
//!
//! Both create the device under a temporary name in the host namespace and
//! rename it once it lives in the sandbox, so a half-finished attach never
//! collides with the requested interface name.

use std::fmt::Write as _;

use podwire_common::constants::{HOST_INTERFACE_PREFIX, IFNAMSIZ, TEMP_INTERFACE_PREFIX};
use podwire_common::error::{PodwireError, Result};
use podwire_common::types::ContainerId;
use podwire_core::error::KernelError;
use podwire_core::host::{HostNetwork, IpvlanMode};
use podwire_core::sysctl;
use sha2::{Digest, Sha256};

use crate::daemon::models::{DaemonConfig, EndpointDescriptor};
use crate::rollback::RollbackPlan;

/// Daemon-reported mode selecting the paired-link strategy.
pub const MODE_VETH: &str = "veth";

/// Daemon-reported mode selecting the slave-link strategy.
pub const MODE_IPVLAN: &str = "ipvlan";

/// Device creation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datapath {
    /// veth pair.
    PairedLink,
    /// ipvlan slave of a master device.
    SlaveLink {
        /// Kernel index of the master device.
        master_index: u32,
        /// ipvlan operation mode.
        mode: IpvlanMode,
    },
}

/// What to provision for one sandbox.
#[derive(Debug, Clone, Copy)]
pub struct DeviceRequest<'a> {
    /// Sandbox container id, source of the device names.
    pub container_id: &'a ContainerId,
    /// Final interface name inside the sandbox.
    pub ifname: &'a str,
    /// Device MTU, 0 for the kernel default.
    pub mtu: u32,
}

impl Datapath {
    /// Selects the strategy from the daemon configuration.
    ///
    /// # Errors
    ///
    /// Returns `PodwireError::Config` for an unknown mode or an ipvlan
    /// mode without slave-link parameters.
    pub fn from_config(config: &DaemonConfig) -> Result<Self> {
        match config.datapath_mode.as_str() {
            MODE_VETH => Ok(Self::PairedLink),
            MODE_IPVLAN => {
                let params = config
                    .ipvlan_configuration
                    .as_ref()
                    .ok_or_else(|| PodwireError::Config {
                        message: "ipvlan datapath without ipvlan configuration".into(),
                    })?;
                let mode = params
                    .operation_mode
                    .parse::<IpvlanMode>()
                    .map_err(|message| PodwireError::Config { message })?;
                Ok(Self::SlaveLink {
                    master_index: params.master_device_index,
                    mode,
                })
            }
            other => Err(PodwireError::Config {
                message: format!("unsupported datapath mode {other:?}"),
            }),
        }
    }

    /// Creates the device, moves it into `ns` and fills the descriptor's
    /// interface fields.
    ///
    /// A paired-link host device is anchored in `rollback` as soon as it
    /// exists. A slave-link returns the namespace lease it took; the caller
    /// holds it until the attach, including any rollback, is over.
    ///
    /// # Errors
    ///
    /// Returns `PodwireError::Provisioning` if any kernel step fails.
    pub fn provision<H: HostNetwork>(
        self,
        host: &H,
        ns: &H::Namespace,
        request: &DeviceRequest<'_>,
        descriptor: &mut EndpointDescriptor,
        rollback: &mut RollbackPlan,
    ) -> Result<Option<H::Lease>> {
        match self {
            Self::PairedLink => {
                provision_paired(host, ns, request, descriptor, rollback)?;
                Ok(None)
            }
            Self::SlaveLink { master_index, mode } => {
                provision_slave(host, ns, request, master_index, mode, descriptor).map(Some)
            }
        }
    }
}

fn provision_paired<H: HostNetwork>(
    host: &H,
    ns: &H::Namespace,
    request: &DeviceRequest<'_>,
    descriptor: &mut EndpointDescriptor,
    rollback: &mut RollbackPlan,
) -> Result<()> {
    let host_name = host_interface_name(request.container_id);
    let temp_name = temp_interface_name(request.container_id);

    host.add_veth_pair(&host_name, &temp_name, request.mtu)
        .map_err(|e| provisioning(format!("unable to create veth pair {host_name}: {e}")))?;
    rollback.anchor_device(&host_name);

    let host_link = host.link(&host_name)?;
    let peer_link = host.link(&temp_name)?;
    host.set_link_up(&host_name)?;
    host.write_sysctl(&sysctl::rp_filter_path(&host_name), "0\n")?;

    descriptor.host_mac = host_link.mac;
    descriptor.interface_index = host_link.index;
    descriptor.interface_name = host_name.clone();
    descriptor.mac = peer_link.mac;

    host.move_link(&temp_name, ns)
        .map_err(|e| provisioning(format!("unable to move veth peer {temp_name} to netns: {e}")))?;
    host.run_in(ns, || host.rename_link(&temp_name, request.ifname))
        .map_err(|e| provisioning(format!("unable to rename {temp_name} to {}: {e}", request.ifname)))?;

    tracing::debug!(host = %host_name, sandbox = request.ifname, "provisioned veth pair");
    Ok(())
}

fn provision_slave<H: HostNetwork>(
    host: &H,
    ns: &H::Namespace,
    request: &DeviceRequest<'_>,
    master_index: u32,
    mode: IpvlanMode,
    descriptor: &mut EndpointDescriptor,
) -> Result<H::Lease> {
    let temp_name = temp_interface_name(request.container_id);
    let lease = host.lease_namespace(ns)?;

    host.add_ipvlan(&temp_name, master_index, mode, request.mtu)
        .map_err(|e| provisioning(format!("unable to create ipvlan slave {temp_name}: {e}")))?;

    if let Err(e) = host.move_link(&temp_name, ns) {
        if let Err(cleanup) = host.delete_link(&temp_name) {
            tracing::warn!(device = %temp_name, error = %cleanup, "failed to delete ipvlan slave");
        }
        return Err(provisioning(format!(
            "unable to move ipvlan slave {temp_name} to netns: {e}"
        )));
    }

    let link = host
        .run_in(ns, || -> std::result::Result<_, KernelError> {
            host.rename_link(&temp_name, request.ifname)?;
            host.link(request.ifname)
        })
        .map_err(|e| provisioning(format!("unable to set up ipvlan slave in netns: {e}")))?;

    descriptor.mac = link.mac;
    descriptor.interface_index = link.index;
    descriptor.interface_name = link.name;

    tracing::debug!(
        sandbox = request.ifname,
        master_index,
        %mode,
        "provisioned ipvlan slave"
    );
    Ok(lease)
}

/// Host-side device name: the prefix plus a truncated hex digest of the
/// container id, short enough to fit `IFNAMSIZ`.
#[must_use]
pub fn host_interface_name(container_id: &ContainerId) -> String {
    let digest = Sha256::digest(container_id.as_str().as_bytes());
    let mut name = String::from(HOST_INTERFACE_PREFIX);
    let keep = IFNAMSIZ - HOST_INTERFACE_PREFIX.len() - 1;
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    name.push_str(&hex[..keep]);
    name
}

/// Temporary device name used until the device is renamed in the sandbox.
#[must_use]
pub fn temp_interface_name(container_id: &ContainerId) -> String {
    let mut name = String::from(TEMP_INTERFACE_PREFIX);
    name.extend(container_id.as_str().chars().take(5));
    name
}

fn provisioning(message: String) -> PodwireError {
    PodwireError::Provisioning { message }
}
