//! The host network seam.
//!
//! Every kernel facility the attach and detach workflows consume goes
//! through [`HostNetwork`]. Link-level calls act on the namespace the
//! calling thread currently lives in, so the same call works on the host
//! and, inside [`HostNetwork::run_in`], on the sandbox.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ipnet::IpNet;
use podwire_common::types::Route;

use crate::error::{KernelError, KernelResult};

/// Kind of a network device as reported by the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    /// One end of a paired virtual link.
    Veth,
    /// A software bridge.
    Bridge,
    /// A slave-link bound to a master device.
    Ipvlan,
    /// Any other virtual device kind.
    Other(String),
    /// A device without link info (physical NICs, loopback).
    Device,
}

impl LinkKind {
    /// Maps a kernel `info_kind` string.
    #[must_use]
    pub fn from_info_kind(kind: Option<&str>) -> Self {
        match kind {
            None => Self::Device,
            Some("veth") => Self::Veth,
            Some("bridge") => Self::Bridge,
            Some("ipvlan") => Self::Ipvlan,
            Some(other) => Self::Other(other.to_string()),
        }
    }
}

/// Attributes of a network device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInfo {
    /// Device name.
    pub name: String,
    /// Kernel interface index.
    pub index: u32,
    /// Hardware address, empty when the device has none.
    pub mac: String,
    /// Device kind.
    pub kind: LinkKind,
}

/// Operation mode of a slave-link device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpvlanMode {
    /// Layer 3 mode.
    L3,
    /// Layer 3 mode with netfilter symmetric routing.
    L3S,
}

impl fmt::Display for IpvlanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::L3 => write!(f, "l3"),
            Self::L3S => write!(f, "l3s"),
        }
    }
}

impl FromStr for IpvlanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l3" => Ok(Self::L3),
            "l3s" => Ok(Self::L3S),
            other => Err(format!("unsupported ipvlan operation mode {other:?}")),
        }
    }
}

/// Kernel facilities consumed by the plugin.
pub trait HostNetwork {
    /// Handle to an open network namespace.
    type Namespace;

    /// Scoped resource pinning a namespace while a slave-link is wired.
    /// Released when dropped.
    type Lease;

    /// Opens the namespace at `path`.
    ///
    /// # Errors
    ///
    /// Returns `KernelError::NotFound` when the namespace does not exist.
    fn open_namespace(&self, path: &Path) -> KernelResult<Self::Namespace>;

    /// Acquires a lease on `ns`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lease cannot be taken.
    fn lease_namespace(&self, ns: &Self::Namespace) -> KernelResult<Self::Lease>;

    /// Runs `f` with the calling thread pinned to `ns`, restoring the
    /// original namespace on every exit path.
    ///
    /// # Errors
    ///
    /// Returns the entry failure or whatever `f` returns.
    fn run_in<T, E, F>(&self, ns: &Self::Namespace, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<KernelError>;

    /// Looks up a device by name.
    ///
    /// # Errors
    ///
    /// Returns `KernelError::NotFound` when no such device exists.
    fn link(&self, name: &str) -> KernelResult<LinkInfo>;

    /// Creates a paired link. An `mtu` of 0 keeps the kernel default.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the pair.
    fn add_veth_pair(&self, host: &str, peer: &str, mtu: u32) -> KernelResult<()>;

    /// Creates a slave-link bound to the device with `master_index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the master is missing or the kernel rejects
    /// the device.
    fn add_ipvlan(&self, name: &str, master_index: u32, mode: IpvlanMode, mtu: u32)
    -> KernelResult<()>;

    /// Deletes a device. Deleting one end of a pair removes both.
    ///
    /// # Errors
    ///
    /// Returns `KernelError::NotFound` when the device does not exist.
    fn delete_link(&self, name: &str) -> KernelResult<()>;

    /// Moves a device into `ns`.
    ///
    /// # Errors
    ///
    /// Returns an error if the move fails.
    fn move_link(&self, name: &str, ns: &Self::Namespace) -> KernelResult<()>;

    /// Renames a device.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails.
    fn rename_link(&self, name: &str, new_name: &str) -> KernelResult<()>;

    /// Sets a device administratively up. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is missing.
    fn set_link_up(&self, name: &str) -> KernelResult<()>;

    /// Assigns an address to a device.
    ///
    /// # Errors
    ///
    /// Returns `KernelError::AlreadyExists` if the address is present.
    fn add_address(&self, name: &str, addr: IpNet) -> KernelResult<()>;

    /// Installs a route through a device.
    ///
    /// # Errors
    ///
    /// Returns `KernelError::AlreadyExists` if the route is present.
    fn add_route(&self, name: &str, route: &Route) -> KernelResult<()>;

    /// Writes a sysctl value through procfs.
    ///
    /// # Errors
    ///
    /// Returns `KernelError::Io` if the write fails.
    fn write_sysctl(&self, path: &Path, value: &str) -> KernelResult<()>;
}
