//! iproute2-backed implementation of [`HostNetwork`].
//!
//! Each operation spawns the `ip` binary. A spawned child inherits the
//! network namespace of the spawning thread, so commands issued inside
//! [`HostNetwork::run_in`] act on the sandbox.

use std::path::{Path, PathBuf};
use std::process::Command;

use ipnet::IpNet;
use podwire_common::types::Route;
use serde::Deserialize;

use crate::error::{KernelError, KernelResult};
use crate::host::{HostNetwork, IpvlanMode, LinkInfo, LinkKind};
use crate::namespace::NetNamespace;
use crate::sysctl;

/// Lowercased stderr fragments iproute2 prints when the object is already
/// present. Kernels with extended acks report duplicate addresses as
/// `Error: ipv4: Address already assigned.` rather than `EEXIST`.
const EXISTS_MARKERS: &[&str] = &["file exists", "already assigned"];

/// Lowercased stderr fragments iproute2 prints when the object is absent.
const MISSING_MARKERS: &[&str] = &[
    "cannot find device",
    "does not exist",
    "no such device",
    "no such file",
];

/// Host network backend driving the `ip` command.
#[derive(Debug, Clone)]
pub struct IpRoute2 {
    binary: PathBuf,
}

impl IpRoute2 {
    /// Uses the given `ip` binary.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Locates `ip` on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns `KernelError::NotFound` if no `ip` binary is installed.
    pub fn locate() -> KernelResult<Self> {
        let binary = which::which("ip").map_err(|e| KernelError::NotFound {
            what: format!("iproute2 binary ({e})"),
        })?;
        tracing::debug!(binary = %binary.display(), "using iproute2");
        Ok(Self::new(binary))
    }

    /// Runs `ip` with `args`, returning stdout.
    fn run(&self, args: &[String], subject: &str) -> KernelResult<String> {
        let command = format!("ip {}", args.join(" "));
        tracing::trace!(%command, "running iproute2");

        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|e| KernelError::Io {
                path: self.binary.clone(),
                source: e,
            })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(classify_failure(&command, subject, stderr.trim()))
    }

    fn links(&self, selector: &[&str], subject: &str) -> KernelResult<Vec<LinkInfo>> {
        let mut args = strings(&["-details", "-json", "link", "show"]);
        args.extend(selector.iter().map(ToString::to_string));
        let stdout = self.run(&args, subject)?;
        parse_links(&stdout).map_err(|e| KernelError::CommandFailed {
            command: format!("ip {}", args.join(" ")),
            message: format!("unparseable link listing: {e}"),
        })
    }

    fn link_by_index(&self, index: u32) -> KernelResult<LinkInfo> {
        let subject = format!("device with index {index}");
        self.links(&[], &subject)?
            .into_iter()
            .find(|l| l.index == index)
            .ok_or(KernelError::NotFound { what: subject })
    }
}

impl HostNetwork for IpRoute2 {
    type Namespace = NetNamespace;
    type Lease = NetNamespace;

    fn open_namespace(&self, path: &Path) -> KernelResult<NetNamespace> {
        NetNamespace::open(path)
    }

    fn lease_namespace(&self, ns: &NetNamespace) -> KernelResult<NetNamespace> {
        ns.try_clone()
    }

    fn run_in<T, E, F>(&self, ns: &NetNamespace, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<KernelError>,
    {
        ns.run(f)
    }

    fn link(&self, name: &str) -> KernelResult<LinkInfo> {
        let subject = format!("device {name}");
        self.links(&["dev", name], &subject)?
            .into_iter()
            .next()
            .ok_or(KernelError::NotFound { what: subject })
    }

    fn add_veth_pair(&self, host: &str, peer: &str, mtu: u32) -> KernelResult<()> {
        self.run(&veth_args(host, peer, mtu), &format!("device {host}"))?;
        tracing::debug!(host, peer, mtu, "created veth pair");
        Ok(())
    }

    fn add_ipvlan(
        &self,
        name: &str,
        master_index: u32,
        mode: IpvlanMode,
        mtu: u32,
    ) -> KernelResult<()> {
        let master = self.link_by_index(master_index)?;
        self.run(
            &ipvlan_args(name, &master.name, mode, mtu),
            &format!("device {name}"),
        )?;
        tracing::debug!(name, master = %master.name, %mode, "created ipvlan device");
        Ok(())
    }

    fn delete_link(&self, name: &str) -> KernelResult<()> {
        self.run(
            &strings(&["link", "del", "dev", name]),
            &format!("device {name}"),
        )?;
        tracing::debug!(name, "deleted link");
        Ok(())
    }

    fn move_link(&self, name: &str, ns: &NetNamespace) -> KernelResult<()> {
        let target = ns.descriptor_path();
        let target = target.to_string_lossy();
        self.run(
            &strings(&["link", "set", "dev", name, "netns", &target]),
            &format!("device {name}"),
        )?;
        tracing::debug!(name, netns = %ns.path().display(), "moved link");
        Ok(())
    }

    fn rename_link(&self, name: &str, new_name: &str) -> KernelResult<()> {
        self.run(
            &strings(&["link", "set", "dev", name, "name", new_name]),
            &format!("device {new_name}"),
        )?;
        Ok(())
    }

    fn set_link_up(&self, name: &str) -> KernelResult<()> {
        self.run(
            &strings(&["link", "set", "dev", name, "up"]),
            &format!("device {name}"),
        )?;
        Ok(())
    }

    fn add_address(&self, name: &str, addr: IpNet) -> KernelResult<()> {
        self.run(
            &strings(&["addr", "add", &addr.to_string(), "dev", name]),
            &format!("address {addr} on {name}"),
        )?;
        Ok(())
    }

    fn add_route(&self, name: &str, route: &Route) -> KernelResult<()> {
        self.run(&route_args(name, route), &format!("route {route}"))?;
        Ok(())
    }

    fn write_sysctl(&self, path: &Path, value: &str) -> KernelResult<()> {
        sysctl::write(path, value)
    }
}

fn strings(parts: &[&str]) -> Vec<String> {
    parts.iter().map(ToString::to_string).collect()
}

fn veth_args(host: &str, peer: &str, mtu: u32) -> Vec<String> {
    let mut args = strings(&["link", "add", "name", host]);
    push_mtu(&mut args, mtu);
    args.extend(strings(&["type", "veth", "peer", "name", peer]));
    push_mtu(&mut args, mtu);
    args
}

fn ipvlan_args(name: &str, master: &str, mode: IpvlanMode, mtu: u32) -> Vec<String> {
    let mut args = strings(&["link", "add", "link", master, "name", name]);
    push_mtu(&mut args, mtu);
    args.extend(strings(&["type", "ipvlan", "mode"]));
    args.push(mode.to_string());
    args
}

fn route_args(name: &str, route: &Route) -> Vec<String> {
    let mut args = strings(&["route", "add", &route.prefix.to_string()]);
    if let Some(gw) = route.nexthop {
        args.push("via".into());
        args.push(gw.to_string());
    }
    args.extend(strings(&["dev", name]));
    push_mtu(&mut args, route.mtu);
    if route.nexthop.is_none() {
        args.extend(strings(&["scope", "link"]));
    }
    args
}

fn push_mtu(args: &mut Vec<String>, mtu: u32) {
    if mtu > 0 {
        args.push("mtu".into());
        args.push(mtu.to_string());
    }
}

fn classify_failure(command: &str, subject: &str, stderr: &str) -> KernelError {
    let lowered = stderr.to_ascii_lowercase();
    if EXISTS_MARKERS.iter().any(|m| lowered.contains(m)) {
        KernelError::AlreadyExists {
            what: subject.to_string(),
        }
    } else if MISSING_MARKERS.iter().any(|m| lowered.contains(m)) {
        KernelError::NotFound {
            what: subject.to_string(),
        }
    } else {
        KernelError::CommandFailed {
            command: command.to_string(),
            message: stderr.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawLink {
    ifindex: u32,
    ifname: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    linkinfo: Option<RawLinkInfo>,
}

#[derive(Debug, Deserialize)]
struct RawLinkInfo {
    info_kind: Option<String>,
}

fn parse_links(json: &str) -> serde_json::Result<Vec<LinkInfo>> {
    let raw: Vec<RawLink> = serde_json::from_str(json)?;
    Ok(raw
        .into_iter()
        .map(|l| LinkInfo {
            kind: LinkKind::from_info_kind(
                l.linkinfo.as_ref().and_then(|i| i.info_kind.as_deref()),
            ),
            name: l.ifname,
            index: l.ifindex,
            mac: l.address,
        })
        .collect())
}
