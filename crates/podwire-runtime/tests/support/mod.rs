//! In-memory host network and daemon used by the workflow tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use ipnet::IpNet;
use podwire_common::args::InvocationArguments;
use podwire_common::error::{PodwireError, Result};
use podwire_common::netconf::NetworkConfig;
use podwire_common::types::{EndpointId, PodIdentity, Route};
use podwire_core::error::{KernelError, KernelResult};
use podwire_core::host::{HostNetwork, IpvlanMode, LinkInfo, LinkKind};
use podwire_runtime::daemon::models::{
    AddressPair, Allocation, DaemonConfig, EndpointDescriptor, FamilyAddressing, HostAddressing,
    IpvlanConfiguration,
};
use podwire_runtime::daemon::{DaemonApi, RemovalError};

pub const NETNS: &str = "/var/run/netns/sandbox-1";
pub const CONTAINER_ID: &str = "9f3c2b1a0d8e7f6a";

// ── Host ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FakeLink {
    pub name: String,
    pub ns: Option<PathBuf>,
    pub index: u32,
    pub mac: String,
    pub kind: LinkKind,
    pub up: bool,
    pub peer: Option<u32>,
}

#[derive(Debug, Default)]
struct HostState {
    namespaces: HashSet<PathBuf>,
    current: Option<PathBuf>,
    links: Vec<FakeLink>,
    addresses: Vec<(Option<PathBuf>, String, IpNet)>,
    routes: Vec<(Option<PathBuf>, String, Route)>,
    sysctls: Vec<(PathBuf, String)>,
    ops: Vec<String>,
    failing: HashSet<&'static str>,
    next_index: u32,
}

impl HostState {
    fn find(&self, name: &str) -> Option<usize> {
        let current = self.current.clone();
        self.links
            .iter()
            .position(|l| l.name == name && l.ns == current)
    }

    fn fail_if(&self, op: &'static str) -> KernelResult<()> {
        if self.failing.contains(op) {
            return Err(KernelError::CommandFailed {
                command: op.into(),
                message: "injected failure".into(),
            });
        }
        Ok(())
    }

    fn new_link(&mut self, name: &str, kind: LinkKind) -> u32 {
        self.next_index += 1;
        let index = self.next_index;
        self.links.push(FakeLink {
            name: name.into(),
            ns: self.current.clone(),
            index,
            mac: format!("02:00:00:00:00:{index:02x}"),
            kind,
            up: false,
            peer: None,
        });
        index
    }
}

#[derive(Debug, Clone)]
pub struct FakeNamespace {
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct FakeLease {
    active: Rc<Cell<usize>>,
}

impl Drop for FakeLease {
    fn drop(&mut self) {
        self.active.set(self.active.get() - 1);
    }
}

/// Host whose kernel state lives in memory. Namespaces are identified by
/// path; `None` is the host namespace.
#[derive(Debug, Default)]
pub struct FakeHost {
    state: RefCell<HostState>,
    active_leases: Rc<Cell<usize>>,
    leases_taken: Cell<usize>,
}

impl FakeHost {
    pub fn with_namespace(path: &str) -> Self {
        let host = Self::default();
        let _ = host.state.borrow_mut().namespaces.insert(PathBuf::from(path));
        host
    }

    pub fn fail(&self, op: &'static str) {
        let _ = self.state.borrow_mut().failing.insert(op);
    }

    pub fn seed_link(&self, ns: Option<&str>, name: &str, kind: LinkKind, mac: &str) -> u32 {
        let mut state = self.state.borrow_mut();
        let saved = state.current.take();
        state.current = ns.map(PathBuf::from);
        let index = state.new_link(name, kind);
        if let Some(link) = state.links.iter_mut().find(|l| l.index == index) {
            link.mac = mac.into();
        }
        state.current = saved;
        index
    }

    pub fn seed_address(&self, ns: &str, ifname: &str, addr: &str) {
        self.state.borrow_mut().addresses.push((
            Some(PathBuf::from(ns)),
            ifname.into(),
            addr.parse().unwrap(),
        ));
    }

    pub fn seed_route(&self, ns: &str, ifname: &str, route: Route) {
        self.state
            .borrow_mut()
            .routes
            .push((Some(PathBuf::from(ns)), ifname.into(), route));
    }

    pub fn links_in(&self, ns: Option<&str>) -> Vec<FakeLink> {
        let ns = ns.map(PathBuf::from);
        self.state
            .borrow()
            .links
            .iter()
            .filter(|l| l.ns == ns)
            .cloned()
            .collect()
    }

    pub fn addresses_in(&self, ns: &str, ifname: &str) -> Vec<String> {
        let ns = Some(PathBuf::from(ns));
        self.state
            .borrow()
            .addresses
            .iter()
            .filter(|(n, i, _)| *n == ns && i == ifname)
            .map(|(_, _, a)| a.to_string())
            .collect()
    }

    pub fn routes_in(&self, ns: &str, ifname: &str) -> Vec<Route> {
        let ns = Some(PathBuf::from(ns));
        self.state
            .borrow()
            .routes
            .iter()
            .filter(|(n, i, _)| *n == ns && i == ifname)
            .map(|(_, _, r)| r.clone())
            .collect()
    }

    pub fn sysctls(&self) -> Vec<(PathBuf, String)> {
        self.state.borrow().sysctls.clone()
    }

    pub fn ops(&self) -> Vec<String> {
        self.state.borrow().ops.clone()
    }

    pub fn active_leases(&self) -> usize {
        self.active_leases.get()
    }

    /// Shared counter of live leases, for observers outside the host.
    pub fn lease_gauge(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.active_leases)
    }

    pub fn leases_taken(&self) -> usize {
        self.leases_taken.get()
    }

    pub fn in_host_namespace(&self) -> bool {
        self.state.borrow().current.is_none()
    }

    fn record(&self, op: String) {
        self.state.borrow_mut().ops.push(op);
    }
}

impl HostNetwork for FakeHost {
    type Namespace = FakeNamespace;
    type Lease = FakeLease;

    fn open_namespace(&self, path: &Path) -> KernelResult<FakeNamespace> {
        if self.state.borrow().namespaces.contains(path) {
            Ok(FakeNamespace {
                path: path.to_path_buf(),
            })
        } else {
            Err(KernelError::NotFound {
                what: format!("network namespace {}", path.display()),
            })
        }
    }

    fn lease_namespace(&self, _ns: &FakeNamespace) -> KernelResult<FakeLease> {
        self.active_leases.set(self.active_leases.get() + 1);
        self.leases_taken.set(self.leases_taken.get() + 1);
        Ok(FakeLease {
            active: Rc::clone(&self.active_leases),
        })
    }

    fn run_in<T, E, F>(&self, ns: &FakeNamespace, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: From<KernelError>,
    {
        let previous = self.state.borrow_mut().current.replace(ns.path.clone());
        let result = f();
        self.state.borrow_mut().current = previous;
        result
    }

    fn link(&self, name: &str) -> KernelResult<LinkInfo> {
        let state = self.state.borrow();
        let pos = state.find(name).ok_or_else(|| KernelError::NotFound {
            what: format!("device {name}"),
        })?;
        let link = &state.links[pos];
        Ok(LinkInfo {
            name: link.name.clone(),
            index: link.index,
            mac: link.mac.clone(),
            kind: link.kind.clone(),
        })
    }

    fn add_veth_pair(&self, host: &str, peer: &str, _mtu: u32) -> KernelResult<()> {
        self.record(format!("add_veth_pair {host} {peer}"));
        let mut state = self.state.borrow_mut();
        state.fail_if("add_veth_pair")?;
        if state.find(host).is_some() || state.find(peer).is_some() {
            return Err(KernelError::AlreadyExists {
                what: format!("device {host}"),
            });
        }
        let a = state.new_link(host, LinkKind::Veth);
        let b = state.new_link(peer, LinkKind::Veth);
        for link in &mut state.links {
            if link.index == a {
                link.peer = Some(b);
            } else if link.index == b {
                link.peer = Some(a);
            }
        }
        Ok(())
    }

    fn add_ipvlan(
        &self,
        name: &str,
        master_index: u32,
        mode: IpvlanMode,
        _mtu: u32,
    ) -> KernelResult<()> {
        self.record(format!("add_ipvlan {name} {master_index} {mode}"));
        let mut state = self.state.borrow_mut();
        state.fail_if("add_ipvlan")?;
        if !state
            .links
            .iter()
            .any(|l| l.index == master_index && l.ns.is_none())
        {
            return Err(KernelError::NotFound {
                what: format!("device with index {master_index}"),
            });
        }
        let _ = state.new_link(name, LinkKind::Ipvlan);
        Ok(())
    }

    fn delete_link(&self, name: &str) -> KernelResult<()> {
        self.record(format!("delete_link {name}"));
        let mut state = self.state.borrow_mut();
        state.fail_if("delete_link")?;
        let pos = state.find(name).ok_or_else(|| KernelError::NotFound {
            what: format!("device {name}"),
        })?;
        let link = state.links.remove(pos);
        if let Some(peer) = link.peer {
            state.links.retain(|l| l.index != peer);
        }
        Ok(())
    }

    fn move_link(&self, name: &str, ns: &FakeNamespace) -> KernelResult<()> {
        self.record(format!("move_link {name}"));
        let mut state = self.state.borrow_mut();
        state.fail_if("move_link")?;
        let pos = state.find(name).ok_or_else(|| KernelError::NotFound {
            what: format!("device {name}"),
        })?;
        state.links[pos].ns = Some(ns.path.clone());
        Ok(())
    }

    fn rename_link(&self, name: &str, new_name: &str) -> KernelResult<()> {
        self.record(format!("rename_link {name} {new_name}"));
        let mut state = self.state.borrow_mut();
        state.fail_if("rename_link")?;
        if state.find(new_name).is_some() {
            return Err(KernelError::AlreadyExists {
                what: format!("device {new_name}"),
            });
        }
        let pos = state.find(name).ok_or_else(|| KernelError::NotFound {
            what: format!("device {name}"),
        })?;
        state.links[pos].name = new_name.into();
        Ok(())
    }

    fn set_link_up(&self, name: &str) -> KernelResult<()> {
        let mut state = self.state.borrow_mut();
        let pos = state.find(name).ok_or_else(|| KernelError::NotFound {
            what: format!("device {name}"),
        })?;
        state.links[pos].up = true;
        Ok(())
    }

    fn add_address(&self, name: &str, addr: IpNet) -> KernelResult<()> {
        self.record(format!("add_address {name} {addr}"));
        let mut state = self.state.borrow_mut();
        state.fail_if("add_address")?;
        let _ = state.find(name).ok_or_else(|| KernelError::NotFound {
            what: format!("device {name}"),
        })?;
        let current = state.current.clone();
        if state
            .addresses
            .iter()
            .any(|(n, i, a)| *n == current && i == name && *a == addr)
        {
            return Err(KernelError::AlreadyExists {
                what: format!("address {addr}"),
            });
        }
        state.addresses.push((current, name.into(), addr));
        Ok(())
    }

    fn add_route(&self, name: &str, route: &Route) -> KernelResult<()> {
        self.record(format!("add_route {name} {route}"));
        let mut state = self.state.borrow_mut();
        state.fail_if("add_route")?;
        let current = state.current.clone();
        if state
            .routes
            .iter()
            .any(|(n, _, r)| *n == current && r.prefix == route.prefix)
        {
            return Err(KernelError::AlreadyExists {
                what: format!("route {route}"),
            });
        }
        state.routes.push((current, name.into(), route.clone()));
        Ok(())
    }

    fn write_sysctl(&self, path: &Path, value: &str) -> KernelResult<()> {
        let mut state = self.state.borrow_mut();
        state.fail_if("write_sysctl")?;
        state.sysctls.push((path.to_path_buf(), value.into()));
        Ok(())
    }
}

// ── Daemon ───────────────────────────────────────────────────────────

/// Daemon double recording every call.
#[derive(Debug, Default)]
pub struct FakeDaemon {
    pub config: DaemonConfig,
    pub allocation: Option<Allocation>,
    pub register_error: Option<String>,
    pub removal_error: Option<RemovalError>,
    pub released: RefCell<Vec<String>>,
    pub registered: RefCell<Vec<(EndpointId, EndpointDescriptor)>>,
    pub endpoints: RefCell<HashSet<String>>,
    pub owners: RefCell<Vec<String>>,
    pub lease_gauge: Option<Rc<Cell<usize>>>,
    pub leases_at_register: Cell<Option<usize>>,
    pub leases_at_release: RefCell<Vec<usize>>,
}

impl FakeDaemon {
    pub fn new(config: DaemonConfig, allocation: Allocation) -> Self {
        Self {
            config,
            allocation: Some(allocation),
            ..Self::default()
        }
    }

    pub fn watching_leases(mut self, host: &FakeHost) -> Self {
        self.lease_gauge = Some(host.lease_gauge());
        self
    }

    fn live_leases(&self) -> Option<usize> {
        self.lease_gauge.as_ref().map(|gauge| gauge.get())
    }

    pub fn released(&self) -> Vec<String> {
        self.released.borrow().clone()
    }

    pub fn last_descriptor(&self) -> Option<EndpointDescriptor> {
        self.registered.borrow().last().map(|(_, d)| d.clone())
    }
}

impl DaemonApi for FakeDaemon {
    fn get_config(&self) -> Result<DaemonConfig> {
        Ok(self.config.clone())
    }

    fn allocate_address(&self, pod: &PodIdentity) -> Result<Allocation> {
        self.owners.borrow_mut().push(pod.owner());
        self.allocation.clone().ok_or_else(|| PodwireError::Allocation {
            message: "pool exhausted".into(),
        })
    }

    fn release_address(&self, ip: &str) -> Result<()> {
        if let Some(live) = self.live_leases() {
            self.leases_at_release.borrow_mut().push(live);
        }
        self.released.borrow_mut().push(ip.into());
        Ok(())
    }

    fn register_endpoint(&self, id: &EndpointId, descriptor: &EndpointDescriptor) -> Result<()> {
        if let Some(message) = &self.register_error {
            return Err(PodwireError::Registration {
                message: message.clone(),
            });
        }
        self.leases_at_register.set(self.live_leases());
        let _ = self.endpoints.borrow_mut().insert(id.to_string());
        self.registered
            .borrow_mut()
            .push((id.clone(), descriptor.clone()));
        Ok(())
    }

    fn remove_endpoint(&self, id: &EndpointId) -> std::result::Result<(), RemovalError> {
        if let Some(err) = &self.removal_error {
            return Err(err.clone());
        }
        if self.endpoints.borrow_mut().remove(id.as_str()) {
            Ok(())
        } else {
            Err(RemovalError::terminal(format!("endpoint {id} not found")))
        }
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────

pub fn veth_config() -> DaemonConfig {
    DaemonConfig {
        datapath_mode: "veth".into(),
        device_mtu: 1450,
        route_mtu: 1400,
        ipvlan_configuration: None,
    }
}

pub fn ipvlan_config(master_index: u32) -> DaemonConfig {
    DaemonConfig {
        datapath_mode: "ipvlan".into(),
        device_mtu: 1500,
        route_mtu: 1500,
        ipvlan_configuration: Some(IpvlanConfiguration {
            master_device_index: master_index,
            operation_mode: "l3".into(),
        }),
    }
}

pub fn allocation(ipv4: &str, ipv6: &str) -> Allocation {
    Allocation {
        address: AddressPair {
            ipv4: ipv4.into(),
            ipv6: ipv6.into(),
        },
        host_addressing: HostAddressing {
            ipv4: Some(FamilyAddressing {
                enabled: true,
                ip: "10.1.0.1".into(),
                alloc_range: "10.1.0.0/24".into(),
            }),
            ipv6: Some(FamilyAddressing {
                enabled: true,
                ip: "fd00::1".into(),
                alloc_range: "fd00::/112".into(),
            }),
        },
    }
}

pub fn netconf() -> NetworkConfig {
    NetworkConfig::parse(br#"{"cniVersion":"0.3.1","name":"podwire","type":"podwire-cni"}"#)
        .unwrap()
}

pub fn args() -> InvocationArguments {
    InvocationArguments::new(
        CONTAINER_ID,
        Some(PathBuf::from(NETNS)),
        "eth0",
        "K8S_POD_NAMESPACE=default;K8S_POD_NAME=web-0",
    )
    .unwrap()
}
