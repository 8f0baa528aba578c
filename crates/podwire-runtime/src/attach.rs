//! The attach workflow.
//!
//! Drives a sandbox from "configuration parsed, daemon reachable" to
//! "endpoint registered", in a fixed order:
//!
//! 1. open the sandbox namespace and drop any stale interface of the
//!    requested name
//! 2. fetch the daemon configuration and select the datapath
//! 3. provision the device
//! 4. allocate addresses and derive routes
//! 5. configure the interface inside the sandbox
//! 6. register the endpoint
//!
//! Any failure after a kernel or daemon resource was created triggers a
//! rollback: addresses go back to the pool first, then the host-side
//! device is deleted. Rollback problems are logged; the caller only ever
//! sees the error that caused the rollback.

use podwire_common::args::InvocationArguments;
use podwire_common::constants::BRIDGE_NETWORK_NAME;
use podwire_common::error::{PodwireError, Result};
use podwire_common::netconf::NetworkConfig;
use podwire_common::result::{CniResult, Interface};
use podwire_core::host::HostNetwork;

use crate::addressing::{self, CONFIGURE_ORDER, PREPARE_ORDER, PreparedFamily};
use crate::bridge::BridgeAdapter;
use crate::configure::NamespaceConfigurator;
use crate::daemon::DaemonApi;
use crate::datapath::{Datapath, DeviceRequest};
use crate::endpoint::{EndpointRegistrar, new_descriptor};
use crate::rollback::RollbackPlan;

/// Progress marker of an attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachPhase {
    /// Configuration document and arguments parsed.
    ConfigLoaded,
    /// Daemon reachable.
    DaemonConnected,
    /// Taking the bridge adapter path.
    BridgeAdapterPath,
    /// Taking the standard provisioning path.
    StandardPath,
    /// Device created and moved into the sandbox.
    DeviceProvisioned,
    /// Addresses allocated.
    AddressAllocated,
    /// Interface configured inside the sandbox.
    NamespaceConfigured,
    /// Endpoint registered with the daemon.
    EndpointRegistered,
    /// Attach succeeded.
    Done,
    /// Undoing partial work.
    RollingBack,
    /// Attach failed.
    Failed,
}

/// One attach invocation over a host and a daemon.
#[derive(Debug)]
pub struct AttachWorkflow<'a, H, D> {
    host: &'a H,
    daemon: &'a D,
    phases: Vec<AttachPhase>,
}

impl<'a, H: HostNetwork, D: DaemonApi> AttachWorkflow<'a, H, D> {
    /// Starts a workflow; the configuration is parsed and the daemon
    /// connected at this point.
    #[must_use]
    pub fn new(host: &'a H, daemon: &'a D) -> Self {
        Self {
            host,
            daemon,
            phases: vec![AttachPhase::ConfigLoaded, AttachPhase::DaemonConnected],
        }
    }

    /// Phases entered so far, oldest first.
    #[must_use]
    pub fn phases(&self) -> &[AttachPhase] {
        &self.phases
    }

    /// Attaches the sandbox described by `args`.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error, after rolling back whatever had been
    /// created.
    pub fn run(&mut self, config: &NetworkConfig, args: &InvocationArguments) -> Result<CniResult> {
        if config.has_prior_result() && config.name == BRIDGE_NETWORK_NAME {
            self.enter(AttachPhase::BridgeAdapterPath);
            let outcome = config.prior_result().and_then(|prior| {
                let prior = prior.unwrap_or_default();
                BridgeAdapter::new(self.host, self.daemon).attach(args, &prior, config.cni_version())
            });
            return match outcome {
                Ok(result) => {
                    self.enter(AttachPhase::EndpointRegistered);
                    self.enter(AttachPhase::Done);
                    Ok(result)
                }
                Err(e) => {
                    self.enter(AttachPhase::Failed);
                    Err(e)
                }
            };
        }

        self.enter(AttachPhase::StandardPath);
        let mut rollback = RollbackPlan::new();
        // Slave-link namespace lease, released when this call returns.
        let mut lease = None;
        match self.standard(config, args, &mut rollback, &mut lease) {
            Ok(result) => {
                self.enter(AttachPhase::Done);
                tracing::info!(ifname = %args.ifname, ips = result.ips.len(), "sandbox attached");
                Ok(result)
            }
            Err(e) => {
                tracing::error!(error = %e, "attach failed, rolling back");
                self.enter(AttachPhase::RollingBack);
                rollback.execute(self.host, self.daemon);
                self.enter(AttachPhase::Failed);
                Err(e)
            }
        }
    }

    fn standard(
        &mut self,
        config: &NetworkConfig,
        args: &InvocationArguments,
        rollback: &mut RollbackPlan,
        lease: &mut Option<H::Lease>,
    ) -> Result<CniResult> {
        let host = self.host;
        let daemon = self.daemon;
        let netns = args.require_netns()?;
        let ns = host.open_namespace(netns).map_err(|e| PodwireError::Provisioning {
            message: format!("failed to open netns {}: {e}", netns.display()),
        })?;

        let configurator = NamespaceConfigurator::new(host);
        let removed = configurator
            .remove_interface_if_exists(&ns, &args.ifname)
            .map_err(|e| PodwireError::Provisioning {
                message: format!(
                    "failed removing interface {} from namespace {}: {e}",
                    args.ifname,
                    netns.display()
                ),
            })?;
        if removed {
            tracing::debug!(ifname = %args.ifname, "removed stale interface from sandbox");
        }

        let labels = config.scheduler_labels();
        let daemon_config = daemon.get_config()?;

        let mut descriptor = new_descriptor(&args.container_id);
        descriptor.labels = labels;
        descriptor.k8s_pod_name.clone_from(&args.pod.name);
        descriptor.k8s_namespace.clone_from(&args.pod.namespace);
        if let Some(ip) = args.ip {
            tracing::info!(%ip, "ignoring caller-supplied IP, addresses come from the daemon");
        }

        let datapath = Datapath::from_config(&daemon_config)?;
        let mtu = if daemon_config.device_mtu == 0 {
            config.mtu
        } else {
            daemon_config.device_mtu
        };
        let request = DeviceRequest {
            container_id: &args.container_id,
            ifname: &args.ifname,
            mtu,
        };
        *lease = datapath.provision(host, &ns, &request, &mut descriptor, rollback)?;
        self.enter(AttachPhase::DeviceProvisioned);

        let allocation = daemon.allocate_address(&args.pod)?;
        rollback.record_allocation(&allocation.address);
        self.enter(AttachPhase::AddressAllocated);

        if !allocation.host_addressing.is_sufficient() {
            return Err(PodwireError::Allocation {
                message: "insufficient host addressing, no IPv4 or IPv6 router address".into(),
            });
        }
        if !PREPARE_ORDER
            .into_iter()
            .any(|f| addressing::family_enabled(&allocation, f))
        {
            return Err(PodwireError::Allocation {
                message: "daemon did not provide an IPv4 or IPv6 address".into(),
            });
        }

        let mut result = CniResult::new(config.cni_version());
        let mut prepared: Vec<PreparedFamily> = Vec::with_capacity(2);
        for family in PREPARE_ORDER {
            if !addressing::family_enabled(&allocation, family) {
                continue;
            }
            let family_setup = addressing::prepare(family, &allocation, daemon_config.route_mtu)?;
            descriptor
                .addressing
                .set(family, allocation.address.get(family));
            result.ips.push(family_setup.ip_config());
            result.routes.extend(family_setup.route_entries());
            prepared.push(family_setup);
        }

        let ordered: Vec<&PreparedFamily> = CONFIGURE_ORDER
            .iter()
            .filter_map(|f| prepared.iter().find(|p| p.family == *f))
            .collect();
        let mac = configurator.configure(&ns, &args.ifname, &ordered)?;
        self.enter(AttachPhase::NamespaceConfigured);

        result.interfaces.push(Interface {
            name: args.ifname.clone(),
            mac,
            sandbox: netns.display().to_string(),
        });
        for ip in &mut result.ips {
            ip.interface = Some(0);
        }

        EndpointRegistrar::new(daemon).register(&args.container_id, descriptor)?;
        self.enter(AttachPhase::EndpointRegistered);
        Ok(result)
    }

    fn enter(&mut self, phase: AttachPhase) {
        tracing::debug!(?phase, "attach phase");
        self.phases.push(phase);
    }
}
