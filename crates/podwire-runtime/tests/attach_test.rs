//! Attach workflow tests against the in-memory host and daemon.
//!
//! Covers both datapaths, dual-stack addressing, route ordering, rollback
//! on each failure domain, and tolerance of state left by earlier attempts.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod support;

use podwire_common::error::PodwireError;
use podwire_common::types::{ContainerId, Route};
use podwire_core::host::LinkKind;
use podwire_runtime::attach::{AttachPhase, AttachWorkflow};
use podwire_runtime::datapath::host_interface_name;

use support::{
    CONTAINER_ID, FakeDaemon, FakeHost, NETNS, allocation, args, ipvlan_config, netconf,
    veth_config,
};

fn host_device() -> String {
    host_interface_name(&ContainerId::new(CONTAINER_ID))
}

// ── Paired-link ─────────────────────────────────────────────────────

#[test]
fn veth_dual_stack_attach_reports_both_families() {
    let host = FakeHost::with_namespace(NETNS);
    let daemon = FakeDaemon::new(veth_config(), allocation("10.1.0.5", "fd00::5"));
    let mut workflow = AttachWorkflow::new(&host, &daemon);

    let result = workflow.run(&netconf(), &args()).expect("attach");

    assert_eq!(result.cni_version, "0.3.1");
    assert_eq!(result.ips.len(), 2);
    assert_eq!(result.ips[0].version, "6");
    assert_eq!(result.ips[0].address.to_string(), "fd00::5/128");
    assert_eq!(result.ips[1].version, "4");
    assert_eq!(result.ips[1].address.to_string(), "10.1.0.5/32");
    assert_eq!(result.ips[1].gateway.unwrap().to_string(), "10.1.0.1");
    assert_eq!(result.routes.len(), 6);

    assert_eq!(result.interfaces.len(), 1);
    assert_eq!(result.interfaces[0].name, "eth0");
    assert_eq!(result.interfaces[0].sandbox, NETNS);
    assert!(!result.interfaces[0].mac.is_empty());

    assert_eq!(
        workflow.phases(),
        [
            AttachPhase::ConfigLoaded,
            AttachPhase::DaemonConnected,
            AttachPhase::StandardPath,
            AttachPhase::DeviceProvisioned,
            AttachPhase::AddressAllocated,
            AttachPhase::NamespaceConfigured,
            AttachPhase::EndpointRegistered,
            AttachPhase::Done,
        ]
    );
    assert!(host.in_host_namespace());
}

#[test]
fn veth_attach_wires_host_and_sandbox_ends() {
    let host = FakeHost::with_namespace(NETNS);
    let daemon = FakeDaemon::new(veth_config(), allocation("10.1.0.5", ""));
    let _ = AttachWorkflow::new(&host, &daemon)
        .run(&netconf(), &args())
        .expect("attach");

    let host_links = host.links_in(None);
    assert_eq!(host_links.len(), 1);
    assert_eq!(host_links[0].name, host_device());
    assert!(host_links[0].up);

    let sandbox_links = host.links_in(Some(NETNS));
    assert_eq!(sandbox_links.len(), 1);
    assert_eq!(sandbox_links[0].name, "eth0");
    assert_eq!(sandbox_links[0].kind, LinkKind::Veth);
    assert!(sandbox_links[0].up);

    let rp_filter = format!("/proc/sys/net/ipv4/conf/{}/rp_filter", host_device());
    assert!(
        host.sysctls()
            .iter()
            .any(|(path, value)| path.to_string_lossy() == rp_filter && value.trim() == "0")
    );

    let descriptor = daemon.last_descriptor().expect("registered");
    assert_eq!(descriptor.container_id, CONTAINER_ID);
    assert_eq!(descriptor.interface_name, host_device());
    assert_eq!(descriptor.interface_index, host_links[0].index);
    assert_eq!(descriptor.host_mac, host_links[0].mac);
    assert_eq!(descriptor.mac, sandbox_links[0].mac);
    assert_eq!(descriptor.addressing.ipv4, "10.1.0.5");
    assert!(descriptor.addressing.ipv6.is_empty());
    assert_eq!(descriptor.state, "waiting-for-identity");
    assert_eq!(descriptor.k8s_pod_name, "web-0");
    assert_eq!(descriptor.k8s_namespace, "default");
    assert!(descriptor.sync_build_endpoint);
    assert_eq!(daemon.owners.borrow().as_slice(), ["default/web-0"]);
}

#[test]
fn routes_are_installed_narrowest_first_per_family() {
    let host = FakeHost::with_namespace(NETNS);
    let daemon = FakeDaemon::new(veth_config(), allocation("10.1.0.5", "fd00::5"));
    let _ = AttachWorkflow::new(&host, &daemon)
        .run(&netconf(), &args())
        .expect("attach");

    let installed: Vec<String> = host
        .routes_in(NETNS, "eth0")
        .iter()
        .map(|r| r.prefix.to_string())
        .collect();
    assert_eq!(
        installed,
        [
            "10.1.0.1/32",
            "10.1.0.0/24",
            "0.0.0.0/0",
            "fd00::1/128",
            "fd00::/112",
            "::/0",
        ]
    );
    assert!(host.routes_in(NETNS, "eth0").iter().all(|r| r.mtu == 1400));
    assert_eq!(host.addresses_in(NETNS, "eth0"), ["10.1.0.5/32", "fd00::5/128"]);
}

#[test]
fn ipv6_is_enabled_in_sandbox_best_effort() {
    let host = FakeHost::with_namespace(NETNS);
    let daemon = FakeDaemon::new(veth_config(), allocation("10.1.0.5", ""));
    let _ = AttachWorkflow::new(&host, &daemon)
        .run(&netconf(), &args())
        .expect("attach");
    assert!(
        host.sysctls()
            .iter()
            .any(|(path, _)| path.ends_with("ipv6/conf/all/disable_ipv6"))
    );
}

// ── Rollback ─────────────────────────────────────────────────────────

#[test]
fn route_failure_rolls_back_addresses_and_device() {
    let host = FakeHost::with_namespace(NETNS);
    host.fail("add_route");
    let daemon = FakeDaemon::new(veth_config(), allocation("10.1.0.5", "fd00::5"));
    let mut workflow = AttachWorkflow::new(&host, &daemon);

    let err = workflow.run(&netconf(), &args()).unwrap_err();

    assert!(matches!(err, PodwireError::Provisioning { .. }));
    assert_eq!(daemon.released(), ["fd00::5", "10.1.0.5"]);
    assert!(host.links_in(None).is_empty());
    assert!(host.links_in(Some(NETNS)).is_empty());
    assert!(daemon.registered.borrow().is_empty());
    assert_eq!(workflow.phases().last(), Some(&AttachPhase::Failed));
    assert!(workflow.phases().contains(&AttachPhase::RollingBack));
}

#[test]
fn release_happens_before_device_deletion() {
    let host = FakeHost::with_namespace(NETNS);
    let mut daemon = FakeDaemon::new(veth_config(), allocation("10.1.0.5", ""));
    daemon.register_error = Some("policy rejected".into());

    let err = AttachWorkflow::new(&host, &daemon)
        .run(&netconf(), &args())
        .unwrap_err();

    assert!(matches!(err, PodwireError::Registration { .. }));
    assert_eq!(err.code(), 102);
    assert_eq!(daemon.released(), ["10.1.0.5"]);
    assert_eq!(
        host.ops().last().map(String::as_str),
        Some(format!("delete_link {}", host_device()).as_str())
    );
}

#[test]
fn move_failure_deletes_device_without_release() {
    let host = FakeHost::with_namespace(NETNS);
    host.fail("move_link");
    let daemon = FakeDaemon::new(veth_config(), allocation("10.1.0.5", ""));

    let err = AttachWorkflow::new(&host, &daemon)
        .run(&netconf(), &args())
        .unwrap_err();

    assert!(matches!(err, PodwireError::Provisioning { .. }));
    assert!(daemon.released().is_empty());
    assert!(daemon.owners.borrow().is_empty());
    assert!(host.links_in(None).is_empty());
}

#[test]
fn allocation_failure_deletes_device() {
    let host = FakeHost::with_namespace(NETNS);
    let mut daemon = FakeDaemon::new(veth_config(), allocation("", ""));
    daemon.allocation = None;

    let err = AttachWorkflow::new(&host, &daemon)
        .run(&netconf(), &args())
        .unwrap_err();

    assert!(matches!(err, PodwireError::Allocation { .. }));
    assert_eq!(err.code(), 100);
    assert!(daemon.released().is_empty());
    assert!(host.links_in(None).is_empty());
}

#[test]
fn unparsable_gateway_is_allocation_error_with_rollback() {
    let host = FakeHost::with_namespace(NETNS);
    let mut alloc = allocation("10.1.0.5", "");
    if let Some(v4) = alloc.host_addressing.ipv4.as_mut() {
        v4.ip = "10.1.0.300".into();
    }
    alloc.host_addressing.ipv6 = None;
    let daemon = FakeDaemon::new(veth_config(), alloc);

    let err = AttachWorkflow::new(&host, &daemon)
        .run(&netconf(), &args())
        .unwrap_err();

    assert!(matches!(err, PodwireError::Allocation { .. }));
    assert_eq!(daemon.released(), ["10.1.0.5"]);
    assert!(host.links_in(None).is_empty());
}

#[test]
fn no_enabled_family_is_allocation_error() {
    let host = FakeHost::with_namespace(NETNS);
    let mut alloc = allocation("10.1.0.5", "");
    if let Some(v4) = alloc.host_addressing.ipv4.as_mut() {
        v4.enabled = false;
    }
    let daemon = FakeDaemon::new(veth_config(), alloc);

    let err = AttachWorkflow::new(&host, &daemon)
        .run(&netconf(), &args())
        .unwrap_err();

    assert!(matches!(err, PodwireError::Allocation { .. }));
    assert_eq!(daemon.released(), ["10.1.0.5"]);
}

#[test]
fn insufficient_host_addressing_is_allocation_error() {
    let host = FakeHost::with_namespace(NETNS);
    let mut alloc = allocation("10.1.0.5", "");
    alloc.host_addressing.ipv4 = None;
    alloc.host_addressing.ipv6 = None;
    let daemon = FakeDaemon::new(veth_config(), alloc);

    let err = AttachWorkflow::new(&host, &daemon)
        .run(&netconf(), &args())
        .unwrap_err();

    assert!(matches!(err, PodwireError::Allocation { .. }));
}

#[test]
fn missing_namespace_fails_before_any_device() {
    let host = FakeHost::default();
    let daemon = FakeDaemon::new(veth_config(), allocation("10.1.0.5", ""));

    let err = AttachWorkflow::new(&host, &daemon)
        .run(&netconf(), &args())
        .unwrap_err();

    assert!(matches!(err, PodwireError::Provisioning { .. }));
    assert!(host.ops().is_empty());
    assert!(daemon.owners.borrow().is_empty());
}

#[test]
fn unknown_datapath_mode_is_config_error() {
    let host = FakeHost::with_namespace(NETNS);
    let mut config = veth_config();
    config.datapath_mode = "macvlan".into();
    let daemon = FakeDaemon::new(config, allocation("10.1.0.5", ""));

    let err = AttachWorkflow::new(&host, &daemon)
        .run(&netconf(), &args())
        .unwrap_err();

    assert!(matches!(err, PodwireError::Config { .. }));
    assert!(host.links_in(None).is_empty());
}

// ── Idempotence ──────────────────────────────────────────────────────

#[test]
fn stale_sandbox_interface_is_removed_first() {
    let host = FakeHost::with_namespace(NETNS);
    let _ = host.seed_link(Some(NETNS), "eth0", LinkKind::Veth, "02:aa:00:00:00:01");
    let daemon = FakeDaemon::new(veth_config(), allocation("10.1.0.5", ""));

    let _ = AttachWorkflow::new(&host, &daemon)
        .run(&netconf(), &args())
        .expect("attach");

    assert_eq!(host.ops().first().map(String::as_str), Some("delete_link eth0"));
    let sandbox_links = host.links_in(Some(NETNS));
    assert_eq!(sandbox_links.len(), 1);
    assert_ne!(sandbox_links[0].mac, "02:aa:00:00:00:01");
}

#[test]
fn existing_address_is_tolerated() {
    let host = FakeHost::with_namespace(NETNS);
    host.seed_address(NETNS, "eth0", "10.1.0.5/32");
    let daemon = FakeDaemon::new(veth_config(), allocation("10.1.0.5", ""));

    let result = AttachWorkflow::new(&host, &daemon).run(&netconf(), &args());

    assert!(result.is_ok());
    assert_eq!(host.addresses_in(NETNS, "eth0"), ["10.1.0.5/32"]);
}

#[test]
fn existing_route_is_tolerated() {
    let host = FakeHost::with_namespace(NETNS);
    host.seed_route(
        NETNS,
        "eth0",
        Route {
            prefix: "0.0.0.0/0".parse().unwrap(),
            nexthop: Some("10.1.0.1".parse().unwrap()),
            mtu: 1400,
        },
    );
    let daemon = FakeDaemon::new(veth_config(), allocation("10.1.0.5", ""));

    let result = AttachWorkflow::new(&host, &daemon).run(&netconf(), &args());

    assert!(result.is_ok());
    assert_eq!(host.routes_in(NETNS, "eth0").len(), 3);
}

// ── Slave-link ───────────────────────────────────────────────────────

#[test]
fn ipvlan_attach_holds_lease_through_registration() {
    let host = FakeHost::with_namespace(NETNS);
    let master = host.seed_link(None, "eth0", LinkKind::Device, "52:54:00:12:34:56");
    let daemon = FakeDaemon::new(ipvlan_config(master), allocation("10.1.0.5", ""))
        .watching_leases(&host);

    let result = AttachWorkflow::new(&host, &daemon)
        .run(&netconf(), &args())
        .expect("attach");

    assert_eq!(result.ips.len(), 1);
    assert_eq!(daemon.leases_at_register.get(), Some(1));
    assert_eq!(host.leases_taken(), 1);
    assert_eq!(host.active_leases(), 0);

    let sandbox_links = host.links_in(Some(NETNS));
    assert_eq!(sandbox_links.len(), 1);
    assert_eq!(sandbox_links[0].kind, LinkKind::Ipvlan);

    let descriptor = daemon.last_descriptor().expect("registered");
    assert_eq!(descriptor.interface_index, sandbox_links[0].index);
    assert_eq!(descriptor.mac, sandbox_links[0].mac);
    assert_eq!(descriptor.interface_name, "eth0");
}

#[test]
fn ipvlan_move_failure_deletes_temp_slave_and_releases_lease() {
    let host = FakeHost::with_namespace(NETNS);
    let master = host.seed_link(None, "eth0", LinkKind::Device, "52:54:00:12:34:56");
    host.fail("move_link");
    let daemon = FakeDaemon::new(ipvlan_config(master), allocation("10.1.0.5", ""));

    let err = AttachWorkflow::new(&host, &daemon)
        .run(&netconf(), &args())
        .unwrap_err();

    assert!(matches!(err, PodwireError::Provisioning { .. }));
    assert_eq!(host.leases_taken(), 1);
    assert_eq!(host.active_leases(), 0);
    let host_links = host.links_in(None);
    assert_eq!(host_links.len(), 1);
    assert_eq!(host_links[0].name, "eth0");
}

#[test]
fn ipvlan_late_failure_keeps_moved_device() {
    let host = FakeHost::with_namespace(NETNS);
    let master = host.seed_link(None, "eth0", LinkKind::Device, "52:54:00:12:34:56");
    host.fail("add_route");
    let daemon = FakeDaemon::new(ipvlan_config(master), allocation("10.1.0.5", ""))
        .watching_leases(&host);

    let err = AttachWorkflow::new(&host, &daemon)
        .run(&netconf(), &args())
        .unwrap_err();

    assert!(matches!(err, PodwireError::Provisioning { .. }));
    assert_eq!(host.active_leases(), 0);
    assert_eq!(daemon.released(), ["10.1.0.5"]);
    assert_eq!(*daemon.leases_at_release.borrow(), [1]);
    assert!(!host.ops().iter().any(|op| op.starts_with("delete_link tmp")));
    assert_eq!(host.links_in(Some(NETNS)).len(), 1);
}
