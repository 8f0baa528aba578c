//! Wire models of the control daemon REST API.

use serde::{Deserialize, Serialize};

use podwire_common::types::AddressFamily;

/// Body of `GET /config`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigResponse {
    /// Runtime status, absent when the daemon is not ready.
    #[serde(default)]
    pub status: Option<DaemonConfig>,
}

/// Datapath settings reported by the daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonConfig {
    /// `veth` or `ipvlan`.
    #[serde(default)]
    pub datapath_mode: String,
    /// MTU for created devices.
    #[serde(rename = "deviceMTU", default)]
    pub device_mtu: u32,
    /// MTU for installed routes.
    #[serde(rename = "routeMTU", default)]
    pub route_mtu: u32,
    /// Slave-link parameters, present in `ipvlan` mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipvlan_configuration: Option<IpvlanConfiguration>,
}

/// Slave-link parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpvlanConfiguration {
    /// Kernel index of the master device.
    pub master_device_index: u32,
    /// `l3` or `l3s`.
    pub operation_mode: String,
}

/// One address per family; empty strings mean "none".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressPair {
    /// IPv4 address.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ipv4: String,
    /// IPv6 address.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ipv6: String,
}

impl AddressPair {
    /// Address of `family`, empty when none.
    #[must_use]
    pub fn get(&self, family: AddressFamily) -> &str {
        match family {
            AddressFamily::V4 => &self.ipv4,
            AddressFamily::V6 => &self.ipv6,
        }
    }

    /// Stores the address of `family`.
    pub fn set(&mut self, family: AddressFamily, addr: impl Into<String>) {
        match family {
            AddressFamily::V4 => self.ipv4 = addr.into(),
            AddressFamily::V6 => self.ipv6 = addr.into(),
        }
    }
}

/// Host-side addressing of one family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyAddressing {
    /// Whether the family is enabled on the node.
    #[serde(default)]
    pub enabled: bool,
    /// Router IP, the gateway of every endpoint.
    #[serde(default)]
    pub ip: String,
    /// Prefix addresses are allocated from.
    #[serde(rename = "alloc-range", default, skip_serializing_if = "String::is_empty")]
    pub alloc_range: String,
}

/// Node addressing snapshot returned with an allocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAddressing {
    /// IPv4 entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<FamilyAddressing>,
    /// IPv6 entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<FamilyAddressing>,
}

impl HostAddressing {
    /// Entry of `family`, if reported.
    #[must_use]
    pub const fn entry(&self, family: AddressFamily) -> Option<&FamilyAddressing> {
        match family {
            AddressFamily::V4 => self.ipv4.as_ref(),
            AddressFamily::V6 => self.ipv6.as_ref(),
        }
    }

    /// Whether at least one family carries a router IP.
    #[must_use]
    pub fn is_sufficient(&self) -> bool {
        [AddressFamily::V4, AddressFamily::V6]
            .into_iter()
            .filter_map(|f| self.entry(f))
            .any(|e| !e.ip.is_empty())
    }
}

/// Body of `POST /ipam`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResponse {
    /// Allocated addresses.
    #[serde(default)]
    pub address: Option<AddressPair>,
    /// Node addressing snapshot.
    #[serde(rename = "host-addressing", default)]
    pub host_addressing: Option<HostAddressing>,
}

/// An allocation whose address pair is known to be present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    /// Allocated addresses.
    pub address: AddressPair,
    /// Node addressing snapshot, empty when the daemon sent none.
    pub host_addressing: HostAddressing,
}

/// Lifecycle state a freshly registered endpoint starts in.
pub const ENDPOINT_STATE_WAITING_FOR_IDENTITY: &str = "waiting-for-identity";

/// Body of `PUT /endpoint/<id>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EndpointDescriptor {
    /// Addresses bound to the endpoint.
    pub addressing: AddressPair,
    /// Sandbox container id.
    pub container_id: String,
    /// Endpoint labels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    /// Lifecycle state tag.
    pub state: String,
    /// MAC of the host-side device.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host_mac: String,
    /// MAC of the sandbox-side device.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mac: String,
    /// Kernel index of the host-side device.
    #[serde(default)]
    pub interface_index: u32,
    /// Name of the host-side device.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub interface_name: String,
    /// Owning pod name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub k8s_pod_name: String,
    /// Owning pod namespace.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub k8s_namespace: String,
    /// Ask the daemon to build the datapath before answering.
    #[serde(default)]
    pub sync_build_endpoint: bool,
}
