//! Output documents of the CNI protocol: results, errors, version info.

use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::constants::SUPPORTED_CNI_VERSIONS;
use crate::error::PodwireError;
use crate::types::{AddressFamily, Route};

/// Result of a successful attach, also the shape of a prior result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CniResult {
    /// CNI version of this document.
    #[serde(rename = "cniVersion", default, skip_serializing_if = "String::is_empty")]
    pub cni_version: String,
    /// Interfaces created or configured.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<Interface>,
    /// IP configurations assigned.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ips: Vec<IpConfig>,
    /// Routes installed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteEntry>,
}

impl CniResult {
    /// Creates an empty result for the given version.
    #[must_use]
    pub fn new(cni_version: impl Into<String>) -> Self {
        Self {
            cni_version: cni_version.into(),
            ..Self::default()
        }
    }
}

/// A configured interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    /// Interface name.
    pub name: String,
    /// Hardware address.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mac: String,
    /// Namespace path; empty for host interfaces.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sandbox: String,
}

/// An IP configuration entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpConfig {
    /// `"4"` or `"6"`.
    pub version: String,
    /// Address with prefix.
    pub address: IpNet,
    /// Default gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<IpAddr>,
    /// Index into `interfaces` this address is bound to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<usize>,
}

impl IpConfig {
    /// Builds an entry for `family`.
    #[must_use]
    pub fn new(family: AddressFamily, address: IpNet, gateway: IpAddr) -> Self {
        Self {
            version: family.version().to_string(),
            address,
            gateway: Some(gateway),
            interface: None,
        }
    }
}

/// A route entry of a result document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Destination prefix.
    pub dst: IpNet,
    /// Gateway, absent for link routes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gw: Option<IpAddr>,
}

impl From<&Route> for RouteEntry {
    fn from(route: &Route) -> Self {
        Self {
            dst: route.prefix,
            gw: route.nexthop,
        }
    }
}

/// Error document printed on stdout for a failed invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDocument {
    /// CNI version of this document.
    #[serde(rename = "cniVersion")]
    pub cni_version: String,
    /// CNI error code.
    pub code: u32,
    /// Short message.
    pub msg: String,
    /// Longer diagnostic, if any.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
}

impl ErrorDocument {
    /// Builds the document for a workspace error.
    #[must_use]
    pub fn from_error(cni_version: &str, err: &PodwireError) -> Self {
        Self {
            cni_version: cni_version.to_string(),
            code: err.code(),
            msg: err.to_string(),
            details: String::new(),
        }
    }
}

/// Answer to a `VERSION` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDocument {
    /// Version of this document.
    #[serde(rename = "cniVersion")]
    pub cni_version: String,
    /// Every CNI version the plugin accepts.
    #[serde(rename = "supportedVersions")]
    pub supported_versions: Vec<String>,
}

impl VersionDocument {
    /// Builds the version answer.
    #[must_use]
    pub fn new(cni_version: &str) -> Self {
        Self {
            cni_version: cni_version.to_string(),
            supported_versions: SUPPORTED_CNI_VERSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}
