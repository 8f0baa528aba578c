//! Per-invocation arguments.
//!
//! Container id, namespace path and interface name arrive as individual
//! values; pod identity and an optional IP are packed into the
//! `K=V;K=V` argument string.

use std::net::IpAddr;
use std::path::PathBuf;

use crate::constants::IFNAMSIZ;
use crate::error::{PodwireError, Result};
use crate::types::{ContainerId, PodIdentity};

/// Immutable arguments of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationArguments {
    /// Sandbox container id.
    pub container_id: ContainerId,
    /// Path of the sandbox network namespace, if known.
    pub netns: Option<PathBuf>,
    /// Interface name requested inside the sandbox.
    pub ifname: String,
    /// Pod identity from the argument string.
    pub pod: PodIdentity,
    /// Infra container id from the argument string.
    pub infra_container_id: Option<String>,
    /// Caller-supplied IP from the argument string.
    pub ip: Option<IpAddr>,
}

impl InvocationArguments {
    /// Assembles and validates invocation arguments.
    ///
    /// # Errors
    ///
    /// Returns `PodwireError::Config` if the container id or interface name
    /// is missing or invalid, or if the argument string is malformed.
    pub fn new(
        container_id: &str,
        netns: Option<PathBuf>,
        ifname: &str,
        cni_args: &str,
    ) -> Result<Self> {
        if container_id.is_empty() {
            return Err(config_error("container id is required"));
        }
        if ifname.is_empty() {
            return Err(config_error("interface name is required"));
        }
        if ifname.len() >= IFNAMSIZ {
            return Err(config_error(format!(
                "interface name {ifname:?} exceeds {} characters",
                IFNAMSIZ - 1
            )));
        }

        let mut args = Self {
            container_id: ContainerId::new(container_id),
            netns: netns.filter(|p| !p.as_os_str().is_empty()),
            ifname: ifname.to_string(),
            pod: PodIdentity::default(),
            infra_container_id: None,
            ip: None,
        };
        args.load_cni_args(cni_args)?;
        Ok(args)
    }

    /// Returns the namespace path or a configuration error.
    ///
    /// # Errors
    ///
    /// Returns `PodwireError::Config` when no namespace path was given.
    pub fn require_netns(&self) -> Result<&std::path::Path> {
        self.netns
            .as_deref()
            .ok_or_else(|| config_error("network namespace path is required"))
    }

    fn load_cni_args(&mut self, raw: &str) -> Result<()> {
        let pairs = split_pairs(raw)?;
        let ignore_unknown = pairs
            .iter()
            .find(|(k, _)| *k == "IgnoreUnknown")
            .is_some_and(|(_, v)| v == &"1" || v.eq_ignore_ascii_case("true"));

        for (key, value) in pairs {
            match key {
                "IgnoreUnknown" => {}
                "K8S_POD_NAMESPACE" => value.clone_into(&mut self.pod.namespace),
                "K8S_POD_NAME" => value.clone_into(&mut self.pod.name),
                "K8S_POD_INFRA_CONTAINER_ID" => self.infra_container_id = Some(value.to_string()),
                "IP" => {
                    let ip = value.parse::<IpAddr>().map_err(|e| {
                        config_error(format!("invalid IP {value:?} in CNI_ARGS: {e}"))
                    })?;
                    self.ip = Some(ip);
                }
                other if ignore_unknown => {
                    tracing::debug!(key = other, "ignoring unknown CNI argument");
                }
                other => {
                    return Err(config_error(format!("unknown CNI argument {other:?}")));
                }
            }
        }
        Ok(())
    }
}

fn split_pairs(raw: &str) -> Result<Vec<(&str, &str)>> {
    raw.split(';')
        .filter(|p| !p.is_empty())
        .map(|pair| {
            pair.split_once('=')
                .ok_or_else(|| config_error(format!("invalid CNI_ARGS pair {pair:?}")))
        })
        .collect()
}

fn config_error(message: impl Into<String>) -> PodwireError {
    PodwireError::Config {
        message: message.into(),
    }
}
