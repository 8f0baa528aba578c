//! Network configuration document received on stdin.
//!
//! The document is parsed once per invocation and never mutated. Scheduler
//! metadata is flattened into generic `source:key=value` labels here so the
//! workflows never see scheduler-specific shapes.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CNI_VERSION, LABEL_SOURCE_MESOS, SUPPORTED_CNI_VERSIONS};
use crate::error::{PodwireError, Result};
use crate::result::CniResult;

/// Parsed network configuration for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// CNI specification version the runtime speaks.
    #[serde(rename = "cniVersion", default)]
    pub cni_version: String,
    /// Network name.
    #[serde(default)]
    pub name: String,
    /// Plugin type as named by the runtime.
    #[serde(rename = "type", default)]
    pub plugin_type: String,
    /// Requested MTU; 0 defers to the daemon.
    #[serde(default)]
    pub mtu: u32,
    /// Result of a plugin that ran earlier in the chain.
    #[serde(rename = "prevResult", default, skip_serializing_if = "Option::is_none")]
    pub prev_result: Option<serde_json::Value>,
    /// Scheduler-provided arguments.
    #[serde(default)]
    pub args: SchedulerArgs,
}

/// Arbitrary information a scheduler passes to the plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerArgs {
    /// Mesos network information.
    #[serde(rename = "org.apache.mesos", default, skip_serializing_if = "Option::is_none")]
    pub mesos: Option<MesosArgs>,
}

/// Network-specific information from the Mesos scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MesosArgs {
    /// Network information block.
    #[serde(default)]
    pub network_info: NetworkInfo,
}

/// Scheduler network name and labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    /// Scheduler-side network name.
    #[serde(default)]
    pub name: String,
    /// Wrapper around the ordered label list.
    #[serde(default)]
    pub labels: LabelList,
}

/// Ordered list of scheduler labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelList {
    /// Labels in scheduler order.
    #[serde(default)]
    pub labels: Vec<Label>,
}

/// A single scheduler label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label key.
    pub key: String,
    /// Label value.
    #[serde(default)]
    pub value: String,
}

impl NetworkConfig {
    /// Parses and validates a configuration document.
    ///
    /// # Errors
    ///
    /// Returns `PodwireError::Config` if the document is not valid JSON or
    /// names an unsupported CNI version.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let config: Self = serde_json::from_slice(bytes).map_err(|e| PodwireError::Config {
            message: format!("failed to load netconf: {e}"),
        })?;
        if !config.cni_version.is_empty()
            && !SUPPORTED_CNI_VERSIONS.contains(&config.cni_version.as_str())
        {
            return Err(PodwireError::Config {
                message: format!(
                    "incompatible CNI version {:?}, supported: {}",
                    config.cni_version,
                    SUPPORTED_CNI_VERSIONS.join(", ")
                ),
            });
        }
        Ok(config)
    }

    /// CNI version to echo in output documents.
    #[must_use]
    pub fn cni_version(&self) -> &str {
        if self.cni_version.is_empty() {
            DEFAULT_CNI_VERSION
        } else {
            &self.cni_version
        }
    }

    /// Whether an earlier plugin in the chain left a result.
    #[must_use]
    pub fn has_prior_result(&self) -> bool {
        self.prev_result
            .as_ref()
            .is_some_and(|v| !v.is_null())
    }

    /// Decodes the prior result, if any.
    ///
    /// # Errors
    ///
    /// Returns `PodwireError::Config` if the prior result is not a valid
    /// result document.
    pub fn prior_result(&self) -> Result<Option<CniResult>> {
        let Some(raw) = self.prev_result.as_ref().filter(|v| !v.is_null()) else {
            return Ok(None);
        };
        serde_json::from_value(raw.clone())
            .map(Some)
            .map_err(|e| PodwireError::Config {
                message: format!("unable to get previous network result: {e}"),
            })
    }

    /// Scheduler labels flattened to `source:key=value` strings, in order.
    #[must_use]
    pub fn scheduler_labels(&self) -> Vec<String> {
        self.args
            .mesos
            .iter()
            .flat_map(|m| m.network_info.labels.labels.iter())
            .map(|l| format!("{LABEL_SOURCE_MESOS}:{}={}", l.key, l.value))
            .collect()
    }
}
