//! Unified error types for the podwire workspace.
//!
//! Each failure domain of an invocation maps onto one variant here. The
//! kernel layer defines its own `KernelError` that converts into
//! [`PodwireError::Provisioning`].

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Element of a prior result that the bridge adapter could not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorResultElement {
    /// MAC address of the upstream bridge device.
    BridgeMac,
    /// Name of the host-side paired-link device.
    HostLinkName,
    /// Kernel index of the host-side paired-link device.
    HostLinkIndex,
    /// MAC address of the paired-link device inside the sandbox.
    SandboxMac,
    /// IPv4 address bound to the sandbox interface.
    SandboxAddress,
}

impl fmt::Display for PriorResultElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::BridgeMac => "MAC address of the bridge interface",
            Self::HostLinkName => "name of the veth pair on the host side",
            Self::HostLinkIndex => "interface index of the veth pair on the host side",
            Self::SandboxMac => "MAC address of the veth pair on the container side",
            Self::SandboxAddress => "IP address of the container",
        };
        f.write_str(text)
    }
}

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum PodwireError {
    /// Malformed or unsupported input. Not retryable.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid input.
        message: String,
    },

    /// The control daemon could not be reached.
    #[error("control daemon unavailable: {message}")]
    DaemonUnavailable {
        /// Description of the connection failure.
        message: String,
    },

    /// No address could be obtained or the addressing data is unusable.
    #[error("address allocation failed: {message}")]
    Allocation {
        /// Description of the allocation failure.
        message: String,
    },

    /// A kernel device, address, route or namespace operation failed.
    #[error("provisioning failed: {message}")]
    Provisioning {
        /// Description of the kernel failure.
        message: String,
    },

    /// The daemon rejected the endpoint descriptor.
    #[error("unable to create endpoint: {message}")]
    Registration {
        /// Description of the rejection.
        message: String,
    },

    /// Endpoint removal failed in a way the daemon may recover from.
    #[error("endpoint {endpoint} removal failed, retry later: {message}")]
    RecoverableRemoval {
        /// Identifier of the endpoint being removed.
        endpoint: String,
        /// Description of the failure.
        message: String,
    },

    /// A prior result lacks an element the bridge adapter requires.
    #[error("unable to determine {missing}")]
    PriorResult {
        /// The element that could not be resolved.
        missing: PriorResultElement,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl PodwireError {
    /// Returns the CNI error code reported for this error.
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::Config { .. } | Self::PriorResult { .. } => 7,
            Self::Serialization { .. } => 6,
            Self::Io { .. } => 5,
            Self::DaemonUnavailable { .. } | Self::RecoverableRemoval { .. } => 11,
            Self::Allocation { .. } => 100,
            Self::Provisioning { .. } => 101,
            Self::Registration { .. } => 102,
        }
    }

    /// Whether re-invoking the command may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Config { .. } | Self::PriorResult { .. } | Self::Serialization { .. }
        )
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, PodwireError>;
