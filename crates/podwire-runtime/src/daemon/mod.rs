//! Control daemon client abstraction.
//!
//! The workflows talk to the daemon only through [`DaemonApi`]. Calls are
//! synchronous and are never issued while the thread is pinned to a
//! sandbox namespace.

pub mod http;
pub mod models;

use podwire_common::error::Result;
use podwire_common::types::{EndpointId, PodIdentity};
use thiserror::Error;

pub use self::http::HttpDaemonClient;
use self::models::{Allocation, DaemonConfig, EndpointDescriptor};

/// How a failed endpoint removal should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalClass {
    /// Retrying later may succeed.
    Recoverable,
    /// Retrying will not help; the endpoint is gone or the id is invalid.
    Terminal,
}

/// A failed endpoint removal.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RemovalError {
    /// Recoverable or terminal.
    pub classification: RemovalClass,
    /// Description of the failure.
    pub message: String,
}

impl RemovalError {
    /// Builds a recoverable removal error.
    #[must_use]
    pub fn recoverable(message: impl Into<String>) -> Self {
        Self {
            classification: RemovalClass::Recoverable,
            message: message.into(),
        }
    }

    /// Builds a terminal removal error.
    #[must_use]
    pub fn terminal(message: impl Into<String>) -> Self {
        Self {
            classification: RemovalClass::Terminal,
            message: message.into(),
        }
    }

    /// Whether the caller should surface this error for a retry.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self.classification, RemovalClass::Recoverable)
    }
}

/// Operations the plugin consumes from the control daemon.
pub trait DaemonApi {
    /// Fetches the datapath configuration.
    ///
    /// # Errors
    ///
    /// Returns `PodwireError::DaemonUnavailable` if the daemon cannot
    /// answer or reports no configuration.
    fn get_config(&self) -> Result<DaemonConfig>;

    /// Allocates addresses for `pod`.
    ///
    /// # Errors
    ///
    /// Returns `PodwireError::Allocation` if the daemon refuses or the
    /// response carries no address pair.
    fn allocate_address(&self, pod: &PodIdentity) -> Result<Allocation>;

    /// Returns an address to the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon rejects the release.
    fn release_address(&self, ip: &str) -> Result<()>;

    /// Registers an endpoint, blocking until the daemon has acted on it.
    ///
    /// # Errors
    ///
    /// Returns `PodwireError::Registration` if the daemon rejects it.
    fn register_endpoint(&self, id: &EndpointId, descriptor: &EndpointDescriptor) -> Result<()>;

    /// Removes an endpoint.
    ///
    /// # Errors
    ///
    /// Returns a classified [`RemovalError`].
    fn remove_endpoint(&self, id: &EndpointId) -> std::result::Result<(), RemovalError>;
}
