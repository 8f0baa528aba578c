//! Undo log of an attach in progress.

use podwire_common::types::AddressFamily;
use podwire_core::host::HostNetwork;

use crate::addressing;
use crate::daemon::DaemonApi;
use crate::daemon::models::AddressPair;

/// Kernel and daemon state created so far, undone if the attach fails.
#[derive(Debug, Default)]
pub struct RollbackPlan {
    host_device: Option<String>,
    addresses: AddressPair,
}

impl RollbackPlan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a host-side device to delete on failure.
    pub fn anchor_device(&mut self, name: impl Into<String>) {
        self.host_device = Some(name.into());
    }

    /// Records allocated addresses to release on failure.
    pub fn record_allocation(&mut self, addresses: &AddressPair) {
        for family in [AddressFamily::V6, AddressFamily::V4] {
            let addr = addresses.get(family);
            if !addr.is_empty() {
                self.addresses.set(family, addr);
            }
        }
    }

    /// The anchored host device, if any.
    #[must_use]
    pub fn host_device(&self) -> Option<&str> {
        self.host_device.as_deref()
    }

    /// Addresses that would be released.
    #[must_use]
    pub const fn addresses(&self) -> &AddressPair {
        &self.addresses
    }

    /// Releases addresses, then deletes the anchored device.
    ///
    /// Failures are logged and swallowed.
    pub fn execute<H: HostNetwork, D: DaemonApi>(self, host: &H, daemon: &D) {
        addressing::release(daemon, &self.addresses);

        if let Some(device) = self.host_device {
            match host.delete_link(&device) {
                Ok(()) => tracing::debug!(device = %device, "deleted host device"),
                Err(e) => {
                    tracing::warn!(device = %device, error = %e, "failed to clean up host device");
                }
            }
        }
    }
}
