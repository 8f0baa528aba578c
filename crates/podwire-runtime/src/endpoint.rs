//! Endpoint registration with the daemon.

use podwire_common::error::Result;
use podwire_common::types::ContainerId;

use crate::daemon::DaemonApi;
use crate::daemon::models::{ENDPOINT_STATE_WAITING_FOR_IDENTITY, EndpointDescriptor};

/// Starts a descriptor for `container_id` in the waiting-for-identity state.
#[must_use]
pub fn new_descriptor(container_id: &ContainerId) -> EndpointDescriptor {
    EndpointDescriptor {
        container_id: container_id.as_str().to_string(),
        state: ENDPOINT_STATE_WAITING_FOR_IDENTITY.to_string(),
        ..EndpointDescriptor::default()
    }
}

/// Submits endpoint descriptors and waits for datapath activation.
#[derive(Debug)]
pub struct EndpointRegistrar<'d, D> {
    daemon: &'d D,
}

impl<'d, D: DaemonApi> EndpointRegistrar<'d, D> {
    /// Creates a registrar over `daemon`.
    #[must_use]
    pub const fn new(daemon: &'d D) -> Self {
        Self { daemon }
    }

    /// Registers `descriptor` under the endpoint id of `container_id`.
    ///
    /// The daemon is asked to build the endpoint before answering, so a
    /// successful return means the datapath is live.
    ///
    /// # Errors
    ///
    /// Returns `PodwireError::Registration` if the daemon rejects it.
    pub fn register(
        &self,
        container_id: &ContainerId,
        mut descriptor: EndpointDescriptor,
    ) -> Result<()> {
        descriptor.sync_build_endpoint = true;
        let id = container_id.endpoint_id();
        self.daemon.register_endpoint(&id, &descriptor).inspect_err(|e| {
            tracing::warn!(endpoint = %id, error = %e, "unable to create endpoint");
        })?;
        tracing::debug!(endpoint = %id, "endpoint successfully created");
        Ok(())
    }
}
