//! The detach workflow.
//!
//! Detach is retried by the orchestrator until it succeeds, so it only
//! fails when a retry can help. Everything already gone counts as done.

use podwire_common::args::InvocationArguments;
use podwire_common::error::{PodwireError, Result};
use podwire_core::host::HostNetwork;

use crate::configure::NamespaceConfigurator;
use crate::daemon::DaemonApi;

/// Outcome of one detach step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step removed something.
    Done,
    /// There was nothing to remove.
    Absent,
    /// The step failed or could not run; the failure was logged.
    Skipped,
}

/// What a detach did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetachReport {
    /// Endpoint removal at the daemon.
    pub endpoint: StepOutcome,
    /// Opening the sandbox namespace.
    pub namespace: StepOutcome,
    /// Removing the sandbox interface.
    pub interface: StepOutcome,
}

/// One detach invocation over a host and a daemon.
#[derive(Debug)]
pub struct DetachWorkflow<'a, H, D> {
    host: &'a H,
    daemon: &'a D,
}

impl<'a, H: HostNetwork, D: DaemonApi> DetachWorkflow<'a, H, D> {
    /// Creates a workflow.
    #[must_use]
    pub const fn new(host: &'a H, daemon: &'a D) -> Self {
        Self { host, daemon }
    }

    /// Removes the endpoint and the sandbox interface of `args`.
    ///
    /// # Errors
    ///
    /// Returns `PodwireError::RecoverableRemoval` when the daemon could not
    /// remove the endpoint but may on a retry. Nothing else fails a detach.
    pub fn run(&self, args: &InvocationArguments) -> Result<DetachReport> {
        let id = args.container_id.endpoint_id();
        let endpoint = match self.daemon.remove_endpoint(&id) {
            Ok(()) => StepOutcome::Done,
            Err(e) if e.is_recoverable() => {
                tracing::warn!(endpoint = %id, error = %e, "endpoint removal failed, will retry");
                return Err(PodwireError::RecoverableRemoval {
                    endpoint: id.to_string(),
                    message: e.message,
                });
            }
            Err(e) => {
                tracing::warn!(endpoint = %id, error = %e, "errors encountered while deleting endpoint");
                StepOutcome::Skipped
            }
        };

        let Some(netns) = args.netns.as_deref() else {
            tracing::debug!("no network namespace given, nothing to clean up");
            return Ok(DetachReport {
                endpoint,
                namespace: StepOutcome::Absent,
                interface: StepOutcome::Skipped,
            });
        };

        let ns = match self.host.open_namespace(netns) {
            Ok(ns) => ns,
            Err(e) => {
                let namespace = if e.is_not_found() {
                    StepOutcome::Absent
                } else {
                    StepOutcome::Skipped
                };
                tracing::warn!(
                    netns = %netns.display(),
                    error = %e,
                    "unable to enter namespace, will not delete interface"
                );
                return Ok(DetachReport {
                    endpoint,
                    namespace,
                    interface: StepOutcome::Skipped,
                });
            }
        };

        let interface = match NamespaceConfigurator::new(self.host)
            .remove_interface_if_exists(&ns, &args.ifname)
        {
            Ok(true) => StepOutcome::Done,
            Ok(false) => StepOutcome::Absent,
            Err(e) => {
                tracing::warn!(
                    ifname = %args.ifname,
                    netns = %netns.display(),
                    error = %e,
                    "unable to delete interface"
                );
                StepOutcome::Skipped
            }
        };

        let report = DetachReport {
            endpoint,
            namespace: StepOutcome::Done,
            interface,
        };
        tracing::info!(?report, "sandbox detached");
        Ok(report)
    }
}
