//! `DEL`: detach a sandbox. Prints nothing on success.

use podwire_common::config::PluginConfig;
use podwire_common::error::PodwireError;
use podwire_core::iproute::IpRoute2;
use podwire_runtime::context::InvocationContext;
use podwire_runtime::daemon::HttpDaemonClient;
use podwire_runtime::detach::DetachWorkflow;

use super::Cli;

/// Executes the `DEL` command.
///
/// # Errors
///
/// Returns an error if the daemon is unreachable or reports a removal
/// failure it may recover from.
pub fn execute(cli: &Cli, config: &PluginConfig) -> anyhow::Result<()> {
    // CNI_ARGS carries nothing teardown needs.
    let args = cli.invocation("")?;
    let context = InvocationContext::new(cli.command.as_str(), &args.container_id);

    context.in_scope(|| -> anyhow::Result<()> {
        tracing::debug!(netns = ?args.netns, ifname = %args.ifname, "processing detach");
        let daemon = HttpDaemonClient::connect(config)?;
        let host = IpRoute2::locate().map_err(PodwireError::from)?;

        let report = DetachWorkflow::new(&host, &daemon).run(&args)?;
        tracing::info!(
            endpoint = ?report.endpoint,
            namespace = ?report.namespace,
            interface = ?report.interface,
            "detach complete"
        );
        Ok(())
    })
}
