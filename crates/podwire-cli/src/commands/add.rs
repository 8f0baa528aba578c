//! `ADD`: attach a sandbox and print the result document.

use podwire_common::config::PluginConfig;
use podwire_common::error::PodwireError;
use podwire_common::netconf::NetworkConfig;
use podwire_core::iproute::IpRoute2;
use podwire_runtime::attach::AttachWorkflow;
use podwire_runtime::context::InvocationContext;
use podwire_runtime::daemon::HttpDaemonClient;

use super::Cli;
use crate::output;

/// Executes the `ADD` command.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the daemon is
/// unreachable, or any attach step fails.
pub fn execute(cli: &Cli, config: &PluginConfig, stdin: &[u8]) -> anyhow::Result<()> {
    let netconf = NetworkConfig::parse(stdin)?;
    let args = cli.invocation(&cli.cni_args)?;
    let context = InvocationContext::new(cli.command.as_str(), &args.container_id);

    context.in_scope(|| -> anyhow::Result<()> {
        tracing::debug!(
            netns = ?args.netns,
            ifname = %args.ifname,
            network = %netconf.name,
            "processing attach"
        );
        let daemon = HttpDaemonClient::connect(config)?;
        let host = IpRoute2::locate().map_err(PodwireError::from)?;

        let mut workflow = AttachWorkflow::new(&host, &daemon);
        let result = workflow.run(&netconf, &args)?;
        tracing::info!(
            interfaces = result.interfaces.len(),
            ips = result.ips.len(),
            "attach complete"
        );
        output::write_json(&result)
    })
}
