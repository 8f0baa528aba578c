//! CNI command definitions and dispatch.

pub mod add;
pub mod del;
pub mod version;

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use podwire_common::args::InvocationArguments;
use podwire_common::config::PluginConfig;

/// podwire-cni: attaches container sandboxes to the podwire datapath.
#[derive(Parser, Debug)]
#[command(name = "podwire-cni", version, about, long_about = None)]
pub struct Cli {
    /// Operation requested by the container runtime.
    #[arg(long, env = "CNI_COMMAND", value_enum, ignore_case = true)]
    pub command: CniCommand,

    /// Sandbox container id.
    #[arg(long, env = "CNI_CONTAINERID", default_value = "")]
    pub container_id: String,

    /// Path of the sandbox network namespace.
    #[arg(long, env = "CNI_NETNS")]
    pub netns: Option<PathBuf>,

    /// Interface name to create inside the sandbox.
    #[arg(long, env = "CNI_IFNAME", default_value = "")]
    pub ifname: String,

    /// Extra `K=V;K=V` arguments.
    #[arg(long = "cni-args", env = "CNI_ARGS", default_value = "")]
    pub cni_args: String,

    /// Plugin search path. Logged only; this plugin delegates nothing.
    #[arg(long = "cni-path", env = "CNI_PATH")]
    pub cni_path: Option<String>,
}

/// Operations of the CNI protocol this plugin answers.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CniCommand {
    /// Attach the sandbox.
    #[value(name = "ADD")]
    Add,
    /// Detach the sandbox.
    #[value(name = "DEL")]
    Del,
    /// Report supported protocol versions.
    #[value(name = "VERSION")]
    Version,
}

impl CniCommand {
    /// Protocol name of the command.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Del => "DEL",
            Self::Version => "VERSION",
        }
    }
}

impl Cli {
    /// Builds the validated invocation arguments.
    ///
    /// # Errors
    ///
    /// Returns `PodwireError::Config` when a required value is missing or
    /// the argument string is malformed.
    pub fn invocation(&self, cni_args: &str) -> podwire_common::error::Result<InvocationArguments> {
        InvocationArguments::new(&self.container_id, self.netns.clone(), &self.ifname, cni_args)
    }
}

/// Dispatches the parsed command to its handler.
///
/// # Errors
///
/// Returns an error if the selected command fails.
pub fn execute(cli: &Cli, config: &PluginConfig, stdin: &[u8]) -> anyhow::Result<()> {
    tracing::debug!(
        command = cli.command.as_str(),
        cni_path = cli.cni_path.as_deref().unwrap_or_default(),
        daemon = %config.daemon_url,
        "dispatching"
    );
    match cli.command {
        CniCommand::Add => add::execute(cli, config, stdin),
        CniCommand::Del => del::execute(cli, config),
        CniCommand::Version => version::execute(stdin),
    }
}
