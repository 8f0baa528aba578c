//! # podwire-cni
//!
//! CNI plugin binary. The container runtime passes the command and the
//! invocation arguments through `CNI_*` environment variables and the
//! network configuration on stdin; the result or error document goes to
//! stdout, logs go to stderr.

mod commands;
mod output;

use std::io::{IsTerminal, Read};
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use podwire_common::config::PluginConfig;
use podwire_common::constants::DEFAULT_LOG_FILTER;
use podwire_common::error::PodwireError;
use tracing_subscriber::EnvFilter;

use crate::commands::Cli;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            let err = PodwireError::Config {
                message: err.to_string().trim().to_string(),
            };
            return output::fail(&output::version_hint(&[]), &err.into());
        }
    };

    let config = PluginConfig::from_env();
    init_tracing(
        config
            .as_ref()
            .map_or(DEFAULT_LOG_FILTER, |c| c.log_filter.as_str()),
    );

    let stdin = match read_stdin() {
        Ok(bytes) => bytes,
        Err(err) => return output::fail(&output::version_hint(&[]), &err),
    };
    let cni_version = output::version_hint(&stdin);

    let outcome = config
        .map_err(anyhow::Error::from)
        .and_then(|config| commands::execute(&cli, &config, &stdin));
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(
                command = cli.command.as_str(),
                error = %format!("{err:#}"),
                "invocation failed"
            );
            output::fail(&cni_version, &err)
        }
    }
}

fn init_tracing(directive: &str) {
    let filter =
        EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn read_stdin() -> anyhow::Result<Vec<u8>> {
    let mut stdin = std::io::stdin();
    let mut buf = Vec::new();
    if !stdin.is_terminal() {
        let _ = stdin.read_to_end(&mut buf)?;
    }
    Ok(buf)
}
