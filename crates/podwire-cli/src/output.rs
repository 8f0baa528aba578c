//! Documents written to stdout.
//!
//! Stdout belongs to the protocol: exactly one JSON document per
//! invocation, or nothing for a successful `DEL`.

use std::io::Write;
use std::process::ExitCode;

use podwire_common::constants::DEFAULT_CNI_VERSION;
use podwire_common::error::PodwireError;
use podwire_common::result::ErrorDocument;
use serde::{Deserialize, Serialize};

/// Code reported for failures that do not come from the workspace error type.
const CODE_UNCLASSIFIED: u32 = 999;

/// Writes `value` as a single JSON line to stdout.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn write_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    serde_json::to_writer(&mut lock, value)?;
    writeln!(lock)?;
    lock.flush()?;
    Ok(())
}

/// Extracts the CNI version from the configuration bytes without
/// validating the rest of the document.
pub fn version_hint(stdin: &[u8]) -> String {
    #[derive(Deserialize)]
    struct Probe {
        #[serde(rename = "cniVersion", default)]
        cni_version: String,
    }

    serde_json::from_slice::<Probe>(stdin)
        .ok()
        .map(|probe| probe.cni_version)
        .filter(|version| !version.is_empty())
        .unwrap_or_else(|| DEFAULT_CNI_VERSION.to_string())
}

/// Builds the error document for a failed invocation.
pub fn error_document(cni_version: &str, err: &anyhow::Error) -> ErrorDocument {
    let mut document = match err.downcast_ref::<PodwireError>() {
        Some(inner) => ErrorDocument::from_error(cni_version, inner),
        None => ErrorDocument {
            cni_version: cni_version.to_string(),
            code: CODE_UNCLASSIFIED,
            msg: err.to_string(),
            details: String::new(),
        },
    };
    if err.chain().nth(1).is_some() {
        document.details = format!("{err:#}");
    }
    document
}

/// Prints the error document and returns the failure exit code.
pub fn fail(cni_version: &str, err: &anyhow::Error) -> ExitCode {
    if let Err(write_err) = write_json(&error_document(cni_version, err)) {
        tracing::error!(error = %write_err, "unable to write error document");
    }
    ExitCode::FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_hint_reads_cni_version() {
        let stdin = br#"{"cniVersion":"0.2.0","name":"podwire","type":"podwire-cni"}"#;
        assert_eq!(version_hint(stdin), "0.2.0");
    }

    #[test]
    fn version_hint_defaults_on_garbage() {
        assert_eq!(version_hint(b""), DEFAULT_CNI_VERSION);
        assert_eq!(version_hint(b"not json"), DEFAULT_CNI_VERSION);
        assert_eq!(version_hint(br#"{"name":"podwire"}"#), DEFAULT_CNI_VERSION);
    }

    #[test]
    fn workspace_errors_keep_their_code() {
        let err = anyhow::Error::from(PodwireError::DaemonUnavailable {
            message: "connection refused".into(),
        });

        let document = error_document("0.3.1", &err);

        assert_eq!(document.code, 11);
        assert_eq!(document.cni_version, "0.3.1");
        assert!(document.msg.contains("connection refused"));
        assert!(document.details.is_empty());
    }

    #[test]
    fn foreign_errors_are_unclassified() {
        let err = anyhow::anyhow!("stdout closed");

        let document = error_document("0.3.0", &err);

        assert_eq!(document.code, CODE_UNCLASSIFIED);
        assert_eq!(document.msg, "stdout closed");
    }

    #[test]
    fn context_chain_goes_to_details() {
        let err = anyhow::Error::from(PodwireError::Config {
            message: "missing name".into(),
        })
        .context("reading network configuration");

        let document = error_document("0.3.1", &err);

        assert_eq!(document.code, 7);
        assert!(document.details.contains("missing name"));
        assert!(document.details.starts_with("reading network configuration"));
    }
}
