//! `VERSION`: report the supported protocol versions.

use podwire_common::result::VersionDocument;

use crate::output;

/// Executes the `VERSION` command.
///
/// # Errors
///
/// Returns an error if stdout cannot be written.
pub fn execute(stdin: &[u8]) -> anyhow::Result<()> {
    output::write_json(&VersionDocument::new(&output::version_hint(stdin)))
}
