//! Procfs sysctl writes.

use std::path::{Path, PathBuf};

use podwire_common::constants::IPV4_CONF_SYSCTL_ROOT;

use crate::error::{KernelError, KernelResult};

/// Writes `value` to the sysctl file at `path`.
///
/// Sysctls under `/proc/sys/net` resolve against the network namespace
/// of the calling thread.
///
/// # Errors
///
/// Returns `KernelError::Io` if the file cannot be written.
pub fn write(path: &Path, value: &str) -> KernelResult<()> {
    std::fs::write(path, value).map_err(|e| KernelError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(path = %path.display(), value = value.trim(), "wrote sysctl");
    Ok(())
}

/// Path of the reverse-path filter toggle of `ifname`.
#[must_use]
pub fn rp_filter_path(ifname: &str) -> PathBuf {
    Path::new(IPV4_CONF_SYSCTL_ROOT).join(ifname).join("rp_filter")
}
