//! Kernel operation errors.

use std::path::PathBuf;

use podwire_common::error::PodwireError;
use thiserror::Error;

/// Failure of a kernel-facing operation.
#[derive(Debug, Error)]
pub enum KernelError {
    /// The object being created is already present.
    #[error("{what} already exists")]
    AlreadyExists {
        /// The object that exists.
        what: String,
    },

    /// The object being looked up or removed does not exist.
    #[error("{what} not found")]
    NotFound {
        /// The missing object.
        what: String,
    },

    /// An iproute2 invocation failed for another reason.
    #[error("`{command}` failed: {message}")]
    CommandFailed {
        /// The command line that failed.
        command: String,
        /// Trimmed stderr or spawn error.
        message: String,
    },

    /// Entering or restoring a namespace failed.
    #[error("namespace switch failed: {message}")]
    Namespace {
        /// Description of the failure.
        message: String,
    },

    /// A filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

impl KernelError {
    /// Whether the kernel reported the object as already present.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Whether the kernel reported the object as absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience alias for kernel operations.
pub type KernelResult<T> = std::result::Result<T, KernelError>;

impl From<KernelError> for PodwireError {
    fn from(err: KernelError) -> Self {
        Self::Provisioning {
            message: err.to_string(),
        }
    }
}

/// Maps an "already exists" outcome to `Ok(false)`.
///
/// Returns `Ok(true)` when the operation created the object.
///
/// # Errors
///
/// Propagates every other kernel error.
pub fn tolerate_exists(result: KernelResult<()>) -> KernelResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_already_exists() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Maps a "not found" outcome to `Ok(false)`.
///
/// Returns `Ok(true)` when the object existed and the operation applied.
///
/// # Errors
///
/// Propagates every other kernel error.
pub fn tolerate_missing(result: KernelResult<()>) -> KernelResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}
