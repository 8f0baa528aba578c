//! Network namespace isolation.
//!
//! Wraps an open namespace file (`/proc/<pid>/ns/net`, `/var/run/netns/<name>`)
//! and provides `setns(2)`-based scoped entry.

use std::fs::File;
use std::io::ErrorKind;
use std::os::fd::{AsRawFd, OwnedFd};
use std::path::{Path, PathBuf};

use crate::error::{KernelError, KernelResult};

/// Namespace file of the calling thread.
const CURRENT_THREAD_NETNS: &str = "/proc/thread-self/ns/net";

/// An open handle to a network namespace.
#[derive(Debug)]
pub struct NetNamespace {
    path: PathBuf,
    fd: OwnedFd,
}

impl NetNamespace {
    /// Opens the namespace at `path`.
    ///
    /// # Errors
    ///
    /// Returns `KernelError::NotFound` if the path does not exist and
    /// `KernelError::Io` for any other open failure.
    pub fn open(path: &Path) -> KernelResult<Self> {
        let file = File::open(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                KernelError::NotFound {
                    what: format!("network namespace {}", path.display()),
                }
            } else {
                KernelError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        tracing::debug!(path = %path.display(), "opened network namespace");
        Ok(Self {
            path: path.to_path_buf(),
            fd: OwnedFd::from(file),
        })
    }

    /// Opens the namespace the calling thread currently lives in.
    ///
    /// # Errors
    ///
    /// Returns an error if procfs is unavailable.
    pub fn current() -> KernelResult<Self> {
        Self::open(Path::new(CURRENT_THREAD_NETNS))
    }

    /// Path this handle was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path through which another process can reach this exact namespace
    /// via our descriptor, independent of what `path` points to now.
    #[must_use]
    pub fn descriptor_path(&self) -> PathBuf {
        PathBuf::from(format!(
            "/proc/{}/fd/{}",
            std::process::id(),
            self.fd.as_raw_fd()
        ))
    }

    /// Duplicates the handle. The namespace stays alive while any handle
    /// to it is open.
    ///
    /// # Errors
    ///
    /// Returns `KernelError::Io` if the descriptor cannot be duplicated.
    pub fn try_clone(&self) -> KernelResult<Self> {
        let fd = self.fd.try_clone().map_err(|e| KernelError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(Self {
            path: self.path.clone(),
            fd,
        })
    }

    /// Pins the calling thread to this namespace until the guard drops.
    ///
    /// # Errors
    ///
    /// Returns `KernelError::Namespace` if `setns(2)` fails.
    #[cfg(target_os = "linux")]
    pub fn enter(&self) -> KernelResult<NamespaceGuard> {
        use nix::sched::{CloneFlags, setns};
        use std::os::fd::AsFd;

        let original = Self::current()?;
        setns(self.fd.as_fd(), CloneFlags::CLONE_NEWNET).map_err(|e| KernelError::Namespace {
            message: format!("setns into {} failed: {e}", self.path.display()),
        })?;
        tracing::debug!(path = %self.path.display(), "entered network namespace");
        Ok(NamespaceGuard { original })
    }

    /// Stub for non-Linux platforms.
    ///
    /// # Errors
    ///
    /// Always returns an error: namespace switching requires Linux.
    #[cfg(not(target_os = "linux"))]
    pub fn enter(&self) -> KernelResult<NamespaceGuard> {
        Err(KernelError::Namespace {
            message: "Linux required for network namespace operations".into(),
        })
    }

    /// Runs `f` inside this namespace, restoring the caller's namespace
    /// afterwards even if `f` fails or panics.
    ///
    /// # Errors
    ///
    /// Returns the entry failure or whatever `f` returns.
    pub fn run<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<KernelError>,
    {
        let _guard = self.enter()?;
        f()
    }
}

/// Restores the thread's original network namespace on drop.
#[derive(Debug)]
pub struct NamespaceGuard {
    original: NetNamespace,
}

impl Drop for NamespaceGuard {
    #[cfg(target_os = "linux")]
    fn drop(&mut self) {
        use nix::sched::{CloneFlags, setns};
        use std::os::fd::AsFd;

        match setns(self.original.fd.as_fd(), CloneFlags::CLONE_NEWNET) {
            Ok(()) => tracing::debug!("restored original network namespace"),
            Err(e) => tracing::error!(error = %e, "failed to restore original network namespace"),
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn drop(&mut self) {}
}
