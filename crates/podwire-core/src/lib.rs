//! # podwire-core
//!
//! Low-level Linux networking primitives for the podwire plugin.
//!
//! This crate provides:
//! - **Namespaces**: opening network namespace handles and pinning the
//!   calling thread to one for a scoped critical section.
//! - **Host network seam**: the [`host::HostNetwork`] trait over device,
//!   address, route and sysctl operations.
//! - **iproute2 backend**: the production implementation of that trait.
//!
//! Kernel failures are reported as [`error::KernelError`], which keeps the
//! "already exists" and "not found" outcomes distinguishable so callers can
//! tolerate them on retries.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod error;
pub mod host;
pub mod iproute;
pub mod namespace;
pub mod sysctl;
