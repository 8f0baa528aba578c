//! Attach and detach orchestration for the podwire plugin.
//!
//! The workflows in [`attach`] and [`detach`] are generic over the kernel
//! ([`podwire_core::host::HostNetwork`]) and the control daemon
//! ([`daemon::DaemonApi`]); the CLI plugs in the iproute2 backend and the
//! HTTP client.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod addressing;
pub mod attach;
pub mod bridge;
pub mod configure;
pub mod context;
pub mod daemon;
pub mod datapath;
pub mod detach;
pub mod endpoint;
pub mod rollback;
