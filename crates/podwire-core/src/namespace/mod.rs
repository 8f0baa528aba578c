//! Network namespace handles and scoped namespace switching.
//!
//! A sandbox's interfaces, addresses and routes live in its own network
//! namespace. Work inside it is done by pinning the calling thread with
//! `setns(2)` for a critical section and restoring the original namespace
//! on every exit path. Nested switches are not supported.

pub mod network;

pub use network::{NamespaceGuard, NetNamespace};
