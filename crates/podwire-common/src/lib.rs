//! # podwire-common
//!
//! Shared types, error definitions, configuration models, and the CNI
//! wire documents used across the entire podwire workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and provides the foundational primitives that the kernel
//! layer, the runtime workflows and the CLI build upon.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod args;
pub mod config;
pub mod constants;
pub mod error;
pub mod netconf;
pub mod result;
pub mod types;
