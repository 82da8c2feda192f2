//! static-mapping: statically configured identity mapping for privilege-dropping pipelines
//!
//! Given the process that asked for a privileged action, determine the identity
//! of its parent, translate it through an administrator-maintained mapping file
//! and expand the target identity into a full credential set.
//!
//! # Architecture
//!
//! ## Kernel and System Databases ([`kernel`])
//! - [`kernel::proc_status`]: ordered scan of `/proc/<pid>/status`
//! - [`kernel::identity`]: passwd and group-membership lookups
//! - [`kernel::groups`]: primary/secondary group expansion
//!
//! ## Mapping ([`mapping`])
//! - [`mapping::mapfile`]: first-match lookup in the mapping file
//!
//! ## Sequencing ([`core`])
//! - [`core::race_guard`]: parent-pid reuse detection
//! - [`core::plugin`]: the resolution pipeline
//! - [`core::credentials`]: credential sink seam
//!
//! ## Configuration ([`config`]) and Observability ([`observability`])
//!
//! # Design Principles
//!
//! 1. **Kernel as truth** - identity comes from `/proc`, never from the caller
//! 2. **Check, act, re-check** - a parent pid read twice must agree
//! 3. **Fail closed** - every failure is terminal for the request
//! 4. **Explicit configuration** - no process-wide mutable state

// Kernel and system databases
pub mod kernel;

// Mapping file
pub mod mapping;

// Sequencing
pub mod core;

// Observability
pub mod observability;

// Configuration
pub mod config;

// Testing Infrastructure
pub mod testing;

// CLI entrypoint wiring for the static-mapping binary.
pub mod cli;

pub use config::types::*;
