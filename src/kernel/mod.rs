//! Thin wrappers around kernel and system-database interfaces.
//!
//! All `unsafe` code is concentrated here with explicit SAFETY comments.
//! Dependency direction: proc_status, identity -> groups

pub mod groups;
pub mod identity;
pub mod proc_status;
