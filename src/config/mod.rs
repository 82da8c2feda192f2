//! Configuration and shared types
//!
//! Plugin options, error taxonomy and the transient data model.

pub mod plugin;
pub mod types;
