//! Observability
//!
//! Structured audit events for every mapping decision.

pub mod audit;
