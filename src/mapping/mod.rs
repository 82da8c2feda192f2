//! Source-to-target identity mapping

pub mod mapfile;

pub use mapfile::{classify_line, find_rule, map_identity, LineVerdict};
