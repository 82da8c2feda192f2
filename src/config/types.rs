/// Core types and structures for the static-mapping system
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Identity record read from a process status source.
///
/// Only produced once the scan reached the group field, so every field
/// is resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessIdentity {
    /// Process whose status record was read
    pub pid: u32,
    /// Parent process id (`PPid:`)
    pub parent_pid: u32,
    /// Real user id (`Uid:` first column)
    pub uid: u32,
    /// Real group id (`Gid:` first column)
    pub gid: u32,
}

/// Identity of the calling process after the parent-pid race check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub parent_pid: u32,
    pub uid: u32,
    pub gid: u32,
}

/// One `source target` rule from the mapping file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapRule {
    pub source_name: String,
    pub target_name: String,
}

/// Result of a successful mapping-file lookup
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedIdentity {
    pub source_uid: u32,
    pub source_name: String,
    pub target_name: String,
    pub target_uid: u32,
}

/// Entry from the user database
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub name: String,
    pub uid: u32,
    pub primary_gid: u32,
}

/// Target identity expanded into its full group set.
///
/// `secondary_gids` keeps the database's enumeration order; duplicates
/// (including the primary gid) are not suppressed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTarget {
    pub uid: u32,
    pub primary_gid: u32,
    pub secondary_gids: Vec<u32>,
}

/// Custom error types for static-mapping
#[derive(Error, Debug)]
pub enum MappingError {
    #[error("Status source for process {pid} does not exist")]
    ProcessNotFound { pid: u32 },

    #[error("Unable to read status of process {pid}: {source}")]
    StatusAccess {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to parse status record of process {pid}: {reason}")]
    ParseFailure { pid: u32, reason: String },

    #[error("Parent PID check failed (now {now}, was {was})")]
    RaceDetected { was: u32, now: u32 },

    #[error("Unknown identity: {0}")]
    UnknownIdentity(String),

    #[error("Unable to open mapfile {}: {source}", .path.display())]
    ConfigUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error reading from mapfile {}: {source}", .path.display())]
    ConfigReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No mapping for user {user}")]
    NoMapping { user: String },

    #[error("Unable to lookup groups for user {user}: {reason}")]
    GroupLookupFailed { user: String, reason: String },

    #[error("Unable to add {item} to credential data: {reason}")]
    CredentialEmit { item: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MappingError {
    /// True when the administrator simply has no rule for the identity.
    pub fn is_policy_denial(&self) -> bool {
        matches!(self, MappingError::NoMapping { .. })
    }
}

/// Result type alias for static-mapping operations
pub type Result<T> = std::result::Result<T, MappingError>;
