//! Resolution sequencing
//!
//! Race-guarded caller lookup, the plugin pipeline, and the credential sink seam.

pub mod credentials;
pub mod plugin;
pub mod race_guard;

pub use credentials::{CredentialData, CredentialSink};
pub use plugin::{MappingOutcome, StaticMapping};
pub use race_guard::resolve_caller_identity;
