//! Parent identity resolution guarded against pid reuse.
//!
//! The parent pid is read before and after the parent's credentials. If it
//! changed, the parent exited in between and the credentials may belong to an
//! unrelated process that inherited the pid.

use crate::config::types::{CallerIdentity, MappingError, Result};
use crate::kernel::proc_status::{ProcessInspector, StatusSource};

/// Resolve the uid/gid of the parent of `self_pid`.
pub fn resolve_caller_identity<S: StatusSource>(
    inspector: &ProcessInspector<S>,
    self_pid: u32,
) -> Result<CallerIdentity> {
    let parent_pid = inspector
        .inspect(self_pid)
        .map_err(|e| {
            log::error!("static-mapping: Unable to get my parent PID info.");
            e
        })?
        .parent_pid;

    let parent = inspector.inspect(parent_pid).map_err(|e| {
        log::error!("static-mapping: Unable to get parent's UID/GID.");
        e
    })?;

    let parent_pid_again = inspector
        .inspect(self_pid)
        .map_err(|e| {
            log::error!("static-mapping: Unable to verify parent PID.");
            e
        })?
        .parent_pid;

    if parent_pid != parent_pid_again {
        log::error!(
            "static-mapping: Parent PID check failed (now {}, was {}).",
            parent_pid_again,
            parent_pid
        );
        return Err(MappingError::RaceDetected {
            was: parent_pid,
            now: parent_pid_again,
        });
    }

    Ok(CallerIdentity {
        parent_pid,
        uid: parent.uid,
        gid: parent.gid,
    })
}
