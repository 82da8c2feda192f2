//! User/group database access.
//!
//! The pipeline only talks to [`IdentityDatabase`]; [`SystemIdentityDatabase`]
//! is the passwd/`getgrouplist(3)` backed implementation.

use crate::config::types::{MappingError, Result, UserRecord};
use nix::errno::Errno;
use nix::unistd::{Uid, User};
use std::ffi::CString;

/// Outcome of one group-list request against a fixed capacity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GroupList {
    /// Every group the user belongs to, in database order
    Complete(Vec<u32>),
    /// The capacity was too small; the database needs `required` entries
    Insufficient { required: usize },
}

pub trait IdentityDatabase {
    fn user_by_uid(&self, uid: u32) -> Result<Option<UserRecord>>;

    fn user_by_name(&self, name: &str) -> Result<Option<UserRecord>>;

    /// List the groups of `user` (primary group included) into at most
    /// `capacity` entries.
    fn group_list(&self, user: &UserRecord, capacity: usize) -> Result<GroupList>;
}

/// Host user database via NSS.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemIdentityDatabase;

impl SystemIdentityDatabase {
    pub fn new() -> Self {
        Self
    }
}

fn to_record(user: User) -> UserRecord {
    UserRecord {
        name: user.name,
        uid: user.uid.as_raw(),
        primary_gid: user.gid.as_raw(),
    }
}

/// Repeat a passwd lookup while it is interrupted by a signal.
fn retry_on_eintr<F>(mut lookup: F) -> std::result::Result<Option<User>, Errno>
where
    F: FnMut() -> std::result::Result<Option<User>, Errno>,
{
    loop {
        match lookup() {
            Err(Errno::EINTR) => continue,
            other => return other,
        }
    }
}

impl IdentityDatabase for SystemIdentityDatabase {
    fn user_by_uid(&self, uid: u32) -> Result<Option<UserRecord>> {
        retry_on_eintr(|| User::from_uid(Uid::from_raw(uid)))
            .map(|user| user.map(to_record))
            .map_err(|e| {
                MappingError::UnknownIdentity(format!(
                    "Unable to lookup username for UID {}: (errno={}) {}",
                    uid,
                    e as i32,
                    e.desc()
                ))
            })
    }

    fn user_by_name(&self, name: &str) -> Result<Option<UserRecord>> {
        retry_on_eintr(|| User::from_name(name))
            .map(|user| user.map(to_record))
            .map_err(|e| {
                MappingError::UnknownIdentity(format!(
                    "Unable to lookup UID for user {}: (errno={}) {}",
                    name,
                    e as i32,
                    e.desc()
                ))
            })
    }

    fn group_list(&self, user: &UserRecord, capacity: usize) -> Result<GroupList> {
        let name = CString::new(user.name.as_str()).map_err(|_| MappingError::GroupLookupFailed {
            user: user.name.clone(),
            reason: "user name contains a NUL byte".to_string(),
        })?;

        let mut groups: Vec<libc::gid_t> = vec![0; capacity];
        let mut ngroups = libc::c_int::try_from(capacity).map_err(|_| {
            MappingError::GroupLookupFailed {
                user: user.name.clone(),
                reason: format!("group capacity {} out of range", capacity),
            }
        })?;

        // SAFETY: `name` is NUL-terminated, `groups` holds `ngroups` entries and
        // getgrouplist never writes more than `ngroups` of them.
        let result = unsafe {
            libc::getgrouplist(
                name.as_ptr(),
                user.primary_gid as libc::gid_t,
                groups.as_mut_ptr(),
                &mut ngroups,
            )
        };

        if result < 0 {
            return Ok(GroupList::Insufficient {
                required: ngroups.max(0) as usize,
            });
        }

        groups.truncate(ngroups.max(0) as usize);
        Ok(GroupList::Complete(groups.into_iter().map(|g| g as u32).collect()))
    }
}
