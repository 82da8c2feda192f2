//! Expansion of a target uid into its primary and secondary groups.

use super::identity::{GroupList, IdentityDatabase};
use crate::config::types::{MappingError, ResolvedTarget, Result};

/// Group-list capacity of the first request
pub const INITIAL_GROUP_CAPACITY: usize = 20;

/// Resolve the full group set of `uid`.
///
/// The group list is requested with [`INITIAL_GROUP_CAPACITY`] entries and,
/// if the database asks for more, exactly once more at the size it reported.
pub fn resolve_groups<D: IdentityDatabase + ?Sized>(db: &D, uid: u32) -> Result<ResolvedTarget> {
    let user = db.user_by_uid(uid)?.ok_or_else(|| {
        log::error!("static-mapping: Unable to get username for target UID {}", uid);
        MappingError::UnknownIdentity(format!("no user entry for target UID {}", uid))
    })?;

    let secondary_gids = match db.group_list(&user, INITIAL_GROUP_CAPACITY)? {
        GroupList::Complete(groups) => groups,
        GroupList::Insufficient { required } => {
            log::debug!(
                "static-mapping: Group list of {} needs {} entries, retrying",
                user.name,
                required
            );
            match db.group_list(&user, required)? {
                GroupList::Complete(groups) => groups,
                GroupList::Insufficient { required } => {
                    log::error!("static-mapping: Unable to lookup groups for user {}", user.name);
                    return Err(MappingError::GroupLookupFailed {
                        user: user.name,
                        reason: format!("group list still needs {} entries after resize", required),
                    });
                }
            }
        }
    };

    Ok(ResolvedTarget {
        uid: user.uid,
        primary_gid: user.primary_gid,
        secondary_gids,
    })
}
