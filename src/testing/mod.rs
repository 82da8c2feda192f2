//! Testing infrastructure
//!
//! In-memory stand-ins for the host user database and the proc filesystem,
//! so every stage of the pipeline can be exercised without root or real users.

use crate::config::types::{MappingError, Result, UserRecord};
use crate::kernel::identity::{GroupList, IdentityDatabase};
use crate::kernel::proc_status::StatusSource;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

/// User database held in memory.
#[derive(Debug, Default)]
pub struct StaticIdentityDatabase {
    users: Vec<UserRecord>,
    groups: RefCell<HashMap<String, Vec<u32>>>,
    growth: HashMap<String, usize>,
    group_list_calls: RefCell<Vec<usize>>,
}

impl StaticIdentityDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, name: &str, uid: u32, primary_gid: u32) -> Self {
        self.users.push(UserRecord {
            name: name.to_string(),
            uid,
            primary_gid,
        });
        self
    }

    pub fn with_groups(self, name: &str, groups: Vec<u32>) -> Self {
        self.groups.borrow_mut().insert(name.to_string(), groups);
        self
    }

    /// Add `extra` new memberships to `name` after every group-list request,
    /// as if an administrator were editing the group database concurrently.
    pub fn with_group_growth(mut self, name: &str, extra: usize) -> Self {
        self.growth.insert(name.to_string(), extra);
        self
    }

    /// Capacities passed to `group_list`, in call order
    pub fn group_list_calls(&self) -> Vec<usize> {
        self.group_list_calls.borrow().clone()
    }
}

impl IdentityDatabase for StaticIdentityDatabase {
    fn user_by_uid(&self, uid: u32) -> Result<Option<UserRecord>> {
        Ok(self.users.iter().find(|u| u.uid == uid).cloned())
    }

    fn user_by_name(&self, name: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.iter().find(|u| u.name == name).cloned())
    }

    fn group_list(&self, user: &UserRecord, capacity: usize) -> Result<GroupList> {
        self.group_list_calls.borrow_mut().push(capacity);

        let mut groups = self.groups.borrow_mut();
        let list = groups
            .entry(user.name.clone())
            .or_insert_with(|| vec![user.primary_gid]);
        let result = if list.len() > capacity {
            GroupList::Insufficient {
                required: list.len(),
            }
        } else {
            GroupList::Complete(list.clone())
        };

        if let Some(extra) = self.growth.get(&user.name) {
            let next = list.iter().copied().max().unwrap_or(0) + 1;
            list.extend(next..next + *extra as u32);
        }
        Ok(result)
    }
}

/// Status records served from memory, one queue per pid.
///
/// Each read consumes the front record; the last record of a queue is
/// served for every later read.
#[derive(Debug, Default)]
pub struct ScriptedStatusSource {
    records: RefCell<HashMap<u32, VecDeque<String>>>,
    reads: RefCell<Vec<u32>>,
}

impl ScriptedStatusSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(self, pid: u32, record: impl Into<String>) -> Self {
        self.records
            .borrow_mut()
            .entry(pid)
            .or_default()
            .push_back(record.into());
        self
    }

    /// Pids read so far, in order
    pub fn reads(&self) -> Vec<u32> {
        self.reads.borrow().clone()
    }
}

impl StatusSource for ScriptedStatusSource {
    fn read_status(&self, pid: u32, window: usize) -> Result<Vec<u8>> {
        self.reads.borrow_mut().push(pid);

        let mut records = self.records.borrow_mut();
        let queue = records
            .get_mut(&pid)
            .ok_or(MappingError::ProcessNotFound { pid })?;
        let record = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        };

        let bytes = record.into_bytes();
        Ok(bytes[..bytes.len().min(window)].to_vec())
    }
}

/// Minimal status record with the fields the inspector reads
pub fn status_record(pid: u32, parent_pid: u32, uid: u32, gid: u32) -> String {
    format!(
        "Name:\ttest\nState:\tS (sleeping)\nTgid:\t{pid}\nPid:\t{pid}\nPPid:\t{parent_pid}\n\
         TracerPid:\t0\nUid:\t{uid}\t{uid}\t{uid}\t{uid}\nGid:\t{gid}\t{gid}\t{gid}\t{gid}\n\
         FDSize:\t64\n"
    )
}
