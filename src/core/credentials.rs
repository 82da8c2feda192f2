//! Credential emission to the host framework.

use crate::config::types::Result;
use serde::{Deserialize, Serialize};

/// Receiver of the resolved credential items.
///
/// Called in order: uid, primary gid, then each secondary gid.
pub trait CredentialSink {
    fn add_uid(&mut self, uid: u32) -> Result<()>;

    fn add_primary_gid(&mut self, gid: u32) -> Result<()>;

    fn add_secondary_gid(&mut self, gid: u32) -> Result<()>;
}

/// Credential items collected in memory
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialData {
    pub uid: Option<u32>,
    pub primary_gid: Option<u32>,
    pub secondary_gids: Vec<u32>,
}

impl CredentialData {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialSink for CredentialData {
    fn add_uid(&mut self, uid: u32) -> Result<()> {
        self.uid = Some(uid);
        Ok(())
    }

    fn add_primary_gid(&mut self, gid: u32) -> Result<()> {
        self.primary_gid = Some(gid);
        Ok(())
    }

    fn add_secondary_gid(&mut self, gid: u32) -> Result<()> {
        self.secondary_gids.push(gid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_items_in_order() {
        let mut data = CredentialData::new();
        data.add_uid(600).unwrap();
        data.add_primary_gid(600).unwrap();
        data.add_secondary_gid(10).unwrap();
        data.add_secondary_gid(10).unwrap();

        assert_eq!(data.uid, Some(600));
        assert_eq!(data.primary_gid, Some(600));
        assert_eq!(data.secondary_gids, vec![10, 10]);
    }
}
