//! Resolution pipeline: caller identity -> mapping file -> target groups -> credentials.

use super::credentials::CredentialSink;
use super::race_guard::resolve_caller_identity;
use crate::config::plugin::PluginConfig;
use crate::config::types::{CallerIdentity, MappedIdentity, MappingError, ResolvedTarget, Result};
use crate::kernel::groups::resolve_groups;
use crate::kernel::identity::{IdentityDatabase, SystemIdentityDatabase};
use crate::kernel::proc_status::{ProcFs, ProcessInspector, StatusSource};
use crate::mapping::map_identity;
use crate::observability::audit::events;
use serde::Serialize;
use uuid::Uuid;

/// Everything decided during one successful resolution
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MappingOutcome {
    pub request_id: Uuid,
    pub caller: CallerIdentity,
    pub mapped: MappedIdentity,
    pub target: ResolvedTarget,
}

/// Static identity-mapping plugin.
pub struct StaticMapping<D, S> {
    config: PluginConfig,
    db: D,
    inspector: ProcessInspector<S>,
}

impl StaticMapping<SystemIdentityDatabase, ProcFs> {
    /// Plugin backed by the host user database and proc filesystem
    pub fn from_config(config: PluginConfig) -> Result<Self> {
        config.validate()?;
        let inspector = ProcessInspector::from_config(&config);
        Ok(Self {
            config,
            db: SystemIdentityDatabase::new(),
            inspector,
        })
    }
}

impl<D: IdentityDatabase, S: StatusSource> StaticMapping<D, S> {
    pub fn new(config: PluginConfig, db: D, source: S) -> Self {
        let inspector = ProcessInspector::new(source, config.status_window);
        Self {
            config,
            db,
            inspector,
        }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    pub fn inspector(&self) -> &ProcessInspector<S> {
        &self.inspector
    }

    /// Resolve the identity for the parent of `self_pid` and emit it into `sink`.
    ///
    /// Nothing is emitted unless every stage succeeded. Only a failure to add
    /// a secondary gid is tolerated.
    pub fn run<C: CredentialSink + ?Sized>(&self, self_pid: u32, sink: &mut C) -> Result<MappingOutcome> {
        let request_id = Uuid::new_v4();

        let outcome = self.resolve(request_id, self_pid).map_err(|e| {
            match &e {
                MappingError::NoMapping { .. } => {}
                MappingError::RaceDetected { was, now } => {
                    events::race_detected(request_id, *was, *now)
                }
                other => events::resolution_failed(request_id, other),
            }
            e
        })?;

        self.emit(&outcome, sink)?;
        Ok(outcome)
    }

    /// Verification entry point; identical to [`run`](Self::run).
    pub fn verify<C: CredentialSink + ?Sized>(&self, self_pid: u32, sink: &mut C) -> Result<MappingOutcome> {
        self.run(self_pid, sink)
    }

    fn resolve(&self, request_id: Uuid, self_pid: u32) -> Result<MappingOutcome> {
        let caller = resolve_caller_identity(&self.inspector, self_pid)?;
        events::caller_resolved(request_id, caller.parent_pid, caller.uid, caller.gid);

        let mapfile = &self.config.mapfile;
        let mapped = match map_identity(&self.db, caller.uid, mapfile, Some(request_id)) {
            Ok(mapped) => mapped,
            Err(MappingError::NoMapping { user }) => {
                log::debug!("static-mapping: Unable to map {}; module failure.", caller.uid);
                events::no_mapping(request_id, caller.uid, &user);
                return Err(MappingError::NoMapping { user });
            }
            Err(e) => return Err(e),
        };
        log::debug!(
            "static-mapping: Static mapping of {} -> {}.",
            mapped.source_uid,
            mapped.target_uid
        );
        events::mapping_matched(
            request_id,
            mapped.source_uid,
            mapped.target_uid,
            self.config.mapfile.display().to_string(),
        );

        let target = resolve_groups(&self.db, mapped.target_uid)?;
        events::groups_resolved(
            request_id,
            target.uid,
            target.primary_gid,
            &target.secondary_gids,
        );

        Ok(MappingOutcome {
            request_id,
            caller,
            mapped,
            target,
        })
    }

    fn emit<C: CredentialSink + ?Sized>(&self, outcome: &MappingOutcome, sink: &mut C) -> Result<()> {
        let target = &outcome.target;

        sink.add_uid(target.uid).map_err(|e| {
            log::error!(
                "static-mapping: Unable to add UID {} to credential data.",
                target.uid
            );
            events::resolution_failed(outcome.request_id, &e);
            e
        })?;

        log::debug!("static-mapping: Adding a primary GID {}.", target.primary_gid);
        sink.add_primary_gid(target.primary_gid).map_err(|e| {
            log::error!(
                "static-mapping: Unable to add primary GID {} to credential data.",
                target.primary_gid
            );
            events::resolution_failed(outcome.request_id, &e);
            e
        })?;

        for gid in &target.secondary_gids {
            log::debug!("static-mapping: Added a secondary GID: {}.", gid);
            if let Err(e) = sink.add_secondary_gid(*gid) {
                events::credential_emit_failed(outcome.request_id, *gid, &e.to_string());
            }
        }

        Ok(())
    }
}
