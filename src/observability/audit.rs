/// Audit event logging for identity-mapping decisions
/// Every resolution step that grants, denies or skips something emits a structured event.
///
/// - Correlation ID per resolution request (uuid v4)
/// - Event types: caller resolved, race detected, malformed map line, mapping matched,
///   no mapping, groups resolved, credential emission failure, resolution failure
use crate::config::types::{MappingError, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::SystemTime;
use uuid::Uuid;

/// Audit event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditSeverity {
    High,
    Medium,
    Low,
}

/// Types of events we track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    CallerResolved,
    RaceDetected,
    MalformedMapLine,
    MappingMatched,
    NoMapping,
    GroupsResolved,
    CredentialEmitFailed,
    ResolutionFailed,
}

impl AuditEventType {
    /// Get the default severity for this event type
    pub fn default_severity(&self) -> AuditSeverity {
        match self {
            AuditEventType::CallerResolved => AuditSeverity::Low,
            AuditEventType::MappingMatched => AuditSeverity::Low,
            AuditEventType::GroupsResolved => AuditSeverity::Low,
            AuditEventType::NoMapping => AuditSeverity::Low,

            AuditEventType::MalformedMapLine => AuditSeverity::Medium,
            AuditEventType::CredentialEmitFailed => AuditSeverity::Medium,

            AuditEventType::RaceDetected => AuditSeverity::High,
            AuditEventType::ResolutionFailed => AuditSeverity::High,
        }
    }
}

/// Individual audit event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    pub severity: AuditSeverity,
    pub timestamp: SystemTime,
    pub details: String,
    pub request_id: Option<Uuid>,
    pub uid: Option<u32>,
    pub pid: Option<u32>,
    pub file_path: Option<String>,
    pub line_number: Option<usize>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, details: String) -> Self {
        Self {
            severity: event_type.default_severity(),
            event_type,
            timestamp: SystemTime::now(),
            details,
            request_id: None,
            uid: None,
            pid: None,
            file_path: None,
            line_number: None,
        }
    }

    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_file_path(mut self, path: String) -> Self {
        self.file_path = Some(path);
        self
    }

    pub fn with_line_number(mut self, line_number: usize) -> Self {
        self.line_number = Some(line_number);
        self
    }

    /// JSON line written to the audit file
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "timestamp": self.timestamp
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            "event_type": self.event_type,
            "severity": self.severity,
            "details": self.details,
            "request_id": self.request_id,
            "uid": self.uid,
            "pid": self.pid,
            "file_path": self.file_path,
            "line_number": self.line_number,
            "process_id": std::process::id(),
        })
    }
}

/// Append-only audit trail backed by a file
pub struct AuditLogger {
    audit_file: Arc<Mutex<File>>,
    audit_path: PathBuf,
}

impl AuditLogger {
    pub fn new(audit_path: PathBuf) -> Result<Self> {
        if let Some(parent) = audit_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MappingError::Config(format!("Failed to create audit log directory: {}", e))
            })?;
        }

        let audit_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&audit_path)
            .map_err(|e| MappingError::Config(format!("Failed to open audit log: {}", e)))?;

        Ok(Self {
            audit_file: Arc::new(Mutex::new(audit_file)),
            audit_path,
        })
    }

    pub fn log_event(&self, event: &AuditEvent) {
        log_to_facade(event);

        if let Ok(mut file) = self.audit_file.lock() {
            if let Err(e) = writeln!(file, "{}", event.to_json()) {
                error!("Failed to write to audit log: {}", e);
            }
            if let Err(e) = file.flush() {
                error!("Failed to flush audit log: {}", e);
            }
        } else {
            error!("Failed to acquire lock on audit file");
        }
    }

    pub fn audit_path(&self) -> &PathBuf {
        &self.audit_path
    }
}

fn log_to_facade(event: &AuditEvent) {
    match event.severity {
        AuditSeverity::High => error!("static-mapping: {:?} - {}", event.event_type, event.details),
        AuditSeverity::Medium => warn!("static-mapping: {:?} - {}", event.event_type, event.details),
        AuditSeverity::Low => info!("static-mapping: {:?} - {}", event.event_type, event.details),
    }
}

static AUDIT_LOGGER: OnceLock<AuditLogger> = OnceLock::new();

/// Install the process-wide audit file. Only the first call takes effect.
pub fn init_audit_log(audit_path: PathBuf) -> Result<()> {
    let logger = AuditLogger::new(audit_path)?;
    if AUDIT_LOGGER.set(logger).is_err() {
        warn!("Audit logger already initialized");
    } else {
        info!("Audit logger initialized");
    }
    Ok(())
}

#[cfg(test)]
thread_local! {
    static CAPTURED_EVENTS: std::cell::RefCell<Vec<AuditEvent>> =
        std::cell::RefCell::new(Vec::new());
}

/// Events logged so far on the current test thread, oldest first.
#[cfg(test)]
pub(crate) fn take_captured_events() -> Vec<AuditEvent> {
    CAPTURED_EVENTS.with(|events| std::mem::take(&mut *events.borrow_mut()))
}

/// Log an event through the audit file if installed, else the log facade
pub fn log_audit_event(event: AuditEvent) {
    #[cfg(test)]
    CAPTURED_EVENTS.with(|events| events.borrow_mut().push(event.clone()));

    match AUDIT_LOGGER.get() {
        Some(logger) => logger.log_event(&event),
        None => log_to_facade(&event),
    }
}

/// Convenience constructors for the events the pipeline emits
pub mod events {
    use super::*;

    pub fn caller_resolved(request_id: Uuid, parent_pid: u32, uid: u32, gid: u32) {
        log_audit_event(
            AuditEvent::new(
                AuditEventType::CallerResolved,
                format!("Parent {} runs as uid {} gid {}", parent_pid, uid, gid),
            )
            .with_request_id(request_id)
            .with_pid(parent_pid)
            .with_uid(uid),
        );
    }

    pub fn race_detected(request_id: Uuid, was: u32, now: u32) {
        log_audit_event(
            AuditEvent::new(
                AuditEventType::RaceDetected,
                format!("Parent PID check failed (now {}, was {})", now, was),
            )
            .with_request_id(request_id)
            .with_pid(was),
        );
    }

    pub fn malformed_map_line(
        request_id: Option<Uuid>,
        path: String,
        line_number: usize,
        line: &str,
    ) {
        let event = AuditEvent::new(
            AuditEventType::MalformedMapLine,
            format!("Invalid line {} in mapfile: {}", line_number, line.trim_end()),
        )
        .with_file_path(path)
        .with_line_number(line_number);

        let event = match request_id {
            Some(id) => event.with_request_id(id),
            None => event,
        };
        log_audit_event(event);
    }

    pub fn mapping_matched(request_id: Uuid, source_uid: u32, target_uid: u32, path: String) {
        log_audit_event(
            AuditEvent::new(
                AuditEventType::MappingMatched,
                format!("Static mapping of {} -> {}", source_uid, target_uid),
            )
            .with_request_id(request_id)
            .with_uid(source_uid)
            .with_file_path(path),
        );
    }

    pub fn no_mapping(request_id: Uuid, source_uid: u32, user: &str) {
        log_audit_event(
            AuditEvent::new(
                AuditEventType::NoMapping,
                format!("No mapping for user {}", user),
            )
            .with_request_id(request_id)
            .with_uid(source_uid),
        );
    }

    pub fn groups_resolved(request_id: Uuid, uid: u32, primary_gid: u32, secondary: &[u32]) {
        log_audit_event(
            AuditEvent::new(
                AuditEventType::GroupsResolved,
                format!(
                    "Target uid {} primary gid {} secondary gids {:?}",
                    uid, primary_gid, secondary
                ),
            )
            .with_request_id(request_id)
            .with_uid(uid),
        );
    }

    pub fn credential_emit_failed(request_id: Uuid, gid: u32, reason: &str) {
        log_audit_event(
            AuditEvent::new(
                AuditEventType::CredentialEmitFailed,
                format!("Unable to add secondary GID {} to credential data: {}", gid, reason),
            )
            .with_request_id(request_id),
        );
    }

    pub fn resolution_failed(request_id: Uuid, error: &MappingError) {
        log_audit_event(
            AuditEvent::new(AuditEventType::ResolutionFailed, error.to_string())
                .with_request_id(request_id),
        );
    }
}
