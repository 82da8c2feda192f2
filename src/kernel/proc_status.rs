//! Process status inspection.
//!
//! PRECONDITION on the kernel record format: the labels `PPid:`, `Uid:` and
//! `Gid:` appear in that relative order, each at the start of a line, with the
//! value in the tab-separated column after the label. The scanner only looks
//! for the next label once the previous one resolved, so a record that
//! reorders them never resolves the later fields.

use crate::config::plugin::PluginConfig;
use crate::config::types::{MappingError, ProcessIdentity, Result};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::PathBuf;

pub const PARENT_PID_LABEL: &str = "PPid:";
pub const UID_LABEL: &str = "Uid:";
pub const GID_LABEL: &str = "Gid:";

/// Source of per-process status text.
pub trait StatusSource {
    /// Read at most `window` bytes of the status record of `pid`.
    fn read_status(&self, pid: u32, window: usize) -> Result<Vec<u8>>;
}

/// Status records under a proc filesystem root (`<root>/<pid>/status`).
#[derive(Clone, Debug)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn status_path(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string()).join("status")
    }
}

impl StatusSource for ProcFs {
    fn read_status(&self, pid: u32, window: usize) -> Result<Vec<u8>> {
        let path = self.status_path(pid);
        let file = File::open(&path).map_err(|e| {
            log::error!(
                "static-mapping: Error opening process {} status file: {}",
                pid,
                e
            );
            match e.kind() {
                ErrorKind::NotFound => MappingError::ProcessNotFound { pid },
                _ => MappingError::StatusAccess { pid, source: e },
            }
        })?;

        // Single bounded window; the file handle is dropped on every path.
        // The buffer only grows to what the record actually holds.
        let mut buf = Vec::new();
        file.take(window as u64)
            .read_to_end(&mut buf)
            .map_err(|e| MappingError::StatusAccess { pid, source: e })?;
        Ok(buf)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScanState {
    SeekParent,
    SeekUser,
    SeekGroup,
    Done,
}

/// Fields recovered by one pass over a status record; `None` is unresolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusScan {
    pub parent_pid: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl StatusScan {
    /// Full identity, or `ParseFailure` unless the group field resolved.
    pub fn into_identity(self, pid: u32) -> Result<ProcessIdentity> {
        match (self.parent_pid, self.uid, self.gid) {
            (Some(parent_pid), Some(uid), Some(gid)) => Ok(ProcessIdentity {
                pid,
                parent_pid,
                uid,
                gid,
            }),
            _ => Err(MappingError::ParseFailure {
                pid,
                reason: format!("{} not resolved", self.first_missing_label()),
            }),
        }
    }

    fn first_missing_label(&self) -> &'static str {
        if self.parent_pid.is_none() {
            PARENT_PID_LABEL
        } else if self.uid.is_none() {
            UID_LABEL
        } else {
            GID_LABEL
        }
    }
}

/// Single ordered pass: parent id, then user id, then group id.
pub fn scan_status(buf: &[u8]) -> StatusScan {
    let mut scan = StatusScan::default();
    let mut state = ScanState::SeekParent;

    for line in buf.split_inclusive(|b| *b == b'\n') {
        match state {
            ScanState::SeekParent => {
                scan.parent_pid = match_column(PARENT_PID_LABEL, line);
                if scan.parent_pid.is_some() {
                    state = ScanState::SeekUser;
                }
            }
            ScanState::SeekUser => {
                scan.uid = match_column(UID_LABEL, line);
                if scan.uid.is_some() {
                    state = ScanState::SeekGroup;
                }
            }
            ScanState::SeekGroup => {
                scan.gid = match_column(GID_LABEL, line);
                if scan.gid.is_some() {
                    state = ScanState::Done;
                }
            }
            ScanState::Done => {}
        }
        if state == ScanState::Done {
            break;
        }
    }

    scan
}

/// Numeric value of the column following `label`, if this line carries it.
///
/// The value must be terminated by a tab or newline; a value cut off by the
/// read window is unresolved.
fn match_column(label: &str, line: &[u8]) -> Option<u32> {
    let tab = line.iter().position(|b| *b == b'\t')?;
    if &line[..tab] != label.as_bytes() {
        return None;
    }

    let rest = &line[tab + 1..];
    let end = rest.iter().position(|b| *b == b'\t' || *b == b'\n')?;
    std::str::from_utf8(&rest[..end])
        .ok()?
        .trim()
        .parse::<u32>()
        .ok()
}

/// Reads identity records for processes.
pub struct ProcessInspector<S> {
    source: S,
    window: usize,
}

impl ProcessInspector<ProcFs> {
    pub fn from_config(config: &PluginConfig) -> Self {
        Self::new(ProcFs::new(&config.proc_root), config.status_window)
    }
}

impl<S: StatusSource> ProcessInspector<S> {
    pub fn new(source: S, window: usize) -> Self {
        Self { source, window }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn inspect(&self, pid: u32) -> Result<ProcessIdentity> {
        let buf = self.source.read_status(pid, self.window)?;
        let identity = scan_status(&buf).into_identity(pid).map_err(|e| {
            if buf.len() >= self.window {
                log::error!(
                    "static-mapping: Error - unable to parse status file for PID {} within the first {} bytes: {}",
                    pid,
                    self.window,
                    e
                );
            } else {
                log::error!(
                    "static-mapping: Error - unable to parse status file for PID {}: {}",
                    pid,
                    e
                );
            }
            e
        })?;

        log::debug!(
            "static-mapping: PID {} has parent {} uid {} gid {}",
            pid,
            identity.parent_pid,
            identity.uid,
            identity.gid
        );
        Ok(identity)
    }
}
