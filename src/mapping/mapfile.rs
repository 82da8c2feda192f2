//! Mapping-file lookup.
//!
//! Line rules:
//! - a line containing `#` anywhere is ignored entirely
//! - remaining lines are split on whitespace: `source target`
//! - one token, or more than two, is a malformed line: logged, never a match
//! - the first well-formed line whose source equals the user name wins

use crate::config::types::{MapRule, MappedIdentity, MappingError, Result};
use crate::kernel::identity::IdentityDatabase;
use crate::observability::audit::events;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;
use uuid::Uuid;

pub const COMMENT_MARKER: char = '#';

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineVerdict {
    /// Empty or whitespace-only
    Blank,
    /// Contains the comment marker
    Comment,
    /// Single token, or `tokens` > 2
    Malformed { tokens: usize },
    Rule(MapRule),
}

pub fn classify_line(line: &str) -> LineVerdict {
    if line.contains(COMMENT_MARKER) {
        return LineVerdict::Comment;
    }

    let mut tokens = line.split_whitespace();
    let (source, target) = match (tokens.next(), tokens.next()) {
        (None, _) => return LineVerdict::Blank,
        (Some(_), None) => return LineVerdict::Malformed { tokens: 1 },
        (Some(source), Some(target)) => (source, target),
    };

    let extra = tokens.count();
    if extra > 0 {
        return LineVerdict::Malformed { tokens: 2 + extra };
    }

    LineVerdict::Rule(MapRule {
        source_name: source.to_string(),
        target_name: target.to_string(),
    })
}

/// First rule in `reader` whose source is `source_name`. Stops reading at the match.
///
/// Malformed lines are audited under `request_id` when one is given.
pub fn find_rule<R: BufRead>(
    mut reader: R,
    source_name: &str,
    path: &Path,
    request_id: Option<Uuid>,
) -> Result<Option<MapRule>> {
    let mut buf = Vec::new();
    let mut line_number = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                log::error!(
                    "static-mapping: Error reading from mapfile {}: {}",
                    path.display(),
                    e
                );
                return Err(MappingError::ConfigReadError {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        }
        line_number += 1;

        let line = String::from_utf8_lossy(&buf);
        match classify_line(&line) {
            LineVerdict::Blank | LineVerdict::Comment => {}
            LineVerdict::Malformed { .. } => {
                events::malformed_map_line(
                    request_id,
                    path.display().to_string(),
                    line_number,
                    &line,
                );
            }
            LineVerdict::Rule(rule) if rule.source_name == source_name => {
                log::debug!(
                    "static-mapping: {}:{} maps {} to {}",
                    path.display(),
                    line_number,
                    rule.source_name,
                    rule.target_name
                );
                return Ok(Some(rule));
            }
            LineVerdict::Rule(_) => {}
        }
    }
}

/// Translate `source_uid` through the mapping file at `mapfile`.
pub fn map_identity<D: IdentityDatabase + ?Sized>(
    db: &D,
    source_uid: u32,
    mapfile: &Path,
    request_id: Option<Uuid>,
) -> Result<MappedIdentity> {
    let source = db.user_by_uid(source_uid)?.ok_or_else(|| {
        log::error!("static-mapping: Unable to lookup username for UID {}", source_uid);
        MappingError::UnknownIdentity(format!("no user entry for UID {}", source_uid))
    })?;

    let file = File::open(mapfile).map_err(|e| {
        log::error!(
            "static-mapping: Unable to open mapfile {}: {}",
            mapfile.display(),
            e
        );
        MappingError::ConfigUnavailable {
            path: mapfile.to_path_buf(),
            source: e,
        }
    })?;

    let rule = match find_rule(BufReader::new(file), &source.name, mapfile, request_id)? {
        Some(rule) => rule,
        None => {
            log::info!("static-mapping: No mapping for user {}", source.name);
            return Err(MappingError::NoMapping { user: source.name });
        }
    };

    let target = db.user_by_name(&rule.target_name)?.ok_or_else(|| {
        log::error!(
            "static-mapping: Unable to lookup UID for user {}",
            rule.target_name
        );
        MappingError::UnknownIdentity(format!("no user entry for {}", rule.target_name))
    })?;

    Ok(MappedIdentity {
        source_uid,
        source_name: source.name,
        target_name: rule.target_name,
        target_uid: target.uid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::audit::{take_captured_events, AuditEventType};
    use crate::testing::StaticIdentityDatabase;
    use std::io::{Cursor, Read};

    fn rule(source: &str, target: &str) -> LineVerdict {
        LineVerdict::Rule(MapRule {
            source_name: source.to_string(),
            target_name: target.to_string(),
        })
    }

    fn find(content: &str, user: &str) -> Option<MapRule> {
        find_rule(Cursor::new(content), user, Path::new("test-mapfile"), None).unwrap()
    }

    #[test]
    fn classify_two_tokens() {
        assert_eq!(classify_line("alice\tsvcacct\n"), rule("alice", "svcacct"));
        assert_eq!(classify_line("  alice   svcacct  "), rule("alice", "svcacct"));
    }

    #[test]
    fn classify_comment_anywhere() {
        assert_eq!(classify_line("# alice other\n"), LineVerdict::Comment);
        assert_eq!(classify_line("alice svcacct # ops\n"), LineVerdict::Comment);
        assert_eq!(classify_line("alice svc#acct\n"), LineVerdict::Comment);
    }

    #[test]
    fn classify_blank_and_malformed() {
        assert_eq!(classify_line("\n"), LineVerdict::Blank);
        assert_eq!(classify_line("   \t\n"), LineVerdict::Blank);
        assert_eq!(classify_line("alice\n"), LineVerdict::Malformed { tokens: 1 });
        assert_eq!(
            classify_line("alice\textra\tbad\n"),
            LineVerdict::Malformed { tokens: 3 }
        );
    }

    #[test]
    fn first_match_wins() {
        let content = "bob\tbobsvc\nalice\tfirst\nalice\tsecond\n";
        assert_eq!(find(content, "alice").unwrap().target_name, "first");
    }

    #[test]
    fn scan_stops_at_match() {
        let content = "alice svcacct\nthis line is never read\n";
        let mut reader = Cursor::new(content);
        let rule = find_rule(&mut reader, "alice", Path::new("m"), None).unwrap();
        assert_eq!(rule.unwrap().target_name, "svcacct");

        let mut rest = String::new();
        reader.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "this line is never read\n");
    }

    #[test]
    fn comment_and_malformed_lines_do_not_interfere() {
        let content = "alice\tsvcacct\n# alice other\nalice\textra\tbad\n";
        assert_eq!(find(content, "alice").unwrap().target_name, "svcacct");

        let content = "# alice other\nalice\textra\tbad\nalice\nalice\tsvcacct\n";
        assert_eq!(find(content, "alice").unwrap().target_name, "svcacct");
    }

    #[test]
    fn each_malformed_line_is_audited_once() {
        take_captured_events();
        let id = Uuid::new_v4();
        let content = "bob bobsvc\nalice\n# x y z\nalice extra bad\n\nalice svcacct\n";

        let rule = find_rule(Cursor::new(content), "alice", Path::new("m"), Some(id)).unwrap();
        assert_eq!(rule.unwrap().target_name, "svcacct");

        let malformed: Vec<_> = take_captured_events()
            .into_iter()
            .filter(|e| e.event_type == AuditEventType::MalformedMapLine)
            .collect();
        let lines: Vec<_> = malformed.iter().map(|e| e.line_number).collect();
        assert_eq!(lines, vec![Some(2), Some(4)]);
        assert!(malformed.iter().all(|e| e.request_id == Some(id)));
        assert!(malformed.iter().all(|e| e.file_path.as_deref() == Some("m")));
    }

    #[test]
    fn well_formed_file_audits_nothing() {
        take_captured_events();
        find("# header\n\nalice svcacct\n", "alice").unwrap();
        assert!(take_captured_events().is_empty());
    }

    #[test]
    fn three_token_line_never_matches() {
        assert_eq!(find("alice svcacct extra\n", "alice"), None);
    }

    #[test]
    fn single_token_line_does_not_stop_scan() {
        let content = "alice\nalice svcacct\n";
        assert_eq!(find(content, "alice").unwrap().target_name, "svcacct");
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert_eq!(find("Alice svcacct\n", "alice"), None);
    }

    #[test]
    fn last_line_without_newline_is_read() {
        assert_eq!(find("alice svcacct", "alice").unwrap().target_name, "svcacct");
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(ErrorKind::Other, "disk on fire"))
        }
    }

    #[test]
    fn read_error_is_config_read_error() {
        let result = find_rule(BufReader::new(FailingReader), "alice", Path::new("m"), None);
        assert!(matches!(result, Err(MappingError::ConfigReadError { .. })));
    }

    fn database() -> StaticIdentityDatabase {
        StaticIdentityDatabase::new()
            .with_user("alice", 500, 500)
            .with_user("svcacct", 600, 600)
            .with_user("extra", 700, 700)
    }

    #[test]
    fn map_identity_resolves_target_uid() {
        let dir = tempfile::tempdir().unwrap();
        let mapfile = dir.path().join("mapfile");
        std::fs::write(&mapfile, "alice\tsvcacct\n# alice other\nalice\textra\tbad\n").unwrap();

        let mapped = map_identity(&database(), 500, &mapfile, None).unwrap();
        assert_eq!(mapped.source_name, "alice");
        assert_eq!(mapped.target_name, "svcacct");
        assert_eq!(mapped.target_uid, 600);
    }

    #[test]
    fn map_identity_without_rule_is_no_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let mapfile = dir.path().join("mapfile");
        std::fs::write(&mapfile, "bob svcacct\n").unwrap();

        let err = map_identity(&database(), 500, &mapfile, None).unwrap_err();
        assert!(matches!(err, MappingError::NoMapping { ref user } if user == "alice"));
    }

    #[test]
    fn map_identity_missing_file_is_config_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = map_identity(&database(), 500, &dir.path().join("absent"), None).unwrap_err();
        assert!(matches!(err, MappingError::ConfigUnavailable { .. }));
    }

    #[test]
    fn map_identity_unknown_source_or_target() {
        let dir = tempfile::tempdir().unwrap();
        let mapfile = dir.path().join("mapfile");
        std::fs::write(&mapfile, "alice ghost\n").unwrap();

        assert!(matches!(
            map_identity(&database(), 9999, &mapfile, None),
            Err(MappingError::UnknownIdentity(_))
        ));
        assert!(matches!(
            map_identity(&database(), 500, &mapfile, None),
            Err(MappingError::UnknownIdentity(_))
        ));
    }
}
