//! Integration tests for the resolution pipeline
//!
//! These tests drive the plugin through a fake proc tree on disk and an
//! in-memory user database.

use static_mapping::config::plugin::PluginConfig;
use static_mapping::core::{CredentialData, StaticMapping};
use static_mapping::kernel::proc_status::ProcFs;
use static_mapping::testing::{status_record, StaticIdentityDatabase};
use static_mapping::MappingError;
use std::path::Path;

fn write_status(proc_root: &Path, pid: u32, parent_pid: u32, uid: u32, gid: u32) {
    let dir = proc_root.join(pid.to_string());
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("status"), status_record(pid, parent_pid, uid, gid)).unwrap();
}

fn database() -> StaticIdentityDatabase {
    StaticIdentityDatabase::new()
        .with_user("alice", 500, 500)
        .with_user("svcacct", 600, 600)
        .with_user("extra", 700, 700)
        .with_groups("svcacct", vec![600, 4, 24, 27])
}

fn plugin(root: &Path, mapfile_content: &str) -> StaticMapping<StaticIdentityDatabase, ProcFs> {
    let proc_root = root.join("proc");
    write_status(&proc_root, 4242, 100, 0, 0);
    write_status(&proc_root, 100, 1, 500, 500);

    let mapfile = root.join("glexec-mapfile");
    std::fs::write(&mapfile, mapfile_content).unwrap();

    let config = PluginConfig {
        mapfile,
        proc_root: proc_root.clone(),
        ..PluginConfig::default()
    };
    StaticMapping::new(config, database(), ProcFs::new(proc_root))
}

#[test]
fn test_alice_maps_to_first_rule_only() {
    let dir = tempfile::tempdir().unwrap();
    let plugin = plugin(
        dir.path(),
        "alice\tsvcacct\n# alice other\nalice\textra\tbad\n",
    );

    let mut credentials = CredentialData::new();
    let outcome = plugin.run(4242, &mut credentials).unwrap();

    assert_eq!(outcome.caller.parent_pid, 100);
    assert_eq!(outcome.mapped.target_name, "svcacct");
    assert_eq!(credentials.uid, Some(600));
    assert_eq!(credentials.primary_gid, Some(600));
    assert_eq!(credentials.secondary_gids, vec![600, 4, 24, 27]);
}

#[test]
fn test_malformed_lines_before_rule_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let plugin = plugin(
        dir.path(),
        "\nalice\nalice extra bad\nalice svcacct # comment\nalice   svcacct\n",
    );

    let mut credentials = CredentialData::new();
    let outcome = plugin.run(4242, &mut credentials).unwrap();
    assert_eq!(outcome.mapped.target_uid, 600);
}

#[test]
fn test_unmapped_user_is_policy_denial_without_group_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let plugin = plugin(dir.path(), "bob\tsvcacct\n");

    let mut credentials = CredentialData::new();
    let err = plugin.run(4242, &mut credentials).unwrap_err();

    assert!(matches!(err, MappingError::NoMapping { ref user } if user == "alice"));
    assert!(plugin.database().group_list_calls().is_empty());
    assert_eq!(credentials, CredentialData::new());
}

#[test]
fn test_missing_parent_status_fails() {
    let dir = tempfile::tempdir().unwrap();
    let plugin = plugin(dir.path(), "alice svcacct\n");
    std::fs::remove_dir_all(dir.path().join("proc").join("100")).unwrap();

    let mut credentials = CredentialData::new();
    let err = plugin.run(4242, &mut credentials).unwrap_err();
    assert!(matches!(err, MappingError::ProcessNotFound { pid: 100 }));
}

#[test]
fn test_status_fields_beyond_window_fail() {
    let dir = tempfile::tempdir().unwrap();
    let proc_root = dir.path().join("proc");
    let padded = format!(
        "Name:\ttest\n{}PPid:\t1\nUid:\t500\t500\nGid:\t500\t500\n",
        "Groups:\t\n".repeat(500)
    );
    std::fs::create_dir_all(proc_root.join("4242")).unwrap();
    std::fs::write(proc_root.join("4242").join("status"), padded).unwrap();

    let mapfile = dir.path().join("mapfile");
    std::fs::write(&mapfile, "alice svcacct\n").unwrap();
    let config = PluginConfig {
        mapfile,
        proc_root: proc_root.clone(),
        ..PluginConfig::default()
    };
    let plugin = StaticMapping::new(config, database(), ProcFs::new(proc_root));

    let err = plugin.run(4242, &mut CredentialData::new()).unwrap_err();
    assert!(matches!(err, MappingError::ParseFailure { pid: 4242, .. }));
}

#[test]
fn test_plugin_args_drive_mapfile_choice() {
    let dir = tempfile::tempdir().unwrap();
    let proc_root = dir.path().join("proc");
    write_status(&proc_root, 4242, 100, 0, 0);
    write_status(&proc_root, 100, 1, 500, 500);
    let mapfile = dir.path().join("custom-map");
    std::fs::write(&mapfile, "alice svcacct\n").unwrap();

    let args = vec![
        "static_mapping".to_string(),
        "-mapfile".to_string(),
        mapfile.display().to_string(),
    ];
    let mut config = PluginConfig::from_plugin_args(&args).unwrap();
    config.proc_root = proc_root.clone();

    let plugin = StaticMapping::new(config, database(), ProcFs::new(proc_root));
    let outcome = plugin.run(4242, &mut CredentialData::new()).unwrap();
    assert_eq!(outcome.target.uid, 600);
}

#[cfg(target_os = "linux")]
#[test]
fn test_host_pipeline_does_not_panic() {
    // Depends on the host users; only the absence of panics is asserted.
    let dir = tempfile::tempdir().unwrap();
    let mapfile = dir.path().join("mapfile");
    std::fs::write(&mapfile, "root root\n").unwrap();

    let config = PluginConfig {
        mapfile,
        ..PluginConfig::default()
    };
    let plugin = StaticMapping::from_config(config).unwrap();
    let result = plugin.run(std::process::id(), &mut CredentialData::new());
    println!("host pipeline result: {:?}", result.map(|o| o.target));
}
