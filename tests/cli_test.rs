// `quickplay config` commands against a broken configuration file
#![cfg(feature = "cli")]

use quickplay::QuickPlayConfig;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const BROKEN: &str = "[camera]\nframe_interval_ms = 0\n";

fn quickplay(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_quickplay"))
        .args(args)
        .current_dir(dir)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run quickplay")
}

#[test]
fn test_config_commands_ignore_broken_default_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("quickplay.toml"), BROKEN).unwrap();

    let sample = quickplay(dir.path(), &["config", "sample"]);
    assert!(sample.status.success());
    assert!(String::from_utf8_lossy(&sample.stdout).contains("[playback]"));

    fs::write(dir.path().join("other.toml"), "").unwrap();
    let validate = quickplay(dir.path(), &["config", "validate", "other.toml"]);
    assert!(validate.status.success());

    let validate_broken = quickplay(dir.path(), &["config", "validate"]);
    assert!(!validate_broken.status.success());

    let init = quickplay(dir.path(), &["config", "init", "--force"]);
    assert!(init.status.success());
    assert_eq!(
        QuickPlayConfig::load_from_file(dir.path().join("quickplay.toml")).unwrap(),
        QuickPlayConfig::default()
    );
}

#[test]
fn test_config_init_honors_config_path() {
    let dir = tempfile::tempdir().unwrap();

    let init = quickplay(dir.path(), &["--config", "custom.toml", "config", "init"]);
    assert!(init.status.success());
    assert!(dir.path().join("custom.toml").exists());
    assert!(!dir.path().join("quickplay.toml").exists());

    let again = quickplay(dir.path(), &["config", "init", "--config", "custom.toml"]);
    assert!(!again.status.success());
    assert!(String::from_utf8_lossy(&again.stderr).contains("already exists"));
}

#[test]
fn test_scan_still_rejects_broken_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("quickplay.toml"), BROKEN).unwrap();

    let resolve = quickplay(dir.path(), &["resolve", "ftp://bad"]);
    assert!(!resolve.status.success());
    assert!(String::from_utf8_lossy(&resolve.stderr).contains("failed to load configuration"));
}
