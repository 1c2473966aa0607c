//! End-to-end tests driving the CLI binary through stdin.
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use tempfile::tempdir;

/// Runs `commands` against the database in `dir` and returns stdout.
fn run_cli(dir: &Path, extra_env: &[(&str, &str)], commands: &str) -> String {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cli"));
    cmd.env("LAYERKV_DIR", dir.to_str().unwrap())
        .env("LAYERKV_WAL_SYNC", "false")
        .env_remove("LAYERKV_TTL")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (k, v) in extra_env {
        cmd.env(k, v);
    }
    let mut child = cmd.spawn().expect("failed to spawn cli");

    {
        let stdin = child.stdin.as_mut().expect("failed to open stdin");
        stdin.write_all(commands.as_bytes()).expect("failed to write commands");
        stdin.write_all(b"EXIT\n").expect("failed to write EXIT");
    }

    let output = child.wait_with_output().expect("failed to read output");
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn sst_count(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("sst"))
        .count()
}

// ---- Basic commands ----

#[test]
fn set_then_get() {
    let dir = tempdir().unwrap();
    let output = run_cli(dir.path(), &[], "SET key1 value1\nGET key1\n");
    assert!(output.contains("OK"));
    assert!(output.contains("value1"));
    assert!(output.contains("bye"));
}

#[test]
fn values_may_contain_spaces() {
    let dir = tempdir().unwrap();
    let output = run_cli(dir.path(), &[], "SET greeting hello there world\nGET greeting\n");
    assert!(output.contains("hello there world"));
}

#[test]
fn delete_hides_key() {
    let dir = tempdir().unwrap();
    let output = run_cli(dir.path(), &[], "SET k v\nDEL k\nGET k\n");
    assert!(output.contains("(nil)"));
}

#[test]
fn merge_appends_with_commas() {
    let dir = tempdir().unwrap();
    let output = run_cli(dir.path(), &[], "SET list a\nMERGE list b\nMERGE list c\nGET list\n");
    assert!(output.contains("a,b,c"));
}

#[test]
fn mget_reports_each_key() {
    let dir = tempdir().unwrap();
    let output = run_cli(dir.path(), &[], "SET a 1\nSET b 2\nMGET a missing b\n");
    assert!(output.contains("a -> 1"));
    assert!(output.contains("missing -> (nil)"));
    assert!(output.contains("b -> 2"));
}

#[test]
fn usage_errors_and_unknown_commands() {
    let dir = tempdir().unwrap();
    let output = run_cli(dir.path(), &[], "SET onlykey\nGET\nMERGE\nFROB x\n");
    assert!(output.contains("ERR usage: SET key value"));
    assert!(output.contains("ERR usage: GET key"));
    assert!(output.contains("ERR usage: MERGE key value"));
    assert!(output.contains("unknown command: FROB"));
}

// ---- Scans ----

#[test]
fn scan_respects_bounds_and_tombstones() {
    let dir = tempdir().unwrap();
    let commands = "SET a 1\nSET b 2\nSET c 3\nSET d 4\nDEL b\nSCAN a d\n";
    let output = run_cli(dir.path(), &[], commands);
    assert!(output.contains("a -> 1"));
    assert!(output.contains("c -> 3"));
    assert!(!output.contains("b -> 2"));
    assert!(!output.contains("d -> 4"));
    assert!(output.contains("(2 entries)"));
}

#[test]
fn scan_of_empty_database() {
    let dir = tempdir().unwrap();
    let output = run_cli(dir.path(), &[], "SCAN\n");
    assert!(output.contains("(empty)"));
}

// ---- Persistence ----

#[test]
fn flush_writes_table_file() {
    let dir = tempdir().unwrap();
    let output = run_cli(dir.path(), &[], "SET a 1\nFLUSH\nGET a\n");
    assert!(output.contains("OK"));
    assert!(output.contains('1'));
    assert_eq!(sst_count(dir.path()), 1);
}

#[test]
fn data_survives_restart() {
    let dir = tempdir().unwrap();
    run_cli(dir.path(), &[], "SET persist_key persist_value\nMERGE persist_key more\n");
    let output = run_cli(dir.path(), &[], "GET persist_key\n");
    assert!(output.contains("persist_value,more"));
}

#[test]
fn small_write_buffer_flushes_automatically() {
    let dir = tempdir().unwrap();
    let mut commands = String::new();
    for i in 0..50 {
        commands.push_str(&format!("SET key{i:03} {}\n", "x".repeat(64)));
    }
    commands.push_str("GET key000\nGET key049\n");
    let output = run_cli(dir.path(), &[("LAYERKV_WRITE_BUFFER_KB", "1")], &commands);
    assert!(output.contains(&"x".repeat(64)));
    assert!(sst_count(dir.path()) >= 2);
}

#[test]
fn compaction_leaves_one_table() {
    let dir = tempdir().unwrap();
    let commands = "SET a 1\nFLUSH\nSET b 2\nFLUSH\nDEL a\nCOMPACT\nGET a\nGET b\n";
    let output = run_cli(dir.path(), &[], commands);
    assert!(output.contains("(nil)"));
    assert!(output.contains('2'));
    assert_eq!(sst_count(dir.path()), 1);
}

// ---- TTL mode and stats ----

#[test]
fn ttl_mode_round_trips_values() {
    let dir = tempdir().unwrap();
    let env = [("LAYERKV_TTL", "3600")];
    let output = run_cli(dir.path(), &env, "SET k hello\nMERGE k world\nGET k\nSCAN\n");
    assert!(output.contains("ttl=3600"));
    assert!(output.contains("hello,world"));
    assert!(output.contains("k -> hello,world"));
}

#[test]
fn stats_prints_sequence_and_counters() {
    let dir = tempdir().unwrap();
    let output = run_cli(dir.path(), &[], "SET a 1\nSET b 2\nSTATS\n");
    assert!(output.contains("seq=2"));
    assert!(output.contains("layerkv.number.keys.written"));
}
