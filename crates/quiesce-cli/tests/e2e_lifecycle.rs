//! End-to-end CLI tests.
//!
//! Each test runs `qsc` as a subprocess in its own temp directory with a
//! stub cache dump tool standing in for the vendor binary. The stub pops
//! canned dump files from a per-driver queue, one per invocation, so a
//! test can script how a cache evolves across rounds.

#![cfg(unix)]

use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

/// Stub dump tool: `$1` is the driver, `$2` the dump file path.
const STUB_TOOL: &str = "#!/bin/sh\n\
queue=\"queue/$1\"\n\
next=$(ls \"$queue\" 2>/dev/null | head -n 1)\n\
if [ -z \"$next\" ]; then\n\
  echo \"no canned dump queued for $1\" >&2\n\
  exit 3\n\
fi\n\
cp \"$queue/$next\" \"$2\"\n\
rm \"$queue/$next\"\n";

/// Create a project dir with the stub tool, a work dir, and a config
/// listing `drivers`.
fn setup_project(drivers: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    let tool = tool_path(dir.path());
    fs::write(&tool, STUB_TOOL).unwrap();
    let mut perms = fs::metadata(&tool).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&tool, perms).unwrap();
    fs::create_dir_all(dir.path().join("work")).unwrap();
    write_config(dir.path(), &tool, drivers);
    dir
}

fn tool_path(dir: &Path) -> PathBuf {
    dir.join("dxcmd-stub.sh")
}

fn write_config(dir: &Path, tool: &Path, drivers: &[&str]) {
    let list = drivers
        .iter()
        .map(|d| format!("\"{d}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let config = format!(
        "[provider]\n\
         command = [\"{tool}\", \"{{driver}}\", \"{{file}}\"]\n\
         work_dir = \"work\"\n\
         \n\
         [check]\n\
         drivers = [{list}]\n\
         \n\
         [state]\n\
         path = \"state.json\"\n",
        tool = tool.display(),
    );
    fs::write(dir.join("quiesce.toml"), config).unwrap();
}

/// Queue the next canned dump for a driver. Files pop in `seq` order.
fn queue_dump(dir: &Path, driver: &str, seq: u32, xml: &str) {
    let queue = dir.join("queue").join(driver);
    fs::create_dir_all(&queue).unwrap();
    fs::write(queue.join(format!("{seq:03}.xml")), xml).unwrap();
}

fn qsc_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("qsc"));
    cmd.current_dir(dir);
    cmd.env("QSC_LOG", "error");
    cmd
}

fn state_json(dir: &Path) -> Value {
    let raw = fs::read_to_string(dir.join("state.json")).unwrap();
    serde_json::from_str(&raw).unwrap()
}

fn empty_dump() -> &'static str {
    "<driver-info><subscriber><cache><transactions/></cache></subscriber></driver-info>"
}

fn window_dump(oldest: &str, newest: &str) -> String {
    format!(
        "<driver-info><subscriber><cache><transactions>\
         <oldest>{oldest}</oldest><newest>{newest}</newest>\
         </transactions></cache></subscriber></driver-info>"
    )
}

// ---------------------------------------------------------------------------
// Check rounds
// ---------------------------------------------------------------------------

#[test]
fn first_pass_reports_pending_and_exits_one() {
    let dir = setup_project(&["Active Directory"]);
    queue_dump(dir.path(), "Active Directory", 1, empty_dump());

    qsc_cmd(dir.path())
        .arg("check")
        .assert()
        .code(1)
        .stdout(predicates::str::contains(
            "Active Directory: First Pass. Cache Is Empty",
        ));

    let state = state_json(dir.path());
    assert_eq!(
        state["states"]["Active Directory"]["state"],
        "empty-baseline"
    );
}

#[test]
fn second_empty_round_converges_and_rearms() {
    let dir = setup_project(&["Active Directory"]);
    queue_dump(dir.path(), "Active Directory", 1, empty_dump());
    queue_dump(dir.path(), "Active Directory", 2, empty_dump());

    qsc_cmd(dir.path()).arg("check").assert().code(1);
    qsc_cmd(dir.path())
        .arg("check")
        .assert()
        .success()
        .stdout(predicates::str::contains("converged"));

    // The clean round re-armed the slot for the next transaction.
    let state = state_json(dir.path());
    assert_eq!(state["states"]["Active Directory"]["state"], "no-baseline");
}

#[test]
fn full_drain_lifecycle_across_four_rounds() {
    let dir = setup_project(&["Active Directory"]);
    let d = "Active Directory";
    queue_dump(dir.path(), d, 1, empty_dump());
    queue_dump(dir.path(), d, 2, &window_dump("2000", "2005"));
    queue_dump(dir.path(), d, 3, &window_dump("2003", "2007"));
    queue_dump(dir.path(), d, 4, &window_dump("2006", "2012"));

    qsc_cmd(dir.path())
        .arg("check")
        .assert()
        .code(1)
        .stdout(predicates::str::contains("First Pass. Cache Is Empty"));

    qsc_cmd(dir.path())
        .arg("check")
        .assert()
        .code(1)
        .stdout(predicates::str::contains(
            "Cache Just Set. Event Is Processing",
        ));
    let state = state_json(dir.path());
    assert_eq!(state["states"][d]["watermark"], "2005");

    qsc_cmd(dir.path())
        .arg("check")
        .assert()
        .code(1)
        .stdout(predicates::str::contains(
            "Cache Processing, Event Still Processing",
        ));

    qsc_cmd(dir.path()).arg("check").assert().success();
    let state = state_json(dir.path());
    assert_eq!(state["states"][d]["state"], "no-baseline");
}

#[test]
fn named_drivers_override_config_list() {
    let dir = setup_project(&["Active Directory"]);
    queue_dump(dir.path(), "Custom Driver", 1, empty_dump());

    qsc_cmd(dir.path())
        .args(["check", "Custom Driver"])
        .assert()
        .code(1);

    let state = state_json(dir.path());
    assert_eq!(state["states"]["Custom Driver"]["state"], "empty-baseline");
    assert!(state["states"].get("Active Directory").is_none());
}

#[test]
fn quiet_suppresses_the_success_line() {
    let dir = setup_project(&["edir"]);
    queue_dump(dir.path(), "edir", 1, empty_dump());
    queue_dump(dir.path(), "edir", 2, empty_dump());

    qsc_cmd(dir.path()).arg("check").assert().code(1);
    qsc_cmd(dir.path())
        .args(["check", "-q"])
        .assert()
        .success()
        .stdout(predicates::str::is_empty());
}

#[test]
fn dump_files_are_released_after_each_round() {
    let dir = setup_project(&["Active Directory"]);
    queue_dump(dir.path(), "Active Directory", 1, empty_dump());

    qsc_cmd(dir.path()).arg("check").assert().code(1);

    let leftovers: Vec<_> = fs::read_dir(dir.path().join("work")).unwrap().collect();
    assert!(leftovers.is_empty(), "work dir must be empty: {leftovers:?}");
}

// ---------------------------------------------------------------------------
// JSON contract
// ---------------------------------------------------------------------------

#[test]
fn check_json_reports_pending_entries() {
    let dir = setup_project(&["Active Directory"]);
    queue_dump(dir.path(), "Active Directory", 1, empty_dump());

    let assert = qsc_cmd(dir.path()).args(["check", "--json"]).assert().code(1);
    let value: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();

    assert_eq!(value["converged"], false);
    assert_eq!(value["pending"][0]["driver"], "Active Directory");
    assert_eq!(value["pending"][0]["reason"], "First Pass. Cache Is Empty");
}

#[test]
fn check_json_reports_converged_round() {
    let dir = setup_project(&["edir"]);
    queue_dump(dir.path(), "edir", 1, empty_dump());
    queue_dump(dir.path(), "edir", 2, empty_dump());

    qsc_cmd(dir.path()).arg("check").assert().code(1);
    let assert = qsc_cmd(dir.path())
        .args(["check", "--json"])
        .assert()
        .success();
    let value: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();

    assert_eq!(value["converged"], true);
    assert_eq!(value["pending"], serde_json::json!([]));
}

// ---------------------------------------------------------------------------
// Fatal errors
// ---------------------------------------------------------------------------

#[test]
fn tool_failure_exits_two_with_error_code() {
    let dir = setup_project(&["Active Directory"]);
    // No queue at all: the stub exits 3 with a message on stderr.

    let assert = qsc_cmd(dir.path()).args(["check", "--json"]).assert().code(2);
    let value: Value = serde_json::from_slice(&assert.get_output().stderr).unwrap();

    assert_eq!(value["error"]["error_code"], "E3002");
    assert!(
        value["error"]["message"]
            .as_str()
            .unwrap()
            .contains("no canned dump queued")
    );
    assert!(value["error"]["suggestion"].is_string());
    // A fatal round persists nothing.
    assert!(!dir.path().join("state.json").exists());
}

#[test]
fn tool_failure_human_output_goes_to_stderr() {
    let dir = setup_project(&["Active Directory"]);

    qsc_cmd(dir.path())
        .arg("check")
        .assert()
        .code(2)
        .stderr(predicates::str::contains("error:"))
        .stderr(predicates::str::contains("exited with code 3"));
}

#[test]
fn malformed_dump_exits_two() {
    let dir = setup_project(&["edir"]);
    queue_dump(
        dir.path(),
        "edir",
        1,
        "<driver-info><subscriber><cache><transactions>\
         <newest>2005</newest>\
         </transactions></cache></subscriber></driver-info>",
    );

    let assert = qsc_cmd(dir.path()).args(["check", "--json"]).assert().code(2);
    let value: Value = serde_json::from_slice(&assert.get_output().stderr).unwrap();

    assert_eq!(value["error"]["error_code"], "E3004");
}

#[test]
fn empty_driver_list_is_fatal() {
    let dir = setup_project(&[]);

    qsc_cmd(dir.path())
        .arg("check")
        .assert()
        .code(2)
        .stderr(predicates::str::contains("no drivers to check"));
}

#[test]
fn corrupt_state_file_is_fatal() {
    let dir = setup_project(&["edir"]);
    queue_dump(dir.path(), "edir", 1, empty_dump());
    fs::write(dir.path().join("state.json"), "{ not json").unwrap();

    let assert = qsc_cmd(dir.path()).args(["check", "--json"]).assert().code(2);
    let value: Value = serde_json::from_slice(&assert.get_output().stderr).unwrap();

    assert_eq!(value["error"]["error_code"], "E2002");
}

// ---------------------------------------------------------------------------
// Status and reset
// ---------------------------------------------------------------------------

#[test]
fn status_before_any_check_reports_nothing_tracked() {
    let dir = setup_project(&["edir"]);

    qsc_cmd(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicates::str::contains("no drivers tracked"));
}

#[test]
fn status_shows_baseline_watermark() {
    let dir = setup_project(&["edir"]);
    queue_dump(dir.path(), "edir", 1, empty_dump());
    queue_dump(dir.path(), "edir", 2, &window_dump("2000", "2005"));

    qsc_cmd(dir.path()).arg("check").assert().code(1);
    qsc_cmd(dir.path()).arg("check").assert().code(1);

    qsc_cmd(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicates::str::contains("baseline"))
        .stdout(predicates::str::contains("watermark 2005"));
}

#[test]
fn status_json_lists_slots() {
    let dir = setup_project(&["edir"]);
    queue_dump(dir.path(), "edir", 1, &window_dump("2000", "2005"));

    qsc_cmd(dir.path()).arg("check").assert().code(1);
    let assert = qsc_cmd(dir.path())
        .args(["status", "--json"])
        .assert()
        .success();
    let value: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();

    assert_eq!(value[0]["driver"], "edir");
    assert_eq!(value[0]["state"], "baseline");
    assert_eq!(value[0]["watermark"], "2005");
}

#[test]
fn reset_unmasks_a_sticky_converged_driver() {
    let dir = setup_project(&["Alpha", "Beta"]);
    queue_dump(dir.path(), "Alpha", 1, empty_dump());
    queue_dump(dir.path(), "Alpha", 2, empty_dump());
    queue_dump(dir.path(), "Beta", 1, empty_dump());
    queue_dump(dir.path(), "Beta", 2, &window_dump("2000", "2005"));

    qsc_cmd(dir.path()).arg("check").assert().code(1);
    // Alpha converges but the round stays pending because of Beta, so
    // Alpha's slot is left converged and sticky.
    qsc_cmd(dir.path()).arg("check").assert().code(1);
    let state = state_json(dir.path());
    assert_eq!(state["states"]["Alpha"]["state"], "converged");

    qsc_cmd(dir.path())
        .args(["reset", "Alpha"])
        .assert()
        .success()
        .stdout(predicates::str::contains("reset 1 driver(s)"));

    let state = state_json(dir.path());
    assert_eq!(state["states"]["Alpha"]["state"], "no-baseline");
    // Beta keeps its baseline.
    assert_eq!(state["states"]["Beta"]["state"], "baseline");
}

#[test]
fn reset_all_rearms_every_tracked_driver() {
    let dir = setup_project(&["Alpha", "Beta"]);
    queue_dump(dir.path(), "Alpha", 1, &window_dump("1000", "1005"));
    queue_dump(dir.path(), "Beta", 1, &window_dump("2000", "2005"));

    qsc_cmd(dir.path()).arg("check").assert().code(1);
    let assert = qsc_cmd(dir.path())
        .args(["reset", "--all", "--json"])
        .assert()
        .success();
    let value: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();

    assert_eq!(value["reset"], 2);
    let state = state_json(dir.path());
    assert_eq!(state["states"]["Alpha"]["state"], "no-baseline");
    assert_eq!(state["states"]["Beta"]["state"], "no-baseline");
}

// ---------------------------------------------------------------------------
// Configuration plumbing
// ---------------------------------------------------------------------------

#[test]
fn config_flag_points_at_an_alternate_file() {
    let dir = setup_project(&["edir"]);
    fs::rename(
        dir.path().join("quiesce.toml"),
        dir.path().join("alt.toml"),
    )
    .unwrap();
    queue_dump(dir.path(), "edir", 1, empty_dump());

    // Without the flag there is no config, so no drivers to check.
    qsc_cmd(dir.path()).arg("check").assert().code(2);

    qsc_cmd(dir.path())
        .args(["check", "--config", "alt.toml"])
        .assert()
        .code(1);
}

#[test]
fn qsc_tool_env_overrides_the_executable() {
    let dir = setup_project(&["edir"]);
    let stub = tool_path(dir.path());
    write_config(dir.path(), Path::new("/nonexistent/dxcmd"), &["edir"]);
    queue_dump(dir.path(), "edir", 1, empty_dump());

    // The configured executable is missing, so only the override works.
    qsc_cmd(dir.path()).arg("check").assert().code(2);

    qsc_cmd(dir.path())
        .arg("check")
        .env("QSC_TOOL", &stub)
        .assert()
        .code(1);
}
