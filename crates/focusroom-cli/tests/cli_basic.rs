//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a throwaway data directory and
//! verify outputs.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_focusroom"))
        .args(args)
        .env("FOCUSROOM_DATA_DIR", dir)
        .env_remove("FOCUSROOM_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).unwrap_or_else(|e| panic!("invalid JSON ({e}): {stdout}"))
}

fn add_task(dir: &Path, args: &[&str]) -> serde_json::Value {
    let mut full = vec!["task", "add"];
    full.extend_from_slice(args);
    let (code, stdout, stderr) = run_cli(dir, &full);
    assert_eq!(code, 0, "task add failed: {stderr}");
    assert!(stderr.contains("Task created:"));
    json(&stdout)
}

#[test]
fn test_task_add_generates_intervals() {
    let dir = TempDir::new().unwrap();
    let task = add_task(dir.path(), &["Write report", "--estimate", "60"]);

    assert_eq!(task["status"], "pending");
    // 60 / 25 rounds up to three focus intervals with breaks between.
    assert_eq!(task["progress"]["total_sessions"], 3);
    assert_eq!(task["intervals"].as_array().unwrap().len(), 5);
    assert_eq!(task["completion_pct"], 0.0);
}

#[test]
fn test_task_add_rejects_zero_estimate() {
    let dir = TempDir::new().unwrap();
    let (code, _, stderr) = run_cli(dir.path(), &["task", "add", "Nothing", "--estimate", "0"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_task_list_and_filter() {
    let dir = TempDir::new().unwrap();
    add_task(dir.path(), &["One", "-e", "25"]);
    let second = add_task(dir.path(), &["Two", "-e", "25"]);
    let id = second["id"].as_str().unwrap();

    let (code, _, _) = run_cli(dir.path(), &["task", "end-early", id]);
    assert_eq!(code, 0);

    let (code, stdout, _) = run_cli(dir.path(), &["task", "list"]);
    assert_eq!(code, 0);
    assert_eq!(json(&stdout).as_array().unwrap().len(), 2);

    let (_, stdout, _) = run_cli(dir.path(), &["task", "list", "--status", "completed"]);
    let completed = json(&stdout);
    assert_eq!(completed.as_array().unwrap().len(), 1);
    assert_eq!(completed[0]["id"], id);
}

#[test]
fn test_end_early_then_unmark() {
    let dir = TempDir::new().unwrap();
    let task = add_task(dir.path(), &["Refactor", "-e", "50"]);
    let id = task["id"].as_str().unwrap();

    let (code, stdout, _) = run_cli(dir.path(), &["task", "end-early", id]);
    assert_eq!(code, 0);
    let ended = json(&stdout);
    assert_eq!(ended["status"], "completed");
    assert!(ended["early_end"].is_object());

    // A second end-early is refused.
    let (code, _, _) = run_cli(dir.path(), &["task", "end-early", id]);
    assert_ne!(code, 0);

    let (code, stdout, _) = run_cli(dir.path(), &["task", "unmark", id]);
    assert_eq!(code, 0);
    assert_eq!(json(&stdout)["status"], "partial");
}

#[test]
fn test_task_edit_retimes() {
    let dir = TempDir::new().unwrap();
    let task = add_task(dir.path(), &["Reading", "-e", "50"]);
    let id = task["id"].as_str().unwrap();

    let (code, stdout, stderr) =
        run_cli(dir.path(), &["task", "edit", id, "--focus", "10", "--break", "2"]);
    assert_eq!(code, 0, "edit failed: {stderr}");
    let edited = json(&stdout);
    assert_eq!(edited["progress"]["total_sessions"], 5);
    assert_eq!(edited["lengths"]["focus_min"], 10);
}

#[test]
fn test_task_show_and_delete() {
    let dir = TempDir::new().unwrap();
    let task = add_task(dir.path(), &["Temporary", "-e", "25"]);
    let id = task["id"].as_str().unwrap();

    let (code, stdout, _) = run_cli(dir.path(), &["task", "show", id]);
    assert_eq!(code, 0);
    assert_eq!(json(&stdout)["name"], "Temporary");

    let (code, _, stderr) = run_cli(dir.path(), &["task", "delete", id]);
    assert_eq!(code, 0);
    assert!(stderr.contains("Task deleted:"));

    let (code, _, stderr) = run_cli(dir.path(), &["task", "show", id]);
    assert_ne!(code, 0);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_timer_status() {
    let dir = TempDir::new().unwrap();
    let task = add_task(dir.path(), &["Deep work", "-e", "30", "--start-with-break"]);
    let id = task["id"].as_str().unwrap();

    let (code, stdout, _) = run_cli(dir.path(), &["timer", "status", id]);
    assert_eq!(code, 0);
    let status = json(&stdout);
    assert_eq!(status["interval_index"], 0);
    assert_eq!(status["interval_type"], "break");
    assert_eq!(status["resume_secs"], 300);
}

#[test]
fn test_missed_check() {
    let dir = TempDir::new().unwrap();
    let late = add_task(
        dir.path(),
        &["Standup", "-e", "25", "--start-date", "2026-01-05", "--start-time", "09:00"],
    );
    add_task(
        dir.path(),
        &["Later", "-e", "25", "--start-date", "2026-01-05", "--start-time", "17:00"],
    );

    let (code, stdout, stderr) =
        run_cli(dir.path(), &["missed", "check", "--at", "2026-01-05T12:00:00"]);
    assert_eq!(code, 0);
    assert!(stderr.contains("1 task(s) missed"));
    let line: serde_json::Value = serde_json::from_str(stdout.lines().next().unwrap()).unwrap();
    assert_eq!(line["type"], "TaskMissed");
    assert_eq!(line["task_id"], late["id"]);

    let (_, stdout, _) = run_cli(dir.path(), &["task", "list", "--status", "missed"]);
    assert_eq!(json(&stdout).as_array().unwrap().len(), 1);
}

#[test]
fn test_recurring_expand_is_idempotent() {
    let dir = TempDir::new().unwrap();
    add_task(dir.path(), &["Exercise", "-e", "25", "--repeat", "mon,wed,fri"]);

    // 2026-03-02 is a Monday; the week ahead has Mon, Wed and Fri.
    let (code, stdout, _) =
        run_cli(dir.path(), &["recurring", "expand", "--today", "2026-03-02"]);
    assert_eq!(code, 0);
    assert_eq!(json(&stdout).as_array().unwrap().len(), 3);

    let (_, stdout, _) = run_cli(dir.path(), &["recurring", "expand", "--today", "2026-03-02"]);
    assert!(json(&stdout).as_array().unwrap().is_empty());

    let (_, stdout, _) = run_cli(dir.path(), &["recurring", "templates"]);
    assert_eq!(json(&stdout).as_array().unwrap().len(), 1);
}

#[test]
fn test_priority_suggest() {
    let dir = TempDir::new().unwrap();
    let low = add_task(dir.path(), &["Inbox zero", "-e", "25", "-p", "low"]);
    let high = add_task(dir.path(), &["Incident review", "-e", "25", "-p", "high"]);

    let (code, stdout, _) =
        run_cli(dir.path(), &["priority", "suggest", low["id"].as_str().unwrap()]);
    assert_eq!(code, 0);
    assert_eq!(json(&stdout)["id"], high["id"]);

    let (_, stdout, _) =
        run_cli(dir.path(), &["priority", "suggest", high["id"].as_str().unwrap()]);
    assert_eq!(stdout.trim(), "null");
}

#[test]
fn test_config_get_set() {
    let dir = TempDir::new().unwrap();

    let (code, stdout, _) = run_cli(dir.path(), &["config", "get", "timer.focus_minutes"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "25");

    let (code, _, _) = run_cli(dir.path(), &["config", "set", "timer.focus_minutes", "40"]);
    assert_eq!(code, 0);
    let (_, stdout, _) = run_cli(dir.path(), &["config", "get", "timer.focus_minutes"]);
    assert_eq!(stdout.trim(), "40");

    // New tasks pick up the configured length.
    let task = add_task(dir.path(), &["Configured", "-e", "80"]);
    assert_eq!(task["lengths"]["focus_min"], 40);
    assert_eq!(task["progress"]["total_sessions"], 2);
}

#[test]
fn test_config_rejects_bad_values() {
    let dir = TempDir::new().unwrap();

    let (code, _, _) = run_cli(dir.path(), &["config", "set", "timer.focus_minutes", "0"]);
    assert_ne!(code, 0);
    let (code, _, _) = run_cli(dir.path(), &["config", "set", "timer.nope", "1"]);
    assert_ne!(code, 0);
    let (code, _, _) = run_cli(dir.path(), &["config", "set", "timer.auto_advance", "maybe"]);
    assert_ne!(code, 0);
}

#[test]
fn test_config_list_and_reset() {
    let dir = TempDir::new().unwrap();
    run_cli(dir.path(), &["config", "set", "timer.break_minutes", "10"]);

    let (code, stdout, _) = run_cli(dir.path(), &["config", "list"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("timer.break_minutes = 10"));

    let (code, _, _) = run_cli(dir.path(), &["config", "reset"]);
    assert_eq!(code, 0);
    let (_, stdout, _) = run_cli(dir.path(), &["config", "list", "--json"]);
    assert_eq!(json(&stdout)["timer"]["break_minutes"], 5);
}

#[test]
fn test_completions() {
    let dir = TempDir::new().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["completions", "bash"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("focusroom"));
}
