use std::path::Path;

use assert_cmd::Command;
use jiff::Timestamp;
use marshal_core::{
    models::{
        ExceptionTransfer, PlanRecord, PlanRun, PlanState, TaskDescriptor, TaskKindTag, TaskNode,
        TaskPath, TaskTree, RECORD_VERSION,
    },
    CleanupDirective, Database, ErrorCode, TaskFault,
};
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;

/// Helper function to create a Command with --no-color flag for testing
fn marshal_cmd(db_path: &Path) -> Command {
    let mut cmd = Command::cargo_bin("marshal").expect("Failed to find marshal binary");
    cmd.arg("--no-color")
        .arg("--database-file")
        .arg(db_path);
    cmd
}

fn single_task_tree(node: &str) -> TaskTree {
    let mut tree = TaskTree::new();
    let index = tree.push(TaskNode {
        path: TaskPath::root(0),
        kind: TaskKindTag::SingleJob,
        descriptor: TaskDescriptor::new("deploy-sn", json!({ "node": node })),
        continue_past_error: false,
        children: vec![],
    });
    tree.roots.push(index);
    tree
}

fn finished_run(state: PlanState, exception: Option<ExceptionTransfer>) -> PlanRun {
    let mut run = PlanRun::start(1);
    run.state = state;
    run.ended_at = Some(Timestamp::now());
    run.tasks_started = 1;
    run.tasks_ended = 1;
    run.exception = exception;
    run
}

fn record(id: u64, name: &str, state: PlanState, is_system: bool) -> PlanRecord {
    let now = Timestamp::now();
    let exception = (state == PlanState::Error).then(|| {
        let fault = TaskFault::command(
            ErrorCode::COMMAND_FAILURE,
            CleanupDirective::Retry,
            "sn1 unreachable",
        );
        ExceptionTransfer::from_fault(&fault, "task 1 deploy-sn")
    });
    let runs = match state {
        PlanState::Approved => Vec::new(),
        _ => vec![finished_run(state, exception)],
    };
    PlanRecord {
        id,
        name: name.to_string(),
        is_system,
        state,
        required_privileges: Vec::new(),
        tree: single_task_tree("sn1"),
        runs,
        created_at: now,
        updated_at: now,
        version: RECORD_VERSION,
    }
}

/// Seeds a database with a succeeded, a failed, a system and a pending plan.
fn seeded() -> (TempDir, std::path::PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");
    let db_path = temp_dir.path().join("plans.db");
    let mut db = Database::new(&db_path).expect("Failed to create database");
    db.save_plan(&record(1, "deploy-admin", PlanState::Succeeded, false))
        .unwrap();
    db.save_plan(&record(2, "deploy-sn", PlanState::Error, false))
        .unwrap();
    db.save_plan(&record(3, "verify-topology", PlanState::Succeeded, true))
        .unwrap();
    db.save_plan(&record(4, "rebalance", PlanState::Approved, false))
        .unwrap();
    (temp_dir, db_path)
}

#[test]
fn test_cli_list_empty_plans() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("empty.db");

    marshal_cmd(&db_path)
        .args(["plan", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No plans found."));
}

#[test]
fn test_cli_without_command_lists_recent_plans() {
    let (_temp_dir, db_path) = seeded();

    marshal_cmd(&db_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("# Recent plans"))
        .stdout(predicate::str::contains("## 4. rebalance (APPROVED)"))
        .stdout(predicate::str::contains("## 1. deploy-admin (SUCCEEDED)"));
}

#[test]
fn test_cli_list_range() {
    let (_temp_dir, db_path) = seeded();

    marshal_cmd(&db_path)
        .args(["plan", "list", "--start", "2", "--count", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# Plans from 2"))
        .stdout(predicate::str::contains("## 2. deploy-sn (ERROR)"))
        .stdout(predicate::str::contains("## 3. verify-topology"))
        .stdout(predicate::str::contains("rebalance").not());
}

#[test]
fn test_cli_show_plan() {
    let (_temp_dir, db_path) = seeded();

    marshal_cmd(&db_path)
        .args(["plan", "show", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# 2. deploy-sn (ERROR)"))
        .stdout(predicate::str::contains("- 1 deploy-sn {\"node\":\"sn1\"}"))
        .stdout(predicate::str::contains("#### Failure"))
        .stdout(predicate::str::contains("- Message: sn1 unreachable"));
}

#[test]
fn test_cli_show_missing_plan() {
    let (_temp_dir, db_path) = seeded();

    marshal_cmd(&db_path)
        .args(["plan", "show", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Plan with ID 42 not found"));
}

#[test]
fn test_cli_assert_success_and_failure() {
    let (_temp_dir, db_path) = seeded();

    marshal_cmd(&db_path)
        .args(["plan", "assert", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Plan 1 (deploy-admin) succeeded"));

    marshal_cmd(&db_path)
        .args(["plan", "assert", "2"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Plan 2 (deploy-sn) is ERROR"))
        .stderr(predicate::str::contains("Plan 2 did not succeed"))
        .stderr(predicate::str::contains("E5200"));

    marshal_cmd(&db_path)
        .args(["plan", "assert", "4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("plan 4 is APPROVED"));
}

#[test]
fn test_cli_prune_removes_system_plans_first() {
    let (_temp_dir, db_path) = seeded();

    marshal_cmd(&db_path)
        .args(["plan", "prune", "--limit", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pruned 1 plan record(s)"));

    let db = Database::new(&db_path).unwrap();
    assert!(db.get_plan(3).unwrap().is_none());
    assert_eq!(db.count_plans().unwrap(), 3);
}
