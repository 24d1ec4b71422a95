use jiff::Timestamp;
use serde_json::json;

use crate::{
    display::{LocalDateTime, PlanRecords},
    error::TaskFault,
    models::{
        CleanupDirective, ErrorCode, ExceptionTransfer, PlanRecord, PlanRun, PlanState,
        Privilege, TaskDescriptor, TaskKindTag, TaskNode, TaskPath, TaskRun, TaskState, TaskTree,
        RECORD_VERSION,
    },
};

fn at(second: i64) -> Timestamp {
    Timestamp::from_second(second).unwrap()
}

/// `1: parallel(deploy sn1, deploy sn2)`, `2: verify`
fn sample_tree() -> TaskTree {
    let mut tree = TaskTree::new();
    let sn1 = tree.push(TaskNode {
        path: TaskPath::root(0).child(0),
        kind: TaskKindTag::SingleJob,
        descriptor: TaskDescriptor::new("deploy-sn", json!({ "node": "sn1" })),
        continue_past_error: false,
        children: vec![],
    });
    let sn2 = tree.push(TaskNode {
        path: TaskPath::root(0).child(1),
        kind: TaskKindTag::SingleJob,
        descriptor: TaskDescriptor::new("deploy-sn", json!({ "node": "sn2" })),
        continue_past_error: false,
        children: vec![],
    });
    let bundle = tree.push(TaskNode {
        path: TaskPath::root(0),
        kind: TaskKindTag::Parallel,
        descriptor: TaskDescriptor::named("parallel"),
        continue_past_error: false,
        children: vec![sn1, sn2],
    });
    let verify = tree.push(TaskNode {
        path: TaskPath::root(1),
        kind: TaskKindTag::MultiJob,
        descriptor: TaskDescriptor::named("verify"),
        continue_past_error: true,
        children: vec![],
    });
    tree.roots = vec![bundle, verify];
    tree
}

fn failed_run() -> PlanRun {
    let fault = TaskFault::command(
        ErrorCode::COMMAND_FAILURE,
        CleanupDirective::Retry,
        "sn2 unreachable",
    );
    PlanRun {
        attempt: 1,
        started_at: at(1_640_995_200),
        ended_at: Some(at(1_640_995_265)),
        state: PlanState::Error,
        tasks_started: 2,
        tasks_ended: 2,
        task_runs: vec![
            TaskRun {
                path: TaskPath(vec![0, 0]),
                name: "deploy-sn".to_string(),
                state: TaskState::Succeeded,
                started_at: at(1_640_995_200),
                ended_at: Some(at(1_640_995_203)),
                failure: None,
                cleaned_up: false,
            },
            TaskRun {
                path: TaskPath(vec![0, 1]),
                name: "deploy-sn".to_string(),
                state: TaskState::Error,
                started_at: at(1_640_995_200),
                ended_at: Some(at(1_640_995_265)),
                failure: Some("sn2 unreachable".to_string()),
                cleaned_up: true,
            },
        ],
        exception: Some(ExceptionTransfer::from_fault(&fault, "task 1.2 deploy-sn")),
    }
}

fn sample_record() -> PlanRecord {
    PlanRecord {
        id: 42,
        name: "deploy-topology".to_string(),
        is_system: false,
        state: PlanState::Error,
        required_privileges: vec![Privilege::SysOper],
        tree: sample_tree(),
        runs: vec![failed_run()],
        created_at: at(1_640_995_100),
        updated_at: at(1_640_995_265),
        version: RECORD_VERSION,
    }
}

#[test]
fn test_plan_state_predicates() {
    let executable: Vec<_> = PlanState::ALL
        .iter()
        .filter(|s| s.can_execute())
        .copied()
        .collect();
    assert_eq!(
        executable,
        vec![PlanState::Approved, PlanState::Interrupted, PlanState::Error]
    );

    assert!(PlanState::Error.is_terminal());
    assert!(!PlanState::Error.is_final());
    assert!(!PlanState::Interrupted.is_terminal());
    assert!(PlanState::Canceled.is_final());
    assert!(!PlanState::Running.ends_attempt());
    assert!(PlanState::Interrupted.ends_attempt());
}

#[test]
fn test_states_parse_from_strings() {
    assert_eq!("running".parse::<PlanState>(), Ok(PlanState::Running));
    assert_eq!("CANCELLED".parse::<PlanState>(), Ok(PlanState::Canceled));
    assert!("pending".parse::<PlanState>().is_err());
    assert_eq!("error".parse::<TaskState>(), Ok(TaskState::Error));
    assert_eq!("sysview".parse::<Privilege>(), Ok(Privilege::SysView));
}

#[test]
fn test_record_json_uses_wire_names() {
    let value = serde_json::to_value(sample_record()).unwrap();
    assert_eq!(value["state"], "ERROR");
    assert_eq!(value["required_privileges"], json!(["SYSOPER"]));
    assert_eq!(value["runs"][0]["exception"]["error_code"], 5200);
    assert_eq!(value["runs"][0]["exception"]["cleanup"], "retry");
    assert_eq!(value["tree"]["nodes"][2]["kind"], "parallel");

    let back: PlanRecord = serde_json::from_value(value).unwrap();
    assert_eq!(back, sample_record());
}

#[test]
fn test_record_defaults_for_older_json() {
    let raw = json!({
        "id": 3,
        "name": "noop",
        "state": "APPROVED",
        "tree": { "nodes": [], "roots": [] },
        "created_at": "2022-01-01T00:00:00Z",
        "updated_at": "2022-01-01T00:00:00Z"
    });
    let record: PlanRecord = serde_json::from_value(raw).unwrap();
    assert!(!record.is_system);
    assert!(record.runs.is_empty());
    assert!(record.required_privileges.is_empty());
    assert_eq!(record.version, RECORD_VERSION);
    assert!(record.latest_exception().is_none());
}

#[test]
fn test_exception_command_result() {
    let record = sample_record();
    let result = record.latest_exception().unwrap().command_result();
    assert_eq!(result.error_code, ErrorCode::COMMAND_FAILURE);
    assert_eq!(result.cleanup, CleanupDirective::Retry);
    assert_eq!(
        result.description,
        "CommandFault: sn2 unreachable (task 1.2 deploy-sn)"
    );
    assert_eq!(
        result.to_string(),
        "[E5200] CommandFault: sn2 unreachable (task 1.2 deploy-sn); retry the command"
    );
}

#[test]
fn test_plan_record_display() {
    let record = sample_record();
    let output = record.to_string();

    assert!(output.starts_with("# 42. deploy-topology (ERROR)\n"));
    assert!(output.contains("- Privileges: SYSOPER"));
    assert!(output.contains(&format!(
        "- Created: {}",
        LocalDateTime(&record.created_at)
    )));
    assert!(output.contains("- Attempts: 1"));

    assert!(output.contains("## Tasks"));
    assert!(output.contains("- 1 parallel (2 tasks)"));
    assert!(output.contains("  - 1.1 deploy-sn {\"node\":\"sn1\"} (✓ SUCCEEDED)"));
    assert!(output.contains("  - 1.2 deploy-sn {\"node\":\"sn2\"} (✗ ERROR)"));
    assert!(output.contains("- 2 verify\n"));

    assert!(output.contains("### Attempt 1 (ERROR)"));
    assert!(output.contains("- Duration: 1m 05s"));
    assert!(output.contains("- Tasks: 2 started, 2 ended"));
    assert!(output.contains("#### Failure"));
    assert!(output.contains("- Where: task 1.2 deploy-sn"));
    assert!(output.contains("- Cleanup: retry the command"));
    assert!(!output.contains("System plan"));
}

#[test]
fn test_plan_record_display_without_runs() {
    let mut record = sample_record();
    record.runs.clear();
    record.tree = TaskTree::new();
    record.is_system = true;
    record.state = PlanState::Approved;

    let output = record.to_string();
    assert!(output.contains("- System plan: yes"));
    assert!(output.contains("No tasks in this plan."));
    assert!(!output.contains("Latest attempt"));
}

#[test]
fn test_task_run_display() {
    let run = failed_run();
    assert_eq!(
        run.task_runs[0].to_string(),
        "1.1 deploy-sn (✓ SUCCEEDED) in 3s"
    );
    assert_eq!(
        run.task_runs[1].to_string(),
        "1.2 deploy-sn (✗ ERROR) in 1m 05s: sn2 unreachable [cleaned up]"
    );
    assert_eq!(run.count_in_state(TaskState::Error), 1);
}

#[test]
fn test_plan_records_display() {
    assert_eq!(PlanRecords(vec![]).to_string(), "No plans found.\n");

    let mut second = sample_record();
    second.id = 43;
    second.state = PlanState::Succeeded;
    second.runs[0].exception = None;

    let records = PlanRecords(vec![sample_record(), second]);
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].id, 43);

    let output = records.to_string();
    assert!(output.contains("## 42. deploy-topology (ERROR)"));
    assert!(output.contains("## 43. deploy-topology (SUCCEEDED)"));
    assert!(output.contains("- **Tasks**: 3"));
    assert_eq!(output.matches("- **Failure**:").count(), 1);
}
