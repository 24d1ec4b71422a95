use jiff::Timestamp;
use marshal_core::{
    models::{PlanRecord, PlanRun, PlanState, TaskTree, RECORD_VERSION},
    Database, PlanError,
};
use tempfile::NamedTempFile;

/// Helper function to create a temporary database for testing
fn create_test_db() -> (NamedTempFile, Database) {
    let temp_file = NamedTempFile::new().expect("Failed to create temporary file");
    let db = Database::new(temp_file.path()).expect("Failed to create test database");
    (temp_file, db)
}

fn record(id: u64, name: &str, state: PlanState) -> PlanRecord {
    let now = Timestamp::now();
    PlanRecord {
        id,
        name: name.to_string(),
        is_system: false,
        state,
        required_privileges: Vec::new(),
        tree: TaskTree::new(),
        runs: Vec::new(),
        created_at: now,
        updated_at: now,
        version: RECORD_VERSION,
    }
}

#[test]
fn test_database_initialization() {
    let (temp_file, db) = create_test_db();
    assert!(temp_file.path().exists());
    assert_eq!(db.count_plans().unwrap(), 0);
    assert_eq!(db.max_plan_id().unwrap(), None);
}

#[test]
fn test_records_survive_reopen() {
    let (temp_file, mut db) = create_test_db();
    let mut plan = record(4, "deploy", PlanState::Error);
    let mut run = PlanRun::start(1);
    run.state = PlanState::Error;
    run.ended_at = Some(Timestamp::now());
    plan.runs.push(run);
    db.save_plan(&plan).unwrap();
    drop(db);

    let db = Database::new(temp_file.path()).unwrap();
    let loaded = db.get_plan(4).unwrap().expect("persisted");
    assert_eq!(loaded, plan);
    assert_eq!(db.max_plan_id().unwrap(), Some(4));
}

#[test]
fn test_newer_schema_is_rejected() {
    let temp_file = NamedTempFile::new().unwrap();
    {
        let conn = rusqlite::Connection::open(temp_file.path()).unwrap();
        conn.pragma_update(None, "user_version", 99).unwrap();
    }

    match Database::new(temp_file.path()) {
        Err(PlanError::Configuration { message }) => assert!(message.contains("99")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("newer schema accepted"),
    }
}

#[test]
fn test_prune_never_removes_live_plans() {
    let (_temp_file, mut db) = create_test_db();
    db.save_plan(&record(1, "a", PlanState::Running)).unwrap();
    db.save_plan(&record(2, "b", PlanState::Approved)).unwrap();
    db.save_plan(&record(3, "c", PlanState::Interrupted)).unwrap();
    db.save_plan(&record(4, "d", PlanState::Canceled)).unwrap();

    assert_eq!(db.prune_terminal(0).unwrap(), 1);
    assert_eq!(db.count_plans().unwrap(), 3);
    assert!(db.get_plan(4).unwrap().is_none());
}

#[test]
fn test_highest_id_survives_pruning_and_reopen() {
    let (temp_file, mut db) = create_test_db();
    db.save_plan(&record(1, "a", PlanState::Running)).unwrap();
    db.save_plan(&record(2, "b", PlanState::Succeeded)).unwrap();

    assert_eq!(db.prune_terminal(1).unwrap(), 1);
    assert!(db.get_plan(2).unwrap().is_none());
    assert_eq!(db.max_plan_id().unwrap(), Some(2));
    drop(db);

    let db = Database::new(temp_file.path()).unwrap();
    assert_eq!(db.max_plan_id().unwrap(), Some(2));
}

#[test]
fn test_older_schema_seeds_id_sequence() {
    let temp_file = NamedTempFile::new().unwrap();
    {
        let mut db = Database::new(temp_file.path()).unwrap();
        db.save_plan(&record(6, "a", PlanState::Succeeded)).unwrap();
    }
    {
        let conn = rusqlite::Connection::open(temp_file.path()).unwrap();
        conn.execute("DROP TABLE plan_sequence", []).unwrap();
        conn.pragma_update(None, "user_version", 1).unwrap();
    }

    let db = Database::new(temp_file.path()).unwrap();
    assert_eq!(db.max_plan_id().unwrap(), Some(6));
    let conn = rusqlite::Connection::open(temp_file.path()).unwrap();
    let high_water: i64 = conn
        .query_row("SELECT high_water FROM plan_sequence WHERE id = 1", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(high_water, 6);
}

#[test]
fn test_corrupt_record_reports_serialization_error() {
    let (temp_file, mut db) = create_test_db();
    db.save_plan(&record(1, "a", PlanState::Approved)).unwrap();
    drop(db);

    {
        let conn = rusqlite::Connection::open(temp_file.path()).unwrap();
        conn.execute("UPDATE plans SET record = '{\"id\": 1}' WHERE id = 1", [])
            .unwrap();
    }

    let db = Database::new(temp_file.path()).unwrap();
    assert!(matches!(
        db.get_plan(1),
        Err(PlanError::Serialization { .. })
    ));
}
