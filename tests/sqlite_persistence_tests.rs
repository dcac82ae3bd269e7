#![cfg(feature = "sqlite")]

use chrono::{DateTime, TimeZone, Utc, Weekday};
use taskflow::persistence::sqlite::{BUSINESS_HOURS_KEY, TASKS_KEY, USERS_KEY};
use taskflow::{
    DaySchedule, PersistenceError, Role, SqliteWorkspaceStore, Workspace, WorkspaceStore,
};
use tempfile::NamedTempFile;

const ADMIN: &str = "admin-1";

fn at(d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, d, h, 0, 0).unwrap()
}

#[test]
fn sqlite_store_round_trip_workspace() {
    let file = NamedTempFile::new().unwrap();
    let store = SqliteWorkspaceStore::new(file.path()).unwrap();

    let mut ws = Workspace::new();
    ws.add_user(ADMIN, "Alice", "alice", "pw", Role::User)
        .unwrap();
    ws.create_task(ADMIN, "Design", "", "1", 5.0, at(6, 8))
        .expect("insert task 1");
    ws.create_task(ADMIN, "Build", "", "1", 10.0, at(6, 8))
        .expect("insert task 2");
    ws.accept_task("1", "1", at(6, 9)).unwrap();
    ws.add_note("1", "1", "wireframes", at(6, 11)).unwrap();

    let mut schedule = ws.business_hours().clone();
    schedule.set_day(Weekday::Fri, DaySchedule::open("08:00".parse().unwrap(), "12:00".parse().unwrap()));
    ws.set_business_hours(ADMIN, schedule).unwrap();
    ws.set_sync_url("https://example.com/team.json");

    store.save_workspace(&ws).expect("save workspace");

    // A second handle on the same file sees the committed data
    let reopened = SqliteWorkspaceStore::new(file.path()).unwrap();
    let loaded = reopened
        .load_workspace()
        .expect("load workspace")
        .expect("workspace exists");
    assert_eq!(loaded, ws);
    assert_eq!(loaded.business_hours().day(Weekday::Fri).nominal_hours(), 4.0);
    assert_eq!(loaded.find_task("1").unwrap().notes.len(), 1);
}

#[test]
fn empty_store_has_no_workspace() {
    let store = SqliteWorkspaceStore::in_memory().unwrap();
    assert!(store.load_workspace().unwrap().is_none());
}

#[test]
fn saving_overwrites_previous_blobs() {
    let store = SqliteWorkspaceStore::in_memory().unwrap();
    let mut ws = Workspace::new();
    ws.add_user(ADMIN, "Alice", "alice", "pw", Role::User)
        .unwrap();
    ws.create_task(ADMIN, "Temp", "", "1", 1.0, at(6, 8)).unwrap();
    store.save_workspace(&ws).unwrap();

    ws.delete_task(ADMIN, "1").unwrap();
    store.save_workspace(&ws).unwrap();

    assert_eq!(store.get_value(TASKS_KEY).unwrap().as_deref(), Some("[]"));
    let loaded = store.load_workspace().unwrap().unwrap();
    assert!(loaded.tasks().is_empty());
}

#[test]
fn blobs_use_the_snapshot_json_layout() {
    let store = SqliteWorkspaceStore::in_memory().unwrap();
    let mut ws = Workspace::new();
    ws.add_user(ADMIN, "Alice", "alice", "pw", Role::User)
        .unwrap();
    ws.create_task(ADMIN, "Design", "", "1", 2.0, at(6, 8)).unwrap();
    store.save_workspace(&ws).unwrap();

    let tasks: serde_json::Value =
        serde_json::from_str(&store.get_value(TASKS_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(tasks[0]["assignedTo"], "1");
    assert_eq!(tasks[0]["createdAt"], at(6, 8).timestamp_millis());

    let hours: serde_json::Value =
        serde_json::from_str(&store.get_value(BUSINESS_HOURS_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(hours["1"]["start"], "09:00");
}

#[test]
fn only_users_blob_loads_with_defaults() {
    let store = SqliteWorkspaceStore::in_memory().unwrap();
    store
        .set_value(
            USERS_KEY,
            r#"[{"id":"admin-1","name":"Administrator","username":"admin","password":"admin","role":"admin"}]"#,
        )
        .unwrap();
    let ws = store.load_workspace().unwrap().unwrap();
    assert_eq!(ws.users().len(), 1);
    assert!(ws.tasks().is_empty());
    assert_eq!(ws.business_hours().weekly_hours(), 40.0);
}

#[test]
fn corrupt_blob_is_reported() {
    let store = SqliteWorkspaceStore::in_memory().unwrap();
    store.set_value(TASKS_KEY, "not json").unwrap();
    assert!(matches!(
        store.load_workspace(),
        Err(PersistenceError::Serialization(_))
    ));
}
