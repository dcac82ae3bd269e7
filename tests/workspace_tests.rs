use chrono::{DateTime, TimeZone, Utc, Weekday};
use taskflow::{
    DaySchedule, EfficiencyTier, Role, Task, TaskStatus, TaskUpdate, WeeklySchedule, Workspace,
    WorkspaceError,
};

const ADMIN: &str = "admin-1";

fn at(d: u32, h: u32) -> DateTime<Utc> {
    // January 2025; the 6th is a Monday
    Utc.with_ymd_and_hms(2025, 1, d, h, 0, 0).unwrap()
}

/// Admin plus Alice (id "1") and Bob (id "2").
fn team() -> Workspace {
    let mut ws = Workspace::new();
    ws.add_user(ADMIN, "Alice", "alice", "a-pass", Role::User)
        .unwrap();
    ws.add_user(ADMIN, "Bob", "bob", "b-pass", Role::User).unwrap();
    ws
}

fn finish(ws: &mut Workspace, user: &str, task_id: &str, accepted: DateTime<Utc>, done: DateTime<Utc>) {
    ws.accept_task(user, task_id, accepted).unwrap();
    ws.add_note(user, task_id, "progress", accepted).unwrap();
    ws.complete_task(user, task_id, done).unwrap();
}

#[test]
fn new_workspace_has_default_admin() {
    let ws = Workspace::new();
    assert_eq!(ws.users().len(), 1);
    let admin = ws.authenticate("admin", "admin").unwrap();
    assert_eq!(admin.id, ADMIN);
    assert!(admin.is_admin());
    assert_eq!(
        ws.authenticate("admin", "nope").unwrap_err(),
        WorkspaceError::InvalidCredentials
    );
    assert_eq!(ws.business_hours(), &WeeklySchedule::default());
}

#[test]
fn users_get_sequential_ids_and_unique_usernames() {
    let mut ws = team();
    assert_eq!(ws.find_user_by_username("alice").unwrap().id, "1");
    assert_eq!(ws.find_user_by_username("bob").unwrap().id, "2");
    assert_eq!(ws.members().count(), 2);

    let err = ws
        .add_user(ADMIN, "Other Alice", "alice", "x", Role::User)
        .unwrap_err();
    assert_eq!(err, WorkspaceError::DuplicateUsername("alice".into()));
    assert_eq!(
        ws.add_user(ADMIN, "", "  ", "x", Role::User).unwrap_err(),
        WorkspaceError::EmptyUsername
    );

    let carol = ws.add_user(ADMIN, "", "carol", "c", Role::Admin).unwrap();
    assert_eq!(carol.id, "3");
    assert_eq!(carol.name, "carol");
}

#[test]
fn members_cannot_administer() {
    let mut ws = team();
    assert!(matches!(
        ws.add_user("1", "Eve", "eve", "x", Role::Admin),
        Err(WorkspaceError::Forbidden { .. })
    ));
    assert!(matches!(
        ws.create_task("1", "Sneaky", "", "1", 1.0, at(6, 9)),
        Err(WorkspaceError::Forbidden { .. })
    ));
    assert!(matches!(
        ws.set_business_hours("1", WeeklySchedule::default()),
        Err(WorkspaceError::Forbidden { .. })
    ));
    assert!(matches!(
        ws.create_task("ghost", "Task", "", "1", 1.0, at(6, 9)),
        Err(WorkspaceError::UserNotFound(_))
    ));
}

#[test]
fn task_creation_is_validated() {
    let mut ws = team();
    assert_eq!(
        ws.create_task(ADMIN, "  ", "", "1", 1.0, at(6, 9)).unwrap_err(),
        WorkspaceError::EmptyTitle
    );
    assert_eq!(
        ws.create_task(ADMIN, "Task", "", "1", 0.0, at(6, 9)).unwrap_err(),
        WorkspaceError::InvalidEstimate(0.0)
    );
    assert_eq!(
        ws.create_task(ADMIN, "Task", "", ADMIN, 1.0, at(6, 9)).unwrap_err(),
        WorkspaceError::InvalidAssignee(ADMIN.into())
    );
    assert_eq!(
        ws.create_task(ADMIN, "Task", "", "99", 1.0, at(6, 9)).unwrap_err(),
        WorkspaceError::InvalidAssignee("99".into())
    );

    let task = ws
        .create_task(ADMIN, " Report ", " quarterly ", "1", 6.5, at(6, 9))
        .unwrap();
    assert_eq!(task.id, "1");
    assert_eq!(task.title, "Report");
    assert_eq!(task.description, "quarterly");
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.created_at, at(6, 9));
}

#[test]
fn members_only_see_their_own_tasks() {
    let mut ws = team();
    ws.create_task(ADMIN, "For Alice", "", "1", 2.0, at(6, 9)).unwrap();
    ws.create_task(ADMIN, "For Bob", "", "2", 2.0, at(6, 9)).unwrap();

    let alice: Vec<&str> = ws
        .visible_tasks("1")
        .unwrap()
        .iter()
        .map(|t| t.title.as_str())
        .collect();
    assert_eq!(alice, vec!["For Alice"]);
    assert_eq!(ws.visible_tasks(ADMIN).unwrap().len(), 2);
    assert_eq!(ws.status_counts(ADMIN).unwrap().pending, 2);
    assert_eq!(ws.status_counts("2").unwrap().total(), 1);
}

#[test]
fn lifecycle_runs_pending_accepted_completed() {
    let mut ws = team();
    ws.create_task(ADMIN, "Build", "", "1", 8.0, at(6, 8)).unwrap();

    assert!(matches!(
        ws.accept_task("2", "1", at(6, 9)),
        Err(WorkspaceError::Forbidden { .. })
    ));
    assert!(matches!(
        ws.complete_task("1", "1", at(6, 9)),
        Err(WorkspaceError::InvalidTransition {
            from: TaskStatus::Pending,
            to: TaskStatus::Completed,
            ..
        })
    ));

    let accepted = ws.accept_task("1", "1", at(6, 9)).unwrap();
    assert_eq!(accepted.status, TaskStatus::Accepted);
    assert_eq!(accepted.accepted_at, Some(at(6, 9)));
    assert!(matches!(
        ws.accept_task("1", "1", at(6, 10)),
        Err(WorkspaceError::InvalidTransition { .. })
    ));

    assert_eq!(
        ws.complete_task("1", "1", at(6, 17)).unwrap_err(),
        WorkspaceError::NoteRequired("1".into())
    );
    assert_eq!(
        ws.add_note("1", "1", "   ", at(6, 12)).unwrap_err(),
        WorkspaceError::EmptyNote
    );
    assert!(matches!(
        ws.add_note("2", "1", "not mine", at(6, 12)),
        Err(WorkspaceError::Forbidden { .. })
    ));
    let note = ws.add_note("1", "1", "halfway", at(6, 12)).unwrap();
    assert_eq!(note.id, "1");
    let second = ws.add_note(ADMIN, "1", "keep going", at(6, 13)).unwrap();
    assert_eq!(second.id, "2");

    let done = ws.complete_task("1", "1", at(6, 17)).unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.completed_at, Some(at(6, 17)));
    assert_eq!(ws.task_working_hours_in(&done, &Utc), Some(8.0));
    assert!(matches!(
        ws.complete_task("1", "1", at(6, 18)),
        Err(WorkspaceError::InvalidTransition { .. })
    ));
}

#[test]
fn admin_edits_and_deletes_tasks() {
    let mut ws = team();
    ws.create_task(ADMIN, "Draft", "", "1", 3.0, at(6, 9)).unwrap();

    let updated = ws
        .update_task(
            ADMIN,
            "1",
            TaskUpdate {
                title: Some("Final".into()),
                assigned_to: Some("2".into()),
                estimated_hours: Some(5.0),
                ..TaskUpdate::default()
            },
        )
        .unwrap();
    assert_eq!(updated.title, "Final");
    assert_eq!(updated.assigned_to, "2");
    assert_eq!(updated.estimated_hours, 5.0);

    assert_eq!(
        ws.update_task(
            ADMIN,
            "1",
            TaskUpdate {
                estimated_hours: Some(-1.0),
                ..TaskUpdate::default()
            }
        )
        .unwrap_err(),
        WorkspaceError::InvalidEstimate(-1.0)
    );
    assert!(matches!(
        ws.delete_task("2", "1"),
        Err(WorkspaceError::Forbidden { .. })
    ));

    let removed = ws.delete_task(ADMIN, "1").unwrap();
    assert_eq!(removed.title, "Final");
    assert!(ws.tasks().is_empty());
    assert_eq!(
        ws.delete_task(ADMIN, "1").unwrap_err(),
        WorkspaceError::TaskNotFound("1".into())
    );
}

#[test]
fn efficiency_report_sums_completed_work_per_member() {
    let mut ws = team();
    ws.create_task(ADMIN, "A1", "", "1", 8.0, at(6, 8)).unwrap();
    ws.create_task(ADMIN, "A2", "", "1", 4.0, at(6, 8)).unwrap();
    ws.create_task(ADMIN, "B1", "", "2", 6.0, at(6, 8)).unwrap();

    // Alice: 8h estimate over Monday 9-17, 4h estimate over Tuesday 9-11
    finish(&mut ws, "1", "1", at(6, 9), at(6, 17));
    finish(&mut ws, "1", "2", at(7, 9), at(7, 11));
    // Bob has started but not finished
    ws.accept_task("2", "3", at(6, 9)).unwrap();

    let report = ws.efficiency_report_in(&Utc);
    assert_eq!(report.len(), 2, "admins are not part of the report");

    let alice = &report[0];
    assert_eq!(alice.user_id, "1");
    assert_eq!(alice.completed_tasks, 2);
    assert_eq!(alice.estimated_hours, 12.0);
    assert_eq!(alice.actual_hours, 10.0);
    assert_eq!(alice.efficiency, 120);
    assert_eq!(alice.tier, EfficiencyTier::AheadOfEstimate);

    let bob = &report[1];
    assert_eq!(bob.user_id, "2");
    assert_eq!(bob.completed_tasks, 0);
    assert_eq!(bob.efficiency, 0);
    assert_eq!(bob.tier, EfficiencyTier::BehindEstimate);
}

#[test]
fn completed_records_missing_an_instant_are_skipped() {
    let mut ws = team();
    let mut legacy = Task::new("7", "Imported", "1", 5.0, at(6, 8));
    legacy.status = TaskStatus::Completed;
    legacy.completed_at = Some(at(6, 17));
    let users = ws.users().to_vec();
    ws.replace_data(users, vec![legacy], None).unwrap();

    let effort = ws.member_effort_in("1", &Utc);
    assert_eq!(effort.task_count, 0);
    assert_eq!(effort.score(), 0);
}

#[test]
fn business_hours_change_affects_actual_hours() {
    let mut ws = team();
    ws.create_task(ADMIN, "Weekend job", "", "1", 4.0, at(10, 8)).unwrap();
    // Friday 16:00 to Monday 10:00
    finish(&mut ws, "1", "1", at(10, 16), at(13, 10));
    let task = ws.find_task("1").unwrap().clone();
    assert_eq!(ws.task_working_hours_in(&task, &Utc), Some(2.0));

    let mut schedule = ws.business_hours().clone();
    schedule.set_day(
        Weekday::Sat,
        DaySchedule::open("10:00".parse().unwrap(), "14:00".parse().unwrap()),
    );
    ws.set_business_hours(ADMIN, schedule).unwrap();
    assert_eq!(ws.task_working_hours_in(&task, &Utc), Some(6.0));
    assert_eq!(ws.efficiency_report_in(&Utc)[0].efficiency, 67);
}

#[test]
fn inverted_business_hours_are_refused() {
    let mut ws = team();
    let mut schedule = WeeklySchedule::default();
    schedule.set_day(
        Weekday::Mon,
        DaySchedule::open("17:00".parse().unwrap(), "09:00".parse().unwrap()),
    );
    assert!(matches!(
        ws.set_business_hours(ADMIN, schedule.clone()),
        Err(WorkspaceError::InvalidSchedule(_))
    ));
    assert!(ws.replace_data(Vec::new(), Vec::new(), Some(schedule)).is_err());
    assert_eq!(ws.business_hours(), &WeeklySchedule::default());
}

#[test]
fn replacing_with_no_users_reseeds_admin() {
    let mut ws = team();
    ws.replace_data(Vec::new(), Vec::new(), None).unwrap();
    assert_eq!(ws.users().len(), 1);
    assert_eq!(ws.users()[0].id, ADMIN);
}

#[test]
fn ids_stay_unique_after_the_numeric_range_is_exhausted() {
    let mut ws = team();
    let last = Task::new(u64::MAX.to_string(), "Edge", "1", 1.0, at(6, 8));
    let users = ws.users().to_vec();
    ws.replace_data(users, vec![last], None).unwrap();

    let first = ws.create_task(ADMIN, "Next", "", "1", 1.0, at(6, 9)).unwrap();
    let second = ws.create_task(ADMIN, "After", "", "1", 1.0, at(6, 9)).unwrap();
    assert_eq!(first.id, "id-1");
    assert_eq!(second.id, "id-2");
    assert_eq!(ws.tasks().len(), 3);
}

#[test]
fn only_admins_replace_tasks() {
    let mut ws = team();
    ws.create_task(ADMIN, "Keep", "", "1", 2.0, at(6, 9)).unwrap();

    let err = ws.replace_tasks("1", Vec::new()).unwrap_err();
    assert!(matches!(err, WorkspaceError::Forbidden { .. }));
    assert_eq!(ws.tasks().len(), 1);

    ws.replace_tasks(ADMIN, Vec::new()).unwrap();
    assert!(ws.tasks().is_empty());
}
