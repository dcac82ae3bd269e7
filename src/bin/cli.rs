use chrono::{Local, NaiveDateTime, TimeZone, Utc};
use std::io::{self, Write};
use taskflow::business_hours::weekday_from_index;
use taskflow::{
    AppConfig, ClockTime, DaySchedule, Role, TaskUpdate, Workspace, convert_drive_link,
    format_duration, load_tasks_from_csv, load_workspace_from_json, logging,
    save_efficiency_report_to_csv, save_tasks_to_csv, save_workspace_to_json,
    working_hours_elapsed,
};

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

fn render_text_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (ci, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(ci) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    // Horizontal separator
    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&render_row(&widths, headers.iter().copied()));
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');
    for row in rows {
        out.push_str(&render_row(&widths, row.iter().map(String::as_str)));
        out.push('\n');
    }
    out.push_str(&sep);
    out.push('\n');
    out
}

fn render_row<'a>(widths: &[usize], cells: impl Iterator<Item = &'a str>) -> String {
    let mut line = String::from("|");
    for (ci, cell) in cells.enumerate() {
        line.push(' ');
        line.push_str(cell);
        let pad = widths
            .get(ci)
            .copied()
            .unwrap_or(0)
            .saturating_sub(cell.chars().count());
        line.push_str(&" ".repeat(pad));
        line.push_str(" |");
    }
    line
}

fn print_help() {
    println!(
        "Commands:\n  help                                   Show this help\n  login <username> <password>            Sign in\n  logout                                 Sign out\n  whoami                                 Show the signed-in user\n  users                                  List users (admin)\n  adduser <username> <password> <admin|user> [name...]\n                                         Create a user (admin)\n  tasks                                  List visible tasks\n  show <task_id>                         Show a task with its notes\n  add <assignee> <hours> <title...>      Create a task for a member (admin)\n  edit <task_id> <title|desc|assignee|estimate> <value...>\n                                         Edit a task (admin)\n  accept <task_id>                       Accept an assigned task\n  note <task_id> <text...>               Add a progress note\n  complete <task_id>                     Complete an accepted task\n  delete <task_id>                       Delete a task (admin)\n  dashboard                              Task counts by status\n  hours show                             Show business hours\n  hours set <0-6> off                    Mark a weekday inactive (admin)\n  hours set <0-6> <HH:MM> <HH:MM>        Set a weekday window (admin)\n  elapsed <start> <end>                  Working hours between local times (YYYY-MM-DDTHH:MM)\n  efficiency                             Team efficiency report (admin)\n  sync show                              Show the sync link\n  sync url <url>                         Store a share link as a download link (admin)\n  save <json|csv|report|db> <path>       Persist workspace / tasks / efficiency report / sqlite (admin)\n  load <json|csv|db> <path>              Load workspace / tasks / sqlite (admin)\n  quit|exit                              Exit"
    );
}

struct Session {
    workspace: Workspace,
    actor: Option<String>,
}

impl Session {
    fn actor(&self) -> Option<String> {
        if self.actor.is_none() {
            println!("Please log in first.");
        }
        self.actor.clone()
    }

    fn admin(&self) -> Option<String> {
        let actor = self.actor()?;
        match self.workspace.find_user(&actor) {
            Some(user) if user.is_admin() => Some(actor),
            _ => {
                println!("Only administrators can do that.");
                None
            }
        }
    }

    fn username_of(&self, user_id: &str) -> String {
        self.workspace
            .find_user(user_id)
            .map(|u| u.username.clone())
            .unwrap_or_else(|| user_id.to_string())
    }
}

fn print_users(session: &Session) {
    let rows: Vec<Vec<String>> = session
        .workspace
        .users()
        .iter()
        .map(|u| vec![u.id.clone(), u.username.clone(), u.name.clone(), u.role.to_string()])
        .collect();
    println!("{}", render_text_table(&["id", "username", "name", "role"], &rows));
}

fn print_tasks(session: &Session, actor: &str) {
    let tasks = match session.workspace.visible_tasks(actor) {
        Ok(tasks) => tasks,
        Err(e) => {
            println!("Error: {}", e);
            return;
        }
    };
    let rows: Vec<Vec<String>> = tasks
        .iter()
        .map(|t| {
            let worked = session
                .workspace
                .task_working_hours_in(t, &Local)
                .map(format_duration)
                .unwrap_or_else(|| "-".to_string());
            vec![
                t.id.clone(),
                t.title.clone(),
                session.username_of(&t.assigned_to),
                t.status.to_string(),
                format!("{}", t.estimated_hours),
                worked,
                t.notes.len().to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        render_text_table(
            &["id", "title", "assignee", "status", "estimate_h", "worked", "notes"],
            &rows
        )
    );
}

fn print_task(session: &Session, actor: &str, task_id: &str) {
    let visible = match session.workspace.visible_tasks(actor) {
        Ok(tasks) => tasks,
        Err(e) => {
            println!("Error: {}", e);
            return;
        }
    };
    let Some(task) = visible.into_iter().find(|t| t.id == task_id) else {
        println!("Task {task_id} not found.");
        return;
    };
    println!("Task {}      : {}", task.id, task.title);
    println!("Description  : {}", task.description);
    println!("Assignee     : {}", session.username_of(&task.assigned_to));
    println!("Status       : {}", task.status);
    println!("Estimate     : {}h", task.estimated_hours);
    if let Some(hours) = session.workspace.task_working_hours_in(task, &Local) {
        println!("Worked       : {}", format_duration(hours));
    }
    for note in &task.notes {
        println!(
            "  [{}] {}",
            note.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            note.text
        );
    }
}

fn print_business_hours(workspace: &Workspace) {
    let rows: Vec<Vec<String>> = workspace
        .business_hours()
        .iter()
        .enumerate()
        .map(|(idx, (weekday, day))| {
            vec![
                idx.to_string(),
                weekday.to_string(),
                if day.active { "yes" } else { "no" }.to_string(),
                day.start.to_string(),
                day.end.to_string(),
                format!("{:.2}", day.nominal_hours()),
            ]
        })
        .collect();
    println!(
        "{}",
        render_text_table(&["#", "day", "active", "start", "end", "hours"], &rows)
    );
    println!(
        "Weekly hours : {:.2}",
        workspace.business_hours().weekly_hours()
    );
}

fn print_efficiency(workspace: &Workspace) {
    let rows: Vec<Vec<String>> = workspace
        .efficiency_report()
        .into_iter()
        .map(|row| {
            vec![
                row.name,
                row.completed_tasks.to_string(),
                format!("{:.2}", row.estimated_hours),
                format!("{:.2}", row.actual_hours),
                format!("{}%", row.efficiency),
                row.tier.as_str().to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        render_text_table(
            &["member", "tasks", "estimated_h", "actual_h", "efficiency", "tier"],
            &rows
        )
    );
}

fn parse_local(input: &str) -> Option<chrono::DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(input, DATETIME_FORMAT).ok()?;
    Local.from_local_datetime(&naive).earliest()
}

fn set_business_day(session: &mut Session, actor: &str, args: &[&str]) {
    let usage = "Usage: hours set <0-6> off | hours set <0-6> <HH:MM> <HH:MM>";
    let Some(index) = args.first().and_then(|s| s.parse::<u8>().ok()) else {
        println!("{usage}");
        return;
    };
    let weekday = match weekday_from_index(index) {
        Ok(weekday) => weekday,
        Err(e) => {
            println!("Error: {}", e);
            return;
        }
    };
    let current = *session.workspace.business_hours().day(weekday);
    let day = match &args[1..] {
        ["off"] => DaySchedule::closed(current.start, current.end),
        [start_s, end_s] => match (start_s.parse::<ClockTime>(), end_s.parse::<ClockTime>()) {
            (Ok(start), Ok(end)) => DaySchedule::open(start, end),
            (Err(e), _) | (_, Err(e)) => {
                println!("Error: {}", e);
                return;
            }
        },
        _ => {
            println!("{usage}");
            return;
        }
    };
    let mut schedule = session.workspace.business_hours().clone();
    schedule.set_day(weekday, day);
    match session.workspace.set_business_hours(actor, schedule) {
        Ok(()) => println!("Updated {weekday}."),
        Err(e) => println!("Error: {}", e),
    }
}

#[cfg(feature = "sqlite")]
fn save_db(workspace: &Workspace, path: &str) -> Result<(), taskflow::PersistenceError> {
    use taskflow::{SqliteWorkspaceStore, WorkspaceStore};
    SqliteWorkspaceStore::new(path)?.save_workspace(workspace)
}

#[cfg(feature = "sqlite")]
fn load_db(path: &str) -> Result<Option<Workspace>, taskflow::PersistenceError> {
    use taskflow::{SqliteWorkspaceStore, WorkspaceStore};
    SqliteWorkspaceStore::new(path)?.load_workspace()
}

#[cfg(not(feature = "sqlite"))]
fn save_db(_: &Workspace, _: &str) -> Result<(), taskflow::PersistenceError> {
    Err(taskflow::PersistenceError::InvalidData(
        "rebuild with the `sqlite` feature".into(),
    ))
}

#[cfg(not(feature = "sqlite"))]
fn load_db(_: &str) -> Result<Option<Workspace>, taskflow::PersistenceError> {
    Err(taskflow::PersistenceError::InvalidData(
        "rebuild with the `sqlite` feature".into(),
    ))
}

fn main() {
    let config = AppConfig::from_env().unwrap_or_default();
    logging::init_tracing(&config.log_filter);

    let mut session = Session {
        workspace: Workspace::new(),
        actor: None,
    };

    println!("Taskflow (CLI) - type 'help' for commands\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let parts: Vec<&str> = input.split_whitespace().collect();
        let cmd = parts[0];
        let args = &parts[1..];
        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "login" => match args {
                [username, password] => match session.workspace.authenticate(username, password) {
                    Ok(user) => {
                        println!("Logged in as {} ({}).", user.name, user.role);
                        session.actor = Some(user.id.clone());
                    }
                    Err(e) => println!("Error: {}", e),
                },
                _ => println!("Usage: login <username> <password>"),
            },
            "logout" => {
                session.actor = None;
                println!("Logged out.");
            }
            "whoami" => match session.actor.as_deref().and_then(|id| session.workspace.find_user(id)) {
                Some(user) => println!("{} ({}, {})", user.name, user.username, user.role),
                None => println!("Not logged in."),
            },
            "users" => {
                if session.admin().is_some() {
                    print_users(&session);
                }
            }
            "adduser" => {
                let Some(actor) = session.actor() else { continue };
                match args {
                    [username, password, role_s, name @ ..] => {
                        let Some(role) = Role::from_str(role_s) else {
                            println!("Role must be admin or user");
                            continue;
                        };
                        let name = name.join(" ");
                        match session
                            .workspace
                            .add_user(&actor, &name, username, password, role)
                        {
                            Ok(user) => println!("Created user {} (id {}).", user.username, user.id),
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    _ => println!("Usage: adduser <username> <password> <admin|user> [name...]"),
                }
            }
            "tasks" => {
                if let Some(actor) = session.actor() {
                    print_tasks(&session, &actor);
                }
            }
            "show" => {
                let Some(actor) = session.actor() else { continue };
                match args {
                    [task_id] => print_task(&session, &actor, task_id),
                    _ => println!("Usage: show <task_id>"),
                }
            }
            "add" => {
                let Some(actor) = session.actor() else { continue };
                match args {
                    [assignee, hours_s, title @ ..] if !title.is_empty() => {
                        let hours: f64 = match hours_s.parse() {
                            Ok(v) => v,
                            Err(_) => {
                                println!("Invalid hours");
                                continue;
                            }
                        };
                        let assignee_id = session
                            .workspace
                            .find_user_by_username(assignee)
                            .map(|u| u.id.clone())
                            .unwrap_or_else(|| assignee.to_string());
                        match session.workspace.create_task(
                            &actor,
                            &title.join(" "),
                            "",
                            &assignee_id,
                            hours,
                            Utc::now(),
                        ) {
                            Ok(task) => println!("Created task {}.", task.id),
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    _ => println!("Usage: add <assignee> <hours> <title...>"),
                }
            }
            "edit" => {
                let Some(actor) = session.actor() else { continue };
                match args {
                    [task_id, field, value @ ..] if !value.is_empty() => {
                        let value = value.join(" ");
                        let mut update = TaskUpdate::default();
                        match *field {
                            "title" => update.title = Some(value),
                            "desc" => update.description = Some(value),
                            "assignee" => {
                                update.assigned_to = Some(
                                    session
                                        .workspace
                                        .find_user_by_username(&value)
                                        .map(|u| u.id.clone())
                                        .unwrap_or(value),
                                )
                            }
                            "estimate" => match value.parse::<f64>() {
                                Ok(v) => update.estimated_hours = Some(v),
                                Err(_) => {
                                    println!("Invalid hours");
                                    continue;
                                }
                            },
                            _ => {
                                println!("Field must be title, desc, assignee or estimate");
                                continue;
                            }
                        }
                        match session.workspace.update_task(&actor, task_id, update) {
                            Ok(task) => println!("Updated task {}.", task.id),
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    _ => println!("Usage: edit <task_id> <title|desc|assignee|estimate> <value...>"),
                }
            }
            "accept" | "complete" | "delete" => {
                let Some(actor) = session.actor() else { continue };
                let [task_id] = args else {
                    println!("Usage: {} <task_id>", cmd);
                    continue;
                };
                let result = match cmd {
                    "accept" => session
                        .workspace
                        .accept_task(&actor, task_id, Utc::now())
                        .map(|_| format!("Accepted task {task_id}.")),
                    "complete" => session
                        .workspace
                        .complete_task(&actor, task_id, Utc::now())
                        .map(|_| format!("Completed task {task_id}.")),
                    _ => session
                        .workspace
                        .delete_task(&actor, task_id)
                        .map(|_| format!("Deleted task {task_id}.")),
                };
                match result {
                    Ok(message) => println!("{message}"),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "note" => {
                let Some(actor) = session.actor() else { continue };
                match args {
                    [task_id, text @ ..] if !text.is_empty() => {
                        match session
                            .workspace
                            .add_note(&actor, task_id, &text.join(" "), Utc::now())
                        {
                            Ok(_) => println!("Noted on task {task_id}."),
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    _ => println!("Usage: note <task_id> <text...>"),
                }
            }
            "dashboard" => {
                let Some(actor) = session.actor() else { continue };
                match session.workspace.status_counts(&actor) {
                    Ok(counts) => {
                        println!("Pending   : {}", counts.pending);
                        println!("Accepted  : {}", counts.accepted);
                        println!("Completed : {}", counts.completed);
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            "hours" => match args {
                ["show"] => print_business_hours(&session.workspace),
                ["set", rest @ ..] => {
                    let Some(actor) = session.actor() else { continue };
                    set_business_day(&mut session, &actor, rest);
                }
                _ => println!("Usage: hours show | hours set <0-6> ..."),
            },
            "elapsed" => match args {
                [start_s, end_s] => match (parse_local(start_s), parse_local(end_s)) {
                    (Some(start), Some(end)) => {
                        let hours =
                            working_hours_elapsed(&start, &end, session.workspace.business_hours());
                        println!("Working hours: {:.2} ({})", hours, format_duration(hours));
                    }
                    _ => println!("Invalid time (use YYYY-MM-DDTHH:MM)"),
                },
                _ => println!("Usage: elapsed <start> <end>"),
            },
            "efficiency" => {
                if session.admin().is_some() {
                    print_efficiency(&session.workspace);
                }
            }
            "sync" => match args {
                ["show"] => {
                    let url = session.workspace.sync_url();
                    if url.is_empty() {
                        println!("No sync link stored.");
                    } else {
                        println!("Sync link: {url}");
                    }
                }
                ["url", url] => {
                    if session.admin().is_none() {
                        continue;
                    }
                    let direct = convert_drive_link(url);
                    session.workspace.set_sync_url(direct.clone());
                    println!("Sync link set to {direct}");
                }
                _ => println!("Usage: sync show | sync url <url>"),
            },
            "save" | "load" if session.admin().is_none() => {}
            "save" => match args {
                ["json", path] => match save_workspace_to_json(&session.workspace, path) {
                    Ok(_) => println!("Workspace saved to {}", path),
                    Err(e) => println!("Save error: {}", e),
                },
                ["csv", path] => match save_tasks_to_csv(session.workspace.tasks(), path) {
                    Ok(_) => println!("Tasks saved to {}", path),
                    Err(e) => println!("Save error: {}", e),
                },
                ["report", path] => {
                    let report = session.workspace.efficiency_report();
                    match save_efficiency_report_to_csv(&report, path) {
                        Ok(_) => println!("Efficiency report saved to {}", path),
                        Err(e) => println!("Save error: {}", e),
                    }
                }
                ["db", path] => match save_db(&session.workspace, path) {
                    Ok(_) => println!("Workspace stored in {}", path),
                    Err(e) => println!("Save error: {}", e),
                },
                _ => println!("Usage: save <json|csv|report|db> <path>"),
            },
            "load" => match args {
                ["json", path] => match load_workspace_from_json(path) {
                    Ok(workspace) => {
                        session.workspace = workspace;
                        session.actor = None;
                        println!("Workspace loaded from {}; please log in again.", path);
                    }
                    Err(e) => println!("Load error: {}", e),
                },
                ["csv", path] => match load_tasks_from_csv(path) {
                    Ok(tasks) => {
                        let actor = session.actor.clone().unwrap_or_default();
                        match session.workspace.replace_tasks(&actor, tasks) {
                            Ok(()) => println!("Tasks loaded from {}", path),
                            Err(e) => println!("Load error: {}", e),
                        }
                    }
                    Err(e) => println!("Load error: {}", e),
                },
                ["db", path] => match load_db(path) {
                    Ok(Some(workspace)) => {
                        session.workspace = workspace;
                        session.actor = None;
                        println!("Workspace loaded from {}; please log in again.", path);
                    }
                    Ok(None) => println!("No workspace stored in {}", path),
                    Err(e) => println!("Load error: {}", e),
                },
                _ => println!("Usage: load <json|csv|db> <path>"),
            },
            _ => println!("Unknown command. Type 'help'."),
        }
    }
}
