use super::{PersistenceError, PersistenceResult};
use crate::business_hours::WeeklySchedule;
use crate::task::{Task, TaskNote, TaskStatus};
use crate::user::User;
use crate::workspace::{MemberEfficiency, Workspace};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Whole-workspace export, in the camelCase layout of the team's `database.json` backups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSnapshot {
    pub users: Vec<User>,
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_hours: Option<WeeklySchedule>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sync_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_date: Option<DateTime<Utc>>,
}

impl WorkspaceSnapshot {
    pub fn from_workspace(workspace: &Workspace, exported_at: DateTime<Utc>) -> Self {
        Self {
            users: workspace.users().to_vec(),
            tasks: workspace.tasks().to_vec(),
            business_hours: Some(workspace.business_hours().clone()),
            sync_url: workspace.sync_url().to_string(),
            export_date: Some(exported_at),
        }
    }

    pub fn validate(&self) -> PersistenceResult<()> {
        super::validate_users(&self.users)?;
        super::validate_tasks(&self.tasks)?;
        if let Some(schedule) = &self.business_hours {
            schedule
                .validate()
                .map_err(|err| PersistenceError::InvalidData(err.to_string()))?;
        }
        Ok(())
    }

    pub fn into_workspace(self) -> PersistenceResult<Workspace> {
        self.validate()?;
        let mut workspace = Workspace::from_parts(
            self.users,
            self.tasks,
            self.business_hours.unwrap_or_default(),
        );
        workspace.set_sync_url(self.sync_url);
        Ok(workspace)
    }

    /// Overwrite `workspace` with this snapshot's users and tasks, and its schedule when present.
    pub fn apply_to(self, workspace: &mut Workspace) -> PersistenceResult<()> {
        self.validate()?;
        workspace.replace_data(self.users, self.tasks, self.business_hours)?;
        if !self.sync_url.is_empty() {
            workspace.set_sync_url(self.sync_url);
        }
        Ok(())
    }
}

pub fn save_workspace_to_json<P: AsRef<Path>>(
    workspace: &Workspace,
    path: P,
) -> PersistenceResult<()> {
    super::validate_workspace(workspace)?;
    let snapshot = WorkspaceSnapshot::from_workspace(workspace, Utc::now());
    let file = File::create(path.as_ref())?;
    serde_json::to_writer_pretty(file, &snapshot)?;
    info!(path = %path.as_ref().display(), tasks = snapshot.tasks.len(), "workspace exported");
    Ok(())
}

pub fn load_workspace_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<Workspace> {
    let file = File::open(path.as_ref())?;
    let snapshot: WorkspaceSnapshot = serde_json::from_reader(file)?;
    info!(path = %path.as_ref().display(), tasks = snapshot.tasks.len(), "workspace imported");
    snapshot.into_workspace()
}

pub fn workspace_from_json_slice(bytes: &[u8]) -> PersistenceResult<Workspace> {
    let snapshot: WorkspaceSnapshot = serde_json::from_slice(bytes)?;
    snapshot.into_workspace()
}

#[derive(Default, Serialize, Deserialize)]
struct TaskCsvRecord {
    id: String,
    title: String,
    description: String,
    assigned_to: String,
    status: String,
    created_at: String,
    accepted_at: String,
    completed_at: String,
    estimated_hours: f64,
    #[serde(default)]
    notes: String,
}

impl TaskCsvRecord {
    fn from_task(task: &Task) -> PersistenceResult<Self> {
        Ok(Self {
            id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            assigned_to: task.assigned_to.clone(),
            status: task.status.as_str().to_string(),
            created_at: format_instant(Some(task.created_at)),
            accepted_at: format_instant(task.accepted_at),
            completed_at: format_instant(task.completed_at),
            estimated_hours: task.estimated_hours,
            notes: serde_json::to_string(&task.notes)?,
        })
    }

    fn into_task(self) -> PersistenceResult<Task> {
        let created_at = parse_instant(&self.created_at)?.ok_or_else(|| {
            PersistenceError::InvalidData(format!("task {} is missing created_at", self.id))
        })?;
        let status = TaskStatus::from_str(&self.status).ok_or_else(|| {
            PersistenceError::InvalidData(format!("invalid status '{}'", self.status))
        })?;
        let notes = if self.notes.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str::<Vec<TaskNote>>(&self.notes).map_err(|err| {
                PersistenceError::InvalidData(format!("invalid notes for task {}: {err}", self.id))
            })?
        };

        let mut task = Task::new(
            self.id,
            self.title,
            self.assigned_to,
            self.estimated_hours,
            created_at,
        )
        .with_description(self.description);
        task.status = status;
        task.accepted_at = parse_instant(&self.accepted_at)?;
        task.completed_at = parse_instant(&self.completed_at)?;
        task.notes = notes;
        Ok(task)
    }
}

pub fn save_tasks_to_csv<P: AsRef<Path>>(tasks: &[Task], path: P) -> PersistenceResult<()> {
    super::validate_tasks(tasks)?;
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    for task in tasks {
        writer.serialize(TaskCsvRecord::from_task(task)?)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn load_tasks_from_csv<P: AsRef<Path>>(path: P) -> PersistenceResult<Vec<Task>> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut tasks = Vec::new();
    for record in reader.deserialize::<TaskCsvRecord>() {
        tasks.push(record?.into_task()?);
    }
    super::validate_tasks(&tasks)?;
    Ok(tasks)
}

#[derive(Serialize)]
struct EfficiencyCsvRecord<'a> {
    user_id: &'a str,
    name: &'a str,
    completed_tasks: usize,
    estimated_hours: String,
    actual_hours: String,
    efficiency: i64,
    tier: &'static str,
}

pub fn save_efficiency_report_to_csv<P: AsRef<Path>>(
    report: &[MemberEfficiency],
    path: P,
) -> PersistenceResult<()> {
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    for row in report {
        writer.serialize(EfficiencyCsvRecord {
            user_id: &row.user_id,
            name: &row.name,
            completed_tasks: row.completed_tasks,
            estimated_hours: format!("{:.2}", row.estimated_hours),
            actual_hours: format!("{:.2}", row.actual_hours),
            efficiency: row.efficiency,
            tier: row.tier.as_str(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn format_instant(instant: Option<DateTime<Utc>>) -> String {
    instant
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

fn parse_instant(input: &str) -> PersistenceResult<Option<DateTime<Utc>>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(input.trim())
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|e| PersistenceError::InvalidData(format!("invalid timestamp '{input}': {e}")))
}
