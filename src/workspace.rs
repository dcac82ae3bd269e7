use crate::business_hours::{ScheduleError, WeeklySchedule, working_hours_elapsed};
use crate::efficiency::{EffortTotals, EfficiencyTier};
use crate::task::{StatusCounts, Task, TaskNote, TaskStatus};
use crate::user::{Role, User};
use chrono::{DateTime, Local, TimeZone, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkspaceError {
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error("task {0} not found")]
    TaskNotFound(String),
    #[error("user {actor} is not allowed to {action}")]
    Forbidden { actor: String, action: &'static str },
    #[error("task {id} is {from} and cannot become {to}")]
    InvalidTransition {
        id: String,
        from: TaskStatus,
        to: TaskStatus,
    },
    #[error("task {0} needs at least one progress note before it can be completed")]
    NoteRequired(String),
    #[error("note text must not be empty")]
    EmptyNote,
    #[error("estimated hours must be a positive number (got {0})")]
    InvalidEstimate(f64),
    #[error("task title must not be empty")]
    EmptyTitle,
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("username '{0}' is already taken")]
    DuplicateUsername(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("{0} is not a team member that can be assigned tasks")]
    InvalidAssignee(String),
    #[error("invalid business hours: {0}")]
    InvalidSchedule(#[from] ScheduleError),
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Partial edit applied by [`Workspace::update_task`]. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
}

/// One row of the team efficiency report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberEfficiency {
    pub user_id: String,
    pub name: String,
    pub estimated_hours: f64,
    pub actual_hours: f64,
    pub completed_tasks: usize,
    pub efficiency: i64,
    pub tier: EfficiencyTier,
}

impl MemberEfficiency {
    fn from_totals(user: &User, totals: EffortTotals) -> Self {
        let efficiency = totals.score();
        Self {
            user_id: user.id.clone(),
            name: user.name.clone(),
            estimated_hours: totals.estimated_hours,
            actual_hours: totals.actual_hours,
            completed_tasks: totals.task_count,
            efficiency,
            tier: EfficiencyTier::from_score(efficiency),
        }
    }
}

/// Users, tasks and business hours of one team.
#[derive(Debug, Clone, PartialEq)]
pub struct Workspace {
    users: Vec<User>,
    tasks: Vec<Task>,
    business_hours: WeeklySchedule,
    sync_url: String,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    pub fn new() -> Self {
        Self::from_parts(Vec::new(), Vec::new(), WeeklySchedule::default())
    }

    /// Assemble from stored parts. An empty user list is seeded with the default administrator.
    pub fn from_parts(users: Vec<User>, tasks: Vec<Task>, business_hours: WeeklySchedule) -> Self {
        let users = if users.is_empty() {
            vec![User::default_admin()]
        } else {
            users
        };
        Self {
            users,
            tasks,
            business_hours,
            sync_url: String::new(),
        }
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn business_hours(&self) -> &WeeklySchedule {
        &self.business_hours
    }

    pub fn sync_url(&self) -> &str {
        &self.sync_url
    }

    pub fn set_sync_url(&mut self, url: impl Into<String>) {
        self.sync_url = url.into().trim().to_string();
    }

    pub fn find_user(&self, user_id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == user_id)
    }

    pub fn find_user_by_username(&self, username: &str) -> Option<&User> {
        self.users.iter().find(|u| u.username == username)
    }

    pub fn find_task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    /// Team members, excluding administrators.
    pub fn members(&self) -> impl Iterator<Item = &User> {
        self.users.iter().filter(|u| u.role == Role::User)
    }

    pub fn authenticate(&self, username: &str, password: &str) -> WorkspaceResult<&User> {
        self.users
            .iter()
            .find(|u| u.matches_credentials(username, password))
            .ok_or(WorkspaceError::InvalidCredentials)
    }

    pub fn add_user(
        &mut self,
        actor_id: &str,
        name: &str,
        username: &str,
        password: &str,
        role: Role,
    ) -> WorkspaceResult<User> {
        self.require_admin(actor_id, "create users")?;
        let username = username.trim();
        if username.is_empty() {
            return Err(WorkspaceError::EmptyUsername);
        }
        if self.find_user_by_username(username).is_some() {
            return Err(WorkspaceError::DuplicateUsername(username.to_string()));
        }

        let id = next_numeric_id(self.users.iter().map(|u| u.id.as_str()));
        let display_name = if name.trim().is_empty() {
            username
        } else {
            name.trim()
        };
        let user = User::new(id, display_name, username, role).with_password(password);
        info!(user_id = %user.id, username = %user.username, role = %user.role, "user created");
        self.users.push(user.clone());
        Ok(user)
    }

    /// Tasks the actor may see: everything for administrators, own assignments otherwise.
    pub fn visible_tasks(&self, actor_id: &str) -> WorkspaceResult<Vec<&Task>> {
        let actor = self.user(actor_id)?;
        Ok(self
            .tasks
            .iter()
            .filter(|t| actor.is_admin() || t.is_assigned_to(&actor.id))
            .collect())
    }

    pub fn status_counts(&self, actor_id: &str) -> WorkspaceResult<StatusCounts> {
        Ok(StatusCounts::tally(self.visible_tasks(actor_id)?))
    }

    pub fn create_task(
        &mut self,
        actor_id: &str,
        title: &str,
        description: &str,
        assigned_to: &str,
        estimated_hours: f64,
        at: DateTime<Utc>,
    ) -> WorkspaceResult<Task> {
        self.require_admin(actor_id, "create tasks")?;
        if title.trim().is_empty() {
            return Err(WorkspaceError::EmptyTitle);
        }
        Self::check_estimate(estimated_hours)?;
        self.check_assignee(assigned_to)?;

        let id = next_numeric_id(self.tasks.iter().map(|t| t.id.as_str()));
        let task = Task::new(id, title.trim(), assigned_to, estimated_hours, at)
            .with_description(description.trim());
        info!(task_id = %task.id, assigned_to = %task.assigned_to, estimated_hours, "task created");
        self.tasks.push(task.clone());
        Ok(task)
    }

    pub fn update_task(
        &mut self,
        actor_id: &str,
        task_id: &str,
        update: TaskUpdate,
    ) -> WorkspaceResult<Task> {
        self.require_admin(actor_id, "edit tasks")?;
        if let Some(hours) = update.estimated_hours {
            Self::check_estimate(hours)?;
        }
        if let Some(assignee) = update.assigned_to.as_deref() {
            self.check_assignee(assignee)?;
        }
        if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(WorkspaceError::EmptyTitle);
        }

        let task = self.task_mut(task_id)?;
        if let Some(title) = update.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = update.description {
            task.description = description.trim().to_string();
        }
        if let Some(assignee) = update.assigned_to {
            task.assigned_to = assignee;
        }
        if let Some(hours) = update.estimated_hours {
            task.estimated_hours = hours;
        }
        debug!(task_id, "task updated");
        Ok(task.clone())
    }

    pub fn delete_task(&mut self, actor_id: &str, task_id: &str) -> WorkspaceResult<Task> {
        self.require_admin(actor_id, "delete tasks")?;
        let idx = self
            .tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| WorkspaceError::TaskNotFound(task_id.to_string()))?;
        info!(task_id, "task deleted");
        Ok(self.tasks.remove(idx))
    }

    pub fn accept_task(
        &mut self,
        actor_id: &str,
        task_id: &str,
        at: DateTime<Utc>,
    ) -> WorkspaceResult<Task> {
        self.require_assignee(actor_id, task_id, "accept this task")?;
        let task = self.task_mut(task_id)?;
        if task.status != TaskStatus::Pending {
            return Err(WorkspaceError::InvalidTransition {
                id: task.id.clone(),
                from: task.status,
                to: TaskStatus::Accepted,
            });
        }
        task.status = TaskStatus::Accepted;
        task.accepted_at = Some(at);
        info!(task_id, accepted_at = %at, "task accepted");
        Ok(task.clone())
    }

    pub fn add_note(
        &mut self,
        actor_id: &str,
        task_id: &str,
        text: &str,
        at: DateTime<Utc>,
    ) -> WorkspaceResult<TaskNote> {
        let actor = self.user(actor_id)?;
        let is_admin = actor.is_admin();
        let task = self
            .find_task(task_id)
            .ok_or_else(|| WorkspaceError::TaskNotFound(task_id.to_string()))?;
        if !is_admin && !task.is_assigned_to(actor_id) {
            return Err(WorkspaceError::Forbidden {
                actor: actor_id.to_string(),
                action: "add notes to this task",
            });
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(WorkspaceError::EmptyNote);
        }

        let task = self.task_mut(task_id)?;
        let note_id = next_numeric_id(task.notes.iter().map(|n| n.id.as_str()));
        let note = TaskNote::new(note_id, text, at);
        task.notes.push(note.clone());
        debug!(task_id, note_id = %note.id, "note added");
        Ok(note)
    }

    pub fn complete_task(
        &mut self,
        actor_id: &str,
        task_id: &str,
        at: DateTime<Utc>,
    ) -> WorkspaceResult<Task> {
        self.require_assignee(actor_id, task_id, "complete this task")?;
        let task = self.task_mut(task_id)?;
        if task.status != TaskStatus::Accepted {
            return Err(WorkspaceError::InvalidTransition {
                id: task.id.clone(),
                from: task.status,
                to: TaskStatus::Completed,
            });
        }
        if task.notes.is_empty() {
            return Err(WorkspaceError::NoteRequired(task.id.clone()));
        }
        task.status = TaskStatus::Completed;
        task.completed_at = Some(at);
        info!(task_id, completed_at = %at, "task completed");
        Ok(task.clone())
    }

    /// Replace the weekly schedule after checking every active day's window.
    pub fn set_business_hours(
        &mut self,
        actor_id: &str,
        schedule: WeeklySchedule,
    ) -> WorkspaceResult<()> {
        self.require_admin(actor_id, "change business hours")?;
        schedule.validate()?;
        info!(weekly_hours = schedule.weekly_hours(), "business hours updated");
        self.business_hours = schedule;
        Ok(())
    }

    /// Swap in imported data wholesale. A missing schedule keeps the current one.
    pub fn replace_data(
        &mut self,
        users: Vec<User>,
        tasks: Vec<Task>,
        business_hours: Option<WeeklySchedule>,
    ) -> WorkspaceResult<()> {
        if let Some(schedule) = &business_hours {
            schedule.validate()?;
        }
        self.users = if users.is_empty() {
            vec![User::default_admin()]
        } else {
            users
        };
        self.tasks = tasks;
        if let Some(schedule) = business_hours {
            self.business_hours = schedule;
        }
        info!(
            users = self.users.len(),
            tasks = self.tasks.len(),
            "workspace data replaced"
        );
        Ok(())
    }

    /// Swap the whole task list, keeping users and schedule. Administrators only.
    pub fn replace_tasks(&mut self, actor_id: &str, tasks: Vec<Task>) -> WorkspaceResult<()> {
        self.require_admin(actor_id, "replace tasks")?;
        self.tasks = tasks;
        info!(tasks = self.tasks.len(), "tasks replaced");
        Ok(())
    }

    /// Working hours `task` took between acceptance and completion, in `tz`'s calendar.
    /// `None` when the task is not an eligible completed record.
    pub fn task_working_hours_in<Tz: TimeZone>(&self, task: &Task, tz: &Tz) -> Option<f64> {
        let (accepted, completed) = task.effort_window()?;
        Some(working_hours_elapsed(
            &accepted.with_timezone(tz),
            &completed.with_timezone(tz),
            &self.business_hours,
        ))
    }

    /// Sums over the member's completed tasks that carry both instants.
    pub fn member_effort_in<Tz: TimeZone>(&self, user_id: &str, tz: &Tz) -> EffortTotals {
        self.tasks
            .iter()
            .filter(|t| t.is_assigned_to(user_id))
            .filter_map(|t| {
                self.task_working_hours_in(t, tz)
                    .map(|actual| (t.estimated_hours, actual))
            })
            .collect()
    }

    /// Efficiency of every team member, in the order members were added.
    pub fn efficiency_report_in<Tz: TimeZone + Sync>(&self, tz: &Tz) -> Vec<MemberEfficiency> {
        let report: Vec<MemberEfficiency> = self
            .users
            .par_iter()
            .filter(|u| u.role == Role::User)
            .map(|user| MemberEfficiency::from_totals(user, self.member_effort_in(&user.id, tz)))
            .collect();
        debug!(members = report.len(), "efficiency report computed");
        report
    }

    pub fn efficiency_report(&self) -> Vec<MemberEfficiency> {
        self.efficiency_report_in(&Local)
    }

    fn user(&self, user_id: &str) -> WorkspaceResult<&User> {
        self.find_user(user_id)
            .ok_or_else(|| WorkspaceError::UserNotFound(user_id.to_string()))
    }

    fn task_mut(&mut self, task_id: &str) -> WorkspaceResult<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| WorkspaceError::TaskNotFound(task_id.to_string()))
    }

    fn require_admin(&self, actor_id: &str, action: &'static str) -> WorkspaceResult<()> {
        if self.user(actor_id)?.is_admin() {
            Ok(())
        } else {
            Err(WorkspaceError::Forbidden {
                actor: actor_id.to_string(),
                action,
            })
        }
    }

    fn require_assignee(
        &self,
        actor_id: &str,
        task_id: &str,
        action: &'static str,
    ) -> WorkspaceResult<()> {
        self.user(actor_id)?;
        let task = self
            .find_task(task_id)
            .ok_or_else(|| WorkspaceError::TaskNotFound(task_id.to_string()))?;
        if task.is_assigned_to(actor_id) {
            Ok(())
        } else {
            Err(WorkspaceError::Forbidden {
                actor: actor_id.to_string(),
                action,
            })
        }
    }

    fn check_assignee(&self, user_id: &str) -> WorkspaceResult<()> {
        match self.find_user(user_id) {
            Some(user) if user.role == Role::User => Ok(()),
            _ => Err(WorkspaceError::InvalidAssignee(user_id.to_string())),
        }
    }

    fn check_estimate(hours: f64) -> WorkspaceResult<()> {
        if hours.is_finite() && hours > 0.0 {
            Ok(())
        } else {
            Err(WorkspaceError::InvalidEstimate(hours))
        }
    }
}

/// Next id above every numeric id in `existing`; non-numeric ids are ignored.
/// Once the numeric range is exhausted, the first free `id-<n>` is used instead.
fn next_numeric_id<'a, I>(existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let ids: Vec<&str> = existing.into_iter().collect();
    let next = ids
        .iter()
        .filter_map(|id| id.parse::<u64>().ok())
        .max()
        .map_or(Some(1), |max| max.checked_add(1));
    match next {
        Some(id) => id.to_string(),
        None => (1u64..)
            .map(|n| format!("id-{n}"))
            .find(|candidate| !ids.contains(&candidate.as_str()))
            .unwrap_or_default(),
    }
}
