use crate::task::{Task, TaskStatus};
use crate::user::User;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RecordValidationError {
    message: String,
}

impl RecordValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub fn validate_task(task: &Task) -> Result<(), RecordValidationError> {
    if task.id.trim().is_empty() {
        return Err(RecordValidationError::new("task has an empty id"));
    }

    if !task.estimated_hours.is_finite() || task.estimated_hours < 0.0 {
        return Err(RecordValidationError::new(format!(
            "task {} has invalid estimated_hours {}",
            task.id, task.estimated_hours
        )));
    }

    if let (Some(accepted), Some(completed)) = (task.accepted_at, task.completed_at) {
        if completed < accepted {
            return Err(RecordValidationError::new(format!(
                "task {} completed at {} before it was accepted at {}",
                task.id, completed, accepted
            )));
        }
    }

    if task.status == TaskStatus::Pending && task.completed_at.is_some() {
        return Err(RecordValidationError::new(format!(
            "task {} is pending but has a completion time",
            task.id
        )));
    }

    let mut note_ids = HashSet::with_capacity(task.notes.len());
    for note in &task.notes {
        if !note_ids.insert(note.id.as_str()) {
            return Err(RecordValidationError::new(format!(
                "task {} has duplicate note id {}",
                task.id, note.id
            )));
        }
    }

    Ok(())
}

pub fn validate_task_collection(tasks: &[Task]) -> Result<(), RecordValidationError> {
    let mut seen_ids = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if !seen_ids.insert(task.id.as_str()) {
            return Err(RecordValidationError::new(format!(
                "duplicate task id {}",
                task.id
            )));
        }
        validate_task(task)?;
    }
    Ok(())
}

pub fn validate_user_collection(users: &[User]) -> Result<(), RecordValidationError> {
    let mut seen_ids = HashSet::with_capacity(users.len());
    let mut seen_usernames = HashSet::with_capacity(users.len());
    for user in users {
        if user.id.trim().is_empty() || user.username.trim().is_empty() {
            return Err(RecordValidationError::new(format!(
                "user '{}' requires a non-empty id and username",
                user.name
            )));
        }
        if !seen_ids.insert(user.id.as_str()) {
            return Err(RecordValidationError::new(format!(
                "duplicate user id {}",
                user.id
            )));
        }
        if !seen_usernames.insert(user.username.as_str()) {
            return Err(RecordValidationError::new(format!(
                "duplicate username {}",
                user.username
            )));
        }
    }
    Ok(())
}
