use crate::task::Task;
use crate::user::User;
use crate::validation::{self, RecordValidationError};
use crate::workspace::{Workspace, WorkspaceError};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("storage lock poisoned")]
    LockPoisoned,
    #[error("no workspace stored")]
    NotFound,
}

impl From<RecordValidationError> for PersistenceError {
    fn from(value: RecordValidationError) -> Self {
        Self::InvalidData(value.to_string())
    }
}

impl From<WorkspaceError> for PersistenceError {
    fn from(value: WorkspaceError) -> Self {
        Self::InvalidData(value.to_string())
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Durable home for a [`Workspace`].
pub trait WorkspaceStore {
    fn save_workspace(&self, workspace: &Workspace) -> PersistenceResult<()>;
    fn load_workspace(&self) -> PersistenceResult<Option<Workspace>>;
}

pub fn validate_tasks(tasks: &[Task]) -> PersistenceResult<()> {
    validation::validate_task_collection(tasks).map_err(PersistenceError::from)
}

pub fn validate_users(users: &[User]) -> PersistenceResult<()> {
    validation::validate_user_collection(users).map_err(PersistenceError::from)
}

pub fn validate_workspace(workspace: &Workspace) -> PersistenceResult<()> {
    validate_users(workspace.users())?;
    validate_tasks(workspace.tasks())
}

pub mod file;
pub mod link;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{
    WorkspaceSnapshot, load_tasks_from_csv, load_workspace_from_json, save_efficiency_report_to_csv,
    save_tasks_to_csv, save_workspace_to_json, workspace_from_json_slice,
};
pub use link::{RemoteSnapshot, convert_drive_link, merge_remote_snapshot};
