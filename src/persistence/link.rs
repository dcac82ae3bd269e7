//! Shared-link handling for workspace snapshots hosted on a file-sharing service.
//!
//! Fetching the bytes is left to the caller; this module turns share links into
//! direct download links and merges a downloaded snapshot into a workspace.

use super::{PersistenceError, PersistenceResult};
use crate::business_hours::WeeklySchedule;
use crate::task::Task;
use crate::user::User;
use crate::workspace::Workspace;
use serde::Deserialize;
use tracing::info;

const DOWNLOAD_PREFIX: &str = "https://docs.google.com/uc?export=download&id=";
const SHARE_MARKERS: [&str; 2] = ["drive.google.com/file/d/", "docs.google.com/spreadsheets/d/"];

/// Rewrite a Drive file or spreadsheet share link into a direct download link.
/// Any other URL is returned unchanged; empty input stays empty.
pub fn convert_drive_link(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }
    for marker in SHARE_MARKERS {
        if let Some((_, rest)) = url.split_once(marker) {
            let id = rest.split('/').next().unwrap_or_default();
            return format!("{DOWNLOAD_PREFIX}{id}");
        }
    }
    url.to_string()
}

/// Remote snapshot where every section is optional; absent sections are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSnapshot {
    #[serde(default)]
    pub users: Option<Vec<User>>,
    #[serde(default)]
    pub tasks: Option<Vec<Task>>,
    #[serde(default)]
    pub business_hours: Option<WeeklySchedule>,
}

/// Merge a downloaded snapshot into `workspace`.
pub fn merge_remote_snapshot(workspace: &mut Workspace, bytes: &[u8]) -> PersistenceResult<()> {
    let remote: RemoteSnapshot = serde_json::from_slice(bytes)?;
    if let Some(users) = &remote.users {
        super::validate_users(users)?;
    }
    if let Some(tasks) = &remote.tasks {
        super::validate_tasks(tasks)?;
    }
    if let Some(schedule) = &remote.business_hours {
        schedule
            .validate()
            .map_err(|err| PersistenceError::InvalidData(err.to_string()))?;
    }

    let users = remote
        .users
        .unwrap_or_else(|| workspace.users().to_vec());
    let tasks = remote
        .tasks
        .unwrap_or_else(|| workspace.tasks().to_vec());
    workspace.replace_data(users, tasks, remote.business_hours)?;
    info!(
        users = workspace.users().len(),
        tasks = workspace.tasks().len(),
        "remote snapshot merged"
    );
    Ok(())
}
