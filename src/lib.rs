pub mod business_hours;
pub mod config;
pub mod efficiency;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod logging;
pub mod persistence;
pub mod task;
pub mod user;
pub(crate) mod validation;
pub mod workspace;

pub use business_hours::{
    ClockTime, DaySchedule, ScheduleError, WeeklySchedule, format_duration,
    working_hours_between_millis, working_hours_elapsed,
};
pub use config::AppConfig;
pub use efficiency::{EffortTotals, EfficiencyTier, efficiency_score};
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::SqliteWorkspaceStore;
pub use persistence::{
    PersistenceError, RemoteSnapshot, WorkspaceSnapshot, WorkspaceStore, convert_drive_link,
    load_tasks_from_csv, load_workspace_from_json, merge_remote_snapshot,
    save_efficiency_report_to_csv, save_tasks_to_csv, save_workspace_to_json,
    workspace_from_json_slice,
};
pub use task::{StatusCounts, Task, TaskNote, TaskStatus};
pub use user::{Role, User};
pub use workspace::{MemberEfficiency, TaskUpdate, Workspace, WorkspaceError};
