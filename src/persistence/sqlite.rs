use super::{PersistenceError, PersistenceResult, WorkspaceStore};
use crate::business_hours::WeeklySchedule;
use crate::task::Task;
use crate::user::User;
use crate::workspace::Workspace;
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

pub const USERS_KEY: &str = "users";
pub const TASKS_KEY: &str = "tasks";
pub const BUSINESS_HOURS_KEY: &str = "business_hours";
pub const SYNC_URL_KEY: &str = "sync_url";

/// Flat key-value blob store: one JSON document per key.
pub struct SqliteWorkspaceStore {
    connection: Mutex<Connection>,
}

impl SqliteWorkspaceStore {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn lock(&self) -> PersistenceResult<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| PersistenceError::LockPoisoned)
    }

    pub fn get_value(&self, key: &str) -> PersistenceResult<Option<String>> {
        let conn = self.lock()?;
        Self::read_value(&conn, key)
    }

    pub fn set_value(&self, key: &str, value: &str) -> PersistenceResult<()> {
        let conn = self.lock()?;
        Self::write_value(&conn, key, value)
    }

    fn read_value(conn: &Connection, key: &str) -> PersistenceResult<Option<String>> {
        let mut stmt = conn.prepare("SELECT value FROM kv_store WHERE key = ?1")?;
        let value = stmt
            .query_row(params![key], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(value)
    }

    fn write_value(conn: &Connection, key: &str, value: &str) -> PersistenceResult<()> {
        conn.execute(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        debug!(key, bytes = value.len(), "kv blob written");
        Ok(())
    }
}

impl WorkspaceStore for SqliteWorkspaceStore {
    fn save_workspace(&self, workspace: &Workspace) -> PersistenceResult<()> {
        super::validate_workspace(workspace)?;
        let users = serde_json::to_string(workspace.users())?;
        let tasks = serde_json::to_string(workspace.tasks())?;
        let hours = serde_json::to_string(workspace.business_hours())?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        Self::write_value(&tx, USERS_KEY, &users)?;
        Self::write_value(&tx, TASKS_KEY, &tasks)?;
        Self::write_value(&tx, BUSINESS_HOURS_KEY, &hours)?;
        Self::write_value(&tx, SYNC_URL_KEY, workspace.sync_url())?;
        tx.commit()?;
        info!(
            users = workspace.users().len(),
            tasks = workspace.tasks().len(),
            "workspace saved"
        );
        Ok(())
    }

    fn load_workspace(&self) -> PersistenceResult<Option<Workspace>> {
        let conn = self.lock()?;
        let users_json = Self::read_value(&conn, USERS_KEY)?;
        let tasks_json = Self::read_value(&conn, TASKS_KEY)?;
        let hours_json = Self::read_value(&conn, BUSINESS_HOURS_KEY)?;
        let sync_url = Self::read_value(&conn, SYNC_URL_KEY)?;

        if users_json.is_none() && tasks_json.is_none() && hours_json.is_none() {
            return Ok(None);
        }

        let users: Vec<User> = match users_json {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };
        let tasks: Vec<Task> = match tasks_json {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };
        let hours: WeeklySchedule = match hours_json {
            Some(json) => serde_json::from_str(&json)?,
            None => WeeklySchedule::default(),
        };

        super::validate_users(&users)?;
        super::validate_tasks(&tasks)?;

        let mut workspace = Workspace::from_parts(users, tasks, hours);
        if let Some(url) = sync_url {
            workspace.set_sync_url(url);
        }
        Ok(Some(workspace))
    }
}
