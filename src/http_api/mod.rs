use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::{
    MemberEfficiency, PersistenceError, Role, StatusCounts, Task, TaskNote, TaskUpdate, User,
    WeeklySchedule, Workspace, WorkspaceError, WorkspaceSnapshot, WorkspaceStore, format_duration,
    working_hours_between_millis,
};

/// Header naming the acting user on every request except `/health` and `/login`.
pub const ACTOR_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    workspace: Arc<RwLock<Workspace>>,
    store: Option<Arc<dyn WorkspaceStore + Send + Sync>>,
}

impl AppState {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace: Arc::new(RwLock::new(workspace)),
            store: None,
        }
    }

    /// Every successful mutation is written through to `store`.
    pub fn with_store(workspace: Workspace, store: Arc<dyn WorkspaceStore + Send + Sync>) -> Self {
        Self {
            workspace: Arc::new(RwLock::new(workspace)),
            store: Some(store),
        }
    }

    pub fn with_shared(workspace: Arc<RwLock<Workspace>>) -> Self {
        Self {
            workspace,
            store: None,
        }
    }

    fn workspace(&self) -> Arc<RwLock<Workspace>> {
        self.workspace.clone()
    }

    fn persist(&self, workspace: &Workspace) -> Result<(), ApiError> {
        if let Some(store) = &self.store {
            store.save_workspace(workspace).map_err(ApiError::from)?;
        }
        Ok(())
    }

    /// Apply `change` to a copy of the workspace. The copy replaces the shared
    /// workspace only once it has been persisted, so a failed save leaves no trace.
    fn commit<T>(
        &self,
        change: impl FnOnce(&mut Workspace) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let mut guard = self.workspace.write();
        let mut draft = guard.clone();
        let value = change(&mut draft)?;
        self.persist(&draft)?;
        *guard = draft;
        Ok(value)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Conflict(String),
    Invalid(String),
    Unauthorized(String),
    Forbidden(String),
    Internal(String),
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }
}

impl From<WorkspaceError> for ApiError {
    fn from(value: WorkspaceError) -> Self {
        let message = value.to_string();
        match value {
            WorkspaceError::TaskNotFound(_) => ApiError::NotFound(message),
            WorkspaceError::UserNotFound(_) | WorkspaceError::InvalidCredentials => {
                ApiError::Unauthorized(message)
            }
            WorkspaceError::Forbidden { .. } => ApiError::Forbidden(message),
            WorkspaceError::InvalidTransition { .. }
            | WorkspaceError::NoteRequired(_)
            | WorkspaceError::DuplicateUsername(_) => ApiError::Conflict(message),
            _ => ApiError::Invalid(message),
        }
    }
}

impl From<PersistenceError> for ApiError {
    fn from(value: PersistenceError) -> Self {
        match value {
            PersistenceError::InvalidData(message) => ApiError::Invalid(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "conflict", message),
            ApiError::Invalid(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, "unauthorized", message),
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, "forbidden", message),
            ApiError::Internal(message) => {
                error!(%message, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        };
        if status.is_client_error() {
            warn!(status = status.as_u16(), %message, "request rejected");
        }
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct NewUserPayload {
    #[serde(default)]
    name: String,
    username: String,
    password: String,
    role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewTaskPayload {
    title: String,
    #[serde(default)]
    description: String,
    assigned_to: String,
    estimated_hours: f64,
}

#[derive(Debug, Deserialize)]
struct NotePayload {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WorkingHoursPayload {
    start: i64,
    end: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WorkingHoursResponse {
    pub hours: f64,
    pub formatted: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/login", post(login))
        .route("/users", get(list_users).post(create_user))
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/tasks/:id/accept", post(accept_task))
        .route("/tasks/:id/notes", post(add_note))
        .route("/tasks/:id/complete", post(complete_task))
        .route(
            "/business-hours",
            get(get_business_hours).put(update_business_hours),
        )
        .route("/efficiency", get(efficiency_report))
        .route("/dashboard", get(dashboard))
        .route("/working-hours", post(working_hours))
        .route("/snapshot", get(export_snapshot).post(import_snapshot))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "http api listening");
    axum::serve(listener, app).await
}

fn actor_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::unauthorized(format!("missing {ACTOR_HEADER} header")))
}

fn known_actor<'a>(workspace: &'a Workspace, actor_id: &str) -> Result<&'a User, ApiError> {
    workspace
        .find_user(actor_id)
        .ok_or_else(|| ApiError::unauthorized(format!("unknown user {actor_id}")))
}

fn require_admin(workspace: &Workspace, actor_id: &str) -> Result<(), ApiError> {
    if known_actor(workspace, actor_id)?.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "user {actor_id} is not an administrator"
        )))
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<User>, ApiError> {
    let workspace = state.workspace();
    let guard = workspace.read();
    let user = guard.authenticate(&payload.username, &payload.password)?;
    info!(user_id = %user.id, "login");
    Ok(Json(user.redacted()))
}

async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<User>>, ApiError> {
    let actor = actor_id(&headers)?;
    let workspace = state.workspace();
    let guard = workspace.read();
    require_admin(&guard, &actor)?;
    Ok(Json(guard.users().iter().map(User::redacted).collect()))
}

async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewUserPayload>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let actor = actor_id(&headers)?;
    let user = state.commit(|ws| {
        Ok(ws.add_user(
            &actor,
            &payload.name,
            &payload.username,
            &payload.password,
            payload.role,
        )?)
    })?;
    Ok((StatusCode::CREATED, Json(user.redacted())))
}

async fn list_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Task>>, ApiError> {
    let actor = actor_id(&headers)?;
    let workspace = state.workspace();
    let guard = workspace.read();
    let tasks = guard.visible_tasks(&actor)?.into_iter().cloned().collect();
    Ok(Json(tasks))
}

async fn get_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let actor = actor_id(&headers)?;
    let workspace = state.workspace();
    let guard = workspace.read();
    guard
        .visible_tasks(&actor)?
        .into_iter()
        .find(|t| t.id == task_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("task {task_id} not found")))
}

async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewTaskPayload>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let actor = actor_id(&headers)?;
    let task = state.commit(|ws| {
        Ok(ws.create_task(
            &actor,
            &payload.title,
            &payload.description,
            &payload.assigned_to,
            payload.estimated_hours,
            Utc::now(),
        )?)
    })?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
    Json(update): Json<TaskUpdate>,
) -> Result<Json<Task>, ApiError> {
    let actor = actor_id(&headers)?;
    let task = state.commit(|ws| Ok(ws.update_task(&actor, &task_id, update)?))?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let actor = actor_id(&headers)?;
    state.commit(|ws| Ok(ws.delete_task(&actor, &task_id)?))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn accept_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let actor = actor_id(&headers)?;
    let task = state.commit(|ws| Ok(ws.accept_task(&actor, &task_id, Utc::now())?))?;
    Ok(Json(task))
}

async fn add_note(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
    Json(payload): Json<NotePayload>,
) -> Result<(StatusCode, Json<TaskNote>), ApiError> {
    let actor = actor_id(&headers)?;
    let note = state.commit(|ws| Ok(ws.add_note(&actor, &task_id, &payload.text, Utc::now())?))?;
    Ok((StatusCode::CREATED, Json(note)))
}

async fn complete_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let actor = actor_id(&headers)?;
    let task = state.commit(|ws| Ok(ws.complete_task(&actor, &task_id, Utc::now())?))?;
    Ok(Json(task))
}

async fn get_business_hours(State(state): State<AppState>) -> Json<WeeklySchedule> {
    let workspace = state.workspace();
    let schedule = {
        let guard = workspace.read();
        guard.business_hours().clone()
    };
    Json(schedule)
}

async fn update_business_hours(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(schedule): Json<WeeklySchedule>,
) -> Result<Json<WeeklySchedule>, ApiError> {
    let actor = actor_id(&headers)?;
    let schedule = state.commit(|ws| {
        ws.set_business_hours(&actor, schedule)?;
        Ok(ws.business_hours().clone())
    })?;
    Ok(Json(schedule))
}

async fn efficiency_report(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<MemberEfficiency>>, ApiError> {
    let actor = actor_id(&headers)?;
    let workspace = state.workspace();
    let guard = workspace.read();
    require_admin(&guard, &actor)?;
    Ok(Json(guard.efficiency_report()))
}

async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatusCounts>, ApiError> {
    let actor = actor_id(&headers)?;
    let workspace = state.workspace();
    let guard = workspace.read();
    Ok(Json(guard.status_counts(&actor)?))
}

async fn working_hours(
    State(state): State<AppState>,
    Json(payload): Json<WorkingHoursPayload>,
) -> Json<WorkingHoursResponse> {
    let workspace = state.workspace();
    let hours = {
        let guard = workspace.read();
        working_hours_between_millis(payload.start, payload.end, guard.business_hours())
    };
    Json(WorkingHoursResponse {
        hours,
        formatted: format_duration(hours),
    })
}

async fn export_snapshot(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<WorkspaceSnapshot>, ApiError> {
    let actor = actor_id(&headers)?;
    let workspace = state.workspace();
    let guard = workspace.read();
    require_admin(&guard, &actor)?;
    Ok(Json(WorkspaceSnapshot::from_workspace(&guard, Utc::now())))
}

async fn import_snapshot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(snapshot): Json<WorkspaceSnapshot>,
) -> Result<StatusCode, ApiError> {
    let actor = actor_id(&headers)?;
    state.commit(|ws| {
        require_admin(ws, &actor)?;
        Ok(snapshot.apply_to(ws)?)
    })?;
    Ok(StatusCode::NO_CONTENT)
}
