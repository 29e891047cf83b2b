//! API Handlers
//!
//! HTTP request handlers for users, projects, stakeholders, communication
//! plans and their matrix entries, plus the cache itself. Reads go through
//! [`CachedDb`], which coalesces identical concurrent reads; writes
//! invalidate the table's cached reads.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{Map, Value};
use tracing::info;

use crate::config::Config;
use crate::db::{
    filter_eq, Backend, CachedDb, Filter, MemoryBackend, QueryCache, Row, SelectQuery,
};
use crate::error::{AppError, Result};
use crate::models::{
    ApiResponse, CacheStatsResponse, HealthResponse, MessageResponse, Resource,
    COMMUNICATION_PLANS, MATRIX_BULK, MATRIX_ENTRIES, PROJECTS, STAKEHOLDERS, STAKEHOLDERS_BULK,
    USERS,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: CachedDb,
}

impl AppState {
    pub fn new(db: CachedDb) -> Self {
        Self { db }
    }

    /// Builds the cache from configuration over the given backend.
    pub fn from_config(config: &Config, backend: Arc<dyn Backend>) -> Result<Self> {
        let cache = QueryCache::new(config.max_entries, config.default_ttl(), config.allow_stale)?;
        Ok(Self::new(CachedDb::new(backend, cache)))
    }

    /// State over an empty in-memory backend.
    pub fn in_memory(config: &Config) -> Result<Self> {
        Self::from_config(config, Arc::new(MemoryBackend::new()))
    }
}

type Body = Json<Map<String, Value>>;
type Listed = Json<ApiResponse<Vec<Value>>>;
type Single = Json<ApiResponse<Value>>;
type Created = (StatusCode, Json<ApiResponse<Value>>);
type CreatedMany = (StatusCode, Json<ApiResponse<Vec<Value>>>);

// == Shared resource operations ==

/// Newest first, optionally scoped to a parent column.
async fn list(
    state: &AppState,
    resource: Resource,
    parent: Option<(&str, String)>,
) -> Result<Listed> {
    let mut query = SelectQuery::new().order("created_at", false);
    if let Some((column, id)) = parent {
        query = query.eq(column, id);
    }
    let rows = state.db.select(resource.table, query).await?;
    Ok(Json(ApiResponse::ok(rows)))
}

async fn fetch_one(state: &AppState, resource: Resource, filter: Filter) -> Result<Value> {
    state
        .db
        .select_single(resource.table, filter)
        .await
        .map_err(|err| match err {
            AppError::NotFound(_) => resource.not_found(),
            other => other,
        })
}

async fn create_one(state: &AppState, resource: Resource, row: Row) -> Result<Created> {
    let created = state.db.insert(resource.table, row).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created))))
}

/// Inserts an already validated batch, each row tagged with its parent id.
async fn create_many(
    state: &AppState,
    resource: Resource,
    rows: Vec<Row>,
    (column, id): (&str, String),
) -> Result<CreatedMany> {
    let rows = rows
        .into_iter()
        .map(|mut row| {
            row.insert(column.to_string(), Value::String(id.clone()));
            row
        })
        .collect();
    let created = state.db.insert_many(resource.table, rows).await?;
    info!(table = resource.table, count = created.len(), "Bulk insert");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created))))
}

async fn update_one(
    state: &AppState,
    resource: Resource,
    filter: Filter,
    body: &Map<String, Value>,
) -> Result<Single> {
    let changes = resource.update_row(body)?;
    let row = state
        .db
        .update(resource.table, filter, changes)
        .await
        .map_err(|err| match err {
            AppError::NotFound(_) => resource.not_found(),
            other => other,
        })?;
    Ok(Json(ApiResponse::ok(row)))
}

async fn delete_one(
    state: &AppState,
    resource: Resource,
    id: String,
) -> Result<Json<MessageResponse>> {
    state.db.delete(resource.table, filter_eq("id", id)).await?;
    Ok(Json(MessageResponse::new(format!(
        "{} deleted successfully",
        resource.label
    ))))
}

// == Users ==

/// GET /api/users
pub async fn list_users(State(state): State<AppState>) -> Result<Listed> {
    list(&state, USERS, None).await
}

/// POST /api/users
pub async fn create_user(State(state): State<AppState>, Json(body): Body) -> Result<Created> {
    let row = USERS.create_row(&body)?;
    create_one(&state, USERS, row).await
}

/// GET /api/users/:id
pub async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> Result<Single> {
    let user = fetch_one(&state, USERS, filter_eq("id", id)).await?;
    Ok(Json(ApiResponse::ok(user)))
}

/// PUT /api/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Body,
) -> Result<Single> {
    update_one(&state, USERS, filter_eq("id", id), &body).await
}

/// DELETE /api/users/:id, answered with an empty 204
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.db.delete(USERS.table, filter_eq("id", id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// == Projects ==

/// GET /api/projects, newest first
pub async fn list_projects(State(state): State<AppState>) -> Result<Listed> {
    list(&state, PROJECTS, None).await
}

/// POST /api/projects
pub async fn create_project(State(state): State<AppState>, Json(body): Body) -> Result<Created> {
    let row = PROJECTS.create_row(&body)?;
    create_one(&state, PROJECTS, row).await
}

/// GET /api/projects/:id
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Single> {
    let project = fetch_one(&state, PROJECTS, filter_eq("id", id)).await?;
    Ok(Json(ApiResponse::ok(project)))
}

/// PUT /api/projects/:id
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Body,
) -> Result<Single> {
    update_one(&state, PROJECTS, filter_eq("id", id), &body).await
}

/// DELETE /api/projects/:id
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    delete_one(&state, PROJECTS, id).await
}

// == Stakeholders ==

/// GET /api/projects/:id/stakeholders
pub async fn list_stakeholders(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Listed> {
    list(&state, STAKEHOLDERS, Some(("project_id", project_id))).await
}

/// POST /api/projects/:id/stakeholders
pub async fn create_stakeholder(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Body,
) -> Result<Created> {
    let mut row = STAKEHOLDERS.create_row(&body)?;
    row.insert("project_id".to_string(), Value::String(project_id));
    create_one(&state, STAKEHOLDERS, row).await
}

/// POST /api/projects/:id/stakeholders/bulk
pub async fn create_stakeholders_bulk(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Body,
) -> Result<CreatedMany> {
    let rows = STAKEHOLDERS.create_rows(&body, STAKEHOLDERS_BULK)?;
    create_many(&state, STAKEHOLDERS, rows, ("project_id", project_id)).await
}

/// GET /api/stakeholders/:id
pub async fn get_stakeholder(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Single> {
    let stakeholder = fetch_one(&state, STAKEHOLDERS, filter_eq("id", id)).await?;
    Ok(Json(ApiResponse::ok(stakeholder)))
}

/// PUT /api/stakeholders/:id
pub async fn update_stakeholder(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Body,
) -> Result<Single> {
    update_one(&state, STAKEHOLDERS, filter_eq("id", id), &body).await
}

/// DELETE /api/stakeholders/:id
pub async fn delete_stakeholder(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    delete_one(&state, STAKEHOLDERS, id).await
}

// == Communication Plans ==

/// GET /api/projects/:id/communication-plan
///
/// The project's plan with its matrix entries, newest first, under `matrix`.
pub async fn get_communication_plan(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Single> {
    let plan = state
        .db
        .select_single(COMMUNICATION_PLANS.table, filter_eq("project_id", project_id))
        .await
        .map_err(|err| match err {
            AppError::NotFound(_) => {
                AppError::NotFound("No communication plan found for this project".to_string())
            }
            other => other,
        })?;

    let Value::Object(mut plan) = plan else {
        return Err(AppError::Backend("communication plan row is not an object".to_string()));
    };
    let plan_id = plan.get("id").cloned().unwrap_or(Value::Null);
    let query = SelectQuery::new()
        .eq("communication_plan_id", plan_id)
        .order("created_at", false);
    let matrix = state.db.select(MATRIX_ENTRIES.table, query).await?;
    plan.insert("matrix".to_string(), Value::Array(matrix));

    Ok(Json(ApiResponse::ok(Value::Object(plan))))
}

/// POST /api/projects/:id/communication-plan; a project holds at most one plan
pub async fn create_communication_plan(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Body,
) -> Result<Created> {
    let existing = SelectQuery::new().eq("project_id", project_id.clone()).limit(1);
    if !state.db.select(COMMUNICATION_PLANS.table, existing).await?.is_empty() {
        return Err(AppError::InvalidRequest(
            "Communication plan already exists for this project".to_string(),
        ));
    }

    let mut row = COMMUNICATION_PLANS.create_row(&body)?;
    row.insert("project_id".to_string(), Value::String(project_id));
    create_one(&state, COMMUNICATION_PLANS, row).await
}

/// PUT /api/projects/:id/communication-plan
pub async fn update_communication_plan(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Body,
) -> Result<Single> {
    let filter = filter_eq("project_id", project_id);
    update_one(&state, COMMUNICATION_PLANS, filter, &body).await
}

// == Communication Matrix ==

/// GET /api/communication-plans/:id/matrix
pub async fn list_matrix_entries(
    State(state): State<AppState>,
    Path(plan_id): Path<String>,
) -> Result<Listed> {
    list(&state, MATRIX_ENTRIES, Some(("communication_plan_id", plan_id))).await
}

/// POST /api/communication-plans/:id/matrix
pub async fn create_matrix_entry(
    State(state): State<AppState>,
    Path(plan_id): Path<String>,
    Json(body): Body,
) -> Result<Created> {
    let mut row = MATRIX_ENTRIES.create_row(&body)?;
    row.insert("communication_plan_id".to_string(), Value::String(plan_id));
    create_one(&state, MATRIX_ENTRIES, row).await
}

/// POST /api/communication-plans/:id/matrix/bulk
pub async fn create_matrix_entries_bulk(
    State(state): State<AppState>,
    Path(plan_id): Path<String>,
    Json(body): Body,
) -> Result<CreatedMany> {
    let rows = MATRIX_ENTRIES.create_rows(&body, MATRIX_BULK)?;
    create_many(&state, MATRIX_ENTRIES, rows, ("communication_plan_id", plan_id)).await
}

/// PUT /api/matrix/:id
pub async fn update_matrix_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Body,
) -> Result<Single> {
    update_one(&state, MATRIX_ENTRIES, filter_eq("id", id), &body).await
}

/// DELETE /api/matrix/:id
pub async fn delete_matrix_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    delete_one(&state, MATRIX_ENTRIES, id).await
}

// == Cache ==

/// GET /api/cache/stats
pub async fn cache_stats_handler(
    State(state): State<AppState>,
) -> Json<ApiResponse<CacheStatsResponse>> {
    Json(ApiResponse::ok(state.db.stats().into()))
}

/// DELETE /api/cache/stats
pub async fn clear_cache_handler(State(state): State<AppState>) -> Json<MessageResponse> {
    state.db.cache().clear();
    info!("Cache cleared on request");
    Json(MessageResponse::new("Cache cleared successfully"))
}

/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
