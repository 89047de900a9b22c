use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use collab_shared::{
    api::{CreateWorkspaceRequest, UpdateWorkspaceRequest},
    Workspace, WorkspaceWithRole,
};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::routes::AppState;

/// POST /api/v1/workspaces
pub async fn create_workspace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateWorkspaceRequest>,
) -> Result<(StatusCode, Json<Workspace>), AppError> {
    let workspace = state
        .workspaces
        .create(user.id, &req.name, req.avatar)
        .await?;
    Ok((StatusCode::CREATED, Json(workspace)))
}

/// GET /api/v1/workspaces
pub async fn list_workspaces(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<WorkspaceWithRole>>, AppError> {
    Ok(Json(state.workspaces.list(user.id).await?))
}

/// GET /api/v1/workspaces/:id
pub async fn get_workspace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(workspace_id): Path<Uuid>,
) -> Result<Json<WorkspaceWithRole>, AppError> {
    Ok(Json(state.workspaces.get(user.id, workspace_id).await?))
}

/// PATCH /api/v1/workspaces/:id
pub async fn update_workspace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(workspace_id): Path<Uuid>,
    Json(req): Json<UpdateWorkspaceRequest>,
) -> Result<Json<Workspace>, AppError> {
    Ok(Json(
        state
            .workspaces
            .update(user.id, workspace_id, req)
            .await?,
    ))
}

/// DELETE /api/v1/workspaces/:id
pub async fn delete_workspace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(workspace_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.workspaces.delete(user.id, workspace_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
