use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use collab_shared::{
    api::{TransferOwnershipRequest, UpdateMemberRoleRequest},
    MemberWithUser,
};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::routes::AppState;

/// GET /api/v1/workspaces/:id/members
pub async fn list_members(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(workspace_id): Path<Uuid>,
) -> Result<Json<Vec<MemberWithUser>>, AppError> {
    Ok(Json(
        state.members.list_members(user.id, workspace_id).await?,
    ))
}

/// PATCH /api/v1/workspaces/:id/members/:user_id
pub async fn update_member_role(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((workspace_id, target_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateMemberRoleRequest>,
) -> Result<StatusCode, AppError> {
    state
        .members
        .change_role(user.id, workspace_id, target_id, req.role)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/workspaces/:id/members/:user_id
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((workspace_id, target_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state
        .members
        .remove_member(user.id, workspace_id, target_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/workspaces/:id/transfer
pub async fn transfer_ownership(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(workspace_id): Path<Uuid>,
    Json(req): Json<TransferOwnershipRequest>,
) -> Result<StatusCode, AppError> {
    state
        .members
        .transfer_ownership(user.id, workspace_id, req.new_owner_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/workspaces/:id/leave
pub async fn leave_workspace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(workspace_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.members.leave(user.id, workspace_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
