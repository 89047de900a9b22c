use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use collab_shared::{
    api::{InviteIssuedResponse, InviteMemberRequest, InviteResentResponse},
    Invite, InviteView, Workspace,
};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::routes::AppState;

/// GET /api/v1/workspaces/:id/invites
pub async fn list_invites(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(workspace_id): Path<Uuid>,
) -> Result<Json<Vec<Invite>>, AppError> {
    Ok(Json(
        state.invites.list_pending(user.id, workspace_id).await?,
    ))
}

/// POST /api/v1/workspaces/:id/invites
pub async fn create_invite(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(workspace_id): Path<Uuid>,
    Json(req): Json<InviteMemberRequest>,
) -> Result<(StatusCode, Json<InviteIssuedResponse>), AppError> {
    let issued = state
        .invites
        .issue(user.id, workspace_id, &req.email, req.role)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(InviteIssuedResponse {
            invite: issued.invite,
            invite_url: issued.invite_url,
        }),
    ))
}

/// POST /api/v1/workspaces/:id/invites/:invite_id/resend
pub async fn resend_invite(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((workspace_id, invite_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<InviteResentResponse>, AppError> {
    let issued = state
        .invites
        .resend(user.id, workspace_id, invite_id)
        .await?;
    Ok(Json(InviteResentResponse {
        invite_url: issued.invite_url,
    }))
}

/// DELETE /api/v1/workspaces/:id/invites/:invite_id
pub async fn revoke_invite(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((workspace_id, invite_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state
        .invites
        .revoke(user.id, workspace_id, invite_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/invites/:token (public)
pub async fn resolve_invite(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<InviteView>, AppError> {
    state
        .invites
        .resolve(&token)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

/// POST /api/v1/invites/:token/accept
pub async fn accept_invite(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(token): Path<String>,
) -> Result<Json<Workspace>, AppError> {
    Ok(Json(
        state.invites.accept(&token, &user.email, user.id).await?,
    ))
}

/// POST /api/v1/invites/:token/reject
pub async fn reject_invite(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(token): Path<String>,
) -> Result<StatusCode, AppError> {
    state.invites.reject(&token, &user.email).await?;
    Ok(StatusCode::NO_CONTENT)
}
