use axum::{extract::State, Extension, Json};
use collab_shared::api::{AuthResponse, LoginRequest, RegisterRequest};
use collab_shared::User;
use uuid::Uuid;

use crate::auth::{create_access_token, hash_password, verify_password, AuthUser};
use crate::error::AppError;
use crate::routes::AppState;
use crate::services::normalize_email;

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = normalize_email(&req.email)?;
    let display_name = req.display_name.trim();
    if display_name.is_empty() || req.password.is_empty() {
        return Err(AppError::Validation("All fields are required".to_string()));
    }
    if req.password.len() < 8 {
        return Err(AppError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password)?;
    let (user, personal) = state
        .workspaces
        .register_user(&email, display_name, &password_hash)
        .await?;
    let user_id = user.id;

    let access_token = create_access_token(
        user_id,
        &email,
        &state.config.jwt_secret,
        state.config.jwt_expires_in,
    )?;

    Ok(Json(AuthResponse {
        access_token,
        user_id,
        personal_workspace_id: Some(personal.id),
    }))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let row: Option<(Uuid, String, String)> =
        sqlx::query_as("SELECT id, email, password_hash FROM users WHERE email = $1")
            .bind(req.email.trim().to_lowercase())
            .fetch_optional(&state.db)
            .await?;

    let (user_id, email, password_hash) = row.ok_or(AppError::Unauthorized)?;

    if !verify_password(&req.password, &password_hash)? {
        return Err(AppError::Unauthorized);
    }

    sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
        .bind(user_id)
        .execute(&state.db)
        .await?;

    let access_token = create_access_token(
        user_id,
        &email,
        &state.config.jwt_secret,
        state.config.jwt_expires_in,
    )?;

    Ok(Json(AuthResponse {
        access_token,
        user_id,
        personal_workspace_id: None,
    }))
}

/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<User>, AppError> {
    let user = state
        .store
        .get_user(user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(user))
}
