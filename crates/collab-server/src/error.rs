use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConflictReason {
    #[error("User is already a member of this workspace")]
    AlreadyMember,

    #[error("A pending invite already exists for this email")]
    DuplicatePendingInvite,

    #[error("User already has a personal workspace")]
    PersonalWorkspaceExists,

    #[error("Email already registered")]
    EmailTaken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionReason {
    #[error("Workspace member limit reached")]
    MemberLimitReached,

    #[error("Too many pending invites for this workspace")]
    TooManyPendingInvites,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Access denied: {0}")]
    Forbidden(&'static str),

    #[error("Resource not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(ConflictReason),

    #[error("{0}")]
    PreconditionFailed(PreconditionReason),

    #[error("Invite is invalid or has expired")]
    InvalidOrExpired,

    #[error("This invite was sent to a different email address")]
    EmailMismatch,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable kind, independent of the HTTP mapping.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Conflict(_) => "CONFLICT",
            AppError::PreconditionFailed(_) => "PRECONDITION_FAILED",
            AppError::InvalidOrExpired => "INVALID_OR_EXPIRED",
            AppError::EmailMismatch => "EMAIL_MISMATCH",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::EmailMismatch => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            AppError::InvalidOrExpired => StatusCode::GONE,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Validation(msg) => msg.clone(),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                "Internal error".to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "code": self.error_code(),
        }));

        (self.status_code(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_carries_reason_in_message() {
        let err = AppError::Conflict(ConflictReason::DuplicatePendingInvite);
        assert_eq!(err.error_code(), "CONFLICT");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(err.to_string().contains("pending invite"));
    }

    #[test]
    fn precondition_failures_map_to_412() {
        let err = AppError::PreconditionFailed(PreconditionReason::TooManyPendingInvites);
        assert_eq!(err.status_code(), StatusCode::PRECONDITION_FAILED);
        assert_eq!(err.error_code(), "PRECONDITION_FAILED");
    }

    #[test]
    fn store_errors_are_masked() {
        let response = AppError::Database(sqlx::Error::PoolClosed).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn forbidden_keeps_reason() {
        let err = AppError::Forbidden("owner cannot leave");
        assert_eq!(err.to_string(), "Access denied: owner cannot leave");
    }
}
