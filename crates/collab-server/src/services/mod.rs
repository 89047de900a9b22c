//! Workspace, membership and invite operations.
//!
//! Each mutation follows the same shape: open a transaction, lock the
//! workspace row, resolve the actor's role inside the transaction, consult
//! [`crate::policy`], write, commit. Returning early with `?` drops the
//! transaction, which rolls it back.

mod invites;
mod members;
mod workspaces;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use collab_shared::{
    Workspace, WorkspaceRole, DEFAULT_MEMBER_LIMIT, INVITE_TTL_DAYS, MAX_PENDING_INVITES,
};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::store::StoreTx;

pub(crate) use invites::normalize_email;
pub use invites::{InviteService, IssuedInvite};
pub use members::MembershipCoordinator;
pub use workspaces::WorkspaceLifecycle;

/// Source of "now". Swapped out in tests to walk invites past expiry.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

#[derive(Debug, Clone)]
pub struct InviteSettings {
    pub max_pending_invites: i64,
    pub ttl: Duration,
    /// Base for the fallback link handed back when delivery fails.
    pub app_base_url: String,
}

impl Default for InviteSettings {
    fn default() -> Self {
        Self {
            max_pending_invites: MAX_PENDING_INVITES,
            ttl: Duration::days(INVITE_TTL_DAYS),
            app_base_url: "http://localhost:3000".to_string(),
        }
    }
}

impl From<&Config> for InviteSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_pending_invites: config.max_pending_invites,
            ttl: Duration::days(config.invite_ttl_days),
            app_base_url: config.app_base_url.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkspaceDefaults {
    pub member_limit: i32,
}

impl Default for WorkspaceDefaults {
    fn default() -> Self {
        Self {
            member_limit: DEFAULT_MEMBER_LIMIT,
        }
    }
}

impl From<&Config> for WorkspaceDefaults {
    fn from(config: &Config) -> Self {
        Self {
            member_limit: config.default_member_limit,
        }
    }
}

/// Lock the workspace and resolve the actor's role in it. Non-members get
/// `NotFound` so a workspace's existence is not revealed to outsiders.
async fn lock_with_role(
    tx: &mut dyn StoreTx,
    workspace_id: Uuid,
    actor_id: Uuid,
) -> Result<(Workspace, WorkspaceRole), AppError> {
    let workspace = tx
        .lock_workspace(workspace_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let role = tx
        .get_membership_role(workspace_id, actor_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok((workspace, role))
}

fn deny(reason: &'static str) -> AppError {
    tracing::debug!(reason, "Policy denied operation");
    AppError::Forbidden(reason)
}
