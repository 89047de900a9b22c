//! Persistence contract for workspaces, memberships and invites.
//!
//! Reads that only feed a response go through [`MembershipStore`]. Anything
//! that reads and then writes runs on a [`StoreTx`], which must lock the
//! workspace row before touching its memberships or invites so every
//! mutation of one workspace takes locks in the same order.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use collab_shared::{
    Invite, InviteView, MemberWithUser, Membership, User, Workspace, WorkspaceRole,
    WorkspaceWithRole,
};
use uuid::Uuid;

use crate::error::AppError;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Open a transaction. Dropping the returned handle without calling
    /// [`StoreTx::commit`] rolls it back.
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError>;

    async fn get_membership_role(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<WorkspaceRole>, AppError>;

    async fn count_members(&self, workspace_id: Uuid) -> Result<i64, AppError>;

    /// `email` must already be lowercased.
    async fn find_pending_invite(
        &self,
        workspace_id: Uuid,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Invite>, AppError>;

    async fn count_pending_invites(
        &self,
        workspace_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<i64, AppError>;

    async fn get_workspace(&self, workspace_id: Uuid) -> Result<Option<Workspace>, AppError>;

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError>;

    /// Any state, including terminal ones; `status` tells them apart.
    async fn find_invite_view_by_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<InviteView>, AppError>;

    async fn list_workspaces_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<WorkspaceWithRole>, AppError>;

    async fn list_members(&self, workspace_id: Uuid) -> Result<Vec<MemberWithUser>, AppError>;

    async fn list_pending_invites(
        &self,
        workspace_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invite>, AppError>;
}

#[async_trait]
pub trait StoreTx: Send {
    /// Row-locks the workspace for the rest of the transaction.
    async fn lock_workspace(&mut self, workspace_id: Uuid) -> Result<Option<Workspace>, AppError>;

    /// Row-locks the workspace an invite token belongs to, whatever the
    /// invite's state.
    async fn lock_workspace_for_token(&mut self, token: &str)
        -> Result<Option<Workspace>, AppError>;

    async fn get_membership_role(
        &mut self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<WorkspaceRole>, AppError>;

    async fn is_member_email(&mut self, workspace_id: Uuid, email: &str)
        -> Result<bool, AppError>;

    async fn count_members(&mut self, workspace_id: Uuid) -> Result<i64, AppError>;

    async fn find_pending_invite(
        &mut self,
        workspace_id: Uuid,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Invite>, AppError>;

    async fn count_pending_invites(
        &mut self,
        workspace_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<i64, AppError>;

    /// Token lookup filtered by the pending predicate, evaluated inside this
    /// transaction. The matched row stays locked until commit.
    async fn find_pending_invite_by_token(
        &mut self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Invite>, AppError>;

    async fn find_invite(&mut self, invite_id: Uuid) -> Result<Option<Invite>, AppError>;

    async fn has_personal_workspace(&mut self, owner_id: Uuid) -> Result<bool, AppError>;

    /// Fails with `Conflict(EmailTaken)` when the email is already registered.
    async fn insert_user(&mut self, user: &User, password_hash: &str) -> Result<(), AppError>;

    async fn insert_workspace(&mut self, workspace: &Workspace) -> Result<(), AppError>;

    /// `None` leaves a field as is; `Some(None)` clears the avatar.
    async fn update_workspace(
        &mut self,
        workspace_id: Uuid,
        name: Option<&str>,
        avatar: Option<Option<&str>>,
        now: DateTime<Utc>,
    ) -> Result<Option<Workspace>, AppError>;

    /// Cascades to memberships and invites.
    async fn delete_workspace(&mut self, workspace_id: Uuid) -> Result<bool, AppError>;

    async fn set_workspace_owner(
        &mut self,
        workspace_id: Uuid,
        owner_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn insert_membership(&mut self, membership: &Membership) -> Result<(), AppError>;

    async fn update_membership_role(
        &mut self,
        workspace_id: Uuid,
        user_id: Uuid,
        role: WorkspaceRole,
    ) -> Result<bool, AppError>;

    async fn delete_membership(&mut self, workspace_id: Uuid, user_id: Uuid)
        -> Result<bool, AppError>;

    async fn insert_invite(&mut self, invite: &Invite) -> Result<(), AppError>;

    async fn refresh_invite(
        &mut self,
        invite_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    async fn mark_invite_accepted(
        &mut self,
        invite_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn mark_invite_rejected(
        &mut self,
        invite_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn delete_invite(&mut self, workspace_id: Uuid, invite_id: Uuid)
        -> Result<bool, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
