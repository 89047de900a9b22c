use std::sync::Arc;

use collab_shared::{MemberWithUser, WorkspaceRole};
use uuid::Uuid;

use super::{deny, lock_with_role, system_clock, Clock};
use crate::error::AppError;
use crate::policy;
use crate::store::MembershipStore;

/// Membership mutations: remove, change role, transfer ownership, leave.
#[derive(Clone)]
pub struct MembershipCoordinator {
    store: Arc<dyn MembershipStore>,
    clock: Clock,
}

impl MembershipCoordinator {
    pub fn new(store: Arc<dyn MembershipStore>) -> Self {
        Self {
            store,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub async fn list_members(
        &self,
        actor_id: Uuid,
        workspace_id: Uuid,
    ) -> Result<Vec<MemberWithUser>, AppError> {
        self.store
            .get_membership_role(workspace_id, actor_id)
            .await?
            .ok_or(AppError::NotFound)?;
        self.store.list_members(workspace_id).await
    }

    pub async fn remove_member(
        &self,
        actor_id: Uuid,
        workspace_id: Uuid,
        target_user_id: Uuid,
    ) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        let (_, actor_role) = lock_with_role(tx.as_mut(), workspace_id, actor_id).await?;
        let target_role = tx
            .get_membership_role(workspace_id, target_user_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if !policy::can_remove_member(actor_role, target_role, actor_id == target_user_id) {
            return Err(deny("insufficient role to remove this member"));
        }

        tx.delete_membership(workspace_id, target_user_id).await?;
        tx.commit().await?;

        tracing::info!(
            workspace_id = %workspace_id,
            actor_id = %actor_id,
            user_id = %target_user_id,
            "Member removed"
        );
        Ok(())
    }

    pub async fn change_role(
        &self,
        actor_id: Uuid,
        workspace_id: Uuid,
        target_user_id: Uuid,
        new_role: WorkspaceRole,
    ) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        let (_, actor_role) = lock_with_role(tx.as_mut(), workspace_id, actor_id).await?;
        let target_role = tx
            .get_membership_role(workspace_id, target_user_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if !policy::can_change_role(actor_role, target_role, new_role) {
            return Err(deny("insufficient role to change this member's role"));
        }

        tx.update_membership_role(workspace_id, target_user_id, new_role)
            .await?;
        tx.commit().await?;

        tracing::info!(
            workspace_id = %workspace_id,
            actor_id = %actor_id,
            user_id = %target_user_id,
            role = %new_role,
            "Member role changed"
        );
        Ok(())
    }

    /// Moves the owner pointer and swaps both roles in one transaction; the
    /// former owner stays on as admin.
    pub async fn transfer_ownership(
        &self,
        actor_id: Uuid,
        workspace_id: Uuid,
        new_owner_id: Uuid,
    ) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        let (_, actor_role) = lock_with_role(tx.as_mut(), workspace_id, actor_id).await?;

        if !policy::can_transfer_ownership(actor_role) {
            return Err(deny("only the owner can transfer ownership"));
        }
        tx.get_membership_role(workspace_id, new_owner_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if new_owner_id == actor_id {
            return Err(AppError::Validation(
                "You already own this workspace".to_string(),
            ));
        }

        tx.set_workspace_owner(workspace_id, new_owner_id, (self.clock)())
            .await?;
        tx.update_membership_role(workspace_id, actor_id, WorkspaceRole::Admin)
            .await?;
        tx.update_membership_role(workspace_id, new_owner_id, WorkspaceRole::Owner)
            .await?;
        tx.commit().await?;

        tracing::info!(
            workspace_id = %workspace_id,
            from = %actor_id,
            to = %new_owner_id,
            "Ownership transferred"
        );
        Ok(())
    }

    pub async fn leave(&self, actor_id: Uuid, workspace_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        let (_, role) = lock_with_role(tx.as_mut(), workspace_id, actor_id).await?;

        if !policy::can_leave_workspace(role) {
            return Err(deny("owner cannot leave"));
        }

        tx.delete_membership(workspace_id, actor_id).await?;
        tx.commit().await?;

        tracing::info!(workspace_id = %workspace_id, user_id = %actor_id, "Member left workspace");
        Ok(())
    }
}
