use std::sync::Arc;

use collab_shared::{
    api::UpdateWorkspaceRequest, Membership, User, Workspace, WorkspaceKind, WorkspaceRole,
    WorkspaceWithRole, WORKSPACE_NAME_MAX_LEN,
};
use uuid::Uuid;

use super::{deny, lock_with_role, system_clock, Clock, WorkspaceDefaults};
use crate::error::{AppError, ConflictReason};
use crate::policy;
use crate::store::{MembershipStore, StoreTx};

const PERSONAL_WORKSPACE_NAME: &str = "Personal";

fn validate_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Workspace name is required".to_string()));
    }
    if name.chars().count() > WORKSPACE_NAME_MAX_LEN {
        return Err(AppError::Validation(format!(
            "Workspace name must be at most {} characters",
            WORKSPACE_NAME_MAX_LEN
        )));
    }
    Ok(name.to_string())
}

/// Workspace-level create/update/delete and the personal-workspace invariant.
#[derive(Clone)]
pub struct WorkspaceLifecycle {
    store: Arc<dyn MembershipStore>,
    defaults: WorkspaceDefaults,
    clock: Clock,
}

impl WorkspaceLifecycle {
    pub fn new(store: Arc<dyn MembershipStore>, defaults: WorkspaceDefaults) -> Self {
        Self {
            store,
            defaults,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Team workspaces only; personal ones come from [`Self::provision_personal`].
    pub async fn create(
        &self,
        owner_id: Uuid,
        name: &str,
        avatar: Option<String>,
    ) -> Result<Workspace, AppError> {
        let name = validate_name(name)?;
        let mut tx = self.store.begin().await?;
        let workspace = self
            .insert_with_owner(tx.as_mut(), owner_id, name, avatar, WorkspaceKind::Team)
            .await?;
        tx.commit().await?;

        tracing::info!(workspace_id = %workspace.id, owner_id = %owner_id, "Workspace created");
        Ok(workspace)
    }

    /// Signup: the user row and their personal workspace commit together or
    /// not at all. `email` must already be normalized.
    pub async fn register_user(
        &self,
        email: &str,
        display_name: &str,
        password_hash: &str,
    ) -> Result<(User, Workspace), AppError> {
        let now = (self.clock)();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            avatar_url: None,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        tx.insert_user(&user, password_hash).await?;
        let workspace = self
            .insert_with_owner(
                tx.as_mut(),
                user.id,
                PERSONAL_WORKSPACE_NAME.to_string(),
                None,
                WorkspaceKind::Personal,
            )
            .await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, workspace_id = %workspace.id, "User registered");
        Ok((user, workspace))
    }

    /// For users created without a personal workspace.
    pub async fn provision_personal(&self, user_id: Uuid) -> Result<Workspace, AppError> {
        let mut tx = self.store.begin().await?;
        if tx.has_personal_workspace(user_id).await? {
            return Err(AppError::Conflict(ConflictReason::PersonalWorkspaceExists));
        }
        let workspace = self
            .insert_with_owner(
                tx.as_mut(),
                user_id,
                PERSONAL_WORKSPACE_NAME.to_string(),
                None,
                WorkspaceKind::Personal,
            )
            .await?;
        tx.commit().await?;

        tracing::info!(workspace_id = %workspace.id, user_id = %user_id, "Personal workspace provisioned");
        Ok(workspace)
    }

    pub async fn update(
        &self,
        actor_id: Uuid,
        workspace_id: Uuid,
        fields: UpdateWorkspaceRequest,
    ) -> Result<Workspace, AppError> {
        let name = fields.name.as_deref().map(validate_name).transpose()?;
        // An empty avatar clears it.
        let avatar = fields.avatar.as_deref().map(|a| {
            let a = a.trim();
            (!a.is_empty()).then_some(a)
        });

        let mut tx = self.store.begin().await?;
        let (_, role) = lock_with_role(tx.as_mut(), workspace_id, actor_id).await?;
        if !policy::can_update_workspace(role) {
            return Err(deny("only owners and admins can update the workspace"));
        }

        let workspace = tx
            .update_workspace(
                workspace_id,
                name.as_deref(),
                avatar,
                (self.clock)(),
            )
            .await?
            .ok_or(AppError::NotFound)?;
        tx.commit().await?;

        tracing::info!(workspace_id = %workspace_id, actor_id = %actor_id, "Workspace updated");
        Ok(workspace)
    }

    /// Memberships and invites go with it.
    pub async fn delete(&self, actor_id: Uuid, workspace_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        let (workspace, role) = lock_with_role(tx.as_mut(), workspace_id, actor_id).await?;
        if !policy::can_delete_workspace(role) {
            return Err(deny("only the owner can delete the workspace"));
        }
        if workspace.is_personal() {
            return Err(deny("personal workspaces cannot be deleted"));
        }

        if !tx.delete_workspace(workspace_id).await? {
            return Err(AppError::NotFound);
        }
        tx.commit().await?;

        tracing::info!(workspace_id = %workspace_id, actor_id = %actor_id, "Workspace deleted");
        Ok(())
    }

    pub async fn get(
        &self,
        actor_id: Uuid,
        workspace_id: Uuid,
    ) -> Result<WorkspaceWithRole, AppError> {
        let role = self
            .store
            .get_membership_role(workspace_id, actor_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let workspace = self
            .store
            .get_workspace(workspace_id)
            .await?
            .ok_or(AppError::NotFound)?;
        Ok(WorkspaceWithRole { workspace, role })
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<WorkspaceWithRole>, AppError> {
        self.store.list_workspaces_for_user(user_id).await
    }

    // Workspace row and owner membership always land in the same transaction.
    async fn insert_with_owner(
        &self,
        tx: &mut dyn StoreTx,
        owner_id: Uuid,
        name: String,
        avatar: Option<String>,
        kind: WorkspaceKind,
    ) -> Result<Workspace, AppError> {
        let now = (self.clock)();
        let workspace = Workspace {
            id: Uuid::new_v4(),
            name,
            kind,
            owner_id,
            avatar,
            member_limit: match kind {
                WorkspaceKind::Personal => 1,
                WorkspaceKind::Team => self.defaults.member_limit,
            },
            created_at: now,
            updated_at: now,
        };

        tx.insert_workspace(&workspace).await?;
        tx.insert_membership(&Membership {
            workspace_id: workspace.id,
            user_id: owner_id,
            role: WorkspaceRole::Owner,
            joined_at: now,
        })
        .await?;

        Ok(workspace)
    }
}
