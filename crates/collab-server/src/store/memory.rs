use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use collab_shared::{
    Invite, InviteView, MemberWithUser, Membership, User, Workspace, WorkspaceKind,
    WorkspaceRole, WorkspaceWithRole,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{MembershipStore, StoreTx};
use crate::error::{AppError, ConflictReason};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    password_hashes: HashMap<Uuid, String>,
    workspaces: HashMap<Uuid, Workspace>,
    memberships: HashMap<(Uuid, Uuid), Membership>,
    invites: HashMap<Uuid, Invite>,
}

impl MemoryState {
    fn role(&self, workspace_id: Uuid, user_id: Uuid) -> Option<WorkspaceRole> {
        self.memberships
            .get(&(workspace_id, user_id))
            .map(|m| m.role)
    }

    fn member_count(&self, workspace_id: Uuid) -> i64 {
        self.memberships
            .keys()
            .filter(|(ws, _)| *ws == workspace_id)
            .count() as i64
    }

    fn pending_invites(
        &self,
        workspace_id: Uuid,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = &Invite> + '_ {
        self.invites
            .values()
            .filter(move |i| i.workspace_id == workspace_id && i.is_pending(now))
    }

    fn pending_invite_for(
        &self,
        workspace_id: Uuid,
        email: &str,
        now: DateTime<Utc>,
    ) -> Option<Invite> {
        self.pending_invites(workspace_id, now)
            .find(|i| i.email == email)
            .cloned()
    }

    fn invite_by_token(&self, token: &str) -> Option<&Invite> {
        self.invites.values().find(|i| i.token == token)
    }
}

/// In-process store. A transaction holds the store-wide lock for its whole
/// lifetime and works on a copy, so transactions are fully serialized and an
/// uncommitted one leaves no trace.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Users live outside the membership core; this is how they get here.
    pub async fn add_user(&self, email: &str, display_name: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_lowercase(),
            display_name: display_name.to_string(),
            avatar_url: None,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .await
            .users
            .insert(user.id, user.clone());
        user
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn get_membership_role(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<WorkspaceRole>, AppError> {
        Ok(self.state.lock().await.role(workspace_id, user_id))
    }

    async fn count_members(&self, workspace_id: Uuid) -> Result<i64, AppError> {
        Ok(self.state.lock().await.member_count(workspace_id))
    }

    async fn find_pending_invite(
        &self,
        workspace_id: Uuid,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Invite>, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .pending_invite_for(workspace_id, email, now))
    }

    async fn count_pending_invites(
        &self,
        workspace_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .pending_invites(workspace_id, now)
            .count() as i64)
    }

    async fn get_workspace(&self, workspace_id: Uuid) -> Result<Option<Workspace>, AppError> {
        Ok(self.state.lock().await.workspaces.get(&workspace_id).cloned())
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn find_invite_view_by_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<InviteView>, AppError> {
        let state = self.state.lock().await;
        let Some(invite) = state.invite_by_token(token) else {
            return Ok(None);
        };
        let Some(workspace) = state.workspaces.get(&invite.workspace_id) else {
            return Ok(None);
        };
        let inviter_name = invite
            .invited_by
            .and_then(|id| state.users.get(&id))
            .map(|u| u.display_name.clone());

        Ok(Some(InviteView {
            id: invite.id,
            workspace_id: invite.workspace_id,
            workspace_name: workspace.name.clone(),
            email: invite.email.clone(),
            role: invite.role,
            inviter_name,
            expires_at: invite.expires_at,
            status: invite.status(now),
            is_expired: invite.is_expired(now),
        }))
    }

    async fn list_workspaces_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<WorkspaceWithRole>, AppError> {
        let state = self.state.lock().await;
        let mut workspaces: Vec<WorkspaceWithRole> = state
            .memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| {
                state.workspaces.get(&m.workspace_id).map(|w| WorkspaceWithRole {
                    workspace: w.clone(),
                    role: m.role,
                })
            })
            .collect();
        workspaces.sort_by(|a, b| {
            let personal_first = |w: &Workspace| w.kind != WorkspaceKind::Personal;
            personal_first(&a.workspace)
                .cmp(&personal_first(&b.workspace))
                .then(b.workspace.created_at.cmp(&a.workspace.created_at))
        });
        Ok(workspaces)
    }

    async fn list_members(&self, workspace_id: Uuid) -> Result<Vec<MemberWithUser>, AppError> {
        let state = self.state.lock().await;
        let mut members: Vec<MemberWithUser> = state
            .memberships
            .values()
            .filter(|m| m.workspace_id == workspace_id)
            .filter_map(|m| {
                state.users.get(&m.user_id).map(|u| MemberWithUser {
                    user_id: u.id,
                    email: u.email.clone(),
                    display_name: u.display_name.clone(),
                    role: m.role,
                    joined_at: m.joined_at,
                })
            })
            .collect();
        members.sort_by_key(|m| m.joined_at);
        Ok(members)
    }

    async fn list_pending_invites(
        &self,
        workspace_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invite>, AppError> {
        let state = self.state.lock().await;
        let mut invites: Vec<Invite> = state.pending_invites(workspace_id, now).cloned().collect();
        invites.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invites)
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_workspace(&mut self, workspace_id: Uuid) -> Result<Option<Workspace>, AppError> {
        Ok(self.working.workspaces.get(&workspace_id).cloned())
    }

    async fn lock_workspace_for_token(
        &mut self,
        token: &str,
    ) -> Result<Option<Workspace>, AppError> {
        Ok(self
            .working
            .invite_by_token(token)
            .and_then(|i| self.working.workspaces.get(&i.workspace_id))
            .cloned())
    }

    async fn get_membership_role(
        &mut self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<WorkspaceRole>, AppError> {
        Ok(self.working.role(workspace_id, user_id))
    }

    async fn is_member_email(
        &mut self,
        workspace_id: Uuid,
        email: &str,
    ) -> Result<bool, AppError> {
        let state = &self.working;
        Ok(state
            .memberships
            .values()
            .filter(|m| m.workspace_id == workspace_id)
            .filter_map(|m| state.users.get(&m.user_id))
            .any(|u| u.email.to_lowercase() == email))
    }

    async fn count_members(&mut self, workspace_id: Uuid) -> Result<i64, AppError> {
        Ok(self.working.member_count(workspace_id))
    }

    async fn find_pending_invite(
        &mut self,
        workspace_id: Uuid,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Invite>, AppError> {
        Ok(self.working.pending_invite_for(workspace_id, email, now))
    }

    async fn count_pending_invites(
        &mut self,
        workspace_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        Ok(self.working.pending_invites(workspace_id, now).count() as i64)
    }

    async fn find_pending_invite_by_token(
        &mut self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Invite>, AppError> {
        Ok(self
            .working
            .invite_by_token(token)
            .filter(|i| i.is_pending(now))
            .cloned())
    }

    async fn find_invite(&mut self, invite_id: Uuid) -> Result<Option<Invite>, AppError> {
        Ok(self.working.invites.get(&invite_id).cloned())
    }

    async fn has_personal_workspace(&mut self, owner_id: Uuid) -> Result<bool, AppError> {
        Ok(self
            .working
            .workspaces
            .values()
            .any(|w| w.owner_id == owner_id && w.kind == WorkspaceKind::Personal))
    }

    async fn insert_user(&mut self, user: &User, password_hash: &str) -> Result<(), AppError> {
        if self.working.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict(ConflictReason::EmailTaken));
        }
        self.working.users.insert(user.id, user.clone());
        self.working
            .password_hashes
            .insert(user.id, password_hash.to_string());
        Ok(())
    }

    async fn insert_workspace(&mut self, workspace: &Workspace) -> Result<(), AppError> {
        if workspace.kind == WorkspaceKind::Personal
            && self.has_personal_workspace(workspace.owner_id).await?
        {
            return Err(AppError::Conflict(ConflictReason::PersonalWorkspaceExists));
        }
        self.working
            .workspaces
            .insert(workspace.id, workspace.clone());
        Ok(())
    }

    async fn update_workspace(
        &mut self,
        workspace_id: Uuid,
        name: Option<&str>,
        avatar: Option<Option<&str>>,
        now: DateTime<Utc>,
    ) -> Result<Option<Workspace>, AppError> {
        let Some(workspace) = self.working.workspaces.get_mut(&workspace_id) else {
            return Ok(None);
        };
        if let Some(name) = name {
            workspace.name = name.to_string();
        }
        if let Some(avatar) = avatar {
            workspace.avatar = avatar.map(str::to_string);
        }
        workspace.updated_at = now;
        Ok(Some(workspace.clone()))
    }

    async fn delete_workspace(&mut self, workspace_id: Uuid) -> Result<bool, AppError> {
        let state = &mut self.working;
        if state.workspaces.remove(&workspace_id).is_none() {
            return Ok(false);
        }
        state.memberships.retain(|(ws, _), _| *ws != workspace_id);
        state.invites.retain(|_, i| i.workspace_id != workspace_id);
        Ok(true)
    }

    async fn set_workspace_owner(
        &mut self,
        workspace_id: Uuid,
        owner_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if let Some(workspace) = self.working.workspaces.get_mut(&workspace_id) {
            workspace.owner_id = owner_id;
            workspace.updated_at = now;
        }
        Ok(())
    }

    async fn insert_membership(&mut self, membership: &Membership) -> Result<(), AppError> {
        let key = (membership.workspace_id, membership.user_id);
        if self.working.memberships.contains_key(&key) {
            return Err(AppError::Conflict(ConflictReason::AlreadyMember));
        }
        self.working.memberships.insert(key, membership.clone());
        Ok(())
    }

    async fn update_membership_role(
        &mut self,
        workspace_id: Uuid,
        user_id: Uuid,
        role: WorkspaceRole,
    ) -> Result<bool, AppError> {
        Ok(
            match self.working.memberships.get_mut(&(workspace_id, user_id)) {
                Some(membership) => {
                    membership.role = role;
                    true
                }
                None => false,
            },
        )
    }

    async fn delete_membership(
        &mut self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        Ok(self
            .working
            .memberships
            .remove(&(workspace_id, user_id))
            .is_some())
    }

    async fn insert_invite(&mut self, invite: &Invite) -> Result<(), AppError> {
        self.working.invites.insert(invite.id, invite.clone());
        Ok(())
    }

    async fn refresh_invite(
        &mut self,
        invite_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        Ok(match self.working.invites.get_mut(&invite_id) {
            Some(invite) => {
                invite.token = token.to_string();
                invite.expires_at = expires_at;
                true
            }
            None => false,
        })
    }

    async fn mark_invite_accepted(
        &mut self,
        invite_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if let Some(invite) = self.working.invites.get_mut(&invite_id) {
            invite.accepted_at = Some(now);
        }
        Ok(())
    }

    async fn mark_invite_rejected(
        &mut self,
        invite_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if let Some(invite) = self.working.invites.get_mut(&invite_id) {
            invite.rejected_at = Some(now);
        }
        Ok(())
    }

    async fn delete_invite(
        &mut self,
        workspace_id: Uuid,
        invite_id: Uuid,
    ) -> Result<bool, AppError> {
        let matches = self
            .working
            .invites
            .get(&invite_id)
            .is_some_and(|i| i.workspace_id == workspace_id);
        if matches {
            self.working.invites.remove(&invite_id);
        }
        Ok(matches)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
