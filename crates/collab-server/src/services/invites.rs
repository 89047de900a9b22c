use std::sync::{Arc, OnceLock};

use collab_shared::{Invite, InviteView, Membership, Workspace, WorkspaceRole};
use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

use super::{deny, lock_with_role, system_clock, Clock, InviteSettings};
use crate::error::{AppError, ConflictReason, PreconditionReason};
use crate::mailer::{invite_link, InviteMailer};
use crate::policy;
use crate::store::MembershipStore;
use crate::token::generate_invite_token;

#[derive(Debug, Clone, Serialize)]
pub struct IssuedInvite {
    pub invite: Invite,
    pub invite_url: String,
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static email pattern compiles")
    })
}

pub(crate) fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    if !email_regex().is_match(&email) {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    Ok(email)
}

/// Issues, resends, revokes, resolves, accepts and rejects invites.
#[derive(Clone)]
pub struct InviteService {
    store: Arc<dyn MembershipStore>,
    mailer: Arc<dyn InviteMailer>,
    settings: InviteSettings,
    clock: Clock,
}

impl InviteService {
    pub fn new(
        store: Arc<dyn MembershipStore>,
        mailer: Arc<dyn InviteMailer>,
        settings: InviteSettings,
    ) -> Self {
        Self {
            store,
            mailer,
            settings,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub async fn issue(
        &self,
        actor_id: Uuid,
        workspace_id: Uuid,
        email: &str,
        role: WorkspaceRole,
    ) -> Result<IssuedInvite, AppError> {
        let email = normalize_email(email)?;
        if role == WorkspaceRole::Owner {
            return Err(AppError::Validation(
                "Invites cannot grant the owner role".to_string(),
            ));
        }
        let now = (self.clock)();

        let mut tx = self.store.begin().await?;
        let (workspace, actor_role) = lock_with_role(tx.as_mut(), workspace_id, actor_id).await?;

        if !policy::can_invite(actor_role) {
            return Err(deny("only owners and admins can invite"));
        }
        if workspace.is_personal() {
            return Err(deny("personal workspaces cannot be shared"));
        }
        if tx.is_member_email(workspace_id, &email).await? {
            return Err(AppError::Conflict(ConflictReason::AlreadyMember));
        }
        if tx.count_members(workspace_id).await? >= i64::from(workspace.member_limit) {
            return Err(AppError::PreconditionFailed(
                PreconditionReason::MemberLimitReached,
            ));
        }
        if tx
            .find_pending_invite(workspace_id, &email, now)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(ConflictReason::DuplicatePendingInvite));
        }
        if tx.count_pending_invites(workspace_id, now).await? >= self.settings.max_pending_invites {
            return Err(AppError::PreconditionFailed(
                PreconditionReason::TooManyPendingInvites,
            ));
        }

        let invite = Invite {
            id: Uuid::new_v4(),
            workspace_id,
            email,
            token: generate_invite_token(),
            role,
            invited_by: Some(actor_id),
            created_at: now,
            expires_at: now + self.settings.ttl,
            accepted_at: None,
            rejected_at: None,
        };
        tx.insert_invite(&invite).await?;
        tx.commit().await?;

        tracing::info!(
            invite_id = %invite.id,
            workspace_id = %workspace_id,
            inviter = %actor_id,
            "Invite issued"
        );

        let invite_url = self.deliver(&workspace, actor_id, &invite).await;
        Ok(IssuedInvite { invite, invite_url })
    }

    /// New token and a fresh expiry window on the same row.
    pub async fn resend(
        &self,
        actor_id: Uuid,
        workspace_id: Uuid,
        invite_id: Uuid,
    ) -> Result<IssuedInvite, AppError> {
        let now = (self.clock)();

        let mut tx = self.store.begin().await?;
        let (workspace, actor_role) = lock_with_role(tx.as_mut(), workspace_id, actor_id).await?;

        if !policy::can_invite(actor_role) {
            return Err(deny("only owners and admins can resend invites"));
        }

        let mut invite = tx
            .find_invite(invite_id)
            .await?
            .filter(|i| i.workspace_id == workspace_id && i.is_pending(now))
            .ok_or(AppError::NotFound)?;

        invite.token = generate_invite_token();
        invite.expires_at = now + self.settings.ttl;
        tx.refresh_invite(invite.id, &invite.token, invite.expires_at)
            .await?;
        tx.commit().await?;

        tracing::info!(invite_id = %invite.id, workspace_id = %workspace_id, "Invite resent");

        let invite_url = self.deliver(&workspace, actor_id, &invite).await;
        Ok(IssuedInvite { invite, invite_url })
    }

    /// Deletes the invite whatever its state.
    pub async fn revoke(
        &self,
        actor_id: Uuid,
        workspace_id: Uuid,
        invite_id: Uuid,
    ) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        let (_, actor_role) = lock_with_role(tx.as_mut(), workspace_id, actor_id).await?;

        if !policy::can_revoke_invite(actor_role) {
            return Err(deny("only owners and admins can revoke invites"));
        }
        if !tx.delete_invite(workspace_id, invite_id).await? {
            return Err(AppError::NotFound);
        }
        tx.commit().await?;

        tracing::info!(invite_id = %invite_id, workspace_id = %workspace_id, "Invite revoked");
        Ok(())
    }

    /// Unauthenticated lookup for the acceptance landing page.
    pub async fn resolve(&self, token: &str) -> Result<Option<InviteView>, AppError> {
        self.store
            .find_invite_view_by_token(token, (self.clock)())
            .await
    }

    pub async fn accept(
        &self,
        token: &str,
        acting_email: &str,
        acting_user_id: Uuid,
    ) -> Result<Workspace, AppError> {
        let now = (self.clock)();

        let mut tx = self.store.begin().await?;
        let workspace = tx
            .lock_workspace_for_token(token)
            .await?
            .ok_or(AppError::InvalidOrExpired)?;

        // Re-read under the pending predicate inside the transaction; a
        // concurrent accept that committed first makes this come back empty.
        let invite = tx
            .find_pending_invite_by_token(token, now)
            .await?
            .ok_or(AppError::InvalidOrExpired)?;

        if invite.email != acting_email.trim().to_lowercase() {
            return Err(AppError::EmailMismatch);
        }
        if tx
            .get_membership_role(invite.workspace_id, acting_user_id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(ConflictReason::AlreadyMember));
        }
        if tx.count_members(invite.workspace_id).await? >= i64::from(workspace.member_limit) {
            return Err(AppError::PreconditionFailed(
                PreconditionReason::MemberLimitReached,
            ));
        }

        tx.mark_invite_accepted(invite.id, now).await?;
        tx.insert_membership(&Membership {
            workspace_id: invite.workspace_id,
            user_id: acting_user_id,
            role: invite.role,
            joined_at: now,
        })
        .await?;
        tx.commit().await?;

        tracing::info!(
            invite_id = %invite.id,
            workspace_id = %invite.workspace_id,
            user_id = %acting_user_id,
            role = %invite.role,
            "Invite accepted"
        );
        Ok(workspace)
    }

    pub async fn reject(&self, token: &str, acting_email: &str) -> Result<(), AppError> {
        let now = (self.clock)();

        let mut tx = self.store.begin().await?;
        tx.lock_workspace_for_token(token)
            .await?
            .ok_or(AppError::InvalidOrExpired)?;
        let invite = tx
            .find_pending_invite_by_token(token, now)
            .await?
            .ok_or(AppError::InvalidOrExpired)?;

        if invite.email != acting_email.trim().to_lowercase() {
            return Err(AppError::EmailMismatch);
        }

        tx.mark_invite_rejected(invite.id, now).await?;
        tx.commit().await?;

        tracing::info!(invite_id = %invite.id, workspace_id = %invite.workspace_id, "Invite rejected");
        Ok(())
    }

    pub async fn list_pending(
        &self,
        actor_id: Uuid,
        workspace_id: Uuid,
    ) -> Result<Vec<Invite>, AppError> {
        let role = self
            .store
            .get_membership_role(workspace_id, actor_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !policy::can_invite(role) {
            return Err(deny("only owners and admins can view invites"));
        }
        self.store
            .list_pending_invites(workspace_id, (self.clock)())
            .await
    }

    /// The invite is already committed, so a delivery failure must not fail
    /// the call; the caller gets the plain link to share instead.
    async fn deliver(&self, workspace: &Workspace, inviter_id: Uuid, invite: &Invite) -> String {
        let inviter_name = match self.store.get_user(inviter_id).await {
            Ok(Some(user)) => user.display_name,
            Ok(None) => "A teammate".to_string(),
            Err(e) => {
                tracing::warn!(error = %e, inviter_id = %inviter_id, "Failed to load inviter");
                "A teammate".to_string()
            }
        };

        match self
            .mailer
            .send_invite_email(&invite.email, &workspace.name, &inviter_name, &invite.token)
            .await
        {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    invite_id = %invite.id,
                    "Invite delivery failed, returning link"
                );
                invite_link(&self.settings.app_base_url, &invite.token)
            }
        }
    }
}
