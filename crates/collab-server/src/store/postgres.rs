use async_trait::async_trait;
use chrono::{DateTime, Utc};
use collab_shared::{
    Invite, InviteStatus, InviteView, MemberWithUser, Membership, User, Workspace, WorkspaceKind,
    WorkspaceRole, WorkspaceWithRole,
};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::{MembershipStore, StoreTx};
use crate::db::DbPool;
use crate::error::{AppError, ConflictReason};

const PERSONAL_OWNER_INDEX: &str = "workspaces_personal_owner_idx";
const MEMBERS_PKEY: &str = "workspace_members_pkey";
const USERS_EMAIL_KEY: &str = "users_email_key";

const WORKSPACE_COLUMNS: &str =
    "id, name, kind, owner_id, avatar, member_limit, created_at, updated_at";

const INVITE_COLUMNS: &str = "id, workspace_id, email, token, role, invited_by, created_at, \
                              expires_at, accepted_at, rejected_at";

type WorkspaceRow = (
    Uuid,                  // id
    String,                // name
    WorkspaceKind,         // kind
    Uuid,                  // owner_id
    Option<String>,        // avatar
    i32,                   // member_limit
    chrono::DateTime<Utc>, // created_at
    chrono::DateTime<Utc>, // updated_at
);

fn row_to_workspace(row: WorkspaceRow) -> Workspace {
    Workspace {
        id: row.0,
        name: row.1,
        kind: row.2,
        owner_id: row.3,
        avatar: row.4,
        member_limit: row.5,
        created_at: row.6,
        updated_at: row.7,
    }
}

type InviteRow = (
    Uuid,                          // id
    Uuid,                          // workspace_id
    String,                        // email
    String,                        // token
    WorkspaceRole,                 // role
    Option<Uuid>,                  // invited_by
    chrono::DateTime<Utc>,         // created_at
    chrono::DateTime<Utc>,         // expires_at
    Option<chrono::DateTime<Utc>>, // accepted_at
    Option<chrono::DateTime<Utc>>, // rejected_at
);

type InviteViewRow = (
    Uuid,                          // id
    Uuid,                          // workspace_id
    String,                        // email
    WorkspaceRole,                 // role
    chrono::DateTime<Utc>,         // expires_at
    Option<chrono::DateTime<Utc>>, // accepted_at
    Option<chrono::DateTime<Utc>>, // rejected_at
    String,                        // workspace name
    Option<String>,                // inviter display name
);

fn row_to_invite(row: InviteRow) -> Invite {
    Invite {
        id: row.0,
        workspace_id: row.1,
        email: row.2,
        token: row.3,
        role: row.4,
        invited_by: row.5,
        created_at: row.6,
        expires_at: row.7,
        accepted_at: row.8,
        rejected_at: row.9,
    }
}

/// Map unique violations the schema uses for invariants onto typed conflicts.
fn map_constraint(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.constraint() {
            Some(PERSONAL_OWNER_INDEX) => {
                return AppError::Conflict(ConflictReason::PersonalWorkspaceExists)
            }
            Some(MEMBERS_PKEY) => return AppError::Conflict(ConflictReason::AlreadyMember),
            Some(USERS_EMAIL_KEY) => return AppError::Conflict(ConflictReason::EmailTaken),
            _ => {}
        }
    }
    AppError::Database(err)
}

/// Postgres-backed store. Transactions run at the pool's default
/// READ COMMITTED isolation; row locks (`FOR UPDATE`) give the ordering the
/// services rely on.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn get_membership_role(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<WorkspaceRole>, AppError> {
        let role: Option<(WorkspaceRole,)> = sqlx::query_as(
            "SELECT role FROM workspace_members WHERE workspace_id = $1 AND user_id = $2",
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role.map(|(r,)| r))
    }

    async fn count_members(&self, workspace_id: Uuid) -> Result<i64, AppError> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM workspace_members WHERE workspace_id = $1")
                .bind(workspace_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count.0)
    }

    async fn find_pending_invite(
        &self,
        workspace_id: Uuid,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Invite>, AppError> {
        let query = format!(
            r#"
            SELECT {INVITE_COLUMNS}
            FROM workspace_invites
            WHERE workspace_id = $1 AND email = $2
              AND accepted_at IS NULL AND rejected_at IS NULL AND expires_at > $3
            "#
        );
        let row: Option<InviteRow> = sqlx::query_as(&query)
            .bind(workspace_id)
            .bind(email)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(row_to_invite))
    }

    async fn count_pending_invites(
        &self,
        workspace_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM workspace_invites
            WHERE workspace_id = $1
              AND accepted_at IS NULL AND rejected_at IS NULL AND expires_at > $2
            "#,
        )
        .bind(workspace_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }

    async fn get_workspace(&self, workspace_id: Uuid) -> Result<Option<Workspace>, AppError> {
        let query = format!("SELECT {WORKSPACE_COLUMNS} FROM workspaces WHERE id = $1");
        let row: Option<WorkspaceRow> = sqlx::query_as(&query)
            .bind(workspace_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(row_to_workspace))
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let row: Option<(Uuid, String, String, Option<String>, DateTime<Utc>, DateTime<Utc>)> =
            sqlx::query_as(
                "SELECT id, email, display_name, avatar_url, created_at, updated_at FROM users WHERE id = $1",
            )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(
            |(id, email, display_name, avatar_url, created_at, updated_at)| User {
                id,
                email,
                display_name,
                avatar_url,
                created_at,
                updated_at,
            },
        ))
    }

    async fn find_invite_view_by_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<InviteView>, AppError> {
        let row: Option<InviteViewRow> = sqlx::query_as(
            r#"
            SELECT i.id, i.workspace_id, i.email, i.role, i.expires_at,
                   i.accepted_at, i.rejected_at, w.name, u.display_name
            FROM workspace_invites i
            JOIN workspaces w ON w.id = i.workspace_id
            LEFT JOIN users u ON u.id = i.invited_by
            WHERE i.token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let (id, workspace_id, email, role, expires_at, accepted_at, rejected_at) =
                (r.0, r.1, r.2, r.3, r.4, r.5, r.6);
            InviteView {
                id,
                workspace_id,
                workspace_name: r.7,
                email,
                role,
                inviter_name: r.8,
                expires_at,
                status: InviteStatus::derive(accepted_at, rejected_at, expires_at, now),
                is_expired: expires_at <= now,
            }
        }))
    }

    async fn list_workspaces_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<WorkspaceWithRole>, AppError> {
        let rows: Vec<(
            Uuid,
            String,
            WorkspaceKind,
            Uuid,
            Option<String>,
            i32,
            DateTime<Utc>,
            DateTime<Utc>,
            WorkspaceRole,
        )> = sqlx::query_as(
            r#"
            SELECT w.id, w.name, w.kind, w.owner_id, w.avatar, w.member_limit,
                   w.created_at, w.updated_at, wm.role
            FROM workspaces w
            JOIN workspace_members wm ON wm.workspace_id = w.id
            WHERE wm.user_id = $1
            ORDER BY w.kind, w.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| WorkspaceWithRole {
                workspace: row_to_workspace((r.0, r.1, r.2, r.3, r.4, r.5, r.6, r.7)),
                role: r.8,
            })
            .collect())
    }

    async fn list_members(&self, workspace_id: Uuid) -> Result<Vec<MemberWithUser>, AppError> {
        let rows: Vec<(Uuid, String, String, WorkspaceRole, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT u.id, u.email, u.display_name, wm.role, wm.joined_at
            FROM workspace_members wm
            JOIN users u ON u.id = wm.user_id
            WHERE wm.workspace_id = $1
            ORDER BY wm.joined_at
            "#,
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(user_id, email, display_name, role, joined_at)| MemberWithUser {
                user_id,
                email,
                display_name,
                role,
                joined_at,
            })
            .collect())
    }

    async fn list_pending_invites(
        &self,
        workspace_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invite>, AppError> {
        let query = format!(
            r#"
            SELECT {INVITE_COLUMNS}
            FROM workspace_invites
            WHERE workspace_id = $1
              AND accepted_at IS NULL AND rejected_at IS NULL AND expires_at > $2
            ORDER BY created_at DESC
            "#
        );
        let rows: Vec<InviteRow> = sqlx::query_as(&query)
            .bind(workspace_id)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(row_to_invite).collect())
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_workspace(&mut self, workspace_id: Uuid) -> Result<Option<Workspace>, AppError> {
        let query =
            format!("SELECT {WORKSPACE_COLUMNS} FROM workspaces WHERE id = $1 FOR UPDATE");
        let row: Option<WorkspaceRow> = sqlx::query_as(&query)
            .bind(workspace_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(row_to_workspace))
    }

    async fn lock_workspace_for_token(
        &mut self,
        token: &str,
    ) -> Result<Option<Workspace>, AppError> {
        let query = format!(
            r#"
            SELECT {WORKSPACE_COLUMNS} FROM workspaces
            WHERE id = (SELECT workspace_id FROM workspace_invites WHERE token = $1)
            FOR UPDATE
            "#
        );
        let row: Option<WorkspaceRow> = sqlx::query_as(&query)
            .bind(token)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(row_to_workspace))
    }

    async fn get_membership_role(
        &mut self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<WorkspaceRole>, AppError> {
        let role: Option<(WorkspaceRole,)> = sqlx::query_as(
            "SELECT role FROM workspace_members WHERE workspace_id = $1 AND user_id = $2",
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(role.map(|(r,)| r))
    }

    async fn is_member_email(
        &mut self,
        workspace_id: Uuid,
        email: &str,
    ) -> Result<bool, AppError> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM workspace_members wm
                JOIN users u ON u.id = wm.user_id
                WHERE wm.workspace_id = $1 AND lower(u.email) = $2
            )
            "#,
        )
        .bind(workspace_id)
        .bind(email)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists.0)
    }

    async fn count_members(&mut self, workspace_id: Uuid) -> Result<i64, AppError> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM workspace_members WHERE workspace_id = $1")
                .bind(workspace_id)
                .fetch_one(&mut *self.tx)
                .await?;

        Ok(count.0)
    }

    async fn find_pending_invite(
        &mut self,
        workspace_id: Uuid,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Invite>, AppError> {
        let query = format!(
            r#"
            SELECT {INVITE_COLUMNS}
            FROM workspace_invites
            WHERE workspace_id = $1 AND email = $2
              AND accepted_at IS NULL AND rejected_at IS NULL AND expires_at > $3
            "#
        );
        let row: Option<InviteRow> = sqlx::query_as(&query)
            .bind(workspace_id)
            .bind(email)
            .bind(now)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(row_to_invite))
    }

    async fn count_pending_invites(
        &mut self,
        workspace_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM workspace_invites
            WHERE workspace_id = $1
              AND accepted_at IS NULL AND rejected_at IS NULL AND expires_at > $2
            "#,
        )
        .bind(workspace_id)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count.0)
    }

    async fn find_pending_invite_by_token(
        &mut self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Invite>, AppError> {
        // A concurrent accept blocks on the row lock, then re-checks the
        // predicate against the committed accepted_at and finds nothing.
        let query = format!(
            r#"
            SELECT {INVITE_COLUMNS}
            FROM workspace_invites
            WHERE token = $1
              AND accepted_at IS NULL AND rejected_at IS NULL AND expires_at > $2
            FOR UPDATE
            "#
        );
        let row: Option<InviteRow> = sqlx::query_as(&query)
            .bind(token)
            .bind(now)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(row_to_invite))
    }

    async fn find_invite(&mut self, invite_id: Uuid) -> Result<Option<Invite>, AppError> {
        let query = format!("SELECT {INVITE_COLUMNS} FROM workspace_invites WHERE id = $1 FOR UPDATE");
        let row: Option<InviteRow> = sqlx::query_as(&query)
            .bind(invite_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(row_to_invite))
    }

    async fn has_personal_workspace(&mut self, owner_id: Uuid) -> Result<bool, AppError> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM workspaces WHERE owner_id = $1 AND kind = 'personal')",
        )
        .bind(owner_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists.0)
    }

    async fn insert_user(&mut self, user: &User, password_hash: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, display_name, avatar_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(password_hash)
        .bind(&user.display_name)
        .bind(&user.avatar_url)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_constraint)?;

        Ok(())
    }

    async fn insert_workspace(&mut self, workspace: &Workspace) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO workspaces (id, name, kind, owner_id, avatar, member_limit, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(workspace.id)
        .bind(&workspace.name)
        .bind(workspace.kind)
        .bind(workspace.owner_id)
        .bind(&workspace.avatar)
        .bind(workspace.member_limit)
        .bind(workspace.created_at)
        .bind(workspace.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_constraint)?;

        Ok(())
    }

    async fn update_workspace(
        &mut self,
        workspace_id: Uuid,
        name: Option<&str>,
        avatar: Option<Option<&str>>,
        now: DateTime<Utc>,
    ) -> Result<Option<Workspace>, AppError> {
        let query = format!(
            r#"
            UPDATE workspaces
            SET name = COALESCE($1, name),
                avatar = CASE WHEN $2 THEN $3 ELSE avatar END,
                updated_at = $4
            WHERE id = $5
            RETURNING {WORKSPACE_COLUMNS}
            "#
        );
        let row: Option<WorkspaceRow> = sqlx::query_as(&query)
            .bind(name)
            .bind(avatar.is_some())
            .bind(avatar.flatten())
            .bind(now)
            .bind(workspace_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(row_to_workspace))
    }

    async fn delete_workspace(&mut self, workspace_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM workspaces WHERE id = $1")
            .bind(workspace_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_workspace_owner(
        &mut self,
        workspace_id: Uuid,
        owner_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE workspaces SET owner_id = $1, updated_at = $2 WHERE id = $3")
            .bind(owner_id)
            .bind(now)
            .bind(workspace_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn insert_membership(&mut self, membership: &Membership) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO workspace_members (workspace_id, user_id, role, joined_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(membership.workspace_id)
        .bind(membership.user_id)
        .bind(membership.role)
        .bind(membership.joined_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_constraint)?;

        Ok(())
    }

    async fn update_membership_role(
        &mut self,
        workspace_id: Uuid,
        user_id: Uuid,
        role: WorkspaceRole,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE workspace_members SET role = $1 WHERE workspace_id = $2 AND user_id = $3",
        )
        .bind(role)
        .bind(workspace_id)
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_membership(
        &mut self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        let result =
            sqlx::query("DELETE FROM workspace_members WHERE workspace_id = $1 AND user_id = $2")
                .bind(workspace_id)
                .bind(user_id)
                .execute(&mut *self.tx)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_invite(&mut self, invite: &Invite) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO workspace_invites
                (id, workspace_id, email, token, role, invited_by, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(invite.id)
        .bind(invite.workspace_id)
        .bind(&invite.email)
        .bind(&invite.token)
        .bind(invite.role)
        .bind(invite.invited_by)
        .bind(invite.created_at)
        .bind(invite.expires_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn refresh_invite(
        &mut self,
        invite_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result =
            sqlx::query("UPDATE workspace_invites SET token = $1, expires_at = $2 WHERE id = $3")
                .bind(token)
                .bind(expires_at)
                .bind(invite_id)
                .execute(&mut *self.tx)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_invite_accepted(
        &mut self,
        invite_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE workspace_invites SET accepted_at = $1 WHERE id = $2")
            .bind(now)
            .bind(invite_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn mark_invite_rejected(
        &mut self,
        invite_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE workspace_invites SET rejected_at = $1 WHERE id = $2")
            .bind(now)
            .bind(invite_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn delete_invite(
        &mut self,
        workspace_id: Uuid,
        invite_id: Uuid,
    ) -> Result<bool, AppError> {
        let result =
            sqlx::query("DELETE FROM workspace_invites WHERE id = $1 AND workspace_id = $2")
                .bind(invite_id)
                .bind(workspace_id)
                .execute(&mut *self.tx)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}
