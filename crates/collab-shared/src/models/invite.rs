use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::WorkspaceRole;

pub const INVITE_TTL_DAYS: i64 = 7;
pub const MAX_PENDING_INVITES: i64 = 20;

/// Invite lifecycle. Expiry is never written; it is derived from `expires_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

impl InviteStatus {
    /// Terminal states win over expiry: an accepted invite stays accepted
    /// after its window closes.
    pub fn derive(
        accepted_at: Option<DateTime<Utc>>,
        rejected_at: Option<DateTime<Utc>>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        if accepted_at.is_some() {
            Self::Accepted
        } else if rejected_at.is_some() {
            Self::Rejected
        } else if expires_at <= now {
            Self::Expired
        } else {
            Self::Pending
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub token: String,
    pub role: WorkspaceRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invited_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
}

impl Invite {
    pub fn status(&self, now: DateTime<Utc>) -> InviteStatus {
        InviteStatus::derive(self.accepted_at, self.rejected_at, self.expires_at, now)
    }

    pub fn is_pending(&self, now: DateTime<Utc>) -> bool {
        self.status(now) == InviteStatus::Pending
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Public view of an invite for the acceptance landing page. Carries no token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteView {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub workspace_name: String,
    pub email: String,
    pub role: WorkspaceRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inviter_name: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub status: InviteStatus,
    pub is_expired: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invite(now: DateTime<Utc>) -> Invite {
        Invite {
            id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            email: "bob@x.com".to_string(),
            token: "t".repeat(43),
            role: WorkspaceRole::Member,
            invited_by: None,
            created_at: now,
            expires_at: now + Duration::days(INVITE_TTL_DAYS),
            accepted_at: None,
            rejected_at: None,
        }
    }

    #[test]
    fn fresh_invite_is_pending() {
        let now = Utc::now();
        assert_eq!(invite(now).status(now), InviteStatus::Pending);
    }

    #[test]
    fn expiry_is_computed_at_read_time() {
        let now = Utc::now();
        let inv = invite(now);
        let later = now + Duration::days(INVITE_TTL_DAYS) + Duration::seconds(1);
        assert_eq!(inv.status(later), InviteStatus::Expired);
        assert!(!inv.is_pending(later));
    }

    #[test]
    fn accepted_is_terminal_even_after_expiry() {
        let now = Utc::now();
        let mut inv = invite(now);
        inv.accepted_at = Some(now);
        let later = now + Duration::days(30);
        assert_eq!(inv.status(later), InviteStatus::Accepted);
    }

    #[test]
    fn token_is_never_serialized() {
        let now = Utc::now();
        let json = serde_json::to_value(invite(now)).unwrap();
        assert!(json.get("token").is_none());
    }
}
