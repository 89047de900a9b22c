use serde::{Deserialize, Serialize};

use crate::models::{Invite, WorkspaceRole};

#[derive(Debug, Serialize, Deserialize)]
pub struct InviteMemberRequest {
    pub email: String,
    #[serde(default = "default_invite_role")]
    pub role: WorkspaceRole,
}

fn default_invite_role() -> WorkspaceRole {
    WorkspaceRole::Member
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InviteIssuedResponse {
    #[serde(flatten)]
    pub invite: Invite,
    pub invite_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InviteResentResponse {
    pub invite_url: String,
}
