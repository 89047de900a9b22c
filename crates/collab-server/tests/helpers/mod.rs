#![allow(dead_code)]

pub mod postgres;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use collab_server::error::AppError;
use collab_server::mailer::{invite_link, InviteMailer};
use collab_server::services::{
    Clock, InviteService, InviteSettings, MembershipCoordinator, WorkspaceDefaults,
    WorkspaceLifecycle,
};
use collab_server::store::{MembershipStore, MemoryStore};
use collab_shared::{User, Workspace, WorkspaceRole};

/// Captures every delivery instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SentInvite>>,
}

#[derive(Debug, Clone)]
pub struct SentInvite {
    pub to: String,
    pub workspace_name: String,
    pub inviter_name: String,
    pub token: String,
}

impl RecordingMailer {
    pub fn last(&self) -> Option<SentInvite> {
        self.sent.lock().unwrap().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl InviteMailer for RecordingMailer {
    async fn send_invite_email(
        &self,
        to_email: &str,
        workspace_name: &str,
        inviter_name: &str,
        token: &str,
    ) -> Result<String, AppError> {
        self.sent.lock().unwrap().push(SentInvite {
            to: to_email.to_string(),
            workspace_name: workspace_name.to_string(),
            inviter_name: inviter_name.to_string(),
            token: token.to_string(),
        });
        Ok(invite_link("http://test.local", token))
    }
}

/// Mail API that is always down.
pub struct FailingMailer;

#[async_trait]
impl InviteMailer for FailingMailer {
    async fn send_invite_email(
        &self,
        _to_email: &str,
        _workspace_name: &str,
        _inviter_name: &str,
        _token: &str,
    ) -> Result<String, AppError> {
        Err(AppError::Internal(anyhow::anyhow!("smtp down")))
    }
}

/// Manually advanced clock shared between the test and the services.
#[derive(Clone)]
pub struct TestClock(Arc<Mutex<DateTime<Utc>>>);

impl TestClock {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Utc::now())))
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }

    pub fn as_clock(&self) -> Clock {
        let inner = self.0.clone();
        Arc::new(move || *inner.lock().unwrap())
    }
}

pub struct Harness {
    pub store: MemoryStore,
    pub settings: InviteSettings,
    pub mailer: Arc<RecordingMailer>,
    pub clock: TestClock,
    pub workspaces: WorkspaceLifecycle,
    pub invites: InviteService,
    pub members: MembershipCoordinator,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(InviteSettings::default(), WorkspaceDefaults::default())
    }

    pub fn with_settings(settings: InviteSettings, defaults: WorkspaceDefaults) -> Self {
        let store = MemoryStore::new();
        let shared: Arc<dyn MembershipStore> = Arc::new(store.clone());
        let mailer = Arc::new(RecordingMailer::default());
        let clock = TestClock::new();

        Self {
            workspaces: WorkspaceLifecycle::new(shared.clone(), defaults)
                .with_clock(clock.as_clock()),
            invites: InviteService::new(shared.clone(), mailer.clone(), settings.clone())
                .with_clock(clock.as_clock()),
            members: MembershipCoordinator::new(shared).with_clock(clock.as_clock()),
            store,
            settings,
            mailer,
            clock,
        }
    }

    /// Invite service over the same store and clock, delivering through `mailer`.
    pub fn invites_via(&self, mailer: Arc<dyn InviteMailer>) -> InviteService {
        InviteService::new(Arc::new(self.store.clone()), mailer, self.settings.clone())
            .with_clock(self.clock.as_clock())
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock.as_clock())()
    }

    pub async fn user(&self, email: &str) -> User {
        let name = email.split('@').next().unwrap_or(email);
        self.store.add_user(email, name).await
    }

    pub async fn team(&self, owner: &User) -> Workspace {
        self.workspaces
            .create(owner.id, "Team", None)
            .await
            .expect("create team workspace")
    }

    /// Invite `user` and accept on their behalf.
    pub async fn join(&self, owner: &User, workspace: &Workspace, user: &User, role: WorkspaceRole) {
        let issued = self
            .invites
            .issue(owner.id, workspace.id, &user.email, role)
            .await
            .expect("issue invite");
        self.invites
            .accept(&issued.invite.token, &user.email, user.id)
            .await
            .expect("accept invite");
    }

    pub async fn role_of(&self, workspace: &Workspace, user: &User) -> Option<WorkspaceRole> {
        self.store
            .get_membership_role(workspace.id, user.id)
            .await
            .unwrap()
    }
}
