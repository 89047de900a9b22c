use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::auth::auth_middleware;
use crate::config::Config;
use crate::db::DbPool;
use crate::handlers::{
    auth as auth_handlers, invites as invite_handlers, members as member_handlers,
    workspaces as workspace_handlers,
};
use crate::mailer::InviteMailer;
use crate::services::{InviteService, MembershipCoordinator, WorkspaceLifecycle};
use crate::store::MembershipStore;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub store: Arc<dyn MembershipStore>,
    pub workspaces: WorkspaceLifecycle,
    pub invites: InviteService,
    pub members: MembershipCoordinator,
}

impl AppState {
    pub fn new(
        db: DbPool,
        config: Config,
        store: Arc<dyn MembershipStore>,
        mailer: Arc<dyn InviteMailer>,
    ) -> Self {
        let workspaces = WorkspaceLifecycle::new(store.clone(), (&config).into());
        let invites = InviteService::new(store.clone(), mailer, (&config).into());
        let members = MembershipCoordinator::new(store.clone());

        Self {
            db,
            config,
            store,
            workspaces,
            invites,
            members,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let public_auth_routes = Router::new()
        .route("/register", post(auth_handlers::register))
        .route("/login", post(auth_handlers::login));

    let protected_auth_routes = Router::new()
        .route("/me", get(auth_handlers::me))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let auth_routes = Router::new()
        .merge(public_auth_routes)
        .merge(protected_auth_routes);

    // The landing page resolves a token before the visitor has signed in.
    let public_invite_routes =
        Router::new().route("/:token", get(invite_handlers::resolve_invite));

    let protected_invite_routes = Router::new()
        .route("/:token/accept", post(invite_handlers::accept_invite))
        .route("/:token/reject", post(invite_handlers::reject_invite))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let invite_routes = Router::new()
        .merge(public_invite_routes)
        .merge(protected_invite_routes);

    let workspace_routes = Router::new()
        .route("/", post(workspace_handlers::create_workspace))
        .route("/", get(workspace_handlers::list_workspaces))
        .route("/:id", get(workspace_handlers::get_workspace))
        .route("/:id", patch(workspace_handlers::update_workspace))
        .route("/:id", delete(workspace_handlers::delete_workspace))
        .route("/:id/transfer", post(member_handlers::transfer_ownership))
        .route("/:id/leave", post(member_handlers::leave_workspace))
        .route("/:id/members", get(member_handlers::list_members))
        .route("/:id/members/:user_id", patch(member_handlers::update_member_role))
        .route("/:id/members/:user_id", delete(member_handlers::remove_member))
        .route("/:id/invites", get(invite_handlers::list_invites))
        .route("/:id/invites", post(invite_handlers::create_invite))
        .route("/:id/invites/:invite_id", delete(invite_handlers::revoke_invite))
        .route(
            "/:id/invites/:invite_id/resend",
            post(invite_handlers::resend_invite),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1/auth", auth_routes)
        .nest("/api/v1/invites", invite_routes)
        .nest("/api/v1/workspaces", workspace_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
