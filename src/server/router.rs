use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{
    Router,
    routing::{get, post},
};

use super::{changes, projects, realtime};
use crate::config::ServerConfig;
use crate::identity::Directory;
use crate::presence::PresenceHub;
use crate::workspace::Workspace;

pub struct AppState {
    pub workspace: Workspace,
    pub presence: Arc<PresenceHub>,
    /// Bearer credentials. Also the role oracle unless the workspace was
    /// built with another one.
    pub directory: Arc<Directory>,
    pub config: ServerConfig,
}

impl AppState {
    /// Wires a workspace and presence hub around `directory`.
    #[must_use]
    pub fn new(directory: Arc<Directory>, config: ServerConfig) -> Self {
        let presence = Arc::new(PresenceHub::new(config.presence_idle_timeout));
        let workspace = Workspace::new(directory.clone(), &config).with_listener(presence.clone());
        Self {
            workspace,
            presence,
            directory,
            config,
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Projects
        .route(
            "/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route("/projects/{id}", get(projects::get_project))
        .route("/projects/{id}/members", post(projects::add_member))
        .route("/projects/{id}/content", post(projects::update_content))
        .route(
            "/projects/{id}/staged-changes",
            get(projects::list_staged_changes),
        )
        .route("/projects/{id}/history", get(projects::history))
        .route("/projects/{id}/edit-history", get(projects::edit_history))
        // Review
        .route(
            "/staged-changes/{id}",
            get(changes::get_change).put(changes::review_change),
        )
        // Realtime
        .route("/presence/{id}", get(realtime::list_presence))
        .route("/ws", get(realtime::ws_handler))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
