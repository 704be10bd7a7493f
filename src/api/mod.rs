//! REST surface over the checklist store

mod checklists;
mod drafts;
mod envelope;
mod request_trace;
mod submissions;

pub use envelope::{ApiError, ApiResult, Envelope};
pub use request_trace::REQUEST_ID_HEADER;

use crate::config::Config;
use crate::db::ChecklistDb;
use crate::error::Result;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: ChecklistDb,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: ChecklistDb, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let max_body = state.config.server.max_body_bytes;

    Router::new()
        .route("/healthz", get(healthz))
        // Templates
        .route("/checklists", get(checklists::index).post(checklists::store))
        .route("/checklists/active", get(checklists::active))
        .route("/checklists/active/validate", post(checklists::validate_active))
        .route(
            "/checklists/:checklist_id",
            get(checklists::show)
                .put(checklists::update)
                .delete(checklists::destroy),
        )
        .route(
            "/checklists/:checklist_id/sections",
            get(checklists::section_index).post(checklists::section_store),
        )
        .route(
            "/checklists/:checklist_id/sections/reorder",
            post(checklists::section_reorder),
        )
        .route(
            "/checklists/:checklist_id/sections/:section_id",
            get(checklists::section_show)
                .put(checklists::section_update)
                .delete(checklists::section_destroy),
        )
        .route(
            "/checklists/:checklist_id/sections/:section_id/questions",
            get(checklists::question_index).post(checklists::question_store),
        )
        .route(
            "/checklists/:checklist_id/sections/:section_id/questions/reorder",
            post(checklists::question_reorder),
        )
        .route(
            "/checklists/:checklist_id/sections/:section_id/questions/:question_id",
            get(checklists::question_show)
                .put(checklists::question_update)
                .delete(checklists::question_destroy),
        )
        .route(
            "/checklists/:checklist_id/sections/:section_id/questions/:question_id/validation-rules",
            get(checklists::question_rules),
        )
        // Per-installation checklist flow
        .route(
            "/installations/:installation_id/checklist/structure",
            get(submissions::structure),
        )
        .route(
            "/installations/:installation_id/checklist/draft",
            get(drafts::show).post(drafts::save).delete(drafts::destroy),
        )
        .route(
            "/installations/:installation_id/checklist/submit",
            post(submissions::submit),
        )
        .route(
            "/installations/:installation_id/checklists",
            get(submissions::index),
        )
        .route("/installations/:installation_id/drafts", get(drafts::index))
        .route(
            "/installations/:installation_id/drafts/:draft_id",
            get(drafts::show_by_id).delete(drafts::destroy_by_id),
        )
        // Draft maintenance
        .route("/drafts/stats", get(drafts::stats))
        .route("/drafts/stale", get(drafts::stale))
        .route("/drafts/cleanup", post(drafts::cleanup))
        // Submission lifecycle
        .route(
            "/submissions/:submission_id",
            get(submissions::show).delete(submissions::destroy),
        )
        .route("/submissions/:submission_id/verify", post(submissions::verify))
        .route(
            "/submissions/:submission_id/answers/:question_code",
            get(submissions::answer),
        )
        .layer(DefaultBodyLimit::max(max_body))
        .layer(middleware::from_fn(request_trace::request_tracing_middleware))
        .with_state(state)
}

/// Serve the API until Ctrl-C
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
