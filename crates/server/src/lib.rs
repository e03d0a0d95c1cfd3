pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod models;
pub mod notifier;
pub mod polls;
pub mod routes;
pub mod tally;
pub mod votes;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    middleware,
    response::{IntoResponse, Redirect},
    routing::{delete, get, post},
};
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::Config;
use crate::notifier::Notifier;
use crate::routes::{admin, api, display};

// ===== App State =====

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub notifier: Notifier,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: Config) -> Self {
        Self {
            db,
            notifier: Notifier::new(),
            config: Arc::new(config),
        }
    }
}

// ===== Router =====

pub fn router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/polls", get(admin::list_polls).post(admin::create_poll))
        .route("/polls/:id", delete(admin::delete_poll))
        .route("/polls/:id/activate", post(admin::activate_poll))
        .route("/polls/:id/delete", post(admin::delete_poll))
        .route("/polls/:id/edit", post(admin::edit_poll))
        .route("/polls/:id/votes", post(admin::set_votes))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin_secret,
        ));

    let vote_routes = Router::new()
        .route("/vote", post(api::vote))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_vote_password,
        ));

    let api_routes = Router::new()
        .route("/display/data", get(api::display_data))
        .route("/display/completed", get(api::completed))
        .merge(vote_routes);

    Router::new()
        .route("/", get(|| async { Redirect::to("/display") }))
        .route("/health", get(health))
        .route("/display", get(display::live))
        .route("/display-no-votes", get(display::no_votes))
        .route("/display-completed", get(display::completed))
        .route("/ws", get(notifier::ws_handler))
        .nest("/api", api_routes)
        .nest("/admin", admin_routes)
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => Json(serde_json::json!({
            "status": "ok",
            "database": "connected"
        })),
        Err(_) => Json(serde_json::json!({
            "status": "error",
            "database": "disconnected"
        })),
    }
}
