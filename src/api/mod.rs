use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use time;

use crate::config::Config;
use crate::db::Store;
use crate::services::{Mailer, ProfileImageService, ResetTokens};

mod account;
pub mod auth;
mod error;
mod observability;
mod pages;
mod password;
mod posts;
mod types;
mod validation;

pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

pub struct AppState {
    pub config: Config,

    pub store: Store,

    pub reset_tokens: ResetTokens,

    pub mailer: Mailer,

    pub images: ProfileImageService,

    pub prometheus_handle: Option<PrometheusHandle>,
}

pub async fn create_app_state(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let mut config = config;
    config.security.ensure_secret();

    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let reset_tokens = ResetTokens::new(
        &config.security.secret_key,
        std::time::Duration::from_secs(config.security.reset_token_ttl_seconds),
    );

    let mailer =
        Mailer::new(&config.mail).map_err(|e| anyhow::anyhow!("Failed to set up mailer: {e}"))?;

    let images = ProfileImageService::new(&config.general.uploads_path);
    tokio::fs::create_dir_all(&config.general.uploads_path)
        .await
        .ok();

    Ok(Arc::new(AppState {
        config,
        store,
        reset_tokens,
        mailer,
        images,
        prometheus_handle,
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    let uploads_path = state.config.general.uploads_path.clone();
    let cors_origins = state.config.server.cors_allowed_origins.clone();
    let secure_cookies = state.config.server.secure_cookies;
    let session_ttl = state.config.server.session_ttl_minutes;

    let protected_routes = create_protected_router();

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(session_ttl)));

    let app_router = Router::new()
        .merge(protected_routes)
        .route("/", get(posts::home))
        .route("/home", get(posts::home))
        .route("/about", get(pages::about))
        .route("/register", get(auth::register_form).post(auth::register))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/post/{id}", get(posts::get_post).post(posts::get_post))
        .route("/user/{username}", get(posts::user_posts))
        .route(
            "/forget_password",
            get(password::forget_password_form).post(password::forget_password),
        )
        .route(
            "/reset_password/{token}",
            get(password::reset_password_form).post(password::reset_password),
        )
        .layer(session_layer)
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .merge(app_router)
        .nest_service("/uploads", ServeDir::new(uploads_path))
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::track_metrics))
}

fn create_protected_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/account", get(account::account))
        .route(
            "/update_info",
            get(account::update_info_form).post(account::update_info),
        )
        .route(
            "/post/new",
            get(posts::new_post_form).post(posts::create_post),
        )
        .route(
            "/post/{id}/update",
            get(posts::update_post_form).post(posts::update_post),
        )
        .route("/post/{id}/delete", post(posts::delete_post))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn(auth::auth_middleware))
}
