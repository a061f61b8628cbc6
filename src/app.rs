use std::sync::Arc;

use axum::http::Method;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use chrono::Duration;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::downloads::grace_period_from_env;
use crate::authz::{
    authorize_request, Action, AuthorizationGuard, DefaultMediaAccessPolicy, DownloadsAuthorizer, Guarded, Subject,
};
use crate::db::{DownloadStore, SqliteDownloadStore};
use crate::docs;
use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::routes::{downloads, health};
use crate::session::SessionService;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub store: Arc<dyn DownloadStore>,
    pub guard: Arc<AuthorizationGuard>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, grace_period: Duration) -> Self {
        let jwt = Arc::new(jwt);
        let store: Arc<dyn DownloadStore> = Arc::new(SqliteDownloadStore::new(pool.clone()));
        let session = Arc::new(SessionService::new(pool.clone(), Arc::clone(&jwt)));
        let downloads = Arc::new(DownloadsAuthorizer::new(
            Arc::clone(&store),
            Arc::new(DefaultMediaAccessPolicy::new()),
            grace_period,
        ));
        let guard = AuthorizationGuard::new(session).with_authorizer(downloads);

        Self {
            pool,
            jwt,
            store,
            guard: Arc::new(guard),
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let grace_period = grace_period_from_env()?;
    Ok(router(AppState::new(pool, jwt_config, grace_period)))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let read = Guarded::require(&state, Action::Read, Subject::Download);
    let create = Guarded::require(&state, Action::Create, Subject::Download);

    // `downloadId` is the path parameter the download authorizer resolves
    let download_routes = Router::new()
        .route(
            "/",
            get(downloads::list_downloads).route_layer(from_fn_with_state(read.clone(), authorize_request)),
        )
        .route(
            "/",
            post(downloads::create_download).route_layer(from_fn_with_state(create, authorize_request)),
        )
        .route(
            "/:downloadId",
            get(downloads::get_download).route_layer(from_fn_with_state(read, authorize_request)),
        );

    Router::new()
        .route("/api/health", get(health::health))
        .route("/api-docs/openapi.json", get(docs::openapi_json))
        .nest("/downloads", download_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
