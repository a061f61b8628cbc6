use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub db_ok: bool,
    /// Rows in `downloads`; absent when the store is unreachable or unmigrated.
    pub downloads: Option<i64>,
    pub db_error: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, description = "Store reachability and download count", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM downloads")
        .fetch_one(&state.pool)
        .await;

    let response = match count {
        Ok(downloads) => HealthResponse {
            status: "ok",
            db_ok: true,
            downloads: Some(downloads),
            db_error: None,
        },
        Err(err) => {
            tracing::warn!(error = %err, "health probe failed");
            HealthResponse {
                status: "degraded",
                db_ok: false,
                downloads: None,
                db_error: Some(err.to_string()),
            }
        }
    };

    Json(response)
}
