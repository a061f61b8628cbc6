use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde_json::json;

use crate::app::AppState;
use crate::authz::{Action, PermissionSet, Subject};
use crate::errors::{AppError, AppResult};
use crate::models::download::{CreateDownloadRequest, Download};
use crate::session::CurrentUser;
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/downloads",
    tag = "Downloads",
    responses((status = 200, description = "Downloads the caller may read", body = [Download])),
    security(("bearerAuth" = []))
)]
pub async fn list_downloads(
    State(state): State<AppState>,
    Extension(ability): Extension<Arc<PermissionSet>>,
) -> AppResult<Json<Vec<Download>>> {
    let readable = ability.accessible_by(Action::Read, Subject::Download);
    let downloads = state.store.find_all(&readable).await?;

    Ok(Json(downloads))
}

#[utoipa::path(
    post,
    path = "/downloads",
    tag = "Downloads",
    request_body = CreateDownloadRequest,
    responses(
        (status = 201, description = "Download created", body = Download),
        (status = 404, description = "View not found or not downloadable")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_download(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Extension(ability): Extension<Arc<PermissionSet>>,
    Json(payload): Json<CreateDownloadRequest>,
) -> AppResult<(StatusCode, Json<Download>)> {
    let view = state
        .store
        .view_closure(payload.view_id)
        .await?
        .ok_or_else(|| AppError::not_found("view not found"))?;

    let candidate = json!({
        "user_id": actor.id,
        "view_id": view.id,
        "view": view.to_closure(),
    });

    if !ability.can(Action::Create, Subject::Download, &candidate) {
        tracing::info!(user_id = %actor.id, view_id = %view.id, "download creation refused");
        return Err(AppError::not_found("view not found"));
    }

    let download = Download::new(actor.id, view.id, utc_now());
    state.store.insert(&download).await?;

    tracing::info!(user_id = %actor.id, download = %download.location, "download created");

    Ok((StatusCode::CREATED, Json(download)))
}

#[utoipa::path(
    get,
    path = "/downloads/{downloadId}",
    tag = "Downloads",
    params(("downloadId" = String, Path, description = "Download location")),
    responses(
        (status = 200, description = "Download detail", body = Download),
        (status = 404, description = "Download not found or expired")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_download(Extension(download): Extension<Download>) -> Json<Download> {
    Json(download)
}
