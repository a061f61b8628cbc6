use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::authz::Predicate;
use crate::errors::AppResult;
use crate::models::download::Download;
use crate::models::media::View;

use super::row_parsers::{db_download_from_row, db_view_from_row};
use super::sql::push_predicate;

const DOWNLOAD_COLUMNS: &str = "SELECT t0.id, t0.location, t0.user_id, t0.view_id, t0.created_at FROM downloads AS t0 WHERE ";

/// Persistence for downloads, queried through authorization predicates.
#[async_trait]
pub trait DownloadStore: Send + Sync {
    async fn find_first(&self, predicate: &Predicate) -> AppResult<Option<Download>>;

    /// Newest first.
    async fn find_all(&self, predicate: &Predicate) -> AppResult<Vec<Download>>;

    /// The view with its video and media, if it exists.
    async fn view_closure(&self, view_id: Uuid) -> AppResult<Option<View>>;

    async fn insert(&self, download: &Download) -> AppResult<()>;
}

#[derive(Debug, Clone)]
pub struct SqliteDownloadStore {
    pool: SqlitePool,
}

impl SqliteDownloadStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DownloadStore for SqliteDownloadStore {
    async fn find_first(&self, predicate: &Predicate) -> AppResult<Option<Download>> {
        let mut builder = QueryBuilder::<Sqlite>::new(DOWNLOAD_COLUMNS);
        push_predicate(&mut builder, predicate, "t0");
        builder.push(" ORDER BY t0.created_at DESC LIMIT 1");

        let row = builder.build().fetch_optional(&self.pool).await?;
        row.as_ref().map(db_download_from_row).transpose()
    }

    async fn find_all(&self, predicate: &Predicate) -> AppResult<Vec<Download>> {
        let mut builder = QueryBuilder::<Sqlite>::new(DOWNLOAD_COLUMNS);
        push_predicate(&mut builder, predicate, "t0");
        builder.push(" ORDER BY t0.created_at DESC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(db_download_from_row).collect()
    }

    async fn view_closure(&self, view_id: Uuid) -> AppResult<Option<View>> {
        let row = sqlx::query(
            "SELECT v.id AS view_id, v.user_id AS view_user_id, v.created_at AS view_created_at, \
             vi.id AS video_id, vi.location AS video_location, \
             m.id AS media_id, m.name AS media_name, m.available AS media_available \
             FROM views v \
             JOIN videos vi ON vi.id = v.video_id \
             JOIN media m ON m.id = vi.media_id \
             WHERE v.id = ?",
        )
        .bind(view_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(db_view_from_row).transpose()
    }

    async fn insert(&self, download: &Download) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO downloads (id, location, user_id, view_id, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(download.id.to_string())
        .bind(&download.location)
        .bind(download.user_id.to_string())
        .bind(download.view_id.to_string())
        .bind(download.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
