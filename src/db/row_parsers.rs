use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::download::Download;
use crate::models::media::{Media, Video, View};
use crate::models::user::{Role, User};

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, AppError> {
    let s = s.trim();

    // RFC3339, as written by this service (e.g. 2025-11-19T12:34:56.123+00:00)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // SQLite CURRENT_TIMESTAMP: "YYYY-MM-DD HH:MM:SS" (optional fraction)
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(naive_date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = naive_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::internal("invalid datetime: date out of range".to_string()))?;
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(AppError::internal(format!("invalid datetime: {}", s)))
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, AppError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| AppError::internal(format!("missing {}: {}", name, e)))
}

fn uuid_column(row: &SqliteRow, name: &str) -> Result<Uuid, AppError> {
    let s: String = column(row, name)?;
    Uuid::parse_str(&s).map_err(|e| AppError::internal(format!("invalid uuid in {}: {}", name, e)))
}

fn datetime_column(row: &SqliteRow, name: &str) -> Result<DateTime<Utc>, AppError> {
    let s: String = column(row, name)?;
    parse_datetime(&s)
}

pub fn db_user_from_row(row: &SqliteRow) -> Result<User, AppError> {
    let role: String = column(row, "role")?;

    Ok(User {
        id: uuid_column(row, "id")?,
        name: column(row, "name")?,
        email: column(row, "email")?,
        role: role.parse::<Role>()?,
        revoked: column(row, "revoked")?,
        confirmed_email: column(row, "confirmed_email")?,
        created_at: datetime_column(row, "created_at")?,
    })
}

pub fn db_download_from_row(row: &SqliteRow) -> Result<Download, AppError> {
    Ok(Download {
        id: uuid_column(row, "id")?,
        location: column(row, "location")?,
        user_id: uuid_column(row, "user_id")?,
        view_id: uuid_column(row, "view_id")?,
        created_at: datetime_column(row, "created_at")?,
    })
}

/// Expects the joined view/video/media projection used by `view_closure`.
pub fn db_view_from_row(row: &SqliteRow) -> Result<View, AppError> {
    let media = Media {
        id: uuid_column(row, "media_id")?,
        name: column(row, "media_name")?,
        available: column(row, "media_available")?,
    };

    let video = Video {
        id: uuid_column(row, "video_id")?,
        media_id: media.id,
        location: column(row, "video_location")?,
        media,
    };

    Ok(View {
        id: uuid_column(row, "view_id")?,
        user_id: uuid_column(row, "view_user_id")?,
        video_id: video.id,
        created_at: datetime_column(row, "view_created_at")?,
        video,
    })
}
