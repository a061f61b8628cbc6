use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub id: Uuid,
    pub name: String,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: Uuid,
    pub media_id: Uuid,
    pub location: String,
    pub media: Media,
}

/// A watch session: one user on one video. Parent of a download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct View {
    pub id: Uuid,
    pub user_id: Uuid,
    pub video_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub video: Video,
}

impl View {
    pub fn to_closure(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
