use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Download {
    pub id: Uuid,
    /// Public identifier; this is what `downloadId` in a request path refers to.
    pub location: String,
    pub user_id: Uuid,
    pub view_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Download {
    pub fn new(user_id: Uuid, view_id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            location: Uuid::new_v4().to_string(),
            user_id,
            view_id,
            created_at,
        }
    }

    /// Whether the download is still actionable at `now`.
    pub fn within_grace(&self, now: DateTime<Utc>, grace: chrono::Duration) -> bool {
        now - self.created_at < grace
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDownloadRequest {
    #[schema(example = "5f1e8a44-3c55-4d7e-a1d0-2a8c07a9b6d1")]
    pub view_id: Uuid,
}
