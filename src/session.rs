use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::{Authenticator, RouteRequirement};
use crate::db::row_parsers::db_user_from_row;
use crate::errors::{AppError, AppResult};
use crate::jwt::JwtConfig;
use crate::models::user::User;

/// Query parameter the HLS player uses to carry the session token.
const TOKEN_QUERY_PARAM: &str = "token";

/// Resolves the actor behind a request from its session token.
#[derive(Debug, Clone)]
pub struct SessionService {
    pool: SqlitePool,
    jwt: Arc<JwtConfig>,
}

impl SessionService {
    pub fn new(pool: SqlitePool, jwt: Arc<JwtConfig>) -> Self {
        Self { pool, jwt }
    }

    fn token(parts: &Parts) -> Option<String> {
        let bearer = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_owned);

        bearer.or_else(|| {
            Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(query)| query.get(TOKEN_QUERY_PARAM).cloned())
        })
    }

    pub async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, name, email, role, revoked, confirmed_email, created_at FROM users WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(db_user_from_row).transpose()
    }
}

#[async_trait]
impl Authenticator for SessionService {
    async fn retrieve_user(&self, parts: &Parts) -> AppResult<Option<User>> {
        let Some(token) = Self::token(parts) else {
            return Ok(None);
        };

        let claims = self.jwt.decode(&token)?;
        let user = self.find_user(claims.sub).await?;

        if user.is_none() {
            tracing::debug!(user_id = %claims.sub, "token subject has no user record");
        }

        Ok(user)
    }

    fn allow_no_rules_access(&self, parts: &Parts) -> bool {
        parts
            .extensions
            .get::<RouteRequirement>()
            .map_or(true, |requirement| requirement.0.is_none())
    }
}

/// The actor the authorization guard resolved for this request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<User>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::unauthorized("Authorization header missing"))
    }
}
