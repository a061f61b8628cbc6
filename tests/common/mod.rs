#![allow(dead_code)]

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use frames_downloads::jwt::JwtConfig;
use frames_downloads::{router, AppState};

pub const SECRET: &str = "test-secret";

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    pub jwt: JwtConfig,
    pub grace: Duration,
    // keeps the database file alive for the test
    _dir: TempDir,
}

pub async fn setup() -> Result<TestApp> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("test.db");
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    let jwt = JwtConfig::new(SECRET, 1);
    let grace = Duration::hours(24);
    let app = router(AppState::new(pool.clone(), jwt.clone(), grace));

    Ok(TestApp {
        app,
        pool,
        jwt,
        grace,
        _dir: dir,
    })
}

impl TestApp {
    pub async fn user(&self, role: &str, revoked: bool, confirmed_email: bool) -> Result<(Uuid, String)> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO users (id, name, email, role, revoked, confirmed_email, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)")
            .bind(id.to_string())
            .bind("Test User")
            .bind(format!("{id}@example.com"))
            .bind(role)
            .bind(revoked)
            .bind(confirmed_email)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;

        let token = self.jwt.encode(id)?;
        Ok((id, token))
    }

    pub async fn member(&self) -> Result<(Uuid, String)> {
        self.user("USER", false, true).await
    }

    /// Inserts media -> video -> view for `user_id`; returns the view id.
    pub async fn view(&self, user_id: Uuid, media_available: bool) -> Result<Uuid> {
        let media_id = Uuid::new_v4();
        let video_id = Uuid::new_v4();
        let view_id = Uuid::new_v4();

        sqlx::query("INSERT INTO media (id, name, available) VALUES (?, ?, ?)")
            .bind(media_id.to_string())
            .bind("Some Film")
            .bind(media_available)
            .execute(&self.pool)
            .await?;
        sqlx::query("INSERT INTO videos (id, media_id, location) VALUES (?, ?, ?)")
            .bind(video_id.to_string())
            .bind(media_id.to_string())
            .bind("/media/some-film.m3u8")
            .execute(&self.pool)
            .await?;
        sqlx::query("INSERT INTO views (id, user_id, video_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(view_id.to_string())
            .bind(user_id.to_string())
            .bind(video_id.to_string())
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(view_id)
    }

    /// Inserts a download and returns its location.
    pub async fn download(&self, user_id: Uuid, view_id: Uuid, created_at: DateTime<Utc>) -> Result<String> {
        let location = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO downloads (id, location, user_id, view_id, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(Uuid::new_v4().to_string())
            .bind(&location)
            .bind(user_id.to_string())
            .bind(view_id.to_string())
            .bind(created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(location)
    }

    pub async fn send(&self, req: Request<Body>) -> Result<(StatusCode, Value)> {
        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let body_bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)?
        };
        Ok((status, value))
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        self.send(builder.body(Body::empty())?).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::from(body.to_string()))?;
        self.send(req).await
    }
}
