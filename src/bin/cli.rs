use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use frames_downloads::authz::downloads::grace_period_from_env;
use frames_downloads::authz::{build_rules, Authorizer, DefaultMediaAccessPolicy, DownloadsAuthorizer};
use frames_downloads::db::SqliteDownloadStore;
use frames_downloads::docs::build_openapi;
use frames_downloads::jwt::JwtConfig;
use frames_downloads::session::SessionService;

#[derive(Parser, Debug)]
#[command(author, version, about = "frames downloads admin tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    MigrateRun,
    /// Mint a session token for an existing user (development only)
    IssueToken { user_id: Uuid },
    /// Print the permission set a user would get, as JSON
    Rules { user_id: Uuid },
    /// Write the OpenAPI document to a file, or stdout
    DumpOpenapi { path: Option<PathBuf> },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::IssueToken { user_id } => {
            let jwt = JwtConfig::from_env()?;
            let pool = get_pool().await?;
            let session = SessionService::new(pool, Arc::new(jwt.clone()));
            session
                .find_user(user_id)
                .await?
                .with_context(|| format!("no user with id {user_id}"))?;
            println!("{}", jwt.encode(user_id)?);
        }
        Commands::Rules { user_id } => {
            let jwt = JwtConfig::from_env()?;
            let pool = get_pool().await?;
            let session = SessionService::new(pool.clone(), Arc::new(jwt));
            let user = session
                .find_user(user_id)
                .await?
                .with_context(|| format!("no user with id {user_id}"))?;

            let downloads: Arc<dyn Authorizer> = Arc::new(DownloadsAuthorizer::new(
                Arc::new(SqliteDownloadStore::new(pool)),
                Arc::new(DefaultMediaAccessPolicy::new()),
                grace_period_from_env()?,
            ));
            let rules = build_rules(&[downloads], &user);
            println!("{}", serde_json::to_string_pretty(&rules)?);
        }
        Commands::DumpOpenapi { path } => {
            let doc = serde_json::to_string_pretty(&build_openapi())?;
            match path {
                Some(path) => {
                    std::fs::write(&path, doc).with_context(|| format!("failed to write {}", path.display()))?;
                    println!("wrote {}", path.display());
                }
                None => println!("{doc}"),
            }
        }
    }

    Ok(())
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // ./migrations when run from the repo root, else the crate-local folder
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let migrator_path_display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", migrator_path_display))
}
