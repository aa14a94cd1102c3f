//! Gridplay server binary.

use anyhow::Result;
use clap::Parser;
use diesel::Connection;
use diesel::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use gridplay::cli::{Cli, Command};
use gridplay::{SqliteGameService, router};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            port,
            host,
            db_path,
            starting_credits,
        } => serve(host, port, db_path, starting_credits).await,
    }
}

async fn serve(host: String, port: u16, db_path: String, starting_credits: i32) -> Result<()> {
    run_migrations(&db_path)?;

    let service = Arc::new(SqliteGameService::open(&db_path, starting_credits));
    let app = router(service);

    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    info!(%host, port, db_path = %db_path, "Server ready");
    axum::serve(listener, app).await?;

    Ok(())
}

fn run_migrations(db_path: &str) -> Result<()> {
    let mut conn = SqliteConnection::establish(db_path)?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("Migrations failed: {e}"))?;
    info!(db_path = %db_path, "Migrations applied");
    Ok(())
}
