mod config;
mod db;
mod entities;
mod error;
mod events;
mod importer;
mod models;
mod report;
mod store;
mod tmdb;
mod transform;

use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::{
    config::Config, error::AppResult, events::LogObserver, importer::Importer, tmdb::TmdbClient,
};

#[derive(Debug, Parser)]
#[command(name = "movie-catalog", about = "Import TMDB movies into the catalog and query it")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Pull the configured TMDB lists into the catalog (default).
    Import,
    /// Print the read-only catalog report.
    Report,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,movie_catalog=debug,sqlx=warn".to_string()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Import) {
        Command::Import => import().await,
        Command::Report => report().await,
    }
}

async fn import() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let http = reqwest::Client::builder()
        .user_agent("movie-catalog/0.1")
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()?;

    let db = db::connect_and_migrate(&config.database_url).await?;
    tracing::info!(database = %config.database_url, "store connected");

    let tmdb = TmdbClient::new(
        http,
        config.tmdb_api_key.clone(),
        config.tmdb_base_url.clone(),
        config.tmdb_language.clone(),
        config.tmdb_rps,
    );

    let result = Importer::new(&db, tmdb, LogObserver, config.import.clone()).run().await;
    let stats = finish(db, result).await?;
    tracing::info!(
        movies = stats.movies_imported,
        genre_links = stats.genre_links,
        actor_links = stats.actor_links,
        "all data inserted or updated"
    );
    Ok(())
}

async fn report() -> anyhow::Result<()> {
    let database_url = config::database_url_from_env();
    let db = db::connect_and_migrate(&database_url).await?;
    let result = report::print_report(&db).await;
    Ok(finish(db, result).await?)
}

/// Releases the store connection and hands back the run's own outcome.
/// A close error is only logged so it never masks a run error.
async fn finish<T>(db: sea_orm::DatabaseConnection, result: AppResult<T>) -> AppResult<T> {
    match db.close().await {
        Ok(()) => tracing::info!("store connection closed"),
        Err(err) => tracing::warn!(error = %err, "failed to close store connection"),
    }
    result
}

#[cfg(test)]
mod tests {
    use sea_orm::DbErr;

    use super::*;
    use crate::{error::AppError, models::ListCategory};

    #[tokio::test]
    async fn run_error_is_returned_after_closing_the_store() {
        let db = db::memory().await;
        let failed: AppResult<()> = Err(AppError::Commit {
            category: ListCategory::TopRated,
            page: 3,
            source: DbErr::Custom("disk I/O error".to_string()),
        });

        let result = finish(db, failed).await;
        assert!(matches!(
            result,
            Err(AppError::Commit { category: ListCategory::TopRated, page: 3, .. })
        ));
    }

    #[tokio::test]
    async fn successful_run_passes_through_finish() {
        let db = db::memory().await;
        assert_eq!(finish(db, Ok(7u32)).await.ok(), Some(7));
    }
}
