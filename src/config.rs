use std::{ops::RangeInclusive, time::Duration};

use anyhow::Context;

use crate::models::ListCategory;

const DEFAULT_DATABASE_URL: &str = "sqlite://movie_catalog.db?mode=rwc";

#[derive(Clone, Debug)]
pub struct Config {
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    pub tmdb_language: String,
    pub tmdb_rps: u32,
    pub http_timeout_secs: u64,
    pub database_url: String,
    pub import: ImportSettings,
}

/// Knobs for one import run, handed to the importer at construction.
#[derive(Clone, Debug)]
pub struct ImportSettings {
    pub categories: Vec<ListCategory>,
    pub pages: RangeInclusive<u32>,
    pub cast_limit: usize,
    pub pause: Duration,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            categories: vec![ListCategory::Popular, ListCategory::TopRated],
            pages: 1..=3,
            cast_limit: 5,
            pause: Duration::from_millis(200),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let tmdb_api_key = std::env::var("TMDB_API_KEY").context("TMDB_API_KEY is not set")?;
        if tmdb_api_key.trim().is_empty() {
            anyhow::bail!("TMDB_API_KEY is empty");
        }

        let tmdb_base_url = std::env::var("TMDB_BASE_URL")
            .unwrap_or_else(|_| "https://api.themoviedb.org/3".to_string());
        let tmdb_language = std::env::var("TMDB_LANGUAGE").unwrap_or_else(|_| "en-US".to_string());

        let tmdb_rps: u32 = parse_var("TMDB_RPS")?.unwrap_or(4);
        let http_timeout_secs: u64 = parse_var("HTTP_TIMEOUT_SECS")?.unwrap_or(30);

        let database_url = database_url_from_env();

        let defaults = ImportSettings::default();

        let categories = match std::env::var("IMPORT_CATEGORIES") {
            Ok(raw) => parse_categories(&raw).context("IMPORT_CATEGORIES")?,
            Err(_) => defaults.categories,
        };

        let first_page: u32 = parse_var("IMPORT_FIRST_PAGE")?.unwrap_or(*defaults.pages.start());
        let last_page: u32 = parse_var("IMPORT_LAST_PAGE")?.unwrap_or(*defaults.pages.end());
        if first_page == 0 || last_page < first_page {
            anyhow::bail!("invalid page range {first_page}..={last_page}");
        }

        let cast_limit: usize = parse_var("IMPORT_CAST_LIMIT")?.unwrap_or(defaults.cast_limit);
        let pause = parse_var::<u64>("IMPORT_PAUSE_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.pause);

        Ok(Self {
            tmdb_api_key,
            tmdb_base_url,
            tmdb_language,
            tmdb_rps,
            http_timeout_secs,
            database_url,
            import: ImportSettings { categories, pages: first_page..=last_page, cast_limit, pause },
        })
    }
}

/// Store location alone, for commands that never talk to TMDB.
pub fn database_url_from_env() -> String {
    dotenvy::dotenv().ok();
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

fn parse_var<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => Ok(Some(raw.trim().parse().with_context(|| name.to_string())?)),
        Err(_) => Ok(None),
    }
}

pub fn parse_categories(raw: &str) -> anyhow::Result<Vec<ListCategory>> {
    let mut out = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let category: ListCategory = part.parse()?;
        if !out.contains(&category) {
            out.push(category);
        }
    }
    if out.is_empty() {
        anyhow::bail!("no list categories configured");
    }
    Ok(out)
}
