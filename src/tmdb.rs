use std::{num::NonZeroU32, sync::Arc};

use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::{error::AppResult, models::ListCategory};

/// Read side of the movie database. `None` means the call failed or the
/// payload was unusable, which callers treat as "skip and continue".
#[async_trait]
pub trait MovieSource {
    /// `Some(vec![])` is an empty page, distinct from a failed fetch.
    async fn movie_page(&self, category: ListCategory, page: u32) -> Option<Vec<MovieSummary>>;

    async fn movie_details(&self, movie_id: i32) -> Option<MovieDetails>;

    async fn person_details(&self, person_id: i32) -> Option<PersonDetails>;
}

pub struct TmdbClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    language: String,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl TmdbClient {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        base_url: String,
        language: String,
        rps: u32,
    ) -> Self {
        let rps = NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(Quota::per_second(rps)));
        Self { client, api_key, base_url, language, limiter }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, String)],
    ) -> AppResult<T> {
        self.limiter.until_ready().await;

        let resp = self
            .client
            .get(self.endpoint(path))
            .query(&[("api_key", self.api_key.as_str()), ("language", self.language.as_str())])
            .query(extra)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp)
    }
}

#[async_trait]
impl MovieSource for TmdbClient {
    async fn movie_page(&self, category: ListCategory, page: u32) -> Option<Vec<MovieSummary>> {
        debug!(category = %category, page = page, "fetching list page");
        let path = format!("movie/{}", category.as_path());
        match self.get_json::<PageResponse>(&path, &[("page", page.to_string())]).await {
            Ok(resp) => Some(resp.results),
            Err(err) => {
                warn!(category = %category, page = page, error = %err, "list page unavailable");
                None
            },
        }
    }

    async fn movie_details(&self, movie_id: i32) -> Option<MovieDetails> {
        let path = format!("movie/{movie_id}");
        let extra = [("append_to_response", "credits".to_string())];
        match self.get_json::<MovieDetails>(&path, &extra).await {
            Ok(details) => Some(details),
            Err(err) => {
                warn!(movie_id = movie_id, error = %err, "movie details unavailable");
                None
            },
        }
    }

    async fn person_details(&self, person_id: i32) -> Option<PersonDetails> {
        let path = format!("person/{person_id}");
        match self.get_json::<PersonDetails>(&path, &[]).await {
            Ok(details) => Some(details),
            Err(err) => {
                warn!(person_id = person_id, error = %err, "person details unavailable");
                None
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    results: Vec<MovieSummary>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MovieSummary {
    #[serde(default)]
    pub id: Option<i32>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct MovieDetails {
    pub id: i32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub runtime: Option<i32>,
    #[serde(default)]
    pub production_countries: Vec<ProductionCountry>,
    #[serde(default)]
    pub genres: Vec<GenreRef>,
    #[serde(default)]
    pub credits: Credits,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProductionCountry {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GenreRef {
    #[serde(default)]
    pub id: Option<i32>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Credits {
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub crew: Vec<CrewMember>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CastMember {
    #[serde(default)]
    pub id: Option<i32>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CrewMember {
    #[serde(default)]
    pub id: Option<i32>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub job: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PersonDetails {
    pub id: i32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub birthday: Option<String>,
    #[serde(default)]
    pub place_of_birth: Option<String>,
    #[serde(default)]
    pub gender: Option<i32>,
}
