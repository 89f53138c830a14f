//! Pure mapping from TMDB payloads to catalog rows. Missing optional fields
//! become `None`; nothing here can fail.

use jiff::civil::Date;

use crate::{
    entities::{genre, movie, person},
    models::Gender,
    tmdb::{CastMember, CrewMember, GenreRef, MovieDetails, PersonDetails},
};

pub const POSTER_BASE_URL: &str = "https://image.tmdb.org/t/p/w500";

const DIRECTOR_JOB: &str = "Director";

pub fn movie_row(details: &MovieDetails, director_id: Option<i32>) -> movie::Model {
    movie::Model {
        id: details.id,
        title: details.title.clone().unwrap_or_default(),
        release_year: release_year(details.release_date.as_deref()),
        summary: details.overview.clone(),
        poster_url: poster_url(details.poster_path.as_deref()),
        score: details.vote_average.map(round_score),
        director_id,
        duration_minutes: details.runtime,
        country: details.production_countries.first().and_then(|c| c.name.clone()),
    }
}

pub fn person_row(details: &PersonDetails) -> person::Model {
    person::Model {
        id: details.id,
        full_name: details.name.clone().unwrap_or_default(),
        birth_date: birth_date(details.birthday.as_deref()),
        nationality: details.place_of_birth.clone(),
        gender: details.gender.and_then(Gender::from_tmdb_code).map(|g| g.as_str().to_string()),
    }
}

/// `None` when the entry lacks an id or a usable name.
pub fn genre_row(genre: &GenreRef) -> Option<genre::Model> {
    let name = genre.name.as_deref().map(str::trim).filter(|n| !n.is_empty())?;
    Some(genre::Model { id: genre.id?, name: name.to_string() })
}

/// Year prefix of a `YYYY-MM-DD...` string.
pub fn release_year(date: Option<&str>) -> Option<i32> {
    date?.trim().split('-').next()?.parse().ok()
}

pub fn poster_url(path: Option<&str>) -> Option<String> {
    let path = path.map(str::trim).filter(|p| !p.is_empty())?;
    Some(format!("{POSTER_BASE_URL}{path}"))
}

/// First crew member credited as director, in crew-list order.
pub fn first_director(crew: &[CrewMember]) -> Option<&CrewMember> {
    crew.iter().find(|member| member.job.as_deref() == Some(DIRECTOR_JOB))
}

pub fn leading_cast(cast: &[CastMember], limit: usize) -> &[CastMember] {
    &cast[..cast.len().min(limit)]
}

fn birth_date(raw: Option<&str>) -> Option<String> {
    let date: Date = raw?.trim().parse().ok()?;
    Some(date.to_string())
}

fn round_score(score: f64) -> f64 {
    (score * 10.0).round() / 10.0
}
