use std::{fmt, str::FromStr};

/// TMDB movie lists the importer can walk.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ListCategory {
    Popular,
    TopRated,
    NowPlaying,
    Upcoming,
}

impl ListCategory {
    pub fn as_path(self) -> &'static str {
        match self {
            ListCategory::Popular => "popular",
            ListCategory::TopRated => "top_rated",
            ListCategory::NowPlaying => "now_playing",
            ListCategory::Upcoming => "upcoming",
        }
    }
}

impl fmt::Display for ListCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path())
    }
}

impl FromStr for ListCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "popular" => Ok(ListCategory::Popular),
            "top_rated" => Ok(ListCategory::TopRated),
            "now_playing" => Ok(ListCategory::NowPlaying),
            "upcoming" => Ok(ListCategory::Upcoming),
            other => anyhow::bail!("unknown list category '{other}'"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    /// Only TMDB codes 1 and 2 are mapped; everything else is unknown.
    pub fn from_tmdb_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Gender::Female),
            2 => Some(Gender::Male),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Female => "Female",
            Gender::Male => "Male",
        }
    }
}

/// What a single upsert did to the store.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WriteOutcome {
    Created,
    Updated,
    Unchanged,
}

impl WriteOutcome {
    pub fn is_created(self) -> bool {
        self == WriteOutcome::Created
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_maps_only_two_codes() {
        assert_eq!(Gender::from_tmdb_code(1), Some(Gender::Female));
        assert_eq!(Gender::from_tmdb_code(2), Some(Gender::Male));
        assert_eq!(Gender::from_tmdb_code(0), None);
        assert_eq!(Gender::from_tmdb_code(3), None);
    }

    #[test]
    fn category_parses_api_paths() {
        assert_eq!("top_rated".parse::<ListCategory>().unwrap(), ListCategory::TopRated);
        assert_eq!(" Popular ".parse::<ListCategory>().unwrap(), ListCategory::Popular);
        assert!("trending".parse::<ListCategory>().is_err());
    }
}
