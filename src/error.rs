use thiserror::Error;

use crate::models::ListCategory;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("cannot connect to store at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: sea_orm::DbErr,
    },

    #[error("commit failed for {category} page {page}: {source}")]
    Commit {
        category: ListCategory,
        page: u32,
        #[source]
        source: sea_orm::DbErr,
    },
}

pub type AppResult<T> = Result<T, AppError>;
