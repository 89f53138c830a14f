use sea_orm::{ConnectionTrait, EntityTrait, Set, sea_query::OnConflict};

use crate::{
    entities::{genre, movie, movie_actor, movie_genre, person},
    error::AppResult,
    models::WriteOutcome,
};

/// Insert a movie or refresh every non-key column of the existing row.
pub async fn upsert_movie<C: ConnectionTrait>(
    conn: &C,
    row: &movie::Model,
) -> AppResult<WriteOutcome> {
    let existed = movie::Entity::find_by_id(row.id).one(conn).await?.is_some();

    let model = movie::ActiveModel {
        id: Set(row.id),
        title: Set(row.title.clone()),
        release_year: Set(row.release_year),
        summary: Set(row.summary.clone()),
        poster_url: Set(row.poster_url.clone()),
        score: Set(row.score),
        director_id: Set(row.director_id),
        duration_minutes: Set(row.duration_minutes),
        country: Set(row.country.clone()),
    };

    movie::Entity::insert(model)
        .on_conflict(
            OnConflict::column(movie::Column::Id)
                .update_columns([
                    movie::Column::Title,
                    movie::Column::ReleaseYear,
                    movie::Column::Summary,
                    movie::Column::PosterUrl,
                    movie::Column::Score,
                    movie::Column::DirectorId,
                    movie::Column::DurationMinutes,
                    movie::Column::Country,
                ])
                .to_owned(),
        )
        .exec(conn)
        .await?;

    Ok(if existed { WriteOutcome::Updated } else { WriteOutcome::Created })
}

pub async fn upsert_person<C: ConnectionTrait>(
    conn: &C,
    row: &person::Model,
) -> AppResult<WriteOutcome> {
    let existed = person::Entity::find_by_id(row.id).one(conn).await?.is_some();

    let model = person::ActiveModel {
        id: Set(row.id),
        full_name: Set(row.full_name.clone()),
        birth_date: Set(row.birth_date.clone()),
        nationality: Set(row.nationality.clone()),
        gender: Set(row.gender.clone()),
    };

    person::Entity::insert(model)
        .on_conflict(
            OnConflict::column(person::Column::Id)
                .update_columns([
                    person::Column::FullName,
                    person::Column::BirthDate,
                    person::Column::Nationality,
                    person::Column::Gender,
                ])
                .to_owned(),
        )
        .exec(conn)
        .await?;

    Ok(if existed { WriteOutcome::Updated } else { WriteOutcome::Created })
}

/// Genre names never change once stored; a known id is left untouched.
pub async fn insert_genre<C: ConnectionTrait>(
    conn: &C,
    row: &genre::Model,
) -> AppResult<WriteOutcome> {
    let model = genre::ActiveModel { id: Set(row.id), name: Set(row.name.clone()) };

    let inserted = genre::Entity::insert(model)
        .on_conflict(OnConflict::column(genre::Column::Id).do_nothing().to_owned())
        .exec_without_returning(conn)
        .await?;

    Ok(outcome(inserted))
}

pub async fn link_movie_genre<C: ConnectionTrait>(
    conn: &C,
    movie_id: i32,
    genre_id: i32,
) -> AppResult<WriteOutcome> {
    let model = movie_genre::ActiveModel { movie_id: Set(movie_id), genre_id: Set(genre_id) };

    let inserted = movie_genre::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([movie_genre::Column::MovieId, movie_genre::Column::GenreId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    Ok(outcome(inserted))
}

pub async fn link_movie_actor<C: ConnectionTrait>(
    conn: &C,
    movie_id: i32,
    person_id: i32,
) -> AppResult<WriteOutcome> {
    let model = movie_actor::ActiveModel { movie_id: Set(movie_id), person_id: Set(person_id) };

    let inserted = movie_actor::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([movie_actor::Column::MovieId, movie_actor::Column::PersonId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    Ok(outcome(inserted))
}

fn outcome(rows_affected: u64) -> WriteOutcome {
    if rows_affected > 0 { WriteOutcome::Created } else { WriteOutcome::Unchanged }
}
