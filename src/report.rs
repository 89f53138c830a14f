//! Read-only catalog queries behind `movie-catalog report`.

use std::collections::HashMap;

use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, FromQueryResult, QueryFilter, QueryOrder,
    QuerySelect, Statement, Value, sea_query::Expr,
};

use crate::{
    entities::{genre, movie, person},
    error::AppResult,
};

#[derive(Clone, Debug, FromQueryResult)]
pub struct CountedPerson {
    pub id: i32,
    pub full_name: String,
    pub movie_count: i64,
}

#[derive(Clone, Debug, FromQueryResult)]
pub struct GenreStats {
    pub name: String,
    pub movie_count: i64,
    pub average_score: Option<f64>,
}

#[derive(Debug, FromQueryResult)]
struct AverageScore {
    average_score: Option<f64>,
}

#[derive(Clone, Debug, FromQueryResult)]
pub struct MovieTitle {
    pub id: i32,
    pub title: String,
}

fn statement<C: ConnectionTrait>(db: &C, sql: &str, values: Vec<Value>) -> Statement {
    Statement::from_sql_and_values(db.get_database_backend(), sql, values)
}

fn limit_value(limit: u64) -> Value {
    i64::try_from(limit).unwrap_or(i64::MAX).into()
}

pub async fn released_after<C: ConnectionTrait>(
    db: &C,
    year: i32,
    limit: u64,
) -> AppResult<Vec<movie::Model>> {
    Ok(movie::Entity::find()
        .filter(movie::Column::ReleaseYear.gt(year))
        .order_by_desc(movie::Column::Score)
        .limit(limit)
        .all(db)
        .await?)
}

pub async fn movies_in_genre<C: ConnectionTrait>(
    db: &C,
    genre_name: &str,
    limit: u64,
) -> AppResult<Vec<movie::Model>> {
    Ok(movie::Entity::find()
        .inner_join(genre::Entity)
        .filter(genre::Column::Name.eq(genre_name))
        .order_by_asc(movie::Column::Title)
        .limit(limit)
        .all(db)
        .await?)
}

pub async fn top_actors<C: ConnectionTrait>(db: &C, limit: u64) -> AppResult<Vec<CountedPerson>> {
    let sql = "SELECT p.id AS id, p.full_name AS full_name, COUNT(ma.movie_id) AS movie_count \
               FROM person p JOIN movie_actor ma ON ma.person_id = p.id \
               GROUP BY p.id, p.full_name \
               ORDER BY movie_count DESC, p.full_name ASC LIMIT ?";
    Ok(CountedPerson::find_by_statement(statement(db, sql, vec![limit_value(limit)])).all(db).await?)
}

/// Genres with more than `min_movies` movies, best average score first.
pub async fn genre_stats<C: ConnectionTrait>(db: &C, min_movies: i64) -> AppResult<Vec<GenreStats>> {
    let sql = "SELECT g.name AS name, COUNT(mg.movie_id) AS movie_count, AVG(m.score) AS average_score \
               FROM genre g \
               JOIN movie_genre mg ON mg.genre_id = g.id \
               JOIN movie m ON m.id = mg.movie_id \
               GROUP BY g.id, g.name \
               HAVING COUNT(mg.movie_id) > ? \
               ORDER BY average_score DESC";
    Ok(GenreStats::find_by_statement(statement(db, sql, vec![min_movies.into()])).all(db).await?)
}

pub async fn long_or_acclaimed<C: ConnectionTrait>(
    db: &C,
    min_minutes: i32,
    min_score: f64,
    limit: u64,
) -> AppResult<Vec<movie::Model>> {
    Ok(movie::Entity::find()
        .filter(
            Condition::any()
                .add(movie::Column::DurationMinutes.gt(min_minutes))
                .add(movie::Column::Score.gt(min_score)),
        )
        .order_by_desc(movie::Column::Score)
        .limit(limit)
        .all(db)
        .await?)
}

/// Movies whose runtime in minutes exceeds `factor` times their score.
pub async fn runtime_exceeds_score<C: ConnectionTrait>(
    db: &C,
    factor: i32,
    limit: u64,
) -> AppResult<Vec<movie::Model>> {
    Ok(movie::Entity::find()
        .filter(movie::Column::DurationMinutes.is_not_null())
        .filter(movie::Column::Score.is_not_null())
        .filter(
            Expr::col(movie::Column::DurationMinutes)
                .gt(Expr::col(movie::Column::Score).mul(factor)),
        )
        .limit(limit)
        .all(db)
        .await?)
}

pub async fn average_score<C: ConnectionTrait>(db: &C) -> AppResult<Option<f64>> {
    let sql = "SELECT AVG(score) AS average_score FROM movie WHERE score IS NOT NULL";
    let row = AverageScore::find_by_statement(statement(db, sql, vec![])).one(db).await?;
    Ok(row.and_then(|r| r.average_score))
}

pub async fn above_average_since<C: ConnectionTrait>(
    db: &C,
    average: f64,
    after_year: i32,
    limit: u64,
) -> AppResult<Vec<movie::Model>> {
    Ok(movie::Entity::find()
        .filter(movie::Column::Score.gt(average))
        .filter(movie::Column::ReleaseYear.gt(after_year))
        .order_by_desc(movie::Column::Score)
        .limit(limit)
        .all(db)
        .await?)
}

/// Movies featuring every one of `names`.
pub async fn movies_with_all_actors<C: ConnectionTrait>(
    db: &C,
    names: &[&str],
) -> AppResult<Vec<MovieTitle>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; names.len()].join(", ");
    let sql = format!(
        "SELECT m.id AS id, m.title AS title \
         FROM movie m \
         JOIN movie_actor ma ON ma.movie_id = m.id \
         JOIN person p ON p.id = ma.person_id \
         WHERE p.full_name IN ({placeholders}) \
         GROUP BY m.id, m.title \
         HAVING COUNT(DISTINCT p.full_name) = ? \
         ORDER BY m.title"
    );
    let mut values: Vec<Value> = names.iter().map(|n| (*n).into()).collect();
    values.push((names.len() as i64).into());
    Ok(MovieTitle::find_by_statement(statement(db, &sql, values)).all(db).await?)
}

pub async fn short_recent_from<C: ConnectionTrait>(
    db: &C,
    country: &str,
    after_year: i32,
    max_minutes: i32,
    limit: u64,
) -> AppResult<Vec<movie::Model>> {
    Ok(movie::Entity::find()
        .filter(movie::Column::Country.eq(country))
        .filter(movie::Column::ReleaseYear.gt(after_year))
        .filter(movie::Column::DurationMinutes.is_not_null())
        .filter(movie::Column::DurationMinutes.lt(max_minutes))
        .order_by_desc(movie::Column::ReleaseYear)
        .limit(limit)
        .all(db)
        .await?)
}

/// Top directors by movie count with their movies, loaded with one query by
/// director id set rather than one query per director.
pub async fn top_directors_with_movies<C: ConnectionTrait>(
    db: &C,
    limit: u64,
) -> AppResult<Vec<(CountedPerson, Vec<movie::Model>)>> {
    let sql = "SELECT p.id AS id, p.full_name AS full_name, COUNT(m.id) AS movie_count \
               FROM person p JOIN movie m ON m.director_id = p.id \
               GROUP BY p.id, p.full_name \
               ORDER BY movie_count DESC, p.full_name ASC LIMIT ?";
    let directors =
        CountedPerson::find_by_statement(statement(db, sql, vec![limit_value(limit)])).all(db).await?;

    let ids: Vec<i32> = directors.iter().map(|d| d.id).collect();
    let mut by_director: HashMap<i32, Vec<movie::Model>> = HashMap::new();
    for film in movie::Entity::find()
        .filter(movie::Column::DirectorId.is_in(ids))
        .order_by_asc(movie::Column::Title)
        .all(db)
        .await?
    {
        if let Some(director_id) = film.director_id {
            by_director.entry(director_id).or_default().push(film);
        }
    }

    Ok(directors
        .into_iter()
        .map(|d| {
            let films = by_director.remove(&d.id).unwrap_or_default();
            (d, films)
        })
        .collect())
}

pub async fn longest_movies<C: ConnectionTrait>(db: &C, limit: u64) -> AppResult<Vec<movie::Model>> {
    Ok(movie::Entity::find()
        .filter(movie::Column::DurationMinutes.is_not_null())
        .order_by_desc(movie::Column::DurationMinutes)
        .limit(limit)
        .all(db)
        .await?)
}

pub async fn first_with_birth_date<C: ConnectionTrait>(db: &C) -> AppResult<Option<person::Model>> {
    Ok(person::Entity::find()
        .filter(person::Column::BirthDate.is_not_null())
        .order_by_asc(person::Column::Id)
        .one(db)
        .await?)
}

fn score(m: &movie::Model) -> String {
    m.score.map(|s| format!("{s:.1}")).unwrap_or_else(|| "-".to_string())
}

fn year(m: &movie::Model) -> String {
    m.release_year.map(|y| y.to_string()).unwrap_or_else(|| "?".to_string())
}

fn minutes(m: &movie::Model) -> String {
    m.duration_minutes.map(|d| d.to_string()).unwrap_or_else(|| "?".to_string())
}

pub async fn print_report<C: ConnectionTrait>(db: &C) -> AppResult<()> {
    println!("--- Movies released after 2010 ---");
    for m in released_after(db, 2010, 5).await? {
        println!("  - {} ({}) - Score: {}", m.title, year(&m), score(&m));
    }

    println!("\n--- 'Action' movies ---");
    for m in movies_in_genre(db, "Action", 5).await? {
        println!("  - {}", m.title);
    }

    println!("\n--- Top 10 actors by movie count ---");
    for p in top_actors(db, 10).await? {
        println!("  - {} has been in {} movies", p.full_name, p.movie_count);
    }

    println!("\n--- Genres with more than 5 movies ---");
    for g in genre_stats(db, 5).await? {
        let avg = g.average_score.map(|a| format!("{a:.2}")).unwrap_or_else(|| "-".to_string());
        println!("  - {}: {} movies, average score {}", g.name, g.movie_count, avg);
    }

    println!("\n--- Longer than 3 hours or scoring above 8.5 ---");
    for m in long_or_acclaimed(db, 180, 8.5, 10).await? {
        println!("  - {} ({} min, score {})", m.title, minutes(&m), score(&m));
    }

    println!("\n--- Runtime above 20x the score ---");
    for m in runtime_exceeds_score(db, 20, 5).await? {
        println!("  - {} ({} min, score {})", m.title, minutes(&m), score(&m));
    }

    println!("\n--- After 2000 and above the average score ---");
    match average_score(db).await? {
        Some(average) => {
            println!("  average score {average:.2}");
            for m in above_average_since(db, average, 2000, 5).await? {
                println!("  - {} ({}) - Score: {}", m.title, year(&m), score(&m));
            }
        },
        None => println!("  - no scored movies yet"),
    }

    let pair = ["Leonardo DiCaprio", "Tom Hardy"];
    println!("\n--- Movies starring both {} and {} ---", pair[0], pair[1]);
    for m in movies_with_all_actors(db, &pair).await? {
        println!("  - {}", m.title);
    }

    println!("\n--- American movies after 2010 shorter than 110 minutes ---");
    let short = short_recent_from(db, "United States of America", 2010, 110, 5).await?;
    if short.is_empty() {
        println!("  - none found");
    }
    for m in short {
        println!("  - {} ({}) - {} min", m.title, year(&m), minutes(&m));
    }

    println!("\n--- Top 5 directors and their movies ---");
    for (director, films) in top_directors_with_movies(db, 5).await? {
        println!("  - {} ({} movies)", director.full_name, director.movie_count);
        for film in films {
            println!("    - {}", film.title);
        }
    }

    println!("\n--- Longest movies ---");
    for m in longest_movies(db, 5).await? {
        println!("  - {}: {}", m.title, m.duration_display().unwrap_or_default());
    }

    println!("\n--- Age of a person with a known birth date ---");
    match first_with_birth_date(db).await? {
        Some(p) => {
            let today: jiff::civil::Date = jiff::Zoned::now().into();
            let birth = p.birth_date.as_deref().unwrap_or_default();
            match p.age_on(today) {
                Some(age) => println!("  - {} (born {birth}) is {age} years old", p.full_name),
                None => println!("  - {} (born {birth})", p.full_name),
            }
        },
        None => println!("  - nobody with a birth date yet"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, store};

    fn film(id: i32, title: &str, year: i32, score: f64, minutes: i32, director: i32) -> movie::Model {
        movie::Model {
            id,
            title: title.to_string(),
            release_year: Some(year),
            summary: None,
            poster_url: None,
            score: Some(score),
            director_id: Some(director),
            duration_minutes: Some(minutes),
            country: Some("United States of America".to_string()),
        }
    }

    fn someone(id: i32, name: &str) -> person::Model {
        person::Model {
            id,
            full_name: name.to_string(),
            birth_date: None,
            nationality: None,
            gender: None,
        }
    }

    async fn seeded() -> sea_orm::DatabaseConnection {
        let db = db::memory().await;
        for (id, name) in [(525, "Christopher Nolan"), (6193, "Leonardo DiCaprio"), (2524, "Tom Hardy")] {
            store::upsert_person(&db, &someone(id, name)).await.unwrap();
        }
        store::upsert_movie(&db, &film(27205, "Inception", 2010, 8.8, 148, 525)).await.unwrap();
        store::upsert_movie(&db, &film(155, "The Dark Knight", 2008, 8.6, 152, 525)).await.unwrap();
        store::upsert_movie(&db, &film(11324, "Shutter Island", 2010, 8.2, 138, 525)).await.unwrap();
        store::insert_genre(&db, &genre::Model { id: 28, name: "Action".to_string() })
            .await
            .unwrap();
        store::link_movie_genre(&db, 27205, 28).await.unwrap();
        store::link_movie_genre(&db, 155, 28).await.unwrap();
        store::link_movie_actor(&db, 27205, 6193).await.unwrap();
        store::link_movie_actor(&db, 27205, 2524).await.unwrap();
        store::link_movie_actor(&db, 11324, 6193).await.unwrap();
        db
    }

    #[tokio::test]
    async fn movies_with_both_actors() {
        let db = seeded().await;
        let found = movies_with_all_actors(&db, &["Leonardo DiCaprio", "Tom Hardy"]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Inception");
    }

    #[tokio::test]
    async fn genre_statistics_are_aggregated() {
        let db = seeded().await;
        let stats = genre_stats(&db, 0).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].name, "Action");
        assert_eq!(stats[0].movie_count, 2);
        let average = stats[0].average_score.unwrap();
        assert!((average - 8.7).abs() < 1e-9);

        assert!(genre_stats(&db, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn genre_join_and_actor_counts() {
        let db = seeded().await;
        let action: Vec<String> =
            movies_in_genre(&db, "Action", 5).await.unwrap().into_iter().map(|m| m.title).collect();
        assert_eq!(action, vec!["Inception", "The Dark Knight"]);

        let actors = top_actors(&db, 10).await.unwrap();
        assert_eq!(actors[0].full_name, "Leonardo DiCaprio");
        assert_eq!(actors[0].movie_count, 2);
    }

    #[tokio::test]
    async fn directors_come_with_their_movies() {
        let db = seeded().await;
        let top = top_directors_with_movies(&db, 5).await.unwrap();
        assert_eq!(top.len(), 1);
        let (director, films) = &top[0];
        assert_eq!(director.full_name, "Christopher Nolan");
        assert_eq!(director.movie_count, 3);
        let titles: Vec<&str> = films.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["Inception", "Shutter Island", "The Dark Knight"]);
    }

    #[tokio::test]
    async fn filters_on_runtime_and_score() {
        let db = seeded().await;
        let acclaimed = long_or_acclaimed(&db, 180, 8.5, 10).await.unwrap();
        let ids: Vec<i32> = acclaimed.into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![27205, 155]);

        let average = average_score(&db).await.unwrap().unwrap();
        let above: Vec<i32> =
            above_average_since(&db, average, 2000, 5).await.unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(above, vec![27205, 155]);

        assert_eq!(runtime_exceeds_score(&db, 20, 5).await.unwrap().len(), 0);
        assert_eq!(runtime_exceeds_score(&db, 10, 5).await.unwrap().len(), 3);
    }
}
