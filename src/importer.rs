use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tracing::{debug, info, warn};

use crate::{
    config::ImportSettings,
    error::{AppError, AppResult},
    events::{EntityKind, EntityObserver},
    models::ListCategory,
    store,
    tmdb::MovieSource,
    transform,
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub pages_committed: u32,
    pub pages_skipped: u32,
    pub movies_imported: u32,
    pub movies_skipped: u32,
    pub people_written: u32,
    /// Links newly created by this run; already-present links are not counted.
    pub genre_links: u32,
    pub actor_links: u32,
    pub write_failures: u32,
}

/// Created rows waiting for their page to commit before observers hear about them.
struct PendingEvent {
    kind: EntityKind,
    id: i32,
    label: String,
}

/// Mutable state for the page currently being imported.
#[derive(Default)]
struct PageRun {
    pending: Vec<PendingEvent>,
}

impl PageRun {
    fn created(&mut self, kind: EntityKind, id: i32, label: &str) {
        self.pending.push(PendingEvent { kind, id, label: label.to_string() });
    }
}

pub struct Importer<'a, S, O> {
    db: &'a DatabaseConnection,
    source: S,
    observer: O,
    settings: ImportSettings,
}

impl<'a, S, O> Importer<'a, S, O>
where
    S: MovieSource,
    O: EntityObserver,
{
    pub fn new(db: &'a DatabaseConnection, source: S, observer: O, settings: ImportSettings) -> Self {
        Self { db, source, observer, settings }
    }

    /// Walks every configured list and page, committing once per page. Only a
    /// failed transaction (begin or commit) ends the run early.
    pub async fn run(&self) -> AppResult<ImportStats> {
        let mut stats = ImportStats::default();

        for &category in &self.settings.categories {
            info!(category = %category, "processing list");
            for page in self.settings.pages.clone() {
                self.import_page(category, page, &mut stats).await?;
            }
        }

        info!(
            pages = stats.pages_committed,
            pages_skipped = stats.pages_skipped,
            movies = stats.movies_imported,
            movies_skipped = stats.movies_skipped,
            people = stats.people_written,
            write_failures = stats.write_failures,
            "import finished"
        );
        Ok(stats)
    }

    async fn import_page(
        &self,
        category: ListCategory,
        page: u32,
        stats: &mut ImportStats,
    ) -> AppResult<()> {
        let Some(summaries) = self.source.movie_page(category, page).await else {
            stats.pages_skipped += 1;
            return Ok(());
        };
        if summaries.is_empty() {
            debug!(category = %category, page = page, "empty page");
            stats.pages_skipped += 1;
            return Ok(());
        }

        let txn = self.db.begin().await?;
        let mut run = PageRun::default();

        for summary in &summaries {
            let title = summary.title.as_deref().unwrap_or_default();
            let Some(movie_id) = summary.id else {
                warn!(category = %category, page = page, title = title, "list entry without id");
                stats.movies_skipped += 1;
                continue;
            };
            info!(movie_id = movie_id, title = title, "processing movie");
            self.import_movie(&txn, movie_id, stats, &mut run).await;
        }

        info!(category = %category, page = page, movies = summaries.len(), "committing page");
        txn.commit().await.map_err(|source| AppError::Commit { category, page, source })?;
        stats.pages_committed += 1;

        for event in run.pending {
            self.observer.entity_created(event.kind, event.id, &event.label);
        }
        Ok(())
    }

    async fn import_movie(
        &self,
        txn: &DatabaseTransaction,
        movie_id: i32,
        stats: &mut ImportStats,
        run: &mut PageRun,
    ) {
        let Some(details) = self.source.movie_details(movie_id).await else {
            stats.movies_skipped += 1;
            return;
        };

        // The director is only referenced once its person row exists.
        let mut director_id = None;
        if let Some(director) = transform::first_director(&details.credits.crew) {
            match director.id {
                Some(person_id) => {
                    debug!(movie_id = details.id, person_id = person_id, name = ?director.name, "resolving director");
                    if self.import_person(txn, person_id, stats, run).await {
                        director_id = Some(person_id);
                    }
                },
                None => warn!(movie_id = details.id, "director credit without id"),
            }
        }

        let movie = transform::movie_row(&details, director_id);
        match store::upsert_movie(txn, &movie).await {
            Ok(outcome) => {
                if outcome.is_created() {
                    run.created(EntityKind::Movie, movie.id, &movie.title);
                }
            },
            Err(err) => {
                warn!(movie_id = movie.id, error = %err, "failed to write movie");
                stats.write_failures += 1;
                stats.movies_skipped += 1;
                return;
            },
        }

        for genre in &details.genres {
            let Some(row) = transform::genre_row(genre) else {
                warn!(movie_id = movie.id, genre_id = ?genre.id, "genre entry without id or name");
                stats.write_failures += 1;
                continue;
            };
            let linked = async {
                if store::insert_genre(txn, &row).await?.is_created() {
                    run.created(EntityKind::Genre, row.id, &row.name);
                }
                store::link_movie_genre(txn, movie.id, row.id).await
            }
            .await;
            match linked {
                Ok(outcome) => {
                    if outcome.is_created() {
                        stats.genre_links += 1;
                    }
                },
                Err(err) => {
                    warn!(movie_id = movie.id, genre_id = row.id, error = %err, "failed to link genre");
                    stats.write_failures += 1;
                },
            }
        }

        for actor in transform::leading_cast(&details.credits.cast, self.settings.cast_limit) {
            let Some(person_id) = actor.id else {
                warn!(movie_id = movie.id, name = ?actor.name, "cast credit without id");
                continue;
            };
            debug!(movie_id = movie.id, person_id = person_id, name = ?actor.name, "resolving cast member");
            if !self.import_person(txn, person_id, stats, run).await {
                continue;
            }
            match store::link_movie_actor(txn, movie.id, person_id).await {
                Ok(outcome) => {
                    if outcome.is_created() {
                        stats.actor_links += 1;
                    }
                },
                Err(err) => {
                    warn!(movie_id = movie.id, person_id = person_id, error = %err, "failed to link actor");
                    stats.write_failures += 1;
                },
            }
        }

        stats.movies_imported += 1;
    }

    /// Fetches and writes one person, pausing after the fetch whatever the
    /// result. Returns whether the person row is now in the store.
    async fn import_person(
        &self,
        txn: &DatabaseTransaction,
        person_id: i32,
        stats: &mut ImportStats,
        run: &mut PageRun,
    ) -> bool {
        let fetched = self.source.person_details(person_id).await;
        self.pause().await;

        let Some(details) = fetched else {
            return false;
        };

        let row = transform::person_row(&details);
        match store::upsert_person(txn, &row).await {
            Ok(outcome) => {
                if outcome.is_created() {
                    run.created(EntityKind::Person, row.id, &row.full_name);
                }
                stats.people_written += 1;
                true
            },
            Err(err) => {
                warn!(person_id = person_id, error = %err, "failed to write person");
                stats.write_failures += 1;
                false
            },
        }
    }

    async fn pause(&self) {
        if !self.settings.pause.is_zero() {
            tokio::time::sleep(self.settings.pause).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use async_trait::async_trait;
    use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait};

    use super::*;
    use crate::{
        db,
        entities::{genre, movie, movie_actor, movie_genre, person},
        tmdb::{CastMember, Credits, CrewMember, GenreRef, MovieDetails, MovieSummary, PersonDetails},
    };

    #[derive(Default)]
    struct FakeSource {
        pages: HashMap<(ListCategory, u32), Vec<MovieSummary>>,
        movies: HashMap<i32, MovieDetails>,
        people: HashMap<i32, PersonDetails>,
        person_calls: Arc<Mutex<Vec<i32>>>,
        page_calls: Arc<Mutex<Vec<u32>>>,
    }

    impl FakeSource {
        fn page(mut self, page: u32, ids: &[i32]) -> Self {
            let summaries = ids.iter().map(|&id| MovieSummary { id: Some(id), title: None }).collect();
            self.pages.insert((ListCategory::Popular, page), summaries);
            self
        }

        fn movie(mut self, details: MovieDetails) -> Self {
            self.movies.insert(details.id, details);
            self
        }

        fn person(mut self, id: i32, name: &str) -> Self {
            self.people.insert(
                id,
                PersonDetails { id, name: Some(name.to_string()), gender: Some(2), ..Default::default() },
            );
            self
        }
    }

    #[async_trait]
    impl MovieSource for FakeSource {
        async fn movie_page(&self, category: ListCategory, page: u32) -> Option<Vec<MovieSummary>> {
            self.page_calls.lock().unwrap().push(page);
            self.pages.get(&(category, page)).cloned()
        }

        async fn movie_details(&self, movie_id: i32) -> Option<MovieDetails> {
            self.movies.get(&movie_id).cloned()
        }

        async fn person_details(&self, person_id: i32) -> Option<PersonDetails> {
            self.person_calls.lock().unwrap().push(person_id);
            self.people.get(&person_id).cloned()
        }
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<(EntityKind, i32)>>>);

    impl EntityObserver for Recorder {
        fn entity_created(&self, kind: EntityKind, id: i32, _label: &str) {
            self.0.lock().unwrap().push((kind, id));
        }
    }

    fn settings(pages: std::ops::RangeInclusive<u32>) -> ImportSettings {
        ImportSettings {
            categories: vec![ListCategory::Popular],
            pages,
            cast_limit: 5,
            pause: Duration::ZERO,
        }
    }

    fn crew(id: i32, job: &str) -> CrewMember {
        CrewMember { id: Some(id), name: None, job: Some(job.to_string()) }
    }

    fn cast(ids: &[i32]) -> Vec<CastMember> {
        ids.iter().map(|&id| CastMember { id: Some(id), name: None }).collect()
    }

    fn genre_ref(id: i32, name: &str) -> GenreRef {
        GenreRef { id: Some(id), name: Some(name.to_string()) }
    }

    fn inception() -> MovieDetails {
        MovieDetails {
            id: 27205,
            title: Some("Inception".to_string()),
            release_date: Some("2010-07-15".to_string()),
            overview: Some("Cobb steals secrets through dream-sharing.".to_string()),
            poster_path: Some("/inception.jpg".to_string()),
            vote_average: Some(8.4),
            runtime: Some(148),
            genres: vec![genre_ref(28, "Action")],
            credits: Credits { cast: cast(&[6193, 2524]), crew: vec![crew(525, "Director")] },
            ..Default::default()
        }
    }

    fn inception_source() -> FakeSource {
        FakeSource::default()
            .page(1, &[27205])
            .movie(inception())
            .person(525, "Christopher Nolan")
            .person(6193, "Leonardo DiCaprio")
            .person(2524, "Tom Hardy")
    }

    async fn counts(db: &DatabaseConnection) -> [u64; 5] {
        [
            movie::Entity::find().count(db).await.unwrap(),
            person::Entity::find().count(db).await.unwrap(),
            genre::Entity::find().count(db).await.unwrap(),
            movie_genre::Entity::find().count(db).await.unwrap(),
            movie_actor::Entity::find().count(db).await.unwrap(),
        ]
    }

    #[tokio::test]
    async fn single_movie_run_is_repeatable() {
        let db = db::memory().await;
        let recorder = Recorder::default();

        let importer = Importer::new(&db, inception_source(), recorder.clone(), settings(1..=1));
        let stats = importer.run().await.unwrap();

        assert_eq!(counts(&db).await, [1, 3, 1, 1, 2]);
        assert_eq!(stats.pages_committed, 1);
        assert_eq!(stats.movies_imported, 1);
        assert_eq!(stats.actor_links, 2);
        assert_eq!(stats.write_failures, 0);

        let stored = movie::Entity::find_by_id(27205).one(&db).await.unwrap().unwrap();
        assert_eq!(stored.director_id, Some(525));
        assert_eq!(stored.release_year, Some(2010));
        assert_eq!(stored.poster_url.as_deref(), Some("https://image.tmdb.org/t/p/w500/inception.jpg"));
        assert_eq!(recorder.0.lock().unwrap().len(), 5);

        let again = Importer::new(&db, inception_source(), recorder.clone(), settings(1..=1));
        let rerun = again.run().await.unwrap();
        assert_eq!(rerun.movies_imported, 1);
        assert_eq!(rerun.genre_links, 0);
        assert_eq!(rerun.actor_links, 0);

        assert_eq!(counts(&db).await, [1, 3, 1, 1, 2]);
        assert_eq!(recorder.0.lock().unwrap().len(), 5, "nothing new was created");
    }

    #[tokio::test]
    async fn first_listed_director_is_used() {
        let db = db::memory().await;
        let mut details = inception();
        details.credits = Credits {
            cast: vec![],
            crew: vec![crew(900, "Writer"), crew(11, "Director"), crew(12, "Director")],
        };
        let source = FakeSource::default()
            .page(1, &[details.id])
            .movie(details)
            .person(11, "First Director")
            .person(12, "Second Director");
        let calls = source.person_calls.clone();

        Importer::new(&db, source, Recorder::default(), settings(1..=1)).run().await.unwrap();

        let stored = movie::Entity::find_by_id(27205).one(&db).await.unwrap().unwrap();
        assert_eq!(stored.director_id, Some(11));
        assert_eq!(*calls.lock().unwrap(), vec![11]);
    }

    #[tokio::test]
    async fn cast_is_capped() {
        let db = db::memory().await;
        let ids = [1, 2, 3, 4, 5, 6, 7, 8];
        let mut details = inception();
        details.credits = Credits { cast: cast(&ids), crew: vec![] };
        let mut source = FakeSource::default().page(1, &[details.id]).movie(details);
        for id in ids {
            source = source.person(id, "Actor");
        }
        let calls = source.person_calls.clone();

        let stats =
            Importer::new(&db, source, Recorder::default(), settings(1..=1)).run().await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(stats.actor_links, 5);
        assert_eq!(movie_actor::Entity::find().count(&db).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn unavailable_movie_is_skipped_without_partial_rows() {
        let db = db::memory().await;
        let source = inception_source().page(1, &[404, 27205]);

        let stats =
            Importer::new(&db, source, Recorder::default(), settings(1..=1)).run().await.unwrap();

        assert_eq!(stats.movies_skipped, 1);
        assert_eq!(stats.movies_imported, 1);
        assert!(movie::Entity::find_by_id(404).one(&db).await.unwrap().is_none());
        assert_eq!(counts(&db).await, [1, 3, 1, 1, 2]);
    }

    #[tokio::test]
    async fn failed_and_empty_pages_are_skipped() {
        let db = db::memory().await;
        // page 1 is empty, page 2 is never served, page 3 carries the movie
        let source = inception_source().page(1, &[]).page(3, &[27205]);

        let stats =
            Importer::new(&db, source, Recorder::default(), settings(1..=3)).run().await.unwrap();

        assert_eq!(stats.pages_skipped, 2);
        assert_eq!(stats.pages_committed, 1);
        assert_eq!(counts(&db).await, [1, 3, 1, 1, 2]);
    }

    #[tokio::test]
    async fn unavailable_people_leave_no_dangling_links() {
        let db = db::memory().await;
        let source = FakeSource::default()
            .page(1, &[27205])
            .movie(inception())
            .person(6193, "Leonardo DiCaprio");
        let calls = source.person_calls.clone();

        let stats =
            Importer::new(&db, source, Recorder::default(), settings(1..=1)).run().await.unwrap();

        let stored = movie::Entity::find_by_id(27205).one(&db).await.unwrap().unwrap();
        assert_eq!(stored.director_id, None);
        assert_eq!(*calls.lock().unwrap(), vec![525, 6193, 2524]);
        assert_eq!(stats.actor_links, 1);
        assert_eq!(counts(&db).await, [1, 1, 1, 1, 1]);
    }
    #[tokio::test]
    async fn rejected_write_does_not_abort_the_page() {
        let db = db::memory().await;
        let mut details = inception();
        // a second genre id reusing an existing name violates genre.name uniqueness
        details.genres = vec![genre_ref(28, "Action"), genre_ref(29, "Action")];
        let source = inception_source().movie(details);

        let stats =
            Importer::new(&db, source, Recorder::default(), settings(1..=1)).run().await.unwrap();

        assert_eq!(stats.write_failures, 1);
        assert_eq!(stats.pages_committed, 1);
        assert_eq!(stats.genre_links, 1);
        assert_eq!(stats.actor_links, 2);
        assert_eq!(counts(&db).await, [1, 3, 1, 1, 2]);
        assert!(genre::Entity::find_by_id(29).one(&db).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn incomplete_genre_entry_is_skipped_alone() {
        let db = db::memory().await;
        let mut details = inception();
        details.genres.push(GenreRef { id: Some(18), name: None });
        let source = inception_source().movie(details);

        let stats =
            Importer::new(&db, source, Recorder::default(), settings(1..=1)).run().await.unwrap();

        assert_eq!(stats.write_failures, 1);
        assert_eq!(stats.movies_imported, 1);
        assert_eq!(counts(&db).await, [1, 3, 1, 1, 2]);
    }

    #[tokio::test]
    async fn commit_failure_ends_the_run() {
        let db = db::memory().await;
        // every new movie row leaves a deferred foreign-key violation behind,
        // which only surfaces when the page commits
        for ddl in [
            "CREATE TABLE audit_parent (id INTEGER PRIMARY KEY)",
            "CREATE TABLE audit (movie_id INTEGER REFERENCES audit_parent (id) \
             DEFERRABLE INITIALLY DEFERRED)",
            "CREATE TRIGGER audit_movie AFTER INSERT ON movie \
             BEGIN INSERT INTO audit (movie_id) VALUES (NEW.id); END",
        ] {
            db.execute_unprepared(ddl).await.unwrap();
        }
        let source = inception_source().page(2, &[27205]);
        let pages = source.page_calls.clone();

        let result = Importer::new(&db, source, Recorder::default(), settings(1..=2)).run().await;

        match result {
            Err(AppError::Commit { category, page, .. }) => {
                assert_eq!(category, ListCategory::Popular);
                assert_eq!(page, 1);
            },
            other => panic!("expected a commit failure, got {other:?}"),
        }
        assert_eq!(*pages.lock().unwrap(), vec![1]);
    }
}
