use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use movie_catalog_core::{Movie, NewMovie};
use movie_catalog_store_sqlite::{SchemaStatus, SqliteStore};
use serde::{Deserialize, Serialize};

pub const API_CONTRACT_VERSION: &str = "api.v1";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiOptions {
    /// Emit a structured event for every row written through the API.
    pub track_mutations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedResult {
    pub inserted: usize,
    pub total: usize,
}

/// Read and seed operations over one explicitly supplied store handle.
///
/// Clones share the same store.
#[derive(Clone)]
pub struct MovieCatalogApi {
    store: Arc<Mutex<SqliteStore>>,
    options: ApiOptions,
}

impl std::fmt::Debug for MovieCatalogApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovieCatalogApi").field("options", &self.options).finish_non_exhaustive()
    }
}

impl MovieCatalogApi {
    #[must_use]
    pub fn new(store: SqliteStore, options: ApiOptions) -> Self {
        Self { store: Arc::new(Mutex::new(store)), options }
    }

    /// Open the store at `db_path` (`:memory:` for an ephemeral one) and migrate it.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or migrated.
    pub fn open(db_path: &Path, options: ApiOptions) -> Result<Self> {
        let mut store = SqliteStore::open(db_path)?;
        store.migrate()?;
        Ok(Self::new(store, options))
    }

    #[must_use]
    pub fn options(&self) -> ApiOptions {
        self.options
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, SqliteStore>> {
        self.store.lock().map_err(|_| anyhow!("movie store lock poisoned"))
    }

    /// # Errors
    /// Returns an error when schema metadata cannot be read.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        self.lock_store()?.schema_status()
    }

    /// Return the whole collection in store order.
    ///
    /// # Errors
    /// Returns an error when the store cannot be read.
    pub fn list_movies(&self) -> Result<Vec<Movie>> {
        self.lock_store()?.list_movies()
    }

    /// # Errors
    /// Returns an error when the store cannot be read.
    pub fn count_movies(&self) -> Result<usize> {
        self.lock_store()?.count_movies()
    }

    /// Add one movie.
    ///
    /// # Errors
    /// Returns an error when the title is blank or persistence fails.
    pub fn add_movie(&self, title: &str) -> Result<Movie> {
        let new_movie = NewMovie::new(title).map_err(|err| anyhow!("{err}"))?;
        let movie = self.lock_store()?.insert_movie(&new_movie)?;
        if self.options.track_mutations {
            tracing::info!(movie_id = movie.id.0, title = %movie.title, "movie inserted");
        }
        Ok(movie)
    }

    /// Insert every title as one batch into an empty store. Blank titles reject
    /// the whole batch; a store that already holds rows is left untouched so a
    /// repeated seed cannot change the deployed population.
    ///
    /// # Errors
    /// Returns an error when the store is not empty, any title is blank, or
    /// persistence fails.
    pub fn seed_titles<I, S>(&self, titles: I) -> Result<SeedResult>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let new_movies = titles
            .into_iter()
            .map(|title| NewMovie::new(title).map_err(|err| anyhow!("{err}")))
            .collect::<Result<Vec<_>>>()?;

        let mut store = self.lock_store()?;
        let existing = store.count_movies()?;
        if existing > 0 {
            bail!("refusing to seed a store that already holds {existing} movies");
        }
        let inserted = store.insert_movies(&new_movies)?;
        if self.options.track_mutations {
            for movie in &inserted {
                tracing::info!(movie_id = movie.id.0, title = %movie.title, "movie inserted");
            }
        }
        let total = store.count_movies()?;
        tracing::debug!(inserted = inserted.len(), total, "seed batch committed");

        Ok(SeedResult { inserted: inserted.len(), total })
    }
}

/// Split a titles file into one title per non-blank line, trimming surrounding whitespace.
#[must_use]
pub fn titles_from_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use proptest::prelude::*;

    use super::*;

    fn ephemeral_api() -> MovieCatalogApi {
        let store = SqliteStore::open_ephemeral()
            .unwrap_or_else(|err| panic!("failed to open ephemeral store: {err}"));
        MovieCatalogApi::new(store, ApiOptions::default())
    }

    fn unique_temp_db_path() -> PathBuf {
        std::env::temp_dir().join(format!("movie-catalog-api-{}.sqlite3", ulid::Ulid::new()))
    }

    #[test]
    fn api_add_and_list_round_trip() -> Result<()> {
        let api = ephemeral_api();
        let added = api.add_movie("Test Movie")?;

        assert_eq!(added.id.0, 1);
        assert_eq!(api.list_movies()?, vec![added]);
        Ok(())
    }

    #[test]
    fn clones_share_one_store() -> Result<()> {
        let api = ephemeral_api();
        let clone = api.clone();
        clone.add_movie("Stalker")?;

        assert_eq!(api.count_movies()?, 1);
        Ok(())
    }

    #[test]
    fn seed_rejects_whole_batch_on_blank_title() -> Result<()> {
        let api = ephemeral_api();
        let result = api.seed_titles(["Vertigo", "   ", "Psycho"]);

        assert!(result.is_err());
        assert_eq!(api.count_movies()?, 0);
        Ok(())
    }

    #[test]
    fn seed_refuses_a_populated_store() -> Result<()> {
        let api = ephemeral_api();
        api.seed_titles(["Jaws", "Heat"])?;

        let err = api
            .seed_titles(["Jaws", "Heat"])
            .err()
            .unwrap_or_else(|| panic!("second seed should be refused"));
        assert!(err.to_string().contains("already holds 2 movies"), "{err}");
        assert_eq!(api.count_movies()?, 2);

        let api = ephemeral_api();
        api.add_movie("Alien")?;
        assert!(api.seed_titles(["Brazil"]).is_err());
        assert_eq!(api.count_movies()?, 1);
        Ok(())
    }

    #[test]
    fn open_migrates_file_backed_store() -> Result<()> {
        let db_path = unique_temp_db_path();
        let api = MovieCatalogApi::open(&db_path, ApiOptions { track_mutations: true })?;
        let seeded = api.seed_titles(["Rear Window", "North by Northwest"])?;

        assert_eq!(seeded, SeedResult { inserted: 2, total: 2 });
        assert!(api.schema_status()?.pending_versions.is_empty());
        assert!(api.options().track_mutations);

        drop(api);
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", db_path.display(), suffix));
        }
        Ok(())
    }

    #[test]
    fn titles_file_skips_blank_lines() {
        let titles = titles_from_lines("  The Thing \n\n\tHalloween\n   \nThe Fog");
        assert_eq!(titles, vec!["The Thing", "Halloween", "The Fog"]);
    }

    proptest! {
        #[test]
        fn property_repeated_listing_is_idempotent(count in 1_usize..30) {
            let api = ephemeral_api();
            let titles = (0..count).map(|index| format!("Movie {index}")).collect::<Vec<_>>();
            api.seed_titles(titles).unwrap_or_else(|err| panic!("seed failed: {err}"));

            let first = api.list_movies().unwrap_or_else(|err| panic!("list failed: {err}"));
            let second = api.list_movies().unwrap_or_else(|err| panic!("list failed: {err}"));
            prop_assert_eq!(first.len(), count);
            prop_assert_eq!(first, second);
        }
    }
}
