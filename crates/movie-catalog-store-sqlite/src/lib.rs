use std::path::Path;

use anyhow::{anyhow, Context, Result};
use movie_catalog_core::{Movie, MovieId, NewMovie};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

const LATEST_SCHEMA_VERSION: i64 = 1;
const MEMORY_PATH: &str = ":memory:";

const CREATE_SCHEMA_MIGRATIONS_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at TEXT NOT NULL
);
";

const MIGRATION_001_SQL: &str = r"
CREATE TABLE IF NOT EXISTS movies (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  title TEXT NOT NULL CHECK (length(trim(title)) > 0)
);
";

pub struct SqliteStore {
    conn: Connection,
    ephemeral: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaStatus {
    pub current_version: i64,
    pub target_version: i64,
    pub pending_versions: Vec<i64>,
}

impl SqliteStore {
    /// Open a SQLite-backed movie store. The path `:memory:` opens an ephemeral
    /// store that disappears when the handle is dropped.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or pragmas cannot be applied.
    pub fn open(path: &Path) -> Result<Self> {
        let ephemeral = path == Path::new(MEMORY_PATH);
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        let pragmas = if ephemeral {
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;"
        } else {
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;"
        };
        conn.execute_batch(pragmas).context("failed to configure sqlite pragmas")?;

        Ok(Self { conn, ephemeral })
    }

    /// Open a fresh in-memory store and bring it to the latest schema.
    ///
    /// # Errors
    /// Returns an error when the connection or the migration fails.
    pub fn open_ephemeral() -> Result<Self> {
        let mut store = Self::open(Path::new(MEMORY_PATH))?;
        store.migrate()?;
        Ok(store)
    }

    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    /// Report current and target schema versions plus pending migrations.
    ///
    /// # Errors
    /// Returns an error when schema metadata cannot be read or initialized.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;
        let current_version = current_schema_version(&self.conn)?;
        let pending_versions = if current_version < LATEST_SCHEMA_VERSION {
            ((current_version + 1)..=LATEST_SCHEMA_VERSION).collect::<Vec<_>>()
        } else {
            Vec::new()
        };

        Ok(SchemaStatus {
            current_version,
            target_version: LATEST_SCHEMA_VERSION,
            pending_versions,
        })
    }

    /// Apply all forward migrations up to the latest supported schema version.
    ///
    /// # Errors
    /// Returns an error when migration bootstrapping or any migration step fails.
    pub fn migrate(&mut self) -> Result<()> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;

        let version = current_schema_version(&self.conn)?;
        if version < 1 {
            let tx = self.conn.transaction().context("failed to start migration v1 transaction")?;
            tx.execute_batch(MIGRATION_001_SQL).context("failed to apply migration v1")?;
            record_schema_version(&tx, 1)?;
            tx.commit().context("failed to commit migration v1")?;
        }

        let version = current_schema_version(&self.conn)?;
        if version != LATEST_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported schema version {version}; expected {LATEST_SCHEMA_VERSION}"
            ));
        }

        Ok(())
    }

    /// Persist one movie and return it with its store-assigned id.
    ///
    /// # Errors
    /// Returns an error when the insert fails.
    pub fn insert_movie(&mut self, movie: &NewMovie) -> Result<Movie> {
        self.conn
            .execute("INSERT INTO movies(title) VALUES (?1)", params![movie.title()])
            .with_context(|| format!("failed to insert movie {movie}"))?;
        let id = MovieId(self.conn.last_insert_rowid());
        Ok(movie.clone().with_id(id))
    }

    /// Persist a batch of movies in one transaction; nothing is written if any insert fails.
    ///
    /// # Errors
    /// Returns an error when any insert or the commit fails.
    pub fn insert_movies(&mut self, movies: &[NewMovie]) -> Result<Vec<Movie>> {
        let tx = self.conn.transaction().context("failed to start transaction")?;
        let mut inserted = Vec::with_capacity(movies.len());
        for movie in movies {
            tx.execute("INSERT INTO movies(title) VALUES (?1)", params![movie.title()])
                .with_context(|| format!("failed to insert movie {movie}"))?;
            inserted.push(movie.clone().with_id(MovieId(tx.last_insert_rowid())));
        }
        tx.commit().context("failed to commit movie batch")?;
        Ok(inserted)
    }

    /// Load the whole collection in primary-key order.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or decoded from `SQLite`.
    pub fn list_movies(&self) -> Result<Vec<Movie>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title FROM movies ORDER BY id ASC")
            .context("failed to prepare movie listing")?;

        let mut rows = stmt.query([])?;
        let mut movies = Vec::new();
        while let Some(row) = rows.next()? {
            let movie = Movie { id: MovieId(row.get(0)?), title: row.get(1)? };
            movie.validate().map_err(|err| anyhow!("stored movie is invalid: {err}"))?;
            movies.push(movie);
        }

        Ok(movies)
    }

    /// # Errors
    /// Returns an error when the count query fails.
    pub fn count_movies(&self) -> Result<usize> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM movies", [], |row| row.get::<_, i64>(0))
            .context("failed to count movies")?;
        usize::try_from(count).context("movie count out of range")
    }
}

fn current_schema_version(conn: &Connection) -> Result<i64> {
    let version = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| {
            row.get::<_, i64>(0)
        })
        .context("failed to read current schema version")?;
    Ok(version)
}

fn record_schema_version(conn: &Connection, version: i64) -> Result<()> {
    let now = OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .context("failed to format RFC3339 timestamp")?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
        params![version, now],
    )
    .with_context(|| format!("failed to record migration version {version}"))?;
    Ok(())
}
