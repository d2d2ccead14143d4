use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum CatalogError {
    #[error("validation error: {0}")]
    Validation(String),
}

/// Store-assigned identifier of one movie row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(transparent)]
pub struct MovieId(pub i64);

impl Display for MovieId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A movie that has not been written to a store yet.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct NewMovie {
    title: String,
}

impl NewMovie {
    /// Build a movie from its title.
    ///
    /// # Errors
    /// Returns [`CatalogError::Validation`] when the title is empty or whitespace only.
    pub fn new(title: impl Into<String>) -> Result<Self, CatalogError> {
        let title = title.into();
        validate_title(&title)?;
        Ok(Self { title })
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn with_id(self, id: MovieId) -> Movie {
        Movie { id, title: self.title }
    }
}

impl Display for NewMovie {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Movie {}>", self.title)
    }
}

/// A persisted movie row.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
}

impl Movie {
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Project the row into a JSON object holding exactly `id` and `title`.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::with_capacity(2);
        map.insert("id".to_string(), Value::from(self.id.0));
        map.insert("title".to_string(), Value::String(self.title.clone()));
        map
    }

    /// Validate a row read back from storage or decoded from the wire.
    ///
    /// # Errors
    /// Returns [`CatalogError::Validation`] for a non-positive id or an empty title.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.id.0 < 1 {
            return Err(CatalogError::Validation(format!(
                "movie id must be positive, got {}",
                self.id
            )));
        }
        validate_title(&self.title)
    }
}

impl Display for Movie {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Movie {}>", self.title)
    }
}

fn validate_title(title: &str) -> Result<(), CatalogError> {
    if title.trim().is_empty() {
        return Err(CatalogError::Validation("movie title must not be empty".to_string()));
    }
    Ok(())
}
