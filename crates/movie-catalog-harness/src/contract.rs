//! Isolated contract layer: the service router driven in-process against a
//! fresh ephemeral store, with no socket in between.

use axum::body::{to_bytes, Body};
use axum::Router;
use http::header::{AsHeaderName, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
use http::{HeaderMap, Method, Request, StatusCode};
use movie_catalog_api::MovieCatalogApi;
use movie_catalog_core::{Movie, MovieId, NewMovie};
use movie_catalog_service::{app, ServiceConfig, ServiceState, MOVIES_PATH};
use movie_catalog_store_sqlite::SqliteStore;
use serde_json::Value;
use tokio::runtime::Runtime;
use tower::ServiceExt;

use crate::error::{expect_eq, expect_that, CheckError};
use crate::report::{Layer, LayerReport};

pub const SEEDED_TITLE: &str = "Test Movie";
const BODY_LIMIT: usize = 4 * 1024 * 1024;

/// A router over its own ephemeral store plus the runtime that drives it.
///
/// Dropping the fixture drops the store, so nothing outlives one check.
pub struct ContractFixture {
    runtime: Runtime,
    router: Router,
    api: MovieCatalogApi,
    seeded: Vec<Movie>,
}

#[derive(Debug, Clone)]
pub struct FixtureResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl FixtureResponse {
    #[must_use]
    pub fn header(&self, name: impl AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// # Errors
    /// Returns [`CheckError::Assertion`] when the body is not JSON.
    pub fn json(&self) -> Result<Value, CheckError> {
        serde_json::from_slice(&self.body).map_err(|err| {
            CheckError::assertion(
                "JSON response body",
                format!("{err}: {}", String::from_utf8_lossy(&self.body)),
            )
        })
    }
}

impl ContractFixture {
    /// Fixture seeded with exactly one movie.
    ///
    /// # Errors
    /// Returns [`CheckError::Fixture`] when the store, seed, or runtime cannot be built.
    pub fn seeded(title: &str) -> Result<Self, CheckError> {
        Self::with_titles(&[title])
    }

    /// # Errors
    /// Returns [`CheckError::Fixture`] when the store, seed, or runtime cannot be built.
    pub fn with_titles(titles: &[&str]) -> Result<Self, CheckError> {
        let config = ServiceConfig::testing();
        let store = SqliteStore::open_ephemeral()
            .map_err(|err| CheckError::fixture(format!("{err:#}")))?;
        let api = MovieCatalogApi::new(store, config.api_options());
        let seeded = titles
            .iter()
            .map(|title| api.add_movie(title))
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|err| CheckError::fixture(format!("{err:#}")))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(CheckError::fixture)?;
        let router = app(ServiceState::new(api.clone(), config));

        Ok(Self { runtime, router, api, seeded })
    }

    #[must_use]
    pub fn seeded_movies(&self) -> &[Movie] {
        &self.seeded
    }

    #[must_use]
    pub fn api(&self) -> &MovieCatalogApi {
        &self.api
    }

    /// Issue one request against the router and collect the full response.
    ///
    /// # Errors
    /// Returns [`CheckError::Fixture`] when the request cannot be built or the body cannot be read.
    pub fn request(&self, method: Method, path: &str) -> Result<FixtureResponse, CheckError> {
        let request = Request::builder()
            .uri(path)
            .method(method)
            .body(Body::empty())
            .map_err(CheckError::fixture)?;
        let router = self.router.clone();

        self.runtime.block_on(async move {
            let response = match router.oneshot(request).await {
                Ok(response) => response,
                Err(never) => match never {},
            };
            let status = response.status();
            let headers = response.headers().clone();
            let body = to_bytes(response.into_body(), BODY_LIMIT)
                .await
                .map_err(CheckError::fixture)?
                .to_vec();
            Ok(FixtureResponse { status, headers, body })
        })
    }
}

/// Run every isolated contract check, each against its own fresh fixture.
#[must_use]
pub fn run_contract_layer() -> LayerReport {
    let mut report = LayerReport::new(Layer::Contract);
    report.check("get_movies_returns_seeded_record", check_get_movies_returns_seeded_record);
    report.check("post_movies_not_allowed", || check_rejects(Method::POST));
    report.check("put_movies_not_allowed", || check_rejects(Method::PUT));
    report.check("delete_movies_not_allowed", || check_rejects(Method::DELETE));
    report.check("cors_header_on_get", check_cors_header_on_get);
    report.check("record_model_display_and_projection", check_record_model);
    report.check("service_config_defaults", check_service_config_defaults);
    report
}

fn check_get_movies_returns_seeded_record() -> Result<(), CheckError> {
    let fixture = ContractFixture::seeded(SEEDED_TITLE)?;
    let response = fixture.request(Method::GET, MOVIES_PATH)?;

    expect_eq("status", &StatusCode::OK, &response.status)?;
    expect_eq("content-type", &Some("application/json"), &response.header(CONTENT_TYPE))?;

    let value = response.json()?;
    let items = value
        .as_array()
        .ok_or_else(|| CheckError::assertion("JSON array", value.to_string()))?;
    expect_that(!items.is_empty(), "at least one movie", || "empty array".to_string())?;

    let first = &items[0];
    expect_that(first.get("id").is_some_and(Value::is_i64), "integer `id` on first movie", || {
        first.to_string()
    })?;
    expect_eq("first title", &Some(SEEDED_TITLE), &first.get("title").and_then(Value::as_str))
}

fn check_rejects(method: Method) -> Result<(), CheckError> {
    let fixture = ContractFixture::seeded(SEEDED_TITLE)?;
    let before = fixture.api().count_movies().map_err(CheckError::fixture)?;
    let response = fixture.request(method.clone(), MOVIES_PATH)?;

    expect_eq(&format!("{method} status"), &StatusCode::METHOD_NOT_ALLOWED, &response.status)?;
    let after = fixture.api().count_movies().map_err(CheckError::fixture)?;
    expect_eq("row count after rejected request", &before, &after)
}

fn check_cors_header_on_get() -> Result<(), CheckError> {
    let fixture = ContractFixture::seeded(SEEDED_TITLE)?;
    let response = fixture.request(Method::GET, MOVIES_PATH)?;

    expect_eq("status", &StatusCode::OK, &response.status)?;
    expect_eq(
        "access-control-allow-origin",
        &Some("*"),
        &response.header(ACCESS_CONTROL_ALLOW_ORIGIN),
    )
}

fn check_record_model() -> Result<(), CheckError> {
    let title = "Test Movie Title";
    let movie = NewMovie::new(title).map_err(CheckError::fixture)?;
    expect_eq("title", title, movie.title())?;
    expect_eq("display form", "<Movie Test Movie Title>", movie.to_string().as_str())?;

    let movie = movie.with_id(MovieId(1));
    let map = movie.to_map();
    let mut keys = map.keys().map(String::as_str).collect::<Vec<_>>();
    keys.sort_unstable();
    expect_eq("projection keys", &["id", "title"][..], keys.as_slice())?;
    expect_eq("projected id", &Some(1), &map.get("id").and_then(Value::as_i64))?;
    expect_eq("projected title", &Some(title), &map.get("title").and_then(Value::as_str))
}

fn check_service_config_defaults() -> Result<(), CheckError> {
    let config = ServiceConfig::default();
    expect_eq("track_mutations", &false, &config.track_mutations)?;
    expect_eq("compact_json", &false, &config.compact_json)?;
    expect_eq("testing_mode", &false, &config.testing_mode)?;

    let testing = ServiceConfig::testing();
    expect_eq("testing_mode under test", &true, &testing.testing_mode)?;
    expect_eq(
        "test database location",
        std::path::Path::new(movie_catalog_service::EPHEMERAL_DATABASE_LOCATION),
        testing.database_location.as_path(),
    )
}
