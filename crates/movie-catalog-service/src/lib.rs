use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use http::header::{ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
use http::{HeaderValue, Method, StatusCode};
use movie_catalog_api::{ApiOptions, MovieCatalogApi};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

pub mod logging;

pub const SERVICE_CONTRACT_VERSION: &str = "service.v1";
pub const MOVIES_PATH: &str = "/movies";
pub const DEFAULT_BIND: &str = "127.0.0.1:5555";
pub const DEFAULT_DATABASE_LOCATION: &str = "./movies.sqlite3";
pub const EPHEMERAL_DATABASE_LOCATION: &str = ":memory:";

const JSON_CONTENT_TYPE: &str = "application/json";
const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS";

/// Recognized service options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    pub database_location: PathBuf,
    pub track_mutations: bool,
    pub testing_mode: bool,
    /// Compact JSON bodies instead of pretty-printed ones.
    pub compact_json: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_location: PathBuf::from(DEFAULT_DATABASE_LOCATION),
            track_mutations: false,
            testing_mode: false,
            compact_json: false,
        }
    }
}

impl ServiceConfig {
    /// Ephemeral in-memory database with error details exposed.
    #[must_use]
    pub fn testing() -> Self {
        Self {
            database_location: PathBuf::from(EPHEMERAL_DATABASE_LOCATION),
            testing_mode: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn api_options(&self) -> ApiOptions {
        ApiOptions { track_mutations: self.track_mutations }
    }

    /// Open the configured store and wrap it in an API handle.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or migrated.
    pub fn open_api(&self) -> Result<MovieCatalogApi> {
        MovieCatalogApi::open(&self.database_location, self.api_options())
    }
}

#[derive(Debug, Clone)]
pub struct ServiceState {
    api: MovieCatalogApi,
    config: Arc<ServiceConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceError {
    service_contract_version: &'static str,
    error: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let body = serde_json::to_vec(&self).unwrap_or_default();
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))],
            body,
        )
            .into_response()
    }
}

impl ServiceState {
    #[must_use]
    pub fn new(api: MovieCatalogApi, config: ServiceConfig) -> Self {
        Self { api, config: Arc::new(config) }
    }

    /// # Errors
    /// Returns an error when the configured store cannot be opened.
    pub fn from_config(config: ServiceConfig) -> Result<Self> {
        let api = config.open_api()?;
        Ok(Self::new(api, config))
    }

    #[must_use]
    pub fn api(&self) -> &MovieCatalogApi {
        &self.api
    }

    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn error(&self, err: &anyhow::Error) -> ServiceError {
        tracing::error!(error = %format!("{err:#}"), "request failed");
        let error = if self.config.testing_mode {
            format!("{err:#}")
        } else {
            "internal server error".to_string()
        };
        ServiceError { service_contract_version: SERVICE_CONTRACT_VERSION, error }
    }
}

pub fn app(state: ServiceState) -> Router {
    Router::new()
        .route(MOVIES_PATH, get(list_movies))
        .layer(middleware::from_fn(allow_any_origin))
        .with_state(state)
}

/// Serve the router on an already bound listener until the process stops.
///
/// # Errors
/// Returns an error when the server loop fails.
pub async fn serve(listener: TcpListener, state: ServiceState) -> Result<()> {
    let local_addr = listener.local_addr().context("listener has no local address")?;
    tracing::info!(%local_addr, path = MOVIES_PATH, "movie catalog service listening");
    axum::serve(listener, app(state)).await.context("movie catalog service stopped")?;
    Ok(())
}

async fn list_movies(State(state): State<ServiceState>) -> Result<Response, ServiceError> {
    let movies = state.api.list_movies().map_err(|err| state.error(&err))?;
    tracing::debug!(count = movies.len(), "listed movies");

    let body = if state.config.compact_json {
        serde_json::to_vec(&movies)
    } else {
        serde_json::to_vec_pretty(&movies)
    }
    .map_err(|err| state.error(&anyhow::Error::from(err)))?;

    Ok((StatusCode::OK, [(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))], body)
        .into_response())
}

async fn allow_any_origin(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS));
        return response;
    }

    let mut response = next.run(request).await;
    response.headers_mut().insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}
