//! Live dual-process layer. Both processes must already be running; this layer
//! never starts them.

use std::time::Duration;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{expect_eq, expect_that, CheckError};
use crate::profile::LiveEnvironment;
use crate::report::{Layer, LayerReport};

const MOVIES_PATH: &str = "/movies";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    ResourceService,
    ClientHost,
}

impl Target {
    #[must_use]
    pub fn service_name(self) -> &'static str {
        match self {
            Self::ResourceService => "resource service",
            Self::ClientHost => "client host",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LiveResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub allow_origin: Option<String>,
    pub body: String,
}

impl LiveResponse {
    /// # Errors
    /// Returns [`CheckError::Assertion`] when the body is not JSON.
    pub fn json(&self) -> Result<Value, CheckError> {
        serde_json::from_str(&self.body).map_err(|err| {
            CheckError::assertion(format!("JSON body from {}", self.url), format!("{err}"))
        })
    }

    fn media_type(&self) -> Option<&str> {
        self.content_type.as_deref().and_then(|value| value.split(';').next()).map(str::trim)
    }
}

/// Reachability of both processes, captured once per run.
#[derive(Debug, Clone)]
pub struct Preflight {
    pub resource_service: Result<(), CheckError>,
    pub client_host: Result<(), CheckError>,
}

/// Blocking client for the two running processes, one bounded call at a time.
pub struct LiveHarness {
    env: LiveEnvironment,
    agent: ureq::Agent,
}

impl LiveHarness {
    #[must_use]
    pub fn new(env: LiveEnvironment) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_millis(env.timeout_ms))
            .redirects(0)
            .build();
        Self { env, agent }
    }

    #[must_use]
    pub fn environment(&self) -> &LiveEnvironment {
        &self.env
    }

    fn base(&self, target: Target) -> &str {
        match target {
            Target::ResourceService => self.env.api_base.trim_end_matches('/'),
            Target::ClientHost => self.env.ui_base.trim_end_matches('/'),
        }
    }

    /// Issue one GET. Any HTTP status counts as a response; only transport
    /// failures become [`CheckError::Unreachable`].
    ///
    /// # Errors
    /// Returns [`CheckError::Unreachable`] on connection refusal, timeout, or a truncated body.
    pub fn get(&self, target: Target, path: &str) -> Result<LiveResponse, CheckError> {
        let url = format!("{}{path}", self.base(target));
        let unreachable = |reason: String| CheckError::Unreachable {
            service: target.service_name().to_string(),
            address: url.clone(),
            reason,
        };

        let response = match self.agent.get(&url).call() {
            Ok(response) | Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => {
                return Err(unreachable(transport.to_string()));
            }
        };

        let status = response.status();
        let content_type = response.header("content-type").map(ToString::to_string);
        let allow_origin = response.header("access-control-allow-origin").map(ToString::to_string);
        let body = response
            .into_string()
            .map_err(|err| unreachable(format!("failed to read response body: {err}")))?;
        tracing::debug!(%url, status, bytes = body.len(), "live response");

        Ok(LiveResponse { url, status, content_type, allow_origin, body })
    }

    /// Confirm the target answers HTTP at all.
    ///
    /// # Errors
    /// Returns [`CheckError::Unreachable`] naming the service that is down.
    pub fn probe(&self, target: Target) -> Result<(), CheckError> {
        self.get(target, "/").map(|_| ())
    }

    /// Probe both processes before any dependent check runs.
    #[must_use]
    pub fn preflight(&self) -> Preflight {
        Preflight {
            resource_service: self.probe(Target::ResourceService),
            client_host: self.probe(Target::ClientHost),
        }
    }

    fn movies(&self, target: Target) -> Result<(LiveResponse, Vec<Value>), CheckError> {
        let response = self.get(target, MOVIES_PATH)?;
        expect_eq(&format!("status of {}", response.url), &200_u16, &response.status)?;
        let value = response.json()?;
        let Value::Array(items) = value else {
            return Err(CheckError::assertion(
                format!("JSON array from {}", response.url),
                value.to_string(),
            ));
        };
        Ok((response, items))
    }

    /// # Errors
    /// Returns a [`CheckError`] describing the first broken expectation.
    pub fn check_direct_listing(&self) -> Result<(), CheckError> {
        let (response, items) = self.movies(Target::ResourceService)?;
        expect_eq("content-type", &Some("application/json"), &response.media_type())?;
        expect_that(!items.is_empty(), "a non-empty movie list", || "[]".to_string())?;

        for (index, item) in items.iter().enumerate() {
            expect_that(
                has_movie_fields(item),
                &format!("movie {index} with `id` and `title`"),
                || item.to_string(),
            )?;
        }
        Ok(())
    }

    /// # Errors
    /// Returns a [`CheckError`] describing the first broken expectation.
    pub fn check_client_root(&self) -> Result<(), CheckError> {
        let response = self.get(Target::ClientHost, "/")?;
        expect_eq("status", &200_u16, &response.status)?;
        expect_that(
            response.content_type.as_deref().is_some_and(|value| value.contains("text/html")),
            "text/html content type",
            || format!("{:?}", response.content_type),
        )?;
        expect_that(
            response.body.contains(&self.env.app_marker),
            &format!("index page containing {:?}", self.env.app_marker),
            || format!("{} bytes without the marker", response.body.len()),
        )
    }

    /// # Errors
    /// Returns a [`CheckError`] when the proxied payload differs from the direct one.
    pub fn check_proxy_parity(&self) -> Result<(), CheckError> {
        let (_, direct) = self.movies(Target::ResourceService)?;
        let (_, proxied) = self.movies(Target::ClientHost)?;
        if direct == proxied {
            return Ok(());
        }
        Err(CheckError::assertion(
            format!(
                "proxied payload identical to direct ({} movies, sha256 {})",
                direct.len(),
                digest(&direct)
            ),
            format!("{} movies, sha256 {}", proxied.len(), digest(&proxied)),
        ))
    }

    /// # Errors
    /// Returns a [`CheckError`] when the CORS header is missing or not `*`.
    pub fn check_cors(&self) -> Result<(), CheckError> {
        let response = self.get(Target::ResourceService, MOVIES_PATH)?;
        expect_eq("status", &200_u16, &response.status)?;
        expect_eq("access-control-allow-origin", &Some("*"), &response.allow_origin.as_deref())
    }

    /// # Errors
    /// Returns a [`CheckError`] when the live collection size differs from the expected seed.
    pub fn check_population(&self) -> Result<(), CheckError> {
        let (_, items) = self.movies(Target::ResourceService)?;
        expect_eq("movie count", &self.env.expected_population, &items.len())?;

        if let Some(first) = items.first() {
            expect_that(
                first.get("title").and_then(Value::as_str).is_some_and(|title| !title.is_empty())
                    && first.get("id").is_some_and(Value::is_i64),
                "first movie with integer id and non-empty title",
                || first.to_string(),
            )?;
        }
        Ok(())
    }
}

fn has_movie_fields(item: &Value) -> bool {
    item.get("id").is_some_and(Value::is_i64) && item.get("title").is_some_and(Value::is_string)
}

/// Hex SHA-256 of the payload's JSON encoding.
#[must_use]
pub fn digest(items: &[Value]) -> String {
    let bytes = serde_json::to_vec(items).unwrap_or_default();
    hex::encode(Sha256::digest(bytes))
}

/// Probe both processes up front, then run every live check. A check whose
/// process failed the probe is reported as unreachable without another call.
#[must_use]
pub fn run_live_layer(env: LiveEnvironment) -> LayerReport {
    let harness = LiveHarness::new(env);
    let Preflight { resource_service: api_ready, client_host: ui_ready } = harness.preflight();

    let mut report = LayerReport::new(Layer::Live);
    report.check("resource_service_reachable", || api_ready.clone());
    report.check("client_host_reachable", || ui_ready.clone());
    report.check("resource_service_lists_movies", || {
        api_ready.clone()?;
        harness.check_direct_listing()
    });
    report.check("client_host_serves_app", || {
        ui_ready.clone()?;
        harness.check_client_root()
    });
    report.check("proxy_matches_direct", || {
        api_ready.clone()?;
        ui_ready.clone()?;
        harness.check_proxy_parity()
    });
    report.check("live_cors_header", || {
        api_ready.clone()?;
        harness.check_cors()
    });
    report.check("population_matches_seed", || {
        api_ready.clone()?;
        harness.check_population()
    });
    report
}
