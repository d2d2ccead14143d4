use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use ulid::Ulid;

use crate::error::{CheckError, FailureKind};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Contract,
    Artifacts,
    Live,
}

impl Layer {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contract => "contract",
            Self::Artifacts => "artifacts",
            Self::Live => "live",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&CheckError> for Failure {
    fn from(err: &CheckError) -> Self {
        Self { kind: err.kind(), message: err.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckOutcome {
    pub name: String,
    pub passed: bool,
    pub failure: Option<Failure>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LayerReport {
    pub layer: Layer,
    pub outcomes: Vec<CheckOutcome>,
}

impl LayerReport {
    #[must_use]
    pub fn new(layer: Layer) -> Self {
        Self { layer, outcomes: Vec::new() }
    }

    /// Run one check in isolation and record its outcome.
    ///
    /// A failing or panicking check never stops the checks recorded after it.
    pub fn check<F>(&mut self, name: &str, check: F) -> &CheckOutcome
    where
        F: FnOnce() -> Result<(), CheckError>,
    {
        let result = match catch_unwind(AssertUnwindSafe(check)) {
            Ok(result) => result,
            Err(payload) => Err(CheckError::assertion(
                "check to complete",
                format!("panic: {}", panic_message(payload.as_ref())),
            )),
        };

        let outcome = match result {
            Ok(()) => {
                tracing::info!(layer = self.layer.as_str(), check = name, "check passed");
                CheckOutcome { name: name.to_string(), passed: true, failure: None }
            }
            Err(err) => {
                tracing::warn!(
                    layer = self.layer.as_str(),
                    check = name,
                    kind = ?err.kind(),
                    error = %err,
                    "check failed"
                );
                CheckOutcome { name: name.to_string(), passed: false, failure: Some((&err).into()) }
            }
        };
        self.outcomes.push(outcome);
        &self.outcomes[self.outcomes.len() - 1]
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.passed)
    }

    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<&CheckOutcome> {
        self.outcomes.iter().find(|outcome| outcome.name == name)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HarnessReport {
    pub run_id: Ulid,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    pub layers: Vec<LayerReport>,
}

impl HarnessReport {
    #[must_use]
    pub fn new(layers: Vec<LayerReport>) -> Self {
        Self { run_id: Ulid::new(), generated_at: OffsetDateTime::now_utc(), layers }
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.layers.iter().all(LayerReport::passed)
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.failures().count()).sum()
    }

    #[must_use]
    pub fn check_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.outcomes.len()).sum()
    }
}
