use std::fmt::Debug;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a single check failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckError {
    #[error("expected {expected}, got {actual}")]
    Assertion { expected: String, actual: String },
    #[error("{service} not running at {address}: {reason}")]
    Unreachable { service: String, address: String, reason: String },
    #[error("missing artifact: {}", path.display())]
    MissingArtifact { path: PathBuf },
    #[error("{}: missing expected marker(s): {}", path.display(), markers.join(" | "))]
    MissingMarkers { path: PathBuf, markers: Vec<String> },
    #[error("{}: field `{field}` expected {expected:?}, got {actual}", path.display())]
    FieldMismatch { path: PathBuf, field: String, expected: String, actual: String },
    #[error("{}: malformed artifact: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },
    #[error("fixture error: {0}")]
    Fixture(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A value was present but wrong.
    Assertion,
    /// A live dependency refused the connection or timed out.
    Unreachable,
    /// A configuration file the check reads does not exist.
    MissingArtifact,
    /// The isolated fixture could not be built.
    Fixture,
}

impl CheckError {
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Assertion { .. }
            | Self::MissingMarkers { .. }
            | Self::FieldMismatch { .. }
            | Self::Malformed { .. } => FailureKind::Assertion,
            Self::Unreachable { .. } => FailureKind::Unreachable,
            Self::MissingArtifact { .. } => FailureKind::MissingArtifact,
            Self::Fixture(_) => FailureKind::Fixture,
        }
    }

    pub fn assertion(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::Assertion { expected: expected.into(), actual: actual.into() }
    }

    pub fn fixture(err: impl std::fmt::Display) -> Self {
        Self::Fixture(err.to_string())
    }
}

/// Compare two values, reporting both sides on mismatch.
///
/// # Errors
/// Returns [`CheckError::Assertion`] when `actual != expected`.
pub fn expect_eq<T>(what: &str, expected: &T, actual: &T) -> Result<(), CheckError>
where
    T: Debug + PartialEq + ?Sized,
{
    if expected == actual {
        return Ok(());
    }
    Err(CheckError::assertion(format!("{what} = {expected:?}"), format!("{actual:?}")))
}

/// # Errors
/// Returns [`CheckError::Assertion`] carrying `expected` when `condition` is false.
pub fn expect_that(
    condition: bool,
    expected: &str,
    actual: impl FnOnce() -> String,
) -> Result<(), CheckError> {
    if condition {
        Ok(())
    } else {
        Err(CheckError::assertion(expected, actual()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_separate_missing_files_from_wrong_content() {
        let missing = CheckError::MissingArtifact { path: PathBuf::from("Procfile.dev") };
        let wrong = CheckError::MissingMarkers {
            path: PathBuf::from("Procfile.dev"),
            markers: vec!["web: PORT=4000 npm start --prefix client".to_string()],
        };
        let down = CheckError::Unreachable {
            service: "resource service".to_string(),
            address: "http://127.0.0.1:5555".to_string(),
            reason: "connection refused".to_string(),
        };

        assert_eq!(missing.kind(), FailureKind::MissingArtifact);
        assert_eq!(wrong.kind(), FailureKind::Assertion);
        assert_eq!(down.kind(), FailureKind::Unreachable);
        assert_eq!(
            down.to_string(),
            "resource service not running at http://127.0.0.1:5555: connection refused"
        );
    }

    #[test]
    fn expect_eq_reports_both_sides() {
        assert!(expect_eq("status", &200_u16, &200_u16).is_ok());
        let err = expect_eq("status", &200_u16, &405_u16)
            .err()
            .unwrap_or_else(|| panic!("mismatch should fail"));
        assert_eq!(err.to_string(), "expected status = 200, got 405");
    }
}
