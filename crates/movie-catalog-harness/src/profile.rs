//! Harness expectations loaded from YAML.
//!
//! Every value here is an environment fact (file locations, addresses, the size
//! of the deployed seed) rather than a protocol invariant, so all of it can be
//! overridden per deployment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// One `<role>: <command>` line expected in the process manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessExpectation {
    pub role: String,
    pub command: String,
}

impl ProcessExpectation {
    #[must_use]
    pub fn line(&self) -> String {
        format!("{}: {}", self.role, self.command)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ArtifactExpectations {
    /// Directory the relative artifact paths resolve against.
    pub root: PathBuf,
    pub package_json: PathBuf,
    pub procfile: PathBuf,
    pub ui_entry: PathBuf,
    pub expected_proxy: String,
    pub expected_start_script: String,
    pub expected_processes: Vec<ProcessExpectation>,
    pub ui_markers: Vec<String>,
    /// When set, the file must exist and be non-empty.
    pub database_file: Option<PathBuf>,
}

impl Default for ArtifactExpectations {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            package_json: PathBuf::from("client/package.json"),
            procfile: PathBuf::from("Procfile.dev"),
            ui_entry: PathBuf::from("client/src/App.js"),
            expected_proxy: "http://127.0.0.1:5555".to_string(),
            expected_start_script: "PORT=4000 react-scripts start".to_string(),
            expected_processes: vec![
                ProcessExpectation {
                    role: "web".to_string(),
                    command: "PORT=4000 npm start --prefix client".to_string(),
                },
                ProcessExpectation {
                    role: "api".to_string(),
                    command: "movie-catalog-service serve --bind 127.0.0.1:5555 --db ./movies.sqlite3"
                        .to_string(),
                },
            ],
            ui_markers: vec![
                "useEffect".to_string(),
                "fetch(\"/movies\")".to_string(),
                "console.log(movies)".to_string(),
                "Check the console for a list of movies!".to_string(),
            ],
            database_file: None,
        }
    }
}

impl ArtifactExpectations {
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    fn validate(&self) -> Result<(), ProfileError> {
        if self.expected_proxy.is_empty() {
            return Err(ProfileError::Validation("expected_proxy cannot be empty".into()));
        }
        if self.expected_processes.is_empty() {
            return Err(ProfileError::Validation(
                "At least one expected process must be defined".into(),
            ));
        }
        for process in &self.expected_processes {
            if process.role.is_empty() || process.role.contains(':') {
                return Err(ProfileError::Validation(format!(
                    "Process role '{}' must be non-empty and contain no ':'",
                    process.role
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LiveEnvironment {
    /// Base address of the resource service.
    pub api_base: String,
    /// Base address of the proxying client host.
    pub ui_base: String,
    pub timeout_ms: u64,
    /// Text the client host's index page must contain.
    pub app_marker: String,
    pub expected_population: usize,
}

impl Default for LiveEnvironment {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:5555".to_string(),
            ui_base: "http://localhost:4000".to_string(),
            timeout_ms: 5000,
            app_marker: "React App".to_string(),
            expected_population: 50,
        }
    }
}

impl LiveEnvironment {
    fn validate(&self) -> Result<(), ProfileError> {
        for (name, base) in [("api_base", &self.api_base), ("ui_base", &self.ui_base)] {
            if !base.starts_with("http://") && !base.starts_with("https://") {
                return Err(ProfileError::Validation(format!(
                    "{name} must start with http:// or https://, got '{base}'"
                )));
            }
        }
        if self.timeout_ms == 0 {
            return Err(ProfileError::Validation("timeout_ms must be positive".into()));
        }
        if self.app_marker.is_empty() {
            return Err(ProfileError::Validation("app_marker cannot be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HarnessProfile {
    pub artifacts: ArtifactExpectations,
    pub live: LiveEnvironment,
}

impl HarnessProfile {
    /// Parse a profile from a YAML file. A relative `artifacts.root` resolves
    /// against the profile's own directory.
    ///
    /// # Errors
    /// Returns an error when the file cannot be read, parsed, or fails validation.
    pub fn from_path(path: &Path) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path)?;
        let mut profile = Self::parse(&content)?;
        if profile.artifacts.root.is_relative() {
            if let Some(parent) = path.parent() {
                profile.artifacts.root = parent.join(&profile.artifacts.root);
            }
        }
        Ok(profile)
    }

    /// # Errors
    /// Returns an error when the YAML is invalid or fails validation.
    pub fn parse(yaml: &str) -> Result<Self, ProfileError> {
        let profile: Self = serde_yaml::from_str(yaml)?;
        profile.validate()?;
        Ok(profile)
    }

    /// # Errors
    /// Returns [`ProfileError::Validation`] describing the first invalid field.
    pub fn validate(&self) -> Result<(), ProfileError> {
        self.artifacts.validate()?;
        self.live.validate()
    }
}
