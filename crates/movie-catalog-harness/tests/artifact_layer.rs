use std::fs;
use std::path::{Path, PathBuf};

use movie_catalog_harness::{
    run_artifact_layer, ArtifactExpectations, FailureKind, HarnessProfile, LayerReport,
};
use ulid::Ulid;

const PACKAGE_JSON: &str = r#"{
  "name": "client",
  "private": true,
  "proxy": "http://127.0.0.1:5555",
  "scripts": {
    "start": "PORT=4000 react-scripts start",
    "build": "react-scripts build"
  }
}
"#;

const PROCFILE: &str = "\
web: PORT=4000 npm start --prefix client
api: movie-catalog-service serve --bind 127.0.0.1:5555 --db ./movies.sqlite3
";

const APP_JS: &str = r#"import { useEffect } from "react";

function App() {
  useEffect(() => {
    fetch("/movies")
      .then((r) => r.json())
      .then((movies) => console.log(movies));
  }, []);

  return <h1>Check the console for a list of movies!</h1>;
}

export default App;
"#;

/// A throwaway project tree under the system temp dir.
struct Workspace {
    root: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let root = std::env::temp_dir().join(format!("movie-harness-{}", Ulid::new()));
        let workspace = Self { root };
        workspace.write("client/package.json", PACKAGE_JSON);
        workspace.write("Procfile.dev", PROCFILE);
        workspace.write("client/src/App.js", APP_JS);
        workspace
    }

    fn write(&self, relative: &str, content: &str) {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap_or_else(|err| panic!("mkdir {}: {err}", parent.display()));
        }
        fs::write(&path, content).unwrap_or_else(|err| panic!("write {}: {err}", path.display()));
    }

    fn remove(&self, relative: &str) {
        fs::remove_file(self.root.join(relative)).unwrap_or_else(|err| panic!("remove {relative}: {err}"));
    }

    fn expectations(&self) -> ArtifactExpectations {
        ArtifactExpectations { root: self.root.clone(), ..ArtifactExpectations::default() }
    }

    fn run(&self) -> LayerReport {
        run_artifact_layer(&self.expectations())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

fn failed_kind(report: &LayerReport, name: &str) -> Option<FailureKind> {
    report
        .outcome(name)
        .unwrap_or_else(|| panic!("check {name} missing from report"))
        .failure
        .as_ref()
        .map(|failure| failure.kind)
}

#[test]
fn conforming_tree_passes_every_check() {
    let workspace = Workspace::new();
    let report = workspace.run();
    let failures = report.failures().collect::<Vec<_>>();
    assert!(failures.is_empty(), "unexpected failures: {failures:#?}");
    assert_eq!(report.outcomes.len(), 5);
}

#[test]
fn missing_package_json_is_distinct_from_wrong_content() {
    let workspace = Workspace::new();
    workspace.remove("client/package.json");
    let report = workspace.run();

    assert_eq!(failed_kind(&report, "package_json_proxy"), Some(FailureKind::MissingArtifact));
    assert_eq!(failed_kind(&report, "package_json_start_script"), Some(FailureKind::MissingArtifact));
    assert_eq!(failed_kind(&report, "procfile_processes"), None);
    assert_eq!(failed_kind(&report, "ui_fetches_movies_on_mount"), None);
}

#[test]
fn changed_proxy_port_fails_proxy_and_wiring_checks() {
    let workspace = Workspace::new();
    workspace.write("client/package.json", &PACKAGE_JSON.replace("127.0.0.1:5555", "127.0.0.1:5000"));
    let report = workspace.run();

    assert_eq!(failed_kind(&report, "package_json_proxy"), Some(FailureKind::Assertion));
    assert_eq!(failed_kind(&report, "proxy_port_matches_api_port"), Some(FailureKind::Assertion));
    assert_eq!(failed_kind(&report, "package_json_start_script"), None);

    let message = report
        .outcome("package_json_proxy")
        .and_then(|outcome| outcome.failure.as_ref())
        .map(|failure| failure.message.clone())
        .unwrap_or_default();
    assert!(message.contains("http://127.0.0.1:5000"), "{message}");
}

#[test]
fn proxy_port_that_prefixes_the_bound_port_fails_wiring() {
    let workspace = Workspace::new();
    workspace.write("client/package.json", &PACKAGE_JSON.replace("127.0.0.1:5555", "127.0.0.1:555"));
    let report = workspace.run();

    assert_eq!(failed_kind(&report, "package_json_proxy"), Some(FailureKind::Assertion));
    assert_eq!(failed_kind(&report, "proxy_port_matches_api_port"), Some(FailureKind::Assertion));
}

#[test]
fn changed_start_port_fails_start_script_and_wiring_checks() {
    let workspace = Workspace::new();
    workspace.write("client/package.json", &PACKAGE_JSON.replace("PORT=4000", "PORT=4001"));
    let report = workspace.run();

    assert_eq!(failed_kind(&report, "package_json_start_script"), Some(FailureKind::Assertion));
    assert_eq!(failed_kind(&report, "proxy_port_matches_api_port"), Some(FailureKind::Assertion));
    assert_eq!(failed_kind(&report, "package_json_proxy"), None);
    assert_eq!(failed_kind(&report, "procfile_processes"), None);
}

#[test]
fn shared_port_between_processes_fails_wiring() {
    let workspace = Workspace::new();
    let expectations = ArtifactExpectations {
        root: workspace.root.clone(),
        expected_start_script: "PORT=5555 react-scripts start".to_string(),
        ..ArtifactExpectations::default()
    };
    workspace.write("client/package.json", &PACKAGE_JSON.replace("PORT=4000", "PORT=5555"));
    workspace.write("Procfile.dev", &PROCFILE.replace("PORT=4000", "PORT=5555"));

    let report = run_artifact_layer(&expectations);
    assert_eq!(failed_kind(&report, "package_json_start_script"), None);
    assert_eq!(failed_kind(&report, "proxy_port_matches_api_port"), Some(FailureKind::Assertion));
}

#[test]
fn extra_procfile_role_is_rejected() {
    let workspace = Workspace::new();
    workspace.write("Procfile.dev", &format!("{PROCFILE}worker: sleep infinity\n"));
    let report = workspace.run();

    assert_eq!(failed_kind(&report, "procfile_processes"), Some(FailureKind::Assertion));
    assert_eq!(failed_kind(&report, "proxy_port_matches_api_port"), None);
}

#[test]
fn missing_procfile_line_is_named() {
    let workspace = Workspace::new();
    workspace.write("Procfile.dev", "web: PORT=4000 npm start --prefix client\n");
    let report = workspace.run();

    let failure = report
        .outcome("procfile_processes")
        .and_then(|outcome| outcome.failure.clone())
        .unwrap_or_else(|| panic!("procfile check should fail"));
    assert_eq!(failure.kind, FailureKind::Assertion);
    assert!(failure.message.contains("api: movie-catalog-service serve"), "{}", failure.message);
}

#[test]
fn ui_without_console_logging_fails_marker_check() {
    let workspace = Workspace::new();
    workspace.write("client/src/App.js", &APP_JS.replace("console.log(movies)", "setMovies(movies)"));
    let report = workspace.run();

    let failure = report
        .outcome("ui_fetches_movies_on_mount")
        .and_then(|outcome| outcome.failure.clone())
        .unwrap_or_else(|| panic!("marker check should fail"));
    assert!(failure.message.contains("console.log(movies)"), "{}", failure.message);
    assert!(!failure.message.contains("useEffect"), "{}", failure.message);
}

#[test]
fn database_file_check_runs_only_when_configured() {
    let workspace = Workspace::new();
    let mut expectations = workspace.expectations();
    expectations.database_file = Some(Path::new("movies.sqlite3").to_path_buf());

    let report = run_artifact_layer(&expectations);
    assert_eq!(failed_kind(&report, "database_file_populated"), Some(FailureKind::MissingArtifact));

    workspace.write("movies.sqlite3", "");
    let report = run_artifact_layer(&expectations);
    assert_eq!(failed_kind(&report, "database_file_populated"), Some(FailureKind::Assertion));

    workspace.write("movies.sqlite3", "SQLite format 3\0");
    let report = run_artifact_layer(&expectations);
    assert_eq!(failed_kind(&report, "database_file_populated"), None);
}

#[test]
fn repository_artifacts_conform_to_default_profile() {
    let repo_root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
    let profile = HarnessProfile::from_path(&repo_root.join("harness.yaml"))
        .unwrap_or_else(|err| panic!("profile: {err}"));
    let report = run_artifact_layer(&profile.artifacts);
    let failures = report.failures().collect::<Vec<_>>();
    assert!(failures.is_empty(), "repository artifacts drifted: {failures:#?}");
}
