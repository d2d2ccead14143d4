//! Static configuration layer: literal facts asserted about files on disk.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{expect_that, CheckError};
use crate::profile::ArtifactExpectations;
use crate::report::{Layer, LayerReport};

const ABSENT: &str = "<absent>";

/// Run every configuration check against the artifacts under `expectations.root`.
#[must_use]
pub fn run_artifact_layer(expectations: &ArtifactExpectations) -> LayerReport {
    let mut report = LayerReport::new(Layer::Artifacts);
    report.check("package_json_proxy", || check_package_proxy(expectations));
    report.check("package_json_start_script", || check_start_script(expectations));
    report.check("procfile_processes", || check_procfile(expectations));
    report.check("proxy_port_matches_api_port", || check_port_wiring(expectations));
    report.check("ui_fetches_movies_on_mount", || check_ui_markers(expectations));
    if let Some(database_file) = &expectations.database_file {
        let path = expectations.resolve(database_file);
        report.check("database_file_populated", || check_database_file(&path));
    }
    report
}

fn read_artifact(path: &Path) -> Result<String, CheckError> {
    if !path.exists() {
        return Err(CheckError::MissingArtifact { path: path.to_path_buf() });
    }
    std::fs::read_to_string(path)
        .map_err(|err| CheckError::Malformed { path: path.to_path_buf(), reason: err.to_string() })
}

fn read_package_json(
    expectations: &ArtifactExpectations,
) -> Result<(PathBuf, Value), CheckError> {
    let path = expectations.resolve(&expectations.package_json);
    let content = read_artifact(&path)?;
    let value = serde_json::from_str(&content)
        .map_err(|err| CheckError::Malformed { path: path.clone(), reason: err.to_string() })?;
    Ok((path, value))
}

fn string_field<'a>(path: &Path, value: &'a Value, pointer: &str) -> Result<&'a str, CheckError> {
    value.pointer(pointer).and_then(Value::as_str).ok_or_else(|| CheckError::FieldMismatch {
        path: path.to_path_buf(),
        field: pointer.trim_start_matches('/').replace('/', "."),
        expected: "a string".to_string(),
        actual: ABSENT.to_string(),
    })
}

fn expect_field(
    path: &Path,
    value: &Value,
    pointer: &str,
    expected: &str,
) -> Result<(), CheckError> {
    let actual = string_field(path, value, pointer)?;
    if actual == expected {
        return Ok(());
    }
    Err(CheckError::FieldMismatch {
        path: path.to_path_buf(),
        field: pointer.trim_start_matches('/').replace('/', "."),
        expected: expected.to_string(),
        actual: format!("{actual:?}"),
    })
}

fn check_package_proxy(expectations: &ArtifactExpectations) -> Result<(), CheckError> {
    let (path, value) = read_package_json(expectations)?;
    expect_field(&path, &value, "/proxy", &expectations.expected_proxy)
}

fn check_start_script(expectations: &ArtifactExpectations) -> Result<(), CheckError> {
    let (path, value) = read_package_json(expectations)?;
    expect_field(&path, &value, "/scripts/start", &expectations.expected_start_script)
}

/// One `<role>: <command>` entry of a process manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessLine {
    pub role: String,
    pub command: String,
}

/// Parse a process manifest, skipping blank lines and `#` comments.
#[must_use]
pub fn parse_process_manifest(content: &str) -> Vec<ProcessLine> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (role, command) = line.split_once(':')?;
            Some(ProcessLine { role: role.trim().to_string(), command: command.trim().to_string() })
        })
        .collect()
}

fn check_procfile(expectations: &ArtifactExpectations) -> Result<(), CheckError> {
    let path = expectations.resolve(&expectations.procfile);
    let content = read_artifact(&path)?;

    let missing = expectations
        .expected_processes
        .iter()
        .map(crate::profile::ProcessExpectation::line)
        .filter(|line| !content.contains(line.as_str()))
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(CheckError::MissingMarkers { path, markers: missing });
    }

    let declared = parse_process_manifest(&content)
        .into_iter()
        .map(|process| process.role)
        .collect::<Vec<_>>();
    let expected = expectations
        .expected_processes
        .iter()
        .map(|process| process.role.clone())
        .collect::<Vec<_>>();
    let mut declared_sorted = declared.clone();
    declared_sorted.sort();
    let mut expected_sorted = expected;
    expected_sorted.sort();
    expect_that(
        declared_sorted == expected_sorted,
        &format!("{} process roles {expected_sorted:?}", path.display()),
        || format!("{declared:?}"),
    )
}

/// Host and port of an `http(s)://host:port/...` URL.
#[must_use]
pub fn url_authority(url: &str) -> Option<&str> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split('/').next()?;
    (!authority.is_empty()).then_some(authority)
}

#[must_use]
pub fn authority_port(authority: &str) -> Option<u16> {
    authority.rsplit_once(':').and_then(|(_, port)| port.parse().ok())
}

/// The `host:port` given to `--bind` (or `-b`, `--bind=`) in a process command.
#[must_use]
pub fn bind_authority(command: &str) -> Option<&str> {
    let mut tokens = command.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "--bind" || token == "-b" {
            return tokens.next();
        }
        if let Some(value) = token.strip_prefix("--bind=") {
            return Some(value);
        }
    }
    None
}

/// Value of a leading `PORT=<n>` assignment in a shell command.
#[must_use]
pub fn env_port(command: &str) -> Option<u16> {
    command
        .split_whitespace()
        .find_map(|token| token.strip_prefix("PORT="))
        .and_then(|port| port.parse().ok())
}

fn check_port_wiring(expectations: &ArtifactExpectations) -> Result<(), CheckError> {
    let (package_path, package) = read_package_json(expectations)?;
    let proxy = string_field(&package_path, &package, "/proxy")?;
    let start = string_field(&package_path, &package, "/scripts/start")?;

    let procfile_path = expectations.resolve(&expectations.procfile);
    let processes = parse_process_manifest(&read_artifact(&procfile_path)?);
    let command_for = |role: &str| {
        processes
            .iter()
            .find(|process| process.role == role)
            .map(|process| process.command.as_str())
            .ok_or_else(|| CheckError::MissingMarkers {
                path: procfile_path.clone(),
                markers: vec![format!("{role}: ")],
            })
    };
    let api_command = command_for("api")?;
    let web_command = command_for("web")?;

    let authority = url_authority(proxy)
        .ok_or_else(|| CheckError::assertion("proxy URL with host:port", proxy.to_string()))?;
    let api_port = authority_port(authority)
        .ok_or_else(|| CheckError::assertion("proxy URL with explicit port", proxy.to_string()))?;
    let bound = bind_authority(api_command);
    expect_that(
        bound == Some(authority),
        &format!("api process bound to proxy target {authority}"),
        || bound.map_or_else(|| format!("no --bind in {api_command:?}"), ToString::to_string),
    )?;

    let ui_port = env_port(start)
        .ok_or_else(|| CheckError::assertion("PORT=<n> in scripts.start", start.to_string()))?;
    expect_that(
        env_port(web_command) == Some(ui_port),
        &format!("web process on PORT={ui_port}"),
        || web_command.to_string(),
    )?;
    expect_that(ui_port != api_port, "client host and resource service on distinct ports", || {
        format!("both on {api_port}")
    })
}

fn check_ui_markers(expectations: &ArtifactExpectations) -> Result<(), CheckError> {
    let path = expectations.resolve(&expectations.ui_entry);
    let content = read_artifact(&path)?;
    let missing = expectations
        .ui_markers
        .iter()
        .filter(|marker| !content.contains(marker.as_str()))
        .cloned()
        .collect::<Vec<_>>();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CheckError::MissingMarkers { path, markers: missing })
    }
}

fn check_database_file(path: &Path) -> Result<(), CheckError> {
    let metadata = std::fs::metadata(path)
        .map_err(|_| CheckError::MissingArtifact { path: path.to_path_buf() })?;
    expect_that(metadata.len() > 0, &format!("{} to contain data", path.display()), || {
        "0 bytes".to_string()
    })
}
