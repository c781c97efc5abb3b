// file: src/status.rs
// description: project status snapshot and configuration readiness report
// reference: https://docs.rs/walkdir

use crate::config::{Config, StoreBackend};
use crate::error::Result;
use crate::utils::{HealthCheck, HealthReport, Validator};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

const RECENT_ARTIFACTS: usize = 5;
const ENV_FILE: &str = ".env.local";

#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub label: String,
    pub path: PathBuf,
    pub size_bytes: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentArtifact {
    pub file_name: String,
    pub modified: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectStatus {
    pub generated_at: String,
    pub artifact_dir: PathBuf,
    pub artifact_count: usize,
    pub files: Vec<FileInfo>,
    pub recent_artifacts: Vec<RecentArtifact>,
}

impl ProjectStatus {
    pub fn collect(config: &Config) -> Self {
        let mut artifacts = list_artifacts(&config.artifacts.output_dir);
        artifacts.sort_by(|a, b| b.1.cmp(&a.1));

        let recent_artifacts = artifacts
            .iter()
            .take(RECENT_ARTIFACTS)
            .map(|(path, modified)| RecentArtifact {
                file_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                modified: DateTime::<Local>::from(*modified)
                    .format("%Y-%m-%d %H:%M")
                    .to_string(),
            })
            .collect();

        let files = key_files(config)
            .into_iter()
            .map(|(label, path)| FileInfo {
                label: label.to_string(),
                size_bytes: std::fs::metadata(&path).ok().map(|m| m.len()),
                path,
            })
            .collect();

        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            artifact_dir: config.artifacts.output_dir.clone(),
            artifact_count: artifacts.len(),
            files,
            recent_artifacts,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn format(&self) -> String {
        let mut output = format!(
            "QR codes generated: {} (in {})\n\nFiles:\n",
            self.artifact_count,
            self.artifact_dir.display()
        );

        for file in &self.files {
            match file.size_bytes {
                Some(size) => output.push_str(&format!("  {}: {}\n", file.label, format_size(size))),
                None => output.push_str(&format!("  {}: not found\n", file.label)),
            }
        }

        if !self.recent_artifacts.is_empty() {
            output.push_str(&format!("\nRecent QR codes (last {}):\n", RECENT_ARTIFACTS));
            for artifact in &self.recent_artifacts {
                output.push_str(&format!("  {} - {}\n", artifact.file_name, artifact.modified));
            }
        }

        output
    }
}

pub fn format_size(bytes: u64) -> String {
    if bytes > 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} bytes", bytes)
    }
}

fn key_files(config: &Config) -> Vec<(&'static str, PathBuf)> {
    let mut files = Vec::new();
    match config.store.backend {
        StoreBackend::Sheets => {
            files.push(("Google credentials", config.store.credentials_file.clone()))
        }
        StoreBackend::Csv => files.push(("Participant table", config.store.csv_path.clone())),
    }
    files.push(("Environment config", PathBuf::from(ENV_FILE)));
    files.push(("Email template", config.mail.template_path.clone()));
    files.push(("Event attachment", config.mail.attachment_path.clone()));
    files
}

/// PNG files directly inside `dir` with their modification times.
pub fn list_artifacts(dir: &Path) -> Vec<(PathBuf, SystemTime)> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        })
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((entry.into_path(), modified))
        })
        .collect()
}

/// Readiness of every prerequisite. Unhealthy means a stage cannot run;
/// degraded means it runs with a fallback.
pub fn check_configuration(config: &Config) -> HealthReport {
    let mut checks = Vec::new();

    match config.store.backend {
        StoreBackend::Sheets => {
            let has_token = config
                .store
                .access_token
                .as_deref()
                .is_some_and(|t| !t.trim().is_empty());
            let credentials = &config.store.credentials_file;
            if has_token {
                checks.push(HealthCheck::healthy("credentials", "access token configured"));
            } else if !credentials.exists() {
                checks.push(HealthCheck::unhealthy(
                    "credentials",
                    format!("{} not found", credentials.display()),
                ));
            } else {
                match Validator::validate_service_account(credentials) {
                    Ok(()) => checks.push(HealthCheck::healthy(
                        "credentials",
                        format!("{} is a service account key", credentials.display()),
                    )),
                    Err(e) => checks.push(HealthCheck::unhealthy("credentials", e.to_string())),
                }
            }
            checks.push(HealthCheck::healthy(
                "spreadsheet",
                format!(
                    "'{}' / '{}'",
                    config.store.spreadsheet_name, config.store.sheet_name
                ),
            ));
        }
        StoreBackend::Csv => {
            let path = &config.store.csv_path;
            match Validator::validate_file_exists(path) {
                Ok(()) => checks.push(HealthCheck::healthy("table", path.display().to_string())),
                Err(e) => checks.push(HealthCheck::unhealthy("table", e.to_string())),
            }
        }
    }

    if Path::new(ENV_FILE).is_file() {
        checks.push(HealthCheck::healthy("environment", ENV_FILE));
    } else {
        checks.push(HealthCheck::degraded(
            "environment",
            format!("{} not found, using process environment", ENV_FILE),
        ));
    }

    match config.validate_for_send() {
        Ok(()) => checks.push(HealthCheck::healthy(
            "sender",
            config.mail.sender_email.clone().unwrap_or_default(),
        )),
        Err(e) => checks.push(HealthCheck::unhealthy("sender", e.to_string())),
    }

    if config.mail.template_path.is_file() {
        checks.push(HealthCheck::healthy(
            "template",
            config.mail.template_path.display().to_string(),
        ));
    } else {
        checks.push(HealthCheck::degraded(
            "template",
            format!(
                "{} not found, built-in template will be used",
                config.mail.template_path.display()
            ),
        ));
    }

    if config.mail.attachment_path.is_file() {
        checks.push(HealthCheck::healthy(
            "attachment",
            config.mail.attachment_path.display().to_string(),
        ));
    } else {
        checks.push(HealthCheck::degraded(
            "attachment",
            format!(
                "{} not found, emails go out without it",
                config.mail.attachment_path.display()
            ),
        ));
    }

    let dir = &config.artifacts.output_dir;
    if Validator::validate_directory(dir).is_ok() {
        let count = list_artifacts(dir).len();
        if count == 0 {
            checks.push(HealthCheck::degraded(
                "qr codes",
                format!("no QR code images in {}", dir.display()),
            ));
        } else {
            checks.push(HealthCheck::healthy(
                "qr codes",
                format!("{} QR code images in {}", count, dir.display()),
            ));
        }
    } else {
        checks.push(HealthCheck::degraded(
            "qr codes",
            format!("{} will be created when needed", dir.display()),
        ));
    }

    HealthReport::new(checks, env!("CARGO_PKG_VERSION").to_string())
}

const SEND_ONLY_CHECKS: [&str; 4] = ["sender", "template", "attachment", "qr codes"];

/// Checks a stage depends on before it starts. Table stages ignore mail
/// settings; sending stages need everything.
pub fn check_prerequisites(config: &Config, sending: bool) -> HealthReport {
    let report = check_configuration(config);
    if sending {
        return report;
    }

    let checks = report
        .checks
        .into_iter()
        .filter(|c| !SEND_ONLY_CHECKS.contains(&c.component.as_str()))
        .collect();
    HealthReport::new(checks, report.version)
}
