// file: src/setup.rs
// description: first-run preparation of the working directory

use crate::config::{Config, StoreBackend};
use crate::error::{PipelineError, Result};
use crate::utils::{HealthCheck, Validator};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct SetupReport {
    pub artifact_dir_created: bool,
    pub env_file_written: bool,
    pub credentials: HealthCheck,
}

/// Variables read by `Config::load`, with the current values as defaults.
pub fn env_template(config: &Config) -> String {
    format!(
        "# Sender account (use an app password, not the account password)\n\
         SENDER_EMAIL=your-email@gmail.com\n\
         SENDER_PASSWORD=your-app-password\n\
         \n\
         # Participant table\n\
         SPREADSHEET_NAME={}\n\
         SHEET_NAME={}\n\
         \n\
         # Files\n\
         QR_CODES_DIR={}\n\
         EMAIL_TEMPLATE_PATH={}\n\
         PDF_ATTACHMENT_PATH={}\n\
         EMAIL_SUBJECT={}\n",
        config.store.spreadsheet_name,
        config.store.sheet_name,
        config.artifacts.output_dir.display(),
        config.mail.template_path.display(),
        config.mail.attachment_path.display(),
        config.mail.subject,
    )
}

/// Creates the artifact directory and an env file template; neither is
/// overwritten when present.
pub fn run_setup(config: &Config, env_path: &Path) -> Result<SetupReport> {
    let dir = &config.artifacts.output_dir;
    let artifact_dir_created = if dir.is_dir() {
        info!("Already exists: {}", dir.display());
        false
    } else {
        fs::create_dir_all(dir).map_err(|source| PipelineError::FileOperation {
            path: dir.clone(),
            source,
        })?;
        info!("Created: {}", dir.display());
        true
    };

    let env_file_written = if env_path.exists() {
        warn!("Keeping existing {}", env_path.display());
        false
    } else {
        fs::write(env_path, env_template(config)).map_err(|source| {
            PipelineError::FileOperation {
                path: env_path.to_path_buf(),
                source,
            }
        })?;
        info!("Created {}, edit it with your settings", env_path.display());
        true
    };

    let credentials = check_credentials(config);

    Ok(SetupReport {
        artifact_dir_created,
        env_file_written,
        credentials,
    })
}

fn check_credentials(config: &Config) -> HealthCheck {
    if config.store.backend == StoreBackend::Csv {
        return HealthCheck::healthy("credentials", "not needed for the csv backend");
    }

    let path = &config.store.credentials_file;
    if !path.exists() {
        return HealthCheck::unhealthy(
            "credentials",
            format!(
                "{} not found; download a service account key and share the sheet with it",
                path.display()
            ),
        );
    }

    match Validator::validate_service_account(path) {
        Ok(()) => HealthCheck::healthy("credentials", "valid service account credentials found"),
        Err(e) => HealthCheck::unhealthy("credentials", e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::HealthStatus;
    use tempfile::TempDir;

    #[test]
    fn test_setup_creates_missing_files_only() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default_config();
        config.artifacts.output_dir = temp.path().join("qr_codes");
        config.store.credentials_file = temp.path().join("credentials.json");
        let env_path = temp.path().join(".env.local");

        let first = run_setup(&config, &env_path).unwrap();
        assert!(first.artifact_dir_created);
        assert!(first.env_file_written);
        assert_eq!(first.credentials.status, HealthStatus::Unhealthy);

        let written = fs::read_to_string(&env_path).unwrap();
        assert!(written.contains("SHEET_NAME=Sheet1"));
        assert!(written.contains("QR_CODES_DIR="));

        fs::write(&env_path, "SENDER_EMAIL=kept@example.com\n").unwrap();
        let second = run_setup(&config, &env_path).unwrap();
        assert!(!second.artifact_dir_created);
        assert!(!second.env_file_written);
        assert_eq!(
            fs::read_to_string(&env_path).unwrap(),
            "SENDER_EMAIL=kept@example.com\n"
        );
    }

    #[test]
    fn test_setup_rejects_non_service_account_key() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default_config();
        config.artifacts.output_dir = temp.path().join("qr_codes");
        config.store.credentials_file = temp.path().join("credentials.json");
        fs::write(&config.store.credentials_file, r#"{"type": "authorized_user"}"#).unwrap();

        let report = run_setup(&config, &temp.path().join(".env.local")).unwrap();
        assert_eq!(report.credentials.status, HealthStatus::Unhealthy);

        fs::write(&config.store.credentials_file, r#"{"type": "service_account"}"#).unwrap();
        let report = run_setup(&config, &temp.path().join(".env.local")).unwrap();
        assert_eq!(report.credentials.status, HealthStatus::Healthy);
    }
}
