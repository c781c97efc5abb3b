// file: src/config.rs
// description: application configuration management with toml and environment support
// reference: https://docs.rs/config

use crate::error::{PipelineError, Result};
use crate::utils::Validator;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
/// Largest accepted module size in pixels.
pub const MAX_BOX_SIZE: u32 = 100;
/// Largest accepted quiet zone in modules.
pub const MAX_BORDER: u32 = 20;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub store: StoreConfig,
    pub columns: ColumnConfig,
    pub artifacts: ArtifactConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sheets,
    Csv,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub spreadsheet_name: String,
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    pub sheet_name: String,
    pub credentials_file: PathBuf,
    #[serde(default)]
    pub access_token: Option<String>,
    pub csv_path: PathBuf,
}

/// Header names used to locate columns. Lookup is by exact name.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ColumnConfig {
    pub name: String,
    pub email: String,
    pub unique_id: String,
    pub delivered: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtifactConfig {
    pub output_dir: PathBuf,
    /// Characters of the identifier used in the file name; 0 keeps the full id.
    pub id_prefix_len: usize,
    pub box_size: u32,
    pub border: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MailConfig {
    #[serde(default)]
    pub sender_email: Option<String>,
    #[serde(default)]
    pub sender_password: Option<String>,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub subject: String,
    pub template_path: PathBuf,
    pub attachment_path: PathBuf,
    pub send_delay_ms: u64,
}

impl MailConfig {
    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::from_filename(".env.local").ok();
        dotenvy::dotenv().ok();

        let defaults = config::Config::try_from(&Self::default_config())
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let mut builder = config::Config::builder().add_source(defaults);

        builder = match path {
            Some(path) => builder.add_source(config::File::from(path)),
            None => builder
                .add_source(config::File::from(Path::new(DEFAULT_CONFIG_PATH)).required(false)),
        };

        builder = builder.add_source(
            config::Environment::with_prefix("QR_MAILER")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let mut config: Config = settings
            .try_deserialize()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            store: StoreConfig {
                backend: StoreBackend::Sheets,
                spreadsheet_name: "Your Spreadsheet Name".to_string(),
                spreadsheet_id: None,
                sheet_name: "Sheet1".to_string(),
                credentials_file: PathBuf::from("credentials.json"),
                access_token: None,
                csv_path: PathBuf::from("participants.csv"),
            },
            columns: ColumnConfig {
                name: "name".to_string(),
                email: "email".to_string(),
                unique_id: "unique_id".to_string(),
                delivered: "email_sent".to_string(),
            },
            artifacts: ArtifactConfig {
                output_dir: PathBuf::from("qr_codes"),
                id_prefix_len: 8,
                box_size: 10,
                border: 2,
            },
            mail: MailConfig {
                sender_email: None,
                sender_password: None,
                smtp_server: "smtp.gmail.com".to_string(),
                smtp_port: 587,
                subject: "Event Confirmation - QR Code Attached".to_string(),
                template_path: PathBuf::from("email_template.html"),
                attachment_path: PathBuf::from("event-schedule.pdf"),
                send_delay_ms: 1000,
            },
        }
    }

    /// Flat variable names understood by `.env.local` files written for the
    /// earlier scripts. They win over the prefixed layer.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SENDER_EMAIL") {
            self.mail.sender_email = Some(v);
        }
        if let Some(v) = get("SENDER_PASSWORD") {
            self.mail.sender_password = Some(v);
        }
        if let Some(v) = get("SPREADSHEET_NAME") {
            self.store.spreadsheet_name = v;
        }
        if let Some(v) = get("SHEET_NAME") {
            self.store.sheet_name = v;
        }
        if let Some(v) = get("QR_CODES_DIR") {
            self.artifacts.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get("PDF_ATTACHMENT_PATH") {
            self.mail.attachment_path = PathBuf::from(v);
        }
        if let Some(v) = get("EMAIL_TEMPLATE_PATH") {
            self.mail.template_path = PathBuf::from(v);
        }
        if let Some(v) = get("EMAIL_SUBJECT") {
            self.mail.subject = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.artifacts.box_size == 0 || self.artifacts.box_size > MAX_BOX_SIZE {
            return Err(PipelineError::Config(format!(
                "box_size must be between 1 and {}",
                MAX_BOX_SIZE
            )));
        }

        if self.artifacts.border > MAX_BORDER {
            return Err(PipelineError::Config(format!(
                "border must be at most {}",
                MAX_BORDER
            )));
        }

        Validator::validate_port(self.mail.smtp_port)
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        if self.store.sheet_name.trim().is_empty() {
            return Err(PipelineError::Config(
                "sheet_name must not be empty".to_string(),
            ));
        }

        let columns = [
            &self.columns.name,
            &self.columns.email,
            &self.columns.unique_id,
            &self.columns.delivered,
        ];
        if columns.iter().any(|c| c.trim().is_empty()) {
            return Err(PipelineError::Config(
                "column names must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Checks that sending can be attempted at all. Run before a send batch.
    pub fn validate_for_send(&self) -> Result<()> {
        let sender = self.mail.sender_email.as_deref().unwrap_or_default();
        let password = self.mail.sender_password.as_deref().unwrap_or_default();

        if sender.is_empty() || password.is_empty() {
            return Err(PipelineError::Config(
                "SENDER_EMAIL and SENDER_PASSWORD must be set".to_string(),
            ));
        }

        Validator::validate_email(sender).map_err(|e| PipelineError::Config(e.to_string()))
    }
}
