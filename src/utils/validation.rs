// file: src/utils/validation.rs
// description: data validation utilities and helpers
// reference: input validation patterns

use crate::error::{PipelineError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::path::Path;

lazy_static! {
    static ref EMAIL_ADDRESS: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("EMAIL_ADDRESS regex is valid");
}

pub struct Validator;

impl Validator {
    pub fn validate_email(address: &str) -> Result<()> {
        if !EMAIL_ADDRESS.is_match(address.trim()) {
            return Err(PipelineError::Validation(format!(
                "Invalid email address: {}",
                address
            )));
        }
        Ok(())
    }

    pub fn validate_file_exists(path: &Path) -> Result<()> {
        let metadata = fs::metadata(path).map_err(|e| {
            PipelineError::Validation(format!("Cannot access {}: {}", path.display(), e))
        })?;

        if !metadata.is_file() {
            return Err(PipelineError::Validation(format!(
                "Path is not a file: {}",
                path.display()
            )));
        }

        Ok(())
    }

    pub fn validate_directory(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(PipelineError::Validation(format!(
                "Directory does not exist: {}",
                path.display()
            )));
        }

        if !path.is_dir() {
            return Err(PipelineError::Validation(format!(
                "Path is not a directory: {}",
                path.display()
            )));
        }

        Ok(())
    }

    pub fn validate_port(port: u16) -> Result<()> {
        if port == 0 {
            return Err(PipelineError::Validation("Port cannot be 0".to_string()));
        }
        Ok(())
    }

    /// Reads a Google service account key and checks its `type` field.
    pub fn validate_service_account(path: &Path) -> Result<()> {
        let raw = fs::read_to_string(path).map_err(|source| PipelineError::FileOperation {
            path: path.to_path_buf(),
            source,
        })?;

        let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            PipelineError::Validation(format!("Invalid JSON in {}: {}", path.display(), e))
        })?;

        match value.get("type").and_then(|t| t.as_str()) {
            Some("service_account") => Ok(()),
            _ => Err(PipelineError::Validation(format!(
                "{} is not a service account key",
                path.display()
            ))),
        }
    }

    pub fn truncate_text(text: &str, max_chars: usize) -> String {
        if text.chars().count() <= max_chars {
            text.to_string()
        } else {
            let truncated: String = text.chars().take(max_chars).collect();
            format!("{}...", truncated)
        }
    }
}
