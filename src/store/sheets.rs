// file: src/store/sheets.rs
// description: Google Sheets v4 row store with Drive lookup by spreadsheet name
// reference: https://developers.google.com/sheets/api/reference/rest

use crate::config::StoreConfig;
use crate::error::{PipelineError, Result};
use crate::models::Table;
use crate::store::range::{cell_a1, quote_sheet};
use crate::store::{ColumnRange, RowStore};
use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_FILES_API: &str = "https://www.googleapis.com/drive/v3/files";
const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

enum SheetsAuth {
    AccessToken(String),
    ServiceAccount(Box<CustomServiceAccount>),
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: Vec<Vec<&'a str>>,
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

pub struct SheetsRowStore {
    client: Client,
    auth: SheetsAuth,
    spreadsheet_name: String,
    sheet_name: String,
    spreadsheet_id: OnceCell<String>,
}

impl SheetsRowStore {
    /// Uses the configured access token when present, otherwise the
    /// service account key file.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let auth = match config.access_token.as_deref().filter(|t| !t.trim().is_empty()) {
            Some(token) => SheetsAuth::AccessToken(token.trim().to_string()),
            None => {
                if !config.credentials_file.exists() {
                    return Err(PipelineError::Config(format!(
                        "{} not found and no access token configured",
                        config.credentials_file.display()
                    )));
                }
                let account = CustomServiceAccount::from_file(&config.credentials_file)
                    .map_err(|e| {
                        PipelineError::Config(format!(
                            "Invalid service account key {}: {}",
                            config.credentials_file.display(),
                            e
                        ))
                    })?;
                SheetsAuth::ServiceAccount(Box::new(account))
            }
        };

        let spreadsheet_id = match config.spreadsheet_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => OnceCell::new_with(Some(id.to_string())),
            None => OnceCell::new(),
        };

        Ok(Self {
            client: Client::new(),
            auth,
            spreadsheet_name: config.spreadsheet_name.clone(),
            sheet_name: config.sheet_name.clone(),
            spreadsheet_id,
        })
    }

    async fn bearer(&self) -> Result<String> {
        match &self.auth {
            SheetsAuth::AccessToken(token) => Ok(token.clone()),
            SheetsAuth::ServiceAccount(account) => {
                let token = account.token(SCOPES).await.map_err(|e| {
                    PipelineError::RowStore(format!("Failed to obtain access token: {}", e))
                })?;
                Ok(token.as_str().to_string())
            }
        }
    }

    async fn spreadsheet_id(&self) -> Result<&str> {
        self.spreadsheet_id
            .get_or_try_init(|| self.find_spreadsheet_by_name())
            .await
            .map(String::as_str)
    }

    async fn find_spreadsheet_by_name(&self) -> Result<String> {
        debug!("Looking up spreadsheet '{}' in Drive", self.spreadsheet_name);

        let query = format!(
            "name = '{}' and mimeType = 'application/vnd.google-apps.spreadsheet' and trashed = false",
            self.spreadsheet_name.replace('\\', "\\\\").replace('\'', "\\'")
        );

        let response = self
            .client
            .get(DRIVE_FILES_API)
            .bearer_auth(self.bearer().await?)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name)"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::RowStore(format!("Drive request failed: {}", e)))?;

        let list: DriveFileList = check_status(response, "Spreadsheet", &self.spreadsheet_name)
            .await?
            .json()
            .await
            .map_err(|e| PipelineError::Serialization(e.to_string()))?;

        let file = list
            .files
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::not_found("Spreadsheet", &self.spreadsheet_name))?;

        info!("Resolved spreadsheet '{}' to {}", self.spreadsheet_name, file.id);
        Ok(file.id)
    }

    async fn url(&self, segments: &[&str]) -> Result<Url> {
        let id = self.spreadsheet_id().await?;
        let mut url = Url::parse(SHEETS_API)
            .map_err(|e| PipelineError::Config(format!("Invalid API url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| PipelineError::Config("API url cannot take path segments".to_string()))?
            .push(id)
            .extend(segments);
        Ok(url)
    }

    async fn put_values(
        &self,
        range: &str,
        major_dimension: &'static str,
        values: Vec<Vec<&str>>,
    ) -> Result<()> {
        let url = self.url(&["values", range]).await?;
        let body = ValueRangeBody {
            range,
            major_dimension,
            values,
        };

        let response = self
            .client
            .put(url)
            .bearer_auth(self.bearer().await?)
            .query(&[("valueInputOption", "RAW")])
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::RowStore(format!("Sheets update failed: {}", e)))?;

        check_status(response, "Sheet", &self.sheet_name).await?;
        Ok(())
    }
}

/// Maps HTTP failures onto the error taxonomy: 404 and unparsable ranges are
/// not-found conditions, everything else is a store failure.
async fn check_status(response: Response, kind: &'static str, name: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    if status == StatusCode::NOT_FOUND
        || (status == StatusCode::BAD_REQUEST && body.contains("Unable to parse range"))
    {
        return Err(PipelineError::not_found(kind, name));
    }

    Err(PipelineError::RowStore(format!(
        "Google API request failed with status {}: {}",
        status, body
    )))
}

#[async_trait]
impl RowStore for SheetsRowStore {
    fn describe(&self) -> String {
        format!("Google Sheet '{}' / '{}'", self.spreadsheet_name, self.sheet_name)
    }

    async fn read_table(&self) -> Result<Table> {
        let range = quote_sheet(&self.sheet_name);
        let url = self.url(&["values", &range]).await?;

        let response = self
            .client
            .get(url)
            .bearer_auth(self.bearer().await?)
            .query(&[("majorDimension", "ROWS")])
            .send()
            .await
            .map_err(|e| PipelineError::RowStore(format!("Sheets read failed: {}", e)))?;

        let values: ValueRange = check_status(response, "Sheet", &self.sheet_name)
            .await?
            .json()
            .await
            .map_err(|e| PipelineError::Serialization(e.to_string()))?;

        debug!("Read {} lines from {}", values.values.len(), self.describe());
        Ok(Table::from_values(values.values))
    }

    async fn read_headers(&self) -> Result<Vec<String>> {
        let range = format!("{}!1:1", quote_sheet(&self.sheet_name));
        let url = self.url(&["values", &range]).await?;

        let response = self
            .client
            .get(url)
            .bearer_auth(self.bearer().await?)
            .send()
            .await
            .map_err(|e| PipelineError::RowStore(format!("Sheets read failed: {}", e)))?;

        let values: ValueRange = check_status(response, "Sheet", &self.sheet_name)
            .await?
            .json()
            .await
            .map_err(|e| PipelineError::Serialization(e.to_string()))?;

        Ok(values.values.into_iter().next().unwrap_or_default())
    }

    async fn write_cell(&self, row: usize, column: usize, value: &str) -> Result<()> {
        let range = cell_a1(Some(&self.sheet_name), row, column);
        self.put_values(&range, "ROWS", vec![vec![value]]).await
    }

    async fn write_column(&self, range: &ColumnRange, values: &[String]) -> Result<()> {
        range.check_values(values)?;
        let a1 = range.to_a1(Some(&self.sheet_name));
        let column = values.iter().map(String::as_str).collect();
        self.put_values(&a1, "COLUMNS", vec![column]).await
    }
}
