// file: src/models/participant.rs
// description: typed view of one participant row and its delivery lifecycle
// reference: column positions are resolved by header name, never by fixed index

use crate::config::ColumnConfig;
use crate::error::{PipelineError, Result};
use crate::models::table::Table;
use serde::{Deserialize, Serialize};

/// Cell value written once a notification has been accepted by the transport.
pub const DELIVERED_MARKER: &str = "yes";

pub fn is_delivered_marker(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case(DELIVERED_MARKER)
}

/// Progress of a row through the pipeline, derived from table data and the
/// artifact directory. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RowState {
    NoId,
    IdAssigned,
    ArtifactReady,
    Delivered,
}

/// Zero-based positions of the columns the dispatcher needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub name: usize,
    pub email: usize,
    pub unique_id: usize,
    pub delivered: Option<usize>,
}

impl ColumnMap {
    pub fn resolve(table: &Table, columns: &ColumnConfig) -> Result<Self> {
        let require = |header: &str| {
            table
                .column_index(header)
                .ok_or_else(|| PipelineError::MissingColumn(header.to_string()))
        };

        Ok(Self {
            unique_id: require(&columns.unique_id)?,
            email: require(&columns.email)?,
            name: require(&columns.name)?,
            delivered: table.column_index(&columns.delivered),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// 1-based sheet row, header is row 1.
    pub sheet_row: usize,
    pub name: String,
    pub email: String,
    pub unique_id: String,
    pub delivered: bool,
}

impl Participant {
    pub fn from_row(table: &Table, index: usize, columns: &ColumnMap) -> Self {
        Self {
            sheet_row: Table::sheet_row(index),
            name: table.cell(index, columns.name).trim().to_string(),
            email: table.cell(index, columns.email).trim().to_string(),
            unique_id: table.cell(index, columns.unique_id).trim().to_string(),
            delivered: columns
                .delivered
                .map(|c| is_delivered_marker(table.cell(index, c)))
                .unwrap_or(false),
        }
    }

    /// Names of required fields that are empty, in check order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.unique_id.is_empty() {
            missing.push("unique_id");
        }
        if self.email.is_empty() {
            missing.push("email");
        }
        if self.name.is_empty() {
            missing.push("name");
        }
        missing
    }

    pub fn state(&self, artifact_ready: bool) -> RowState {
        if self.delivered {
            RowState::Delivered
        } else if self.unique_id.is_empty() {
            RowState::NoId
        } else if artifact_ready {
            RowState::ArtifactReady
        } else {
            RowState::IdAssigned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn table() -> Table {
        let s = |v: &[&str]| v.iter().map(|x| x.to_string()).collect::<Vec<_>>();
        Table::new(
            s(&["name", "email", "unique_id", "email_sent"]),
            vec![
                s(&["Ann", " ann@x.com ", "abc123", "YES "]),
                s(&["Bo", "", "def456", ""]),
                s(&["Cy"]),
            ],
        )
    }

    #[test]
    fn test_delivered_marker() {
        assert!(is_delivered_marker("yes"));
        assert!(is_delivered_marker(" Yes "));
        assert!(!is_delivered_marker("no"));
        assert!(!is_delivered_marker(""));
    }

    #[test]
    fn test_resolve_requires_columns() {
        let config = Config::default_config();
        let map = ColumnMap::resolve(&table(), &config.columns).unwrap();
        assert_eq!(map.unique_id, 2);
        assert_eq!(map.delivered, Some(3));

        let bare = Table::new(vec!["name".to_string(), "email".to_string()], vec![]);
        match ColumnMap::resolve(&bare, &config.columns) {
            Err(PipelineError::MissingColumn(column)) => assert_eq!(column, "unique_id"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_participant_view() {
        let config = Config::default_config();
        let table = table();
        let map = ColumnMap::resolve(&table, &config.columns).unwrap();

        let ann = Participant::from_row(&table, 0, &map);
        assert_eq!(ann.sheet_row, 2);
        assert_eq!(ann.email, "ann@x.com");
        assert!(ann.delivered);
        assert_eq!(ann.state(false), RowState::Delivered);

        let bo = Participant::from_row(&table, 1, &map);
        assert_eq!(bo.missing_fields(), vec!["email"]);
        assert_eq!(bo.state(true), RowState::ArtifactReady);

        let cy = Participant::from_row(&table, 2, &map);
        assert_eq!(cy.missing_fields(), vec!["unique_id", "email"]);
        assert_eq!(cy.state(false), RowState::NoId);
    }
}
