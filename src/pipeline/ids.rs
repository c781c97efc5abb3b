// file: src/pipeline/ids.rs
// description: assigns a stable random identifier to every participant row
// reference: https://docs.rs/uuid

use crate::config::ColumnConfig;
use crate::error::{PipelineError, Result};
use crate::models::Table;
use crate::pipeline::artifacts::ArtifactNaming;
use crate::store::{ColumnRange, RowStore};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

const MAX_DRAWS: usize = 32;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssignReport {
    pub rows_total: usize,
    pub assigned: usize,
    pub kept: usize,
    pub header_created: bool,
    /// (sheet row, identifier) for every id written in this run.
    pub new_ids: Vec<(usize, String)>,
}

type IdSource = Box<dyn FnMut() -> String + Send>;

pub struct IdentifierAssigner {
    naming: ArtifactNaming,
    id_source: IdSource,
}

impl IdentifierAssigner {
    pub fn new(naming: ArtifactNaming) -> Self {
        Self {
            naming,
            id_source: Box::new(|| Uuid::new_v4().to_string()),
        }
    }

    /// Replaces the random source; used to exercise collision handling.
    pub fn with_id_source<F>(mut self, source: F) -> Self
    where
        F: FnMut() -> String + Send + 'static,
    {
        self.id_source = Box::new(source);
        self
    }

    /// Fills every empty identifier cell and never touches an existing one.
    /// Header and values go out in one range write, or not at all.
    pub async fn assign(
        &mut self,
        store: &dyn RowStore,
        columns: &ColumnConfig,
    ) -> Result<AssignReport> {
        let table = store.read_table().await?;
        let mut report = AssignReport::default();

        if table.is_empty() {
            warn!("{} is empty, no identifiers to assign", store.describe());
            return Ok(report);
        }

        let (column, header_created) = match table.column_index(&columns.unique_id) {
            Some(index) => {
                debug!("'{}' column exists at column {}", columns.unique_id, index + 1);
                (index, false)
            }
            None => (table.headers().len(), true),
        };

        report.rows_total = table.row_count();
        report.header_created = header_created;

        let mut taken_ids = HashSet::new();
        let mut taken_prefixes = HashSet::new();
        for index in 0..table.row_count() {
            let existing = table.cell(index, column).trim();
            if !existing.is_empty() {
                taken_ids.insert(existing.to_string());
                taken_prefixes.insert(self.naming.prefix(existing).to_string());
            }
        }

        let mut values = Vec::with_capacity(table.row_count());
        for index in 0..table.row_count() {
            let cell = table.cell(index, column);
            if !cell.trim().is_empty() {
                report.kept += 1;
                values.push(cell.to_string());
                continue;
            }

            let unique_id = self.draw(&mut taken_ids, &mut taken_prefixes)?;
            report.assigned += 1;
            report
                .new_ids
                .push((Table::sheet_row(index), unique_id.clone()));
            values.push(unique_id);
        }

        if !header_created && report.assigned == 0 {
            info!(
                "All {} rows already have identifiers, nothing to write",
                report.rows_total
            );
            return Ok(report);
        }

        let (start_row, payload) = if header_created {
            let mut payload = Vec::with_capacity(values.len() + 1);
            payload.push(columns.unique_id.clone());
            payload.extend(values);
            (1, payload)
        } else {
            (2, values)
        };

        let range = ColumnRange::new(column + 1, start_row, start_row + payload.len() - 1)?;
        store.write_column(&range, &payload).await?;

        if header_created {
            info!("Added '{}' header at column {}", columns.unique_id, column + 1);
        }
        for (row, unique_id) in &report.new_ids {
            debug!("Row {}: {}", row, unique_id);
        }
        info!(
            "Assigned {} new identifiers, kept {} existing",
            report.assigned, report.kept
        );

        Ok(report)
    }

    fn draw(
        &mut self,
        taken_ids: &mut HashSet<String>,
        taken_prefixes: &mut HashSet<String>,
    ) -> Result<String> {
        for _ in 0..MAX_DRAWS {
            let candidate = (self.id_source)();
            let prefix = self.naming.prefix(&candidate).to_string();
            if candidate.is_empty()
                || taken_ids.contains(&candidate)
                || taken_prefixes.contains(&prefix)
            {
                debug!("Discarding colliding identifier {}", candidate);
                continue;
            }
            taken_ids.insert(candidate.clone());
            taken_prefixes.insert(prefix);
            return Ok(candidate);
        }

        Err(PipelineError::Validation(format!(
            "No collision-free identifier after {} attempts",
            MAX_DRAWS
        )))
    }
}
