// file: src/store/csv_file.rs
// description: row store backed by a local CSV file
// reference: https://docs.rs/csv

use crate::error::{PipelineError, Result};
use crate::models::Table;
use crate::store::{ColumnRange, RowStore, put_cell, put_column};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// First line is the header. Each write rewrites the whole file through a
/// temp file in the same directory, so readers never see a torn file.
pub struct CsvRowStore {
    path: PathBuf,
}

impl CsvRowStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_grid(&self) -> Result<Vec<Vec<String>>> {
        if !self.path.exists() {
            return Err(PipelineError::not_found(
                "CSV file",
                self.path.display().to_string(),
            ));
        }

        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)?;

        let mut grid = Vec::new();
        for record in reader.records() {
            let record = record?;
            grid.push(record.iter().map(str::to_string).collect());
        }
        Ok(grid)
    }

    fn write_grid(&self, grid: &[Vec<String>]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let temp = NamedTempFile::new_in(&dir).map_err(|source| PipelineError::FileOperation {
            path: dir.clone(),
            source,
        })?;

        {
            let mut writer = ::csv::WriterBuilder::new()
                .flexible(true)
                .from_writer(temp.as_file());
            for row in grid {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }

        temp.persist(&self.path)
            .map_err(|e| PipelineError::FileOperation {
                path: self.path.clone(),
                source: e.error,
            })?;

        debug!("Rewrote {} ({} lines)", self.path.display(), grid.len());
        Ok(())
    }

    fn modify<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<Vec<String>>),
    {
        let mut grid = self.read_grid()?;
        change(&mut grid);
        self.write_grid(&grid)
    }
}

#[async_trait]
impl RowStore for CsvRowStore {
    fn describe(&self) -> String {
        format!("CSV file {}", self.path.display())
    }

    async fn read_table(&self) -> Result<Table> {
        Ok(Table::from_values(self.read_grid()?))
    }

    async fn write_cell(&self, row: usize, column: usize, value: &str) -> Result<()> {
        self.modify(|grid| put_cell(grid, row, column, value))
    }

    async fn write_column(&self, range: &ColumnRange, values: &[String]) -> Result<()> {
        range.check_values(values)?;
        self.modify(|grid| put_column(grid, range, values))
    }
}
