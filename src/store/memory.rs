// file: src/store/memory.rs
// description: in-process row store used as the injectable fake for pipeline runs
// reference: clones share one grid so tests can inspect writes after a run

use crate::error::{PipelineError, Result};
use crate::models::Table;
use crate::store::{ColumnRange, RowStore, put_cell, put_column};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    grid: Vec<Vec<String>>,
    cell_writes: usize,
    column_writes: usize,
    unavailable: bool,
    cell_write_budget: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRowStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: Vec<Vec<String>>) -> Self {
        let store = Self::new();
        store.lock().grid = values;
        store
    }

    pub fn from_rows(headers: &[&str], rows: &[&[&str]]) -> Self {
        let mut values = vec![headers.iter().map(|h| h.to_string()).collect::<Vec<_>>()];
        values.extend(
            rows.iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect::<Vec<_>>()),
        );
        Self::from_values(values)
    }

    pub fn snapshot(&self) -> Table {
        Table::from_values(self.lock().grid.clone())
    }

    pub fn cell_writes(&self) -> usize {
        self.lock().cell_writes
    }

    pub fn column_writes(&self) -> usize {
        self.lock().column_writes
    }

    /// Every call fails with a row store error while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Allows `budget` more single-cell writes, then fails the rest.
    pub fn fail_cell_writes_after(&self, budget: usize) {
        self.lock().cell_write_budget = Some(budget);
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn unavailable() -> PipelineError {
    PipelineError::RowStore("memory store is unavailable".to_string())
}

#[async_trait]
impl RowStore for MemoryRowStore {
    fn describe(&self) -> String {
        "in-memory table".to_string()
    }

    async fn read_table(&self) -> Result<Table> {
        let state = self.lock();
        if state.unavailable {
            return Err(unavailable());
        }
        Ok(Table::from_values(state.grid.clone()))
    }

    async fn write_cell(&self, row: usize, column: usize, value: &str) -> Result<()> {
        let mut state = self.lock();
        if state.unavailable {
            return Err(unavailable());
        }
        if let Some(budget) = state.cell_write_budget.as_mut() {
            if *budget == 0 {
                return Err(PipelineError::RowStore(format!(
                    "write to row {} column {} rejected",
                    row, column
                )));
            }
            *budget -= 1;
        }
        put_cell(&mut state.grid, row, column, value);
        state.cell_writes += 1;
        Ok(())
    }

    async fn write_column(&self, range: &ColumnRange, values: &[String]) -> Result<()> {
        range.check_values(values)?;
        let mut state = self.lock();
        if state.unavailable {
            return Err(unavailable());
        }
        put_column(&mut state.grid, range, values);
        state.column_writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryRowStore::from_rows(&["name", "email"], &[&["Ann", "ann@x.com"]]);
        let handle = store.clone();

        store.write_cell(2, 3, "yes").await.unwrap();

        let table = handle.snapshot();
        assert_eq!(table.cell(0, 2), "yes");
        assert_eq!(handle.cell_writes(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = MemoryRowStore::from_rows(&["name"], &[]);
        store.set_unavailable(true);

        assert!(matches!(
            store.read_table().await,
            Err(PipelineError::RowStore(_))
        ));

        store.set_unavailable(false);
        assert_eq!(store.read_table().await.unwrap().headers(), &["name".to_string()][..]);
    }

    #[tokio::test]
    async fn test_cell_write_budget() {
        let store = MemoryRowStore::from_rows(&["name"], &[&["Ann"], &["Bo"]]);
        store.fail_cell_writes_after(1);

        assert!(store.write_cell(2, 2, "yes").await.is_ok());
        assert!(store.write_cell(3, 2, "yes").await.is_err());
        assert_eq!(store.snapshot().cell(1, 1), "");
    }
}
