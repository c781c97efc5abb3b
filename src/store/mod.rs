// file: src/store/mod.rs
// description: row store abstraction over the participant table
// reference: https://docs.rs/async-trait

pub mod csv_file;
pub mod memory;
pub mod range;
pub mod sheets;

pub use csv_file::CsvRowStore;
pub use memory::MemoryRowStore;
pub use range::{ColumnRange, cell_a1, column_letter};
pub use sheets::SheetsRowStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::Result;
use crate::models::Table;
use async_trait::async_trait;

/// Tabular backing store. Rows and columns are 1-based sheet coordinates with
/// the header on row 1.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Human readable name used in logs.
    fn describe(&self) -> String;

    async fn read_table(&self) -> Result<Table>;

    async fn read_headers(&self) -> Result<Vec<String>> {
        Ok(self.read_table().await?.headers().to_vec())
    }

    async fn write_cell(&self, row: usize, column: usize, value: &str) -> Result<()>;

    /// Writes `values` top to bottom into `range` in one round trip.
    async fn write_column(&self, range: &ColumnRange, values: &[String]) -> Result<()>;
}

pub fn open_store(config: &StoreConfig) -> Result<Box<dyn RowStore>> {
    match config.backend {
        StoreBackend::Csv => Ok(Box::new(CsvRowStore::new(config.csv_path.clone()))),
        StoreBackend::Sheets => Ok(Box::new(SheetsRowStore::from_config(config)?)),
    }
}

/// Grid mutation shared by the local stores: grows rows and columns as needed.
pub(crate) fn put_cell(grid: &mut Vec<Vec<String>>, row: usize, column: usize, value: &str) {
    let (r, c) = (row - 1, column - 1);
    if grid.len() <= r {
        grid.resize_with(r + 1, Vec::new);
    }
    let cells = &mut grid[r];
    if cells.len() <= c {
        cells.resize(c + 1, String::new());
    }
    cells[c] = value.to_string();
}

pub(crate) fn put_column(grid: &mut Vec<Vec<String>>, range: &ColumnRange, values: &[String]) {
    for (offset, value) in values.iter().enumerate() {
        put_cell(grid, range.start_row + offset, range.column, value);
    }
}
