// file: src/store/range.rs
// description: single-column cell ranges and A1 notation
// reference: https://developers.google.com/sheets/api/guides/concepts#cell

use crate::error::{PipelineError, Result};

/// Inclusive, 1-based span of rows in one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRange {
    pub column: usize,
    pub start_row: usize,
    pub end_row: usize,
}

impl ColumnRange {
    pub fn new(column: usize, start_row: usize, end_row: usize) -> Result<Self> {
        if column == 0 || start_row == 0 || end_row < start_row {
            return Err(PipelineError::Validation(format!(
                "Invalid range: column {} rows {}..={}",
                column, start_row, end_row
            )));
        }
        Ok(Self {
            column,
            start_row,
            end_row,
        })
    }

    pub fn len(&self) -> usize {
        self.end_row - self.start_row + 1
    }

    pub fn check_values(&self, values: &[String]) -> Result<()> {
        if values.len() != self.len() {
            return Err(PipelineError::Validation(format!(
                "Range {} holds {} cells but {} values were given",
                self.to_a1(None),
                self.len(),
                values.len()
            )));
        }
        Ok(())
    }

    pub fn to_a1(&self, sheet: Option<&str>) -> String {
        let letter = column_letter(self.column);
        let span = format!(
            "{}{}:{}{}",
            letter, self.start_row, letter, self.end_row
        );
        match sheet {
            Some(sheet) => format!("{}!{}", quote_sheet(sheet), span),
            None => span,
        }
    }
}

/// A1 address of one cell, e.g. `'Sheet1'!C5`.
pub fn cell_a1(sheet: Option<&str>, row: usize, column: usize) -> String {
    let cell = format!("{}{}", column_letter(column), row);
    match sheet {
        Some(sheet) => format!("{}!{}", quote_sheet(sheet), cell),
        None => cell,
    }
}

/// Sheet names are always quoted; embedded quotes are doubled.
pub fn quote_sheet(sheet: &str) -> String {
    format!("'{}'", sheet.replace('\'', "''"))
}

/// 1 -> A, 26 -> Z, 27 -> AA, 703 -> AAA.
pub fn column_letter(column: usize) -> String {
    let mut n = column;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}
