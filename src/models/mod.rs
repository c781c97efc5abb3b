// file: src/models/mod.rs
// description: data models module exports
// reference: internal module structure

pub mod participant;
pub mod table;

pub use participant::{ColumnMap, DELIVERED_MARKER, Participant, RowState, is_delivered_marker};
pub use table::Table;
