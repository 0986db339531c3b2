//! Admin-only tabular export.
//!
//! # Responsibility
//! - Define the uniform row shape produced by export queries.
//! - Gate export by the store's `is_admin` rule and serialize to CSV.
//!
//! # See also
//! - `export::csv` for escaping rules.

pub mod csv;
mod service;

pub use service::{ExportError, ExportFile, ExportKind, ExportService};

/// One export row: ordered `(column, value)` cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportRow {
    cells: Vec<(String, Option<String>)>,
}

impl ExportRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one cell. Column order is insertion order.
    pub fn push(&mut self, column: impl Into<String>, value: Option<String>) {
        self.cells.push((column.into(), value));
    }

    /// Builder-style `push`.
    pub fn with(mut self, column: impl Into<String>, value: Option<String>) -> Self {
        self.push(column, value);
        self
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(column, _)| column.as_str())
    }

    /// Value of `column`; `None` for both null and missing cells.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
