//! Core domain types shared by the pipeline stages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// One source row: column name to raw cell text.
///
/// Cells the remote source omitted (ragged trailing cells) are absent.
pub type Row = BTreeMap<String, String>;

/// A table read from one sheet. The first remote row supplies `columns`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// Column names in source order.
    pub columns: Vec<String>,
    /// Data rows in source order.
    pub rows: Vec<Row>,
}

impl Table {
    /// Build a table from row-major values where the first row is the header.
    ///
    /// An empty input yields a table with no columns and no rows.
    pub fn from_values(values: Vec<Vec<String>>) -> Self {
        let mut iter = values.into_iter();
        let Some(columns) = iter.next() else {
            return Self::default();
        };

        let rows = iter
            .map(|cells| {
                columns
                    .iter()
                    .cloned()
                    .zip(cells)
                    .collect::<Row>()
            })
            .collect();

        Self { columns, rows }
    }

    /// Number of data rows (header excluded).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// TableKind / SourceData
// ---------------------------------------------------------------------------

/// The three fixed source tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableKind {
    /// Monthly aggregate KPIs, one row per month.
    Monthly,
    /// Hire-based leadtime detail rows.
    Hire,
    /// Application-based leadtime detail rows.
    Apply,
}

impl TableKind {
    /// All kinds in read order.
    pub const ALL: [TableKind; 3] = [TableKind::Monthly, TableKind::Hire, TableKind::Apply];

    /// Stable key used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Hire => "hire_raw",
            Self::Apply => "apply_raw",
        }
    }
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The keyed collection of tables produced by the source reader.
#[derive(Debug, Clone, Default)]
pub struct SourceData {
    tables: BTreeMap<TableKind, Table>,
}

impl SourceData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a table under its kind, replacing any previous one.
    pub fn insert(&mut self, kind: TableKind, table: Table) {
        self.tables.insert(kind, table);
    }

    /// Borrow a table. Unread kinds are `None`.
    pub fn get(&self, kind: TableKind) -> Option<&Table> {
        self.tables.get(&kind)
    }

    /// Take ownership of a table, leaving an empty one in its place.
    pub fn take(&mut self, kind: TableKind) -> Table {
        self.tables.remove(&kind).unwrap_or_default()
    }
}
