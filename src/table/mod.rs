//! Results table
//!
//! A CSV file accumulating one row per run. Only the leader can open one:
//! `ResultsTable::open` takes a `&Leader`, so follower code never holds a
//! table and cannot read or mutate it.
//!
//! # File Format
//!
//! ```text
//! ,learning_rate,accuracy,time
//! 0,0.01,0.95,1.23
//! 1,0.1,0.91,1.19
//! ```
//!
//! The first column is an unnamed row index. The remaining header must match
//! the declared columns exactly, in order, when an existing file is reused.
//!
//! Loaded cells are typed per column: a column is numeric or boolean only if
//! every non-empty cell in it is. Saving writes loaded rows back with their
//! original cell text, so earlier results are never rewritten.

pub mod fallback;

pub use fallback::{next_suffix_path, open_with_fallback};

use crate::coordinator::Leader;
use crate::error::{Error, Result};
use crate::value::Value;
use csv::{ReaderBuilder, WriterBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tabular results held by the leader
#[derive(Debug, Clone)]
pub struct ResultsTable {
    path: PathBuf,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    /// Cell text of each row as it is written to disk
    cells: Vec<Vec<String>>,
}

impl ResultsTable {
    /// Load `path`, or create it empty with `columns`
    ///
    /// An existing file must carry exactly `columns` (order-sensitive),
    /// otherwise this fails with `Error::SchemaMismatch` and leaves the file
    /// alone. A new file is written immediately, parent directories included.
    pub fn open(_leader: &Leader, path: impl Into<PathBuf>, columns: &[String]) -> Result<Self> {
        let path = path.into();

        if path.exists() {
            let (found, cells) = read_cells(&path)?;
            if found != columns {
                return Err(Error::SchemaMismatch {
                    path,
                    found,
                    expected: columns.to_vec(),
                });
            }
            debug!("Loaded {} rows from {}", cells.len(), path.display());
            return Ok(Self {
                path,
                rows: type_columns(found.len(), &cells),
                columns: found,
                cells,
            });
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let table = Self {
            path,
            columns: columns.to_vec(),
            rows: Vec::new(),
            cells: Vec::new(),
        };
        table.save()?;
        debug!("Created results table {}", table.path.display());
        Ok(table)
    }

    /// Append a row in memory
    ///
    /// The caller guarantees `row.len() == self.columns().len()`.
    pub fn add_row(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.columns.len(), "row arity must match the schema");
        self.cells.push(row.iter().map(Value::to_cell).collect());
        self.rows.push(row);
    }

    /// Write the whole table to its file, replacing the previous contents
    pub fn save(&self) -> Result<()> {
        write_table(&self.path, &self.columns, &self.cells)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read columns (index column dropped) and typed rows from a table file
pub fn read_table(path: &Path) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
    let (columns, cells) = read_cells(path)?;
    let rows = type_columns(columns.len(), &cells);
    Ok((columns, rows))
}

fn read_cells(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let columns = reader
        .headers()?
        .iter()
        .skip(1)
        .map(str::to_string)
        .collect();

    let mut cells = Vec::new();
    for record in reader.records() {
        let record = record?;
        cells.push(record.iter().skip(1).map(str::to_string).collect());
    }

    Ok((columns, cells))
}

/// Type of a column, widened over all of its non-empty cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Bool,
    Int,
    Float,
    Text,
}

impl ColumnKind {
    fn of(cell: &str) -> Self {
        match Value::parse_cell(cell) {
            Value::Bool(_) => ColumnKind::Bool,
            Value::Int(_) => ColumnKind::Int,
            Value::Float(_) => ColumnKind::Float,
            _ => ColumnKind::Text,
        }
    }

    fn widen(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (ColumnKind::Int, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Int) => ColumnKind::Float,
            _ => ColumnKind::Text,
        }
    }

    fn parse(self, cell: &str) -> Value {
        if cell.is_empty() {
            return Value::Null;
        }
        match self {
            ColumnKind::Text => Value::Text(cell.to_string()),
            ColumnKind::Float => cell
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or_else(|_| Value::Text(cell.to_string())),
            ColumnKind::Bool | ColumnKind::Int => Value::parse_cell(cell),
        }
    }
}

fn type_columns(width: usize, cells: &[Vec<String>]) -> Vec<Vec<Value>> {
    let kinds: Vec<Option<ColumnKind>> = (0..width)
        .map(|col| {
            cells
                .iter()
                .filter_map(|row| row.get(col))
                .filter(|cell| !cell.is_empty())
                .map(|cell| ColumnKind::of(cell))
                .reduce(ColumnKind::widen)
        })
        .collect();

    cells
        .iter()
        .map(|row| {
            row.iter()
                .zip(&kinds)
                .map(|(cell, kind)| match kind {
                    Some(kind) => kind.parse(cell),
                    None => Value::Null,
                })
                .collect()
        })
        .collect()
}

fn write_table(path: &Path, columns: &[String], rows: &[Vec<String>]) -> Result<()> {
    let mut writer = WriterBuilder::new().from_path(path)?;

    writer.write_record(std::iter::once("").chain(columns.iter().map(String::as_str)))?;
    for (index, row) in rows.iter().enumerate() {
        let cells = std::iter::once(index.to_string()).chain(row.iter().cloned());
        writer.write_record(cells)?;
    }

    writer.flush()?;
    Ok(())
}
