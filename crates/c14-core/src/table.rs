//! String-typed CSV tables for external datasets
//!
//! Every cell is kept as the text the file contains (trimmed, empty as
//! `None`); typing happens later, per destination field.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::warn;

/// A parsed CSV table
#[derive(Debug, Clone)]
pub struct Table {
    /// Name used in errors and logs (file or archive entry name)
    pub source_name: String,
    /// Column names in file order
    pub columns: Vec<String>,
    /// Row data, one cell per column
    pub rows: Vec<Row>,
    index: HashMap<String, usize>,
}

/// A row of data
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub cells: Vec<Option<String>>,
}

impl Table {
    fn new(source_name: String, columns: Vec<String>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            source_name,
            columns,
            rows: Vec::new(),
            index,
        }
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Index of a column by exact name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Fail unless every named column exists
    pub fn require_columns(&self, names: &[&str]) -> Result<()> {
        match names.iter().find(|n| !self.has_column(n)) {
            Some(missing) => Err(Error::SchemaMismatch {
                table: self.source_name.clone(),
                column: missing.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Cell text of `row` in column `name`
    pub fn get<'a>(&self, row: &'a Row, name: &str) -> Option<&'a str> {
        self.column_index(name)
            .and_then(|i| row.cells.get(i))
            .and_then(|c| c.as_deref())
    }
}

/// Parse a CSV file into a Table
pub fn parse_csv<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_csv_reader(BufReader::new(file), &path.display().to_string())
}

/// Parse CSV from a string (useful for testing)
pub fn parse_csv_str(content: &str, source_name: &str) -> Result<Table> {
    parse_csv_reader(content.as_bytes(), source_name)
}

/// Parse CSV from any reader
pub fn parse_csv_reader<R: Read>(reader: R, source_name: &str) -> Result<Table> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // Allow varying number of fields
        .from_reader(reader);

    let csv_err = |e| Error::Csv {
        source_name: source_name.to_string(),
        source: e,
    };

    let columns: Vec<String> = csv_reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut table = Table::new(source_name.to_string(), columns);
    let width = table.columns.len();

    for (row_idx, result) in csv_reader.records().enumerate() {
        let record = result.map_err(csv_err)?;

        let mut cells: Vec<Option<String>> = record
            .iter()
            .map(|c| {
                let c = c.trim();
                (!c.is_empty()).then(|| c.to_string())
            })
            .collect();

        if cells.len() > width {
            warn!(
                row = row_idx + 1,
                table = source_name,
                "row has more cells than columns, truncating"
            );
        }
        cells.resize(width, None);

        table.rows.push(Row { cells });
    }

    Ok(table)
}
