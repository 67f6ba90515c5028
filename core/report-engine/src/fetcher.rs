//! FILENAME: core/report-engine/src/fetcher.rs
//! PURPOSE: The data fetcher contract and the file/in-memory fetchers.
//! CONTEXT: A fetcher turns a view name and the run parameters into rows.
//! Fetchers may pre-filter on parameters whose key is a column name; the
//! label-based filtering happens later in `DataView`.

use crate::error::FetchError;
use log::debug;
use sheet::CellValue;
use std::collections::HashMap;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One fetched row: column name -> value. Absent keys are absent values.
pub type DataRow = HashMap<String, CellValue>;

pub trait DataFetcher {
    /// Returns every row of `view`. Fails with `FetchError::ViewNotFound`
    /// when the view is unknown.
    fn fetch(&self, view: &str, params: &HashMap<String, String>)
        -> Result<Vec<DataRow>, FetchError>;
}

/// True if the row agrees with every parameter naming one of its columns.
pub fn matches_params(row: &DataRow, params: &HashMap<String, String>) -> bool {
    params.iter().all(|(key, expected)| match row.get(key) {
        Some(value) => value.display_string() == *expected,
        None => true,
    })
}

// ============================================================================
// MEMORY FETCHER
// ============================================================================

/// Rows held in memory, keyed by view name.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    views: HashMap<String, Vec<DataRow>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_view(mut self, view: &str, rows: Vec<DataRow>) -> Self {
        self.insert(view, rows);
        self
    }

    pub fn insert(&mut self, view: &str, rows: Vec<DataRow>) {
        self.views.insert(view.to_string(), rows);
    }
}

impl DataFetcher for MemoryFetcher {
    fn fetch(
        &self,
        view: &str,
        params: &HashMap<String, String>,
    ) -> Result<Vec<DataRow>, FetchError> {
        let rows = self
            .views
            .get(view)
            .ok_or_else(|| FetchError::ViewNotFound(view.to_string()))?;
        Ok(rows
            .iter()
            .filter(|row| matches_params(row, params))
            .cloned()
            .collect())
    }
}

// ============================================================================
// CSV FETCHER
// ============================================================================

/// Reads `<root>/<view>.csv`. The header row names the columns and every
/// value is read as text.
#[derive(Debug, Clone)]
pub struct CsvFetcher {
    root: PathBuf,
}

impl CsvFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CsvFetcher { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, view: &str) -> PathBuf {
        self.root.join(format!("{}.csv", view))
    }
}

impl DataFetcher for CsvFetcher {
    fn fetch(
        &self,
        view: &str,
        params: &HashMap<String, String>,
    ) -> Result<Vec<DataRow>, FetchError> {
        let path = self.path_for(view);
        let file = File::open(&path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => FetchError::ViewNotFound(view.to_string()),
            _ => FetchError::Io {
                path: path.clone(),
                source,
            },
        })?;

        let csv_error = |source: csv::Error| FetchError::Csv {
            path: path.clone(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);
        let headers = reader.headers().map_err(csv_error)?.clone();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            let row: DataRow = headers
                .iter()
                .zip(record.iter())
                .map(|(column, value)| (column.to_string(), CellValue::Text(value.to_string())))
                .collect();
            if matches_params(&row, params) {
                rows.push(row);
            }
        }

        debug!("Read {} row(s) from {}", rows.len(), path.display());
        Ok(rows)
    }
}
