//! FILENAME: core/report-engine/src/dataview.rs
//! PURPOSE: In-memory table of fetched rows plus the label-to-column mapping.
//! CONTEXT: Views are fetched once per run and handed out as clones, so a
//! filter applied by one block never reaches another. Comparisons always use
//! the string form of the stored value.

use crate::definition::DataViewDefinition;
use crate::error::ReportError;
use crate::fetcher::DataRow;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Rows of one view. Cloning deep-copies the rows while the definition and
/// the label mapping stay shared.
#[derive(Debug, Clone)]
pub struct DataView {
    definition: Arc<DataViewDefinition>,
    label_mapping: Arc<HashMap<String, String>>,
    rows: Vec<DataRow>,
}

impl DataView {
    pub fn new(definition: Arc<DataViewDefinition>, rows: Vec<DataRow>) -> Self {
        let label_mapping = definition
            .labels
            .iter()
            .map(|l| (l.name.clone(), l.column.clone()))
            .collect();
        DataView {
            definition,
            label_mapping: Arc::new(label_mapping),
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &DataViewDefinition {
        &self.definition
    }

    pub fn rows(&self) -> &[DataRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<DataRow> {
        self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Storage column behind a label.
    pub fn column_for(&self, label: &str) -> Option<&str> {
        self.label_mapping.get(label).map(String::as_str)
    }

    /// Keeps the rows matching every parameter whose key is a known label.
    ///
    /// Unknown keys are ignored. A row that lacks the column entirely is
    /// kept: only a present, different value rejects it.
    pub fn filter(&mut self, params: &HashMap<String, String>) {
        let conditions: Vec<(&str, &str)> = params
            .iter()
            .filter_map(|(key, value)| {
                self.label_mapping
                    .get(key)
                    .map(|column| (column.as_str(), value.as_str()))
            })
            .collect();
        if conditions.is_empty() {
            return;
        }

        self.rows.retain(|row| {
            conditions.iter().all(|(column, expected)| match row.get(*column) {
                Some(value) => value.display_string() == *expected,
                None => true,
            })
        });
    }

    /// Sorted, deduplicated, non-empty values of a label's column.
    pub fn distinct_label_values(&self, label: &str) -> Result<Vec<String>, ReportError> {
        let column = self
            .column_for(label)
            .ok_or_else(|| ReportError::UnknownLabel {
                view: self.name().to_string(),
                label: label.to_string(),
            })?;

        let values: BTreeSet<String> = self
            .rows
            .iter()
            .filter_map(|row| row.get(column))
            .map(|value| value.display_string())
            .filter(|s| !s.is_empty())
            .collect();
        Ok(values.into_iter().collect())
    }

    /// Keeps the first row for each value of `column`, in original order.
    /// Rows without the column are dropped.
    pub fn dedupe_by_column(&mut self, column: &str) {
        let mut seen = std::collections::HashSet::new();
        self.rows.retain(|row| match row.get(column) {
            Some(value) => seen.insert(value.display_string()),
            None => false,
        });
    }

    pub fn truncate(&mut self, limit: usize) {
        self.rows.truncate(limit);
    }
}
