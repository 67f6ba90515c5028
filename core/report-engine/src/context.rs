//! FILENAME: core/report-engine/src/context.rs
//! PURPOSE: Per-run state of one workbook generation.
//! CONTEXT: Owns the merged parameters and the cache of fetched views.
//! Parameters are merged and date expressions resolved once, at
//! construction. Each view is fetched at most once per context; callers
//! always receive a clone they are free to filter.

use crate::dataview::DataView;
use crate::definition::{BlockDefinition, BlockKind, WorkbookDefinition};
use crate::dynamic_date::{is_dynamic_date, resolve_dynamic_date};
use crate::error::ReportError;
use crate::fetcher::{DataFetcher, DataRow};
use crate::registry::ConfigProvider;
use chrono::{Local, NaiveDateTime};
use log::{debug, warn};
use std::collections::HashMap;

/// Parameter set by the workbook's archive rule.
pub const ARCHIVE_DATE_PARAM: &str = "archive_date";

pub struct GenerationContext<'a> {
    workbook: &'a WorkbookDefinition,
    provider: &'a dyn ConfigProvider,
    fetcher: &'a dyn DataFetcher,
    parameters: HashMap<String, String>,
    loaded_views: HashMap<String, DataView>,
}

impl<'a> GenerationContext<'a> {
    pub fn new(
        workbook: &'a WorkbookDefinition,
        provider: &'a dyn ConfigProvider,
        fetcher: &'a dyn DataFetcher,
        overrides: HashMap<String, String>,
    ) -> Self {
        Self::with_base_time(workbook, provider, fetcher, overrides, Local::now().naive_local())
    }

    /// Like `new`, evaluating date expressions against `base` instead of now.
    pub fn with_base_time(
        workbook: &'a WorkbookDefinition,
        provider: &'a dyn ConfigProvider,
        fetcher: &'a dyn DataFetcher,
        overrides: HashMap<String, String>,
        base: NaiveDateTime,
    ) -> Self {
        let mut parameters = workbook.parameters.clone();
        parameters.extend(overrides);

        if let Some(rule) = workbook.archive_rule.as_deref().filter(|r| !r.is_empty()) {
            match resolve_dynamic_date(rule, base) {
                Ok(date) => {
                    parameters.insert(ARCHIVE_DATE_PARAM.to_string(), date);
                }
                Err(e) => warn!("Ignoring archive rule of workbook '{}': {}", workbook.name, e),
            }
        }

        for (key, value) in parameters.iter_mut() {
            if !is_dynamic_date(value) {
                continue;
            }
            match resolve_dynamic_date(value, base) {
                Ok(date) => *value = date,
                Err(e) => warn!("Keeping parameter '{}' unresolved: {}", key, e),
            }
        }

        GenerationContext {
            workbook,
            provider,
            fetcher,
            parameters,
            loaded_views: HashMap::new(),
        }
    }

    pub fn workbook(&self) -> &'a WorkbookDefinition {
        self.workbook
    }

    pub fn provider(&self) -> &'a dyn ConfigProvider {
        self.provider
    }

    /// The merged run parameters.
    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }

    /// A private copy of the named view, fetched with the run parameters on
    /// first use.
    pub fn resolve_view(&mut self, name: &str) -> Result<DataView, ReportError> {
        if let Some(view) = self.loaded_views.get(name) {
            return Ok(view.clone());
        }

        let definition = self
            .provider
            .data_view(name)
            .ok_or_else(|| ReportError::UnknownView(name.to_string()))?;
        let rows = self.fetcher.fetch(&definition.name, &self.parameters)?;
        let view = DataView::new(definition, rows);
        debug!("Loaded data view '{}': {} row(s)", name, view.row_count());

        self.loaded_views.insert(name.to_string(), view.clone());
        Ok(view)
    }

    /// Rows for one use of a block under `params`.
    ///
    /// Blocks without a data view get no rows. Header blocks keep the first
    /// row of each distinct key value; `row_limit` applies last.
    pub fn resolve_block_data(
        &mut self,
        block: &BlockDefinition,
        params: &HashMap<String, String>,
    ) -> Result<Vec<DataRow>, ReportError> {
        let view_name = match block.data_view_name() {
            Some(name) => name,
            None => return Ok(Vec::new()),
        };

        let mut view = self.resolve_view(view_name)?;
        view.filter(params);

        if block.kind == BlockKind::Header {
            let key_label = block
                .label_variable()
                .or_else(|| view.definition().first_label())
                .map(str::to_string);
            if let Some(column) = key_label
                .as_deref()
                .and_then(|label| view.column_for(label))
                .map(str::to_string)
            {
                view.dedupe_by_column(&column);
            }
        }

        if block.row_limit > 0 {
            view.truncate(block.row_limit);
        }

        let suffix = if block.kind == BlockKind::Header { " (Header)" } else { "" };
        debug!(
            "Block fetched: block={}{} view={} params={:?} rows={}",
            block.name,
            suffix,
            view_name,
            params,
            view.row_count()
        );
        if let Some(sample) = view.rows().first() {
            debug!("Sample row: {:?}", sample);
        }

        Ok(view.into_rows())
    }
}
