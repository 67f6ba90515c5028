//! FILENAME: core/report-engine/src/lib.rs
//! Report generation subsystem.
//!
//! Fills spreadsheet templates with rows from pluggable data fetchers. Blocks
//! of template cells are captured once and stamped per data row, inserting
//! rows or columns so the layout grows with the data.
//!
//! Layers:
//! - `definition`, `registry`, `loader`, `validator`: configuration (what the report IS)
//! - `fetcher`, `dataview`, `context`: data for one run (WHAT goes in)
//! - `template`, `generator`: expansion and stamping (HOW it is laid out)
//! - `document`: the grid operations the generator needs from a workbook

pub mod context;
pub mod dataview;
pub mod definition;
pub mod document;
pub mod dynamic_date;
pub mod error;
pub mod fetcher;
pub mod generator;
pub mod loader;
pub mod registry;
pub mod template;
pub mod validator;

pub use context::{GenerationContext, ARCHIVE_DATE_PARAM};
pub use dataview::DataView;
pub use definition::*;
pub use document::SheetDocument;
pub use dynamic_date::{resolve_dynamic_date, DynamicDateError};
pub use error::{ConfigError, FetchError, ReportError, ValidationError};
pub use fetcher::{CsvFetcher, DataFetcher, DataRow, MemoryFetcher};
pub use generator::Generator;
pub use loader::{load_config_bundle, load_config_dir, load_data_sources_bundle, ConfigSet, LoadedBundle};
pub use registry::{ConfigProvider, MemoryRegistry};
pub use template::TemplateCache;
pub use validator::Validator;
