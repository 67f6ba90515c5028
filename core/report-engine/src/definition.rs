//! FILENAME: core/report-engine/src/definition.rs
//! Report Definition - The serializable configuration.
//!
//! This module contains all the types needed to DESCRIBE a report:
//! the workbook with its sheets and block tree, the data views the blocks
//! read from, and the data sources behind those views. These structures are:
//! - Serializable (YAML or JSON, camelCase field names)
//! - Read-only during generation
//! - Shared between concurrent generations

use serde::{Deserialize, Deserializer, Serialize};
use sheet::{CellRange, RangeParseError};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// WORKBOOK
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkbookDefinition {
    pub id: String,
    pub name: String,

    /// Template file, relative to the template root.
    pub template: String,

    /// Output location relative to the output root. `${param}` placeholders
    /// are substituted; a path without extension names a directory.
    pub output_dir: String,

    /// Dynamic date expression stored as the `archive_date` parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_rule: Option<String>,

    pub parameters: HashMap<String, String>,
    pub sheets: Vec<SheetDefinition>,
}

// ============================================================================
// SHEET
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SheetDefinition {
    pub name: String,

    /// A dynamic sheet is a template cloned once per distinct value of
    /// `param_label` in `data_view`.
    pub dynamic: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub param_label: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_view: Option<String>,

    pub blocks: Vec<BlockDefinition>,
}

// ============================================================================
// BLOCK
// ============================================================================

/// What a block does with its data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlockKind {
    /// One stamp of the block range per data row.
    #[default]
    Value,
    /// Like `Value`, over the distinct values of the key label.
    Header,
    /// Cross-tabulation of a vertical and a horizontal header axis.
    Matrix,
    /// Anything else; kept so it can be reported by name.
    Other(String),
}

impl From<String> for BlockKind {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "value" => BlockKind::Value,
            "header" => BlockKind::Header,
            "matrix" => BlockKind::Matrix,
            _ => BlockKind::Other(s),
        }
    }
}

impl From<BlockKind> for String {
    fn from(kind: BlockKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Value => f.write_str("value"),
            BlockKind::Header => f.write_str("header"),
            BlockKind::Matrix => f.write_str("matrix"),
            BlockKind::Other(s) => f.write_str(s),
        }
    }
}

/// Expansion direction of a block. An empty string reads as vertical.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    #[serde(alias = "")]
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockDefinition {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: BlockKind,

    /// Template span, e.g. "A2:C2". Single cells are written "A1:A1".
    /// Accepts either a plain string or `{ ref: "A2:C2" }`.
    #[serde(deserialize_with = "range_text")]
    pub range: String,

    #[serde(
        deserialize_with = "optional_range_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub label_range: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_view: Option<String>,

    pub direction: Direction,

    /// Maximum rows used; 0 means no limit.
    pub row_limit: usize,

    /// Marks the vertical axis of a matrix as the one expanded first.
    pub insert_after: bool,

    /// Parameter key used for this block's values, overriding the view's
    /// first label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_variable: Option<String>,

    /// Marks a matrix sub-block as a cell template rather than an axis.
    pub template: bool,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_blocks: Vec<BlockDefinition>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RangeText {
    Plain(String),
    Ref {
        #[serde(rename = "ref")]
        reference: String,
    },
}

impl From<RangeText> for String {
    fn from(text: RangeText) -> Self {
        match text {
            RangeText::Plain(s) | RangeText::Ref { reference: s } => s,
        }
    }
}

fn range_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    RangeText::deserialize(deserializer).map(String::from)
}

fn optional_range_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<RangeText>::deserialize(deserializer)?.map(String::from))
}

impl BlockDefinition {
    pub fn parsed_range(&self) -> Result<CellRange, RangeParseError> {
        self.range.parse()
    }

    /// The data view name, treating an empty string as absent.
    pub fn data_view_name(&self) -> Option<&str> {
        self.data_view.as_deref().filter(|v| !v.is_empty())
    }

    pub fn label_variable(&self) -> Option<&str> {
        self.label_variable.as_deref().filter(|v| !v.is_empty())
    }

    pub fn is_horizontal(&self) -> bool {
        self.direction == Direction::Horizontal
    }

    /// Header sub-blocks not flagged as templates are matrix axes.
    pub fn is_axis(&self) -> bool {
        self.kind == BlockKind::Header && !self.template
    }
}

// ============================================================================
// DATA VIEW / DATA SOURCE
// ============================================================================

/// A logical field of a view and the storage column behind it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelDefinition {
    pub name: String,
    pub column: String,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataViewDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub data_source: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    pub labels: Vec<LabelDefinition>,
}

impl DataViewDefinition {
    pub fn column_for(&self, label: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|l| l.name == label)
            .map(|l| l.column.as_str())
    }

    pub fn first_label(&self) -> Option<&str> {
        self.labels.first().map(|l| l.name.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataSourceDefinition {
    pub name: String,
    pub driver: String,
    pub dsn: String,
}
