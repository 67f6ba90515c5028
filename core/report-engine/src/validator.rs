//! FILENAME: core/report-engine/src/validator.rs
//! PURPOSE: Structural checks on loaded configuration.
//! CONTEXT: Runs once after loading, before any generation. References to
//! data views and data sources are only checked when a provider is given.

use crate::definition::{
    BlockDefinition, BlockKind, DataSourceDefinition, DataViewDefinition, SheetDefinition,
    WorkbookDefinition,
};
use crate::error::ValidationError;
use crate::registry::ConfigProvider;

type Result = std::result::Result<(), ValidationError>;

fn fail(message: String) -> Result {
    Err(ValidationError::new(message))
}

pub struct Validator<'a> {
    provider: Option<&'a dyn ConfigProvider>,
}

impl<'a> Validator<'a> {
    pub fn new(provider: &'a dyn ConfigProvider) -> Self {
        Validator { provider: Some(provider) }
    }

    /// A validator that only checks shape, not references.
    pub fn standalone() -> Self {
        Validator { provider: None }
    }

    fn knows_view(&self, name: &str) -> bool {
        self.provider.map_or(true, |p| p.data_view(name).is_some())
    }

    pub fn validate_workbook(&self, wb: &WorkbookDefinition) -> Result {
        if wb.name.is_empty() {
            return fail("workbook name is required".into());
        }
        if wb.template.is_empty() {
            return fail("workbook template is required".into());
        }
        if wb.output_dir.is_empty() {
            return fail("workbook output directory is required".into());
        }
        if wb.sheets.is_empty() {
            return fail("workbook must have at least one sheet".into());
        }

        for (i, sheet) in wb.sheets.iter().enumerate() {
            self.validate_sheet(sheet)
                .map_err(|e| e.within(format_args!("sheet {}", i)))?;
        }
        Ok(())
    }

    pub fn validate_sheet(&self, sheet: &SheetDefinition) -> Result {
        if sheet.name.is_empty() {
            return fail("sheet name is required".into());
        }
        if sheet.dynamic {
            let view = match sheet.data_view.as_deref().filter(|v| !v.is_empty()) {
                Some(view) => view,
                None => {
                    return fail(format!("dynamic sheet '{}' requires a data view", sheet.name))
                }
            };
            if sheet.param_label.as_deref().map_or(true, str::is_empty) {
                return fail(format!("dynamic sheet '{}' requires a param label", sheet.name));
            }
            if !self.knows_view(view) {
                return fail(format!(
                    "sheet '{}' references unknown DataView '{}'",
                    sheet.name, view
                ));
            }
        }

        for (i, block) in sheet.blocks.iter().enumerate() {
            self.validate_block(block)
                .map_err(|e| e.within(format_args!("block {}", i)))?;
        }
        Ok(())
    }

    pub fn validate_block(&self, block: &BlockDefinition) -> Result {
        if block.name.is_empty() {
            return fail("block name is required".into());
        }
        if let BlockKind::Other(kind) = &block.kind {
            if kind.is_empty() {
                return fail(format!("block '{}' type is required", block.name));
            }
            return fail(format!("block '{}' has invalid type '{}'", block.name, kind));
        }
        if block.range.is_empty() {
            return fail(format!("block '{}' range is required", block.name));
        }
        if let Err(e) = block.parsed_range() {
            return fail(format!("block '{}' {}", block.name, e));
        }
        if let Some(label_range) = &block.label_range {
            if let Err(e) = label_range.parse::<sheet::CellRange>() {
                return fail(format!("block '{}' label {}", block.name, e));
            }
        }
        if let Some(view) = block.data_view_name() {
            if !self.knows_view(view) {
                return fail(format!(
                    "block '{}' references unknown DataView '{}'",
                    block.name, view
                ));
            }
        }

        if block.kind == BlockKind::Matrix {
            if block.sub_blocks.is_empty() {
                return fail(format!("matrix block '{}' must have sub-blocks", block.name));
            }
            let mut has_vertical = false;
            let mut has_horizontal = false;
            for (i, sub) in block.sub_blocks.iter().enumerate() {
                self.validate_block(sub).map_err(|e| {
                    e.within(format_args!("matrix block '{}' sub-block {}", block.name, i))
                })?;
                if sub.is_axis() {
                    if sub.is_horizontal() {
                        has_horizontal = true;
                    } else {
                        has_vertical = true;
                    }
                }
            }
            if !has_vertical || !has_horizontal {
                return fail(format!(
                    "matrix block '{}' must have both vertical and horizontal header blocks",
                    block.name
                ));
            }
        } else {
            for (i, sub) in block.sub_blocks.iter().enumerate() {
                self.validate_block(sub).map_err(|e| {
                    e.within(format_args!("block '{}' sub-block {}", block.name, i))
                })?;
            }
        }
        Ok(())
    }

    pub fn validate_data_view(&self, view: &DataViewDefinition) -> Result {
        if view.name.is_empty() {
            return fail("data view name is required".into());
        }
        if view.data_source.is_empty() {
            return fail(format!("data view '{}' requires a DataSource", view.name));
        }
        if let Some(provider) = self.provider {
            if provider.data_source(&view.data_source).is_none() {
                return fail(format!(
                    "data view '{}' references unknown DataSource '{}'",
                    view.name, view.data_source
                ));
            }
        }
        for (i, label) in view.labels.iter().enumerate() {
            if label.name.is_empty() {
                return fail(format!("data view '{}' label {} name is required", view.name, i));
            }
            if label.column.is_empty() {
                return fail(format!("data view '{}' label {} column is required", view.name, i));
            }
        }
        Ok(())
    }

    pub fn validate_data_source(&self, source: &DataSourceDefinition) -> Result {
        if source.name.is_empty() {
            return fail("data source name is required".into());
        }
        if source.driver.is_empty() {
            return fail(format!("data source '{}' driver is required", source.name));
        }
        if source.dsn.is_empty() {
            return fail(format!("data source '{}' DSN is required", source.name));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Direction, LabelDefinition};
    use crate::registry::MemoryRegistry;

    fn registry() -> MemoryRegistry {
        let mut registry = MemoryRegistry::new();
        registry.insert_view(DataViewDefinition {
            name: "view1".into(),
            ..Default::default()
        });
        registry.insert_source(DataSourceDefinition {
            name: "ds1".into(),
            ..Default::default()
        });
        registry
    }

    fn value_block(name: &str, range: &str, view: Option<&str>) -> BlockDefinition {
        BlockDefinition {
            name: name.into(),
            kind: BlockKind::Value,
            range: range.into(),
            data_view: view.map(String::from),
            ..Default::default()
        }
    }

    fn workbook(sheets: Vec<SheetDefinition>) -> WorkbookDefinition {
        WorkbookDefinition {
            id: "wb1".into(),
            name: "Report".into(),
            template: "tpl.xlsx".into(),
            output_dir: "out".into(),
            sheets,
            ..Default::default()
        }
    }

    fn sheet_with(blocks: Vec<BlockDefinition>) -> SheetDefinition {
        SheetDefinition {
            name: "Sheet1".into(),
            blocks,
            ..Default::default()
        }
    }

    fn error_of(result: Result) -> String {
        result.unwrap_err().to_string()
    }

    #[test]
    fn test_valid_workbook() {
        let registry = registry();
        let validator = Validator::new(&registry);
        let wb = workbook(vec![sheet_with(vec![value_block("Block1", "A1:A1", Some("view1"))])]);
        assert!(validator.validate_workbook(&wb).is_ok());
    }

    #[test]
    fn test_workbook_required_fields() {
        let validator = Validator::standalone();

        let mut wb = workbook(vec![sheet_with(vec![])]);
        wb.name.clear();
        assert_eq!(error_of(validator.validate_workbook(&wb)), "workbook name is required");

        let wb = workbook(vec![]);
        assert_eq!(
            error_of(validator.validate_workbook(&wb)),
            "workbook must have at least one sheet"
        );
    }

    #[test]
    fn test_dynamic_sheet_requires_view() {
        let validator = Validator::standalone();
        let wb = workbook(vec![SheetDefinition {
            name: "DynamicSheet".into(),
            dynamic: true,
            param_label: Some("p1".into()),
            ..Default::default()
        }]);
        let err = error_of(validator.validate_workbook(&wb));
        assert!(err.starts_with("sheet 0 error: "), "{err}");
        assert!(err.contains("requires a data view"), "{err}");
    }

    #[test]
    fn test_unknown_view_reported_with_path() {
        let registry = registry();
        let validator = Validator::new(&registry);
        let wb = workbook(vec![sheet_with(vec![
            value_block("Block0", "A1:A1", None),
            value_block("Block1", "A2:A2", Some("unknown_view")),
        ])]);
        assert_eq!(
            error_of(validator.validate_workbook(&wb)),
            "sheet 0 error: block 1 error: block 'Block1' references unknown DataView 'unknown_view'"
        );
    }

    #[test]
    fn test_block_range_must_parse() {
        let validator = Validator::standalone();
        let err = error_of(validator.validate_block(&value_block("B", "A1", None)));
        assert!(err.contains("expected two cell references"), "{err}");
    }

    #[test]
    fn test_invalid_block_type() {
        let validator = Validator::standalone();
        let mut block = value_block("B", "A1:A1", None);
        block.kind = BlockKind::Other("pivot".into());
        assert_eq!(
            error_of(validator.validate_block(&block)),
            "block 'B' has invalid type 'pivot'"
        );
    }

    #[test]
    fn test_matrix_requires_both_axes() {
        let validator = Validator::standalone();
        let matrix = BlockDefinition {
            name: "Matrix1".into(),
            kind: BlockKind::Matrix,
            range: "A1:C3".into(),
            sub_blocks: vec![BlockDefinition {
                name: "VAxis".into(),
                kind: BlockKind::Header,
                direction: Direction::Vertical,
                range: "A2:A2".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let err = error_of(validator.validate_block(&matrix));
        assert!(err.contains("must have both vertical and horizontal header blocks"));

        let mut complete = matrix.clone();
        complete.sub_blocks.push(BlockDefinition {
            name: "HAxis".into(),
            kind: BlockKind::Header,
            direction: Direction::Horizontal,
            range: "B1:B1".into(),
            ..Default::default()
        });
        assert!(validator.validate_block(&complete).is_ok());
    }

    #[test]
    fn test_matrix_sub_block_error_path() {
        let validator = Validator::standalone();
        let matrix = BlockDefinition {
            name: "M".into(),
            kind: BlockKind::Matrix,
            range: "A1:B2".into(),
            sub_blocks: vec![value_block("", "A1:A1", None)],
            ..Default::default()
        };
        assert_eq!(
            error_of(validator.validate_block(&matrix)),
            "matrix block 'M' sub-block 0 error: block name is required"
        );
    }

    #[test]
    fn test_data_view_rules() {
        let registry = registry();
        let validator = Validator::new(&registry);

        let mut view = DataViewDefinition {
            name: "view1".into(),
            data_source: "ds1".into(),
            labels: vec![LabelDefinition { name: "l1".into(), column: "c1".into(), kind: None }],
            ..Default::default()
        };
        assert!(validator.validate_data_view(&view).is_ok());

        view.data_source = "unknown_ds".into();
        assert!(error_of(validator.validate_data_view(&view)).contains("unknown DataSource"));

        view.data_source.clear();
        assert!(error_of(validator.validate_data_view(&view)).contains("requires a DataSource"));

        view.data_source = "ds1".into();
        view.labels[0].column.clear();
        assert_eq!(
            error_of(validator.validate_data_view(&view)),
            "data view 'view1' label 0 column is required"
        );
    }

    #[test]
    fn test_data_source_rules() {
        let validator = Validator::standalone();
        let mut source = DataSourceDefinition {
            name: "ds".into(),
            driver: "csv".into(),
            dsn: String::new(),
        };
        assert_eq!(
            error_of(validator.validate_data_source(&source)),
            "data source 'ds' DSN is required"
        );
        source.dsn = "./data".into();
        assert!(validator.validate_data_source(&source).is_ok());
    }
}
