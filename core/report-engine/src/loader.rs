//! FILENAME: core/report-engine/src/loader.rs
//! PURPOSE: Reads report configuration from YAML or JSON files.
//! CONTEXT: Two layouts are supported: a single bundle file holding one
//! workbook with its data views and data sources, or a directory tree with
//! `workbooks/`, `dataViews/` and `datasources/` folders of one definition
//! per file. Everything is validated before it is returned.

use crate::definition::{DataSourceDefinition, DataViewDefinition, WorkbookDefinition};
use crate::error::ConfigError;
use crate::registry::MemoryRegistry;
use crate::validator::Validator;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ConfigBundle {
    workbook: Option<WorkbookDefinition>,
    data_views: Vec<DataViewDefinition>,
    data_sources: Vec<DataSourceDefinition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DataSourcesBundle {
    data_sources: Vec<DataSourceDefinition>,
}

/// A workbook together with the definitions it reads from.
#[derive(Debug, Clone)]
pub struct LoadedBundle {
    pub workbook: WorkbookDefinition,
    pub registry: MemoryRegistry,
}

/// Every definition found under a configuration directory. Workbooks are
/// keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ConfigSet {
    pub workbooks: HashMap<String, WorkbookDefinition>,
    pub registry: MemoryRegistry,
}

/// Parses one file, choosing the format from its extension.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    match extension(path).as_deref() {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&text).map_err(|source| {
            ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            }
        }),
        Some("json") => serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        }),
        _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn is_config_file(path: &Path) -> bool {
    matches!(extension(path).as_deref(), Some("yaml" | "yml" | "json"))
}

/// Loads a bundle holding `workbook`, `dataViews` and `dataSources`.
pub fn load_config_bundle(path: &Path) -> Result<LoadedBundle, ConfigError> {
    let bundle: ConfigBundle = read_document(path)?;
    let workbook = bundle
        .workbook
        .ok_or_else(|| ConfigError::MissingWorkbook(path.to_path_buf()))?;

    let mut registry = MemoryRegistry::new();
    for view in bundle.data_views {
        if view.name.is_empty() {
            return Err(ConfigError::MissingName { kind: "data view" });
        }
        if registry.contains_view(&view.name) {
            return Err(ConfigError::Duplicate {
                kind: "data view",
                name: view.name,
            });
        }
        registry.insert_view(view);
    }
    registry.set_sources(collect_sources(bundle.data_sources)?);

    validate_registry(&registry)?;
    Validator::new(&registry)
        .validate_workbook(&workbook)
        .map_err(|source| ConfigError::Invalid {
            kind: "workbook",
            name: workbook.name.clone(),
            source,
        })?;

    debug!(
        "Loaded config bundle {}: workbook '{}'",
        path.display(),
        workbook.name
    );
    Ok(LoadedBundle { workbook, registry })
}

/// Loads a file holding a `dataSources` list, keyed by name.
pub fn load_data_sources_bundle(
    path: &Path,
) -> Result<HashMap<String, DataSourceDefinition>, ConfigError> {
    let bundle: DataSourcesBundle = read_document(path)?;
    collect_sources(bundle.data_sources)
}

fn collect_sources(
    sources: Vec<DataSourceDefinition>,
) -> Result<HashMap<String, DataSourceDefinition>, ConfigError> {
    let mut by_name = HashMap::new();
    for source in sources {
        if source.name.is_empty() {
            return Err(ConfigError::MissingName { kind: "data source" });
        }
        if by_name.contains_key(&source.name) {
            return Err(ConfigError::Duplicate {
                kind: "data source",
                name: source.name,
            });
        }
        by_name.insert(source.name.clone(), source);
    }
    Ok(by_name)
}

/// Loads `datasources/`, `dataViews/` and `workbooks/` under `root`.
/// Missing folders are treated as empty.
pub fn load_config_dir(root: &Path) -> Result<ConfigSet, ConfigError> {
    let mut set = ConfigSet::default();

    for path in config_files(&root.join("datasources"))? {
        let source: DataSourceDefinition = read_document(&path)?;
        set.registry.insert_source(source);
    }
    for path in config_files(&root.join("dataViews"))? {
        let view: DataViewDefinition = read_document(&path)?;
        set.registry.insert_view(view);
    }
    for path in config_files(&root.join("workbooks"))? {
        let workbook: WorkbookDefinition = read_document(&path)?;
        set.workbooks.insert(workbook.id.clone(), workbook);
    }

    validate_registry(&set.registry)?;
    let validator = Validator::new(&set.registry);
    let mut ids: Vec<&String> = set.workbooks.keys().collect();
    ids.sort();
    for id in ids {
        let workbook = &set.workbooks[id];
        validator
            .validate_workbook(workbook)
            .map_err(|source| ConfigError::Invalid {
                kind: "workbook",
                name: workbook.name.clone(),
                source,
            })?;
    }

    debug!(
        "Loaded config dir {}: {} workbook(s)",
        root.display(),
        set.workbooks.len()
    );
    Ok(set)
}

fn config_files(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| ConfigError::Read {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        if path.is_file() && is_config_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn validate_registry(registry: &MemoryRegistry) -> Result<(), ConfigError> {
    let validator = Validator::new(registry);

    let mut views: Vec<&DataViewDefinition> = registry.views().collect();
    views.sort_by(|a, b| a.name.cmp(&b.name));
    for view in views {
        validator
            .validate_data_view(view)
            .map_err(|source| ConfigError::Invalid {
                kind: "data view",
                name: view.name.clone(),
                source,
            })?;
    }

    let mut sources: Vec<&DataSourceDefinition> = registry.sources().collect();
    sources.sort_by(|a, b| a.name.cmp(&b.name));
    for source in sources {
        validator
            .validate_data_source(source)
            .map_err(|e| ConfigError::Invalid {
                kind: "data source",
                name: source.name.clone(),
                source: e,
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConfigProvider;

    const BUNDLE: &str = r#"
workbook:
  id: wb1
  name: Report
  template: tpl.xlsx
  outputDir: out
  sheets:
    - name: Sheet1
      blocks:
        - name: Block1
          type: value
          range: A1:B1
          dataView: view1
dataViews:
  - name: view1
    dataSource: ds1
    labels:
      - name: l1
        column: c1
dataSources:
  - name: ds1
    driver: csv
    dsn: ./data
"#;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_config_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bundle.yaml", BUNDLE);

        let loaded = load_config_bundle(&path).unwrap();
        assert_eq!(loaded.workbook.name, "Report");
        assert!(loaded.registry.data_view("view1").is_some());
        assert_eq!(loaded.registry.data_source("ds1").unwrap().driver, "csv");
    }

    #[test]
    fn test_bundle_missing_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bundle.yml", "dataViews: []\n");
        assert!(matches!(load_config_bundle(&path), Err(ConfigError::MissingWorkbook(_))));
    }

    #[test]
    fn test_bundle_duplicate_view() {
        let dir = tempfile::tempdir().unwrap();
        let content = BUNDLE.replace(
            "dataSources:",
            "  - name: view1\n    dataSource: ds1\ndataSources:",
        );
        let path = write(dir.path(), "bundle.yaml", &content);
        match load_config_bundle(&path) {
            Err(ConfigError::Duplicate { kind, name }) => {
                assert_eq!(kind, "data view");
                assert_eq!(name, "view1");
            }
            other => panic!("expected duplicate error, got {other:?}"),
        }
    }

    #[test]
    fn test_bundle_rejects_unknown_view() {
        let dir = tempfile::tempdir().unwrap();
        let content = BUNDLE.replace("dataView: view1", "dataView: missing");
        let path = write(dir.path(), "bundle.yaml", &content);
        let err = load_config_bundle(&path).unwrap_err();
        assert!(err.to_string().contains("unknown DataView 'missing'"), "{err}");
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bundle.toml", BUNDLE);
        assert!(matches!(load_config_bundle(&path), Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_load_data_sources_bundle_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "sources.json",
            r#"{"dataSources": [{"name": "prod", "driver": "csv", "dsn": "/srv/data"}]}"#,
        );
        let sources = load_data_sources_bundle(&path).unwrap();
        assert_eq!(sources["prod"].dsn, "/srv/data");

        let path = write(dir.path(), "unnamed.yaml", "dataSources:\n  - driver: csv\n");
        assert!(matches!(
            load_data_sources_bundle(&path),
            Err(ConfigError::MissingName { kind: "data source" })
        ));
    }

    #[test]
    fn test_load_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "datasources/ds1.yaml", "name: ds1\ndriver: csv\ndsn: ./data\n");
        write(
            dir.path(),
            "dataViews/view1.yml",
            "name: view1\ndataSource: ds1\nlabels:\n  - name: l1\n    column: c1\n",
        );
        write(dir.path(), "dataViews/notes.txt", "ignored");
        write(
            dir.path(),
            "workbooks/wb1.json",
            r#"{"id": "wb1", "name": "Report", "template": "tpl.xlsx", "outputDir": "out",
                "sheets": [{"name": "S", "blocks": [{"name": "B", "type": "value", "range": "A1:A1", "dataView": "view1"}]}]}"#,
        );

        let set = load_config_dir(dir.path()).unwrap();
        assert_eq!(set.workbooks["wb1"].name, "Report");
        assert!(set.registry.contains_view("view1"));
        assert!(set.registry.contains_source("ds1"));
    }

    #[test]
    fn test_config_dir_folders_are_optional() {
        let dir = tempfile::tempdir().unwrap();
        let set = load_config_dir(dir.path()).unwrap();
        assert!(set.workbooks.is_empty());
    }

    #[test]
    fn test_config_dir_validates_views() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "dataViews/view1.yaml", "name: view1\ndataSource: nowhere\n");
        let err = load_config_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("unknown DataSource 'nowhere'"), "{err}");
    }
}
