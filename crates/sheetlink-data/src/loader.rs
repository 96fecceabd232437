//! Loading pipeline: finds schema documents, applies overrides, compiles a
//! schema set, and reads the heuristic configuration files.
//!
//! Provides format detection (YAML/JSON/RON/TOML), file discovery, and
//! deserialization helpers.

use crate::overrides::{OverrideError, apply_overrides};
use crate::schema::{OverrideData, SheetData};
use serde::de::DeserializeOwned;
use sheetlink_core::definition::SchemaSet;
use sheetlink_core::heuristic::{CurrencyTable, ShopHeuristics, ShopOverrides};
use sheetlink_core::id::RowKey;
use sheetlink_core::registry::ConverterRegistry;
use sheetlink_core::schema::{SchemaError, SheetDecl};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// The document parsed but does not describe a valid sheet.
    #[error("invalid schema for sheet '{sheet}': {source}")]
    Schema { sheet: String, source: SchemaError },

    /// An override document could not be applied.
    #[error("invalid override {file}: {source}")]
    InvalidOverride { file: PathBuf, source: OverrideError },

    /// The tabular override file could not be read.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DataLoadError {
    /// The schema-level error to record for a file that failed to load.
    fn into_schema_error(self) -> SchemaError {
        match self {
            DataLoadError::Schema { source, .. } => source,
            other => SchemaError::Malformed {
                detail: other.to_string(),
            },
        }
    }
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
    Ron,
    Toml,
}

const EXTENSIONS: [&str; 5] = ["yml", "yaml", "json", "ron", "toml"];

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yml" | "yaml") => Ok(Format::Yaml),
        Some("json") => Ok(Format::Json),
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without
/// extension).
///
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// more than one supported extension exists for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in &EXTENSIONS {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(ref existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing.clone(),
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Every file in `dir` with a supported extension, sorted by path. Files of
/// other types are ignored.
pub fn discover_data_files(dir: &Path) -> Result<Vec<PathBuf>, DataLoadError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && detect_format(&path).is_ok() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Read a file and deserialize it according to its format (detected from
/// extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let parse_err = |detail: String| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    };

    match format {
        Format::Yaml => serde_yaml::from_str(&content).map_err(|e| parse_err(e.to_string())),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_err(e.to_string())),
        Format::Ron => ron::from_str(&content).map_err(|e| parse_err(e.to_string())),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_err(e.to_string())),
    }
}

// ===========================================================================
// Schema loading
// ===========================================================================

/// Load one schema document, applying the override document with the same
/// base name from `overrides_dir` if there is one.
pub fn load_sheet_file(
    path: &Path,
    overrides_dir: Option<&Path>,
) -> Result<SheetDecl, DataLoadError> {
    let mut doc: serde_yaml::Value = deserialize_file(path)?;

    if let Some(dir) = overrides_dir {
        if let Some(override_path) = find_data_file(dir, &base_name(path))? {
            let overrides: OverrideData = deserialize_file(&override_path)?;
            let edited = apply_overrides(&mut doc, &overrides).map_err(|source| {
                DataLoadError::InvalidOverride {
                    file: override_path.clone(),
                    source,
                }
            })?;
            debug!(file = %path.display(), overrides = %override_path.display(), edited, "overrides applied");
        }
    }

    let data: SheetData = serde_yaml::from_value(doc).map_err(|e| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let sheet = data.name.clone();
    data.into_decl()
        .map_err(|source| DataLoadError::Schema { sheet, source })
}

/// Load and compile every schema document in `schema_dir`.
///
/// A document that cannot be read, parsed, or compiled is logged and recorded
/// in [`SchemaSet::failures`]; the rest still load. Only failing to list the
/// directory itself is an error.
pub fn load_schema_dir(
    schema_dir: &Path,
    overrides_dir: Option<&Path>,
    registry: &ConverterRegistry,
) -> Result<SchemaSet, DataLoadError> {
    let files = discover_data_files(schema_dir)?;

    let mut decls = Vec::with_capacity(files.len());
    let mut file_failures = Vec::new();
    let mut seen_stems: HashMap<String, PathBuf> = HashMap::new();
    for path in files {
        let stem = base_name(&path);
        if let Some(existing) = seen_stems.get(&stem) {
            let conflict = DataLoadError::ConflictingFormats {
                a: existing.clone(),
                b: path.clone(),
            };
            file_failures.push((path.display().to_string(), conflict.into_schema_error()));
            continue;
        }
        seen_stems.insert(stem, path.clone());

        match load_sheet_file(&path, overrides_dir) {
            Ok(decl) => decls.push(decl),
            Err(DataLoadError::Schema { sheet, source }) => file_failures.push((sheet, source)),
            Err(e) => file_failures.push((path.display().to_string(), e.into_schema_error())),
        }
    }

    let mut set = SchemaSet::compile_all(decls, registry);
    for (source, error) in file_failures {
        set.record_failure(&source, error);
    }
    set.resolve_references();

    info!(
        dir = %schema_dir.display(),
        sheets = set.len(),
        failures = set.failures().len(),
        "schema directory loaded"
    );
    Ok(set)
}

// ===========================================================================
// Heuristic configuration
// ===========================================================================

/// Read the tabular shop override file: a header row, then
/// `shopKey, <ignored>, classification` per line. Lines with a bad key or an
/// unknown classification are skipped with a warning.
pub fn load_shop_overrides(path: &Path) -> Result<ShopOverrides, DataLoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut overrides = ShopOverrides::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let key = record.get(0).and_then(|k| k.parse::<u32>().ok());
        let table = record.get(2).map(str::parse::<CurrencyTable>);
        match (key, table) {
            (Some(key), Some(Ok(table))) => {
                overrides.insert(RowKey(key), table);
            }
            (key, table) => warn!(
                file = %path.display(),
                line = line + 2,
                ?key,
                ?table,
                "skipping shop override line"
            ),
        }
    }

    debug!(file = %path.display(), entries = overrides.len(), "loaded shop overrides");
    Ok(overrides)
}

/// Read heuristic constants. Keys the file leaves out keep their defaults.
pub fn load_heuristics(path: &Path) -> Result<ShopHeuristics, DataLoadError> {
    deserialize_file(path)
}

/// A registry with the built-in converters plus whichever heuristic
/// configuration files are given.
pub fn build_registry(
    heuristics: Option<&Path>,
    shop_overrides: Option<&Path>,
) -> Result<ConverterRegistry, DataLoadError> {
    let mut registry = ConverterRegistry::new();
    if let Some(path) = heuristics {
        registry = registry.with_heuristics(load_heuristics(path)?);
    }
    if let Some(path) = shop_overrides {
        registry = registry.with_shop_overrides(load_shop_overrides(path)?);
    }
    Ok(registry)
}

// ===========================================================================
// Tests
// ===========================================================================
