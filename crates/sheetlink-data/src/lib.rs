//! On-disk schema documents for sheetlink: parsing, override application,
//! directory loading, and the heuristic configuration files.

pub mod loader;
pub mod overrides;
pub mod schema;

pub use loader::{DataLoadError, build_registry, load_schema_dir};
