//! Capabilities this crate consumes from the archive and row-decoding layers.
//!
//! The container format, byte-level row decoding and image decoding all live
//! behind these traits. Converters only ever read raw scalars and look rows
//! up by key.

use crate::id::RowKey;
use crate::value::{ImageHandle, Language, RawValue};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Shared handle to a decoded row.
pub type RowRef = Arc<dyn Row>;

/// Shared handle to a sheet.
pub type SheetRef = Arc<dyn Sheet>;

/// A single decoded row.
pub trait Row: fmt::Debug + Send + Sync {
    fn key(&self) -> RowKey;

    /// Name of the sheet this row belongs to.
    fn sheet_name(&self) -> &str;

    /// Raw scalar at a flattened column index.
    fn raw(&self, column: usize) -> Option<RawValue>;

    /// Raw scalar in the column with the given flattened field name.
    fn raw_named(&self, column: &str) -> Option<RawValue>;
}

/// A named table of rows addressed by integer key.
pub trait Sheet: Send + Sync {
    fn name(&self) -> &str;

    /// Half-open key ranges covered by the sheet's data files.
    fn data_ranges(&self) -> &[Range<u32>];

    fn row(&self, key: RowKey) -> Option<RowRef>;

    /// Every row, in key order.
    fn rows(&self) -> Box<dyn Iterator<Item = RowRef> + '_>;

    fn contains_key(&self, key: RowKey) -> bool {
        self.row(key).is_some()
    }

    /// Coarse existence filter: whether any data file could hold `key`.
    fn in_data_range(&self, key: RowKey) -> bool {
        self.data_ranges().iter().any(|r| r.contains(&key.0))
    }
}

/// The set of all sheets.
pub trait SheetCollection: Send + Sync {
    fn sheet(&self, name: &str) -> Option<SheetRef>;

    fn sheet_exists(&self, name: &str) -> bool {
        self.sheet(name).is_some()
    }

    /// Find a row by key across every sheet. Which sheet wins is up to the
    /// collection.
    fn find_reference(&self, key: RowKey) -> Option<RowRef>;
}

/// Resolves numeric icon ids to images.
pub trait IconResolver: Send + Sync {
    fn resolve_icon(&self, id: u32, language: Language) -> Option<ImageHandle>;
}

/// An icon resolver that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIcons;

impl IconResolver for NoIcons {
    fn resolve_icon(&self, _id: u32, _language: Language) -> Option<ImageHandle> {
        None
    }
}
