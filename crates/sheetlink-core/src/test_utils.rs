//! Shared test helpers for unit and integration tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`. Provides
//! in-memory implementations of the sheet traits and a recording icon
//! resolver.

use crate::id::RowKey;
use crate::schema::SheetSchema;
use crate::sheet::{IconResolver, Row, RowRef, Sheet, SheetCollection, SheetRef};
use crate::value::{ImageHandle, Language, RawValue};
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::{Arc, Mutex};

// ===========================================================================
// Raw value helpers
// ===========================================================================

pub fn int(v: i64) -> RawValue {
    RawValue::Int(v)
}

pub fn text(s: &str) -> RawValue {
    RawValue::Str(s.to_string())
}

// ===========================================================================
// MemoryRow
// ===========================================================================

/// A row held entirely in memory. Column names are optional; without them
/// only index access works.
#[derive(Debug, Clone)]
pub struct MemoryRow {
    sheet: String,
    key: RowKey,
    values: Vec<RawValue>,
    names: Arc<Vec<String>>,
}

impl MemoryRow {
    /// A row whose column names come from a compiled schema.
    pub fn new(sheet: &str, key: u32, schema: &SheetSchema, values: Vec<RawValue>) -> Self {
        let names = schema.fields().iter().map(|f| f.name.clone()).collect();
        Self {
            sheet: sheet.to_string(),
            key: RowKey(key),
            values,
            names: Arc::new(names),
        }
    }

    /// A row with no column names.
    pub fn bare(sheet: &str, key: u32, values: Vec<RawValue>) -> Self {
        Self {
            sheet: sheet.to_string(),
            key: RowKey(key),
            values,
            names: Arc::new(Vec::new()),
        }
    }

    pub fn with_names(mut self, names: &[&str]) -> Self {
        self.names = Arc::new(names.iter().map(|n| n.to_string()).collect());
        self
    }
}

impl Row for MemoryRow {
    fn key(&self) -> RowKey {
        self.key
    }

    fn sheet_name(&self) -> &str {
        &self.sheet
    }

    fn raw(&self, column: usize) -> Option<RawValue> {
        self.values.get(column).cloned()
    }

    fn raw_named(&self, column: &str) -> Option<RawValue> {
        let index = self.names.iter().position(|n| n == column)?;
        self.raw(index)
    }
}

// ===========================================================================
// MemorySheet
// ===========================================================================

/// A sheet of [`MemoryRow`]s. Unless ranges are set explicitly, the sheet
/// claims a single range covering every key it holds.
#[derive(Debug, Clone)]
pub struct MemorySheet {
    name: String,
    columns: Arc<Vec<String>>,
    rows: BTreeMap<u32, Arc<MemoryRow>>,
    ranges: Vec<Range<u32>>,
    explicit_ranges: bool,
}

impl MemorySheet {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: Arc::new(columns.iter().map(|c| c.to_string()).collect()),
            rows: BTreeMap::new(),
            ranges: Vec::new(),
            explicit_ranges: false,
        }
    }

    pub fn with_row(mut self, key: u32, values: Vec<RawValue>) -> Self {
        let row = MemoryRow {
            sheet: self.name.clone(),
            key: RowKey(key),
            values,
            names: Arc::clone(&self.columns),
        };
        self.rows.insert(key, Arc::new(row));
        if !self.explicit_ranges {
            let end = self.rows.keys().next_back().map_or(0, |k| k.saturating_add(1));
            self.ranges = vec![0..end];
        }
        self
    }

    pub fn with_ranges(mut self, ranges: Vec<Range<u32>>) -> Self {
        self.ranges = ranges;
        self.explicit_ranges = true;
        self
    }
}

impl Sheet for MemorySheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn data_ranges(&self) -> &[Range<u32>] {
        &self.ranges
    }

    fn row(&self, key: RowKey) -> Option<RowRef> {
        self.rows.get(&key.0).map(|r| Arc::clone(r) as RowRef)
    }

    fn rows(&self) -> Box<dyn Iterator<Item = RowRef> + '_> {
        Box::new(self.rows.values().map(|r| Arc::clone(r) as RowRef))
    }
}

// ===========================================================================
// MemoryCollection
// ===========================================================================

/// Sheets keyed by name. Cross-sheet lookups search sheets in name order.
#[derive(Debug, Clone, Default)]
pub struct MemoryCollection {
    sheets: BTreeMap<String, Arc<MemorySheet>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(mut self, sheet: MemorySheet) -> Self {
        self.sheets.insert(sheet.name.clone(), Arc::new(sheet));
        self
    }
}

impl SheetCollection for MemoryCollection {
    fn sheet(&self, name: &str) -> Option<SheetRef> {
        self.sheets.get(name).map(|s| Arc::clone(s) as SheetRef)
    }

    fn find_reference(&self, key: RowKey) -> Option<RowRef> {
        self.sheets.values().find_map(|s| s.row(key))
    }
}

// ===========================================================================
// RecordingIcons
// ===========================================================================

/// Resolves every icon id and remembers each request.
#[derive(Debug, Default)]
pub struct RecordingIcons {
    calls: Mutex<Vec<(u32, Language)>>,
}

impl RecordingIcons {
    pub fn calls(&self) -> Vec<(u32, Language)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl IconResolver for RecordingIcons {
    fn resolve_icon(&self, id: u32, language: Language) -> Option<ImageHandle> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((id, language));
        }
        Some(ImageHandle {
            id,
            path: format!("ui/icon/{:06}/{}/{:06}.tex", id / 1000 * 1000, language.code(), id),
        })
    }
}
