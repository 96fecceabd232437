//! Raw column scalars and the resolved values converters produce from them.

use crate::id::RowKey;
use crate::sheet::RowRef;
use serde::{Deserialize, Serialize};
use std::fmt;

// ===========================================================================
// Raw scalars
// ===========================================================================

/// A primitive scalar as decoded from a row column by the external row
/// decoder. Converters never see anything richer than this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

impl RawValue {
    /// Interpret the scalar as a signed integer.
    ///
    /// Floats only convert when they carry no fractional part; strings are
    /// parsed after trimming.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RawValue::Bool(b) => Some(i64::from(*b)),
            RawValue::Int(v) => Some(*v),
            RawValue::UInt(v) => i64::try_from(*v).ok(),
            RawValue::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            RawValue::Float(_) => None,
            RawValue::Str(s) => s.trim().parse().ok(),
        }
    }

    /// Interpret the scalar as a row key. Negative or oversized values have
    /// no key.
    pub fn as_row_key(&self) -> Option<RowKey> {
        self.as_i64()
            .and_then(|v| u32::try_from(v).ok())
            .map(RowKey)
    }

    /// The raw bit pattern of an integer scalar, reinterpreted as unsigned.
    pub fn as_bits(&self) -> Option<u64> {
        match self {
            RawValue::Int(v) => Some(*v as u64),
            RawValue::UInt(v) => Some(*v),
            other => other.as_i64().map(|v| v as u64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Plain formatting: integers in decimal, booleans as `true`/`false`, floats
/// in shortest round-trip form (`1.0` prints as `1`), strings verbatim. Case
/// tables of conditional fields are keyed by this form.
impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Bool(b) => write!(f, "{b}"),
            RawValue::Int(v) => write!(f, "{v}"),
            RawValue::UInt(v) => write!(f, "{v}"),
            RawValue::Float(v) => write!(f, "{v}"),
            RawValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Int(v)
    }
}

impl From<u32> for RawValue {
    fn from(v: u32) -> Self {
        RawValue::UInt(u64::from(v))
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Str(s.to_string())
    }
}

// ===========================================================================
// Languages and images
// ===========================================================================

/// Client language used when resolving language-specific assets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    /// Language-neutral assets.
    None,
    Japanese,
    #[default]
    English,
    German,
    French,
    ChineseSimplified,
    ChineseTraditional,
    Korean,
}

impl Language {
    /// Short code used in asset paths and sheet file names.
    pub fn code(self) -> &'static str {
        match self {
            Language::None => "",
            Language::Japanese => "ja",
            Language::English => "en",
            Language::German => "de",
            Language::French => "fr",
            Language::ChineseSimplified => "chs",
            Language::ChineseTraditional => "cht",
            Language::Korean => "ko",
        }
    }
}

/// Handle to an image produced by the external icon-resolution capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageHandle {
    pub id: u32,
    pub path: String,
}

// ===========================================================================
// Resolved values
// ===========================================================================

/// The result of converting one raw column value.
///
/// `Absent` is the typed form of a resolution miss: a reference that found no
/// row, an out-of-range icon id, or a raw value of the wrong shape.
#[derive(Debug, Clone)]
pub enum Value {
    Absent,
    Scalar(RawValue),
    /// 32-bit ARGB color.
    Color(u32),
    /// Four packed 16-bit components, passed through unchanged.
    Quad(u64),
    Icon(ImageHandle),
    Row(RowRef),
}

impl Value {
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn as_row(&self) -> Option<&RowRef> {
        match self {
            Value::Row(row) => Some(row),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<u32> {
        match self {
            Value::Color(argb) => Some(*argb),
            _ => None,
        }
    }

    pub fn as_quad(&self) -> Option<u64> {
        match self {
            Value::Quad(q) => Some(*q),
            _ => None,
        }
    }

    pub fn as_icon(&self) -> Option<&ImageHandle> {
        match self {
            Value::Icon(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&RawValue> {
        match self {
            Value::Scalar(raw) => Some(raw),
            _ => None,
        }
    }

    /// Sheet name and key of a resolved row, if this value is one.
    pub fn row_identity(&self) -> Option<(&str, RowKey)> {
        self.as_row().map(|row| (row.sheet_name(), row.key()))
    }
}

impl From<Option<RowRef>> for Value {
    fn from(row: Option<RowRef>) -> Self {
        row.map_or(Value::Absent, Value::Row)
    }
}
