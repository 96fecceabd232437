use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a row within a sheet. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowKey(pub u32);

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for RowKey {
    fn from(key: u32) -> Self {
        RowKey(key)
    }
}
