//! Applies override documents to a raw schema tree before it is compiled.
//!
//! The tree is held as a [`serde_yaml::Value`] regardless of the file format
//! it came from, so integer case keys survive.

use crate::schema::{OverrideData, ReplacementData};
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

/// A schema document that overrides cannot be applied to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverrideError {
    #[error("document root is not a mapping")]
    RootNotMapping,

    #[error("'fields' is not a list")]
    FieldsNotList,
}

/// Apply every replacement to the document's field tree. Returns how many
/// field nodes were edited. Fails only when the document is not shaped like
/// a schema.
pub fn apply_overrides(doc: &mut Value, overrides: &OverrideData) -> Result<usize, OverrideError> {
    let root = doc.as_mapping_mut().ok_or(OverrideError::RootNotMapping)?;
    let Some(fields) = root.get_mut("fields") else {
        return Ok(0);
    };
    let fields = fields
        .as_sequence_mut()
        .ok_or(OverrideError::FieldsNotList)?;

    let mut total = 0;
    for replacement in &overrides.replacements {
        let hits = apply_to_fields(fields, replacement);
        if hits == 0 {
            warn!(source = %replacement.source, "override matched no field");
        }
        total += hits;
    }
    debug!(replacements = overrides.replacements.len(), edited = total, "applied overrides");
    Ok(total)
}

fn apply_to_fields(fields: &mut [Value], replacement: &ReplacementData) -> usize {
    let mut hits = 0;
    for field in fields {
        let Some(node) = field.as_mapping_mut() else {
            continue;
        };
        if matches_source(node, &replacement.source) {
            for keys in &replacement.add_keys {
                for (key, value) in keys {
                    node.insert(key.clone(), value.clone());
                }
            }
            hits += 1;
        }
        if let Some(nested) = node.get_mut("fields").and_then(Value::as_sequence_mut) {
            hits += apply_to_fields(nested, replacement);
        }
    }
    hits
}

/// `*` matches nodes without a name; anything else matches by exact name.
fn matches_source(node: &Mapping, source: &str) -> bool {
    match node.get("name").and_then(Value::as_str).filter(|n| !n.is_empty()) {
        Some(name) => name == source,
        None => source == "*",
    }
}
