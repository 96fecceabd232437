//! Sheet schema model: raw field declarations in, compiled leaf fields out.
//!
//! A [`SheetDecl`] is what a schema document says. [`SheetSchema::compile`]
//! flattens it (see [`crate::compile`]) into an immutable [`SheetSchema`]
//! whose [`FieldDef`]s line up one-to-one with on-disk columns.

use crate::condition::{Condition, ConditionDecl};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ===========================================================================
// Errors
// ===========================================================================

/// Malformed schema input. Fails the compilation of one sheet only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The schema document could not be parsed at all.
    #[error("malformed schema: {detail}")]
    Malformed { detail: String },

    /// An array declaration with a count that is not a positive integer.
    #[error("field '{field}' has invalid count '{count}', expected a positive integer")]
    InvalidCount { field: String, count: String },

    /// A condition names a switch column that is not part of the sheet.
    #[error("condition on field '{field}' switches on unknown column '{switch}'")]
    UnresolvedSwitch { field: String, switch: String },

    /// Two documents declare the same sheet.
    #[error("duplicate sheet '{name}'")]
    DuplicateSheet { name: String },

    /// An explicit converter override names a kind nobody registered.
    #[error("field '{field}' requests unknown converter '{kind}'")]
    UnknownConverter { field: String, kind: String },

    /// A link-style converter override with nowhere to link to.
    #[error("converter '{kind}' on field '{field}' needs a target sheet")]
    MissingConverterTarget { field: String, kind: String },
}

// ===========================================================================
// Declarations (pre-expansion)
// ===========================================================================

/// Explicit converter selection, as written in a field declaration's
/// `converter` key. Also the export form produced by
/// [`Converter::describe`](crate::convert::Converter::describe).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverterSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub includes_alpha: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cases: BTreeMap<String, Vec<String>>,
}

impl ConverterSpec {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            ..Default::default()
        }
    }
}

/// One field declaration from a schema document, possibly an array with
/// nested declarations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldDecl {
    pub name: Option<String>,
    /// The declared `type`. Absent means `scalar`.
    pub kind: Option<String>,
    /// Repeat count for arrays. Absent means 1.
    pub count: Option<i64>,
    pub fields: Vec<FieldDecl>,
    pub condition: Option<ConditionDecl>,
    pub targets: Vec<String>,
    pub comment: String,
    pub converter: Option<ConverterSpec>,
}

impl FieldDecl {
    /// A named scalar declaration of the given type.
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            kind: Some(kind.to_string()),
            ..Default::default()
        }
    }

    /// A named array declaration repeating `count` times.
    pub fn array(name: &str, count: i64, fields: Vec<FieldDecl>) -> Self {
        Self {
            name: Some(name.to_string()),
            kind: Some("array".to_string()),
            count: Some(count),
            fields,
            ..Default::default()
        }
    }

    pub fn with_targets(mut self, targets: &[&str]) -> Self {
        self.targets = targets.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_condition(mut self, condition: ConditionDecl) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_converter(mut self, converter: ConverterSpec) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn is_array(&self) -> bool {
        self.kind.as_deref() == Some("array")
    }
}

/// A named grouping of fields that share a purpose. Advisory only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationGroup {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// A whole schema document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SheetDecl {
    pub name: String,
    pub display_field: Option<String>,
    pub fields: Vec<FieldDecl>,
    pub relations: Vec<RelationGroup>,
}

// ===========================================================================
// Compiled schema
// ===========================================================================

/// A leaf column of a compiled sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDef {
    /// Position among the flattened leaves; equals the column index.
    pub index: usize,
    /// Dotted/bracketed leaf path, e.g. `Slots[1].Item[0]`.
    pub name: String,
    /// Converter selector. Never `array` after compilation.
    pub type_tag: String,
    pub comment: String,
    pub condition: Option<Condition>,
    pub targets: Vec<String>,
    pub converter: Option<ConverterSpec>,
    /// Nested declarations under a non-array node. Kept for tooling; they
    /// play no part in conversion.
    pub nested: Vec<FieldDecl>,
}

/// An immutable compiled sheet schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetSchema {
    name: String,
    display_field: Option<String>,
    fields: Vec<FieldDef>,
    relations: Vec<RelationGroup>,
    #[serde(skip)]
    name_to_index: HashMap<String, usize>,
}

impl SheetSchema {
    /// Compile a sheet declaration into its flattened, indexed schema.
    pub fn compile(decl: SheetDecl) -> Result<Self, SchemaError> {
        let fields = crate::compile::compile_fields(&decl.fields)?;

        let mut name_to_index = HashMap::with_capacity(fields.len());
        for field in &fields {
            name_to_index.entry(field.name.clone()).or_insert(field.index);
        }

        Ok(Self {
            name: decl.name,
            display_field: decl.display_field.filter(|f| !f.is_empty()),
            fields,
            relations: decl.relations,
            name_to_index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_field(&self) -> Option<&str> {
        self.display_field.as_deref()
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn relations(&self) -> &[RelationGroup] {
        &self.relations
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, index: usize) -> Option<&FieldDef> {
        self.fields.get(index)
    }

    /// Lookup a field's column index by its flattened name. The first field
    /// wins when a schema repeats a name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.field_index(name).and_then(|i| self.fields.get(i))
    }

    /// Column index of the designated display field, if it exists.
    pub fn display_index(&self) -> Option<usize> {
        self.display_field().and_then(|f| self.field_index(f))
    }
}
