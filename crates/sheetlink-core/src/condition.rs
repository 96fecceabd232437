//! Condition-driven target selection.
//!
//! A conditioned field picks its link targets by reading a sibling column of
//! the same row and looking the formatted value up in a case table. Case
//! keys are compared as plain strings; the switch value is formatted with
//! [`RawValue`]'s `Display`, so integer cases are written in decimal.

use crate::schema::{FieldDef, SchemaError};
use crate::sheet::Row;
use crate::value::RawValue;
use serde::Serialize;
use std::collections::BTreeMap;

/// A condition as declared, before its switch column is resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConditionDecl {
    /// Name of the sibling column whose value selects a case.
    pub switch: String,
    /// Case literal -> ordered target sheet names.
    pub cases: BTreeMap<String, Vec<String>>,
}

impl ConditionDecl {
    pub fn new(switch: &str) -> Self {
        Self {
            switch: switch.to_string(),
            cases: BTreeMap::new(),
        }
    }

    pub fn case(mut self, key: impl ToString, targets: &[&str]) -> Self {
        self.cases.insert(
            key.to_string(),
            targets.iter().map(|t| t.to_string()).collect(),
        );
        self
    }
}

/// A compiled condition whose switch column is known to exist in the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub switch_field: String,
    /// Column index of `switch_field` in the same row.
    pub switch_index: usize,
    pub cases: BTreeMap<String, Vec<String>>,
}

impl Condition {
    /// Resolve a declared condition for the field `field_name`, declared under
    /// `parent` (the dotted chain of enclosing array elements, possibly empty).
    ///
    /// The switch name is tried in the innermost element first, then in each
    /// enclosing element outward, and finally as an absolute field name. A
    /// condition inside `Slot[0].Sub[1]` can therefore switch on
    /// `Slot[0].Sub[1].Type`, `Slot[0].Type` or `Type`.
    pub fn resolve<F>(
        decl: &ConditionDecl,
        field_name: &str,
        parent: &str,
        lookup: F,
    ) -> Result<Self, SchemaError>
    where
        F: Fn(&str) -> Option<usize>,
    {
        let mut scope = parent;
        loop {
            let candidate = if scope.is_empty() {
                decl.switch.clone()
            } else {
                format!("{scope}.{}", decl.switch)
            };
            if let Some(switch_index) = lookup(&candidate) {
                return Ok(Self {
                    switch_field: candidate,
                    switch_index,
                    cases: decl.cases.clone(),
                });
            }
            if scope.is_empty() {
                return Err(SchemaError::UnresolvedSwitch {
                    field: field_name.to_string(),
                    switch: decl.switch.clone(),
                });
            }
            scope = scope.rfind('.').map_or("", |at| &scope[..at]);
        }
    }

    /// The targets selected by `row`, or `None` when the switch column is
    /// unreadable or no case matches.
    pub fn select(&self, row: &dyn Row) -> Option<&[String]> {
        let value = row.raw(self.switch_index)?;
        self.cases.get(&case_key(&value)).map(Vec::as_slice)
    }
}

/// Canonical case-table key for a switch value.
pub fn case_key(value: &RawValue) -> String {
    value.to_string()
}

/// The field's effective link targets for `row`: the matching case if there
/// is one, otherwise the field-level targets. An empty slice means the field
/// resolves to nothing.
pub fn effective_targets<'a>(field: &'a FieldDef, row: &dyn Row) -> &'a [String] {
    field
        .condition
        .as_ref()
        .and_then(|c| c.select(row))
        .unwrap_or(field.targets.as_slice())
}
