//! Compiled sheets bound to their converters, and the set of all of them.

use crate::convert::{ConvertContext, Converter};
use crate::registry::ConverterRegistry;
use crate::schema::{FieldDef, SchemaError, SheetDecl, SheetSchema};
use crate::sheet::Row;
use crate::value::Value;
use std::collections::HashMap;
use tracing::{debug, error};

// ===========================================================================
// SheetDefinition
// ===========================================================================

/// A compiled schema with one converter per field, in column order.
#[derive(Debug)]
pub struct SheetDefinition {
    schema: SheetSchema,
    converters: Vec<Converter>,
}

impl SheetDefinition {
    /// Bind every field of `schema` to its converter.
    pub fn new(schema: SheetSchema, registry: &ConverterRegistry) -> Result<Self, SchemaError> {
        let converters = schema
            .fields()
            .iter()
            .map(|field| registry.converter_for(field))
            .collect::<Result<Vec<_>, SchemaError>>()?;
        Ok(Self { schema, converters })
    }

    /// Compile a declaration and bind its converters.
    pub fn compile(decl: SheetDecl, registry: &ConverterRegistry) -> Result<Self, SchemaError> {
        Self::new(SheetSchema::compile(decl)?, registry)
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &SheetSchema {
        &self.schema
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.schema.field(name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.schema.field_index(name)
    }

    pub fn converter(&self, index: usize) -> Option<&Converter> {
        self.converters.get(index)
    }

    pub fn converters(&self) -> &[Converter] {
        &self.converters
    }

    /// Read column `index` of `row` and convert it. A column the row cannot
    /// supply is absent.
    pub fn value(&self, ctx: &ConvertContext<'_>, row: &dyn Row, index: usize) -> Value {
        let (Some(converter), Some(raw)) = (self.converters.get(index), row.raw(index)) else {
            return Value::Absent;
        };
        converter.convert(ctx, row, raw)
    }

    /// Like [`value`](Self::value), addressing the column by flattened name.
    pub fn value_named(&self, ctx: &ConvertContext<'_>, row: &dyn Row, name: &str) -> Value {
        match self.schema.field_index(name) {
            Some(index) => self.value(ctx, row, index),
            None => Value::Absent,
        }
    }

    /// The converted value of the designated display field.
    pub fn display_value(&self, ctx: &ConvertContext<'_>, row: &dyn Row) -> Value {
        match self.schema.display_index() {
            Some(index) => self.value(ctx, row, index),
            None => Value::Absent,
        }
    }

    /// Run every converter's post-compilation hook.
    pub fn resolve_references(&self) {
        for converter in &self.converters {
            converter.resolve_references(&self.schema);
        }
    }
}

// ===========================================================================
// SchemaSet
// ===========================================================================

/// A sheet (or file) that failed to compile, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaFailure {
    /// Sheet name, or the document path when the name was never read.
    pub source: String,
    pub error: SchemaError,
}

/// Every successfully compiled sheet, plus a record of the ones that were
/// not. One bad sheet never prevents the others from loading.
#[derive(Debug, Default)]
pub struct SchemaSet {
    sheets: HashMap<String, SheetDefinition>,
    failures: Vec<SchemaFailure>,
}

impl SchemaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile many declarations. Failures are logged and recorded; the
    /// first declaration of a sheet name wins.
    pub fn compile_all(decls: Vec<SheetDecl>, registry: &ConverterRegistry) -> Self {
        let mut set = Self::new();
        for (name, result) in compile_each(decls, registry) {
            match result {
                Ok(def) => set.insert_or_record(def),
                Err(e) => set.record_failure(&name, e),
            }
        }
        set
    }

    /// Add a compiled sheet. Rejects a second sheet with the same name.
    pub fn insert(&mut self, def: SheetDefinition) -> Result<(), SchemaError> {
        if self.sheets.contains_key(def.name()) {
            return Err(SchemaError::DuplicateSheet {
                name: def.name().to_string(),
            });
        }
        debug!(sheet = def.name(), fields = def.schema().field_count(), "sheet compiled");
        self.sheets.insert(def.name().to_string(), def);
        Ok(())
    }

    fn insert_or_record(&mut self, def: SheetDefinition) {
        let name = def.name().to_string();
        if let Err(e) = self.insert(def) {
            self.record_failure(&name, e);
        }
    }

    /// Log and keep a failure for the caller.
    pub fn record_failure(&mut self, source: &str, error: SchemaError) {
        error!(source, %error, "schema failed to compile");
        self.failures.push(SchemaFailure {
            source: source.to_string(),
            error,
        });
    }

    pub fn get(&self, name: &str) -> Option<&SheetDefinition> {
        self.sheets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sheets.contains_key(name)
    }

    /// Sheet names in sorted order.
    pub fn sheet_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sheets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn failures(&self) -> &[SchemaFailure] {
        &self.failures
    }

    pub fn iter(&self) -> impl Iterator<Item = &SheetDefinition> {
        self.sheets.values()
    }

    pub fn resolve_references(&self) {
        for def in self.sheets.values() {
            def.resolve_references();
        }
    }
}

#[cfg(not(feature = "parallel"))]
fn compile_each(
    decls: Vec<SheetDecl>,
    registry: &ConverterRegistry,
) -> Vec<(String, Result<SheetDefinition, SchemaError>)> {
    decls
        .into_iter()
        .map(|decl| (decl.name.clone(), SheetDefinition::compile(decl, registry)))
        .collect()
}

// Results come back in input order, so duplicate resolution matches the
// serial path.
#[cfg(feature = "parallel")]
fn compile_each(
    decls: Vec<SheetDecl>,
    registry: &ConverterRegistry,
) -> Vec<(String, Result<SheetDefinition, SchemaError>)> {
    use rayon::prelude::*;

    decls
        .into_par_iter()
        .map(|decl| (decl.name.clone(), SheetDefinition::compile(decl, registry)))
        .collect()
}
