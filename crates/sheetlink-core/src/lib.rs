//! Sheetlink Core -- schema compilation and typed value conversion for
//! game data sheets.
//!
//! Game data ships as a few thousand flat tables ("sheets") of raw scalar
//! columns. This crate turns hierarchical schema declarations into flat
//! column layouts, and turns raw column values into typed values: colours,
//! icons, packed quads, and links to rows of other sheets.
//!
//! # Pipeline
//!
//! 1. **Declare** -- a [`schema::SheetDecl`] describes fields, nested arrays,
//!    link targets and conditions (usually loaded by `sheetlink-data`).
//! 2. **Compile** -- [`compile::compile_fields`] flattens the declaration into
//!    one [`schema::FieldDef`] per physical column, with stable names like
//!    `Reward[1].Item` and resolved condition switches.
//! 3. **Bind** -- [`registry::ConverterRegistry`] picks a
//!    [`convert::Converter`] for every field, producing a
//!    [`definition::SheetDefinition`].
//! 4. **Convert** -- [`definition::SheetDefinition::value`] reads a raw column
//!    from a [`sheet::Row`] and runs it through the field's converter.
//!
//! # Key Types
//!
//! - [`schema::SheetSchema`] -- A compiled sheet layout with name lookup.
//! - [`convert::Converter`] -- Closed set of converter variants.
//! - [`condition::Condition`] -- Row-dependent link target selection.
//! - [`heuristic::ShopCurrencyConverter`] -- Shop currency classification
//!   driven by [`heuristic::ShopHeuristics`].
//! - [`definition::SchemaSet`] -- All compiled sheets plus per-sheet failures.
//!
//! Decoding rows from archives and resolving icons to images happen outside
//! this crate, behind the traits in [`sheet`].

pub mod compile;
pub mod condition;
pub mod convert;
pub mod definition;
pub mod heuristic;
pub mod id;
pub mod registry;
pub mod schema;
pub mod sheet;
pub mod value;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
