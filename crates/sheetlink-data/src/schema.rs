//! Serde data file structs for sheet schema and override documents.
//!
//! These structs define the on-disk format. They are deserialized from YAML,
//! JSON, RON, or TOML files and then converted into core declarations by the
//! loader.

use serde::{Deserialize, Serialize};
use sheetlink_core::condition::ConditionDecl;
use sheetlink_core::schema::{ConverterSpec, FieldDecl, RelationGroup, SchemaError, SheetDecl};
use sheetlink_core::value::RawValue;
use std::cmp::Ordering;
use std::collections::BTreeMap;

// ===========================================================================
// Sheet documents
// ===========================================================================

/// One schema document, describing one sheet.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetData {
    pub name: String,
    #[serde(default)]
    pub display_field: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldData>,
    #[serde(default)]
    pub relations: RelationsData,
}

/// A field declaration, possibly an array with nested declarations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub count: Option<CountData>,
    #[serde(default)]
    pub fields: Vec<FieldData>,
    #[serde(default)]
    pub condition: Option<ConditionData>,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub converter: Option<ConverterData>,
}

/// An array repeat count as authored. Anything but a positive integer is
/// rejected when the document is converted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CountData {
    Int(i64),
    Float(f64),
    Text(String),
}

/// A condition: a sibling switch column and a case table.
#[derive(Debug, Clone, Deserialize)]
pub struct ConditionData {
    pub switch: String,
    #[serde(default)]
    pub cases: BTreeMap<CaseKeyData, TargetsData>,
}

/// A case key. YAML and RON documents write integers, booleans or floats;
/// JSON and TOML keys are always strings.
///
/// Keys compare by their canonical form, so `1` and `"01"` are the same case.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CaseKeyData {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// One target sheet, or an ordered list of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TargetsData {
    One(String),
    Many(Vec<String>),
}

/// An explicit converter: either just its kind, or the full object form.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ConverterData {
    Kind(String),
    Spec(ConverterSpec),
}

/// Relation groups, either as a list of `{name, fields}` or as a map from
/// group name to field names. Map groups come out sorted by name.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RelationsData {
    List(Vec<RelationGroup>),
    Map(BTreeMap<String, Vec<String>>),
}

impl Default for RelationsData {
    fn default() -> Self {
        RelationsData::List(Vec::new())
    }
}

// ===========================================================================
// Override documents
// ===========================================================================

/// Per-sheet edits applied to the raw field tree before compilation.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OverrideData {
    #[serde(default)]
    pub replacements: Vec<ReplacementData>,
}

/// Merge every mapping in `add_keys` into each field named `source`, or into
/// each unnamed field when `source` is `*`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplacementData {
    pub source: String,
    #[serde(default)]
    pub add_keys: Vec<serde_yaml::Mapping>,
}

// ===========================================================================
// Conversion into core declarations
// ===========================================================================

impl CaseKeyData {
    /// The key as a switch value would format it: decimal for integers,
    /// `true`/`false` for booleans, shortest round-trip for floats, trimmed
    /// text otherwise. A text key that parses as an integer is normalised
    /// too, so `"01"` and `1` collide.
    pub fn canonical(&self) -> String {
        match self {
            CaseKeyData::Bool(b) => RawValue::Bool(*b).to_string(),
            CaseKeyData::Int(n) => n.to_string(),
            CaseKeyData::Float(f) => RawValue::Float(*f).to_string(),
            CaseKeyData::Text(s) => {
                let s = s.trim();
                s.parse::<i64>().map_or_else(|_| s.to_string(), |n| n.to_string())
            }
        }
    }
}

impl PartialEq for CaseKeyData {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for CaseKeyData {}

impl PartialOrd for CaseKeyData {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CaseKeyData {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical().cmp(&other.canonical())
    }
}

impl TargetsData {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            TargetsData::One(target) => vec![target],
            TargetsData::Many(targets) => targets,
        }
    }
}

impl From<ConditionData> for ConditionDecl {
    fn from(data: ConditionData) -> Self {
        ConditionDecl {
            switch: data.switch,
            cases: data
                .cases
                .into_iter()
                .map(|(key, targets)| (key.canonical(), targets.into_vec()))
                .collect(),
        }
    }
}

impl From<ConverterData> for ConverterSpec {
    fn from(data: ConverterData) -> Self {
        match data {
            ConverterData::Kind(kind) => ConverterSpec::new(&kind),
            ConverterData::Spec(spec) => spec,
        }
    }
}

impl From<RelationsData> for Vec<RelationGroup> {
    fn from(data: RelationsData) -> Self {
        match data {
            RelationsData::List(groups) => groups,
            RelationsData::Map(map) => map
                .into_iter()
                .map(|(name, fields)| RelationGroup { name, fields })
                .collect(),
        }
    }
}

fn count_value(field: &str, count: CountData) -> Result<i64, SchemaError> {
    let invalid = |shown: String| SchemaError::InvalidCount {
        field: field.to_string(),
        count: shown,
    };
    match count {
        CountData::Int(n) => Ok(n),
        CountData::Float(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
            Ok(f as i64)
        }
        CountData::Float(f) => Err(invalid(f.to_string())),
        CountData::Text(s) => s.trim().parse::<i64>().map_err(|_| invalid(s)),
    }
}

impl FieldData {
    /// Convert into a core declaration. Fails on a count that is not an
    /// integer; range checks happen at compile time.
    pub fn into_decl(self) -> Result<FieldDecl, SchemaError> {
        let name = self.name.unwrap_or_default();
        let count = self
            .count
            .map(|c| count_value(&name, c))
            .transpose()?;
        let fields = self
            .fields
            .into_iter()
            .map(FieldData::into_decl)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FieldDecl {
            name: (!name.is_empty()).then_some(name),
            kind: self.kind,
            count,
            fields,
            condition: self.condition.map(ConditionDecl::from),
            targets: self.targets,
            comment: self.comment.unwrap_or_default(),
            converter: self.converter.map(ConverterSpec::from),
        })
    }
}

impl SheetData {
    pub fn into_decl(self) -> Result<SheetDecl, SchemaError> {
        let fields = self
            .fields
            .into_iter()
            .map(FieldData::into_decl)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SheetDecl {
            name: self.name,
            display_field: self.display_field,
            fields,
            relations: self.relations.into(),
        })
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use sheetlink_core::condition::effective_targets;
    use sheetlink_core::schema::SheetSchema;
    use sheetlink_core::test_utils::{MemoryRow, int};

    // -----------------------------------------------------------------------
    // YAML
    // -----------------------------------------------------------------------

    #[test]
    fn parse_yaml_sheet() {
        let yaml = r#"
name: Recipe
displayField: ItemResult
fields:
  - name: Number
  - name: ItemResult
    type: link
    targets: [Item]
  - name: Ingredient
    type: array
    count: 8
    fields:
      - type: link
        targets: [Item]
relations:
  Ingredients: [Ingredient]
"#;
        let data: SheetData = serde_yaml::from_str(yaml).unwrap();
        let decl = data.into_decl().unwrap();
        assert_eq!(decl.name, "Recipe");
        assert_eq!(decl.display_field.as_deref(), Some("ItemResult"));
        assert_eq!(decl.fields.len(), 3);
        assert_eq!(decl.fields[2].count, Some(8));
        assert_eq!(decl.fields[2].fields[0].name, None);
        assert_eq!(decl.relations[0].name, "Ingredients");
        assert_eq!(decl.relations[0].fields, ["Ingredient"]);
    }

    #[test]
    fn yaml_integer_case_keys() {
        let yaml = r#"
name: Quest
fields:
  - name: Type
  - name: Data
    type: link
    condition:
      switch: Type
      cases:
        1: [Action]
        2: [Item, EventItem]
        "3": Status
"#;
        let decl = serde_yaml::from_str::<SheetData>(yaml)
            .unwrap()
            .into_decl()
            .unwrap();
        let cond = decl.fields[1].condition.as_ref().unwrap();
        assert_eq!(cond.switch, "Type");
        assert_eq!(cond.cases["1"], ["Action"]);
        assert_eq!(cond.cases["2"], ["Item", "EventItem"]);
        assert_eq!(cond.cases["3"], ["Status"]);
    }

    #[test]
    fn yaml_bool_and_float_case_keys() {
        let yaml = r#"
name: Quest
fields:
  - name: IsEvent
  - name: Data
    type: link
    condition:
      switch: IsEvent
      cases:
        true: [EventItem]
        false: Item
        2.0: Action
"#;
        let decl = serde_yaml::from_str::<SheetData>(yaml)
            .unwrap()
            .into_decl()
            .unwrap();
        let cond = decl.fields[1].condition.as_ref().unwrap();
        assert_eq!(cond.cases["true"], ["EventItem"]);
        assert_eq!(cond.cases["false"], ["Item"]);
        assert_eq!(cond.cases["2"], ["Action"]);
    }

    #[test]
    fn bool_switched_row_selects_true_case() {
        let yaml = r#"
name: Quest
fields:
  - name: IsEvent
  - name: Data
    type: link
    targets: [Fallback]
    condition:
      switch: IsEvent
      cases:
        true: [EventItem]
        false: [Item]
"#;
        let decl = serde_yaml::from_str::<SheetData>(yaml)
            .unwrap()
            .into_decl()
            .unwrap();
        let schema = SheetSchema::compile(decl).unwrap();
        let field = schema.field("Data").unwrap();

        let row = MemoryRow::new("Quest", 1, &schema, vec![RawValue::Bool(true), int(7)]);
        assert_eq!(effective_targets(field, &row), ["EventItem"]);
        let row = MemoryRow::new("Quest", 2, &schema, vec![RawValue::Bool(false), int(7)]);
        assert_eq!(effective_targets(field, &row), ["Item"]);
    }

    #[test]
    fn case_keys_compare_by_canonical_form() {
        assert_eq!(CaseKeyData::Int(1), CaseKeyData::Text("01".to_string()));
        assert_eq!(CaseKeyData::Float(3.0), CaseKeyData::Int(3));
        assert_ne!(CaseKeyData::Bool(true), CaseKeyData::Text("1".to_string()));
    }

    // -----------------------------------------------------------------------
    // JSON
    // -----------------------------------------------------------------------

    #[test]
    fn parse_json_sheet_with_string_case_keys() {
        let json = r#"{
            "name": "Quest",
            "fields": [
                {"name": "Type"},
                {"name": "Data", "type": "link",
                 "condition": {"switch": "Type", "cases": {"1": ["Action"], " 02 ": "Item"}}}
            ]
        }"#;
        let decl = serde_json::from_str::<SheetData>(json)
            .unwrap()
            .into_decl()
            .unwrap();
        let cond = decl.fields[1].condition.as_ref().unwrap();
        assert_eq!(cond.cases["1"], ["Action"]);
        assert_eq!(cond.cases["2"], ["Item"]);
    }

    #[test]
    fn relations_as_list() {
        let json = r#"{"name": "X", "relations": [{"name": "Group", "fields": ["A", "B"]}]}"#;
        let decl = serde_json::from_str::<SheetData>(json)
            .unwrap()
            .into_decl()
            .unwrap();
        assert_eq!(decl.relations[0].fields, ["A", "B"]);
        assert!(decl.fields.is_empty());
    }

    // -----------------------------------------------------------------------
    // Counts
    // -----------------------------------------------------------------------

    #[test]
    fn count_forms() {
        assert_eq!(count_value("A", CountData::Int(3)).unwrap(), 3);
        assert_eq!(count_value("A", CountData::Float(4.0)).unwrap(), 4);
        assert_eq!(count_value("A", CountData::Text(" 5 ".into())).unwrap(), 5);
    }

    #[test]
    fn non_integer_count_is_rejected() {
        let err = count_value("A", CountData::Float(2.5)).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidCount { ref count, .. } if count == "2.5"));

        let yaml = "name: X\nfields:\n  - name: A\n    type: array\n    count: many\n";
        let err = serde_yaml::from_str::<SheetData>(yaml)
            .unwrap()
            .into_decl()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::InvalidCount {
                field: "A".to_string(),
                count: "many".to_string(),
            }
        );
    }

    // -----------------------------------------------------------------------
    // Converters
    // -----------------------------------------------------------------------

    #[test]
    fn converter_short_and_full_forms() {
        let yaml = r#"
name: SpecialShop
fields:
  - name: Currency
    converter: specialshop
  - name: Tint
    converter:
      type: color
      includesAlpha: true
  - name: Key
    converter:
      type: multiref
      targets: [Quest, Leve]
"#;
        let decl = serde_yaml::from_str::<SheetData>(yaml)
            .unwrap()
            .into_decl()
            .unwrap();
        let kinds: Vec<&ConverterSpec> = decl
            .fields
            .iter()
            .map(|f| f.converter.as_ref().unwrap())
            .collect();
        assert_eq!(kinds[0].kind, "specialshop");
        assert!(kinds[1].includes_alpha);
        assert_eq!(kinds[2].targets, ["Quest", "Leve"]);
    }

    // -----------------------------------------------------------------------
    // Other formats
    // -----------------------------------------------------------------------

    #[test]
    fn parse_ron_sheet() {
        let ron_src = r#"(
            name: "Item",
            displayField: Some("Name"),
            fields: [
                (name: Some("Name")),
                (name: Some("Icon"), comment: Some("ui icon")),
            ],
        )"#;
        let decl = ron::from_str::<SheetData>(ron_src).unwrap().into_decl().unwrap();
        assert_eq!(decl.display_field.as_deref(), Some("Name"));
        assert_eq!(decl.fields[1].comment, "ui icon");
    }

    #[test]
    fn parse_toml_sheet() {
        let toml_src = r#"
name = "Item"
displayField = "Name"

[[fields]]
name = "Name"

[[fields]]
name = "Stats"
type = "array"
count = 2
"#;
        let decl = toml::from_str::<SheetData>(toml_src).unwrap().into_decl().unwrap();
        assert_eq!(decl.fields[1].count, Some(2));
    }

    #[test]
    fn override_document() {
        let yaml = r#"
replacements:
  - source: Currency
    add_keys:
      - converter: specialshop
  - source: "*"
    add_keys:
      - targets: [Item]
"#;
        let data: OverrideData = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(data.replacements.len(), 2);
        assert_eq!(data.replacements[1].source, "*");
        assert_eq!(data.replacements[0].add_keys[0].len(), 1);
    }
}
