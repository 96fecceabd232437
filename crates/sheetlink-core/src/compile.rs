//! Field tree compiler.
//!
//! Expands nested/array field declarations into a flat, ordered list of leaf
//! fields. Declared order is preserved; arrays are expanded element by
//! element in ascending index order. Leaf names join the chain of enclosing
//! array elements with dots: `Slots[1].Item[0]`.

use crate::condition::{Condition, ConditionDecl};
use crate::schema::{FieldDecl, FieldDef, SchemaError};
use std::collections::HashMap;

/// A leaf awaiting condition resolution.
struct PendingLeaf {
    def: FieldDef,
    parent: String,
    condition: Option<ConditionDecl>,
}

/// Flatten `decls` into indexed leaf fields.
pub fn compile_fields(decls: &[FieldDecl]) -> Result<Vec<FieldDef>, SchemaError> {
    let mut pending = Vec::new();
    for decl in decls {
        expand(decl, &[], &mut pending)?;
    }

    for (i, leaf) in pending.iter_mut().enumerate() {
        leaf.def.index = i;
    }

    // Conditions can point at columns declared later, so resolve them only
    // once every leaf has its final name and index.
    let mut by_name: HashMap<&str, usize> = HashMap::with_capacity(pending.len());
    for leaf in &pending {
        by_name.entry(leaf.def.name.as_str()).or_insert(leaf.def.index);
    }
    let resolved = pending
        .iter()
        .map(|leaf| match &leaf.condition {
            Some(decl) => Condition::resolve(decl, &leaf.def.name, &leaf.parent, |name| {
                by_name.get(name).copied()
            })
            .map(Some),
            None => Ok(None),
        })
        .collect::<Result<Vec<_>, SchemaError>>()?;

    Ok(pending
        .into_iter()
        .zip(resolved)
        .map(|(leaf, condition)| FieldDef {
            condition,
            ..leaf.def
        })
        .collect())
}

/// Effective repeat count of an array declaration.
fn array_count(decl: &FieldDecl) -> Result<usize, SchemaError> {
    match decl.count {
        None => Ok(1),
        Some(n) if n > 0 => usize::try_from(n).map_err(|_| invalid_count(decl, n)),
        Some(n) => Err(invalid_count(decl, n)),
    }
}

fn invalid_count(decl: &FieldDecl, count: i64) -> SchemaError {
    SchemaError::InvalidCount {
        field: decl.name.clone().unwrap_or_default(),
        count: count.to_string(),
    }
}

fn expand(
    decl: &FieldDecl,
    chain: &[String],
    out: &mut Vec<PendingLeaf>,
) -> Result<(), SchemaError> {
    if !decl.is_array() {
        out.push(leaf(decl, None, chain));
        return Ok(());
    }

    let count = array_count(decl)?;
    if decl.fields.is_empty() {
        for i in 0..count {
            out.push(leaf(decl, Some(i), chain));
        }
        return Ok(());
    }

    let base = decl.name.as_deref().unwrap_or_default();
    for i in 0..count {
        let mut element_chain = chain.to_vec();
        element_chain.push(format!("{base}[{i}]"));
        for nested in &decl.fields {
            expand(nested, &element_chain, out)?;
        }
    }
    Ok(())
}

fn leaf(decl: &FieldDecl, element: Option<usize>, chain: &[String]) -> PendingLeaf {
    let type_tag = match decl.kind.as_deref() {
        None | Some("array") => "scalar".to_string(),
        Some(kind) => kind.to_string(),
    };
    // Array replicas are scalars; only a plain node keeps its nested
    // declarations, as metadata.
    let nested = if decl.is_array() {
        Vec::new()
    } else {
        decl.fields.clone()
    };

    PendingLeaf {
        def: FieldDef {
            index: 0,
            name: leaf_name(decl.name.as_deref(), element, chain),
            type_tag,
            comment: decl.comment.clone(),
            condition: None,
            targets: decl.targets.clone(),
            converter: decl.converter.clone(),
            nested,
        },
        parent: chain.join("."),
        condition: decl.condition.clone(),
    }
}

fn leaf_name(base: Option<&str>, element: Option<usize>, chain: &[String]) -> String {
    let own = match (base, element) {
        (base, Some(i)) => Some(format!("{}[{i}]", base.unwrap_or_default())),
        (base, None) => base.map(str::to_owned),
    };
    match own {
        Some(own) if chain.is_empty() => own,
        Some(own) => format!("{}.{own}", chain.join(".")),
        None => chain.join("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ConverterSpec;

    fn names(fields: &[FieldDef]) -> Vec<&str> {
        fields.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn scalars_keep_declared_order() {
        let fields = compile_fields(&[
            FieldDecl::new("Name", "scalar"),
            FieldDecl::new("Icon", "icon"),
            FieldDecl::new("Color", "color"),
        ])
        .unwrap();
        assert_eq!(names(&fields), ["Name", "Icon", "Color"]);
        assert_eq!(fields[1].type_tag, "icon");
        assert_eq!(fields[2].index, 2);
    }

    #[test]
    fn scalar_array_repeats_count_times() {
        let fields = compile_fields(&[FieldDecl::array("Ingredient", 3, vec![])]).unwrap();
        assert_eq!(names(&fields), ["Ingredient[0]", "Ingredient[1]", "Ingredient[2]"]);
        assert!(fields.iter().all(|f| f.type_tag == "scalar"));
        assert_eq!(
            fields.iter().map(|f| f.index).collect::<Vec<_>>(),
            [0, 1, 2]
        );
    }

    #[test]
    fn missing_count_defaults_to_one() {
        let mut decl = FieldDecl::array("Single", 1, vec![]);
        decl.count = None;
        let fields = compile_fields(&[decl]).unwrap();
        assert_eq!(names(&fields), ["Single[0]"]);
    }

    #[test]
    fn nested_array_expands_per_element() {
        let fields = compile_fields(&[FieldDecl::array(
            "Stats",
            2,
            vec![FieldDecl::new("X", "scalar")],
        )])
        .unwrap();
        assert_eq!(names(&fields), ["Stats[0].X", "Stats[1].X"]);
        assert_eq!(fields[0].index, 0);
        assert_eq!(fields[1].index, 1);
    }

    #[test]
    fn doubly_nested_arrays() {
        let fields = compile_fields(&[
            FieldDecl::new("Id", "scalar"),
            FieldDecl::array(
                "Slots",
                2,
                vec![
                    FieldDecl::array("Item", 2, vec![]).with_targets(&["Item"]),
                    FieldDecl::new("Count", "scalar"),
                ],
            ),
        ])
        .unwrap();
        assert_eq!(
            names(&fields),
            [
                "Id",
                "Slots[0].Item[0]",
                "Slots[0].Item[1]",
                "Slots[0].Count",
                "Slots[1].Item[0]",
                "Slots[1].Item[1]",
                "Slots[1].Count",
            ]
        );
        assert_eq!(fields[4].targets, ["Item"]);
        assert_eq!(fields[6].index, 6);
    }

    #[test]
    fn anonymous_element_takes_parent_name() {
        let fields = compile_fields(&[FieldDecl::array(
            "Item",
            2,
            vec![FieldDecl {
                kind: Some("link".to_string()),
                targets: vec!["Item".to_string()],
                ..Default::default()
            }],
        )])
        .unwrap();
        assert_eq!(names(&fields), ["Item[0]", "Item[1]"]);
        assert_eq!(fields[0].type_tag, "link");
    }

    #[test]
    fn array_without_nested_fields_degenerates_to_scalars() {
        let decl = FieldDecl::array("Param", 2, vec![]);
        let fields = compile_fields(&[decl]).unwrap();
        assert_eq!(fields.len(), 2);
        assert!(fields.iter().all(|f| f.nested.is_empty()));
    }

    #[test]
    fn plain_node_keeps_nested_declarations_as_metadata() {
        let mut decl = FieldDecl::new("Packed", "scalar");
        decl.fields = vec![FieldDecl::new("Low", "scalar"), FieldDecl::new("High", "scalar")];
        let fields = compile_fields(&[decl]).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].nested.len(), 2);
    }

    #[test]
    fn untyped_declaration_is_scalar() {
        let decl = FieldDecl {
            name: Some("Unk".to_string()),
            ..Default::default()
        };
        let fields = compile_fields(&[decl]).unwrap();
        assert_eq!(fields[0].type_tag, "scalar");
    }

    #[test]
    fn zero_count_is_rejected() {
        let err = compile_fields(&[FieldDecl::array("Bad", 0, vec![])]).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidCount { ref field, ref count } if field == "Bad" && count == "0"));
    }

    #[test]
    fn negative_count_in_nested_array_is_rejected() {
        let decl = FieldDecl::array("Outer", 2, vec![FieldDecl::array("Inner", -1, vec![])]);
        assert!(matches!(
            compile_fields(&[decl]),
            Err(SchemaError::InvalidCount { .. })
        ));
    }

    #[test]
    fn conditions_resolve_within_array_elements() {
        let fields = compile_fields(&[FieldDecl::array(
            "Reward",
            2,
            vec![
                FieldDecl::new("Type", "scalar"),
                FieldDecl::new("Id", "link")
                    .with_condition(ConditionDecl::new("Type").case(1, &["Item"])),
            ],
        )])
        .unwrap();
        let second = &fields[3];
        assert_eq!(second.name, "Reward[1].Id");
        let cond = second.condition.as_ref().unwrap();
        assert_eq!(cond.switch_field, "Reward[1].Type");
        assert_eq!(cond.switch_index, 2);
    }

    #[test]
    fn condition_in_inner_array_switches_on_outer_element() {
        let fields = compile_fields(&[FieldDecl::array(
            "Slot",
            2,
            vec![
                FieldDecl::new("Type", "scalar"),
                FieldDecl::array(
                    "Sub",
                    2,
                    vec![FieldDecl::new("Id", "link")
                        .with_condition(ConditionDecl::new("Type").case(1, &["Item"]))],
                ),
            ],
        )])
        .unwrap();
        assert_eq!(
            names(&fields),
            [
                "Slot[0].Type",
                "Slot[0].Sub[0].Id",
                "Slot[0].Sub[1].Id",
                "Slot[1].Type",
                "Slot[1].Sub[0].Id",
                "Slot[1].Sub[1].Id",
            ]
        );
        let cond = fields[5].condition.as_ref().unwrap();
        assert_eq!(cond.switch_field, "Slot[1].Type");
        assert_eq!(cond.switch_index, 3);
        assert_eq!(fields[1].condition.as_ref().unwrap().switch_index, 0);
    }

    #[test]
    fn condition_may_reference_later_column() {
        let fields = compile_fields(&[
            FieldDecl::new("Data", "link").with_condition(ConditionDecl::new("Type")),
            FieldDecl::new("Type", "scalar"),
        ])
        .unwrap();
        assert_eq!(fields[0].condition.as_ref().unwrap().switch_index, 1);
    }

    #[test]
    fn unresolved_switch_fails_compilation() {
        let result = compile_fields(&[
            FieldDecl::new("Data", "link").with_condition(ConditionDecl::new("Missing")),
        ]);
        assert!(matches!(result, Err(SchemaError::UnresolvedSwitch { .. })));
    }

    #[test]
    fn converter_override_survives_expansion() {
        let fields = compile_fields(&[FieldDecl::array(
            "Currency",
            2,
            vec![FieldDecl::new("Cost", "scalar").with_converter(ConverterSpec::new("specialshop"))],
        )])
        .unwrap();
        assert!(fields.iter().all(|f| f.converter.as_ref().unwrap().kind == "specialshop"));
    }
}
