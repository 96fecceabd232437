//! Type-tag -> converter registry.
//!
//! Converters are chosen once per field, when a sheet is compiled. The order
//! of precedence is:
//!
//! 1. an explicit `converter` override on the field,
//! 2. a `condition` on the field (conditional reference),
//! 3. the field's type tag, looked up in the registry,
//! 4. identity, for any tag nobody registered.

use crate::convert::*;
use crate::heuristic::{
    CurrencyCache, ShopCurrencyConverter, ShopHeuristics, ShopOverrides,
    TomestoneOrItemReferenceConverter,
};
use crate::schema::{ConverterSpec, FieldDef, SchemaError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Builds a converter for a field carrying a registered type tag.
pub type ConverterCtor = fn(&FieldDef) -> Converter;

/// Maps type tags to converter constructors and carries the shared state the
/// heuristic converters need. Every heuristic converter built by one registry
/// shares its currency tables.
pub struct ConverterRegistry {
    by_tag: HashMap<String, ConverterCtor>,
    heuristics: Arc<ShopHeuristics>,
    shop_overrides: Option<Arc<ShopOverrides>>,
    currency_cache: Arc<CurrencyCache>,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&str> = self.by_tag.keys().map(String::as_str).collect();
        tags.sort_unstable();
        f.debug_struct("ConverterRegistry")
            .field("tags", &tags)
            .field("heuristics", &self.heuristics)
            .field("shop_overrides", &self.shop_overrides.as_ref().map(|o| o.len()))
            .field("currency_cache", &self.currency_cache.warm_tables())
            .finish()
    }
}

fn link_converter(field: &FieldDef) -> Converter {
    match field.targets.as_slice() {
        [] => Converter::Generic(GenericReferenceConverter),
        [single] => Converter::SheetLink(SheetLinkConverter::new(single)),
        many => Converter::MultiRef(MultiReferenceConverter::new(many.to_vec())),
    }
}

impl ConverterRegistry {
    /// A registry with the built-in type tags.
    pub fn new() -> Self {
        let mut registry = Self {
            by_tag: HashMap::new(),
            heuristics: Arc::new(ShopHeuristics::default()),
            shop_overrides: None,
            currency_cache: Arc::default(),
        };
        registry.register("scalar", |_| Converter::Scalar);
        registry.register("color", |_| {
            Converter::Color(ColorConverter {
                includes_alpha: false,
            })
        });
        registry.register("icon", |_| Converter::Icon(IconConverter));
        registry.register("modelId", |_| Converter::Quad(QuadConverter));
        registry.register("quad", |_| Converter::Quad(QuadConverter));
        registry.register("link", link_converter);
        registry
    }

    /// Register (or replace) the constructor for a type tag.
    pub fn register(&mut self, tag: &str, ctor: ConverterCtor) -> &mut Self {
        self.by_tag.insert(tag.to_string(), ctor);
        self
    }

    /// Replace the heuristic constants. Tables built under the old ones are
    /// dropped.
    pub fn with_heuristics(mut self, heuristics: ShopHeuristics) -> Self {
        self.heuristics = Arc::new(heuristics);
        self.currency_cache = Arc::default();
        self
    }

    pub fn with_shop_overrides(mut self, overrides: ShopOverrides) -> Self {
        self.shop_overrides = Some(Arc::new(overrides));
        self
    }

    pub fn heuristics(&self) -> &ShopHeuristics {
        &self.heuristics
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.by_tag.contains_key(tag)
    }

    /// Pick the converter for one compiled field.
    pub fn converter_for(&self, field: &FieldDef) -> Result<Converter, SchemaError> {
        if let Some(spec) = &field.converter {
            return self.from_spec(field, spec);
        }
        if let Some(condition) = &field.condition {
            return Ok(Converter::Conditional(ConditionalReferenceConverter {
                condition: condition.clone(),
                fallback: field.targets.clone(),
            }));
        }
        Ok(self
            .by_tag
            .get(&field.type_tag)
            .map_or(Converter::Scalar, |ctor| ctor(field)))
    }

    /// Build the converter an explicit override asks for.
    pub fn from_spec(&self, field: &FieldDef, spec: &ConverterSpec) -> Result<Converter, SchemaError> {
        let converter = match spec.kind.as_str() {
            "scalar" => Converter::Scalar,
            "color" => Converter::Color(ColorConverter {
                includes_alpha: spec.includes_alpha,
            }),
            "icon" => Converter::Icon(IconConverter),
            "quad" | "modelId" => Converter::Quad(QuadConverter),
            "generic" => Converter::Generic(GenericReferenceConverter),
            "link" => {
                let target = spec
                    .target
                    .as_ref()
                    .or_else(|| spec.targets.first())
                    .or_else(|| field.targets.first())
                    .ok_or_else(|| missing_target(field, spec))?;
                Converter::SheetLink(SheetLinkConverter::new(target))
            }
            "multiref" => {
                let targets = if spec.targets.is_empty() {
                    field.targets.clone()
                } else {
                    spec.targets.clone()
                };
                if targets.is_empty() {
                    return Err(missing_target(field, spec));
                }
                Converter::MultiRef(MultiReferenceConverter::new(targets))
            }
            "conditional" => match &field.condition {
                Some(condition) => Converter::Conditional(ConditionalReferenceConverter {
                    condition: condition.clone(),
                    fallback: field.targets.clone(),
                }),
                None => return Err(missing_target(field, spec)),
            },
            "tomestone" => Converter::Tomestone(TomestoneOrItemReferenceConverter::with_cache(
                Arc::clone(&self.heuristics),
                Arc::clone(&self.currency_cache),
            )),
            "specialshop" => Converter::SpecialShop(ShopCurrencyConverter::with_cache(
                Arc::clone(&self.heuristics),
                self.shop_overrides.clone(),
                Arc::clone(&self.currency_cache),
            )),
            other => {
                return Err(SchemaError::UnknownConverter {
                    field: field.name.clone(),
                    kind: other.to_string(),
                });
            }
        };
        Ok(converter)
    }
}

fn missing_target(field: &FieldDef, spec: &ConverterSpec) -> SchemaError {
    SchemaError::MissingConverterTarget {
        field: field.name.clone(),
        kind: spec.kind.clone(),
    }
}
