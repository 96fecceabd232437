//! Value converters: raw column scalar in, resolved [`Value`] out.
//!
//! Every field of a compiled sheet is bound to exactly one [`Converter`].
//! Identity-style converters (color, icon, quad, links) are stateless; the
//! heuristic item converters in [`crate::heuristic`] build a cross-sheet
//! index on first use and keep it for their lifetime.
//!
//! Conversion never fails. A reference that finds nothing, or a raw value of
//! the wrong shape for a reference, yields [`Value::Absent`].

use crate::condition::Condition;
use crate::heuristic::{ShopCurrencyConverter, TomestoneOrItemReferenceConverter};
use crate::id::RowKey;
use crate::schema::{ConverterSpec, SheetSchema};
use crate::sheet::{IconResolver, NoIcons, Row, RowRef, SheetCollection};
use crate::value::{Language, RawValue, Value};

/// Largest icon id the client ships.
pub const MAX_ICON_ID: i64 = 999_999;

// ---------------------------------------------------------------------------
// Conversion context
// ---------------------------------------------------------------------------

/// Everything a converter may consult besides the row itself.
#[derive(Clone, Copy)]
pub struct ConvertContext<'a> {
    pub collection: &'a dyn SheetCollection,
    pub icons: &'a dyn IconResolver,
    pub language: Language,
}

impl<'a> ConvertContext<'a> {
    /// A context without icon resolution, in the default language.
    pub fn new(collection: &'a dyn SheetCollection) -> Self {
        Self {
            collection,
            icons: &NoIcons,
            language: Language::default(),
        }
    }

    pub fn with_icons(mut self, icons: &'a dyn IconResolver) -> Self {
        self.icons = icons;
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }
}

// ---------------------------------------------------------------------------
// Stateless converters
// ---------------------------------------------------------------------------

/// 32-bit ARGB color. Without alpha the high byte is forced opaque.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorConverter {
    pub includes_alpha: bool,
}

impl ColorConverter {
    pub fn convert(&self, raw: RawValue) -> Value {
        let Some(bits) = raw.as_bits() else {
            return Value::Scalar(raw);
        };
        let mut argb = bits as u32;
        if !self.includes_alpha {
            argb |= 0xFF00_0000;
        }
        Value::Color(argb)
    }
}

/// Icon id resolved through the external image capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IconConverter;

impl IconConverter {
    pub fn convert(&self, ctx: &ConvertContext<'_>, raw: &RawValue) -> Value {
        match raw.as_i64() {
            Some(id) if id > 0 && id <= MAX_ICON_ID => ctx
                .icons
                .resolve_icon(id as u32, ctx.language)
                .map_or(Value::Absent, Value::Icon),
            _ => Value::Absent,
        }
    }
}

/// Four packed 16-bit values, passed through as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuadConverter;

impl QuadConverter {
    pub fn convert(&self, raw: RawValue) -> Value {
        match raw.as_bits() {
            Some(q) => Value::Quad(q),
            None => Value::Scalar(raw),
        }
    }
}

/// A key that may point into any sheet; the collection decides where.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenericReferenceConverter;

impl GenericReferenceConverter {
    pub fn convert(&self, ctx: &ConvertContext<'_>, raw: &RawValue) -> Value {
        raw.as_row_key()
            .and_then(|key| ctx.collection.find_reference(key))
            .into()
    }
}

/// A key into one named sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLinkConverter {
    pub target_sheet: String,
}

impl SheetLinkConverter {
    pub fn new(target_sheet: &str) -> Self {
        Self {
            target_sheet: target_sheet.to_string(),
        }
    }

    pub fn convert(&self, ctx: &ConvertContext<'_>, raw: &RawValue) -> Value {
        if !ctx.collection.sheet_exists(&self.target_sheet) {
            return Value::Absent;
        }
        let Some(key) = raw.as_row_key() else {
            return Value::Absent;
        };
        ctx.collection
            .sheet(&self.target_sheet)
            .and_then(|sheet| sheet.row(key))
            .into()
    }
}

/// A key into the first of several candidate sheets that holds it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiReferenceConverter {
    pub targets: Vec<String>,
}

impl MultiReferenceConverter {
    pub fn new(targets: Vec<String>) -> Self {
        Self { targets }
    }

    pub fn convert(&self, ctx: &ConvertContext<'_>, raw: &RawValue) -> Value {
        raw.as_row_key()
            .and_then(|key| first_match(ctx.collection, &self.targets, key))
            .into()
    }
}

/// Look `key` up in each target sheet in order and return the first hit.
///
/// A sheet whose data files cannot hold the key is skipped without a keyed
/// lookup. Missing sheets are skipped. Earlier targets win.
pub fn first_match(
    collection: &dyn SheetCollection,
    targets: &[String],
    key: RowKey,
) -> Option<RowRef> {
    targets.iter().find_map(|target| {
        let sheet = collection.sheet(target)?;
        if !sheet.in_data_range(key) {
            return None;
        }
        sheet.row(key)
    })
}

/// A reference whose target sheets depend on a sibling column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalReferenceConverter {
    pub condition: Condition,
    /// Targets used when no case matches.
    pub fallback: Vec<String>,
}

impl ConditionalReferenceConverter {
    pub fn convert(&self, ctx: &ConvertContext<'_>, row: &dyn Row, raw: &RawValue) -> Value {
        let targets = self.condition.select(row).unwrap_or(self.fallback.as_slice());
        if targets.is_empty() {
            return Value::Absent;
        }
        raw.as_row_key()
            .and_then(|key| first_match(ctx.collection, targets, key))
            .into()
    }
}

// ---------------------------------------------------------------------------
// Converter enum
// ---------------------------------------------------------------------------

/// Top-level converter enum. Dispatches via enum match (no trait objects).
#[derive(Debug, Default)]
pub enum Converter {
    /// Identity: the raw scalar, untouched.
    #[default]
    Scalar,
    Color(ColorConverter),
    Icon(IconConverter),
    Quad(QuadConverter),
    Generic(GenericReferenceConverter),
    SheetLink(SheetLinkConverter),
    MultiRef(MultiReferenceConverter),
    Conditional(ConditionalReferenceConverter),
    Tomestone(TomestoneOrItemReferenceConverter),
    SpecialShop(ShopCurrencyConverter),
}

impl Converter {
    /// Convert one raw column value read from `row`.
    pub fn convert(&self, ctx: &ConvertContext<'_>, row: &dyn Row, raw: RawValue) -> Value {
        match self {
            Converter::Scalar => Value::Scalar(raw),
            Converter::Color(c) => c.convert(raw),
            Converter::Icon(c) => c.convert(ctx, &raw),
            Converter::Quad(c) => c.convert(raw),
            Converter::Generic(c) => c.convert(ctx, &raw),
            Converter::SheetLink(c) => c.convert(ctx, &raw),
            Converter::MultiRef(c) => c.convert(ctx, &raw),
            Converter::Conditional(c) => c.convert(ctx, row, &raw),
            Converter::Tomestone(c) => c.convert(ctx, &raw),
            Converter::SpecialShop(c) => c.convert(ctx, row, &raw),
        }
    }

    /// Post-compilation hook for binding symbolic target names against the
    /// owning sheet's schema. No converter needs it yet.
    pub fn resolve_references(&self, _schema: &SheetSchema) {}

    /// Name of the type this converter produces, for introspection.
    pub fn target_type_name(&self) -> &str {
        match self {
            Converter::Scalar => "Scalar",
            Converter::Color(_) => "Color",
            Converter::Icon(_) => "Image",
            Converter::Quad(_) => "Quad",
            Converter::Generic(_) | Converter::MultiRef(_) | Converter::Conditional(_) => "Row",
            Converter::SheetLink(c) => &c.target_sheet,
            Converter::Tomestone(_) | Converter::SpecialShop(_) => "Item",
        }
    }

    /// Serializable description, in the same shape as a field's `converter`
    /// override.
    pub fn describe(&self) -> ConverterSpec {
        match self {
            Converter::Scalar => ConverterSpec::new("scalar"),
            Converter::Color(c) => ConverterSpec {
                includes_alpha: c.includes_alpha,
                ..ConverterSpec::new("color")
            },
            Converter::Icon(_) => ConverterSpec::new("icon"),
            Converter::Quad(_) => ConverterSpec::new("quad"),
            Converter::Generic(_) => ConverterSpec::new("generic"),
            Converter::SheetLink(c) => ConverterSpec {
                target: Some(c.target_sheet.clone()),
                ..ConverterSpec::new("link")
            },
            Converter::MultiRef(c) => ConverterSpec {
                targets: c.targets.clone(),
                ..ConverterSpec::new("multiref")
            },
            Converter::Conditional(c) => ConverterSpec {
                targets: c.fallback.clone(),
                switch: Some(c.condition.switch_field.clone()),
                cases: c.condition.cases.clone(),
                ..ConverterSpec::new("conditional")
            },
            Converter::Tomestone(_) => ConverterSpec::new("tomestone"),
            Converter::SpecialShop(_) => ConverterSpec::new("specialshop"),
        }
    }

    /// Whether this converter keeps a lazily-built index.
    pub fn is_stateful(&self) -> bool {
        matches!(self, Converter::Tomestone(_) | Converter::SpecialShop(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    fn collection() -> MemoryCollection {
        MemoryCollection::new()
            .with_sheet(
                MemorySheet::new("A", &["Name"])
                    .with_row(1, vec![text("a1")])
                    .with_row(2, vec![text("a2")]),
            )
            .with_sheet(
                MemorySheet::new("B", &["Name"])
                    .with_row(2, vec![text("b2")])
                    .with_row(7, vec![text("b7")]),
            )
            .with_sheet(MemorySheet::new("Item", &["Name"]).with_row(5, vec![text("Potion")]))
    }

    fn row() -> MemoryRow {
        MemoryRow::bare("Source", 0, vec![])
    }

    #[test]
    fn color_without_alpha_is_opaque() {
        let c = ColorConverter { includes_alpha: false };
        assert_eq!(c.convert(RawValue::Int(0x0011_2233)).as_color(), Some(0xFF11_2233));
    }

    #[test]
    fn color_with_alpha_is_untouched() {
        let c = ColorConverter { includes_alpha: true };
        assert_eq!(c.convert(RawValue::Int(0x0011_2233)).as_color(), Some(0x0011_2233));
    }

    #[test]
    fn color_from_negative_signed_column() {
        let c = ColorConverter { includes_alpha: true };
        assert_eq!(c.convert(RawValue::Int(-1)).as_color(), Some(0xFFFF_FFFF));
    }

    #[test]
    fn quad_is_identity() {
        let v = QuadConverter.convert(RawValue::UInt(0x0001_0002_0003_0004));
        assert_eq!(v.as_quad(), Some(0x0001_0002_0003_0004));
    }

    #[test]
    fn icon_bounds() {
        let coll = collection();
        let icons = RecordingIcons::default();
        let ctx = ConvertContext::new(&coll).with_icons(&icons);

        assert!(IconConverter.convert(&ctx, &RawValue::Int(0)).is_absent());
        assert!(IconConverter.convert(&ctx, &RawValue::Int(1_000_000)).is_absent());
        assert!(IconConverter.convert(&ctx, &RawValue::Int(-4)).is_absent());
        assert!(icons.calls().is_empty());

        let v = IconConverter.convert(&ctx, &RawValue::Int(500));
        assert_eq!(v.as_icon().map(|h| h.id), Some(500));
        assert_eq!(icons.calls(), [(500, Language::English)]);
    }

    #[test]
    fn icon_uses_active_language() {
        let coll = collection();
        let icons = RecordingIcons::default();
        let ctx = ConvertContext::new(&coll)
            .with_icons(&icons)
            .with_language(Language::Japanese);
        IconConverter.convert(&ctx, &RawValue::Int(999_999));
        assert_eq!(icons.calls(), [(999_999, Language::Japanese)]);
    }

    #[test]
    fn sheet_link_hit_and_miss() {
        let coll = collection();
        let ctx = ConvertContext::new(&coll);
        let link = SheetLinkConverter::new("Item");

        let hit = link.convert(&ctx, &RawValue::Int(5));
        assert_eq!(hit.row_identity(), Some(("Item", RowKey(5))));

        assert!(link.convert(&ctx, &RawValue::Int(6)).is_absent());
        assert!(link.convert(&ctx, &RawValue::Int(-1)).is_absent());
    }

    #[test]
    fn sheet_link_to_missing_sheet_is_absent() {
        let coll = collection();
        let ctx = ConvertContext::new(&coll);
        let link = SheetLinkConverter::new("Nowhere");
        assert!(link.convert(&ctx, &RawValue::Int(1)).is_absent());
    }

    #[test]
    fn multiref_first_target_wins() {
        let coll = collection();
        let ctx = ConvertContext::new(&coll);
        let multi = MultiReferenceConverter::new(vec!["A".into(), "B".into()]);

        let v = multi.convert(&ctx, &RawValue::Int(2));
        assert_eq!(v.row_identity(), Some(("A", RowKey(2))));

        let v = multi.convert(&ctx, &RawValue::Int(7));
        assert_eq!(v.row_identity(), Some(("B", RowKey(7))));

        assert!(multi.convert(&ctx, &RawValue::Int(99)).is_absent());
    }

    #[test]
    fn multiref_skips_sheets_whose_ranges_exclude_key() {
        // Key 3 sits inside A's map but outside its declared data ranges.
        let coll = MemoryCollection::new()
            .with_sheet(
                MemorySheet::new("A", &["Name"])
                    .with_row(3, vec![text("hidden")])
                    .with_ranges(vec![0..2]),
            )
            .with_sheet(MemorySheet::new("B", &["Name"]).with_row(3, vec![text("b3")]));
        let ctx = ConvertContext::new(&coll);
        let multi = MultiReferenceConverter::new(vec!["A".into(), "B".into()]);
        let v = multi.convert(&ctx, &RawValue::Int(3));
        assert_eq!(v.row_identity(), Some(("B", RowKey(3))));
    }

    #[test]
    fn multiref_skips_missing_sheets() {
        let coll = collection();
        let ctx = ConvertContext::new(&coll);
        let multi = MultiReferenceConverter::new(vec!["Gone".into(), "B".into()]);
        assert_eq!(
            multi.convert(&ctx, &RawValue::Int(7)).row_identity(),
            Some(("B", RowKey(7)))
        );
    }

    #[test]
    fn generic_delegates_to_collection() {
        let coll = collection();
        let ctx = ConvertContext::new(&coll);
        let v = GenericReferenceConverter.convert(&ctx, &RawValue::Int(7));
        assert_eq!(v.row_identity(), Some(("B", RowKey(7))));
        assert!(GenericReferenceConverter.convert(&ctx, &RawValue::Int(404)).is_absent());
    }

    #[test]
    fn scalar_is_identity() {
        let coll = collection();
        let ctx = ConvertContext::new(&coll);
        let v = Converter::Scalar.convert(&ctx, &row(), RawValue::from("text"));
        assert_eq!(v.as_scalar(), Some(&RawValue::from("text")));
    }

    #[test]
    fn repeated_conversion_is_stable() {
        let coll = collection();
        let ctx = ConvertContext::new(&coll);
        let conv = Converter::MultiRef(MultiReferenceConverter::new(vec!["A".into(), "B".into()]));
        let first = conv.convert(&ctx, &row(), RawValue::Int(7));
        let second = conv.convert(&ctx, &row(), RawValue::Int(7));
        assert_eq!(first.row_identity(), second.row_identity());
    }

    #[test]
    fn descriptors() {
        assert_eq!(Converter::Icon(IconConverter).target_type_name(), "Image");
        let link = Converter::SheetLink(SheetLinkConverter::new("Item"));
        assert_eq!(link.target_type_name(), "Item");
        assert_eq!(link.describe().target.as_deref(), Some("Item"));

        let color = Converter::Color(ColorConverter { includes_alpha: true }).describe();
        assert_eq!(color.kind, "color");
        assert!(color.includes_alpha);
        assert!(!Converter::Scalar.is_stateful());
    }
}
