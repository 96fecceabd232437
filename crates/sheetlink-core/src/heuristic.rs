//! Heuristic item-reference converters.
//!
//! Special shops store their costs as a small currency code whose meaning
//! depends on the shop: tomestone shops, scrip exchanges and plain item
//! trades all reuse the same numbers. [`ShopCurrencyConverter`] guesses which
//! lookup table applies using an ordered chain of signals:
//!
//! 1. an externally supplied override keyed by the shop's row key,
//! 2. currency code == [`ShopHeuristics::tomestone_code`] => tomestones,
//! 3. shop name contains a scrip marker (case-insensitive) => scrips,
//! 4. the first listing's item has a crafting/gathering UI category => scrips,
//! 5. the first listing's item has a crafting/gathering bonus stat => scrips,
//! 6. currency code below [`ShopHeuristics::special_currency_ceiling`] =>
//!    tomestones,
//! 7. otherwise the code is an item key.
//!
//! The chosen table is consulted first and a miss falls back to the item
//! sheet. The constants are reverse-engineered and carry no authority beyond
//! "this matched the data"; they live in [`ShopHeuristics`] so they can be
//! replaced without touching code.
//!
//! Both lookup tables are built on first use and kept in a [`CurrencyCache`].
//! A [`ConverterRegistry`](crate::registry::ConverterRegistry) hands the same
//! cache to every heuristic converter it builds, so a sheet with many
//! currency columns scans the reward sheet once. Initialisation goes through
//! a [`OnceLock`], so concurrent first calls may race to build but only one
//! result is ever published.

use crate::convert::ConvertContext;
use crate::id::RowKey;
use crate::sheet::{Row, RowRef, SheetCollection};
use crate::value::{RawValue, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Currency code -> item row.
pub type CurrencyIndex = HashMap<i64, RowRef>;

/// Shop row key -> forced classification.
pub type ShopOverrides = HashMap<RowKey, CurrencyTable>;

// ===========================================================================
// Configuration
// ===========================================================================

/// Which lookup table a shop's currency codes index into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyTable {
    Tome,
    Scrip,
    Item,
}

impl FromStr for CurrencyTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "tome" => Ok(CurrencyTable::Tome),
            "scrip" => Ok(CurrencyTable::Scrip),
            "item" => Ok(CurrencyTable::Item),
            other => Err(format!("unknown currency classification '{other}'")),
        }
    }
}

/// A scrip currency code and the item that represents it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScripItem {
    pub code: i64,
    pub item: u32,
}

/// Sheet names, column locations and magic numbers used by the heuristic
/// converters. Every field has a default; a config file may override any
/// subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopHeuristics {
    /// The general item sheet.
    pub item_sheet: String,
    /// Sheet scanned to build the tomestone table.
    pub reward_sheet: String,
    /// Column of `reward_sheet` holding the tomestone currency code.
    pub reward_index_column: usize,
    /// Column of `reward_sheet` linking to the tomestone item.
    pub reward_item_column: String,
    /// Shop column with the display name.
    pub shop_name_column: String,
    /// Shop column holding the first listing's item key.
    pub first_listing_column: usize,
    /// Item column with the UI category.
    pub ui_category_column: String,
    /// Item column with the first bonus stat id.
    pub bonus_stat_column: String,
    pub scrip_name_markers: Vec<String>,
    /// UI categories of crafting and gathering gear.
    pub scrip_ui_categories: Range<i64>,
    /// Craftsmanship, Control, CP, Gathering, Perception, GP.
    pub scrip_bonus_stats: Vec<i64>,
    pub tomestone_code: i64,
    pub special_currency_ceiling: i64,
    /// Scrip codes have no client-side sheet; these are the known items.
    pub scrip_items: Vec<ScripItem>,
}

impl Default for ShopHeuristics {
    fn default() -> Self {
        Self {
            item_sheet: "Item".to_string(),
            reward_sheet: "TomestonesItem".to_string(),
            reward_index_column: 2,
            reward_item_column: "Item".to_string(),
            shop_name_column: "Name".to_string(),
            first_listing_column: 1,
            ui_category_column: "ItemUICategory".to_string(),
            bonus_stat_column: "BaseParam[0]".to_string(),
            scrip_name_markers: ["crafter", "gatherer", "scrip exchange"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            scrip_ui_categories: 12..33,
            scrip_bonus_stats: vec![70, 71, 72, 73, 10, 11],
            tomestone_code: 1,
            special_currency_ceiling: 10,
            scrip_items: vec![
                ScripItem { code: 2, item: 33913 },
                ScripItem { code: 4, item: 33914 },
                ScripItem { code: 6, item: 41784 },
                ScripItem { code: 7, item: 41785 },
            ],
        }
    }
}

// ===========================================================================
// Index builders
// ===========================================================================

/// Scan the reward sheet: every row with a positive currency code maps that
/// code to the item it links to.
pub fn build_tomestone_index(
    collection: &dyn SheetCollection,
    heuristics: &ShopHeuristics,
) -> CurrencyIndex {
    let mut index = CurrencyIndex::new();
    let Some(rewards) = collection.sheet(&heuristics.reward_sheet) else {
        warn!(sheet = %heuristics.reward_sheet, "reward sheet missing, tomestone index is empty");
        return index;
    };
    let items = collection.sheet(&heuristics.item_sheet);

    for row in rewards.rows() {
        let Some(code) = row
            .raw(heuristics.reward_index_column)
            .and_then(|v| v.as_i64())
        else {
            continue;
        };
        if code <= 0 {
            continue;
        }
        let item = row
            .raw_named(&heuristics.reward_item_column)
            .and_then(|v| v.as_row_key())
            .and_then(|key| items.as_ref().and_then(|sheet| sheet.row(key)));
        match item {
            Some(item) => {
                index.insert(code, item);
            }
            None => warn!(reward = %row.key(), code, "tomestone reward links to no item"),
        }
    }

    debug!(entries = index.len(), "built tomestone index");
    index
}

/// Look up the known scrip items.
pub fn build_scrip_index(
    collection: &dyn SheetCollection,
    heuristics: &ShopHeuristics,
) -> CurrencyIndex {
    let mut index = CurrencyIndex::new();
    let Some(items) = collection.sheet(&heuristics.item_sheet) else {
        warn!(sheet = %heuristics.item_sheet, "item sheet missing, scrip index is empty");
        return index;
    };

    for scrip in &heuristics.scrip_items {
        match items.row(RowKey(scrip.item)) {
            Some(row) => {
                index.insert(scrip.code, row);
            }
            None => warn!(code = scrip.code, item = scrip.item, "scrip item not found"),
        }
    }

    debug!(entries = index.len(), "built scrip index");
    index
}

/// Lazily built currency tables. Each table is built from the first
/// collection it is asked about and reused afterwards.
#[derive(Debug, Default)]
pub struct CurrencyCache {
    tomestones: OnceLock<CurrencyIndex>,
    scrips: OnceLock<CurrencyIndex>,
}

impl CurrencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tomestones(
        &self,
        collection: &dyn SheetCollection,
        heuristics: &ShopHeuristics,
    ) -> &CurrencyIndex {
        self.tomestones
            .get_or_init(|| build_tomestone_index(collection, heuristics))
    }

    pub fn scrips(
        &self,
        collection: &dyn SheetCollection,
        heuristics: &ShopHeuristics,
    ) -> &CurrencyIndex {
        self.scrips
            .get_or_init(|| build_scrip_index(collection, heuristics))
    }

    /// Which tables have been built so far: (tomestones, scrips).
    pub fn warm_tables(&self) -> (bool, bool) {
        (self.tomestones.get().is_some(), self.scrips.get().is_some())
    }
}

fn item_row(collection: &dyn SheetCollection, heuristics: &ShopHeuristics, code: i64) -> Value {
    let Some(key) = u32::try_from(code).ok().map(RowKey) else {
        return Value::Absent;
    };
    collection
        .sheet(&heuristics.item_sheet)
        .and_then(|sheet| sheet.row(key))
        .into()
}

// ===========================================================================
// Tomestone-or-item converter
// ===========================================================================

/// Currency code that is either a tomestone code or a plain item key.
#[derive(Debug, Default)]
pub struct TomestoneOrItemReferenceConverter {
    heuristics: Arc<ShopHeuristics>,
    cache: Arc<CurrencyCache>,
}

impl TomestoneOrItemReferenceConverter {
    /// A converter with its own, unshared cache.
    pub fn new(heuristics: Arc<ShopHeuristics>) -> Self {
        Self::with_cache(heuristics, Arc::default())
    }

    pub fn with_cache(heuristics: Arc<ShopHeuristics>, cache: Arc<CurrencyCache>) -> Self {
        Self { heuristics, cache }
    }

    pub fn tomestone_index(&self, collection: &dyn SheetCollection) -> &CurrencyIndex {
        self.cache.tomestones(collection, &self.heuristics)
    }

    pub fn is_warm(&self) -> bool {
        self.cache.warm_tables().0
    }

    pub fn convert(&self, ctx: &ConvertContext<'_>, raw: &RawValue) -> Value {
        let Some(code) = raw.as_i64() else {
            return Value::Absent;
        };
        if let Some(item) = self.tomestone_index(ctx.collection).get(&code) {
            return Value::Row(item.clone());
        }
        item_row(ctx.collection, &self.heuristics, code)
    }
}

// ===========================================================================
// Special shop converter
// ===========================================================================

/// Shop currency code resolved through the heuristic chain described in the
/// module docs.
#[derive(Debug, Default)]
pub struct ShopCurrencyConverter {
    heuristics: Arc<ShopHeuristics>,
    overrides: Option<Arc<ShopOverrides>>,
    cache: Arc<CurrencyCache>,
}

impl ShopCurrencyConverter {
    /// A converter with its own, unshared cache.
    pub fn new(heuristics: Arc<ShopHeuristics>, overrides: Option<Arc<ShopOverrides>>) -> Self {
        Self::with_cache(heuristics, overrides, Arc::default())
    }

    pub fn with_cache(
        heuristics: Arc<ShopHeuristics>,
        overrides: Option<Arc<ShopOverrides>>,
        cache: Arc<CurrencyCache>,
    ) -> Self {
        Self {
            heuristics,
            overrides,
            cache,
        }
    }

    pub fn heuristics(&self) -> &ShopHeuristics {
        &self.heuristics
    }

    pub fn tomestone_index(&self, collection: &dyn SheetCollection) -> &CurrencyIndex {
        self.cache.tomestones(collection, &self.heuristics)
    }

    pub fn scrip_index(&self, collection: &dyn SheetCollection) -> &CurrencyIndex {
        self.cache.scrips(collection, &self.heuristics)
    }

    /// Which tables have been built so far: (tomestones, scrips).
    pub fn warm_tables(&self) -> (bool, bool) {
        self.cache.warm_tables()
    }

    /// Decide which table `code` indexes into for the shop `row`.
    pub fn classify(
        &self,
        collection: &dyn SheetCollection,
        row: &dyn Row,
        code: i64,
    ) -> CurrencyTable {
        let h = &*self.heuristics;

        if let Some(table) = self.overrides.as_ref().and_then(|o| o.get(&row.key())) {
            return *table;
        }
        if code == h.tomestone_code {
            return CurrencyTable::Tome;
        }
        if self.name_marks_scrip(row) {
            return CurrencyTable::Scrip;
        }

        if let Some(item) = self.first_listing_item(collection, row) {
            let category = item
                .raw_named(&h.ui_category_column)
                .and_then(|v| v.as_i64());
            if category.is_some_and(|c| h.scrip_ui_categories.contains(&c)) {
                return CurrencyTable::Scrip;
            }
            let stat = item.raw_named(&h.bonus_stat_column).and_then(|v| v.as_i64());
            if stat.is_some_and(|s| h.scrip_bonus_stats.contains(&s)) {
                return CurrencyTable::Scrip;
            }
        }

        if code < h.special_currency_ceiling {
            return CurrencyTable::Tome;
        }
        CurrencyTable::Item
    }

    fn name_marks_scrip(&self, row: &dyn Row) -> bool {
        let Some(name) = row.raw_named(&self.heuristics.shop_name_column) else {
            return false;
        };
        let name = name.to_string().to_lowercase();
        self.heuristics
            .scrip_name_markers
            .iter()
            .any(|marker| name.contains(&marker.to_lowercase()))
    }

    fn first_listing_item(&self, collection: &dyn SheetCollection, row: &dyn Row) -> Option<RowRef> {
        let key = row
            .raw(self.heuristics.first_listing_column)
            .and_then(|v| v.as_row_key())?;
        collection.sheet(&self.heuristics.item_sheet)?.row(key)
    }

    pub fn convert(&self, ctx: &ConvertContext<'_>, row: &dyn Row, raw: &RawValue) -> Value {
        let Some(code) = raw.as_i64() else {
            return Value::Absent;
        };
        let index = match self.classify(ctx.collection, row, code) {
            CurrencyTable::Tome => Some(self.tomestone_index(ctx.collection)),
            CurrencyTable::Scrip => Some(self.scrip_index(ctx.collection)),
            CurrencyTable::Item => None,
        };
        if let Some(item) = index.and_then(|i| i.get(&code)) {
            return Value::Row(item.clone());
        }
        item_row(ctx.collection, &self.heuristics, code)
    }
}
