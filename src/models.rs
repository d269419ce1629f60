//! Data models for recipes, extractors and production chains

use std::collections::{BTreeMap, BTreeSet};

/// One input of a recipe, consumed at `rate` units/min per building instance
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeInput {
    pub item: String,
    pub rate: f64,
}

/// Secondary output of a recipe, produced proportionally to the primary output
#[derive(Debug, Clone, PartialEq)]
pub struct Byproduct {
    pub item: String,
    pub rate: f64,
}

/// A catalog rule converting input items into one output item via one building.
///
/// All rates are units per minute for a single building instance.
/// Invariant: `output_rate > 0` (enforced at import time).
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub name: String,
    pub output_item: String,
    pub output_rate: f64,
    pub building: String,
    pub power_mw: f64,
    pub inputs: Vec<RecipeInput>,
    pub byproduct: Option<Byproduct>,
}

/// Extraction building for a raw resource, keyed by resource name in the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorDef {
    pub extractor_type: String,
    pub rate: f64,
    pub power_mw: f64,
}

/// How a production node satisfies its required rate
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSource {
    /// Raw resource pulled from the environment. A count of 0 with type
    /// "Manual" means no automated extraction is known.
    Raw {
        extractor: String,
        extractor_count: u32,
    },
    /// Recipe-backed production. `building_count` is fractional, rounded up
    /// to 2 decimals; `actual_output` and `overproduction` are measured
    /// against whole physical buildings.
    Recipe {
        building: String,
        building_count: f64,
        actual_output: f64,
        overproduction: f64,
    },
}

/// Result of resolving one item at a required rate, with its upstream tree.
///
/// The tree is owned by the call that created it and recomputed from scratch
/// on every query; it is never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionNode {
    pub item: String,
    pub required_rate: f64,
    pub source: NodeSource,
    pub power: f64,
    pub children: Vec<ProductionNode>,
    pub byproducts: Vec<ByproductNode>,
}

/// Byproduct attached to a production node; never recursed into
#[derive(Debug, Clone, PartialEq)]
pub struct ByproductNode {
    pub item: String,
    pub rate: f64,
}

/// Classification of a flattened chain row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Raw,
    Processed,
    Byproduct,
}

impl RowKind {
    pub fn label(self) -> &'static str {
        match self {
            RowKind::Raw => "Raw",
            RowKind::Processed => "Processed",
            RowKind::Byproduct => "Byproduct",
        }
    }
}

/// One row of the flattened production chain. `depth` is the number of
/// ancestors and is used purely for indentation.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub item: String,
    pub kind: RowKind,
    pub rate: f64,
    /// Producing building, or `"<building> (Byproduct)"` for byproduct rows
    pub building: Option<String>,
    pub building_count: f64,
    pub extractor: Option<String>,
    pub extractor_count: u32,
    pub power: f64,
    pub overproduction: f64,
    pub depth: usize,
}

/// A manually placed recipe node with an independent multiplier.
///
/// Recipe fields are denormalized from the chosen variant; `count` is
/// user-editable and not derived from any target rate.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedNode {
    pub id: u64,
    pub item: String,
    pub variant_index: usize,
    pub building: Option<String>,
    pub count: f64,
    pub per_output: f64,
    pub inputs: Vec<RecipeInput>,
    pub byproduct: Option<Byproduct>,
    pub power_mw: f64,
}

/// Totals over a flattened chain or a placed-node set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateTotals {
    pub power: f64,
    pub buildings: BTreeMap<String, f64>,
    pub extractors: BTreeMap<String, u32>,
}

impl AggregateTotals {
    /// Combined building and extractor count
    pub fn building_total(&self) -> f64 {
        let buildings: f64 = self.buildings.values().sum();
        let extractors: u32 = self.extractors.values().sum();
        buildings + f64::from(extractors)
    }
}

/// Per-item accounting of everything one producer makes and consumes.
///
/// A producer is every appearance of one produced item in a chain or plan,
/// merged across recipe variants and tree depths.
#[derive(Debug, Clone, PartialEq)]
pub struct ProducerSummary {
    pub item: String,
    pub building_names: BTreeSet<String>,
    pub per_building_output: BTreeMap<String, f64>,
    pub per_building_input: BTreeMap<String, f64>,
    pub total_buildings: f64,
    pub total_power: f64,
    pub total_produced: BTreeMap<String, f64>,
    pub total_consumed: BTreeMap<String, f64>,
}

impl ProducerSummary {
    pub fn new(item: &str) -> Self {
        ProducerSummary {
            item: item.to_string(),
            building_names: BTreeSet::new(),
            per_building_output: BTreeMap::new(),
            per_building_input: BTreeMap::new(),
            total_buildings: 0.0,
            total_power: 0.0,
            total_produced: BTreeMap::new(),
            total_consumed: BTreeMap::new(),
        }
    }

    /// Net per-building rate for `item`. `None` means this producer does not
    /// touch the item at all, which is distinct from a balanced 0.0.
    pub fn net_per_building(&self, item: &str) -> Option<f64> {
        let output = self.per_building_output.get(item);
        let input = self.per_building_input.get(item);
        match (output, input) {
            (None, None) => None,
            (output, input) => {
                Some(output.copied().unwrap_or(0.0) - input.copied().unwrap_or(0.0))
            }
        }
    }

    /// Absolute net flow for `item` across all of this producer's buildings
    pub fn net_total(&self, item: &str) -> Option<f64> {
        let produced = self.total_produced.get(item);
        let consumed = self.total_consumed.get(item);
        match (produced, consumed) {
            (None, None) => None,
            (produced, consumed) => {
                Some(produced.copied().unwrap_or(0.0) - consumed.copied().unwrap_or(0.0))
            }
        }
    }
}

/// Item × producer net-flow table. `items` is the sorted union of every item
/// produced, consumed or emitted as a byproduct; `column_sums` reconcile with
/// the chain's actual net surplus or deficit per item.
#[derive(Debug, Clone, PartialEq)]
pub struct NetMatrix {
    pub producers: BTreeMap<String, ProducerSummary>,
    pub items: Vec<String>,
    pub column_sums: BTreeMap<String, f64>,
}
