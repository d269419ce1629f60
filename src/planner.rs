//! Manual planner: user-placed recipe nodes with independent multipliers
//!
//! Unlike the chain calculator there is no target rate here; every node
//! carries its own count and the interesting output is the net per-item
//! balance across the whole set.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::catalog::Catalog;
use crate::models::PlacedNode;

/// One entry of a plan input file: which item to place, which recipe
/// variant to use and how many buildings to run
#[derive(Debug, Clone, Deserialize)]
pub struct PlanEntry {
    pub item: String,
    #[serde(default)]
    pub variant: usize,
    #[serde(default = "default_count")]
    pub count: f64,
}

fn default_count() -> f64 {
    1.0
}

/// A flat, user-managed set of placed recipe nodes
#[derive(Debug, Default)]
pub struct Plan {
    nodes: Vec<PlacedNode>,
    next_id: u64,
}

impl Plan {
    pub fn new() -> Self {
        Plan {
            nodes: Vec::new(),
            next_id: 1,
        }
    }

    pub fn nodes(&self) -> &[PlacedNode] {
        &self.nodes
    }

    /// Build a plan from parsed file entries
    pub fn from_entries(entries: &[PlanEntry], catalog: &Catalog) -> Plan {
        let mut plan = Plan::new();
        for entry in entries {
            let id = plan.add(&entry.item, catalog);
            plan.set_variant(id, entry.variant, catalog);
            plan.set_count(id, entry.count);
        }
        plan
    }

    /// Place a node for `item` using its default (first) recipe variant.
    /// Items without any recipe become variant-less nodes producing nothing.
    pub fn add(&mut self, item: &str, catalog: &Catalog) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let mut node = PlacedNode {
            id,
            item: item.to_string(),
            variant_index: 0,
            building: None,
            count: 1.0,
            per_output: 0.0,
            inputs: Vec::new(),
            byproduct: None,
            power_mw: 0.0,
        };
        apply_variant(&mut node, catalog);
        self.nodes.push(node);
        id
    }

    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|node| node.id != id);
        self.nodes.len() != before
    }

    /// Set a node's multiplier; fractional values are allowed, negatives
    /// clamp to zero
    pub fn set_count(&mut self, id: u64, count: f64) -> bool {
        match self.nodes.iter_mut().find(|node| node.id == id) {
            Some(node) => {
                node.count = count.max(0.0);
                true
            }
            None => false,
        }
    }

    /// Switch a node to another recipe variant, re-deriving its building,
    /// rates, byproduct and power. Out-of-range indices leave the node as is.
    pub fn set_variant(&mut self, id: u64, variant: usize, catalog: &Catalog) -> bool {
        match self.nodes.iter_mut().find(|node| node.id == id) {
            Some(node) => {
                if catalog.variants(&node.item).get(variant).is_some() {
                    node.variant_index = variant;
                    apply_variant(node, catalog);
                }
                true
            }
            None => false,
        }
    }
}

fn apply_variant(node: &mut PlacedNode, catalog: &Catalog) {
    let Some(recipe) = catalog.variants(&node.item).get(node.variant_index) else {
        return;
    };
    node.building = Some(recipe.building.clone());
    node.per_output = recipe.output_rate;
    node.inputs = recipe.inputs.clone();
    node.byproduct = recipe.byproduct.clone();
    node.power_mw = recipe.power_mw;
}

/// Net per-item balances across a placed-node set
#[derive(Debug, Clone, Default)]
pub struct Balances {
    pub produced: BTreeMap<String, f64>,
    pub required: BTreeMap<String, f64>,
    pub missing: BTreeSet<String>,
}

impl Balances {
    /// True when something in the set produces `item`. Detection is binary:
    /// an item is missing only when nothing produces it at all, not when
    /// production falls short of demand.
    pub fn is_satisfiable(&self, item: &str) -> bool {
        !self.missing.contains(item)
    }

    /// Net production (produced minus required) for an item
    pub fn net(&self, item: &str) -> f64 {
        self.produced.get(item).copied().unwrap_or(0.0)
            - self.required.get(item).copied().unwrap_or(0.0)
    }
}

/// Compute produced/required totals and the missing-item set.
/// Byproducts count toward production.
pub fn balances(nodes: &[PlacedNode]) -> Balances {
    let mut result = Balances::default();

    for node in nodes {
        *result.produced.entry(node.item.clone()).or_insert(0.0) +=
            node.per_output * node.count;
        if let Some(byproduct) = &node.byproduct {
            *result.produced.entry(byproduct.item.clone()).or_insert(0.0) +=
                byproduct.rate * node.count;
        }
        for input in &node.inputs {
            *result.required.entry(input.item.clone()).or_insert(0.0) +=
                input.rate * node.count;
        }
    }

    for item in result.required.keys() {
        if result.produced.get(item).copied().unwrap_or(0.0) == 0.0 {
            result.missing.insert(item.clone());
        }
    }

    result
}
