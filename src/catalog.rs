//! In-memory recipe catalog
//!
//! Read-only after load: item name → recipe variants, raw-resource name →
//! extractor definition. The chain calculator and planner only ever see the
//! normalized shapes stored here.

use std::collections::HashMap;

use crate::models::{ExtractorDef, Recipe};

/// Tier multipliers for synthesized extractor variants
const EXTRACTOR_TIERS: &[(&str, f64)] = &[("Mk.2", 2.0), ("Mk.3", 4.0)];

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    recipes: HashMap<String, Vec<Recipe>>,
    extractors: HashMap<String, ExtractorDef>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog::default()
    }

    pub fn add_recipe(&mut self, recipe: Recipe) {
        self.recipes
            .entry(recipe.output_item.clone())
            .or_default()
            .push(recipe);
    }

    pub fn add_extractor(&mut self, item: &str, def: ExtractorDef) {
        self.extractors.insert(item.to_string(), def);
    }

    /// Default recipe for an item (the first variant), if any
    pub fn recipe(&self, item: &str) -> Option<&Recipe> {
        self.recipes.get(item).and_then(|variants| variants.first())
    }

    /// All recipe variants producing an item
    pub fn variants(&self, item: &str) -> &[Recipe] {
        self.recipes.get(item).map_or(&[], Vec::as_slice)
    }

    pub fn extractor(&self, item: &str) -> Option<&ExtractorDef> {
        self.extractors.get(item)
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty() && self.extractors.is_empty()
    }

    /// Planner catalog: for every raw resource with an extractor, synthesize
    /// recipe variants at base, 2x and 4x rate/power so extraction tiers are
    /// placeable like any other recipe. Pure preprocessing; the chain
    /// resolver never sees the result and keeps treating raw items as
    /// extractor leaves.
    pub fn with_extractor_variants(&self) -> Catalog {
        let mut expanded = self.clone();
        for (item, def) in &self.extractors {
            if def.rate <= 0.0 {
                continue;
            }
            let mut variants = Vec::with_capacity(1 + EXTRACTOR_TIERS.len());
            variants.push(extractor_recipe(item, &def.extractor_type, def.rate, def.power_mw));
            for (tier, factor) in EXTRACTOR_TIERS {
                variants.push(extractor_recipe(
                    item,
                    &tier_name(&def.extractor_type, tier),
                    def.rate * factor,
                    def.power_mw * factor,
                ));
            }
            expanded.recipes.entry(item.clone()).or_default().extend(variants);
        }
        expanded
    }
}

fn extractor_recipe(item: &str, building: &str, rate: f64, power_mw: f64) -> Recipe {
    Recipe {
        name: building.to_string(),
        output_item: item.to_string(),
        output_rate: rate,
        building: building.to_string(),
        power_mw,
        inputs: Vec::new(),
        byproduct: None,
    }
}

/// "Miner Mk.1" + "Mk.2" → "Miner Mk.2"; names without a tier suffix get one
/// appended ("Oil Extractor Mk.2")
fn tier_name(base: &str, tier: &str) -> String {
    match base.strip_suffix(" Mk.1") {
        Some(stem) => format!("{stem} {tier}"),
        None => format!("{base} {tier}"),
    }
}
