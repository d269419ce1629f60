//! Recipe database normalization
//!
//! Parses the upstream Satisfactory recipe JSON (grouped recipes carrying
//! per-cycle amounts and craft times, plus legacy shapes), normalizes every
//! rate to units per minute, maps raw resources to extractors and loads the
//! result into the database. The calculator only ever sees the normalized
//! catalog.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Deserialize;

use crate::db;
use crate::models::{Byproduct, ExtractorDef, Recipe, RecipeInput};

/// Entries rejected at normalization time; the calculator never sees these
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("recipe '{0}' has no output item")]
    MissingOutputItem(String),
    #[error("recipe '{name}' has non-positive output rate {rate}")]
    NonPositiveRate { name: String, rate: f64 },
}

// ---------------------------------------------------------------------------
// Upstream JSON shapes
// ---------------------------------------------------------------------------

/// Top-level upstream database. Group names are fixed upstream; absent
/// groups deserialize as empty maps.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDatabase {
    #[serde(rename = "smeltingRecipes")]
    smelting: BTreeMap<String, RawRecipe>,
    #[serde(rename = "foundryRecipes")]
    foundry: BTreeMap<String, RawRecipe>,
    #[serde(rename = "constructorRecipes")]
    constructor: BTreeMap<String, RawRecipe>,
    #[serde(rename = "assemblerRecipes")]
    assembler: BTreeMap<String, RawRecipe>,
    #[serde(rename = "manufacturerRecipes")]
    manufacturer: BTreeMap<String, RawRecipe>,
    #[serde(rename = "refineryRecipes")]
    refinery: BTreeMap<String, RawRecipe>,
    #[serde(rename = "blenderRecipes")]
    blender: BTreeMap<String, RawRecipe>,
    #[serde(rename = "particleAcceleratorRecipes")]
    particle_accelerator: BTreeMap<String, RawRecipe>,
    #[serde(rename = "quantumEncoderRecipes")]
    quantum_encoder: BTreeMap<String, RawRecipe>,
    #[serde(rename = "converterRecipes")]
    converter: BTreeMap<String, RawRecipe>,
    #[serde(rename = "fuelRecipes")]
    fuel: BTreeMap<String, RawRecipe>,
    #[serde(rename = "packagerRecipes")]
    packager: BTreeMap<String, RawRecipe>,
    recipes: Option<LegacyRecipes>,
    #[serde(rename = "rawResources")]
    raw_resources: Vec<String>,
    extractors: BTreeMap<String, RawExtractor>,
}

impl RawDatabase {
    fn recipe_groups(&self) -> impl Iterator<Item = (&String, &RawRecipe)> {
        self.smelting
            .iter()
            .chain(self.foundry.iter())
            .chain(self.constructor.iter())
            .chain(self.assembler.iter())
            .chain(self.manufacturer.iter())
            .chain(self.refinery.iter())
            .chain(self.blender.iter())
            .chain(self.particle_accelerator.iter())
            .chain(self.quantum_encoder.iter())
            .chain(self.converter.iter())
            .chain(self.fuel.iter())
            .chain(self.packager.iter())
    }
}

/// One grouped recipe entry: amounts per craft cycle of `time` seconds
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawRecipe {
    building: Option<String>,
    time: f64,
    inputs: Vec<RawAmount>,
    output: Option<RawOutput>,
    byproduct: Option<RawAmount>,
    #[serde(rename = "powerUsage", alias = "power")]
    power: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct RawAmount {
    item: String,
    #[serde(default = "default_amount")]
    amount: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawOutput {
    item: Option<String>,
    amount: Option<f64>,
}

fn default_amount() -> f64 {
    1.0
}

/// Legacy `recipes` section: either a map already carrying per-minute
/// rates, or an array of complete-DB exports in per-cycle form
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyRecipes {
    Map(BTreeMap<String, LegacyRecipe>),
    List(Vec<NamedRawRecipe>),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct LegacyRecipe {
    building: Option<String>,
    inputs: Vec<RateEntry>,
    output: Option<RateEntry>,
    power: f64,
    byproduct: Option<RateEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct RateEntry {
    item: String,
    rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct NamedRawRecipe {
    #[serde(default)]
    name: Option<String>,
    #[serde(flatten)]
    recipe: RawRecipe,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawExtractor {
    #[serde(rename = "baseRate", alias = "rate")]
    base_rate: Option<f64>,
    power: Option<f64>,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

fn normalize_grouped(name: &str, raw: &RawRecipe) -> Result<Recipe, ImportError> {
    let time = if raw.time > 0.0 { raw.time } else { 1.0 };
    let per_minute = 60.0 / time;

    let output = raw.output.clone().unwrap_or_default();
    let output_item = output.item.unwrap_or_else(|| name.to_string());
    let output_rate = output.amount.unwrap_or(1.0) * per_minute;
    if output_rate <= 0.0 {
        return Err(ImportError::NonPositiveRate {
            name: name.to_string(),
            rate: output_rate,
        });
    }

    Ok(Recipe {
        name: name.to_string(),
        output_item,
        output_rate,
        building: raw.building.clone().unwrap_or_default(),
        power_mw: raw.power,
        inputs: raw
            .inputs
            .iter()
            .map(|input| RecipeInput {
                item: input.item.clone(),
                rate: input.amount * per_minute,
            })
            .collect(),
        byproduct: raw.byproduct.as_ref().map(|byproduct| Byproduct {
            item: byproduct.item.clone(),
            rate: byproduct.amount * per_minute,
        }),
    })
}

fn normalize_legacy(name: &str, legacy: &LegacyRecipe) -> Result<Recipe, ImportError> {
    let Some(output) = &legacy.output else {
        return Err(ImportError::MissingOutputItem(name.to_string()));
    };
    if output.rate <= 0.0 {
        return Err(ImportError::NonPositiveRate {
            name: name.to_string(),
            rate: output.rate,
        });
    }

    Ok(Recipe {
        name: name.to_string(),
        output_item: output.item.clone(),
        output_rate: output.rate,
        building: legacy.building.clone().unwrap_or_default(),
        power_mw: legacy.power,
        inputs: legacy
            .inputs
            .iter()
            .map(|input| RecipeInput {
                item: input.item.clone(),
                rate: input.rate,
            })
            .collect(),
        byproduct: legacy.byproduct.as_ref().map(|byproduct| Byproduct {
            item: byproduct.item.clone(),
            rate: byproduct.rate,
        }),
    })
}

fn normalize_named(entry: &NamedRawRecipe) -> Result<Recipe, ImportError> {
    let fallback = entry
        .name
        .clone()
        .or_else(|| entry.recipe.output.as_ref().and_then(|output| output.item.clone()));
    let Some(name) = fallback else {
        return Err(ImportError::MissingOutputItem("<unnamed>".to_string()));
    };
    if entry.recipe.output.is_none() {
        return Err(ImportError::MissingOutputItem(name));
    }
    normalize_grouped(&name, &entry.recipe)
}

/// Which extraction building handles a raw resource
fn pick_extractor(resource: &str) -> &'static str {
    let lower = resource.to_lowercase();
    if lower.contains("oil") {
        "Oil Extractor"
    } else if lower.contains("water") {
        "Water Extractor"
    } else if lower.contains("gas") || lower.contains("nitrogen") {
        "Resource Well Pressurizer"
    } else {
        "Miner Mk.1"
    }
}

fn choose_extractor(data: &RawDatabase, resource: &str) -> ExtractorDef {
    let chosen = pick_extractor(resource);
    let def = data
        .extractors
        .get(chosen)
        .or_else(|| data.extractors.values().next());

    ExtractorDef {
        extractor_type: chosen.to_string(),
        rate: def.and_then(|d| d.base_rate).unwrap_or(0.0),
        power_mw: def.and_then(|d| d.power).unwrap_or(0.0),
    }
}

// ---------------------------------------------------------------------------
// Import pipeline
// ---------------------------------------------------------------------------

/// Import a recipe database JSON file into the catalog database
pub fn import_file(conn: &Connection, path: &Path) -> Result<ImportStats> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    import_json(conn, &content)
}

/// Normalize and store a recipe database given as a JSON string
pub fn import_json(conn: &Connection, json: &str) -> Result<ImportStats> {
    let data: RawDatabase = serde_json::from_str(json).map_err(ImportError::JsonParse)?;
    let mut stats = ImportStats::default();

    for (name, raw) in data.recipe_groups() {
        match normalize_grouped(name, raw) {
            Ok(recipe) => store_recipe(conn, &recipe, &mut stats)?,
            Err(err) => {
                eprintln!("  Skipping '{name}': {err}");
                stats.errors += 1;
            }
        }
    }

    match &data.recipes {
        Some(LegacyRecipes::Map(map)) => {
            for (name, legacy) in map {
                match normalize_legacy(name, legacy) {
                    Ok(recipe) => store_recipe(conn, &recipe, &mut stats)?,
                    Err(err) => {
                        eprintln!("  Skipping '{name}': {err}");
                        stats.errors += 1;
                    }
                }
            }
        }
        Some(LegacyRecipes::List(list)) => {
            for entry in list {
                match normalize_named(entry) {
                    Ok(recipe) => store_recipe(conn, &recipe, &mut stats)?,
                    Err(err) => {
                        eprintln!("  Skipping entry: {err}");
                        stats.errors += 1;
                    }
                }
            }
        }
        None => {}
    }

    for resource in &data.raw_resources {
        let def = choose_extractor(&data, resource);
        if def.rate <= 0.0 {
            // no usable extraction rate known; resolves as Manual later
            stats.skipped += 1;
            continue;
        }
        db::upsert_extractor(conn, resource, &def)?;
        stats.extractors += 1;
    }

    Ok(stats)
}

fn store_recipe(conn: &Connection, recipe: &Recipe, stats: &mut ImportStats) -> Result<()> {
    db::insert_recipe(conn, recipe)?;
    stats.recipes += 1;
    stats.inputs += recipe.inputs.len();
    Ok(())
}

/// Import statistics
#[derive(Debug, Default)]
pub struct ImportStats {
    pub recipes: usize,
    pub inputs: usize,
    pub extractors: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} recipes ({} inputs), {} extractors. Skipped: {}, Errors: {}",
            self.recipes, self.inputs, self.extractors, self.skipped, self.errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::resolve_chain;
    use crate::models::NodeSource;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn grouped_amounts_normalize_to_per_minute() {
        let conn = test_conn();
        let json = r#"{
            "constructorRecipes": {
                "Iron Plate": {
                    "building": "Constructor",
                    "time": 6,
                    "inputs": [{"item": "Iron Ingot", "amount": 3}],
                    "output": {"item": "Iron Plate", "amount": 2},
                    "powerUsage": 4
                }
            }
        }"#;
        let stats = import_json(&conn, json).unwrap();
        assert_eq!(stats.recipes, 1);
        assert_eq!(stats.inputs, 1);

        let catalog = db::load_catalog(&conn).unwrap();
        let recipe = catalog.recipe("Iron Plate").unwrap();
        assert_eq!(recipe.output_rate, 20.0);
        assert_eq!(recipe.inputs[0].rate, 30.0);
        assert_eq!(recipe.power_mw, 4.0);
    }

    #[test]
    fn power_alias_and_missing_time_default() {
        let conn = test_conn();
        let json = r#"{
            "smeltingRecipes": {
                "Iron Ingot": {
                    "building": "Smelter",
                    "inputs": [{"item": "Iron Ore", "amount": 0.5}],
                    "output": {"item": "Iron Ingot", "amount": 0.5},
                    "power": 4
                }
            }
        }"#;
        import_json(&conn, json).unwrap();

        let catalog = db::load_catalog(&conn).unwrap();
        let recipe = catalog.recipe("Iron Ingot").unwrap();
        // missing time is a one-second cycle
        assert_eq!(recipe.output_rate, 30.0);
        assert_eq!(recipe.power_mw, 4.0);
    }

    #[test]
    fn byproduct_rates_are_converted_too() {
        let conn = test_conn();
        let json = r#"{
            "refineryRecipes": {
                "Plastic": {
                    "building": "Refinery",
                    "time": 6,
                    "inputs": [{"item": "Crude Oil", "amount": 3}],
                    "output": {"item": "Plastic", "amount": 2},
                    "byproduct": {"item": "Heavy Oil Residue", "amount": 1},
                    "powerUsage": 30
                }
            }
        }"#;
        import_json(&conn, json).unwrap();

        let catalog = db::load_catalog(&conn).unwrap();
        let byproduct = catalog.recipe("Plastic").unwrap().byproduct.clone().unwrap();
        assert_eq!(byproduct.item, "Heavy Oil Residue");
        assert_eq!(byproduct.rate, 10.0);
    }

    #[test]
    fn output_item_falls_back_to_group_key() {
        let conn = test_conn();
        let json = r#"{
            "fuelRecipes": {
                "Fuel": {
                    "building": "Refinery",
                    "time": 6,
                    "output": {"amount": 4},
                    "powerUsage": 30
                }
            }
        }"#;
        import_json(&conn, json).unwrap();

        let catalog = db::load_catalog(&conn).unwrap();
        assert!(catalog.recipe("Fuel").is_some());
    }

    #[test]
    fn non_positive_output_rate_is_rejected() {
        let conn = test_conn();
        let json = r#"{
            "converterRecipes": {
                "Broken": {
                    "building": "Converter",
                    "time": 6,
                    "output": {"item": "Broken", "amount": -2}
                }
            }
        }"#;
        let stats = import_json(&conn, json).unwrap();
        assert_eq!(stats.recipes, 0);
        assert_eq!(stats.errors, 1);
        assert!(db::load_catalog(&conn).unwrap().recipe("Broken").is_none());
    }

    #[test]
    fn legacy_map_rates_pass_through() {
        let conn = test_conn();
        let json = r#"{
            "recipes": {
                "Wire": {
                    "building": "Constructor",
                    "inputs": [{"item": "Copper Ingot", "rate": 15}],
                    "output": {"item": "Wire", "rate": 30},
                    "power": 4
                }
            }
        }"#;
        import_json(&conn, json).unwrap();

        let catalog = db::load_catalog(&conn).unwrap();
        let recipe = catalog.recipe("Wire").unwrap();
        assert_eq!(recipe.output_rate, 30.0);
        assert_eq!(recipe.inputs[0].rate, 15.0);
    }

    #[test]
    fn legacy_list_without_output_is_rejected() {
        let conn = test_conn();
        let json = r#"{
            "recipes": [
                {"name": "Cable", "building": "Constructor", "time": 2,
                 "inputs": [{"item": "Wire", "amount": 2}],
                 "output": {"item": "Cable", "amount": 1}, "power": 4},
                {"name": "Ghost", "building": "Constructor", "time": 2}
            ]
        }"#;
        let stats = import_json(&conn, json).unwrap();
        assert_eq!(stats.recipes, 1);
        assert_eq!(stats.errors, 1);

        let catalog = db::load_catalog(&conn).unwrap();
        assert_eq!(catalog.recipe("Cable").unwrap().output_rate, 30.0);
    }

    #[test]
    fn extractors_are_matched_by_resource_kind() {
        let conn = test_conn();
        let json = r#"{
            "rawResources": ["Iron Ore", "Crude Oil", "Water", "Nitrogen Gas"],
            "extractors": {
                "Miner Mk.1": {"baseRate": 60, "power": 5},
                "Oil Extractor": {"baseRate": 120, "power": 40},
                "Water Extractor": {"baseRate": 120, "power": 20},
                "Resource Well Pressurizer": {"baseRate": 60, "power": 150}
            }
        }"#;
        let stats = import_json(&conn, json).unwrap();
        assert_eq!(stats.extractors, 4);

        let catalog = db::load_catalog(&conn).unwrap();
        assert_eq!(
            catalog.extractor("Iron Ore").unwrap().extractor_type,
            "Miner Mk.1"
        );
        assert_eq!(
            catalog.extractor("Crude Oil").unwrap().extractor_type,
            "Oil Extractor"
        );
        assert_eq!(
            catalog.extractor("Water").unwrap().extractor_type,
            "Water Extractor"
        );
        assert_eq!(
            catalog.extractor("Nitrogen Gas").unwrap().extractor_type,
            "Resource Well Pressurizer"
        );
    }

    #[test]
    fn unknown_extractor_rate_is_skipped() {
        let conn = test_conn();
        let json = r#"{
            "rawResources": ["SAM Ore"],
            "extractors": {}
        }"#;
        let stats = import_json(&conn, json).unwrap();
        assert_eq!(stats.extractors, 0);
        assert_eq!(stats.skipped, 1);
        assert!(db::load_catalog(&conn).unwrap().extractor("SAM Ore").is_none());
    }

    #[test]
    fn imported_catalog_resolves_end_to_end() {
        let conn = test_conn();
        let json = r#"{
            "smeltingRecipes": {
                "Iron Ingot": {
                    "building": "Smelter",
                    "time": 2,
                    "inputs": [{"item": "Iron Ore", "amount": 1}],
                    "output": {"item": "Iron Ingot", "amount": 1},
                    "powerUsage": 4
                }
            },
            "constructorRecipes": {
                "Iron Plate": {
                    "building": "Constructor",
                    "time": 6,
                    "inputs": [{"item": "Iron Ingot", "amount": 3}],
                    "output": {"item": "Iron Plate", "amount": 2},
                    "powerUsage": 4
                }
            },
            "rawResources": ["Iron Ore"],
            "extractors": {
                "Miner Mk.1": {"baseRate": 60, "power": 5}
            }
        }"#;
        import_json(&conn, json).unwrap();

        let catalog = db::load_catalog(&conn).unwrap();
        let root = resolve_chain(&catalog, "Iron Plate", 60.0).unwrap();

        let NodeSource::Recipe { building_count, .. } = &root.source else {
            panic!("expected recipe node");
        };
        assert_eq!(*building_count, 3.0);
        assert_eq!(root.children[0].required_rate, 90.0);
        let ore = &root.children[0].children[0];
        let NodeSource::Raw { extractor_count, .. } = &ore.source else {
            panic!("expected raw node");
        };
        assert_eq!(*extractor_count, 2);
    }
}
