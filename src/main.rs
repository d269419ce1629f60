//! Satisfactory Production Calculator
//!
//! A production chain calculator for Satisfactory.

mod aggregate;
mod calculator;
mod catalog;
mod db;
mod export;
mod import;
mod matrix;
mod models;
mod planner;

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::models::{NetMatrix, Row, RowKind};

#[derive(Parser)]
#[command(name = "satis-calculator")]
#[command(about = "Production chain calculator for Satisfactory")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "satis_data.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a recipe database JSON into the catalog
    Import {
        /// Path to the recipe database JSON
        json: PathBuf,

        /// Clear existing catalog before importing
        #[arg(long)]
        clear: bool,
    },

    /// Calculate the production chain for a target item
    Calc {
        /// Target item to produce (e.g. "Iron Plate")
        item: String,

        /// Target production rate in units per minute
        #[arg(short, long, default_value = "60")]
        rate: f64,

        /// Show the production tree
        #[arg(short, long)]
        tree: bool,

        /// Show the per-item net-flow breakdown
        #[arg(short, long)]
        matrix: bool,

        /// Write the flattened chain as CSV to a file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Compute balances for a manually placed node set
    Plan {
        /// Path to a plan JSON file: [{"item": ..., "variant": 0, "count": 1.0}]
        plan: PathBuf,

        /// Write the net-flow matrix as CSV to a file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// List all producible items
    ListItems,

    /// List all raw resources and their extractors
    ListRaw,

    /// Show recipe variants for an item
    Item {
        /// Item name
        name: String,
    },

    /// Initialize empty database with schema
    Init,

    /// Load sample recipe data for testing (without a recipe JSON)
    LoadSample,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Import { json, clear } => {
            if clear {
                println!("Clearing existing catalog...");
                db::clear_catalog(&conn)?;
            }

            let stats = import::import_file(&conn, &json)?;
            println!("\n{stats}");
        }

        Commands::Calc {
            item,
            rate,
            tree,
            matrix: show_matrix,
            csv,
        } => {
            if !rate.is_finite() || rate <= 0.0 {
                bail!("target rate must be a positive number of units per minute");
            }

            let catalog = db::load_catalog(&conn)?;
            if catalog.is_empty() {
                println!("Catalog is empty. Run 'import' or 'load-sample' first.");
                return Ok(());
            }

            let root = calculator::resolve_chain(&catalog, &item, rate)?;
            let rows = calculator::flatten(&root);

            if tree {
                println!("Production chain:\n");
                println!("{}", calculator::format_production_chain(&root, 0));
            }

            print_chain_table(&rows);
            println!();
            println!("{}", aggregate::summarize_chain(&rows, &item, rate));

            if show_matrix {
                print_matrix(&matrix::build_matrix(&catalog, &root));
            }

            if let Some(path) = csv {
                fs::write(&path, export::chain_csv(&rows))
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Wrote {}", path.display());
            }
        }

        Commands::Plan { plan, csv } => {
            let catalog = db::load_catalog(&conn)?;
            if catalog.is_empty() {
                println!("Catalog is empty. Run 'import' or 'load-sample' first.");
                return Ok(());
            }
            // planner catalogs carry placeable extraction tiers
            let catalog = catalog.with_extractor_variants();

            let content = fs::read_to_string(&plan)
                .with_context(|| format!("Failed to read {}", plan.display()))?;
            let entries: Vec<planner::PlanEntry> = serde_json::from_str(&content)
                .with_context(|| format!("Invalid plan file {}", plan.display()))?;

            let plan = planner::Plan::from_entries(&entries, &catalog);
            print_plan(&plan);

            let net = matrix::build_plan_matrix(plan.nodes());
            print_matrix(&net);

            if let Some(path) = csv {
                fs::write(&path, export::plan_matrix_csv(plan.nodes(), &net))
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Wrote {}", path.display());
            }
        }

        Commands::ListItems => {
            let items = db::list_items(&conn)?;
            if items.is_empty() {
                println!("No recipes in database. Run 'import' or 'load-sample' first.");
            } else {
                println!("Producible items:");
                for item in items {
                    println!("  {item}");
                }
            }
        }

        Commands::ListRaw => {
            let resources = db::list_raw_resources(&conn)?;
            if resources.is_empty() {
                println!("No extractors in database. Run 'import' or 'load-sample' first.");
            } else {
                println!(
                    "{:<24} {:<28} {:>10} {:>12}",
                    "Resource", "Extractor", "Rate/min", "Power (MW)"
                );
                println!("{}", "-".repeat(78));
                for (item, def) in resources {
                    println!(
                        "{:<24} {:<28} {:>10.2} {:>12.2}",
                        item, def.extractor_type, def.rate, def.power_mw
                    );
                }
            }
        }

        Commands::Item { name } => {
            let catalog = db::load_catalog(&conn)?;
            let variants = catalog.variants(&name);
            if variants.is_empty() {
                match catalog.extractor(&name) {
                    Some(def) => {
                        println!("{name} is a raw resource");
                        println!(
                            "  Extractor: {} @ {:.2}/min, {:.2} MW",
                            def.extractor_type, def.rate, def.power_mw
                        );
                    }
                    None => println!("No recipe or extractor found for '{name}'"),
                }
            } else {
                println!("Recipes for {name}:");
                for (index, recipe) in variants.iter().enumerate() {
                    println!(
                        "  [{}] {} — {} @ {:.2}/min, {:.2} MW",
                        index, recipe.name, recipe.building, recipe.output_rate, recipe.power_mw
                    );
                    for input in &recipe.inputs {
                        println!("      needs {} @ {:.2}/min", input.item, input.rate);
                    }
                    if let Some(byproduct) = &recipe.byproduct {
                        println!(
                            "      byproduct {} @ {:.2}/min",
                            byproduct.item, byproduct.rate
                        );
                    }
                }
            }
        }

        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            load_sample_data(&conn)?;
            println!("Sample data loaded successfully!");
        }
    }

    Ok(())
}

fn print_chain_table(rows: &[Row]) {
    println!(
        "{:<42} {:>10} {:<28} {:>8} {:>11} {:>10}",
        "ITEM", "RATE/MIN", "BUILDING", "COUNT", "POWER (MW)", "SURPLUS"
    );
    println!("{}", "-".repeat(115));

    for row in rows {
        let indent = "  ".repeat(row.depth);
        let item = match row.kind {
            RowKind::Byproduct => format!("{indent}↳ {} (Byproduct)", row.item),
            _ => format!("{indent}{}", row.item),
        };
        let building = row
            .building
            .as_deref()
            .or(row.extractor.as_deref())
            .unwrap_or("Raw");
        let count = match row.kind {
            RowKind::Processed => format!("{:.2}", row.building_count),
            RowKind::Byproduct => "-".to_string(),
            RowKind::Raw => {
                if row.extractor_count > 0 {
                    row.extractor_count.to_string()
                } else {
                    "-".to_string()
                }
            }
        };
        let surplus = if row.overproduction > 0.0 {
            format!("+{:.2}", row.overproduction)
        } else {
            "-".to_string()
        };
        println!(
            "{:<42} {:>10.2} {:<28} {:>8} {:>11.2} {:>10}",
            item, row.rate, building, count, row.power, surplus
        );
    }
}

fn print_plan(plan: &planner::Plan) {
    println!(
        "{:<10} {:<34} {:<28} {:>10} {:>12}",
        "COUNT", "ITEM", "BUILDING", "OUT/MIN", "POWER (MW)"
    );
    println!("{}", "-".repeat(99));
    for node in plan.nodes() {
        println!(
            "{:<10.2} {:<34} {:<28} {:>10.2} {:>12.2}",
            node.count,
            node.item,
            node.building.as_deref().unwrap_or("Raw"),
            node.per_output * node.count,
            node.power_mw * node.count
        );
    }
    println!();

    let totals = aggregate::aggregate_plan(plan.nodes());
    println!("Total power: {:.2} MW", totals.power);
    println!("Buildings needed: {:.0}", totals.building_total());
    for (name, count) in &totals.buildings {
        println!("  {count:.2}x {name}");
    }
    println!();

    let balances = planner::balances(plan.nodes());
    println!("{:<34} {:>12} {:>12} {:>12}", "ITEM", "PRODUCED", "REQUIRED", "NET");
    println!("{}", "-".repeat(74));
    let mut items: Vec<&String> = balances
        .produced
        .keys()
        .chain(balances.required.keys())
        .collect();
    items.sort();
    items.dedup();
    for item in items {
        let produced = balances.produced.get(item).copied().unwrap_or(0.0);
        let required = balances.required.get(item).copied().unwrap_or(0.0);
        let marker = if balances.is_satisfiable(item) { "" } else { "  (missing)" };
        println!(
            "{:<34} {:>12.2} {:>12.2} {:>12.2}{}",
            item,
            produced,
            required,
            balances.net(item),
            marker
        );
    }
    println!();
}

fn print_matrix(matrix: &NetMatrix) {
    println!("Net flow per producer (units/min):");
    for (item, summary) in &matrix.producers {
        let buildings: Vec<&str> = summary
            .building_names
            .iter()
            .map(String::as_str)
            .collect();
        println!(
            "  {} — {:.2}x {} ({:.2} MW)",
            item,
            summary.total_buildings,
            buildings.join(", "),
            summary.total_power
        );
        for target in &matrix.items {
            if let Some(total) = summary.net_total(target) {
                let per_building = summary.net_per_building(target).unwrap_or(0.0);
                println!(
                    "      {:<32} {:>10.2} /building {:>12.2} total",
                    target, per_building, total
                );
            }
        }
    }

    println!("\nColumn sums (net per item):");
    for item in &matrix.items {
        println!("  {:<34} {:>10.2}", item, matrix.column_sums[item]);
    }
    println!();
}

/// Load sample Satisfactory recipe data for testing without a recipe JSON
fn load_sample_data(conn: &Connection) -> Result<()> {
    use crate::models::{Byproduct, ExtractorDef, Recipe, RecipeInput};

    db::clear_catalog(conn)?;

    let extractors = [
        ("Iron Ore", "Miner Mk.1", 60.0, 5.0),
        ("Copper Ore", "Miner Mk.1", 60.0, 5.0),
        ("Limestone", "Miner Mk.1", 60.0, 5.0),
        ("Coal", "Miner Mk.1", 60.0, 5.0),
        ("Crude Oil", "Oil Extractor", 120.0, 40.0),
        ("Water", "Water Extractor", 120.0, 20.0),
    ];
    for (item, extractor_type, rate, power_mw) in extractors {
        db::upsert_extractor(
            conn,
            item,
            &ExtractorDef {
                extractor_type: extractor_type.to_string(),
                rate,
                power_mw,
            },
        )?;
    }

    let recipe = |name: &str, building: &str, output_rate: f64, power_mw: f64, inputs: &[(&str, f64)], byproduct: Option<(&str, f64)>| Recipe {
        name: name.to_string(),
        output_item: name.to_string(),
        output_rate,
        building: building.to_string(),
        power_mw,
        inputs: inputs
            .iter()
            .map(|(item, rate)| RecipeInput {
                item: (*item).to_string(),
                rate: *rate,
            })
            .collect(),
        byproduct: byproduct.map(|(item, rate)| Byproduct {
            item: item.to_string(),
            rate,
        }),
    };

    let recipes = [
        recipe("Iron Ingot", "Smelter", 30.0, 4.0, &[("Iron Ore", 30.0)], None),
        recipe("Copper Ingot", "Smelter", 30.0, 4.0, &[("Copper Ore", 30.0)], None),
        recipe("Iron Plate", "Constructor", 20.0, 4.0, &[("Iron Ingot", 30.0)], None),
        recipe("Iron Rod", "Constructor", 15.0, 4.0, &[("Iron Ingot", 15.0)], None),
        recipe("Screw", "Constructor", 40.0, 4.0, &[("Iron Rod", 10.0)], None),
        recipe("Wire", "Constructor", 30.0, 4.0, &[("Copper Ingot", 15.0)], None),
        recipe("Cable", "Constructor", 30.0, 4.0, &[("Wire", 60.0)], None),
        recipe("Concrete", "Constructor", 15.0, 4.0, &[("Limestone", 45.0)], None),
        recipe(
            "Reinforced Iron Plate",
            "Assembler",
            5.0,
            15.0,
            &[("Iron Plate", 30.0), ("Screw", 60.0)],
            None,
        ),
        recipe(
            "Steel Ingot",
            "Foundry",
            45.0,
            16.0,
            &[("Iron Ore", 45.0), ("Coal", 45.0)],
            None,
        ),
        recipe(
            "Plastic",
            "Refinery",
            20.0,
            30.0,
            &[("Crude Oil", 30.0)],
            Some(("Heavy Oil Residue", 10.0)),
        ),
        recipe(
            "Rubber",
            "Refinery",
            20.0,
            30.0,
            &[("Crude Oil", 30.0)],
            Some(("Heavy Oil Residue", 20.0)),
        ),
    ];
    let count = recipes.len();
    for entry in recipes {
        db::insert_recipe(conn, &entry)?;
    }

    // alternate variant so `item`/`plan` have something to switch to
    let mut pure_iron = recipe(
        "Pure Iron Ingot",
        "Refinery",
        65.0,
        30.0,
        &[("Iron Ore", 35.0), ("Water", 20.0)],
        None,
    );
    pure_iron.output_item = "Iron Ingot".to_string();
    db::insert_recipe(conn, &pure_iron)?;

    println!(
        "Loaded {} sample recipes and {} extractors",
        count + 1,
        extractors.len()
    );
    Ok(())
}
