//! Database schema and catalog storage

use anyhow::Result;
use rusqlite::Connection;

use crate::catalog::Catalog;
use crate::models::{Byproduct, ExtractorDef, Recipe, RecipeInput};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Normalized recipe definitions; one row per variant
        CREATE TABLE IF NOT EXISTS recipes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            output_item TEXT NOT NULL,
            output_rate REAL NOT NULL,
            building TEXT NOT NULL,
            power_mw REAL NOT NULL,
            byproduct_item TEXT,
            byproduct_rate REAL
        );

        -- Recipe inputs; id preserves input declaration order
        CREATE TABLE IF NOT EXISTS recipe_inputs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recipe_id INTEGER NOT NULL,
            item TEXT NOT NULL,
            rate REAL NOT NULL
        );

        -- Extractor definitions, keyed by raw resource name
        CREATE TABLE IF NOT EXISTS extractors (
            item TEXT PRIMARY KEY,
            extractor_type TEXT NOT NULL,
            rate REAL NOT NULL,
            power_mw REAL NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_recipes_output ON recipes(output_item);
        CREATE INDEX IF NOT EXISTS idx_recipe_inputs_recipe ON recipe_inputs(recipe_id);
        "#,
    )?;
    Ok(())
}

/// Clear all catalog data (for re-import)
pub fn clear_catalog(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM recipe_inputs;
        DELETE FROM recipes;
        DELETE FROM extractors;
        "#,
    )?;
    Ok(())
}

/// Insert a recipe with its inputs
pub fn insert_recipe(conn: &Connection, recipe: &Recipe) -> Result<()> {
    conn.execute(
        "INSERT INTO recipes (name, output_item, output_rate, building, power_mw, byproduct_item, byproduct_rate)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        (
            &recipe.name,
            &recipe.output_item,
            recipe.output_rate,
            &recipe.building,
            recipe.power_mw,
            recipe.byproduct.as_ref().map(|b| b.item.as_str()),
            recipe.byproduct.as_ref().map(|b| b.rate),
        ),
    )?;
    let recipe_id = conn.last_insert_rowid();

    for input in &recipe.inputs {
        conn.execute(
            "INSERT INTO recipe_inputs (recipe_id, item, rate) VALUES (?1, ?2, ?3)",
            (recipe_id, &input.item, input.rate),
        )?;
    }
    Ok(())
}

/// Insert or replace an extractor definition
pub fn upsert_extractor(conn: &Connection, item: &str, def: &ExtractorDef) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO extractors (item, extractor_type, rate, power_mw)
         VALUES (?1, ?2, ?3, ?4)",
        (item, &def.extractor_type, def.rate, def.power_mw),
    )?;
    Ok(())
}

/// Load the whole catalog into memory. Variant order follows insertion
/// order, so the first imported recipe for an item stays the default.
pub fn load_catalog(conn: &Connection) -> Result<Catalog> {
    let mut stmt = conn.prepare(
        "SELECT id, name, output_item, output_rate, building, power_mw, byproduct_item, byproduct_rate
         FROM recipes ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        let byproduct = match (
            row.get::<_, Option<String>>(6)?,
            row.get::<_, Option<f64>>(7)?,
        ) {
            (Some(item), Some(rate)) => Some(Byproduct { item, rate }),
            _ => None,
        };
        Ok((
            row.get::<_, i64>(0)?,
            Recipe {
                name: row.get(1)?,
                output_item: row.get(2)?,
                output_rate: row.get(3)?,
                building: row.get(4)?,
                power_mw: row.get(5)?,
                inputs: Vec::new(),
                byproduct,
            },
        ))
    })?;

    let mut recipes: Vec<(i64, Recipe)> = Vec::new();
    for row in rows {
        recipes.push(row?);
    }

    let mut stmt = conn.prepare("SELECT recipe_id, item, rate FROM recipe_inputs ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            RecipeInput {
                item: row.get(1)?,
                rate: row.get(2)?,
            },
        ))
    })?;
    for row in rows {
        let (recipe_id, input) = row?;
        if let Some((_, recipe)) = recipes.iter_mut().find(|(id, _)| *id == recipe_id) {
            recipe.inputs.push(input);
        }
    }

    let mut catalog = Catalog::new();
    for (_, recipe) in recipes {
        catalog.add_recipe(recipe);
    }

    let mut stmt =
        conn.prepare("SELECT item, extractor_type, rate, power_mw FROM extractors")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            ExtractorDef {
                extractor_type: row.get(1)?,
                rate: row.get(2)?,
                power_mw: row.get(3)?,
            },
        ))
    })?;
    for row in rows {
        let (item, def) = row?;
        catalog.add_extractor(&item, def);
    }

    Ok(catalog)
}

/// List all unique producible items
pub fn list_items(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT DISTINCT output_item FROM recipes ORDER BY output_item")?;
    let rows = stmt.query_map([], |row| row.get(0))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// List all raw resources with their extractor definitions
pub fn list_raw_resources(conn: &Connection) -> Result<Vec<(String, ExtractorDef)>> {
    let mut stmt = conn
        .prepare("SELECT item, extractor_type, rate, power_mw FROM extractors ORDER BY item")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            ExtractorDef {
                extractor_type: row.get(1)?,
                rate: row.get(2)?,
                power_mw: row.get(3)?,
            },
        ))
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn cable_recipe() -> Recipe {
        Recipe {
            name: "Cable".to_string(),
            output_item: "Cable".to_string(),
            output_rate: 30.0,
            building: "Constructor".to_string(),
            power_mw: 4.0,
            inputs: vec![RecipeInput {
                item: "Wire".to_string(),
                rate: 60.0,
            }],
            byproduct: None,
        }
    }

    #[test]
    fn schema_init_is_idempotent() {
        let conn = test_conn();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn recipe_round_trip_preserves_shape() {
        let conn = test_conn();
        let mut recipe = cable_recipe();
        recipe.byproduct = Some(Byproduct {
            item: "Scrap".to_string(),
            rate: 5.0,
        });
        insert_recipe(&conn, &recipe).unwrap();

        let catalog = load_catalog(&conn).unwrap();
        assert_eq!(catalog.recipe("Cable"), Some(&recipe));
    }

    #[test]
    fn input_order_survives_round_trip() {
        let conn = test_conn();
        let recipe = Recipe {
            name: "Reinforced Iron Plate".to_string(),
            output_item: "Reinforced Iron Plate".to_string(),
            output_rate: 5.0,
            building: "Assembler".to_string(),
            power_mw: 15.0,
            inputs: vec![
                RecipeInput {
                    item: "Iron Plate".to_string(),
                    rate: 30.0,
                },
                RecipeInput {
                    item: "Screw".to_string(),
                    rate: 60.0,
                },
            ],
            byproduct: None,
        };
        insert_recipe(&conn, &recipe).unwrap();

        let catalog = load_catalog(&conn).unwrap();
        let loaded = catalog.recipe("Reinforced Iron Plate").unwrap();
        assert_eq!(loaded.inputs[0].item, "Iron Plate");
        assert_eq!(loaded.inputs[1].item, "Screw");
    }

    #[test]
    fn first_inserted_variant_stays_default() {
        let conn = test_conn();
        insert_recipe(&conn, &cable_recipe()).unwrap();
        let mut alternate = cable_recipe();
        alternate.name = "Insulated Cable".to_string();
        alternate.building = "Assembler".to_string();
        insert_recipe(&conn, &alternate).unwrap();

        let catalog = load_catalog(&conn).unwrap();
        assert_eq!(catalog.variants("Cable").len(), 2);
        assert_eq!(catalog.recipe("Cable").unwrap().building, "Constructor");
    }

    #[test]
    fn extractor_upsert_replaces() {
        let conn = test_conn();
        let def = ExtractorDef {
            extractor_type: "Miner Mk.1".to_string(),
            rate: 60.0,
            power_mw: 5.0,
        };
        upsert_extractor(&conn, "Iron Ore", &def).unwrap();
        let faster = ExtractorDef {
            extractor_type: "Miner Mk.2".to_string(),
            rate: 120.0,
            power_mw: 12.0,
        };
        upsert_extractor(&conn, "Iron Ore", &faster).unwrap();

        let catalog = load_catalog(&conn).unwrap();
        assert_eq!(catalog.extractor("Iron Ore"), Some(&faster));
        assert_eq!(list_raw_resources(&conn).unwrap().len(), 1);
    }

    #[test]
    fn clear_catalog_empties_everything() {
        let conn = test_conn();
        insert_recipe(&conn, &cable_recipe()).unwrap();
        upsert_extractor(
            &conn,
            "Iron Ore",
            &ExtractorDef {
                extractor_type: "Miner Mk.1".to_string(),
                rate: 60.0,
                power_mw: 5.0,
            },
        )
        .unwrap();

        clear_catalog(&conn).unwrap();
        let catalog = load_catalog(&conn).unwrap();
        assert!(catalog.is_empty());
        assert!(list_items(&conn).unwrap().is_empty());
    }
}
