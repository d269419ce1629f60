//! Production chain calculator logic

use thiserror::Error;

use crate::catalog::Catalog;
use crate::models::{ByproductNode, NodeSource, ProductionNode, Row, RowKind};

/// Failures of chain resolution. A missing recipe or extractor is not an
/// error (both resolve to raw leaves); the only failure is a recipe cycle
/// in the catalog.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// A recipe input revisited an item that is still being expanded
    #[error("cyclic recipe chain: '{item}' depends on itself")]
    RecipeCycle { item: String },
}

/// Calculate the production chain for a target item at a required rate
/// (units per minute).
///
/// Returns a tree of buildings needed to sustain the target rate, including
/// all upstream recipes and raw-resource extraction. A rate of 0 degenerates
/// to an all-zero tree.
pub fn resolve_chain(
    catalog: &Catalog,
    item: &str,
    required_rate: f64,
) -> Result<ProductionNode, ChainError> {
    let mut expanding = Vec::new();
    resolve_recursive(catalog, item, required_rate, &mut expanding)
}

fn resolve_recursive(
    catalog: &Catalog,
    item: &str,
    rate: f64,
    expanding: &mut Vec<String>,
) -> Result<ProductionNode, ChainError> {
    let Some(recipe) = catalog.recipe(item) else {
        return Ok(raw_node(catalog, item, rate));
    };

    if expanding.iter().any(|ancestor| ancestor == item) {
        return Err(ChainError::RecipeCycle {
            item: item.to_string(),
        });
    }

    // Fractional building count: 0.5 means half a building's worth of
    // throughput. Power scales with it; actual output only comes in
    // whole-building steps.
    let exact = rate / recipe.output_rate;
    let actual_output = exact.ceil() * recipe.output_rate;

    expanding.push(item.to_string());
    let mut children = Vec::with_capacity(recipe.inputs.len());
    for input in &recipe.inputs {
        children.push(resolve_recursive(
            catalog,
            &input.item,
            input.rate * exact,
            expanding,
        )?);
    }
    expanding.pop();

    let mut byproducts = Vec::new();
    if let Some(byproduct) = &recipe.byproduct {
        byproducts.push(ByproductNode {
            item: byproduct.item.clone(),
            rate: byproduct.rate * exact,
        });
    }

    Ok(ProductionNode {
        item: item.to_string(),
        required_rate: rate,
        source: NodeSource::Recipe {
            building: recipe.building.clone(),
            building_count: round_up_2dp(exact),
            actual_output,
            overproduction: actual_output - rate,
        },
        power: exact * recipe.power_mw,
        children,
        byproducts,
    })
}

fn raw_node(catalog: &Catalog, item: &str, rate: f64) -> ProductionNode {
    let (extractor, extractor_count, power) = match catalog.extractor(item) {
        Some(def) if def.rate > 0.0 => {
            let count = (rate / def.rate).ceil() as u32;
            (def.extractor_type.clone(), count, f64::from(count) * def.power_mw)
        }
        // No automated extraction known; must be supplied externally
        _ => ("Manual".to_string(), 0, 0.0),
    };

    ProductionNode {
        item: item.to_string(),
        required_rate: rate,
        source: NodeSource::Raw {
            extractor,
            extractor_count,
        },
        power,
        children: Vec::new(),
        byproducts: Vec::new(),
    }
}

fn round_up_2dp(count: f64) -> f64 {
    (count * 100.0).ceil() / 100.0
}

/// Flatten a production tree into display rows: pre-order, with byproduct
/// rows immediately after their parent at the same depth, then each child's
/// full subtree in input-declaration order. Pure; repeated calls on the same
/// tree yield identical output.
pub fn flatten(root: &ProductionNode) -> Vec<Row> {
    let mut rows = Vec::new();
    flatten_into(root, 0, &mut rows);
    rows
}

fn flatten_into(node: &ProductionNode, depth: usize, rows: &mut Vec<Row>) {
    match &node.source {
        NodeSource::Raw {
            extractor,
            extractor_count,
        } => {
            rows.push(Row {
                item: node.item.clone(),
                kind: RowKind::Raw,
                rate: node.required_rate,
                building: None,
                building_count: 0.0,
                extractor: Some(extractor.clone()),
                extractor_count: *extractor_count,
                power: node.power,
                overproduction: 0.0,
                depth,
            });
        }
        NodeSource::Recipe {
            building,
            building_count,
            overproduction,
            ..
        } => {
            rows.push(Row {
                item: node.item.clone(),
                kind: RowKind::Processed,
                rate: node.required_rate,
                building: Some(building.clone()),
                building_count: *building_count,
                extractor: None,
                extractor_count: 0,
                power: node.power,
                overproduction: *overproduction,
                depth,
            });
            for byproduct in &node.byproducts {
                rows.push(Row {
                    item: byproduct.item.clone(),
                    kind: RowKind::Byproduct,
                    rate: byproduct.rate,
                    building: Some(format!("{building} (Byproduct)")),
                    building_count: 0.0,
                    extractor: None,
                    extractor_count: 0,
                    power: 0.0,
                    overproduction: 0.0,
                    depth,
                });
            }
        }
    }

    for child in &node.children {
        flatten_into(child, depth + 1, rows);
    }
}

/// Format a production chain as a readable indented tree
pub fn format_production_chain(node: &ProductionNode, indent: usize) -> String {
    let mut output = String::new();
    let prefix = "  ".repeat(indent);

    match &node.source {
        NodeSource::Raw {
            extractor,
            extractor_count,
        } => {
            if *extractor_count > 0 {
                output.push_str(&format!(
                    "{}→ {} @ {:.2}/min ({}x {}, {:.1} MW)\n",
                    prefix, node.item, node.required_rate, extractor_count, extractor, node.power
                ));
            } else {
                output.push_str(&format!(
                    "{}→ {} @ {:.2}/min (manual input)\n",
                    prefix, node.item, node.required_rate
                ));
            }
        }
        NodeSource::Recipe {
            building,
            building_count,
            overproduction,
            ..
        } => {
            let surplus = if *overproduction > 0.0 {
                format!(", +{overproduction:.2} surplus")
            } else {
                String::new()
            };
            output.push_str(&format!(
                "{}{:.2}x {} → {} @ {:.2}/min ({:.1} MW{})\n",
                prefix, building_count, building, node.item, node.required_rate, node.power, surplus
            ));
            for byproduct in &node.byproducts {
                output.push_str(&format!(
                    "{}  ↳ {} @ {:.2}/min (byproduct)\n",
                    prefix, byproduct.item, byproduct.rate
                ));
            }
            for child in &node.children {
                output.push_str(&format_production_chain(child, indent + 1));
            }
        }
    }

    output
}
