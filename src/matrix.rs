//! Net-flow matrix: per-item, per-producer production and consumption
//!
//! For every item touched anywhere in a chain or plan, and for every
//! producer, the per-building and absolute net contribution (positive =
//! produced, negative = consumed), plus column sums per item.

use std::collections::{BTreeMap, BTreeSet};

use crate::calculator::flatten;
use crate::catalog::Catalog;
use crate::models::{
    NetMatrix, PlacedNode, ProducerSummary, ProductionNode, Row, RowKind,
};

/// Build the item × producer net-flow table for a resolved chain.
///
/// Own-item production is measured against whole physical buildings (the
/// row's actual output); consumption and byproduct output scale with the
/// exact fractional count. Column sums therefore reconcile with the root's
/// actual output, and intermediate columns carry the overproduction surplus.
pub fn build_matrix(catalog: &Catalog, root: &ProductionNode) -> NetMatrix {
    let rows = flatten(root);
    let mut producers: BTreeMap<String, ProducerSummary> = BTreeMap::new();
    let mut items: BTreeSet<String> = BTreeSet::new();

    for row in &rows {
        items.insert(row.item.clone());
        match row.kind {
            // accounted for through the parent recipe's byproduct entry
            RowKind::Byproduct => {}
            RowKind::Raw => merge_raw_row(catalog, row, &mut producers),
            RowKind::Processed => merge_recipe_row(catalog, row, &mut producers, &mut items),
        }
    }

    finish(producers, items)
}

fn merge_raw_row(
    catalog: &Catalog,
    row: &Row,
    producers: &mut BTreeMap<String, ProducerSummary>,
) {
    let summary = producers
        .entry(row.item.clone())
        .or_insert_with(|| ProducerSummary::new(&row.item));

    if let Some(extractor) = &row.extractor {
        summary.building_names.insert(extractor.clone());
    }
    if let Some(def) = catalog.extractor(&row.item) {
        if def.rate > 0.0 {
            summary
                .per_building_output
                .insert(row.item.clone(), def.rate);
            *summary.total_produced.entry(row.item.clone()).or_insert(0.0) +=
                f64::from(row.extractor_count) * def.rate;
        }
    }
    summary.total_buildings += f64::from(row.extractor_count);
    summary.total_power += row.power;
}

fn merge_recipe_row(
    catalog: &Catalog,
    row: &Row,
    producers: &mut BTreeMap<String, ProducerSummary>,
    items: &mut BTreeSet<String>,
) {
    // The resolver picked a variant by building; recover it for the
    // per-building input rates.
    let variant = catalog
        .variants(&row.item)
        .iter()
        .find(|recipe| Some(&recipe.building) == row.building.as_ref());
    let Some(recipe) = variant.or_else(|| catalog.recipe(&row.item)) else {
        return;
    };
    let exact = row.rate / recipe.output_rate;

    let summary = producers
        .entry(row.item.clone())
        .or_insert_with(|| ProducerSummary::new(&row.item));

    if let Some(building) = &row.building {
        summary.building_names.insert(building.clone());
    }
    summary
        .per_building_output
        .insert(row.item.clone(), recipe.output_rate);
    // rate + overproduction is exactly this row's whole-building output
    *summary.total_produced.entry(row.item.clone()).or_insert(0.0) +=
        row.rate + row.overproduction;

    for input in &recipe.inputs {
        items.insert(input.item.clone());
        summary
            .per_building_input
            .insert(input.item.clone(), input.rate);
        *summary.total_consumed.entry(input.item.clone()).or_insert(0.0) += input.rate * exact;
    }

    if let Some(byproduct) = &recipe.byproduct {
        items.insert(byproduct.item.clone());
        summary
            .per_building_output
            .insert(byproduct.item.clone(), byproduct.rate);
        *summary
            .total_produced
            .entry(byproduct.item.clone())
            .or_insert(0.0) += byproduct.rate * exact;
    }

    summary.total_buildings += exact;
    summary.total_power += row.power;
}

/// Build the net-flow table for a manually placed node set. The user's
/// multiplier is the physical building count, so nothing is ceiled.
pub fn build_plan_matrix(nodes: &[PlacedNode]) -> NetMatrix {
    let mut producers: BTreeMap<String, ProducerSummary> = BTreeMap::new();
    let mut items: BTreeSet<String> = BTreeSet::new();

    for node in nodes {
        items.insert(node.item.clone());
        let summary = producers
            .entry(node.item.clone())
            .or_insert_with(|| ProducerSummary::new(&node.item));

        if let Some(building) = &node.building {
            summary.building_names.insert(building.clone());
        }
        if node.per_output > 0.0 {
            summary
                .per_building_output
                .insert(node.item.clone(), node.per_output);
            *summary.total_produced.entry(node.item.clone()).or_insert(0.0) +=
                node.per_output * node.count;
        }

        for input in &node.inputs {
            items.insert(input.item.clone());
            summary
                .per_building_input
                .insert(input.item.clone(), input.rate);
            *summary.total_consumed.entry(input.item.clone()).or_insert(0.0) +=
                input.rate * node.count;
        }

        if let Some(byproduct) = &node.byproduct {
            items.insert(byproduct.item.clone());
            summary
                .per_building_output
                .insert(byproduct.item.clone(), byproduct.rate);
            *summary
                .total_produced
                .entry(byproduct.item.clone())
                .or_insert(0.0) += byproduct.rate * node.count;
        }

        summary.total_buildings += node.count;
        summary.total_power += node.power_mw * node.count;
    }

    finish(producers, items)
}

fn finish(producers: BTreeMap<String, ProducerSummary>, items: BTreeSet<String>) -> NetMatrix {
    let items: Vec<String> = items.into_iter().collect();
    let mut column_sums = BTreeMap::new();

    for item in &items {
        let sum: f64 = producers
            .values()
            .filter_map(|summary| summary.net_total(item))
            .sum();
        column_sums.insert(item.clone(), sum);
    }

    NetMatrix {
        producers,
        items,
        column_sums,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::resolve_chain;
    use crate::models::{Byproduct, ExtractorDef, NodeSource, Recipe, RecipeInput};

    fn sample_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.add_recipe(Recipe {
            name: "Iron Plate".to_string(),
            output_item: "Iron Plate".to_string(),
            output_rate: 20.0,
            building: "Constructor".to_string(),
            power_mw: 4.0,
            inputs: vec![RecipeInput {
                item: "Iron Ingot".to_string(),
                rate: 30.0,
            }],
            byproduct: None,
        });
        catalog.add_recipe(Recipe {
            name: "Iron Ingot".to_string(),
            output_item: "Iron Ingot".to_string(),
            output_rate: 30.0,
            building: "Smelter".to_string(),
            power_mw: 4.0,
            inputs: vec![RecipeInput {
                item: "Iron Ore".to_string(),
                rate: 30.0,
            }],
            byproduct: None,
        });
        catalog.add_extractor(
            "Iron Ore",
            ExtractorDef {
                extractor_type: "Miner Mk.1".to_string(),
                rate: 60.0,
                power_mw: 5.0,
            },
        );
        catalog
    }

    #[test]
    fn target_column_reconciles_with_actual_output() {
        let catalog = sample_catalog();
        let root = resolve_chain(&catalog, "Iron Plate", 50.0).unwrap();
        let matrix = build_matrix(&catalog, &root);

        let NodeSource::Recipe { actual_output, .. } = root.source else {
            panic!("expected recipe node");
        };
        assert!((matrix.column_sums["Iron Plate"] - actual_output).abs() < 1e-9);
        assert_eq!(matrix.column_sums["Iron Plate"], 60.0);
    }

    #[test]
    fn intermediate_columns_carry_overproduction_surplus() {
        let catalog = sample_catalog();
        let root = resolve_chain(&catalog, "Iron Plate", 50.0).unwrap();
        let matrix = build_matrix(&catalog, &root);

        // ingot: required 75, whole buildings produce 90 -> +15 surplus;
        // ore: 2 miners produce 120 against 75 demand -> +45 surplus
        assert!((matrix.column_sums["Iron Ingot"] - 15.0).abs() < 1e-9);
        assert!((matrix.column_sums["Iron Ore"] - 45.0).abs() < 1e-9);
        for item in &matrix.items {
            assert!(matrix.column_sums[item] >= -1e-9);
        }
    }

    #[test]
    fn item_set_covers_consumed_and_byproduct_items() {
        let mut catalog = Catalog::new();
        catalog.add_recipe(Recipe {
            name: "Plastic".to_string(),
            output_item: "Plastic".to_string(),
            output_rate: 20.0,
            building: "Refinery".to_string(),
            power_mw: 30.0,
            inputs: vec![RecipeInput {
                item: "Crude Oil".to_string(),
                rate: 30.0,
            }],
            byproduct: Some(Byproduct {
                item: "Heavy Oil Residue".to_string(),
                rate: 10.0,
            }),
        });

        let root = resolve_chain(&catalog, "Plastic", 20.0).unwrap();
        let matrix = build_matrix(&catalog, &root);

        assert_eq!(
            matrix.items,
            vec![
                "Crude Oil".to_string(),
                "Heavy Oil Residue".to_string(),
                "Plastic".to_string()
            ]
        );
        // byproduct output shows up both in the producer cell and the sums
        let plastic = &matrix.producers["Plastic"];
        assert_eq!(plastic.net_per_building("Heavy Oil Residue"), Some(10.0));
        assert!((matrix.column_sums["Heavy Oil Residue"] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn untouched_cells_are_absent_not_zero() {
        let catalog = sample_catalog();
        let root = resolve_chain(&catalog, "Iron Plate", 60.0).unwrap();
        let matrix = build_matrix(&catalog, &root);

        let smelter = &matrix.producers["Iron Ingot"];
        assert_eq!(smelter.net_per_building("Iron Plate"), None);
        assert_eq!(smelter.net_total("Iron Plate"), None);
        assert_eq!(smelter.net_per_building("Iron Ingot"), Some(30.0));
        assert_eq!(smelter.net_per_building("Iron Ore"), Some(-30.0));
    }

    #[test]
    fn manual_raw_inputs_show_as_external_demand() {
        let mut catalog = Catalog::new();
        catalog.add_recipe(Recipe {
            name: "Fabric".to_string(),
            output_item: "Fabric".to_string(),
            output_rate: 15.0,
            building: "Assembler".to_string(),
            power_mw: 15.0,
            inputs: vec![RecipeInput {
                item: "Mycelia".to_string(),
                rate: 15.0,
            }],
            byproduct: None,
        });

        let root = resolve_chain(&catalog, "Fabric", 15.0).unwrap();
        let matrix = build_matrix(&catalog, &root);

        // no automated extraction: the column is the externally supplied demand
        assert!((matrix.column_sums["Mycelia"] + 15.0).abs() < 1e-9);
        let mycelia = &matrix.producers["Mycelia"];
        assert!(mycelia.building_names.contains("Manual"));
        assert_eq!(mycelia.total_buildings, 0.0);
    }

    #[test]
    fn plan_matrix_merges_variants_of_one_item() {
        // two placed nodes both producing Iron Plate via different variants
        let nodes = vec![
            PlacedNode {
                id: 1,
                item: "Iron Plate".to_string(),
                variant_index: 0,
                building: Some("Constructor".to_string()),
                count: 2.0,
                per_output: 20.0,
                inputs: vec![RecipeInput {
                    item: "Iron Ingot".to_string(),
                    rate: 30.0,
                }],
                byproduct: None,
                power_mw: 4.0,
            },
            PlacedNode {
                id: 2,
                item: "Iron Plate".to_string(),
                variant_index: 1,
                building: Some("Assembler".to_string()),
                count: 3.0,
                per_output: 30.0,
                inputs: vec![RecipeInput {
                    item: "Iron Ingot".to_string(),
                    rate: 37.5,
                }],
                byproduct: None,
                power_mw: 15.0,
            },
        ];

        let matrix = build_plan_matrix(&nodes);
        let plate = &matrix.producers["Iron Plate"];

        assert_eq!(plate.total_buildings, 5.0);
        assert!(plate.building_names.contains("Constructor"));
        assert!(plate.building_names.contains("Assembler"));
        assert_eq!(plate.total_power, 53.0);
        // 2x20 + 3x30 produced, 2x30 + 3x37.5 consumed
        assert!((plate.net_total("Iron Plate").unwrap() - 130.0).abs() < 1e-9);
        assert!((matrix.column_sums["Iron Ingot"] + 172.5).abs() < 1e-9);
    }

    #[test]
    fn plan_matrix_includes_byproducts_in_column_sums() {
        let nodes = vec![PlacedNode {
            id: 1,
            item: "Plastic".to_string(),
            variant_index: 0,
            building: Some("Refinery".to_string()),
            count: 2.0,
            per_output: 20.0,
            inputs: vec![RecipeInput {
                item: "Crude Oil".to_string(),
                rate: 30.0,
            }],
            byproduct: Some(Byproduct {
                item: "Heavy Oil Residue".to_string(),
                rate: 10.0,
            }),
            power_mw: 30.0,
        }];

        let matrix = build_plan_matrix(&nodes);
        assert!((matrix.column_sums["Heavy Oil Residue"] - 20.0).abs() < 1e-9);
        assert!((matrix.column_sums["Plastic"] - 40.0).abs() < 1e-9);
        assert!((matrix.column_sums["Crude Oil"] + 60.0).abs() < 1e-9);
    }

    #[test]
    fn zero_count_node_contributes_nothing() {
        let nodes = vec![PlacedNode {
            id: 1,
            item: "Wire".to_string(),
            variant_index: 0,
            building: Some("Constructor".to_string()),
            count: 0.0,
            per_output: 30.0,
            inputs: vec![RecipeInput {
                item: "Copper Ingot".to_string(),
                rate: 15.0,
            }],
            byproduct: None,
            power_mw: 4.0,
        }];

        let matrix = build_plan_matrix(&nodes);
        assert_eq!(matrix.column_sums["Wire"], 0.0);
        assert_eq!(matrix.column_sums["Copper Ingot"], 0.0);
        // the producer still appears, with balanced (not absent) cells
        assert_eq!(
            matrix.producers["Wire"].net_total("Wire"),
            Some(0.0)
        );
    }
}
