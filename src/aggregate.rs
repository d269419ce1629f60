//! Aggregation of flattened chains and placed-node sets into totals

use std::collections::BTreeMap;

use crate::models::{AggregateTotals, PlacedNode, Row, RowKind};

/// Roll a flattened chain into power, building and extractor totals.
///
/// Counts are keyed by building or extractor name; names that differ only by
/// tier ("Miner Mk.1" vs "Miner Mk.2") stay distinct keys. Totals are plain
/// sums, no deduplication beyond the key grouping.
pub fn aggregate_totals(rows: &[Row]) -> AggregateTotals {
    let mut totals = AggregateTotals::default();

    for row in rows {
        if row.kind == RowKind::Byproduct {
            // carries no power or count by construction
            continue;
        }
        totals.power += row.power;
        if let Some(building) = &row.building {
            *totals.buildings.entry(building.clone()).or_default() += row.building_count;
        }
        if let Some(extractor) = &row.extractor {
            if row.extractor_count > 0 {
                *totals.extractors.entry(extractor.clone()).or_default() += row.extractor_count;
            }
        }
    }

    totals
}

/// Planner totals: every placed node contributes `count` buildings under its
/// building name ("Raw" when the node has no recipe) and `power * count` MW
pub fn aggregate_plan(nodes: &[PlacedNode]) -> AggregateTotals {
    let mut totals = AggregateTotals::default();

    for node in nodes {
        totals.power += node.power_mw * node.count;
        let name = node.building.clone().unwrap_or_else(|| "Raw".to_string());
        *totals.buildings.entry(name).or_default() += node.count;
    }

    totals
}

/// Summary of a production chain calculation
#[derive(Debug)]
pub struct ChainSummary {
    pub target_item: String,
    pub target_rate: f64,
    pub totals: AggregateTotals,
    pub raw_inputs: BTreeMap<String, f64>,
    pub total_overproduction: f64,
}

/// Generate a summary of the production chain
pub fn summarize_chain(rows: &[Row], target_item: &str, target_rate: f64) -> ChainSummary {
    let totals = aggregate_totals(rows);
    let mut raw_inputs = BTreeMap::new();
    let mut total_overproduction = 0.0;

    for row in rows {
        match row.kind {
            RowKind::Raw => {
                *raw_inputs.entry(row.item.clone()).or_insert(0.0) += row.rate;
            }
            RowKind::Processed => total_overproduction += row.overproduction,
            RowKind::Byproduct => {}
        }
    }

    ChainSummary {
        target_item: target_item.to_string(),
        target_rate,
        totals,
        raw_inputs,
        total_overproduction,
    }
}

impl std::fmt::Display for ChainSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Production Summary ===")?;
        writeln!(f, "Target: {} @ {:.2}/min", self.target_item, self.target_rate)?;
        writeln!(f)?;

        writeln!(f, "Buildings required:")?;
        for (name, count) in &self.totals.buildings {
            writeln!(f, "  {count:.2}x {name}")?;
        }
        for (name, count) in &self.totals.extractors {
            writeln!(f, "  {count}x {name}")?;
        }
        writeln!(f)?;

        if !self.raw_inputs.is_empty() {
            writeln!(f, "Raw inputs required:")?;
            for (name, rate) in &self.raw_inputs {
                writeln!(f, "  {name} @ {rate:.2}/min")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "Total power:    {:.2} MW", self.totals.power)?;
        writeln!(
            f,
            "Overproduction: {:.2}/min",
            self.total_overproduction
        )?;

        Ok(())
    }
}
