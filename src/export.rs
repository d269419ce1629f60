//! CSV serialization of computed tables
//!
//! Pure formatting over already-computed rows and matrices; numbers are
//! written with 2 decimal places.

use crate::models::{NetMatrix, PlacedNode, Row, RowKind};

const CHAIN_HEADERS: [&str; 8] = [
    "Item",
    "Type",
    "Rate/min",
    "Building",
    "Count",
    "Power (MW)",
    "Overproduction",
    "Depth",
];

/// Serialize a flattened production chain, one line per row
pub fn chain_csv(rows: &[Row]) -> String {
    let mut lines = vec![CHAIN_HEADERS.join(",")];

    for row in rows {
        let building = row
            .building
            .as_deref()
            .or(row.extractor.as_deref())
            .unwrap_or("Raw");
        let fields = [
            escape_cell(&row.item),
            row.kind.label().to_string(),
            format!("{:.2}", row.rate),
            escape_cell(building),
            count_cell(row),
            format!("{:.2}", row.power),
            format!("{:.2}", row.overproduction),
            row.depth.to_string(),
        ];
        lines.push(fields.join(","));
    }

    lines.join("\n") + "\n"
}

fn count_cell(row: &Row) -> String {
    match row.kind {
        RowKind::Processed => format!("{:.2}", row.building_count),
        RowKind::Byproduct => "0.00".to_string(),
        RowKind::Raw => {
            if row.extractor_count > 0 {
                row.extractor_count.to_string()
            } else {
                "-".to_string()
            }
        }
    }
}

/// Serialize a placed-node set as a per-building net-flow table: one row per
/// node with a per-unit and a total column for every item, closed by a SUM
/// row carrying the matrix column sums.
pub fn plan_matrix_csv(nodes: &[PlacedNode], matrix: &NetMatrix) -> String {
    let mut headers = vec![
        "Multiplier".to_string(),
        "Building".to_string(),
        "Item".to_string(),
    ];
    for item in &matrix.items {
        headers.push(escape_cell(item));
        headers.push("TOTAL PER BUILDING".to_string());
    }
    let mut lines = vec![headers.join(",")];

    for node in nodes {
        let mut fields = vec![
            trim_number(node.count),
            escape_cell(node.building.as_deref().unwrap_or("")),
            escape_cell(&node.item),
        ];
        for item in &matrix.items {
            let per_unit = node_per_unit(node, item);
            fields.push(trim_number(per_unit));
            fields.push(trim_number(per_unit * node.count));
        }
        lines.push(fields.join(","));
    }

    let mut sum_fields = vec![String::new(), String::new(), "SUM".to_string()];
    for item in &matrix.items {
        sum_fields.push(String::new());
        sum_fields.push(trim_number(matrix.column_sums[item]));
    }
    lines.push(sum_fields.join(","));

    lines.join("\n") + "\n"
}

/// Signed per-building rate of `item` for one node: positive for the output
/// and byproduct, negative for inputs, zero when untouched
fn node_per_unit(node: &PlacedNode, item: &str) -> f64 {
    if node.item == item {
        return node.per_output;
    }
    if let Some(byproduct) = &node.byproduct {
        if byproduct.item == item {
            return byproduct.rate;
        }
    }
    match node.inputs.iter().find(|input| input.item == item) {
        Some(input) => -input.rate,
        None => 0.0,
    }
}

/// "2.50" but "3" for whole numbers, the way spreadsheets expect multipliers
fn trim_number(value: f64) -> String {
    let formatted = format!("{value:.2}");
    match formatted.trim_end_matches('0').trim_end_matches('.') {
        "" | "-" => "0".to_string(),
        trimmed => trimmed.to_string(),
    }
}

fn escape_cell(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
