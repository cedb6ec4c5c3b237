//! 🍽️ Reporting — comfy tables for humans who have to eyeball two result
//! sets and decide whether the warehouse is telling the truth.
//!
//! Nothing in here persists, decides, or retries. It formats. If you're
//! reading this at 3am during an incident, I'm so sorry. At least the
//! tables look nice.

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::common::DataPrepSummary;
use crate::harness::{QueryComparison, StorageAggregate};
use crate::stores::QueryTable;

fn ts(stamp: &OffsetDateTime) -> String {
    stamp.format(&Rfc3339).unwrap_or_else(|_| "<unformattable>".into())
}

fn bare_table() -> Table {
    // NOTHING preset because we're minimalists. and also the borders looked bad.
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn json_cell(value: &serde_json::Value) -> String {
    match value {
        // Strings without their JSON quotes; everything else as-is.
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 🧮 The storage-side answer as a table.
fn aggregate_table(aggregate: &StorageAggregate) -> Table {
    let mut table = bare_table();
    match aggregate {
        StorageAggregate::Count(count) => {
            table.add_row(vec![Cell::new("Count"), Cell::new(count)]);
        }
        StorageAggregate::MinMax(None) => {
            table.add_row(vec![Cell::new("MinMax"), Cell::new("(no rows)")]);
        }
        StorageAggregate::MinMax(Some((min, max))) => {
            table.add_row(vec![Cell::new("Min"), Cell::new(ts(min))]);
            table.add_row(vec![Cell::new("Max"), Cell::new(ts(max))]);
        }
        StorageAggregate::Grouped(pairs) => {
            for (key, max) in pairs {
                table.add_row(vec![Cell::new(key), Cell::new(ts(max))]);
            }
        }
        StorageAggregate::Values(values) => {
            for value in values {
                table.add_row(vec![Cell::new(value)]);
            }
        }
        StorageAggregate::Rows(rows) => {
            for row in rows {
                table.add_row(vec![
                    Cell::new(ts(&row.timestamp)),
                    Cell::new(&row.instance),
                    Cell::new(&row.node),
                    Cell::new(&row.level),
                    Cell::new(&row.component),
                    Cell::new(&row.event_id),
                    Cell::new(&row.detail),
                ]);
            }
        }
    }
    table
}

/// 🗄️ The warehouse's warm result as a table, columns up top.
fn warehouse_table(result: &QueryTable) -> Table {
    let mut table = bare_table();
    table.add_row(result.columns.iter().map(Cell::new).collect::<Vec<_>>());
    for row in &result.rows {
        table.add_row(row.iter().map(|v| Cell::new(json_cell(v))).collect::<Vec<_>>());
    }
    table
}

/// ⚖️ Render one full comparison: both answers, all four stopwatches.
pub fn render_comparison(comparison: &QueryComparison) -> String {
    let mut timings = bare_table();
    for (label, value) in [
        ("Blob retrieval", format!("{:?}", comparison.storage.retrieval)),
        ("Storage scan", format!("{:?}", comparison.storage.scan)),
        ("Scanned blobs", comparison.storage.scanned_objects.to_string()),
        ("Scan diagnostics", comparison.storage.diagnostics.len().to_string()),
        ("Warehouse cold", format!("{:?}", comparison.warehouse.cold)),
        ("Warehouse warm", format!("{:?}", comparison.warehouse.warm)),
    ] {
        timings.add_row(vec![
            Cell::new(label).set_alignment(CellAlignment::Right),
            Cell::new(value),
        ]);
    }

    format!(
        "=== {:?} @ {} ===\n\n-- by storage query --\n{}\n\n-- by warehouse query --\n{}\n\n{}\n",
        comparison.kind,
        comparison.data_uri,
        aggregate_table(&comparison.storage.aggregate),
        warehouse_table(&comparison.warehouse.table),
        timings
    )
}

/// 🧾 Render one data-prep receipt.
pub fn render_prep_summary(origin_uri: &str, summary: &DataPrepSummary) -> String {
    let mut table = bare_table();
    for outcome in &summary.outcomes {
        let verdict = match &outcome.result {
            Ok(attempts) if *attempts == 1 => "ok".to_string(),
            Ok(attempts) => format!("ok after {attempts} attempts"),
            Err(err) => format!("FAILED: {}", err.source.message),
        };
        table.add_row(vec![Cell::new(&outcome.destination), Cell::new(verdict)]);
    }
    format!(
        "=== data prep @ {} ===\n{} blobs → {} groups ({} succeeded)\n{}\n",
        origin_uri,
        summary.object_count,
        summary.group_count,
        summary.succeeded(),
        table
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{StorageSide, WarehouseSide};
    use std::time::Duration;

    #[test]
    fn the_one_where_the_comparison_actually_shows_both_answers() {
        let the_comparison = QueryComparison {
            kind: crate::harness::QueryKind::TotalCount,
            data_uri: "https://acct.blob.example.com/curated/logs".into(),
            storage: StorageSide {
                aggregate: StorageAggregate::Count(12),
                scanned_objects: 4,
                diagnostics: Vec::new(),
                retrieval: Duration::from_millis(120),
                scan: Duration::from_millis(890),
            },
            warehouse: WarehouseSide {
                table: QueryTable {
                    columns: vec!["Count".into()],
                    rows: vec![vec![serde_json::json!(12)]],
                },
                cold: Duration::from_millis(2400),
                warm: Duration::from_millis(310),
            },
        };

        let the_rendering = render_comparison(&the_comparison);

        assert!(the_rendering.contains("TotalCount"));
        assert!(the_rendering.contains("12"));
        assert!(the_rendering.contains("by storage query"));
        assert!(the_rendering.contains("by warehouse query"));
        assert!(the_rendering.contains("Warehouse cold"));
    }

    #[test]
    fn the_one_where_string_cells_lose_their_json_quotes() {
        assert_eq!(json_cell(&serde_json::json!("auth")), "auth");
        assert_eq!(json_cell(&serde_json::json!(42)), "42");
    }
}
