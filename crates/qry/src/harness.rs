//! ⚖️ The dual-query harness — ask the blobs, ask the warehouse, compare.
//!
//! 🎬 COLD OPEN — INT. DATA TEAM STANDUP — 9:03 AM
//!
//! "The counts don't match." Four words. A whole sprint dies.
//! Was it the export? The external table? A blob nobody converted?
//! This module exists so that question gets answered by a table on a screen
//! instead of a week of archaeology: the same intent runs once against the
//! raw objects (parallel server-side scans, merged here) and once against
//! the warehouse (cold, then warm), and both answers land side by side.
//!
//! # Knowledge Graph 🧠
//! - One [`QueryKind`] variant = one query shape. Its storage text, its
//!   warehouse text, and its merge rule all live here, together, on purpose.
//!   Scattered conditionals are how codebases get haunted.
//! - Fan-out: one task per non-empty blob, `join_all` barrier. All
//!   succeed or the comparison fails. In-flight siblings are not hunted
//!   down, their results are simply never read.
//! - Diagnostics ride back INSIDE each task's result, not through a shared
//!   callback. No shared mutable state crosses the fan-out. None. 🔒

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::app_config::QueryEntry;
use crate::common::LOG_SCHEMA;
use crate::discovery::BlobCollection;
use crate::errors::UnsupportedQueryError;
use crate::rows::{self, LogRow, ScanDiagnostic};
use crate::stores::{CommandExecutor, ObjectStore, QueryTable};

/// 🗄️ The warehouse-side external table every comparison binds over.
const EXTERNAL_TABLE: &str = "StorageLogs";
/// 🏷️ The severity the filtered-count shape filters on.
const FILTER_LEVEL: &str = "Error";
/// ⏰ The threshold the time-filtered count compares against.
const TIME_THRESHOLD: &str = "2022-01-01T00:00:00Z";
/// 🎯 The opaque identifier the point lookup hunts for.
const POINT_EVENT_ID: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";

/// 🏷️ The closed set of supported query shapes. One tag, one intent,
/// two dialects, one merge rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    TotalCount,
    FilterCount,
    TimeFilterCount,
    MinMax,
    MaxBy,
    Distinct,
    PointFilter,
}

impl QueryKind {
    /// 🔬 Resolve a configured tag. An unknown tag is an
    /// [`UnsupportedQueryError`] — fatal to that entry, invisible to the
    /// rest of the evening's queries.
    pub fn from_tag(tag: &str) -> Result<Self, UnsupportedQueryError> {
        match tag {
            "TotalCount" => Ok(Self::TotalCount),
            "FilterCount" => Ok(Self::FilterCount),
            "TimeFilterCount" => Ok(Self::TimeFilterCount),
            "MinMax" => Ok(Self::MinMax),
            "MaxBy" => Ok(Self::MaxBy),
            "Distinct" => Ok(Self::Distinct),
            "PointFilter" => Ok(Self::PointFilter),
            other => Err(UnsupportedQueryError { tag: other.to_string() }),
        }
    }

    /// 🔍 The server-side scan text, one dialect.
    fn storage_query(&self) -> String {
        match self {
            Self::TotalCount => "SELECT COUNT(1) FROM BlobStorage".into(),
            Self::FilterCount => {
                format!("SELECT COUNT(1) FROM BlobStorage WHERE Level = '{FILTER_LEVEL}'")
            }
            Self::TimeFilterCount => {
                format!("SELECT COUNT(1) FROM BlobStorage WHERE Timestamp >= '{TIME_THRESHOLD}'")
            }
            Self::MinMax => "SELECT MIN(Timestamp), MAX(Timestamp) FROM BlobStorage".into(),
            Self::MaxBy => {
                "SELECT Component, MAX(Timestamp) FROM BlobStorage GROUP BY Component".into()
            }
            Self::Distinct => "SELECT DISTINCT Component FROM BlobStorage".into(),
            Self::PointFilter => {
                format!("SELECT * FROM BlobStorage WHERE EventId = '{POINT_EVENT_ID}'")
            }
        }
    }

    /// 🗄️ The warehouse text, other dialect, same intent.
    fn warehouse_query(&self) -> String {
        let table = format!("external_table('{EXTERNAL_TABLE}')");
        match self {
            Self::TotalCount => format!("{table} | count"),
            Self::FilterCount => format!("{table} | where Level == '{FILTER_LEVEL}' | count"),
            Self::TimeFilterCount => {
                format!("{table} | where Timestamp >= datetime({TIME_THRESHOLD}) | count")
            }
            Self::MinMax => format!("{table} | summarize min(Timestamp), max(Timestamp)"),
            Self::MaxBy => format!("{table} | summarize max(Timestamp) by Component"),
            Self::Distinct => format!("{table} | distinct Component"),
            Self::PointFilter => format!("{table} | where EventId == '{POINT_EVENT_ID}'"),
        }
    }
}

/// 📦 One object's parsed scan result — the typed rows for this kind.
#[derive(Debug)]
enum ObjectRows {
    Counts(Vec<i64>),
    Spans(Vec<(OffsetDateTime, OffsetDateTime)>),
    Keyed(Vec<(String, OffsetDateTime)>),
    Values(Vec<String>),
    Logs(Vec<LogRow>),
}

/// 📦 What one fan-out task brings home: its rows and its complaints.
#[derive(Debug)]
struct ScanOutcome {
    object: String,
    rows: ObjectRows,
    diagnostics: Vec<ScanDiagnostic>,
}

/// 🧮 The merged storage-side answer, one variant per query shape family.
#[derive(Debug, PartialEq)]
pub enum StorageAggregate {
    /// Sum of per-object counts.
    Count(i64),
    /// Global min of mins, max of maxes. `None` when no object had rows.
    MinMax(Option<(OffsetDateTime, OffsetDateTime)>),
    /// Per-key max after the second grouping pass, sorted by key.
    Grouped(Vec<(String, OffsetDateTime)>),
    /// Set union, deduplicated, sorted.
    Values(Vec<String>),
    /// Full rows, concatenated in object order.
    Rows(Vec<LogRow>),
}

/// 📊 The storage half of a comparison.
#[derive(Debug)]
pub struct StorageSide {
    pub aggregate: StorageAggregate,
    /// How many non-empty blobs were actually scanned.
    pub scanned_objects: usize,
    /// Malformed-row reports, merged across all scans. Never fatal.
    pub diagnostics: Vec<ScanDiagnostic>,
    pub retrieval: Duration,
    pub scan: Duration,
}

/// 🗄️ The warehouse half: the warm result plus both stopwatch readings.
/// Cold vs warm characterizes metadata warm-up cost, not correctness.
#[derive(Debug)]
pub struct WarehouseSide {
    pub table: QueryTable,
    pub cold: Duration,
    pub warm: Duration,
}

/// ⚖️ Both answers to one query intent, side by side, for exactly as long
/// as it takes to print them.
#[derive(Debug)]
pub struct QueryComparison {
    pub kind: QueryKind,
    pub data_uri: String,
    pub storage: StorageSide,
    pub warehouse: WarehouseSide,
}

/// ⚖️ Run one configured query entry against both systems.
///
/// Storage side first (enumerate, fan out, join, merge), then the warehouse
/// (rebind the external table, cold run, warm run). Any failure here is
/// fatal to THIS entry only; the caller moves on to the next one.
pub async fn run_query_comparison(
    store: &impl ObjectStore,
    executor: &impl CommandExecutor,
    database: &str,
    entry: &QueryEntry,
) -> Result<QueryComparison> {
    let kind = QueryKind::from_tag(&entry.query_type)?;
    info!(tag = %entry.query_type, uri = %entry.data_uri, "⚖️ running dual query");

    let storage = run_storage_side(store, kind, &entry.data_uri).await?;
    let warehouse = run_warehouse_side(executor, database, kind, &entry.data_uri).await?;

    Ok(QueryComparison { kind, data_uri: entry.data_uri.clone(), storage, warehouse })
}

/// 🔍 Enumerate, drop the zero-length decoys, scan everything in parallel,
/// then merge on this side of the barrier.
async fn run_storage_side(
    store: &impl ObjectStore,
    kind: QueryKind,
    data_uri: &str,
) -> Result<StorageSide> {
    let stopwatch = Instant::now();
    let collection = BlobCollection::load(store, data_uri).await?;
    let retrieval = stopwatch.elapsed();

    let query_text = kind.storage_query();
    let targets: Vec<&str> = collection.non_empty().map(|o| o.name.as_str()).collect();
    debug!(blobs = targets.len(), "🔍 fanning out: {query_text}");

    let stopwatch = Instant::now();
    // One task per blob, no ordering dependency, no shared state beyond the
    // borrowed query text. Every scan runs to completion behind the barrier;
    // errors are only collected AFTER it, so a failing scan never cancels a
    // sibling mid-flight. One failure still fails the whole comparison —
    // the siblings' answers are simply discarded, not interrupted.
    let results = futures::future::join_all(targets.iter().map(|name| {
        let location = &collection.location;
        let query_text = query_text.as_str();
        async move {
            let body = store
                .scan_object(location, name, query_text)
                .await
                .with_context(|| format!("scan of '{name}' failed"))?;
            Ok::<_, anyhow::Error>(parse_outcome(kind, name, &body))
        }
    }))
    .await;
    let scan = stopwatch.elapsed();
    let outcomes = results.into_iter().collect::<Result<Vec<_>>>()?;

    // Post-join: everything is immutable now. Split the usable from the
    // diagnostic, then merge single-threaded.
    let mut diagnostics = Vec::new();
    let mut per_object = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        for diag in &outcome.diagnostics {
            warn!(
                object = %outcome.object,
                position = diag.position,
                field = %diag.field,
                "🩺 scan diagnostic: {}",
                diag.description
            );
        }
        diagnostics.extend(outcome.diagnostics);
        per_object.push(outcome.rows);
    }

    Ok(StorageSide {
        aggregate: aggregate(kind, per_object),
        scanned_objects: targets.len(),
        diagnostics,
        retrieval,
        scan,
    })
}

/// 📄 Parse one blob's scan body into the typed rows this kind expects.
fn parse_outcome(kind: QueryKind, object: &str, body: &str) -> ScanOutcome {
    let (rows, diagnostics) = match kind {
        QueryKind::TotalCount | QueryKind::FilterCount | QueryKind::TimeFilterCount => {
            let parsed = rows::parse_counts(body);
            (ObjectRows::Counts(parsed.records), parsed.diagnostics)
        }
        QueryKind::MinMax => {
            let parsed = rows::parse_spans(body);
            (ObjectRows::Spans(parsed.records), parsed.diagnostics)
        }
        QueryKind::MaxBy => {
            let parsed = rows::parse_keyed_maxes(body);
            (ObjectRows::Keyed(parsed.records), parsed.diagnostics)
        }
        QueryKind::Distinct => {
            let parsed = rows::parse_values(body);
            (ObjectRows::Values(parsed.records), parsed.diagnostics)
        }
        QueryKind::PointFilter => {
            let parsed = rows::parse_log_rows(body);
            (ObjectRows::Logs(parsed.records), parsed.diagnostics)
        }
    };
    ScanOutcome { object: object.to_string(), rows, diagnostics }
}

/// 🧮 Merge the per-object row sets into one answer. Runs after the join,
/// single-threaded, over data nothing can mutate anymore.
fn aggregate(kind: QueryKind, per_object: Vec<ObjectRows>) -> StorageAggregate {
    match kind {
        QueryKind::TotalCount | QueryKind::FilterCount | QueryKind::TimeFilterCount => {
            let total = per_object
                .into_iter()
                .flat_map(|rows| match rows {
                    ObjectRows::Counts(counts) => counts,
                    _ => Vec::new(),
                })
                .sum();
            StorageAggregate::Count(total)
        }
        QueryKind::MinMax => {
            let merged = per_object
                .into_iter()
                .flat_map(|rows| match rows {
                    ObjectRows::Spans(spans) => spans,
                    _ => Vec::new(),
                })
                .fold(None, |acc: Option<(OffsetDateTime, OffsetDateTime)>, (min, max)| {
                    Some(match acc {
                        None => (min, max),
                        Some((lo, hi)) => (lo.min(min), hi.max(max)),
                    })
                });
            StorageAggregate::MinMax(merged)
        }
        QueryKind::MaxBy => {
            // Second grouping pass: each object already grouped locally,
            // now take the max per key across objects.
            let mut by_key: BTreeMap<String, OffsetDateTime> = BTreeMap::new();
            for rows in per_object {
                if let ObjectRows::Keyed(pairs) = rows {
                    for (key, max) in pairs {
                        by_key
                            .entry(key)
                            .and_modify(|current| *current = (*current).max(max))
                            .or_insert(max);
                    }
                }
            }
            StorageAggregate::Grouped(by_key.into_iter().collect())
        }
        QueryKind::Distinct => {
            let mut union = BTreeSet::new();
            for rows in per_object {
                if let ObjectRows::Values(values) = rows {
                    union.extend(values);
                }
            }
            StorageAggregate::Values(union.into_iter().collect())
        }
        QueryKind::PointFilter => {
            let mut all = Vec::new();
            for rows in per_object {
                if let ObjectRows::Logs(logs) = rows {
                    all.extend(logs);
                }
            }
            StorageAggregate::Rows(all)
        }
    }
}

/// 🗄️ Rebind the external table, then run the query twice: once cold for
/// the metadata warm-up bill, once warm for the result we display.
async fn run_warehouse_side(
    executor: &impl CommandExecutor,
    database: &str,
    kind: QueryKind,
    data_uri: &str,
) -> Result<WarehouseSide> {
    executor
        .execute_command(database, &format!(".drop external table {EXTERNAL_TABLE} ifexists"))
        .await
        .context("dropping the previous external table definition")?;
    executor
        .execute_command(
            database,
            &format!(
                ".create external table {EXTERNAL_TABLE} ({LOG_SCHEMA}) \
                 kind=storage dataformat=parquet ( h@'{data_uri};impersonate' )"
            ),
        )
        .await
        .context("creating the external table definition")?;

    let query_text = kind.warehouse_query();

    let stopwatch = Instant::now();
    executor
        .execute_query(database, &query_text)
        .await
        .context("cold warehouse query")?;
    let cold = stopwatch.elapsed();

    let stopwatch = Instant::now();
    let table = executor
        .execute_query(database, &query_text)
        .await
        .context("warm warehouse query")?;
    let warm = stopwatch.elapsed();

    debug!(?cold, ?warm, "🗄️ warehouse side done");
    Ok(WarehouseSide { table, cold, warm })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::in_mem::{InMemoryExecutor, InMemoryStore};
    use time::macros::datetime;

    const MEM_URI: &str = "https://mem.store.example.com/container";

    fn entry(tag: &str) -> QueryEntry {
        QueryEntry { data_uri: MEM_URI.to_string(), query_type: tag.to_string() }
    }

    async fn compare(store: &InMemoryStore, tag: &str) -> QueryComparison {
        let the_executor = InMemoryExecutor::answering(QueryTable {
            columns: vec!["Count".into()],
            rows: vec![vec![serde_json::json!(12)]],
        });
        run_query_comparison(store, &the_executor, "logs", &entry(tag))
            .await
            .expect("comparison should succeed")
    }

    /// 🧪 Counts [3, 0, 7, 2] sum to 12, and the zero-length blob is never
    /// even scanned (it has no body; scanning it would fail the join).
    #[tokio::test]
    async fn the_one_where_counts_add_up_and_empty_blobs_sit_out() {
        let the_store = InMemoryStore::new()
            .with_object("a.csv.gz", Some(10), "3\n")
            .with_object("b.csv.gz", Some(10), "0\n")
            .with_phantom("empty.csv.gz", Some(0))
            .with_object("c.csv.gz", Some(10), "7\n")
            .with_object("d.csv.gz", None, "2\n");

        let the_comparison = compare(&the_store, "TotalCount").await;

        assert_eq!(the_comparison.storage.aggregate, StorageAggregate::Count(12));
        assert_eq!(the_comparison.storage.scanned_objects, 4);
        assert!(the_comparison.storage.diagnostics.is_empty());
    }

    /// 🧪 {a, b} ∪ {b, c} = {a, b, c}. Set math still works. Relief.
    #[tokio::test]
    async fn the_one_where_distinct_values_union_without_doubles() {
        let the_store = InMemoryStore::new()
            .with_object("1.csv.gz", Some(5), "a\nb\n")
            .with_object("2.csv.gz", Some(5), "b\nc\n");

        let the_comparison = compare(&the_store, "Distinct").await;

        assert_eq!(
            the_comparison.storage.aggregate,
            StorageAggregate::Values(vec!["a".into(), "b".into(), "c".into()])
        );
    }

    #[tokio::test]
    async fn the_one_where_min_of_mins_meets_max_of_maxes() {
        let the_store = InMemoryStore::new()
            .with_object("1.csv.gz", Some(5), "2022-02-01T00:00:00Z,2022-03-01T00:00:00Z\n")
            .with_object("2.csv.gz", Some(5), "2022-01-15T00:00:00Z,2022-02-20T00:00:00Z\n");

        let the_comparison = compare(&the_store, "MinMax").await;

        assert_eq!(
            the_comparison.storage.aggregate,
            StorageAggregate::MinMax(Some((
                datetime!(2022-01-15 0:00 UTC),
                datetime!(2022-03-01 0:00 UTC),
            )))
        );
    }

    /// 🧪 The second grouping pass: per-key max ACROSS objects, keys sorted.
    #[tokio::test]
    async fn the_one_where_each_component_keeps_only_its_latest() {
        let the_store = InMemoryStore::new()
            .with_object(
                "1.csv.gz",
                Some(5),
                "auth,2022-01-01T00:00:00Z\nbilling,2022-05-01T00:00:00Z\n",
            )
            .with_object("2.csv.gz", Some(5), "auth,2022-04-01T00:00:00Z\n");

        let the_comparison = compare(&the_store, "MaxBy").await;

        assert_eq!(
            the_comparison.storage.aggregate,
            StorageAggregate::Grouped(vec![
                ("auth".into(), datetime!(2022-04-01 0:00 UTC)),
                ("billing".into(), datetime!(2022-05-01 0:00 UTC)),
            ])
        );
    }

    #[tokio::test]
    async fn the_one_where_a_point_lookup_returns_whole_rows() {
        let the_store = InMemoryStore::new().with_object(
            "1.csv.gz",
            Some(5),
            "2022-03-04T05:06:07Z,i1,n1,Error,auth,0f8fad5b-d9cb-469f-a165-70867728950e,bad login\n",
        );

        let the_comparison = compare(&the_store, "PointFilter").await;

        match the_comparison.storage.aggregate {
            StorageAggregate::Rows(ref rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].component, "auth");
            }
            ref other => panic!("expected rows, got {other:?}"),
        }
    }

    /// 🧪 One mangled line = one diagnostic, zero aborted scans.
    #[tokio::test]
    async fn the_one_where_a_mangled_row_complains_but_nobody_dies() {
        let the_store = InMemoryStore::new()
            .with_object("ok.csv.gz", Some(5), "3\n")
            .with_object("meh.csv.gz", Some(5), "4\nbanana\n");

        let the_comparison = compare(&the_store, "TotalCount").await;

        assert_eq!(the_comparison.storage.aggregate, StorageAggregate::Count(7));
        assert_eq!(the_comparison.storage.diagnostics.len(), 1);
        assert_eq!(the_comparison.storage.diagnostics[0].field, "Count");
    }

    /// 🧪 One unscannable blob fails the WHOLE comparison. The barrier is
    /// all-or-nothing and it does not negotiate.
    #[tokio::test]
    async fn the_one_where_one_ghost_sinks_the_whole_join() {
        let the_store = InMemoryStore::new()
            .with_object("ok.csv.gz", Some(5), "3\n")
            .with_phantom("ghost.csv.gz", Some(5));
        let the_executor = InMemoryExecutor::default();

        let the_error =
            run_query_comparison(&the_store, &the_executor, "logs", &entry("TotalCount"))
                .await
                .unwrap_err();

        assert!(format!("{the_error:#}").contains("ghost.csv.gz"));
    }

    /// 🧪 Discarded is not the same as cancelled: the ghost fails FIRST in
    /// listing order, and the sibling behind it still gets its scan before
    /// the error surfaces. The barrier waits for everyone.
    #[tokio::test]
    async fn the_one_where_a_failing_scan_does_not_cancel_its_siblings() {
        let the_store = InMemoryStore::new()
            .with_phantom("ghost.csv.gz", Some(5))
            .with_object("ok.csv.gz", Some(5), "3\n");
        let the_executor = InMemoryExecutor::default();

        let the_error =
            run_query_comparison(&the_store, &the_executor, "logs", &entry("TotalCount"))
                .await
                .unwrap_err();

        assert!(format!("{the_error:#}").contains("ghost.csv.gz"));
        let the_scans = the_store.scan_log();
        assert!(the_scans.contains(&"ok.csv.gz".to_string()));
        assert_eq!(the_scans.len(), 2);
    }

    #[tokio::test]
    async fn the_one_where_an_unknown_tag_is_turned_away_at_the_door() {
        let the_store = InMemoryStore::new();
        let the_executor = InMemoryExecutor::default();

        let the_error =
            run_query_comparison(&the_store, &the_executor, "logs", &entry("CountAllTheThings"))
                .await
                .unwrap_err();

        let the_unsupported = the_error
            .downcast_ref::<crate::errors::UnsupportedQueryError>()
            .expect("should be an UnsupportedQueryError");
        assert_eq!(the_unsupported.tag, "CountAllTheThings");
    }

    /// 🧪 The warehouse choreography: drop, create, query, query. In that
    /// order. Cold then warm, same text both times.
    #[tokio::test]
    async fn the_one_where_the_warehouse_is_asked_twice_on_purpose() {
        let the_store = InMemoryStore::new().with_object("a.csv.gz", Some(5), "3\n");
        let the_executor = InMemoryExecutor::answering(QueryTable::default());

        run_query_comparison(&the_store, &the_executor, "logs", &entry("TotalCount"))
            .await
            .unwrap();

        let the_commands = the_executor.command_log();
        assert_eq!(the_commands.len(), 2);
        assert!(the_commands[0].starts_with(".drop external table StorageLogs"));
        assert!(the_commands[1].starts_with(".create external table StorageLogs"));
        assert!(the_commands[1].contains("dataformat=parquet"));
        assert!(the_commands[1].contains(&format!("h@'{MEM_URI};impersonate'")));

        let the_queries = the_executor.query_log();
        assert_eq!(the_queries.len(), 2);
        assert_eq!(the_queries[0], the_queries[1]);
        assert_eq!(the_queries[0], "external_table('StorageLogs') | count");
    }
}
