//! 📦 Common data structures — the building blocks of quarry.
//!
//! 🎬 COLD OPEN — INT. STORAGE ACCOUNT — 3:47 AM
//!
//! Ten thousand gzipped CSV blobs sit in a container, unbothered, moisturized,
//! in their lane. Somewhere a warehouse waits for them to become parquet.
//! Between the two: these structs. They carry names, sizes, and destinations.
//! They ask no questions. They are the postal workers of this codebase.
//! Please tip your postal workers. 🦆
//!
//! # Knowledge Graph 🧠
//! - `SourceObject` → produced by discovery, consumed by the partitioner
//! - `BatchGroup` → produced by the partitioner, consumed by the export submitter
//! - `DataPrepSummary` / `GroupOutcome` → the receipt the prep run hands back

use crate::errors::ExportError;

/// 🏷️ The raw-blob suffix convention: delimited text, then squished.
/// Stripped (suffix only, never mid-name) when deriving per-object destinations.
pub(crate) const RAW_BLOB_SUFFIX: &str = ".csv.gz";

/// 📄 The fixed log schema, as the warehouse spells it.
/// Shared by the export command and the external table definition so the two
/// can never drift apart at 3am.
pub(crate) const LOG_SCHEMA: &str = "Timestamp: datetime, Instance: string, Node: string, \
     Level: string, Component: string, EventId: guid, Detail: string";

/// 📦 One listed blob: a name and a size the server may or may not have felt
/// like reporting.
///
/// Immutable once listed. Lives for one enumeration pass, then retires.
/// `size` is `Option` because some listings shrug. The partitioner treats
/// unknown as 0 bytes — a policy, not an accident (see DESIGN.md).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceObject {
    /// Path relative to the container. No leading slash. No scheme. Just vibes.
    pub name: String,
    /// Byte length, if the server was in a sharing mood.
    pub size: Option<u64>,
}

impl SourceObject {
    /// 🔢 The size we partition with: reported bytes, or 0 when unknown.
    pub(crate) fn billable_size(&self) -> u64 {
        self.size.unwrap_or(0)
    }
}

/// 📦 An ordered, non-empty batch of source objects bound for one destination.
///
/// Invariant: `members` is never empty — the partitioner refuses to emit
/// hollow groups, even when the very first object is larger than the target.
/// A single oversized object still rides alone; it is never split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchGroup {
    /// Where the converted output lands. `{root}/{i}` in size-target mode,
    /// `{root}/{name minus .csv.gz}` in one-group-per-object mode.
    pub destination: String,
    /// The members, in discovery order. Concatenating all groups' members
    /// reproduces the original listing exactly.
    pub members: Vec<SourceObject>,
}

/// 🧾 What happened to one export group. The submitter is the sole author.
#[derive(Debug)]
pub struct GroupOutcome {
    pub destination: String,
    /// `Ok(attempts)` on success (how many submissions it took),
    /// `Err` when the warehouse said no, permanently.
    pub result: Result<u32, ExportError>,
}

/// 🧾 The receipt for one data-prep entry: how many blobs we found, how many
/// groups we packed them into, and how each group fared.
#[derive(Debug)]
pub struct DataPrepSummary {
    pub object_count: usize,
    pub group_count: usize,
    pub outcomes: Vec<GroupOutcome>,
}

impl DataPrepSummary {
    /// ✅ How many groups actually made it into parquet.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }
}
