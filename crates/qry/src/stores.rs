//! 🔌 Stores — where the real I/O happens.
//!
//! 🎭 This module is the casting agency for our two external collaborators:
//! the object store (lists blobs, runs server-side scans) and the warehouse
//! command executor (swallows control commands, answers queries). Everything
//! upstream talks to the traits; only `run()` and the tests decide which
//! concrete actor shows up to set.
//!
//! # Knowledge Graph 🧠
//! - Pattern: trait seam → concrete impls (`HttpBlobStore`, `InMemoryStore`, ...)
//! - The core never re-implements timeouts: they live in here, with the clients.
//! - The in-memory pair exists so the pipeline can rehearse without a network.
//!   Like a stunt double, but for a storage account. 🦆

use anyhow::Result;
use async_trait::async_trait;

use crate::common::SourceObject;
use crate::discovery::StorageLocation;
use crate::errors::CommandFailure;

pub(crate) mod http_executor;
pub(crate) mod http_store;
#[cfg(test)]
pub(crate) mod in_mem;

pub(crate) use http_executor::HttpCommandExecutor;
pub(crate) use http_store::HttpBlobStore;

/// 🚰 The object-store collaborator: it lists, it scans, it never judges.
///
/// # Contract 📜
/// - `list_objects` returns the COMPLETE, order-stable listing at or below
///   the location's prefix. Pagination is the implementor's problem; callers
///   get one finished collection, never a partial page.
/// - `scan_object` executes a server-side filter/aggregate over ONE object
///   and returns the result as delimited rows: no header, fixed column order.
/// - Timeouts belong to the implementor. The core does not babysit sockets.
#[async_trait]
pub(crate) trait ObjectStore: std::fmt::Debug {
    /// 📄 List every object under the location's prefix. All pages. No excuses.
    async fn list_objects(&self, location: &StorageLocation) -> Result<Vec<SourceObject>>;

    /// 🔍 Run `query_text` server-side against one object; hand back the raw
    /// delimited row body. The caller parses; we just ferry bytes.
    async fn scan_object(
        &self,
        location: &StorageLocation,
        name: &str,
        query_text: &str,
    ) -> Result<String>;
}

/// 🗄️ A tabular result from the warehouse: column names plus untyped rows.
///
/// Values stay as `serde_json::Value` because the warehouse's type system is
/// its own business — we render, we compare by eye, we do not re-type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// 📡 The warehouse collaborator: control commands in, classified failures out.
///
/// # Contract 📜
/// - `execute_command` runs one control command (export, drop, create...).
///   Failure comes back as a [`CommandFailure`] whose `transient` flag is the
///   retry loop's entire worldview.
/// - `execute_query` runs one query and returns the first result table.
/// - Idempotent resubmission is ASSUMED, not verified. The submitter will
///   happily replay the identical command text after a transient failure.
#[async_trait]
pub(crate) trait CommandExecutor: std::fmt::Debug {
    async fn execute_command(
        &self,
        database: &str,
        command_text: &str,
    ) -> Result<(), CommandFailure>;

    async fn execute_query(
        &self,
        database: &str,
        query_text: &str,
    ) -> Result<QueryTable, CommandFailure>;
}
