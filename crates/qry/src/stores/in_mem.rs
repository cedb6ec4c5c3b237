//! 🧠 In-memory backends — a storage account and a warehouse that live in a
//! `HashMap` and a `VecDeque` respectively, rent free.
//!
//! These exist so the pipeline can rehearse: retry choreography, fan-out
//! joins, aggregation math — all without a network, a credential, or a
//! cluster having feelings. The tests lean on them hard; nothing about them
//! is test-only in spirit, they are just very small actors. 🦆

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::common::SourceObject;
use crate::discovery::StorageLocation;
use crate::errors::CommandFailure;
use crate::stores::{CommandExecutor, ObjectStore, QueryTable};

/// 🗃️ An object store made of vibes and a builder pattern.
///
/// Objects are listed in insertion order (the listing is order-stable, same
/// as the real thing). A "phantom" is listed but has no scannable body, so
/// scanning it fails — handy for proving the all-or-nothing join, or for
/// zero-length blobs that must be skipped before anyone tries.
#[derive(Debug, Default)]
pub(crate) struct InMemoryStore {
    objects: Vec<SourceObject>,
    bodies: HashMap<String, String>,
    scans: Mutex<Vec<String>>,
}

impl InMemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 📦 Add a listed object with a canned scan body.
    pub(crate) fn with_object(mut self, name: &str, size: Option<u64>, body: &str) -> Self {
        self.objects.push(SourceObject { name: name.to_string(), size });
        self.bodies.insert(name.to_string(), body.to_string());
        self
    }

    /// 👻 Add a listed object that cannot be scanned. Boo.
    pub(crate) fn with_phantom(mut self, name: &str, size: Option<u64>) -> Self {
        self.objects.push(SourceObject { name: name.to_string(), size });
        self
    }

    /// 📼 Every object a scan was attempted on, in attempt order.
    pub(crate) fn scan_log(&self) -> Vec<String> {
        self.scans.lock().expect("scan log poisoned").clone()
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn list_objects(&self, location: &StorageLocation) -> Result<Vec<SourceObject>> {
        Ok(self
            .objects
            .iter()
            .filter(|o| o.name.starts_with(location.prefix()))
            .cloned()
            .collect())
    }

    async fn scan_object(
        &self,
        _location: &StorageLocation,
        name: &str,
        _query_text: &str,
    ) -> Result<String> {
        self.scans.lock().expect("scan log poisoned").push(name.to_string());
        // The canned body stands in for the server-side scan result; the
        // query text is accepted and ignored, like most feedback.
        self.bodies
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("👻 object '{name}' has no scannable body"))
    }
}

/// 🗄️ A warehouse that follows a script.
///
/// `execute_command` pops the next outcome off the script (an exhausted
/// script means "sure, fine, success"), and every command and query text is
/// logged verbatim so tests can audit exactly what was said to the cluster
/// and how many times.
#[derive(Debug, Default)]
pub(crate) struct InMemoryExecutor {
    script: Mutex<VecDeque<Result<(), CommandFailure>>>,
    commands: Mutex<Vec<String>>,
    queries: Mutex<Vec<String>>,
    table: QueryTable,
}

impl InMemoryExecutor {
    /// 🎬 An executor that answers commands from a script, in order.
    pub(crate) fn scripted(script: Vec<Result<(), CommandFailure>>) -> Self {
        Self { script: Mutex::new(script.into()), ..Self::default() }
    }

    /// 🗄️ An agreeable executor that answers every query with `table`.
    pub(crate) fn answering(table: QueryTable) -> Self {
        Self { table, ..Self::default() }
    }

    pub(crate) fn command_log(&self) -> Vec<String> {
        self.commands.lock().expect("command log poisoned").clone()
    }

    pub(crate) fn query_log(&self) -> Vec<String> {
        self.queries.lock().expect("query log poisoned").clone()
    }
}

#[async_trait]
impl CommandExecutor for InMemoryExecutor {
    async fn execute_command(
        &self,
        _database: &str,
        command_text: &str,
    ) -> Result<(), CommandFailure> {
        self.commands.lock().expect("command log poisoned").push(command_text.to_string());
        self.script
            .lock()
            .expect("script poisoned")
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn execute_query(
        &self,
        _database: &str,
        query_text: &str,
    ) -> Result<QueryTable, CommandFailure> {
        self.queries.lock().expect("query log poisoned").push(query_text.to_string());
        Ok(self.table.clone())
    }
}
