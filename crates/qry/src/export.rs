//! 📤 The export submitter — one bulk-ingest command per group, retried
//! while the warehouse claims the failure was a mood and not a verdict.
//!
//! 🎬 *[a control command is POSTed. the cluster thinks about it.]*
//! *[429. the command is POSTed again, character for character identical.]*
//! *[the cluster, worn down by sheer repetition, relents.]*
//!
//! The retry loop is an explicit loop with the classification injected as a
//! capability (the executor's `CommandFailure::transient` flag), not
//! recursion — so the predicate is testable without a real network having
//! a real bad day. Retries are unbounded by contract: callers who want a
//! ceiling wrap this; the core promise is "retry while classified transient".

use tracing::{debug, info, warn};

use crate::common::{BatchGroup, LOG_SCHEMA};
use crate::discovery::StorageLocation;
use crate::errors::ExportError;
use crate::stores::CommandExecutor;

/// 📏 Size ceiling per destination shard, in bytes. One gibibyte of parquet
/// per output file before the writer rolls over.
const EXPORT_SIZE_LIMIT: u64 = 1_073_741_824;

/// 🧾 One group bound to its rendered command, after the dust settles.
/// The submitter is the sole writer of this record.
#[derive(Debug)]
pub(crate) struct ExportJob {
    pub(crate) destination: String,
    /// How many submissions it took. 1 means the warehouse behaved.
    pub(crate) attempts: u32,
}

/// 🖋️ Render the bulk-ingest control command for one group.
///
/// Every member is referenced by fully-qualified path with impersonated
/// access; output is compressed columnar, snappy inside, one-gibibyte
/// shards, non-distributed, native writer. The source side is declared as
/// the fixed seven-column log schema in csv format.
pub(crate) fn render_export_command(location: &StorageLocation, group: &BatchGroup) -> String {
    let source_paths = group
        .members
        .iter()
        .map(|m| format!("h@'{};impersonate'", location.qualified_path(&m.name)))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        ".export compressed to parquet (
    h@'{destination};impersonate'
) with(
        sizeLimit = {EXPORT_SIZE_LIMIT},
        namePrefix = '1',
        compressionType = 'snappy',
        distributed = false,
        useNativeParquetWriter = true
      )
      <|
      externaldata({LOG_SCHEMA})
      [{source_paths}]
      with(format = 'csv')",
        destination = group.destination,
    )
}

/// 📤 Submit one group, retrying transient failures with the identical
/// command text until success or a permanent verdict.
///
/// Permanent failure → [`ExportError`], fatal to THIS group only; the
/// caller carries on with the siblings. Nothing is persisted between
/// attempts beyond the command text itself — idempotent resubmission is
/// assumed, not verified.
pub(crate) async fn submit_group(
    executor: &impl CommandExecutor,
    database: &str,
    location: &StorageLocation,
    group: &BatchGroup,
) -> Result<ExportJob, ExportError> {
    let command_text = render_export_command(location, group);
    debug!(
        destination = %group.destination,
        members = group.members.len(),
        "📤 submitting export group"
    );

    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match executor.execute_command(database, &command_text).await {
            Ok(()) => {
                info!(destination = %group.destination, attempts, "✅ wrote group");
                return Ok(ExportJob { destination: group.destination.clone(), attempts });
            }
            Err(failure) if failure.transient => {
                // Same command, same text, one more lap. The warehouse said
                // "not right now", not "never".
                warn!(
                    destination = %group.destination,
                    attempt = attempts,
                    "🔁 transient export failure, resubmitting: {}",
                    failure.message
                );
            }
            Err(failure) => {
                return Err(ExportError {
                    destination: group.destination.clone(),
                    source: failure,
                });
            }
        }
    }
}
