//! 📦 Data preparation — one entry end to end: enumerate, pack, submit.
//!
//! 🎬 *[ten thousand blobs look nervously at a progress bar]*
//!
//! The choreography is strictly: discovery → partitioner → submitter.
//! Groups are submitted sequentially under a progress bar; a group that
//! fails permanently is written down and mourned, and the NEXT group still
//! gets its shot. Cross-group concurrency is permitted by contract but not
//! practiced here — the warehouse is doing a gibibyte of parquet per group,
//! it does not need us piling on. 🦆

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use crate::app_config::DataPrepEntry;
use crate::common::{DataPrepSummary, GroupOutcome};
use crate::discovery::BlobCollection;
use crate::export::submit_group;
use crate::partition::partition;
use crate::stores::{CommandExecutor, ObjectStore};

/// 📦 Run one configured data-prep entry and hand back the receipt.
///
/// Discovery failure is fatal to this entry (there is nothing to pack);
/// per-group permanent failures are recorded in the summary and do not stop
/// the siblings. The caller decides what to do about a sad summary.
pub async fn run_data_prep(
    store: &impl ObjectStore,
    executor: &impl CommandExecutor,
    database: &str,
    entry: &DataPrepEntry,
) -> Result<DataPrepSummary> {
    let collection = BlobCollection::load(store, &entry.origin_uri).await?;
    let groups = partition(&collection.objects, &entry.destination_uri, entry.target_bytes());

    info!("From {}:  {} blobs", entry.origin_uri, collection.objects.len());
    info!("To {}:  {} groups", entry.destination_uri, groups.len());

    let bar = ProgressBar::new(groups.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg}\n| [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("template string is hardcoded and valid, I checked, twice")
            .progress_chars("=>-"),
    );
    bar.set_message(format!("exporting → {}", entry.destination_uri));

    let mut outcomes = Vec::with_capacity(groups.len());
    for group in &groups {
        let outcome = match submit_group(executor, database, &collection.location, group).await {
            Ok(job) => GroupOutcome { destination: job.destination, result: Ok(job.attempts) },
            Err(export_error) => {
                // One group down. The rest of the batch neither knows nor cares.
                error!(
                    destination = %export_error.destination,
                    "💀 group export failed permanently: {:#}",
                    anyhow::Error::from(export_error.source.clone())
                );
                GroupOutcome {
                    destination: export_error.destination.clone(),
                    result: Err(export_error),
                }
            }
        };
        outcomes.push(outcome);
        bar.inc(1);
    }
    bar.finish();

    Ok(DataPrepSummary {
        object_count: collection.objects.len(),
        group_count: groups.len(),
        outcomes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CommandFailure;
    use crate::stores::in_mem::{InMemoryExecutor, InMemoryStore};

    fn the_entry(target_mib: Option<u64>) -> DataPrepEntry {
        DataPrepEntry {
            origin_uri: "https://acct.blob.example.com/raw/logs".into(),
            destination_uri: "https://acct.blob.example.com/curated/logs".into(),
            blob_size_target_mib: target_mib,
        }
    }

    fn the_store() -> InMemoryStore {
        InMemoryStore::new()
            .with_object("logs/a.csv.gz", Some(400 * 1024 * 1024), "")
            .with_object("logs/b.csv.gz", Some(200 * 1024 * 1024), "")
            .with_object("logs/c.csv.gz", Some(200 * 1024 * 1024), "")
    }

    /// 🧪 Three blobs, 512 MiB target → [{400}], [{200, 200}]. Two groups,
    /// two export commands, both landing.
    #[tokio::test]
    async fn the_one_where_an_entry_runs_front_to_back() {
        let the_executor = InMemoryExecutor::default();

        let the_summary = run_data_prep(&the_store(), &the_executor, "logs", &the_entry(Some(512)))
            .await
            .expect("prep entry should run");

        assert_eq!(the_summary.object_count, 3);
        assert_eq!(the_summary.group_count, 2);
        assert_eq!(the_summary.succeeded(), 2);
        assert_eq!(the_executor.command_log().len(), 2);
        assert_eq!(
            the_summary.outcomes[0].destination,
            "https://acct.blob.example.com/curated/logs/0"
        );
    }

    /// 🧪 A permanent failure on group one is recorded, and group two is
    /// still submitted. One bad group never aborts the batch.
    #[tokio::test]
    async fn the_one_where_a_dead_group_does_not_take_hostages() {
        let the_executor = InMemoryExecutor::scripted(vec![
            Err(CommandFailure::permanent("mapping says no")),
            Ok(()),
        ]);

        let the_summary = run_data_prep(&the_store(), &the_executor, "logs", &the_entry(Some(512)))
            .await
            .expect("the entry itself still completes");

        assert_eq!(the_summary.group_count, 2);
        assert_eq!(the_summary.succeeded(), 1);
        assert!(the_summary.outcomes[0].result.is_err());
        assert!(the_summary.outcomes[1].result.is_ok());
        assert_eq!(the_executor.command_log().len(), 2);
    }

    /// 🧪 No target → pass-through mode, suffix-stripped destinations.
    #[tokio::test]
    async fn the_one_where_every_blob_travels_alone() {
        let the_executor = InMemoryExecutor::default();

        let the_summary = run_data_prep(&the_store(), &the_executor, "logs", &the_entry(None))
            .await
            .unwrap();

        assert_eq!(the_summary.group_count, 3);
        assert_eq!(
            the_summary.outcomes[0].destination,
            "https://acct.blob.example.com/curated/logs/logs/a"
        );
    }
}
