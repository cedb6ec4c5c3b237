//! 🏗️ qry — batch export, then interrogate the evidence twice.
//!
//! 🎬 COLD OPEN: a storage account full of gzip'd CSV logs. A warehouse
//! that would really rather read parquet. And one nagging question: once
//! the data is in both places, do they even agree?
//!
//! The pipeline has exactly two acts:
//! 1. **Data prep** (`prep`) — enumerate raw blobs, pack them into
//!    byte-budgeted groups, and tell the warehouse to export each group to
//!    parquet. Transient refusals get retried; permanent ones get recorded.
//! 2. **Dual queries** (`harness`) — run the same question against the raw
//!    blobs (server-side scans, aggregated here) AND against the parquet
//!    via an external table, then print both answers side by side with
//!    stopwatches on everything.
//!
//! # Knowledge Graph 🧠
//! - `discovery` knows what exists; `partition` knows how to bin-pack it.
//! - `export` owns the retry loop; `prep` owns the per-entry choreography.
//! - `rows` parses scan bodies; `harness` aggregates and compares.
//! - `stores` holds the trait seams and every concrete backend.
//! - `report` turns all of the above into tables a human can squint at. 🦆

use anyhow::{Context, Result};
use tracing::{error, info};

pub mod app_config;
mod common;
mod discovery;
mod errors;
mod export;
mod harness;
mod partition;
mod prep;
mod report;
mod rows;
mod stores;

pub use common::{BatchGroup, SourceObject};
pub use partition::partition;

use app_config::{AppConfig, AuthenticationMode};
use stores::{HttpBlobStore, HttpCommandExecutor};

/// 🔒 Fetch the bearer token minted by whichever login flow the config
/// picked. Minting itself happens OUTSIDE this process (a CLI login, a
/// browser dance) — by the time we run, the badge is just sitting in
/// `QRY_ACCESS_TOKEN`. No badge is fine too, for anonymous endpoints.
fn resolve_access_token(mode: AuthenticationMode) -> Option<String> {
    let token = std::env::var("QRY_ACCESS_TOKEN").ok().filter(|t| !t.is_empty());
    match (&token, mode) {
        (Some(_), _) => info!("🔒 access token found (minted via {mode:?})"),
        (None, AuthenticationMode::AzCli) => {
            info!("🔒 no QRY_ACCESS_TOKEN set — proceeding unauthenticated. If the cluster disagrees, log in with the CLI and export the token.");
        }
        (None, AuthenticationMode::Browser) => {
            info!("🔒 no QRY_ACCESS_TOKEN set — proceeding unauthenticated. If the cluster disagrees, do the browser login and export the token.");
        }
    }
    token
}

/// 🚀 Run the whole configured show: every data-prep entry, then every
/// query entry. One entry's failure is logged and mourned but never stops
/// its siblings — you configured five comparisons, you get five verdicts.
pub async fn run(config: AppConfig) -> Result<()> {
    let token = resolve_access_token(config.authentication);

    let store = HttpBlobStore::new(token.clone())
        .context("building the object-store client")?;
    let executor = HttpCommandExecutor::new(&config.warehouse.cluster_uri, token)
        .context("building the warehouse client")?;
    let database = &config.warehouse.database;

    if !config.data_prep.is_empty() {
        info!("📦 Data preparation: {} entries", config.data_prep.len());
    }
    for entry in &config.data_prep {
        match prep::run_data_prep(&store, &executor, database, entry).await {
            Ok(summary) => {
                println!("{}", report::render_prep_summary(&entry.origin_uri, &summary));
            }
            Err(err) => {
                // This entry never got off the ground. The next one still flies.
                error!("💀 data prep for '{}' failed: {:#}", entry.origin_uri, err);
            }
        }
    }

    if !config.queries.is_empty() {
        info!("⚖️ Query comparisons: {} entries", config.queries.len());
    }
    for entry in &config.queries {
        match harness::run_query_comparison(&store, &executor, database, entry).await {
            Ok(comparison) => println!("{}", report::render_comparison(&comparison)),
            Err(err) => {
                error!(
                    "💀 comparison '{}' @ '{}' failed: {:#}",
                    entry.query_type, entry.data_uri, err
                );
            }
        }
    }

    Ok(())
}
