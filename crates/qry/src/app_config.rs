//! 🔧 App Configuration — the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the
//! fridge. In the junk drawer. Nothing." — every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! The shape mirrors what a run actually is: how to authenticate, which
//! warehouse to talk to, zero or more data-prep entries, zero or more query
//! entries. Parsing mechanics live here; MEANING lives in `prep` and
//! `harness`.

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// 🔒 How credentials get picked. A closed enum — authentication itself is
/// somebody else's capability, we only choose which somebody.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthenticationMode {
    /// Lean on the ambient CLI login. The default, because it is 2am
    /// somewhere and nobody wants a browser popup.
    #[default]
    AzCli,
    /// Interactive browser prompt.
    Browser,
}

/// 🗄️ Where the warehouse lives and which database answers the phone.
#[derive(Debug, Deserialize, Clone)]
pub struct WarehouseConfig {
    pub cluster_uri: String,
    pub database: String,
}

/// 📦 One data-prep entry: blobs from here, parquet to there, optionally
/// packed into groups of roughly this many mebibytes.
#[derive(Debug, Deserialize, Clone)]
pub struct DataPrepEntry {
    pub origin_uri: String,
    pub destination_uri: String,
    /// Byte target per group, in MiB. Absent → one group per blob.
    #[serde(default)]
    pub blob_size_target_mib: Option<u64>,
}

impl DataPrepEntry {
    /// 📏 The target in actual bytes, because the partitioner doesn't do
    /// marketing units.
    pub(crate) fn target_bytes(&self) -> Option<u64> {
        self.blob_size_target_mib.map(|mib| mib * 1024 * 1024)
    }
}

/// ⚖️ One query entry: where the data sits and which shape to ask about it.
/// The tag stays a raw string here on purpose — an unknown tag must fail
/// THAT entry at run time, not the whole config at parse time.
#[derive(Debug, Deserialize, Clone)]
pub struct QueryEntry {
    pub data_uri: String,
    pub query_type: String,
}

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub authentication: AuthenticationMode,
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub data_prep: Vec<DataPrepEntry>,
    #[serde(default)]
    pub queries: Vec<QueryEntry>,
}

/// 🚀 Load the config — from a file, from env vars, or from the sheer power
/// of hoping.
///
/// 🔧 Merges environment variables (QRY_*) with an optional TOML file.
/// No file? No problem. We trust the env. Like a golden retriever trusts
/// everyone. TOML wins on conflicts.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("QRY_"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (QRY_*). \
             The file exists in our hearts, but apparently its contents disagree with serde.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (QRY_*). \
                 No file was provided — this one's all on the environment. Classic."
            .to_string(),
    };

    config.extract().context(context_msg)
}
