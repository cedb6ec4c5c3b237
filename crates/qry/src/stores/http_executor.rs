//! 🗄️ The HTTP command executor — management and query REST calls to the
//! warehouse cluster.
//!
//! Two endpoints, same envelope: POST `{cluster}/v1/rest/mgmt` for control
//! commands, POST `{cluster}/v1/rest/query` for queries, each carrying
//! `{ "db": ..., "csl": ... }`.
//!
//! The one job that matters here is SORTING failures: request-level trouble
//! (connect refused, timeout) and 429/5xx statuses are transient — the
//! retry loop upstairs may try again. Everything else is permanent — a 400
//! will be a 400 no matter how sincerely you resubmit it. 📜

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::errors::CommandFailure;
use crate::stores::{CommandExecutor, QueryTable};

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    db: &'a str,
    csl: &'a str,
}

/// The response envelope: one or more tables, first one is the answer.
#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(rename = "Tables", default)]
    tables: Vec<WireTable>,
}

#[derive(Debug, Deserialize)]
struct WireTable {
    #[serde(rename = "Columns", default)]
    columns: Vec<WireColumn>,
    #[serde(rename = "Rows", default)]
    rows: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct WireColumn {
    #[serde(rename = "ColumnName")]
    column_name: String,
}

/// 🗄️ The real executor. One cluster, one badge, two endpoints.
#[derive(Debug)]
pub(crate) struct HttpCommandExecutor {
    client: reqwest::Client,
    cluster_uri: String,
    bearer_token: Option<String>,
}

impl HttpCommandExecutor {
    /// 🚀 Build the executor: 10s to handshake, 10 MINUTES per call.
    /// Export commands chew through a gibibyte of parquet at a time; a
    /// 30-second timeout here would be self-sabotage.
    pub(crate) fn new(cluster_uri: &str, bearer_token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(600))
            .build()
            .context("💀 The HTTP client refused to be born. Check the TLS situation and try again.")?;
        Ok(Self {
            client,
            cluster_uri: cluster_uri.trim_end_matches('/').to_string(),
            bearer_token,
        })
    }

    /// POST one envelope and sort whatever comes back into
    /// transient / permanent / actual response.
    async fn post(
        &self,
        endpoint: &str,
        database: &str,
        text: &str,
    ) -> Result<reqwest::Response, CommandFailure> {
        let url = format!("{}/v1/rest/{endpoint}", self.cluster_uri);
        trace!(%url, "🗄️ posting to warehouse");

        let mut request = self
            .client
            .post(&url)
            .json(&WireRequest { db: database, csl: text });
        if let Some(ref token) = self.bearer_token {
            request = request.bearer_auth(token);
        }

        // Never made it to the cluster (or never heard back). Worth retrying.
        let response = request.send().await.map_err(|err| {
            CommandFailure::transient(format!("request to '{url}' failed: {err}"))
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = format!("'{url}' answered {status}: {body}");
        if status.as_u16() == 429 || status.is_server_error() {
            Err(CommandFailure::transient(message))
        } else {
            Err(CommandFailure::permanent(message))
        }
    }
}

#[async_trait]
impl CommandExecutor for HttpCommandExecutor {
    async fn execute_command(
        &self,
        database: &str,
        command_text: &str,
    ) -> Result<(), CommandFailure> {
        self.post("mgmt", database, command_text).await?;
        debug!(database, "🗄️ control command accepted");
        Ok(())
    }

    async fn execute_query(
        &self,
        database: &str,
        query_text: &str,
    ) -> Result<QueryTable, CommandFailure> {
        let response = self.post("query", database, query_text).await?;
        let envelope: WireResponse = response.json().await.map_err(|err| {
            // Got a 200 but can't read it. Retrying won't teach us to read.
            CommandFailure::permanent(format!("query response was not parseable: {err}"))
        })?;

        let first = envelope.tables.into_iter().next().unwrap_or(WireTable {
            columns: Vec::new(),
            rows: Vec::new(),
        });
        Ok(QueryTable {
            columns: first.columns.into_iter().map(|c| c.column_name).collect(),
            rows: first.rows,
        })
    }
}
