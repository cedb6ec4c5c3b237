//! 📡 The HTTP object store — listing and server-side scans over REST.
//!
//! Two endpoints, no poetry:
//! - `GET  {container}?comp=list&prefix=...[&marker=...]` → one JSON page of
//!   `{name, size}` entries plus an optional continuation marker.
//! - `POST {container}/{name}?comp=query` with the filter text as the body →
//!   delimited rows, possibly gzip-squished on the wire.
//!
//! Pagination is swallowed HERE. Callers get one finished listing; the
//! marker dance is not their problem and never will be. 🦆

use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::common::SourceObject;
use crate::discovery::StorageLocation;
use crate::stores::ObjectStore;

/// One wire page of a listing.
#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    objects: Vec<ListedObject>,
    /// Present (and non-empty) when the server has more to say.
    #[serde(default)]
    next_marker: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
    /// The server may decline to report a size. We cope downstream.
    #[serde(default)]
    size: Option<u64>,
}

/// 📡 The real store client. Owns the HTTP muscle and the (externally
/// minted) bearer token. Authentication is somebody else's capability —
/// we just wear the badge we were handed.
#[derive(Debug)]
pub(crate) struct HttpBlobStore {
    client: reqwest::Client,
    bearer_token: Option<String>,
}

impl HttpBlobStore {
    /// 🚀 Build the client: 10s to handshake, 60s per call. Scans can be
    /// meaty and we're not monsters, but we will not wait forever either.
    pub(crate) fn new(bearer_token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .context("💀 The HTTP client refused to be born. Probably a missing TLS cert or a cursed system OpenSSL. Either way: tragic.")?;
        Ok(Self { client, bearer_token })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ObjectStore for HttpBlobStore {
    /// 📄 Walk every page of the listing and return the stitched whole.
    async fn list_objects(&self, location: &StorageLocation) -> Result<Vec<SourceObject>> {
        let mut objects = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(format!("{}?comp=list", location.container_uri()))
                .query(&[("prefix", location.prefix())]);
            if let Some(ref m) = marker {
                request = request.query(&[("marker", m.as_str())]);
            }

            let response = self.authorize(request).send().await.with_context(|| {
                format!("listing request to '{}' never landed", location.container_uri())
            })?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!(
                    "💀 listing '{}' was refused with {status}: {body}",
                    location.container_uri()
                );
            }

            let page: ListPage = response
                .json()
                .await
                .context("listing page was not the JSON shape we agreed on")?;
            trace!(page_len = page.objects.len(), "📄 listing page received");
            objects.extend(
                page.objects
                    .into_iter()
                    .map(|o| SourceObject { name: o.name, size: o.size }),
            );

            match page.next_marker.filter(|m| !m.is_empty()) {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        debug!(total = objects.len(), prefix = location.prefix(), "📄 listing complete");
        Ok(objects)
    }

    /// 🔍 Run the filter server-side over one object. The response body is
    /// the delimited row set; if it arrives gzip-encoded we un-squish it
    /// ourselves, because the wire is allowed to be thrifty.
    async fn scan_object(
        &self,
        location: &StorageLocation,
        name: &str,
        query_text: &str,
    ) -> Result<String> {
        let url = format!("{}/{name}?comp=query", location.container_uri());
        let response = self
            .authorize(self.client.post(&url))
            .header("Accept", "text/csv")
            .body(query_text.to_string())
            .send()
            .await
            .with_context(|| format!("scan request for '{name}' never landed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("💀 scan of '{name}' was refused with {status}: {body}");
        }

        let gzipped = response
            .headers()
            .get(reqwest::header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("gzip"));

        if gzipped {
            let compressed = response.bytes().await.context("reading gzip scan body")?;
            let mut body = String::new();
            flate2::read::GzDecoder::new(compressed.as_ref())
                .read_to_string(&mut body)
                .with_context(|| format!("scan body for '{name}' claimed gzip but wasn't"))?;
            Ok(body)
        } else {
            response
                .text()
                .await
                .with_context(|| format!("reading scan body for '{name}'"))
        }
    }
}
