//! 🔭 Discovery — turning "a URI somebody pasted into a config file" into
//! a complete, order-stable list of blobs.
//!
//! One enumeration pass per entry. The store client hides pagination; we hide
//! URI surgery. Everyone downstream gets a [`BlobCollection`] and never has to
//! think about continuation markers, which is how it should be. 🦆

use anyhow::Result;

use crate::common::SourceObject;
use crate::errors::DiscoveryError;
use crate::stores::ObjectStore;

/// 📍 A parsed source location: `https://{host}/{container}[/{prefix...}]`.
///
/// The host is the storage service, the first path segment is the container,
/// and everything after that is the listing prefix. The prefix may be empty —
/// "the whole container" is a perfectly respectable ambition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocation {
    service_uri: String,
    container: String,
    prefix: String,
}

impl StorageLocation {
    /// 🔬 Parse a location URI. Fails with [`DiscoveryError`] when the URI is
    /// missing a scheme, a host, or a container — the three things we cannot
    /// guess on your behalf.
    pub fn parse(uri: &str) -> Result<Self, DiscoveryError> {
        let bad = |message: &str| DiscoveryError {
            location: uri.to_string(),
            message: message.to_string(),
        };

        let rest = uri
            .strip_prefix("https://")
            .or_else(|| uri.strip_prefix("http://"))
            .ok_or_else(|| bad("expected an http(s) URI"))?;
        let scheme_len = uri.len() - rest.len();

        let mut segments = rest.split('/');
        let host = segments.next().filter(|h| !h.is_empty())
            .ok_or_else(|| bad("missing host"))?;
        let container = segments.next().filter(|c| !c.is_empty())
            .ok_or_else(|| bad("missing container (first path segment)"))?;
        let prefix = segments.collect::<Vec<_>>().join("/");

        Ok(Self {
            service_uri: format!("{}{}", &uri[..scheme_len], host),
            container: container.to_string(),
            prefix,
        })
    }

    /// 🏠 `https://{host}/{container}` — the root every member path hangs off.
    pub fn container_uri(&self) -> String {
        format!("{}/{}", self.service_uri, self.container)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 🔗 The fully-qualified path of one member: `{container_uri}/{name}`.
    /// This exact string is what export commands and scan requests reference.
    pub fn qualified_path(&self, name: &str) -> String {
        format!("{}/{}", self.container_uri(), name)
    }
}

/// 📚 One completed enumeration pass: the location plus everything under it.
#[derive(Debug)]
pub struct BlobCollection {
    pub location: StorageLocation,
    pub objects: Vec<SourceObject>,
}

impl BlobCollection {
    /// 🔭 Parse the URI and list every object below its prefix.
    ///
    /// Listing failures (unreachable host, unauthorized credential, the
    /// firewall on a power trip again) come back as [`DiscoveryError`] —
    /// fatal to the enclosing entry, invisible to its siblings.
    pub async fn load(store: &impl ObjectStore, uri: &str) -> Result<Self, DiscoveryError> {
        let location = StorageLocation::parse(uri)?;
        let objects = store
            .list_objects(&location)
            .await
            .map_err(|err| DiscoveryError {
                location: uri.to_string(),
                // {:#} flattens the whole anyhow chain into one line — the
                // cause usually lives two layers down.
                message: format!("{err:#}"),
            })?;
        Ok(Self { location, objects })
    }

    /// 🔍 The scannable members: everything except the zero-length decoys.
    /// Unknown sizes stay in — an unlisted size is not an empty blob.
    pub fn non_empty(&self) -> impl Iterator<Item = &SourceObject> {
        self.objects.iter().filter(|o| o.size != Some(0))
    }
}
