//! Access to the document store holding site content.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::Value;

/// The validated name of a content collection, such as `pages` or `team-members`.
///
/// Names consist of ASCII letters, digits, `-` and `_`, so they are safe to use as cache keys
/// and file names.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionName(String);

impl CollectionName {
    /// Returns `None` if `name` is empty or contains other characters.
    pub fn new(name: &str) -> Option<Self> {
        let valid = !name.is_empty()
            && name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        valid.then(|| Self(name.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The document store.
///
/// Reads go through the governance layer before they reach an implementation of this trait.
#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    /// Loads all documents of a collection, or `None` if the collection does not exist.
    async fn load_collection(&self, collection: &CollectionName) -> anyhow::Result<Option<Value>>;
}

/// A [`ContentStore`] backed by JSON files, one `<collection>.json` per collection.
#[derive(Clone, Debug)]
pub struct FilesystemContentStore {
    root: PathBuf,
}

impl FilesystemContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_path(&self, collection: &CollectionName) -> PathBuf {
        self.root.join(format!("{collection}.json"))
    }
}

#[async_trait::async_trait]
impl ContentStore for FilesystemContentStore {
    async fn load_collection(&self, collection: &CollectionName) -> anyhow::Result<Option<Value>> {
        let path = self.collection_path(collection);
        tracing::trace!("Loading collection from {}", path.display());

        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()));
            }
        };

        let documents = serde_json::from_slice(&contents)
            .with_context(|| format!("invalid JSON in {}", path.display()))?;
        Ok(Some(documents))
    }
}
