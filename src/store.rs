use std::path::PathBuf;

use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::error::Result;

/// Flat JSON document store under a data directory. Documents are addressed
/// by logical paths like `sellers/matches.json`. Writes go through a temp
/// file and rename so a crash never leaves a half-written document.
///
/// Concurrency model: the scan runs single-flight and user-triggered writes
/// are infrequent, so whole-document read-modify-write is sufficient — no
/// cross-process locking.
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, doc: &str) -> PathBuf {
        self.root.join(doc)
    }

    /// Read and deserialize a document. `Ok(None)` if it does not exist.
    pub async fn read<T: DeserializeOwned>(&self, doc: &str) -> Result<Option<T>> {
        let path = self.resolve(doc);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Like `read`, but a missing or unparsable document yields the default.
    /// Used for documents where a corrupt file should not take the service
    /// down (settings, caches).
    pub async fn read_or_default<T: DeserializeOwned + Default>(&self, doc: &str) -> T {
        match self.read(doc).await {
            Ok(Some(v)) => v,
            Ok(None) => T::default(),
            Err(e) => {
                warn!("Unreadable document {doc}, falling back to default: {e}");
                T::default()
            }
        }
    }

    /// Serialize and write a document atomically (temp file + rename).
    pub async fn write<T: Serialize>(&self, doc: &str, value: &T) -> Result<()> {
        let path = self.resolve(doc);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Delete a document. Deleting a missing document is not an error.
    pub async fn delete(&self, doc: &str) -> Result<()> {
        match tokio::fs::remove_file(self.resolve(doc)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Make a username safe to embed in a document path: lowercase, and every
/// character outside `[A-Za-z0-9_-]` becomes `_`. Blocks traversal inputs
/// like `../../etc/passwd` from escaping the inventory-cache directory.
pub fn sanitize_cache_key(username: &str) -> String {
    username
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    #[test]
    fn sanitize_blocks_traversal() {
        assert_eq!(sanitize_cache_key("../../etc/passwd"), "______etc_passwd");
    }

    #[test]
    fn sanitize_lowercases_and_replaces_spaces() {
        assert_eq!(sanitize_cache_key("User With Spaces"), "user_with_spaces");
        assert_eq!(sanitize_cache_key("plain-user_01"), "plain-user_01");
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        let doc = Doc { name: "x".to_string(), count: 3 };
        store.write("sellers/test.json", &doc).await.unwrap();

        let back: Option<Doc> = store.read("sellers/test.json").await.unwrap();
        assert_eq!(back, Some(doc));
    }

    #[tokio::test]
    async fn missing_document_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        let got: Option<Doc> = store.read("nope.json").await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        store.write("a.json", &Doc { name: "a".into(), count: 1 }).await.unwrap();
        store.delete("a.json").await.unwrap();
        store.delete("a.json").await.unwrap();
        let got: Option<Doc> = store.read("a.json").await.unwrap();
        assert!(got.is_none());
    }
}
