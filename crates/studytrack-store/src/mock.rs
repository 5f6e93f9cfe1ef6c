//! Mock document backend for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use studytrack_core::error::StoreError;

use crate::document::{apply_writes, Document, DocumentBackend, FieldWrite};

/// An in-process document backend that can simulate concurrent writers.
///
/// Each injected conflict makes the next commit lose a race: the stored
/// revision is bumped, as if another process had written first, and the
/// commit returns `None`.
#[derive(Default)]
pub struct MockDocuments {
    docs: Mutex<HashMap<String, Document>>,
    /// Number of commits attempted.
    commit_count: AtomicU32,
    /// Number of fetches made.
    fetch_count: AtomicU32,
    /// Commits still scheduled to lose.
    pending_conflicts: AtomicU32,
}

impl MockDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` commits fail with a revision conflict.
    pub fn inject_conflicts(&self, n: u32) {
        self.pending_conflicts.store(n, Ordering::Relaxed);
    }

    /// Store raw fields for `key` at revision 1, bypassing the profile model.
    pub async fn seed(&self, key: &str, fields: Map<String, Value>) {
        self.docs.lock().await.insert(
            key.to_string(),
            Document {
                revision: 1,
                fields,
            },
        );
    }

    /// Get the stored document for `key`.
    pub async fn document(&self, key: &str) -> Option<Document> {
        self.docs.lock().await.get(key).cloned()
    }

    /// Get the number of commits attempted against this backend.
    pub fn commit_count(&self) -> u32 {
        self.commit_count.load(Ordering::Relaxed)
    }

    /// Get the number of fetches made.
    pub fn fetch_count(&self) -> u32 {
        self.fetch_count.load(Ordering::Relaxed)
    }

    fn take_conflict(&self) -> bool {
        self.pending_conflicts
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DocumentBackend for MockDocuments {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, key: &str) -> Result<Option<Document>, StoreError> {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);
        Ok(self.docs.lock().await.get(key).cloned())
    }

    async fn commit(
        &self,
        key: &str,
        expected_revision: u64,
        writes: &[FieldWrite],
    ) -> Result<Option<Document>, StoreError> {
        self.commit_count.fetch_add(1, Ordering::Relaxed);
        let mut docs = self.docs.lock().await;
        let doc = docs.entry(key.to_string()).or_default();

        if self.take_conflict() {
            doc.revision += 1;
            return Ok(None);
        }
        if doc.revision != expected_revision {
            return Ok(None);
        }

        apply_writes(&mut doc.fields, writes);
        doc.revision += 1;
        Ok(Some(doc.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn commits_and_counts() {
        let backend = MockDocuments::new();
        let writes = [FieldWrite::Set {
            field: "xp".into(),
            value: json!(4),
        }];

        let doc = backend.commit("alice", 0, &writes).await.unwrap().unwrap();
        assert_eq!(doc.revision, 1);
        assert_eq!(backend.commit_count(), 1);
        assert_eq!(backend.document("alice").await.unwrap().fields["xp"], json!(4));
    }

    #[tokio::test]
    async fn injected_conflict_bumps_revision() {
        let backend = MockDocuments::new();
        backend.inject_conflicts(1);
        let writes = [FieldWrite::Set {
            field: "xp".into(),
            value: json!(4),
        }];

        assert!(backend.commit("alice", 0, &writes).await.unwrap().is_none());
        assert_eq!(backend.document("alice").await.unwrap().revision, 1);

        let doc = backend.commit("alice", 1, &writes).await.unwrap().unwrap();
        assert_eq!(doc.revision, 2);
    }
}
