//! File-system document backend: one JSON file per student.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use studytrack_core::error::StoreError;
use studytrack_core::model::validate_student_id;

use crate::document::{apply_writes, Document, DocumentBackend, FieldWrite};
use crate::locks::KeyedLocks;

/// Lock files older than this are assumed to be left over from a crashed writer.
const STALE_LOCK_AGE: Duration = Duration::from_secs(30);

/// Stores each document as `<root>/<student_id>.json`.
///
/// Commits from this process are serialized per key. Other processes are
/// excluded by a `<student_id>.lock` file held for the duration of a commit;
/// a writer that finds the lock taken reports the backend as unavailable so
/// the caller retries.
pub struct FileBackend {
    root: PathBuf,
    locks: KeyedLocks,
}

impl FileBackend {
    /// Open (creating if needed) a data directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        if !root.is_dir() {
            return Err(StoreError::Unavailable(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        tracing::debug!("file backend at {}", root.display());
        Ok(Self {
            root,
            locks: KeyedLocks::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_student_id(key)?;
        Ok(self.root.join(format!("{key}.json")))
    }

    async fn read(&self, key: &str, path: &Path) -> Result<Option<Document>, StoreError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let doc = serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            student_id: key.to_string(),
            source,
        })?;
        Ok(Some(doc))
    }
}

/// Exclusive `.lock` file stamped with an owner token.
///
/// Only the owner removes it, and only while it still carries the owner's
/// token.
struct LockFile {
    path: PathBuf,
    nonce: Uuid,
    token: String,
}

impl LockFile {
    async fn acquire(path: PathBuf) -> Result<Self, StoreError> {
        let nonce = Uuid::new_v4();
        let token = format!("{}:{nonce}", std::process::id());
        match Self::create(&path, nonce, &token).await {
            Err(StoreError::Unavailable(reason)) => {
                if !is_stale(&path).await {
                    return Err(StoreError::Unavailable(reason));
                }
                take_over_stale(&path, nonce).await?;
                Self::create(&path, nonce, &token).await
            }
            other => other,
        }
    }

    async fn create(path: &Path, nonce: Uuid, token: &str) -> Result<Self, StoreError> {
        let result = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await;
        let mut file = match result {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::Unavailable(format!(
                    "{} is locked by another writer",
                    path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };
        let stamped = async {
            file.write_all(token.as_bytes()).await?;
            file.flush().await
        };
        if let Err(e) = stamped.await {
            let _ = tokio::fs::remove_file(path).await;
            return Err(e.into());
        }
        Ok(Self {
            path: path.to_path_buf(),
            nonce,
            token: token.to_string(),
        })
    }

    /// Whether the file on disk is still this lock.
    async fn is_held(&self) -> bool {
        tokio::fs::read_to_string(&self.path)
            .await
            .is_ok_and(|content| content == self.token)
    }

    /// Private temporary path for a document written under this lock.
    fn staging_path(&self, document: &Path) -> PathBuf {
        document.with_extension(format!("json.{}.tmp", self.nonce.simple()))
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let held = std::fs::read_to_string(&self.path).is_ok_and(|content| content == self.token);
        if held {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

async fn is_stale(path: &Path) -> bool {
    let Ok(meta) = tokio::fs::metadata(path).await else {
        return false;
    };
    meta.modified()
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_LOCK_AGE)
}

/// Claim a stale lock by renaming it aside.
///
/// A rename succeeds for one writer only. If the file moved aside turns out
/// to be fresh, another writer replaced the stale lock first and it is put
/// back.
async fn take_over_stale(path: &Path, nonce: Uuid) -> Result<(), StoreError> {
    let aside = path.with_extension(format!("lock.{}.stale", nonce.simple()));
    match tokio::fs::rename(path, &aside).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(StoreError::Unavailable(format!(
                "stale lock {} was claimed by another writer",
                path.display()
            )))
        }
        Err(e) => return Err(e.into()),
    }

    if !is_stale(&aside).await {
        // Fails if yet another writer has locked in the meantime; theirs stands.
        let _ = tokio::fs::hard_link(&aside, path).await;
        let _ = tokio::fs::remove_file(&aside).await;
        return Err(StoreError::Unavailable(format!(
            "{} is locked by another writer",
            path.display()
        )));
    }

    tracing::warn!("removing stale lock {}", path.display());
    let _ = tokio::fs::remove_file(&aside).await;
    Ok(())
}

#[async_trait]
impl DocumentBackend for FileBackend {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self, key: &str) -> Result<Option<Document>, StoreError> {
        let path = self.document_path(key)?;
        self.read(key, &path).await
    }

    async fn commit(
        &self,
        key: &str,
        expected_revision: u64,
        writes: &[FieldWrite],
    ) -> Result<Option<Document>, StoreError> {
        let path = self.document_path(key)?;
        let _guard = self.locks.lock(key).await;
        let file_lock = LockFile::acquire(path.with_extension("lock")).await?;

        let mut doc = self.read(key, &path).await?.unwrap_or_default();
        if doc.revision != expected_revision {
            return Ok(None);
        }

        apply_writes(&mut doc.fields, writes);
        doc.revision += 1;

        // Write-then-rename so readers never see a half-written document.
        let tmp = file_lock.staging_path(&path);
        let content = serde_json::to_string_pretty(&doc)?;
        tokio::fs::write(&tmp, content).await?;
        if !file_lock.is_held().await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::Unavailable(format!(
                "lost {} to another writer",
                file_lock.path.display()
            )));
        }
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!("committed {} at r{}", path.display(), doc.revision);
        Ok(Some(doc))
    }
}
