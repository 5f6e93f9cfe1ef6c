//! Revisioned document-per-student profile store.
//!
//! A [`DocumentBackend`] persists one JSON document per student id and
//! supports a conditional commit: a batch of [`FieldWrite`]s is applied only if
//! the stored revision still matches the one the batch was computed from.
//! [`DocumentStore`] layers the [`ProfileStore`] contract on top by diffing the
//! mutated profile into field writes and retrying on conflicts.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use studytrack_core::error::StoreError;
use studytrack_core::model::{validate_student_id, StudentProfile};
use studytrack_core::traits::{Mutation, ProfileStore};

use crate::locks::KeyedLocks;

/// Longest pause between commit attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Fields written with append semantics.
const APPEND_FIELDS: &[&str] = &["quiz_history"];

/// Fields written with add-if-absent semantics.
const UNION_FIELDS: &[&str] = &["completed_topics", "badges"];

/// A stored document and the revision it was read at.
///
/// Revision 0 means "never written".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub revision: u64,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// One field-level change in a commit.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldWrite {
    /// Replace the field's value.
    Set { field: String, value: Value },
    /// Append values to a list field, keeping duplicates.
    Append { field: String, values: Vec<Value> },
    /// Add values to a list field unless already present.
    Union { field: String, values: Vec<Value> },
}

impl FieldWrite {
    pub fn field(&self) -> &str {
        match self {
            FieldWrite::Set { field, .. }
            | FieldWrite::Append { field, .. }
            | FieldWrite::Union { field, .. } => field,
        }
    }
}

/// Apply a batch of writes to a document's fields in order.
///
/// List writes against a missing or non-list field start from an empty list.
pub fn apply_writes(fields: &mut Map<String, Value>, writes: &[FieldWrite]) {
    for write in writes {
        match write {
            FieldWrite::Set { field, value } => {
                fields.insert(field.clone(), value.clone());
            }
            FieldWrite::Append { field, values } => {
                let mut list = take_list(fields, field);
                list.extend(values.iter().cloned());
                fields.insert(field.clone(), Value::Array(list));
            }
            FieldWrite::Union { field, values } => {
                let mut list = take_list(fields, field);
                for value in values {
                    if !list.contains(value) {
                        list.push(value.clone());
                    }
                }
                fields.insert(field.clone(), Value::Array(list));
            }
        }
    }
}

fn take_list(fields: &mut Map<String, Value>, field: &str) -> Vec<Value> {
    match fields.remove(field) {
        Some(Value::Array(list)) => list,
        _ => Vec::new(),
    }
}

/// Storage for revisioned documents keyed by student id.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Human-readable backend name (e.g. "file").
    fn name(&self) -> &str;

    /// Read a document, or `None` if it was never written.
    async fn fetch(&self, key: &str) -> Result<Option<Document>, StoreError>;

    /// Apply `writes` if the stored revision equals `expected_revision`.
    ///
    /// Returns the new document (revision incremented), or `None` when the
    /// revision moved on since it was read.
    async fn commit(
        &self,
        key: &str,
        expected_revision: u64,
        writes: &[FieldWrite],
    ) -> Result<Option<Document>, StoreError>;
}

/// How often and how patiently to retry conflicting commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay: Duration::from_millis(10),
        }
    }
}

/// [`ProfileStore`] over any [`DocumentBackend`].
pub struct DocumentStore<B> {
    backend: B,
    retry: RetryPolicy,
    locks: KeyedLocks,
}

impl<B: DocumentBackend> DocumentStore<B> {
    pub fn new(backend: B, retry: RetryPolicy) -> Self {
        Self {
            backend,
            retry,
            locks: KeyedLocks::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Load the current document and decode it. Absent documents decode to a
    /// fresh profile at revision 0.
    async fn load(&self, student_id: &str) -> Result<(u64, StudentProfile), StoreError> {
        match self.backend.fetch(student_id).await? {
            Some(doc) => Ok((doc.revision, decode(student_id, doc.fields)?)),
            None => Ok((0, StudentProfile::new(student_id))),
        }
    }

    /// Run one read-mutate-commit cycle until it commits or retries run out.
    async fn commit_with_retry(
        &self,
        student_id: &str,
        mutation: Mutation<'_>,
    ) -> Result<StudentProfile, StoreError> {
        let mut delay = self.retry.retry_delay;
        let attempts = self.retry.max_retries.saturating_add(1);

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_RETRY_DELAY);
            }

            let (revision, current) = match self.load(student_id).await {
                Ok(loaded) => loaded,
                Err(e) if e.is_retryable() => {
                    tracing::debug!("fetch of '{student_id}' failed, retrying: {e}");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let mut next = current.clone();
            mutation(&mut next)?;
            if let Err(e) = current.verify_transition(&next) {
                tracing::warn!("{e}");
                return Err(e);
            }

            let writes = if revision == 0 {
                full_writes(&next)?
            } else {
                diff_writes(&current, &next)?
            };
            if writes.is_empty() {
                return Ok(current);
            }

            match self.backend.commit(student_id, revision, &writes).await {
                Ok(Some(doc)) => return decode(student_id, doc.fields),
                Ok(None) => {
                    tracing::debug!(
                        "revision conflict on '{student_id}' at r{revision} (attempt {attempt}/{attempts})"
                    );
                }
                Err(e) if e.is_retryable() => {
                    tracing::debug!("commit of '{student_id}' failed, retrying: {e}");
                }
                Err(e) => return Err(e),
            }
        }

        tracing::warn!("giving up on '{student_id}' after {attempts} conflicting commits");
        Err(StoreError::Conflict {
            student_id: student_id.to_string(),
            attempts,
        })
    }
}

#[async_trait]
impl<B: DocumentBackend> ProfileStore for DocumentStore<B> {
    fn name(&self) -> &str {
        self.backend.name()
    }

    async fn get_or_create(&self, student_id: &str) -> Result<StudentProfile, StoreError> {
        validate_student_id(student_id)?;
        if let Some(doc) = self.backend.fetch(student_id).await? {
            return decode(student_id, doc.fields);
        }

        let create = |_: &mut StudentProfile| -> Result<(), StoreError> { Ok(()) };
        let _guard = self.locks.lock(student_id).await;
        tracing::debug!("creating profile document for {student_id}");
        self.commit_with_retry(student_id, &create).await
    }

    async fn modify(
        &self,
        student_id: &str,
        mutation: Mutation<'_>,
    ) -> Result<StudentProfile, StoreError> {
        validate_student_id(student_id)?;
        let _guard = self.locks.lock(student_id).await;
        self.commit_with_retry(student_id, mutation).await
    }
}

/// Decode stored fields into a profile, ignoring unknown fields.
pub fn decode(student_id: &str, fields: Map<String, Value>) -> Result<StudentProfile, StoreError> {
    let mut profile: StudentProfile =
        serde_json::from_value(Value::Object(fields)).map_err(|source| StoreError::Corrupt {
            student_id: student_id.to_string(),
            source,
        })?;
    profile.normalize(student_id);
    Ok(profile)
}

fn encode(profile: &StudentProfile) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(profile)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(StoreError::rejected(
            &profile.student_id,
            "profile did not encode to an object",
        )),
    }
}

/// Every field, as `Set` writes. Used for the first commit of a document.
fn full_writes(profile: &StudentProfile) -> Result<Vec<FieldWrite>, StoreError> {
    Ok(encode(profile)?
        .into_iter()
        .map(|(field, value)| FieldWrite::Set { field, value })
        .collect())
}

/// Minimal writes that turn `before` into `after`.
///
/// Quiz history becomes an append of its new tail, set-like fields become a
/// union of their new members, and any other changed field is overwritten.
fn diff_writes(
    before: &StudentProfile,
    after: &StudentProfile,
) -> Result<Vec<FieldWrite>, StoreError> {
    let old = encode(before)?;
    let mut writes = Vec::new();

    for (field, value) in encode(after)? {
        let previous = old.get(&field);
        if previous == Some(&value) {
            continue;
        }

        let previous_list = previous.and_then(Value::as_array);
        let is_append = APPEND_FIELDS.contains(&field.as_str());
        let is_union = UNION_FIELDS.contains(&field.as_str());

        match (value, previous_list) {
            (Value::Array(items), Some(prev)) if is_append => {
                let values: Vec<Value> = items.into_iter().skip(prev.len()).collect();
                if !values.is_empty() {
                    writes.push(FieldWrite::Append { field, values });
                }
            }
            (Value::Array(items), Some(prev)) if is_union => {
                let values: Vec<Value> = items.into_iter().filter(|v| !prev.contains(v)).collect();
                if !values.is_empty() {
                    writes.push(FieldWrite::Union { field, values });
                }
            }
            (value, _) => writes.push(FieldWrite::Set { field, value }),
        }
    }

    Ok(writes)
}
