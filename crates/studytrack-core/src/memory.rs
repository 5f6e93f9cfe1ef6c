//! Volatile in-process profile store.
//!
//! State lives for the lifetime of the value. Each student has their own
//! lock, so updates to one profile are serialized while different students
//! proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::error::StoreError;
use crate::model::{validate_student_id, StudentProfile};
use crate::traits::{Mutation, ProfileStore};

/// Profile store backed by a process-local map.
#[derive(Default)]
pub struct MemoryStore {
    profiles: RwLock<HashMap<String, Arc<Mutex<StudentProfile>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of profiles created so far.
    pub async fn len(&self) -> usize {
        self.profiles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn slot(&self, student_id: &str) -> Result<Arc<Mutex<StudentProfile>>, StoreError> {
        validate_student_id(student_id)?;

        if let Some(slot) = self.profiles.read().await.get(student_id) {
            return Ok(Arc::clone(slot));
        }

        let mut profiles = self.profiles.write().await;
        let slot = profiles.entry(student_id.to_string()).or_insert_with(|| {
            tracing::debug!("creating profile for {student_id}");
            Arc::new(Mutex::new(StudentProfile::new(student_id)))
        });
        Ok(Arc::clone(slot))
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_or_create(&self, student_id: &str) -> Result<StudentProfile, StoreError> {
        let slot = self.slot(student_id).await?;
        let profile = slot.lock().await;
        Ok(profile.clone())
    }

    async fn modify(
        &self,
        student_id: &str,
        mutation: Mutation<'_>,
    ) -> Result<StudentProfile, StoreError> {
        let slot = self.slot(student_id).await?;
        let mut current = slot.lock().await;

        // Work on a copy so a failed mutation leaves the stored profile intact.
        let mut next = current.clone();
        mutation(&mut next)?;
        if let Err(e) = current.verify_transition(&next) {
            tracing::warn!("{e}");
            return Err(e);
        }

        *current = next;
        Ok(current.clone())
    }
}
