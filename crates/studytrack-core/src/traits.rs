//! Core trait definitions for profile storage and time.
//!
//! `ProfileStore` is implemented by [`crate::memory::MemoryStore`] and by the
//! document store in `studytrack-store`.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::error::StoreError;
use crate::model::{KnowledgeLevel, LearningStyle, ProfileFields, QuizRecord, StudentProfile};

// ---------------------------------------------------------------------------
// Profile store trait
// ---------------------------------------------------------------------------

/// A re-runnable mutation of one profile.
///
/// Backends may call it more than once (optimistic retries), always against
/// the latest persisted state, so it must not carry state between calls.
pub type Mutation<'a> = &'a (dyn Fn(&mut StudentProfile) -> Result<(), StoreError> + Send + Sync);

/// Persistence for student profiles, one per student id.
///
/// Implementors provide `get_or_create` and the atomic `modify` primitive;
/// every named operation is built on top of `modify`, so each one is a single
/// serialized read-modify-write of one student's profile.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Human-readable backend name (e.g. "memory").
    fn name(&self) -> &str;

    /// Return the stored profile, creating a zero-valued one on first access.
    async fn get_or_create(&self, student_id: &str) -> Result<StudentProfile, StoreError>;

    /// Apply `mutation` to the latest profile and persist the result atomically.
    ///
    /// Concurrent calls for the same student never lose each other's writes.
    /// On any error nothing is written. Returns the profile as persisted.
    async fn modify(
        &self,
        student_id: &str,
        mutation: Mutation<'_>,
    ) -> Result<StudentProfile, StoreError>;

    /// Set the level for one subject.
    async fn update_knowledge_level(
        &self,
        student_id: &str,
        subject: &str,
        level: KnowledgeLevel,
    ) -> Result<StudentProfile, StoreError> {
        let mutation = |profile: &mut StudentProfile| -> Result<(), StoreError> {
            profile.knowledge_levels.insert(subject.to_string(), level);
            Ok(())
        };
        self.modify(student_id, &mutation).await
    }

    async fn set_learning_style(
        &self,
        student_id: &str,
        style: LearningStyle,
    ) -> Result<StudentProfile, StoreError> {
        let mutation = |profile: &mut StudentProfile| -> Result<(), StoreError> {
            profile.learning_style = style;
            Ok(())
        };
        self.modify(student_id, &mutation).await
    }

    /// Append one quiz record after all earlier ones.
    async fn append_quiz_record(
        &self,
        student_id: &str,
        record: QuizRecord,
    ) -> Result<StudentProfile, StoreError> {
        let mutation = |profile: &mut StudentProfile| -> Result<(), StoreError> {
            profile.quiz_history.push(record.clone());
            Ok(())
        };
        self.modify(student_id, &mutation).await
    }

    /// Idempotent: completing a topic twice leaves a single entry.
    async fn mark_topic_completed(
        &self,
        student_id: &str,
        topic: &str,
    ) -> Result<StudentProfile, StoreError> {
        let mutation = |profile: &mut StudentProfile| -> Result<(), StoreError> {
            profile.completed_topics.insert(topic.to_string());
            Ok(())
        };
        self.modify(student_id, &mutation).await
    }

    /// Add study time. Negative contributions count as zero.
    async fn add_study_time(
        &self,
        student_id: &str,
        minutes: i64,
    ) -> Result<StudentProfile, StoreError> {
        let minutes = u64::try_from(minutes.max(0)).unwrap_or(0);
        let mutation = |profile: &mut StudentProfile| -> Result<(), StoreError> {
            profile.total_study_time_minutes =
                profile.total_study_time_minutes.saturating_add(minutes);
            Ok(())
        };
        self.modify(student_id, &mutation).await
    }

    /// Append a goal unless an identical one is already listed.
    async fn add_goal(&self, student_id: &str, goal: &str) -> Result<StudentProfile, StoreError> {
        let goal = goal.trim();
        let mutation = |profile: &mut StudentProfile| -> Result<(), StoreError> {
            if !goal.is_empty() && !profile.current_goals.iter().any(|g| g == goal) {
                profile.current_goals.push(goal.to_string());
            }
            Ok(())
        };
        self.modify(student_id, &mutation).await
    }

    /// Replace the goal list.
    async fn set_goals(
        &self,
        student_id: &str,
        goals: Vec<String>,
    ) -> Result<StudentProfile, StoreError> {
        let mutation = |profile: &mut StudentProfile| -> Result<(), StoreError> {
            profile.current_goals = goals.clone();
            Ok(())
        };
        self.modify(student_id, &mutation).await
    }

    /// Merge a sparse set of fields, overwriting only the named ones.
    async fn update_fields(
        &self,
        student_id: &str,
        fields: ProfileFields,
    ) -> Result<StudentProfile, StoreError> {
        let mutation = |profile: &mut StudentProfile| -> Result<(), StoreError> {
            fields.apply_to(profile);
            Ok(())
        };
        self.modify(student_id, &mutation).await
    }

    /// JSON view of the profile. Unknown students get a fresh profile.
    async fn snapshot(&self, student_id: &str) -> Result<Value, StoreError> {
        let profile = self.get_or_create(student_id).await?;
        Ok(profile.to_snapshot()?)
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of "today" for scheduling and streaks.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Current UTC date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Utc::now().date_naive()
    }
}

/// Always returns the same date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_store_is_object_safe() {
        fn _takes_boxed(_: Box<dyn ProfileStore>) {}
    }

    #[test]
    fn fixed_clock_returns_its_date() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        assert_eq!(FixedClock(day).today(), day);
    }
}
