//! Quiz session orchestrator.
//!
//! [`StudyEngine`] grades a batch of responses and applies every resulting
//! profile change (history, completion, SRS, XP, streak, badge) as one
//! serialized write against the injected [`ProfileStore`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::gamification::{award_badge, award_xp, mastery_badge, update_streak, GamificationSnapshot};
use crate::grading::{aggregate, round_to, GradingEngine, QuestionScores};
use crate::model::{AnswerSnapshot, QuestionKind, QuizRecord, StudentProfile};
use crate::progress::{calculate_progress, ProgressReport};
use crate::scheduler::{due_items, quality_from_score, schedule, ScheduledReview};
use crate::traits::{Clock, ProfileStore, SystemClock};

/// Message attached to the outcome of an empty batch.
pub const EMPTY_BATCH_MESSAGE: &str = "No responses provided.";

/// Thresholds and rounding used by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Overall score at or above which the topic is marked completed.
    pub completion_threshold: f64,
    /// Overall score at or above which the topic's mastery badge is awarded.
    pub badge_threshold: f64,
    /// Study minutes credited per answered question.
    pub minutes_per_question: u32,
    /// Decimal places of the overall score in a [`QuizOutcome`].
    pub score_precision: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            completion_threshold: 0.85,
            badge_threshold: 0.9,
            minutes_per_question: 2,
            score_precision: 3,
        }
    }
}

/// One answered question as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResponse {
    pub question_id: String,
    #[serde(default)]
    pub question_type: QuestionKind,
    #[serde(default)]
    pub student_answer: String,
    #[serde(default)]
    pub correct_answer: String,
    #[serde(default, alias = "question", alias = "prompt")]
    pub question_text: Option<String>,
}

impl QuizResponse {
    pub fn new(
        question_id: impl Into<String>,
        question_type: QuestionKind,
        student_answer: impl Into<String>,
        correct_answer: impl Into<String>,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            question_type,
            student_answer: student_answer.into(),
            correct_answer: correct_answer.into(),
            question_text: None,
        }
    }
}

/// Score and feedback for one question of a graded batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionFeedback {
    pub question_id: String,
    pub score: f64,
    pub feedback: String,
}

/// Result of grading a batch, reflecting only persisted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizOutcome {
    pub topic: String,
    /// Overall score, rounded to the configured precision.
    pub score: f64,
    pub questions: Vec<QuestionFeedback>,
    pub questions_answered: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub srs: Option<ScheduledReview>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gamification: Option<GamificationSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl QuizOutcome {
    fn empty(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            score: 0.0,
            questions: Vec::new(),
            questions_answered: 0,
            srs: None,
            gamification: None,
            message: Some(EMPTY_BATCH_MESSAGE.to_string()),
        }
    }
}

/// Composes grading, scheduling, and gamification over a profile store.
pub struct StudyEngine {
    store: Arc<dyn ProfileStore>,
    grader: GradingEngine,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl StudyEngine {
    pub fn new(store: Arc<dyn ProfileStore>, config: EngineConfig) -> Self {
        Self {
            store,
            grader: GradingEngine::default(),
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replace the grading strategies.
    pub fn with_grader(mut self, grader: GradingEngine) -> Self {
        self.grader = grader;
        self
    }

    /// Replace the source of "today".
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Grade a batch of responses and record the session.
    ///
    /// An empty batch returns a zero outcome without touching the store.
    /// Otherwise all profile updates are applied in a single `modify`, and
    /// the outcome is built from the profile the store returned.
    pub async fn grade_session(
        &self,
        student_id: &str,
        topic: &str,
        responses: &[QuizResponse],
    ) -> Result<QuizOutcome, StoreError> {
        if responses.is_empty() {
            tracing::debug!("empty response batch for {student_id}/{topic}");
            return Ok(QuizOutcome::empty(topic));
        }

        let mut answers = Vec::with_capacity(responses.len());
        let mut scores = QuestionScores::with_capacity(responses.len());
        for response in responses {
            let grade = self.grader.grade(
                &response.student_answer,
                &response.correct_answer,
                &response.question_type,
            );
            // A repeated id keeps only its latest score; every answer is still recorded.
            scores.insert(response.question_id.as_str(), grade.score);
            answers.push(AnswerSnapshot {
                question_id: response.question_id.clone(),
                question_text: response.question_text.clone().unwrap_or_default(),
                question_type: response.question_type.clone(),
                student_answer: response.student_answer.clone(),
                correct_answer: response.correct_answer.clone(),
                score: round_to(grade.score, 2),
                feedback: grade.feedback,
            });
        }

        let overall = aggregate(&scores);
        let today = self.clock.today();
        let question_count = u32::try_from(responses.len()).unwrap_or(u32::MAX);
        let record = QuizRecord {
            topic: topic.to_string(),
            score: overall,
            date: Some(today),
            questions_answered: question_count,
            answers: answers.clone(),
        };
        let study_minutes = question_count
            .saturating_mul(self.config.minutes_per_question)
            .max(1);
        let quality = quality_from_score(overall);
        let config = &self.config;

        let mutation = |profile: &mut StudentProfile| -> Result<(), StoreError> {
            profile.quiz_history.push(record.clone());
            if overall >= config.completion_threshold {
                profile.completed_topics.insert(topic.to_string());
            }
            schedule(&mut profile.srs, topic, i64::from(quality), today);
            award_xp(profile, study_minutes);
            update_streak(profile, today);
            if overall >= config.badge_threshold {
                award_badge(profile, &mastery_badge(topic));
            }
            Ok(())
        };
        let persisted = self.store.modify(student_id, &mutation).await?;

        let srs = persisted.srs.get(topic).cloned().map(ScheduledReview::from);
        let gamification = GamificationSnapshot::from(&persisted);

        tracing::info!(
            "{student_id}: graded {} response(s) on '{topic}', score {:.3}, quality {quality}, xp {}",
            responses.len(),
            overall,
            gamification.xp
        );

        Ok(QuizOutcome {
            topic: topic.to_string(),
            score: round_to(overall, config.score_precision),
            questions: answers
                .into_iter()
                .map(|a| QuestionFeedback {
                    question_id: a.question_id,
                    score: a.score,
                    feedback: a.feedback,
                })
                .collect(),
            questions_answered: responses.len(),
            srs,
            gamification: Some(gamification),
            message: None,
        })
    }

    /// Review one item outside a quiz and persist the new schedule.
    pub async fn review_item(
        &self,
        student_id: &str,
        item_id: &str,
        quality: i64,
    ) -> Result<ScheduledReview, StoreError> {
        let today = self.clock.today();
        let mutation = |profile: &mut StudentProfile| -> Result<(), StoreError> {
            schedule(&mut profile.srs, item_id, quality, today);
            Ok(())
        };
        let persisted = self.store.modify(student_id, &mutation).await?;
        persisted
            .srs
            .get(item_id)
            .cloned()
            .map(ScheduledReview::from)
            .ok_or_else(|| StoreError::rejected(student_id, format!("srs item '{item_id}' was not stored")))
    }

    /// Items due today or earlier, earliest first.
    pub async fn due_reviews(&self, student_id: &str) -> Result<Vec<ScheduledReview>, StoreError> {
        let profile = self.store.get_or_create(student_id).await?;
        Ok(due_items(&profile.srs, self.clock.today()))
    }

    pub async fn progress(
        &self,
        student_id: &str,
        topic: &str,
    ) -> Result<ProgressReport, StoreError> {
        let profile = self.store.get_or_create(student_id).await?;
        Ok(calculate_progress(&profile, topic))
    }

    /// Full JSON view of a profile, creating it if unseen.
    pub async fn snapshot(&self, student_id: &str) -> Result<Value, StoreError> {
        self.store.snapshot(student_id).await
    }
}
