//! Core data model types for studytrack.
//!
//! A [`StudentProfile`] is the aggregate root: one per student id, created
//! lazily and never deleted. Quiz history is append-only, completed topics and
//! badges only grow, and xp and study time never decrease. Backends enforce
//! those rules through [`StudentProfile::verify_transition`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::StoreError;

/// Longest accepted student id.
pub const MAX_STUDENT_ID_LEN: usize = 128;

/// Default SM-2 e-factor for a fresh item.
pub const DEFAULT_EFACTOR: f64 = 2.5;

/// Self-reported or assessed level in one subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for KnowledgeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnowledgeLevel::Beginner => write!(f, "beginner"),
            KnowledgeLevel::Intermediate => write!(f, "intermediate"),
            KnowledgeLevel::Advanced => write!(f, "advanced"),
        }
    }
}

impl FromStr for KnowledgeLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(KnowledgeLevel::Beginner),
            "intermediate" => Ok(KnowledgeLevel::Intermediate),
            "advanced" => Ok(KnowledgeLevel::Advanced),
            other => Err(format!("unknown knowledge level: {other}")),
        }
    }
}

/// Preferred way of presenting material.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningStyle {
    #[default]
    Visual,
    Verbal,
    Practical,
}

impl fmt::Display for LearningStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LearningStyle::Visual => write!(f, "visual"),
            LearningStyle::Verbal => write!(f, "verbal"),
            LearningStyle::Practical => write!(f, "practical"),
        }
    }
}

impl FromStr for LearningStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "visual" => Ok(LearningStyle::Visual),
            "verbal" => Ok(LearningStyle::Verbal),
            "practical" => Ok(LearningStyle::Practical),
            other => Err(format!("unknown learning style: {other}")),
        }
    }
}

/// Kind of quiz question, which selects the grading strategy.
///
/// Parsing never fails: unrecognized kinds are kept verbatim in
/// [`QuestionKind::Other`] so grading can report them as a soft failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionKind {
    MultipleChoice,
    #[default]
    ShortAnswer,
    Coding,
    Other(String),
}

impl QuestionKind {
    pub fn as_str(&self) -> &str {
        match self {
            QuestionKind::MultipleChoice => "multiple_choice",
            QuestionKind::ShortAnswer => "short_answer",
            QuestionKind::Coding => "coding",
            QuestionKind::Other(raw) => raw,
        }
    }
}

impl From<&str> for QuestionKind {
    fn from(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "multiple_choice" => QuestionKind::MultipleChoice,
            "short_answer" => QuestionKind::ShortAnswer,
            "coding" => QuestionKind::Coding,
            _ => QuestionKind::Other(raw.to_string()),
        }
    }
}

impl From<String> for QuestionKind {
    fn from(raw: String) -> Self {
        QuestionKind::from(raw.as_str())
    }
}

impl From<QuestionKind> for String {
    fn from(kind: QuestionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One graded answer inside a quiz record. Immutable once written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerSnapshot {
    pub question_id: String,
    pub question_text: String,
    pub question_type: QuestionKind,
    pub student_answer: String,
    pub correct_answer: String,
    /// Per-question score in [0, 1], rounded to two decimals.
    pub score: f64,
    pub feedback: String,
}

/// A single quiz attempt. Immutable once appended to a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizRecord {
    #[serde(default)]
    pub topic: String,
    /// Aggregate score in [0, 1].
    #[serde(default)]
    pub score: f64,
    /// `None` when a stored record carries no readable date.
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub questions_answered: u32,
    #[serde(default)]
    pub answers: Vec<AnswerSnapshot>,
}

/// Spaced-repetition state for one review item (a topic name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrsItem {
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub interval_days: u32,
    #[serde(default)]
    pub repetitions: u32,
    #[serde(default = "default_efactor")]
    pub efactor: f64,
    #[serde(default, deserialize_with = "lenient_date")]
    pub last_review: Option<NaiveDate>,
}

fn default_efactor() -> f64 {
    DEFAULT_EFACTOR
}

impl SrsItem {
    /// A never-reviewed item.
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            interval_days: 0,
            repetitions: 0,
            efactor: DEFAULT_EFACTOR,
            last_review: None,
        }
    }

    /// `last_review + interval_days`, or `None` for an item never reviewed.
    pub fn next_review(&self) -> Option<NaiveDate> {
        self.last_review
            .and_then(|d| d.checked_add_days(Days::new(u64::from(self.interval_days))))
    }
}

/// Long-lived state for one learner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudentProfile {
    pub student_id: String,
    pub knowledge_levels: BTreeMap<String, KnowledgeLevel>,
    pub learning_style: LearningStyle,
    pub quiz_history: Vec<QuizRecord>,
    pub completed_topics: BTreeSet<String>,
    pub current_goals: Vec<String>,
    pub total_study_time_minutes: u64,
    pub xp: u64,
    pub streak: u32,
    #[serde(deserialize_with = "lenient_date")]
    pub last_study_date: Option<NaiveDate>,
    pub badges: BTreeSet<String>,
    pub srs: BTreeMap<String, SrsItem>,
}

impl StudentProfile {
    /// A zero-valued profile.
    pub fn new(student_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            ..Default::default()
        }
    }

    /// Repair identity fields after decoding a stored document.
    ///
    /// The document key wins over whatever `student_id` the body carries, and
    /// SRS entries missing an `item_id` take it from their map key.
    pub fn normalize(&mut self, student_id: &str) {
        if self.student_id != student_id {
            self.student_id = student_id.to_string();
        }
        for (key, item) in self.srs.iter_mut() {
            if item.item_id.is_empty() {
                item.item_id = key.clone();
            }
        }
    }

    /// JSON view consumed by external collaborators.
    ///
    /// Each SRS entry additionally carries its derived `next_review` date.
    pub fn to_snapshot(&self) -> Result<Value, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Some(Value::Object(srs)) = value.get_mut("srs") {
            for (key, entry) in srs.iter_mut() {
                let next = self
                    .srs
                    .get(key)
                    .and_then(SrsItem::next_review)
                    .map(|d| d.to_string());
                if let Value::Object(fields) = entry {
                    fields.insert("next_review".into(), next.map_or(Value::Null, Value::String));
                }
            }
        }
        Ok(value)
    }

    /// Check that `next` is a legal successor of `self`.
    ///
    /// Quiz history must keep every earlier record in place, completed topics
    /// and badges may only gain members, and xp and study time may not drop.
    pub fn verify_transition(&self, next: &StudentProfile) -> Result<(), StoreError> {
        let reject = |reason: &str| Err(StoreError::rejected(&self.student_id, reason));

        if next.student_id != self.student_id {
            return reject("student_id is immutable");
        }
        if next.quiz_history.len() < self.quiz_history.len()
            || next.quiz_history[..self.quiz_history.len()] != self.quiz_history[..]
        {
            return reject("quiz_history is append-only");
        }
        if !next.completed_topics.is_superset(&self.completed_topics) {
            return reject("completed_topics cannot lose entries");
        }
        if !next.badges.is_superset(&self.badges) {
            return reject("badges cannot be revoked");
        }
        if next.xp < self.xp {
            return reject("xp cannot decrease");
        }
        if next.total_study_time_minutes < self.total_study_time_minutes {
            return reject("total_study_time_minutes cannot decrease");
        }
        Ok(())
    }
}

/// Sparse update merged by [`crate::traits::ProfileStore::update_fields`].
///
/// Named fields overwrite their current value, except `badges`, which are
/// unioned into the existing set since badges are never revoked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileFields {
    pub srs: Option<BTreeMap<String, SrsItem>>,
    pub xp: Option<u64>,
    pub streak: Option<u32>,
    pub last_study_date: Option<NaiveDate>,
    pub badges: Option<BTreeSet<String>>,
}

impl ProfileFields {
    pub fn is_empty(&self) -> bool {
        self.srs.is_none()
            && self.xp.is_none()
            && self.streak.is_none()
            && self.last_study_date.is_none()
            && self.badges.is_none()
    }

    pub fn apply_to(&self, profile: &mut StudentProfile) {
        if let Some(srs) = &self.srs {
            profile.srs = srs.clone();
        }
        if let Some(xp) = self.xp {
            profile.xp = xp;
        }
        if let Some(streak) = self.streak {
            profile.streak = streak;
        }
        if let Some(date) = self.last_study_date {
            profile.last_study_date = Some(date);
        }
        if let Some(badges) = &self.badges {
            profile.badges.extend(badges.iter().cloned());
        }
    }
}

/// Reject ids that are empty, oversized, or unsafe as a document key.
pub fn validate_student_id(student_id: &str) -> Result<(), StoreError> {
    let bad = student_id.trim().is_empty()
        || student_id.len() > MAX_STUDENT_ID_LEN
        || student_id == "."
        || student_id == ".."
        || student_id
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control());
    if bad {
        return Err(StoreError::InvalidStudentId(student_id.to_string()));
    }
    Ok(())
}

/// Dates that fail to parse read as absent instead of failing the document.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn question_kind_parse_is_soft() {
        assert_eq!(QuestionKind::from("multiple_choice"), QuestionKind::MultipleChoice);
        assert_eq!(QuestionKind::from("SHORT_ANSWER"), QuestionKind::ShortAnswer);
        assert_eq!(QuestionKind::from(" coding "), QuestionKind::Coding);
        assert_eq!(
            QuestionKind::from("essay"),
            QuestionKind::Other("essay".into())
        );
        assert_eq!(QuestionKind::Other("essay".into()).to_string(), "essay");
    }

    #[test]
    fn question_kind_serde_uses_plain_strings() {
        let json = serde_json::to_string(&QuestionKind::MultipleChoice).unwrap();
        assert_eq!(json, "\"multiple_choice\"");
        let kind: QuestionKind = serde_json::from_str("\"matching\"").unwrap();
        assert_eq!(kind, QuestionKind::Other("matching".into()));
    }

    #[test]
    fn level_and_style_parse() {
        assert_eq!(
            "Advanced".parse::<KnowledgeLevel>().unwrap(),
            KnowledgeLevel::Advanced
        );
        assert!("expert".parse::<KnowledgeLevel>().is_err());
        assert_eq!("verbal".parse::<LearningStyle>().unwrap(), LearningStyle::Verbal);
        assert_eq!(LearningStyle::default(), LearningStyle::Visual);
    }

    #[test]
    fn next_review_is_derived() {
        let mut item = SrsItem::new("algebra");
        assert_eq!(item.next_review(), None);
        item.last_review = Some(date("2025-01-30"));
        item.interval_days = 6;
        assert_eq!(item.next_review(), Some(date("2025-02-05")));
    }

    #[test]
    fn srs_item_decode_filters_unknown_fields() {
        let raw = r#"{
            "item_id": "history",
            "interval_days": 6,
            "repetitions": 2,
            "efactor": 2.6,
            "last_review": "2025-03-01",
            "next_review": "2025-03-07",
            "legacy_flag": true
        }"#;
        let item: SrsItem = serde_json::from_str(raw).unwrap();
        assert_eq!(item.interval_days, 6);
        assert_eq!(item.repetitions, 2);
        assert_eq!(item.last_review, Some(date("2025-03-01")));
    }

    #[test]
    fn srs_item_decode_fills_missing_fields() {
        let item: SrsItem = serde_json::from_str(r#"{"last_review": "not a date"}"#).unwrap();
        assert_eq!(item.efactor, DEFAULT_EFACTOR);
        assert_eq!(item.repetitions, 0);
        assert_eq!(item.last_review, None);
    }

    #[test]
    fn profile_decode_tolerates_partial_documents() {
        let raw = r#"{"xp": 12, "last_study_date": "yesterday", "srs": {"math": {}}}"#;
        let mut profile: StudentProfile = serde_json::from_str(raw).unwrap();
        profile.normalize("bob");
        assert_eq!(profile.student_id, "bob");
        assert_eq!(profile.xp, 12);
        assert_eq!(profile.last_study_date, None);
        assert_eq!(profile.srs["math"].item_id, "math");
        assert_eq!(profile.learning_style, LearningStyle::Visual);
    }

    #[test]
    fn quiz_record_with_unreadable_date_still_decodes() {
        let raw = r#"{
            "quiz_history": [
                {"topic": "algebra", "score": 0.5, "date": "03/01/2025", "questions_answered": 2},
                {"topic": "algebra", "score": 1.0, "date": "2025-03-02", "questions_answered": 1}
            ]
        }"#;
        let profile: StudentProfile = serde_json::from_str(raw).unwrap();
        assert_eq!(profile.quiz_history.len(), 2);
        assert_eq!(profile.quiz_history[0].date, None);
        assert_eq!(profile.quiz_history[0].score, 0.5);
        assert_eq!(profile.quiz_history[1].date, Some(date("2025-03-02")));
        assert!(profile.quiz_history[1].answers.is_empty());
    }

    #[test]
    fn snapshot_has_every_field_and_next_review() {
        let mut profile = StudentProfile::new("alice");
        let mut item = SrsItem::new("physics");
        item.last_review = Some(date("2025-01-01"));
        item.interval_days = 1;
        profile.srs.insert("physics".into(), item);

        let snapshot = profile.to_snapshot().unwrap();
        for field in [
            "student_id",
            "knowledge_levels",
            "learning_style",
            "quiz_history",
            "completed_topics",
            "current_goals",
            "total_study_time_minutes",
            "xp",
            "streak",
            "last_study_date",
            "badges",
            "srs",
        ] {
            assert!(snapshot.get(field).is_some(), "missing {field}");
        }
        assert_eq!(snapshot["srs"]["physics"]["next_review"], "2025-01-02");
        assert_eq!(snapshot["learning_style"], "visual");
    }

    #[test]
    fn transition_rejects_history_rewrite() {
        let mut before = StudentProfile::new("alice");
        before.quiz_history.push(QuizRecord {
            topic: "a".into(),
            score: 1.0,
            date: Some(date("2025-01-01")),
            questions_answered: 1,
            answers: vec![],
        });
        let mut after = before.clone();
        after.quiz_history[0].score = 0.0;
        assert!(matches!(
            before.verify_transition(&after),
            Err(StoreError::Rejected { .. })
        ));

        let mut appended = before.clone();
        appended.quiz_history.push(before.quiz_history[0].clone());
        assert!(before.verify_transition(&appended).is_ok());
    }

    #[test]
    fn transition_rejects_shrinking_state() {
        let mut before = StudentProfile::new("alice");
        before.xp = 10;
        before.badges.insert("mastery_math".into());

        let mut lower_xp = before.clone();
        lower_xp.xp = 9;
        assert!(before.verify_transition(&lower_xp).is_err());

        let mut revoked = before.clone();
        revoked.badges.clear();
        assert!(before.verify_transition(&revoked).is_err());

        let mut renamed = before.clone();
        renamed.student_id = "mallory".into();
        assert!(before.verify_transition(&renamed).is_err());
    }

    #[test]
    fn profile_fields_merge_only_named_fields() {
        let mut profile = StudentProfile::new("alice");
        profile.streak = 4;
        profile.badges.insert("first".into());

        let fields = ProfileFields {
            xp: Some(7),
            badges: Some(BTreeSet::from(["second".to_string()])),
            ..Default::default()
        };
        fields.apply_to(&mut profile);

        assert_eq!(profile.xp, 7);
        assert_eq!(profile.streak, 4);
        assert_eq!(profile.badges.len(), 2);
    }

    #[test]
    fn student_id_validation() {
        assert!(validate_student_id("alice_01").is_ok());
        assert!(validate_student_id("").is_err());
        assert!(validate_student_id("   ").is_err());
        assert!(validate_student_id("../etc").is_err());
        assert!(validate_student_id("..").is_err());
        assert!(validate_student_id(&"x".repeat(MAX_STUDENT_ID_LEN + 1)).is_err());
    }
}
