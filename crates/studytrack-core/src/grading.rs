//! Quiz grading strategies and score aggregation.
//!
//! Grading is a pure function of (student answer, reference answer, question
//! kind). The heuristics are deliberately simple; each kind is served by a
//! [`Grader`] that callers can swap out on the [`GradingEngine`].

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::QuestionKind;

pub const FEEDBACK_CORRECT: &str = "Correct!";
pub const FEEDBACK_INCORRECT: &str = "Incorrect choice.";
pub const FEEDBACK_NO_REFERENCE: &str = "No reference answer provided.";
pub const FEEDBACK_EXCELLENT: &str = "Excellent answer.";
pub const FEEDBACK_PARTIAL: &str = "Partially correct - review missing details.";
pub const FEEDBACK_SOME_IDEAS: &str = "Some relevant ideas - revisit the core concept.";
pub const FEEDBACK_NO_MATCH: &str = "Answer does not match the key ideas.";
pub const FEEDBACK_SUBMITTED: &str = "Solution submitted - review with the explainer.";
pub const FEEDBACK_NO_SOLUTION: &str = "No solution provided.";

/// Score in [0, 1] plus human-readable feedback for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub score: f64,
    pub feedback: String,
}

impl Grade {
    pub fn new(score: f64, feedback: impl Into<String>) -> Self {
        Self {
            score: clamp_unit(score),
            feedback: feedback.into(),
        }
    }
}

/// Strategy for grading one kind of question.
pub trait Grader: Send + Sync {
    fn grade(&self, student_answer: &str, correct_answer: &str) -> Grade;
}

/// Case-insensitive, trimmed, whole-string comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactChoiceGrader;

impl Grader for ExactChoiceGrader {
    fn grade(&self, student_answer: &str, correct_answer: &str) -> Grade {
        let is_correct =
            student_answer.trim().to_uppercase() == correct_answer.trim().to_uppercase();
        if is_correct {
            Grade::new(1.0, FEEDBACK_CORRECT)
        } else {
            Grade::new(0.0, FEEDBACK_INCORRECT)
        }
    }
}

/// Share of distinct reference tokens that also appear in the answer.
///
/// Tokens are case-folded and split on whitespace only; punctuation stays
/// attached to its token, so `"run."` and `"run"` do not match.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenOverlapGrader;

impl Grader for TokenOverlapGrader {
    fn grade(&self, student_answer: &str, correct_answer: &str) -> Grade {
        let correct = correct_answer.trim().to_lowercase();
        if correct.is_empty() {
            return Grade::new(0.0, FEEDBACK_NO_REFERENCE);
        }
        let student = student_answer.trim().to_lowercase();

        let student_tokens: HashSet<&str> = student.split_whitespace().collect();
        let correct_tokens: HashSet<&str> = correct.split_whitespace().collect();
        let overlap = student_tokens.intersection(&correct_tokens).count();
        let score = overlap as f64 / correct_tokens.len().max(1) as f64;

        let feedback = if score > 0.8 {
            FEEDBACK_EXCELLENT
        } else if score > 0.5 {
            FEEDBACK_PARTIAL
        } else if score > 0.2 {
            FEEDBACK_SOME_IDEAS
        } else {
            FEEDBACK_NO_MATCH
        };
        Grade::new(score, feedback)
    }
}

/// Full credit for any non-blank submission. Nothing is compiled or run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionGrader;

impl Grader for SubmissionGrader {
    fn grade(&self, student_answer: &str, _correct_answer: &str) -> Grade {
        if student_answer.trim().is_empty() {
            Grade::new(0.0, FEEDBACK_NO_SOLUTION)
        } else {
            Grade::new(1.0, FEEDBACK_SUBMITTED)
        }
    }
}

/// Dispatches each question to the grader registered for its kind.
pub struct GradingEngine {
    graders: HashMap<QuestionKind, Box<dyn Grader>>,
}

impl Default for GradingEngine {
    fn default() -> Self {
        Self::new()
            .with_grader(QuestionKind::MultipleChoice, ExactChoiceGrader)
            .with_grader(QuestionKind::ShortAnswer, TokenOverlapGrader)
            .with_grader(QuestionKind::Coding, SubmissionGrader)
    }
}

impl GradingEngine {
    /// An engine with no graders registered; every question is "unknown".
    pub fn new() -> Self {
        Self {
            graders: HashMap::new(),
        }
    }

    /// Register (or replace) the grader for `kind`.
    pub fn with_grader(mut self, kind: QuestionKind, grader: impl Grader + 'static) -> Self {
        self.graders.insert(kind, Box::new(grader));
        self
    }

    /// Grade one answer. Unknown kinds score 0 with explanatory feedback.
    pub fn grade(&self, student_answer: &str, correct_answer: &str, kind: &QuestionKind) -> Grade {
        match self.graders.get(kind) {
            Some(grader) => grader.grade(student_answer, correct_answer),
            None => {
                tracing::debug!("no grader for question type '{kind}'");
                Grade::new(0.0, format!("Unknown question type: '{kind}'"))
            }
        }
    }
}

/// Grade one answer with the default strategies.
pub fn grade_question(student_answer: &str, correct_answer: &str, kind: &QuestionKind) -> Grade {
    GradingEngine::default().grade(student_answer, correct_answer, kind)
}

/// Per-question scores keyed by question id, in first-answered order.
///
/// Scoring an id again replaces its value but keeps its position, so a
/// repeated question counts once with its latest answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionScores {
    entries: Vec<(String, f64)>,
    positions: HashMap<String, usize>,
}

impl QuestionScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
        }
    }

    /// Record `score` for `question_id`, overwriting any earlier score.
    pub fn insert(&mut self, question_id: impl Into<String>, score: f64) {
        let question_id = question_id.into();
        match self.positions.get(&question_id) {
            Some(&index) => self.entries[index].1 = score,
            None => {
                self.positions.insert(question_id.clone(), self.entries.len());
                self.entries.push((question_id, score));
            }
        }
    }

    pub fn get(&self, question_id: &str) -> Option<f64> {
        self.positions
            .get(question_id)
            .map(|&index| self.entries[index].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(id, score)| (id.as_str(), *score))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for QuestionScores {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut scores = Self::new();
        for (id, score) in iter {
            scores.insert(id, score);
        }
        scores
    }
}

/// Mean of per-question scores, each clamped to [0, 1]. Empty input is 0.
///
/// Scores are summed in first-answered order so the same quiz always
/// produces the same mean.
pub fn aggregate(scores: &QuestionScores) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let total: f64 = scores.iter().map(|(_, score)| clamp_unit(score)).sum();
    total / scores.len() as f64
}

/// Round half away from zero to `places` decimals for external display.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

fn clamp_unit(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(pairs: &[(&str, f64)]) -> QuestionScores {
        pairs.iter().copied().collect()
    }

    #[test]
    fn multiple_choice_is_case_and_space_insensitive() {
        let grade = grade_question("a", "A", &QuestionKind::MultipleChoice);
        assert_eq!(grade, Grade::new(1.0, FEEDBACK_CORRECT));

        let grade = grade_question("  b ", "B", &QuestionKind::MultipleChoice);
        assert_eq!(grade.score, 1.0);

        let grade = grade_question("B", "A", &QuestionKind::MultipleChoice);
        assert_eq!(grade, Grade::new(0.0, FEEDBACK_INCORRECT));
    }

    #[test]
    fn multiple_choice_compares_whole_string() {
        let grade = grade_question("A)", "A", &QuestionKind::MultipleChoice);
        assert_eq!(grade.score, 0.0);
    }

    #[test]
    fn short_answer_exact_match_is_excellent() {
        let grade = grade_question(
            "Photosynthesis converts light",
            "photosynthesis converts light",
            &QuestionKind::ShortAnswer,
        );
        assert_eq!(grade.score, 1.0);
        assert_eq!(grade.feedback, FEEDBACK_EXCELLENT);
    }

    #[test]
    fn short_answer_trailing_period_costs_a_token() {
        let grade = grade_question(
            "slope is rise over run",
            "Slope is rise over run.",
            &QuestionKind::ShortAnswer,
        );
        assert!((grade.score - 0.8).abs() < 1e-12, "got {}", grade.score);
        // 0.8 is not strictly above the "excellent" threshold.
        assert_eq!(grade.feedback, FEEDBACK_PARTIAL);
    }

    #[test]
    fn short_answer_feedback_buckets() {
        let reference = "one two three four five six seven eight nine ten";
        let cases = [
            ("one two three four five six seven eight nine", FEEDBACK_EXCELLENT),
            ("one two three four five six", FEEDBACK_PARTIAL),
            ("one two three", FEEDBACK_SOME_IDEAS),
            ("one two", FEEDBACK_NO_MATCH),
            ("", FEEDBACK_NO_MATCH),
        ];
        for (answer, expected) in cases {
            let grade = grade_question(answer, reference, &QuestionKind::ShortAnswer);
            assert_eq!(grade.feedback, expected, "answer {answer:?}");
        }
    }

    #[test]
    fn short_answer_counts_distinct_tokens() {
        let grade = grade_question("cell cell cell", "cell wall", &QuestionKind::ShortAnswer);
        assert_eq!(grade.score, 0.5);
    }

    #[test]
    fn short_answer_without_reference_scores_zero() {
        let grade = grade_question("anything", "   ", &QuestionKind::ShortAnswer);
        assert_eq!(grade, Grade::new(0.0, FEEDBACK_NO_REFERENCE));
    }

    #[test]
    fn coding_only_checks_for_a_submission() {
        let grade = grade_question("fn main() {}", "", &QuestionKind::Coding);
        assert_eq!(grade, Grade::new(1.0, FEEDBACK_SUBMITTED));

        let grade = grade_question(" \n\t", "fn main() {}", &QuestionKind::Coding);
        assert_eq!(grade, Grade::new(0.0, FEEDBACK_NO_SOLUTION));
    }

    #[test]
    fn unknown_kind_is_a_soft_failure() {
        let grade = grade_question("x", "x", &QuestionKind::from("essay"));
        assert_eq!(grade.score, 0.0);
        assert!(grade.feedback.contains("essay"));
    }

    #[test]
    fn graders_can_be_replaced() {
        struct Lenient;
        impl Grader for Lenient {
            fn grade(&self, _: &str, _: &str) -> Grade {
                Grade::new(1.5, "always right")
            }
        }

        let engine = GradingEngine::default().with_grader(QuestionKind::ShortAnswer, Lenient);
        let grade = engine.grade("?", "!", &QuestionKind::ShortAnswer);
        assert_eq!(grade.score, 1.0, "scores are clamped into range");
        assert_eq!(grade.feedback, "always right");

        let essay = QuestionKind::from("essay");
        let engine = GradingEngine::default().with_grader(essay.clone(), Lenient);
        assert_eq!(engine.grade("", "", &essay).score, 1.0);
    }

    #[test]
    fn aggregate_mean_and_empty() {
        assert_eq!(aggregate(&QuestionScores::new()), 0.0);
        assert_eq!(aggregate(&scores(&[("q1", 1.0), ("q2", 0.0)])), 0.5);
    }

    #[test]
    fn aggregate_clamps_each_score() {
        let value = aggregate(&scores(&[("q1", 3.0), ("q2", -1.0), ("q3", f64::NAN)]));
        assert!((value - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn aggregate_is_stable_across_runs() {
        // Summing these in different orders lands on either side of 0.7.
        let expected = aggregate(&scores(&[("q1", 1.0), ("q2", 0.4), ("q3", 0.7)]));
        for _ in 0..200 {
            let value = aggregate(&scores(&[("q1", 1.0), ("q2", 0.4), ("q3", 0.7)]));
            assert_eq!(value.to_bits(), expected.to_bits());
            assert_eq!(
                crate::scheduler::quality_from_score(value),
                crate::scheduler::quality_from_score(expected)
            );
        }
        assert_eq!(expected, (1.0 + 0.4 + 0.7) / 3.0);
    }

    #[test]
    fn repeated_question_keeps_latest_score_and_first_position() {
        let mut scores = QuestionScores::new();
        scores.insert("q1", 1.0);
        scores.insert("q2", 0.5);
        scores.insert("q1", 0.0);

        assert_eq!(scores.len(), 2);
        assert_eq!(scores.get("q1"), Some(0.0));
        let order: Vec<&str> = scores.iter().map(|(id, _)| id).collect();
        assert_eq!(order, ["q1", "q2"]);
        assert_eq!(aggregate(&scores), 0.25);
    }

    #[test]
    fn round_to_places() {
        assert_eq!(round_to(0.123456, 3), 0.123);
        assert_eq!(round_to(2.0 / 3.0, 2), 0.67);
    }
}
