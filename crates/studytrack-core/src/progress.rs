//! Per-topic mastery summary derived from quiz history.

use serde::{Deserialize, Serialize};

use crate::grading::round_to;
use crate::model::StudentProfile;

/// Mastery summary for one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub topic: String,
    /// Mean quiz score on the topic as a percentage, one decimal.
    pub mastery_percentage: f64,
    pub quizzes_taken: usize,
    pub weak_areas: Vec<String>,
    pub suggested_next_step: String,
}

/// Summarize how well the student knows `topic`.
pub fn calculate_progress(profile: &StudentProfile, topic: &str) -> ProgressReport {
    let scores: Vec<f64> = profile
        .quiz_history
        .iter()
        .filter(|q| q.topic == topic)
        .map(|q| q.score)
        .collect();

    let mastery = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };

    let mut weak_areas = Vec::new();
    if mastery < 0.4 {
        weak_areas.push("Foundations".to_string());
    }
    if mastery < 0.7 {
        weak_areas.push("Problem-solving practice".to_string());
    }

    let suggested_next_step = if mastery >= 0.85 {
        "Move on to advanced extensions or a new related topic."
    } else if mastery >= 0.6 {
        "Do a short focused quiz on edge cases and mixed problems."
    } else {
        "Review core concepts and re-attempt beginner-level quizzes."
    };

    ProgressReport {
        topic: topic.to_string(),
        mastery_percentage: round_to(mastery * 100.0, 1),
        quizzes_taken: scores.len(),
        weak_areas,
        suggested_next_step: suggested_next_step.to_string(),
    }
}
