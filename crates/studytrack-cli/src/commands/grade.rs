//! The `studytrack grade` command.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};
use serde::Deserialize;

use studytrack_core::engine::{QuizOutcome, QuizResponse, StudyEngine};

/// Accepted layouts of a responses file.
#[derive(Deserialize)]
#[serde(untagged)]
enum ResponseFile {
    List(Vec<QuizResponse>),
    Wrapped { responses: Vec<QuizResponse> },
}

/// Read quiz responses from a JSON file: either a bare array or an object
/// with a `responses` array.
pub fn load_responses(path: &Path) -> Result<Vec<QuizResponse>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read responses: {}", path.display()))?;
    let file: ResponseFile = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse responses: {}", path.display()))?;
    Ok(match file {
        ResponseFile::List(responses) | ResponseFile::Wrapped { responses } => responses,
    })
}

pub async fn execute(
    engine: &StudyEngine,
    student: &str,
    topic: &str,
    responses_path: &Path,
    format: &str,
) -> Result<()> {
    anyhow::ensure!(
        matches!(format, "text" | "json"),
        "unknown format '{format}' (expected text or json)"
    );

    let responses = load_responses(responses_path)?;
    let outcome = engine.grade_session(student, topic, &responses).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn print_outcome(outcome: &QuizOutcome) {
    if let Some(message) = &outcome.message {
        println!("{message}");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Question", "Score", "Feedback"]);
    for question in &outcome.questions {
        table.add_row(vec![
            Cell::new(&question.question_id),
            Cell::new(format!("{:.2}", question.score)),
            Cell::new(&question.feedback),
        ]);
    }
    println!("{table}");

    println!(
        "\nTopic: {}  Score: {:.1}%  ({} questions)",
        outcome.topic,
        outcome.score * 100.0,
        outcome.questions_answered
    );

    if let Some(srs) = &outcome.srs {
        let next = srs
            .next_review
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "Next review: {next} (interval {} days, repetitions {}, e-factor {:.2})",
            srs.item.interval_days, srs.item.repetitions, srs.item.efactor
        );
    }

    if let Some(g) = &outcome.gamification {
        let badges = if g.badges.is_empty() {
            "none".to_string()
        } else {
            g.badges.join(", ")
        };
        println!("XP: {}  Streak: {} day(s)  Badges: {badges}", g.xp, g.streak);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studytrack_core::model::QuestionKind;

    #[test]
    fn loads_bare_and_wrapped_arrays() {
        let dir = tempfile::tempdir().unwrap();

        let bare = dir.path().join("bare.json");
        std::fs::write(
            &bare,
            r#"[{"question_id": "q1", "question_type": "multiple_choice", "student_answer": "A", "correct_answer": "A"}]"#,
        )
        .unwrap();
        let responses = load_responses(&bare).unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].question_type, QuestionKind::MultipleChoice);

        let wrapped = dir.path().join("wrapped.json");
        std::fs::write(
            &wrapped,
            r#"{"responses": [{"question_id": "q1"}, {"question_id": "q2"}]}"#,
        )
        .unwrap();
        assert_eq!(load_responses(&wrapped).unwrap().len(), 2);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"answers": 3}"#).unwrap();
        let err = load_responses(&path).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse responses"));
    }
}
