//! The `studytrack init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create studytrack.toml
    if std::path::Path::new("studytrack.toml").exists() {
        println!("studytrack.toml already exists, skipping.");
    } else {
        std::fs::write("studytrack.toml", SAMPLE_CONFIG)?;
        println!("Created studytrack.toml");
    }

    // Create example quiz
    std::fs::create_dir_all("quizzes")?;
    let example_path = std::path::Path::new("quizzes/example.json");
    if example_path.exists() {
        println!("quizzes/example.json already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_QUIZ)?;
        println!("Created quizzes/example.json");
    }

    println!("\nNext steps:");
    println!("  1. Edit studytrack.toml to choose where profiles are stored");
    println!(
        "  2. Run: studytrack grade --student alice --topic algebra --responses quizzes/example.json"
    );
    println!("  3. Run: studytrack due --student alice");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# studytrack configuration

[backend]
# "document" keeps one JSON file per student under `path`;
# "memory" keeps nothing between runs.
type = "document"
path = "./studytrack-data"

[engine]
completion_threshold = 0.85
badge_threshold = 0.9
minutes_per_question = 2
score_precision = 3

[retry]
max_retries = 5
retry_delay_ms = 10
"#;

const EXAMPLE_QUIZ: &str = r#"{
  "responses": [
    {
      "question_id": "q1",
      "question_type": "multiple_choice",
      "question_text": "What is the slope of y = 3x + 2?",
      "student_answer": "B",
      "correct_answer": "B"
    },
    {
      "question_id": "q2",
      "question_type": "short_answer",
      "question_text": "Define slope.",
      "student_answer": "slope is rise over run",
      "correct_answer": "Slope is rise over run."
    },
    {
      "question_id": "q3",
      "question_type": "coding",
      "question_text": "Write a function that returns the slope between two points.",
      "student_answer": "fn slope(a: (f64, f64), b: (f64, f64)) -> f64 { (b.1 - a.1) / (b.0 - a.0) }",
      "correct_answer": ""
    }
  ]
}
"#;
