//! The `studytrack progress` command.

use anyhow::Result;

use studytrack_core::engine::StudyEngine;

pub async fn execute(engine: &StudyEngine, student: &str, topic: &str) -> Result<()> {
    let report = engine.progress(student, topic).await?;

    println!("Topic: {}", report.topic);
    println!(
        "Mastery: {:.1}% over {} quiz(zes)",
        report.mastery_percentage, report.quizzes_taken
    );
    if report.weak_areas.is_empty() {
        println!("Weak areas: none");
    } else {
        println!("Weak areas: {}", report.weak_areas.join(", "));
    }
    println!("Next step: {}", report.suggested_next_step);
    Ok(())
}
