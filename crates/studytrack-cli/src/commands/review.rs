//! The `studytrack review` command.

use anyhow::Result;

use studytrack_core::engine::StudyEngine;
use studytrack_core::scheduler::MAX_QUALITY;

pub async fn execute(engine: &StudyEngine, student: &str, item: &str, quality: i64) -> Result<()> {
    if !(0..=i64::from(MAX_QUALITY)).contains(&quality) {
        eprintln!("Warning: quality {quality} is outside 0-{MAX_QUALITY} and will be clamped.");
    }

    let scheduled = engine.review_item(student, item, quality).await?;
    let next = scheduled
        .next_review
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{}: next review {next} (interval {} days, repetitions {}, e-factor {:.2})",
        scheduled.item.item_id,
        scheduled.item.interval_days,
        scheduled.item.repetitions,
        scheduled.item.efactor
    );
    Ok(())
}
