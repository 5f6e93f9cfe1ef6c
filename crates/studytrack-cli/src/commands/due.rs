//! The `studytrack due` command.

use anyhow::Result;
use comfy_table::{Cell, Table};

use studytrack_core::engine::StudyEngine;

pub async fn execute(engine: &StudyEngine, student: &str) -> Result<()> {
    let due = engine.due_reviews(student).await?;
    if due.is_empty() {
        println!("No reviews due.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Item", "Due", "Interval", "Repetitions", "E-factor"]);
    for review in &due {
        let due_on = review
            .next_review
            .map(|d| d.to_string())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(&review.item.item_id),
            Cell::new(due_on),
            Cell::new(format!("{}d", review.item.interval_days)),
            Cell::new(review.item.repetitions),
            Cell::new(format!("{:.2}", review.item.efactor)),
        ]);
    }
    println!("{table}");
    println!("{} item(s) due", due.len());
    Ok(())
}
