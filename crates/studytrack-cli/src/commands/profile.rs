//! The `studytrack profile` command.

use anyhow::Result;

use studytrack_core::engine::StudyEngine;

pub async fn execute(engine: &StudyEngine, student: &str) -> Result<()> {
    let snapshot = engine.snapshot(student).await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
