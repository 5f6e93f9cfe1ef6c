//! The `studytrack study` command.

use anyhow::Result;

use studytrack_core::engine::StudyEngine;
use studytrack_core::traits::ProfileStore;

pub async fn execute(engine: &StudyEngine, student: &str, minutes: i64) -> Result<()> {
    let profile = engine.store().add_study_time(student, minutes).await?;
    println!(
        "Total study time: {} minute(s)",
        profile.total_study_time_minutes
    );
    Ok(())
}
