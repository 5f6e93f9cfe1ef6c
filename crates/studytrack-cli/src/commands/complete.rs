//! The `studytrack complete` command.

use anyhow::Result;

use studytrack_core::engine::StudyEngine;
use studytrack_core::traits::ProfileStore;

pub async fn execute(engine: &StudyEngine, student: &str, topic: &str) -> Result<()> {
    let profile = engine.store().mark_topic_completed(student, topic).await?;
    println!(
        "Marked '{topic}' completed ({} topic(s) completed)",
        profile.completed_topics.len()
    );
    Ok(())
}
