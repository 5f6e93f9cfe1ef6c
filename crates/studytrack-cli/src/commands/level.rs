//! The `studytrack level` command.

use anyhow::Result;

use studytrack_core::engine::StudyEngine;
use studytrack_core::model::{KnowledgeLevel, LearningStyle};
use studytrack_core::traits::ProfileStore;

pub async fn execute(
    engine: &StudyEngine,
    student: &str,
    subject: &str,
    level: KnowledgeLevel,
    style: Option<LearningStyle>,
) -> Result<()> {
    let store = engine.store();
    let mut profile = store.update_knowledge_level(student, subject, level).await?;
    if let Some(style) = style {
        profile = store.set_learning_style(student, style).await?;
    }

    println!(
        "{}: {subject} = {level}, learning style {}",
        profile.student_id, profile.learning_style
    );
    Ok(())
}
