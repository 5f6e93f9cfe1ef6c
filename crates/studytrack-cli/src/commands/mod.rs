//! Subcommand implementations.

pub mod complete;
pub mod due;
pub mod grade;
pub mod init;
pub mod level;
pub mod profile;
pub mod progress;
pub mod review;
pub mod study;

use std::path::Path;

use anyhow::Result;

use studytrack_core::engine::StudyEngine;
use studytrack_store::config::{create_store_with_fallback, load_config_from};

/// Load configuration and build the engine.
///
/// The profile store is selected here, once per process. If the configured
/// backend cannot be opened the CLI continues on the volatile store.
pub fn build_engine(config_path: Option<&Path>) -> Result<StudyEngine> {
    let config = load_config_from(config_path)?;
    let store = create_store_with_fallback(&config);
    tracing::debug!("engine settings: {:?}", config.engine);
    Ok(StudyEngine::new(store, config.engine))
}
