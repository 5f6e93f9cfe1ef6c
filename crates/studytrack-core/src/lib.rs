//! studytrack-core — Student profiles, grading, spaced repetition, and XP.
//!
//! This crate defines the data model, the storage and grading seams, and the
//! [`engine::StudyEngine`] that turns a graded quiz into one profile update.

pub mod engine;
pub mod error;
pub mod gamification;
pub mod grading;
pub mod memory;
pub mod model;
pub mod progress;
pub mod scheduler;
pub mod traits;

pub use engine::{EngineConfig, QuizOutcome, QuizResponse, StudyEngine};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use model::StudentProfile;
pub use traits::ProfileStore;
