// DIY tutorials: the content resource guarded by the request pipeline

pub mod handlers;
pub mod models;
pub mod repository;

pub use models::{Category, Difficulty, Tutorial, TutorialChanges};
pub use repository::{MemoryTutorialStore, PgTutorialStore, TutorialStore};
