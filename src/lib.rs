//! Data layer for a desktop productivity suite: kanban boards, a notes tree
//! with file attachments, and a freeform diagram canvas, each persisted as a
//! JSON document in the user's data directory.

pub mod config;
pub mod model;
pub mod storage;
pub mod store;

pub use config::AppConfig;
pub use storage::{DataDir, DocumentStore, StoreError};
pub use store::KanbanStore;
