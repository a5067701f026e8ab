//! Persisted preferences
//!
//! - **store**: key-value persistence (JSON file on disk)
//! - **preferences**: typed accessors with documented defaults

pub mod preferences;
pub mod store;

pub use preferences::{PreferencesSnapshot, PreferencesStore};
