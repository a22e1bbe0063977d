//! Storage module for persistent data storage
//!
//! Provides SQLite-based persistence for file state, blobs and page text.

mod database;

pub use database::SqliteStore;
