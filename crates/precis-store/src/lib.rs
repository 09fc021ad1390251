//! # precis-store
//!
//! Persisted client state for Précis.
//!
//! The stores in `precis-client` never touch a global: they receive an
//! `Arc<dyn Storage>`, a small key-value capability. Two implementations
//! live here: [`MemoryStorage`] for tests and ephemeral runs, and the
//! SQLite-backed [`Database`] for the real client.

pub mod database;
pub mod migrations;
pub mod session;
pub mod storage;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use session::PersistedSession;
pub use storage::{MemoryStorage, Storage};
