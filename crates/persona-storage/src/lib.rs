//! Persona Storage crate - the append-only conversation log.
//!
//! Provides the `ConversationStore` contract with two implementations: a
//! WAL-mode SQLite store (with migrations) for real use and an in-memory
//! store for tests and ephemeral sessions.

pub mod db;
pub mod memory;
pub mod migrations;
pub mod sqlite;
pub mod store;

pub use db::Database;
pub use memory::InMemoryConversationStore;
pub use sqlite::SqliteConversationStore;
pub use store::ConversationStore;
