//! Application record persistence.
//!
//! - `LibSqlBackend`: durable libSQL storage with versioned migrations
//! - `InMemoryStore`: process-lifetime storage
//! - `FallbackStore`: writes through to a primary store and degrades to
//!   memory while the primary is failing

pub mod fallback;
pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use fallback::FallbackStore;
pub use libsql_backend::LibSqlBackend;
pub use memory::InMemoryStore;
pub use traits::ApplicationStore;
