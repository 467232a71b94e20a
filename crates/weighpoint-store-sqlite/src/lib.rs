//! SQLite backend for the Weighpoint inventory store and measurement queue.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. That single connection thread
//! is also what makes the read-modify-write sequences atomic: every
//! multi-step operation runs inside one closure (and one transaction) on
//! that thread, so no other operation can interleave.

mod encode;
mod schema;
mod store;

pub use store::SqliteStore;

#[cfg(test)]
mod tests;
