//! SQLite backend for the Tendril story-graph store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Every multi-document
//! mutation of the [`tendril_core::store::StoryStore`] contract commits in
//! a single transaction; the corpus-wide page-number invariant is a
//! `UNIQUE` constraint, re-checked inside the creating transaction.

mod encode;
mod schema;
mod store;

pub use store::SqliteStore;
