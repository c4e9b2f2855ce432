//! In-memory adapters for tests and local runs.
//!
//! `InMemoryStore` implements every repository port over one shared
//! state guarded by a single lock, so multi-row operations are atomic the
//! same way a database transaction is.

mod access_keys;
mod promocodes;
mod store;
mod subscriptions;

pub use store::InMemoryStore;
