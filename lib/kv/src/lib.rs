//! Ordered key-value storage for the habits server.
//!
//! Keys follow a `/`-joined path convention mirroring the logical bucket
//! layout: `users/<user_id>/habits/<name>/<rfc3339>`, `users/api_keys/<hash>`,
//! `users/refresh_tokens/<user_id>`. Lexicographic key order makes a prefix
//! scan return one habit's entries in chronological order.

pub mod error;
pub mod redb;
pub mod traits;

pub use error::KVError;
pub use redb::RedbStore;
pub use traits::KVStore;
