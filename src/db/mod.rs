//! Database module: the `users` credential table.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: pooled storage with the update-then-reselect transactions

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::{LinkedUser, UserRecord};
pub use sqlite::UsersStorage;
