//! # banca-store
//!
//! Record store for the Banca Messenger server, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for users,
//! contacts, conversations, messages and verification codes. Callers in an
//! async context are expected to run these on a blocking thread.

pub mod contacts;
pub mod conversations;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod users;
pub mod verification;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
