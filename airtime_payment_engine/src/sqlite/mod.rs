//! SQLite database module for the airtime ledger engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
