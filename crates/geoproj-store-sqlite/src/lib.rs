//! SQLite backends for geoproj.
//!
//! [`SqliteStore`] holds project, layer and user metadata in one database
//! file. [`SqliteSpatialDb`] keeps each project's imported tables in a
//! dedicated database file. Both wrap [`tokio_rusqlite`] so all database
//! access runs on dedicated threads without blocking the async runtime.

mod encode;
mod schema;
mod spatial;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use spatial::SqliteSpatialDb;
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
