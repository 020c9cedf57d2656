//! Error type for `geoproj-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("user {0:?} already exists")]
  UserExists(String),

  /// Every candidate name derived from `base` is taken.
  #[error("no free project name for {base:?} after {attempts} attempts")]
  NamesExhausted { base: String, attempts: u32 },

  #[error("project {0:?} is not pending")]
  ProjectNotPending(String),

  #[error("spatial namespace for {0:?} already exists")]
  NamespaceExists(String),

  #[error("spatial namespace for {0:?} does not exist")]
  NamespaceMissing(String),

  #[error("table {table:?} already exists in {project:?}")]
  TableExists { project: String, table: String },

  #[error("invalid GeoJSON: {0}")]
  InvalidInterchange(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
