//! Error types for `geoproj-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid coordinate reference system: {0:?}")]
  InvalidCrs(String),

  #[error("layer name {0:?} is empty after normalisation")]
  InvalidLayerName(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
