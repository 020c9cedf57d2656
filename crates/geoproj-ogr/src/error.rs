//! Error types for the OGR engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source:  std::io::Error,
  },

  #[error("{program} exited with {status}: {stderr}")]
  Failed {
    program: String,
    status:  String,
    stderr:  String,
  },

  #[error("unreadable ogrinfo output: {0}")]
  Summary(#[from] serde_json::Error),

  #[error("dataset has no layers")]
  NoLayer,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
