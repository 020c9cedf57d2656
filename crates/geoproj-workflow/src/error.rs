//! Error types for the import workflow.

use geoproj_core::project::FieldErrors;
use serde::Serialize;
use thiserror::Error;

/// A collaborator error with its concrete type erased.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Coarse classification reported to clients alongside every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
  Validation,
  Provisioning,
  Import,
  Assembly,
  Unknown,
}

impl ErrorCategory {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Validation => "validation",
      Self::Provisioning => "provisioning",
      Self::Import => "import",
      Self::Assembly => "assembly",
      Self::Unknown => "unknown",
    }
  }
}

/// Why a single dataset could not be imported.
#[derive(Debug, Error)]
pub enum ImportError {
  #[error("could not stage uploaded files: {0}")]
  Staging(#[source] std::io::Error),

  #[error("not a readable vector dataset: {0}")]
  InvalidSource(#[source] BoxError),

  #[error("conversion failed: {0}")]
  Conversion(#[source] BoxError),

  #[error("layer name {0:?} is not usable as a table name")]
  InvalidLayerName(String),

  #[error("table {0:?} already exists in this project")]
  TableNameTaken(String),

  #[error("loading into the spatial database failed: {0}")]
  Load(#[source] BoxError),

  #[error("registering the layer failed: {0}")]
  Register(#[source] BoxError),
}

/// Why the project document could not be produced or committed.
#[derive(Debug, Error)]
pub enum AssemblyError {
  #[error("could not write project files: {0}")]
  Io(#[from] std::io::Error),

  #[error("could not render project document: {0}")]
  Xml(String),

  #[error("could not render layer tree: {0}")]
  Json(#[from] serde_json::Error),

  #[error("could not read registered layers: {0}")]
  Layers(#[source] BoxError),

  #[error("commit failed: {0}")]
  Commit(#[source] BoxError),
}

#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("invalid project data")]
  Validation(FieldErrors),

  #[error("no datasets selected")]
  NoDatasets,

  #[error("could not provision project: {0}")]
  Provisioning(#[source] BoxError),

  #[error("dataset {index} ({name}): {source}")]
  Import {
    index:  usize,
    name:   String,
    #[source]
    source: ImportError,
  },

  #[error(transparent)]
  Assembly(#[from] AssemblyError),

  #[error("unexpected error: {0}")]
  Unknown(#[source] BoxError),
}

impl WorkflowError {
  pub fn category(&self) -> ErrorCategory {
    match self {
      Self::Validation(_) | Self::NoDatasets => ErrorCategory::Validation,
      Self::Provisioning(_) => ErrorCategory::Provisioning,
      Self::Import { .. } => ErrorCategory::Import,
      Self::Assembly(_) => ErrorCategory::Assembly,
      Self::Unknown(_) => ErrorCategory::Unknown,
    }
  }

  /// Per-field messages of a validation failure.
  pub fn field_errors(&self) -> Option<&FieldErrors> {
    match self {
      Self::Validation(fields) => Some(fields),
      _ => None,
    }
  }

  /// Position and name of the dataset an import failure belongs to.
  pub fn dataset(&self) -> Option<(usize, &str)> {
    match self {
      Self::Import { index, name, .. } => Some((*index, name)),
      _ => None,
    }
  }
}
