//! The `GeometryEngine` trait: opening and converting vector datasets.

use std::{future::Future, path::Path};

use crate::dataset::{Crs, DatasetInfo};

/// Abstraction over a vector GIS engine.
pub trait GeometryEngine: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Open `path` as a vector dataset and report its geometry type, feature
  /// count and extent. An error means the file is not a usable dataset.
  fn open(
    &self,
    path: &Path,
  ) -> impl Future<Output = Result<DatasetInfo, Self::Error>> + Send;

  /// Convert the dataset at `source` to GeoJSON at `dest`, written in `crs`.
  fn convert(
    &self,
    source: &Path,
    dest: &Path,
    crs: &Crs,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
