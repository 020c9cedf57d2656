//! The `SpatialDatabase` trait: per-project namespaces of geometry tables.

use std::{future::Future, path::Path};

use serde::{Deserialize, Serialize};

use crate::dataset::Crs;

/// How a map document reaches a table: a provider key and its data source
/// string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSource {
  pub provider:   String,
  pub datasource: String,
}

/// Abstraction over the spatial database holding imported tables.
///
/// Each project owns one namespace. Dropping the namespace drops every table
/// in it.
pub trait SpatialDatabase: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Create the namespace for `project`. Fails if it already exists.
  fn create_namespace(
    &self,
    project: &str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;

  /// Remove the namespace and all its tables. Removing a missing namespace
  /// succeeds.
  fn drop_namespace(
    &self,
    project: &str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;

  /// `true` if no table named `table` exists in the namespace.
  fn table_available(
    &self,
    project: &str,
    table: &str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

  /// Load the GeoJSON file at `path` into a new table. Returns the number of
  /// features loaded.
  fn load_interchange(
    &self,
    project: &str,
    table: &str,
    path: &Path,
    crs: &Crs,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send;

  /// The data source a map document should use for `table`.
  fn layer_source(&self, project: &str, table: &str) -> LayerSource;
}
