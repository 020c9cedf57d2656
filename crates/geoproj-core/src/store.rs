//! The `ProjectStore` trait: project, layer and user metadata.
//!
//! Implemented by storage backends (e.g. `geoproj-store-sqlite`). The
//! workflow and API crates depend on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  layer::{LayerRecord, NewLayer},
  project::{ProjectArtifacts, ProjectMeta, ProjectRecord},
};

/// An account allowed to create projects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  #[serde(skip_serializing)]
  pub password_hash: String,
  pub created_at:    DateTime<Utc>,
}

/// Abstraction over the project metadata backend.
///
/// A project is *pending* from [`reserve_project`](Self::reserve_project)
/// until [`commit_project`](Self::commit_project). Pending projects are
/// invisible to every read method and are removed wholesale by
/// [`discard_project`](Self::discard_project).
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ProjectStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Create a user. Returns an error if the username is taken.
  fn add_user(
    &self,
    username: &str,
    password_hash: &str,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send;

  /// Look up a user by name. Returns `None` if not found.
  fn find_user(
    &self,
    username: &str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send;

  // ── Provisioning ──────────────────────────────────────────────────────

  /// Reserve a unique project name derived from `meta.display_name` and
  /// insert a pending project owned by `owner`.
  ///
  /// Safe under concurrent callers: two reservations never return the same
  /// name. Fails once `max_attempts` candidate names are all taken.
  fn reserve_project(
    &self,
    owner: &str,
    meta: &ProjectMeta,
    max_attempts: u32,
  ) -> impl Future<Output = Result<ProjectRecord, Self::Error>> + Send;

  /// Attach a layer to a pending project. Flags start closed
  /// ([`LayerVisibility::imported`](crate::layer::LayerVisibility::imported)).
  fn register_layer(
    &self,
    layer: NewLayer,
  ) -> impl Future<Output = Result<LayerRecord, Self::Error>> + Send;

  /// Make a pending project visible and record its artifact locations.
  fn commit_project(
    &self,
    project_name: &str,
    artifacts: &ProjectArtifacts,
  ) -> impl Future<Output = Result<ProjectRecord, Self::Error>> + Send;

  /// Delete a pending project and every layer registered for it.
  /// Committed projects are left untouched.
  fn discard_project(
    &self,
    project_name: &str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;

  /// Discard every pending project, returning their names. Used at startup
  /// to clean up after an interrupted process.
  fn sweep_pending(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Retrieve a committed project by name.
  fn get_project(
    &self,
    project_name: &str,
  ) -> impl Future<Output = Result<Option<ProjectRecord>, Self::Error>> + Send;

  /// List the committed projects of `owner`, oldest first.
  fn list_projects(
    &self,
    owner: &str,
  ) -> impl Future<Output = Result<Vec<ProjectRecord>, Self::Error>> + Send;

  /// List the layers of a project in registration order.
  fn list_layers(
    &self,
    project_name: &str,
  ) -> impl Future<Output = Result<Vec<LayerRecord>, Self::Error>> + Send;
}
