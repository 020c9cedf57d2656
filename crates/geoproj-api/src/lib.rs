//! JSON HTTP API for geoproj.
//!
//! Exposes an axum [`Router`] that creates projects from uploaded Shapefile
//! datasets and serves the caller's projects, layers and layer trees. The
//! store, geometry engine and spatial database are supplied by the caller.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let state = AppState::new(store, engine, spatial, config);
//! axum::serve(listener, geoproj_api::router(state)).await?;
//! ```

pub mod auth;
pub mod collect;
pub mod error;
pub mod guard;
pub mod projects;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post},
};
use geoproj_core::{
  dataset::Crs, engine::GeometryEngine, spatial::SpatialDatabase, store::ProjectStore,
};
use geoproj_workflow::{DEFAULT_MAX_NAME_ATTEMPTS, ProjectWorkflow, WorkflowSettings};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `GEOPROJ_*` environment variables. Every key is optional.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:              String,
  pub port:              u16,
  /// SQLite file holding users, projects and layers.
  pub store_path:        PathBuf,
  /// Directory of the per-project spatial databases.
  pub spatial_dir:       PathBuf,
  /// Directory of the per-project `.qgs` and `tree.json` files.
  pub artifact_dir:      PathBuf,
  pub scratch_dir:       Option<PathBuf>,
  pub default_crs:       Crs,
  pub max_upload_bytes:  usize,
  pub max_name_attempts: u32,
  pub ogrinfo:           PathBuf,
  pub ogr2ogr:           PathBuf,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:              "127.0.0.1".into(),
      port:              8080,
      store_path:        "geoproj.sqlite".into(),
      spatial_dir:       "spatial".into(),
      artifact_dir:      "projects".into(),
      scratch_dir:       None,
      default_crs:       Crs::default(),
      max_upload_bytes:  256 * 1024 * 1024,
      max_name_attempts: DEFAULT_MAX_NAME_ATTEMPTS,
      ogrinfo:           "ogrinfo".into(),
      ogr2ogr:           "ogr2ogr".into(),
    }
  }
}

impl ServerConfig {
  pub fn workflow_settings(&self) -> WorkflowSettings {
    WorkflowSettings {
      artifact_dir:      self.artifact_dir.clone(),
      crs:               self.default_crs.clone(),
      scratch_dir:       self.scratch_dir.clone(),
      max_name_attempts: self.max_name_attempts,
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, G, D> {
  pub store:    Arc<S>,
  pub workflow: Arc<ProjectWorkflow<S, G, D>>,
  pub config:   Arc<ServerConfig>,
}

impl<S, G, D> Clone for AppState<S, G, D> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      workflow: Arc::clone(&self.workflow),
      config:   Arc::clone(&self.config),
    }
  }
}

impl<S, G, D> AppState<S, G, D>
where
  S: ProjectStore,
  G: GeometryEngine,
  D: SpatialDatabase,
{
  pub fn new(store: Arc<S>, engine: Arc<G>, spatial: Arc<D>, config: ServerConfig) -> Self {
    let workflow =
      ProjectWorkflow::new(Arc::clone(&store), engine, spatial, config.workflow_settings());
    Self {
      store,
      workflow: Arc::new(workflow),
      config: Arc::new(config),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router. Upload bodies are capped at
/// [`ServerConfig::max_upload_bytes`].
pub fn router<S, G, D>(state: AppState<S, G, D>) -> Router
where
  S: ProjectStore + 'static,
  G: GeometryEngine + 'static,
  D: SpatialDatabase + 'static,
{
  let body_limit = state.config.max_upload_bytes;

  Router::new()
    .route("/api/projects",                  get(projects::list::<S, G, D>))
    .route("/api/projects/create/shapefile", post(projects::create_from_shapefile::<S, G, D>))
    .route("/api/projects/layers",           get(projects::layers::<S, G, D>))
    .route("/api/projects/tree",             get(projects::tree))
    .layer(DefaultBodyLimit::max(body_limit))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
