//! Project handlers.

use axum::{
  extract::{Multipart, State, multipart::MultipartRejection},
  http::StatusCode,
  response::Response,
};
use geoproj_core::{engine::GeometryEngine, spatial::SpatialDatabase, store::ProjectStore};
use serde_json::Value;

use crate::{
  AppState,
  auth::CurrentUser,
  collect::read_multipart,
  error::{ApiError, success},
  guard::OwnedProject,
};

// ─── POST /api/projects/create/shapefile ─────────────────────────────────────

pub async fn create_from_shapefile<S, G, D>(
  State(state): State<AppState<S, G, D>>,
  user: CurrentUser,
  multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError>
where
  S: ProjectStore + 'static,
  G: GeometryEngine + 'static,
  D: SpatialDatabase + 'static,
{
  let multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
  let request = read_multipart(multipart).await?;

  let created = state
    .workflow
    .create_project(&user.username, &request.form, &request.groups)
    .await?;

  Ok(success(StatusCode::CREATED, "Project created", created))
}

// ─── GET /api/projects ───────────────────────────────────────────────────────

pub async fn list<S, G, D>(
  State(state): State<AppState<S, G, D>>,
  user: CurrentUser,
) -> Result<Response, ApiError>
where
  S: ProjectStore + 'static,
  G: GeometryEngine + 'static,
  D: SpatialDatabase + 'static,
{
  let projects = state
    .store
    .list_projects(&user.username)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(success(StatusCode::OK, "Projects", projects))
}

// ─── GET /api/projects/layers ────────────────────────────────────────────────

pub async fn layers<S, G, D>(
  State(state): State<AppState<S, G, D>>,
  owned: OwnedProject,
) -> Result<Response, ApiError>
where
  S: ProjectStore + 'static,
  G: GeometryEngine + 'static,
  D: SpatialDatabase + 'static,
{
  let layers = state
    .store
    .list_layers(&owned.project.project_name)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(success(StatusCode::OK, "Layers", layers))
}

// ─── GET /api/projects/tree ──────────────────────────────────────────────────

/// The stored `tree.json`, as written when the project was committed.
pub async fn tree(owned: OwnedProject) -> Result<Response, ApiError> {
  let project = owned.project;
  let artifacts = project
    .artifacts
    .ok_or_else(|| ApiError::Artifact(format!("{} has no artifacts", project.project_name)))?;

  let bytes = tokio::fs::read(&artifacts.tree_path)
    .await
    .map_err(|e| ApiError::Artifact(format!("{}: {e}", artifacts.tree_path.display())))?;
  let tree: Value = serde_json::from_slice(&bytes)
    .map_err(|e| ApiError::Artifact(format!("{}: {e}", artifacts.tree_path.display())))?;

  Ok(success(StatusCode::OK, "Layer tree", tree))
}
