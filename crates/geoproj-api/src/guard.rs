//! [`OwnedProject`]: access to a committed project by its owner only.

use axum::{
  extract::{FromRequestParts, Query},
  http::request::Parts,
};
use geoproj_core::{
  engine::GeometryEngine, project::ProjectRecord, spatial::SpatialDatabase,
  store::ProjectStore,
};
use serde::Deserialize;

use crate::{AppState, auth::CurrentUser, error::ApiError};

#[derive(Debug, Deserialize)]
struct ProjectQuery {
  project: Option<String>,
}

/// The project named by the `project` query parameter, owned by the caller.
///
/// Rejects with 400 when the parameter is missing, 404 when no committed
/// project has that name, 403 when someone else owns it and 500 when the
/// lookup fails.
#[derive(Debug, Clone)]
pub struct OwnedProject {
  pub user:    CurrentUser,
  pub project: ProjectRecord,
}

/// Decide whether `user` may act on `project_name`.
pub async fn check_owner<S: ProjectStore>(
  store: &S,
  user: &CurrentUser,
  project_name: &str,
) -> Result<ProjectRecord, ApiError> {
  match store.get_project(project_name).await {
    Ok(Some(project)) if project.owner == user.username => Ok(project),
    Ok(Some(_)) => Err(ApiError::NotOwner(project_name.to_owned())),
    Ok(None) => Err(ApiError::ProjectNotFound(project_name.to_owned())),
    Err(e) => Err(ApiError::PermissionCheck(Box::new(e))),
  }
}

impl<S, G, D> FromRequestParts<AppState<S, G, D>> for OwnedProject
where
  S: ProjectStore + 'static,
  G: GeometryEngine + 'static,
  D: SpatialDatabase + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, G, D>,
  ) -> Result<Self, Self::Rejection> {
    let user = CurrentUser::from_request_parts(parts, state).await?;

    let Query(query) = Query::<ProjectQuery>::try_from_uri(&parts.uri)
      .map_err(|_| ApiError::MissingProject)?;
    let name = query
      .project
      .map(|p| p.trim().to_owned())
      .filter(|p| !p.is_empty())
      .ok_or(ApiError::MissingProject)?;

    let project = check_owner(&*state.store, &user, &name).await?;
    Ok(Self { user, project })
  }
}
