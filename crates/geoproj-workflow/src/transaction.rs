//! The durable side effects of one run, undone together on abort.

use std::{io::ErrorKind, path::PathBuf};

use geoproj_core::{spatial::SpatialDatabase, store::ProjectStore};

/// Ledger of what a run has created so far.
///
/// The project row is recorded on construction. Rolling back discards it
/// (with every layer registered for it), drops the namespace if this run
/// created it, and removes the artifact directory if this run wrote it.
pub(crate) struct Transaction<'a, S, D> {
  store:             &'a S,
  spatial:           &'a D,
  project:           String,
  namespace_created: bool,
  artifact_dir:      Option<PathBuf>,
}

impl<'a, S, D> Transaction<'a, S, D>
where
  S: ProjectStore,
  D: SpatialDatabase,
{
  pub(crate) fn begin(store: &'a S, spatial: &'a D, project: &str) -> Self {
    Self {
      store,
      spatial,
      project: project.to_owned(),
      namespace_created: false,
      artifact_dir: None,
    }
  }

  pub(crate) fn namespace_created(&mut self) { self.namespace_created = true; }

  pub(crate) fn artifact_dir_written(&mut self, dir: PathBuf) {
    self.artifact_dir = Some(dir);
  }

  /// Keep everything; the project has been committed.
  pub(crate) fn release(self) {}

  /// Undo every recorded side effect. Failures are logged and skipped so
  /// that one failed step does not keep the others from running.
  pub(crate) async fn rollback(self) {
    let project = self.project.as_str();

    if let Err(e) = self.store.discard_project(project).await {
      tracing::warn!(project, error = %e, "rollback: could not discard project row");
    }

    if self.namespace_created
      && let Err(e) = self.spatial.drop_namespace(project).await
    {
      tracing::warn!(project, error = %e, "rollback: could not drop spatial namespace");
    }

    if let Some(dir) = &self.artifact_dir {
      match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
          project,
          dir = %dir.display(),
          error = %e,
          "rollback: could not remove artifact directory"
        ),
      }
    }

    tracing::debug!(project, "rolled back");
  }
}
