//! [`ProjectWorkflow`] — the orchestrator of one project creation run.

use std::{path::PathBuf, sync::Arc};

use serde::Serialize;

use geoproj_core::{
  dataset::{AssetGroup, Crs},
  engine::GeometryEngine,
  project::{ProjectForm, ProjectRecord},
  spatial::SpatialDatabase,
  store::ProjectStore,
};

use crate::{
  document::{self, ProjectDocument},
  error::{AssemblyError, WorkflowError},
  pipeline::{ImportedLayer, Importer},
  state::{Progress, WorkflowState},
  transaction::Transaction,
};

/// Default cap on `slug`, `slug_1`, ... candidates tried per reservation.
pub const DEFAULT_MAX_NAME_ATTEMPTS: u32 = 1000;

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
  /// Each committed project gets a directory `<artifact_dir>/<project>/`.
  pub artifact_dir:      PathBuf,
  /// CRS every imported table is written in.
  pub crs:               Crs,
  /// Parent of the per-group scratch directories; the system temporary
  /// directory when unset.
  pub scratch_dir:       Option<PathBuf>,
  pub max_name_attempts: u32,
}

impl WorkflowSettings {
  pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
    Self {
      artifact_dir:      artifact_dir.into(),
      crs:               Crs::default(),
      scratch_dir:       None,
      max_name_attempts: DEFAULT_MAX_NAME_ATTEMPTS,
    }
  }
}

/// The outcome of a committed run.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedProject {
  pub project_name:   String,
  pub display_name:   String,
  pub domain:         String,
  pub layers:         Vec<ImportedLayer>,
  pub qgs_path:       PathBuf,
  pub tree_json_path: PathBuf,
}

/// Runs project creations against shared collaborators. Cloning is cheap.
pub struct ProjectWorkflow<S, G, D> {
  store:    Arc<S>,
  engine:   Arc<G>,
  spatial:  Arc<D>,
  settings: Arc<WorkflowSettings>,
}

impl<S, G, D> Clone for ProjectWorkflow<S, G, D> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      engine:   Arc::clone(&self.engine),
      spatial:  Arc::clone(&self.spatial),
      settings: Arc::clone(&self.settings),
    }
  }
}

impl<S, G, D> ProjectWorkflow<S, G, D> {
  pub fn new(
    store: Arc<S>,
    engine: Arc<G>,
    spatial: Arc<D>,
    settings: WorkflowSettings,
  ) -> Self {
    Self { store, engine, spatial, settings: Arc::new(settings) }
  }

  pub fn settings(&self) -> &WorkflowSettings { &self.settings }
}

impl<S, G, D> ProjectWorkflow<S, G, D>
where
  S: ProjectStore + 'static,
  G: GeometryEngine + 'static,
  D: SpatialDatabase + 'static,
{
  /// Create a project owned by `owner` from `form` and import every group.
  ///
  /// Either the project is committed with one layer per group, or nothing
  /// the run created remains. The run executes on its own task: dropping
  /// the returned future does not interrupt it, so it still ends in a
  /// commit or a rollback.
  pub async fn create_project(
    &self,
    owner: &str,
    form: &ProjectForm,
    groups: &[AssetGroup],
  ) -> Result<CreatedProject, WorkflowError> {
    let this = self.clone();
    let owner = owner.to_owned();
    let form = form.clone();
    let groups = groups.to_vec();

    tokio::spawn(async move { this.execute(&owner, &form, &groups).await })
      .await
      .map_err(|e| WorkflowError::Unknown(Box::new(e)))?
  }

  /// Discard every project a previous process left pending, with its
  /// namespace and any artifact or staging directory. Returns the names.
  pub async fn sweep_interrupted(&self) -> Result<Vec<String>, S::Error> {
    let swept = self.store.sweep_pending().await?;
    for project in &swept {
      if let Err(e) = self.spatial.drop_namespace(project).await {
        tracing::warn!(project, error = %e, "sweep: could not drop spatial namespace");
      }
      let artifact_dir = &self.settings.artifact_dir;
      for dir in [
        document::artifact_dir_for(artifact_dir, project),
        document::staging_dir_for(artifact_dir, project),
      ] {
        if let Err(e) = document::remove_dir_if_present(&dir).await {
          tracing::warn!(project, dir = %dir.display(), error = %e, "sweep: could not remove directory");
        }
      }
    }
    if !swept.is_empty() {
      tracing::info!(count = swept.len(), "swept interrupted projects");
    }
    Ok(swept)
  }

  async fn execute(
    &self,
    owner: &str,
    form: &ProjectForm,
    groups: &[AssetGroup],
  ) -> Result<CreatedProject, WorkflowError> {
    let mut progress = Progress::new();

    let meta = match form.validate() {
      Ok(meta) => meta,
      Err(fields) => {
        progress.advance(WorkflowState::Aborted);
        return Err(WorkflowError::Validation(fields));
      }
    };
    if groups.is_empty() {
      progress.advance(WorkflowState::Aborted);
      return Err(WorkflowError::NoDatasets);
    }

    progress.advance(WorkflowState::Provisioning);
    let project = match self
      .store
      .reserve_project(owner, &meta, self.settings.max_name_attempts)
      .await
    {
      Ok(project) => project,
      Err(e) => {
        progress.advance(WorkflowState::Aborted);
        return Err(WorkflowError::Provisioning(Box::new(e)));
      }
    };
    progress.set_project(&project.project_name);

    let mut tx = Transaction::begin(&*self.store, &*self.spatial, &project.project_name);
    match self.run(&mut progress, &mut tx, &project, groups).await {
      Ok(created) => {
        tx.release();
        progress.advance(WorkflowState::Committed);
        tracing::info!(
          project = %created.project_name,
          owner,
          layers = created.layers.len(),
          "project created"
        );
        Ok(created)
      }
      Err(e) => {
        let failed_in = progress.state();
        progress.advance(WorkflowState::Aborted);
        tracing::error!(
          project = %project.project_name,
          state = %failed_in,
          category = e.category().as_str(),
          error = %e,
          "project creation aborted"
        );
        tx.rollback().await;
        Err(e)
      }
    }
  }

  async fn run(
    &self,
    progress: &mut Progress,
    tx: &mut Transaction<'_, S, D>,
    project: &ProjectRecord,
    groups: &[AssetGroup],
  ) -> Result<CreatedProject, WorkflowError> {
    let name = project.project_name.as_str();

    self
      .spatial
      .create_namespace(name)
      .await
      .map_err(|e| WorkflowError::Provisioning(Box::new(e)))?;
    tx.namespace_created();

    // ── Import ────────────────────────────────────────────────────────────
    let mut importer = Importer::new(
      &*self.store,
      &*self.engine,
      &*self.spatial,
      name,
      &self.settings.crs,
      self.settings.scratch_dir.as_deref(),
    );
    let total = groups.len();
    let mut layers = Vec::with_capacity(total);
    for (index, group) in groups.iter().enumerate() {
      progress.advance(WorkflowState::Importing { index, total });
      let layer = importer.import(group).await.map_err(|source| WorkflowError::Import {
        index: group.index,
        name: group.name.clone(),
        source,
      })?;
      layers.push(layer);
    }

    // ── Assemble ──────────────────────────────────────────────────────────
    progress.advance(WorkflowState::Assembling);
    let registered = self
      .store
      .list_layers(name)
      .await
      .map_err(|e| AssemblyError::Layers(Box::new(e)))?;
    let doc = ProjectDocument::new(project, &self.settings.crs, &registered, &*self.spatial);

    tx.artifact_dir_written(document::artifact_dir_for(&self.settings.artifact_dir, name));
    let artifacts = document::write_artifacts(&doc, &self.settings.artifact_dir).await?;

    self
      .store
      .commit_project(name, &artifacts)
      .await
      .map_err(|e| AssemblyError::Commit(Box::new(e)))?;

    Ok(CreatedProject {
      project_name: project.project_name.clone(),
      display_name: project.display_name.clone(),
      domain: project.domain.clone(),
      layers,
      qgs_path: artifacts.qgs_path,
      tree_json_path: artifacts.tree_path,
    })
  }
}
