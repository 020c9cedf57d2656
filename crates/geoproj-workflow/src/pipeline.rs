//! Importing one asset group into a project.
//!
//! Each group gets a fresh scratch directory. The uploaded files are written
//! there under fixed names (`dataset.shp`, `dataset.dbf`, ...), validated and
//! converted by the geometry engine, and the GeoJSON result is loaded into a
//! new table of the project's namespace. The scratch directory is gone once
//! [`Importer::import`] returns, whatever the outcome.

use std::{
  collections::HashSet,
  path::{Path, PathBuf},
};

use serde::Serialize;

use geoproj_core::{
  dataset::{AssetGroup, Crs, DatasetInfo, Extent, GeometryType, PRIMARY_EXTENSION},
  engine::GeometryEngine,
  layer::NewLayer,
  naming,
  spatial::SpatialDatabase,
  store::ProjectStore,
};

use crate::error::ImportError;

/// File stem every staged file shares.
pub const STAGED_STEM: &str = "dataset";

/// Name of the converted file inside the scratch directory.
pub const INTERCHANGE_FILE: &str = "dataset.geojson";

/// What the client is told about an imported dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedLayer {
  pub layer_name:        String,
  pub source_table_name: String,
  pub geometry_type:     GeometryType,
  pub feature_count:     u64,
  pub extent:            Extent,
}

impl ImportedLayer {
  fn new(layer_name: &str, table: String, info: &DatasetInfo) -> Self {
    Self {
      layer_name:        layer_name.to_owned(),
      source_table_name: table,
      geometry_type:     info.geometry_type,
      feature_count:     info.feature_count,
      extent:            info.extent,
    }
  }
}

/// Imports the groups of one run into `project`.
///
/// Remembers every table name it has produced so that two groups of the
/// same run can never map to one table. Names are compared without case,
/// as SQLite does.
pub(crate) struct Importer<'a, S, G, D> {
  store:        &'a S,
  engine:       &'a G,
  spatial:      &'a D,
  project:      &'a str,
  crs:          &'a Crs,
  scratch_root: Option<&'a Path>,
  tables:       HashSet<String>,
}

impl<'a, S, G, D> Importer<'a, S, G, D>
where
  S: ProjectStore,
  G: GeometryEngine,
  D: SpatialDatabase,
{
  pub(crate) fn new(
    store: &'a S,
    engine: &'a G,
    spatial: &'a D,
    project: &'a str,
    crs: &'a Crs,
    scratch_root: Option<&'a Path>,
  ) -> Self {
    Self {
      store,
      engine,
      spatial,
      project,
      crs,
      scratch_root,
      tables: HashSet::new(),
    }
  }

  pub(crate) async fn import(
    &mut self,
    group: &AssetGroup,
  ) -> Result<ImportedLayer, ImportError> {
    let scratch = self.scratch_dir().await.map_err(ImportError::Staging)?;
    let result = self.import_in(scratch.path(), group).await;

    let path = scratch.path().to_owned();
    let removed = tokio::task::spawn_blocking(move || scratch.close())
      .await
      .map_err(std::io::Error::other)
      .and_then(|r| r);
    if let Err(e) = removed {
      tracing::warn!(dir = %path.display(), error = %e, "could not remove scratch directory");
    }
    result
  }

  async fn scratch_dir(&self) -> std::io::Result<tempfile::TempDir> {
    let root = self.scratch_root.map(Path::to_owned);
    if let Some(root) = &root {
      tokio::fs::create_dir_all(root).await?;
    }
    tokio::task::spawn_blocking(move || {
      let mut builder = tempfile::Builder::new();
      builder.prefix("geoproj-import-");
      match root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
      }
    })
    .await
    .map_err(std::io::Error::other)?
  }

  async fn import_in(
    &mut self,
    dir: &Path,
    group: &AssetGroup,
  ) -> Result<ImportedLayer, ImportError> {
    let source = stage(dir, group).await.map_err(ImportError::Staging)?;
    tracing::debug!(project = self.project, index = group.index, name = %group.name, "staged");

    let info = self
      .engine
      .open(&source)
      .await
      .map_err(|e| ImportError::InvalidSource(Box::new(e)))?;

    let interchange = dir.join(INTERCHANGE_FILE);
    self
      .engine
      .convert(&source, &interchange, self.crs)
      .await
      .map_err(|e| ImportError::Conversion(Box::new(e)))?;

    let table = naming::table_name(self.project, &group.name)
      .map_err(|_| ImportError::InvalidLayerName(group.name.clone()))?;
    let available = self
      .spatial
      .table_available(self.project, &table)
      .await
      .map_err(|e| ImportError::Load(Box::new(e)))?;
    if !available || !self.tables.insert(table.to_lowercase()) {
      return Err(ImportError::TableNameTaken(table));
    }

    let loaded = self
      .spatial
      .load_interchange(self.project, &table, &interchange, self.crs)
      .await
      .map_err(|e| ImportError::Load(Box::new(e)))?;
    tracing::debug!(project = self.project, table = %table, loaded, "loaded");

    self
      .store
      .register_layer(NewLayer {
        project_name:      self.project.to_owned(),
        display_name:      group.name.clone(),
        source_table_name: table.clone(),
        info:              info.clone(),
      })
      .await
      .map_err(|e| ImportError::Register(Box::new(e)))?;

    Ok(ImportedLayer::new(&group.name, table, &info))
  }
}

/// Write the group's files into `dir`, returning the primary file's path.
async fn stage(dir: &Path, group: &AssetGroup) -> std::io::Result<PathBuf> {
  let primary = dir.join(format!("{STAGED_STEM}.{PRIMARY_EXTENSION}"));
  tokio::fs::write(&primary, &group.primary.content).await?;

  for (role, file) in &group.sidecars {
    let path = dir.join(format!("{STAGED_STEM}.{}", role.extension()));
    tokio::fs::write(path, &file.content).await?;
  }
  Ok(primary)
}

#[cfg(test)]
mod tests {
  use geoproj_core::dataset::{SidecarRole, StagedFile};

  use super::*;

  #[tokio::test]
  async fn staged_names_ignore_client_file_names() {
    let dir = tempfile::tempdir().unwrap();
    let mut primary = StagedFile::new(&b"shp"[..]);
    primary.file_name = Some("../../etc/passwd.shp".into());
    let group = AssetGroup::new(0, Some("Parks".into()), primary)
      .with_sidecar(SidecarRole::Attributes, StagedFile::new(&b"dbf"[..]))
      .with_sidecar(SidecarRole::Projection, StagedFile::new(&b"prj"[..]));

    let source = stage(dir.path(), &group).await.unwrap();
    assert_eq!(source, dir.path().join("dataset.shp"));

    let mut names: Vec<_> = std::fs::read_dir(dir.path())
      .unwrap()
      .map(|e| e.unwrap().file_name().into_string().unwrap())
      .collect();
    names.sort();
    assert_eq!(names, ["dataset.dbf", "dataset.prj", "dataset.shp"]);
    assert_eq!(std::fs::read(dir.path().join("dataset.prj")).unwrap(), b"prj");
  }
}
