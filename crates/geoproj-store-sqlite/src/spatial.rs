//! [`SqliteSpatialDb`] — one SQLite file per project namespace.
//!
//! A namespace is `<root>/<project>.sqlite`. Every imported table has the
//! columns `fid`, `geom` (GeoJSON geometry text) and `properties` (JSON
//! object text), and is listed in the `geometry_tables` catalogue together
//! with its CRS.

use std::{
  io::ErrorKind,
  path::{Path, PathBuf},
};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use serde::Deserialize;

use geoproj_core::{
  dataset::Crs,
  spatial::{LayerSource, SpatialDatabase},
};

use crate::{encode::encode_dt, schema::NAMESPACE_SCHEMA, Error, Result};

/// Provider key QGIS uses for SQLite-backed vector tables.
pub const PROVIDER: &str = "spatialite";

#[derive(Debug, Clone)]
pub struct SqliteSpatialDb {
  root: PathBuf,
}

impl SqliteSpatialDb {
  /// Namespaces live directly under `root`, which is created on demand.
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  pub fn root(&self) -> &Path { &self.root }

  pub fn namespace_path(&self, project: &str) -> PathBuf {
    self.root.join(format!("{project}.sqlite"))
  }

  async fn connect(&self, project: &str) -> Result<tokio_rusqlite::Connection> {
    let path = self.namespace_path(project);
    if !tokio::fs::try_exists(&path).await? {
      return Err(Error::NamespaceMissing(project.to_owned()));
    }
    Ok(tokio_rusqlite::Connection::open(path).await?)
  }
}

/// Quote an SQL identifier, doubling embedded quotes.
fn quote_ident(name: &str) -> String { format!("\"{}\"", name.replace('"', "\"\"")) }

// ─── Interchange ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct FeatureCollection {
  #[serde(rename = "type")]
  kind:     String,
  #[serde(default)]
  features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
  #[serde(default)]
  geometry:   Option<serde_json::Value>,
  #[serde(default)]
  properties: Option<serde_json::Value>,
}

/// Rows ready for insertion: geometry text (if any) and properties text.
fn feature_rows(bytes: &[u8]) -> Result<Vec<(Option<String>, String)>> {
  let collection: FeatureCollection = serde_json::from_slice(bytes)
    .map_err(|e| Error::InvalidInterchange(e.to_string()))?;
  if collection.kind != "FeatureCollection" {
    return Err(Error::InvalidInterchange(format!(
      "expected a FeatureCollection, found {:?}",
      collection.kind
    )));
  }

  collection
    .features
    .into_iter()
    .map(|f| -> Result<(Option<String>, String)> {
      let geom = f
        .geometry
        .filter(|g| !g.is_null())
        .map(|g| serde_json::to_string(&g))
        .transpose()?;
      let props = match f.properties {
        Some(p) if !p.is_null() => serde_json::to_string(&p)?,
        _ => "{}".to_owned(),
      };
      Ok((geom, props))
    })
    .collect()
}

// ─── SpatialDatabase impl ────────────────────────────────────────────────────

impl SpatialDatabase for SqliteSpatialDb {
  type Error = Error;

  async fn create_namespace(&self, project: &str) -> Result<()> {
    tokio::fs::create_dir_all(&self.root).await?;
    let path = self.namespace_path(project);

    // `create_new` makes the existence check and the creation one step.
    match tokio::fs::OpenOptions::new()
      .write(true)
      .create_new(true)
      .open(&path)
      .await
    {
      Ok(_) => {}
      Err(e) if e.kind() == ErrorKind::AlreadyExists => {
        return Err(Error::NamespaceExists(project.to_owned()));
      }
      Err(e) => return Err(e.into()),
    }

    let init = async {
      let conn = tokio_rusqlite::Connection::open(&path).await?;
      conn
        .call(|conn| {
          conn.execute_batch(NAMESPACE_SCHEMA)?;
          Ok(())
        })
        .await?;
      Ok::<_, Error>(())
    };
    if let Err(e) = init.await {
      let _ = tokio::fs::remove_file(&path).await;
      return Err(e);
    }

    tracing::debug!(project, path = %path.display(), "created spatial namespace");
    Ok(())
  }

  async fn drop_namespace(&self, project: &str) -> Result<()> {
    let path = self.namespace_path(project);
    let mut journals = [path.clone().into_os_string(), path.clone().into_os_string()];
    journals[0].push("-wal");
    journals[1].push("-shm");

    for target in std::iter::once(path.into_os_string()).chain(journals) {
      match tokio::fs::remove_file(&target).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
      }
    }
    tracing::debug!(project, "dropped spatial namespace");
    Ok(())
  }

  async fn table_available(&self, project: &str, table: &str) -> Result<bool> {
    let conn  = self.connect(project).await?;
    let table = table.to_owned();

    let exists: bool = conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
              rusqlite::params![table],
              |_| Ok(()),
            )
            .optional()?
            .is_some(),
        )
      })
      .await?;
    Ok(!exists)
  }

  async fn load_interchange(
    &self,
    project: &str,
    table:   &str,
    path:    &Path,
    crs:     &Crs,
  ) -> Result<u64> {
    let conn  = self.connect(project).await?;
    let bytes = tokio::fs::read(path).await?;
    let rows  = feature_rows(&bytes)?;

    let table_s = table.to_owned();
    let crs_s   = crs.to_string();
    let at_str  = encode_dt(Utc::now());

    let loaded: Option<u64> = conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let exists = tx
          .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            rusqlite::params![table_s],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if exists {
          return Ok(None);
        }

        let quoted = quote_ident(&table_s);
        tx.execute_batch(&format!(
          "CREATE TABLE {quoted} (
             fid        INTEGER PRIMARY KEY,
             geom       TEXT,
             properties TEXT NOT NULL
           );"
        ))?;

        {
          let mut stmt =
            tx.prepare(&format!("INSERT INTO {quoted} (geom, properties) VALUES (?1, ?2)"))?;
          for (geom, props) in &rows {
            stmt.execute(rusqlite::params![geom, props])?;
          }
        }

        let count = rows.len() as u64;
        tx.execute(
          "INSERT INTO geometry_tables (table_name, crs, feature_count, loaded_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![table_s, crs_s, rows.len() as i64, at_str],
        )?;
        tx.commit()?;
        Ok(Some(count))
      })
      .await?;

    let count = loaded.ok_or_else(|| Error::TableExists {
      project: project.to_owned(),
      table:   table.to_owned(),
    })?;
    tracing::debug!(project, table, count, "loaded interchange file");
    Ok(count)
  }

  fn layer_source(&self, project: &str, table: &str) -> LayerSource {
    let path = self.namespace_path(project);
    let path = path.to_string_lossy().replace('\'', "\\'");
    LayerSource {
      provider:   PROVIDER.to_owned(),
      datasource: format!("dbname='{path}' table={} (geom)", quote_ident(table)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const PARKS: &str = r#"{
    "type": "FeatureCollection",
    "features": [
      { "type": "Feature", "geometry": { "type": "Point", "coordinates": [0, 0] },
        "properties": { "name": "north" } },
      { "type": "Feature", "geometry": { "type": "Point", "coordinates": [1, 1] },
        "properties": null },
      { "type": "Feature", "geometry": null, "properties": { "name": "ghost" } }
    ]
  }"#;

  async fn write_geojson(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("parks.geojson");
    tokio::fs::write(&path, body).await.unwrap();
    path
  }

  #[tokio::test]
  async fn namespace_is_created_once() {
    let dir = tempfile::tempdir().unwrap();
    let db  = SqliteSpatialDb::new(dir.path().join("spatial"));

    db.create_namespace("parkplan").await.unwrap();
    assert!(db.namespace_path("parkplan").exists());

    let err = db.create_namespace("parkplan").await.unwrap_err();
    assert!(matches!(err, Error::NamespaceExists(ref p) if p == "parkplan"));
  }

  #[tokio::test]
  async fn load_counts_features_and_refuses_existing_table() {
    let dir = tempfile::tempdir().unwrap();
    let db  = SqliteSpatialDb::new(dir.path());
    let src = write_geojson(dir.path(), PARKS).await;
    let crs = Crs::default();

    db.create_namespace("p").await.unwrap();
    assert!(db.table_available("p", "p_Parks").await.unwrap());

    let n = db.load_interchange("p", "p_Parks", &src, &crs).await.unwrap();
    assert_eq!(n, 3);
    assert!(!db.table_available("p", "p_Parks").await.unwrap());

    let err = db.load_interchange("p", "p_Parks", &src, &crs).await.unwrap_err();
    assert!(matches!(err, Error::TableExists { .. }));
  }

  #[tokio::test]
  async fn table_names_compare_without_case() {
    let dir = tempfile::tempdir().unwrap();
    let db  = SqliteSpatialDb::new(dir.path());
    let src = write_geojson(dir.path(), PARKS).await;
    let crs = Crs::default();

    db.create_namespace("p").await.unwrap();
    db.load_interchange("p", "p_Parks", &src, &crs).await.unwrap();

    assert!(!db.table_available("p", "p_parks").await.unwrap());
    assert!(!db.table_available("p", "P_PARKS").await.unwrap());
    let err = db.load_interchange("p", "p_parks", &src, &crs).await.unwrap_err();
    assert!(matches!(err, Error::TableExists { .. }));
  }

  #[tokio::test]
  async fn loaded_table_is_catalogued() {
    let dir = tempfile::tempdir().unwrap();
    let db  = SqliteSpatialDb::new(dir.path());
    let src = write_geojson(dir.path(), PARKS).await;
    let crs = Crs::default();

    db.create_namespace("p").await.unwrap();
    db.load_interchange("p", "p_Parks", &src, &crs).await.unwrap();

    let conn = tokio_rusqlite::Connection::open(db.namespace_path("p")).await.unwrap();
    let (rows, catalogued_crs): (i64, String) = conn
      .call(|conn| {
        let rows = conn.query_row("SELECT COUNT(*) FROM \"p_Parks\"", [], |r| r.get(0))?;
        let crs = conn.query_row(
          "SELECT crs FROM geometry_tables WHERE table_name = 'p_Parks'",
          [],
          |r| r.get(0),
        )?;
        Ok((rows, crs))
      })
      .await
      .unwrap();
    assert_eq!(rows, 3);
    assert_eq!(catalogued_crs, "EPSG:3857");
  }

  #[tokio::test]
  async fn malformed_interchange_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let db  = SqliteSpatialDb::new(dir.path());
    db.create_namespace("p").await.unwrap();

    let src = write_geojson(dir.path(), r#"{"type":"Feature"}"#).await;
    let err = db.load_interchange("p", "t", &src, &Crs::default()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInterchange(_)));
    assert!(db.table_available("p", "t").await.unwrap());
  }

  #[tokio::test]
  async fn drop_removes_namespace_and_tolerates_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db  = SqliteSpatialDb::new(dir.path());

    db.create_namespace("gone").await.unwrap();
    db.drop_namespace("gone").await.unwrap();
    assert!(!db.namespace_path("gone").exists());
    db.drop_namespace("gone").await.unwrap();

    let err = db.table_available("gone", "t").await.unwrap_err();
    assert!(matches!(err, Error::NamespaceMissing(_)));
  }

  #[test]
  fn layer_source_points_at_namespace_file() {
    let db  = SqliteSpatialDb::new("/data/spatial");
    let src = db.layer_source("parkplan", "parkplan_Trees");
    assert_eq!(src.provider, "spatialite");
    assert_eq!(
      src.datasource,
      "dbname='/data/spatial/parkplan.sqlite' table=\"parkplan_Trees\" (geom)"
    );
  }

  #[test]
  fn identifiers_are_quoted() {
    assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
  }
}
