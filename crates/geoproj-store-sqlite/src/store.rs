//! [`SqliteStore`] — the SQLite implementation of [`ProjectStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use geoproj_core::{
  layer::{LayerRecord, LayerVisibility, NewLayer},
  naming,
  project::{ProjectArtifacts, ProjectMeta, ProjectRecord},
  store::{ProjectStore, User},
};

use crate::{
  encode::{
    encode_dt, encode_extent, encode_keywords, encode_uuid, RawLayer, RawProject,
    RawUser, LAYER_COLUMNS, PROJECT_COLUMNS,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Project metadata backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. Every call
/// runs on the one connection thread, so the read-then-insert in
/// [`ProjectStore::reserve_project`] cannot interleave with another
/// reservation.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn committed_project(&self, project_name: &str) -> Result<Option<ProjectRecord>> {
    let name = project_name.to_owned();
    let sql = format!(
      "SELECT {PROJECT_COLUMNS} FROM projects \
       WHERE project_name = ?1 AND state = 'committed'"
    );

    let raw: Option<RawProject> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![name], RawProject::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawProject::into_project).transpose()
  }
}

// ─── ProjectStore impl ───────────────────────────────────────────────────────

impl ProjectStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn add_user(&self, username: &str, password_hash: &str) -> Result<User> {
    let user = User {
      username:      username.to_owned(),
      password_hash: password_hash.to_owned(),
      created_at:    Utc::now(),
    };

    let name   = user.username.clone();
    let hash   = user.password_hash.clone();
    let at_str = encode_dt(user.created_at);

    let inserted: bool = self
      .conn
      .call(move |conn| {
        let exists = conn
          .query_row(
            "SELECT 1 FROM users WHERE username = ?1",
            rusqlite::params![name],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if exists {
          return Ok(false);
        }
        conn.execute(
          "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![name, hash, at_str],
        )?;
        Ok(true)
      })
      .await?;

    if !inserted {
      return Err(Error::UserExists(user.username));
    }
    Ok(user)
  }

  async fn find_user(&self, username: &str) -> Result<Option<User>> {
    let name = username.to_owned();

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT username, password_hash, created_at FROM users WHERE username = ?1",
              rusqlite::params![name],
              |row| {
                Ok(RawUser {
                  username:      row.get(0)?,
                  password_hash: row.get(1)?,
                  created_at:    row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  // ── Provisioning ──────────────────────────────────────────────────────────

  async fn reserve_project(
    &self,
    owner:        &str,
    meta:         &ProjectMeta,
    max_attempts: u32,
  ) -> Result<ProjectRecord> {
    let base       = naming::project_slug(&meta.display_name);
    let created_at = Utc::now();

    let base_c       = base.clone();
    let owner_s      = owner.to_owned();
    let display_name = meta.display_name.clone();
    let domain       = meta.domain.clone();
    let description  = meta.description.clone();
    let keywords_str = encode_keywords(&meta.keywords)?;
    let category     = meta.category.clone();
    let at_str       = encode_dt(created_at);

    let reserved: Option<String> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let mut chosen = None;
        for attempt in 0..max_attempts {
          let candidate = naming::candidate_name(&base_c, attempt);
          let taken = tx
            .query_row(
              "SELECT 1 FROM projects WHERE project_name = ?1",
              rusqlite::params![candidate],
              |_| Ok(()),
            )
            .optional()?
            .is_some();
          if !taken {
            chosen = Some(candidate);
            break;
          }
        }

        if let Some(name) = &chosen {
          tx.execute(
            "INSERT INTO projects (
               project_name, display_name, owner, domain, description,
               keywords, category, created_at, state
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending')",
            rusqlite::params![
              name,
              display_name,
              owner_s,
              domain,
              description,
              keywords_str,
              category,
              at_str,
            ],
          )?;
        }
        tx.commit()?;
        Ok(chosen)
      })
      .await?;

    let project_name = reserved.ok_or(Error::NamesExhausted {
      base,
      attempts: max_attempts,
    })?;

    Ok(ProjectRecord {
      project_name,
      display_name: meta.display_name.clone(),
      owner: owner.to_owned(),
      domain: meta.domain.clone(),
      description: meta.description.clone(),
      keywords: meta.keywords.clone(),
      category: meta.category.clone(),
      created_at,
      artifacts: None,
    })
  }

  async fn register_layer(&self, layer: NewLayer) -> Result<LayerRecord> {
    let record = LayerRecord {
      layer_id:          Uuid::new_v4(),
      project_name:      layer.project_name,
      display_name:      layer.display_name,
      source_table_name: layer.source_table_name,
      geometry_type:     layer.info.geometry_type,
      feature_count:     layer.info.feature_count,
      extent:            layer.info.extent,
      visibility:        LayerVisibility::imported(),
      created_at:        Utc::now(),
    };

    let id_str        = encode_uuid(record.layer_id);
    let project       = record.project_name.clone();
    let display_name  = record.display_name.clone();
    let table         = record.source_table_name.clone();
    let geometry_type = record.geometry_type.as_str();
    let feature_count = i64::try_from(record.feature_count).unwrap_or(i64::MAX);
    let extent_str    = encode_extent(record.extent)?;
    let flags         = record.visibility;
    let at_str        = encode_dt(record.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO layers (
             layer_id, project_name, display_name, source_table_name,
             geometry_type, feature_count, extent,
             published, public, is_app, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
          rusqlite::params![
            id_str,
            project,
            display_name,
            table,
            geometry_type,
            feature_count,
            extent_str,
            flags.published,
            flags.public,
            flags.is_app,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(record)
  }

  async fn commit_project(
    &self,
    project_name: &str,
    artifacts:    &ProjectArtifacts,
  ) -> Result<ProjectRecord> {
    let name     = project_name.to_owned();
    let qgs_str  = artifacts.qgs_path.to_string_lossy().into_owned();
    let tree_str = artifacts.tree_path.to_string_lossy().into_owned();

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE projects
             SET state = 'committed', qgs_path = ?2, tree_path = ?3
           WHERE project_name = ?1 AND state = 'pending'",
          rusqlite::params![name, qgs_str, tree_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::ProjectNotPending(project_name.to_owned()));
    }

    self
      .committed_project(project_name)
      .await?
      .ok_or_else(|| Error::ProjectNotPending(project_name.to_owned()))
  }

  async fn discard_project(&self, project_name: &str) -> Result<()> {
    let name = project_name.to_owned();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM layers
           WHERE project_name IN (
             SELECT project_name FROM projects
             WHERE project_name = ?1 AND state = 'pending'
           )",
          rusqlite::params![name],
        )?;
        tx.execute(
          "DELETE FROM projects WHERE project_name = ?1 AND state = 'pending'",
          rusqlite::params![name],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn sweep_pending(&self) -> Result<Vec<String>> {
    let names: Vec<String> = self
      .conn
      .call(|conn| {
        let tx = conn.transaction()?;
        let names = {
          let mut stmt =
            tx.prepare("SELECT project_name FROM projects WHERE state = 'pending'")?;
          stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?
        };
        tx.execute(
          "DELETE FROM layers WHERE project_name IN (
             SELECT project_name FROM projects WHERE state = 'pending'
           )",
          [],
        )?;
        tx.execute("DELETE FROM projects WHERE state = 'pending'", [])?;
        tx.commit()?;
        Ok(names)
      })
      .await?;

    if !names.is_empty() {
      tracing::warn!(count = names.len(), "discarded stale pending projects");
    }
    Ok(names)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_project(&self, project_name: &str) -> Result<Option<ProjectRecord>> {
    self.committed_project(project_name).await
  }

  async fn list_projects(&self, owner: &str) -> Result<Vec<ProjectRecord>> {
    let owner_s = owner.to_owned();

    let raws: Vec<RawProject> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PROJECT_COLUMNS} FROM projects
           WHERE owner = ?1 AND state = 'committed'
           ORDER BY created_at, project_name"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![owner_s], RawProject::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProject::into_project).collect()
  }

  async fn list_layers(&self, project_name: &str) -> Result<Vec<LayerRecord>> {
    let name = project_name.to_owned();

    let raws: Vec<RawLayer> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {LAYER_COLUMNS} FROM layers
           WHERE project_name = ?1
           ORDER BY rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![name], RawLayer::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLayer::into_layer).collect()
  }
}
