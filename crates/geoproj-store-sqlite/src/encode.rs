//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Keyword lists and extents
//! are stored as compact JSON. UUIDs are stored as hyphenated lowercase
//! strings.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use geoproj_core::{
  dataset::{Extent, GeometryType},
  layer::{LayerRecord, LayerVisibility},
  project::{ProjectArtifacts, ProjectRecord},
  store::User,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Keywords ─────────────────────────────────────────────────────────────────

pub fn encode_keywords(keywords: &[String]) -> Result<String> {
  Ok(serde_json::to_string(keywords)?)
}

pub fn decode_keywords(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Extent ───────────────────────────────────────────────────────────────────

pub fn encode_extent(extent: Extent) -> Result<String> {
  Ok(serde_json::to_string(&extent)?)
}

pub fn decode_extent(s: &str) -> Result<Extent> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawProject::from_row`].
pub const PROJECT_COLUMNS: &str = "project_name, display_name, owner, domain, \
  description, keywords, category, created_at, qgs_path, tree_path";

/// Raw strings read directly from a `projects` row.
pub struct RawProject {
  pub project_name: String,
  pub display_name: String,
  pub owner:        String,
  pub domain:       String,
  pub description:  String,
  pub keywords:     String,
  pub category:     String,
  pub created_at:   String,
  pub qgs_path:     Option<String>,
  pub tree_path:    Option<String>,
}

impl RawProject {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      project_name: row.get(0)?,
      display_name: row.get(1)?,
      owner:        row.get(2)?,
      domain:       row.get(3)?,
      description:  row.get(4)?,
      keywords:     row.get(5)?,
      category:     row.get(6)?,
      created_at:   row.get(7)?,
      qgs_path:     row.get(8)?,
      tree_path:    row.get(9)?,
    })
  }

  pub fn into_project(self) -> Result<ProjectRecord> {
    let artifacts = match (self.qgs_path, self.tree_path) {
      (Some(qgs), Some(tree)) => Some(ProjectArtifacts {
        qgs_path:  PathBuf::from(qgs),
        tree_path: PathBuf::from(tree),
      }),
      _ => None,
    };
    Ok(ProjectRecord {
      project_name: self.project_name,
      display_name: self.display_name,
      owner: self.owner,
      domain: self.domain,
      description: self.description,
      keywords: decode_keywords(&self.keywords)?,
      category: self.category,
      created_at: decode_dt(&self.created_at)?,
      artifacts,
    })
  }
}

/// Column list matching [`RawLayer::from_row`].
pub const LAYER_COLUMNS: &str = "layer_id, project_name, display_name, \
  source_table_name, geometry_type, feature_count, extent, published, public, \
  is_app, created_at";

/// Raw values read directly from a `layers` row.
pub struct RawLayer {
  pub layer_id:          String,
  pub project_name:      String,
  pub display_name:      String,
  pub source_table_name: String,
  pub geometry_type:     String,
  pub feature_count:     i64,
  pub extent:            String,
  pub published:         bool,
  pub public:            bool,
  pub is_app:            bool,
  pub created_at:        String,
}

impl RawLayer {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      layer_id:          row.get(0)?,
      project_name:      row.get(1)?,
      display_name:      row.get(2)?,
      source_table_name: row.get(3)?,
      geometry_type:     row.get(4)?,
      feature_count:     row.get(5)?,
      extent:            row.get(6)?,
      published:         row.get(7)?,
      public:            row.get(8)?,
      is_app:            row.get(9)?,
      created_at:        row.get(10)?,
    })
  }

  pub fn into_layer(self) -> Result<LayerRecord> {
    let Ok(geometry_type) = self.geometry_type.parse::<GeometryType>();
    Ok(LayerRecord {
      layer_id: decode_uuid(&self.layer_id)?,
      project_name: self.project_name,
      display_name: self.display_name,
      source_table_name: self.source_table_name,
      geometry_type,
      feature_count: u64::try_from(self.feature_count).unwrap_or_default(),
      extent: decode_extent(&self.extent)?,
      visibility: LayerVisibility {
        published: self.published,
        public:    self.public,
        is_app:    self.is_app,
      },
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub username:      String,
  pub password_hash: String,
  pub created_at:    String,
}

impl RawUser {
  pub fn into_user(self) -> Result<User> {
    Ok(User {
      username:      self.username,
      password_hash: self.password_hash,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extent_round_trips_through_json_column() {
    let extent = Extent::from([-1.5, 2.0, 3.25, 4.0]);
    assert_eq!(decode_extent(&encode_extent(extent).unwrap()).unwrap(), extent);
  }

  #[test]
  fn bad_timestamp_is_reported() {
    assert!(matches!(decode_dt("yesterday"), Err(Error::DateParse(_))));
  }
}
