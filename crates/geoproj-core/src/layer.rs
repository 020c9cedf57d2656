//! Layer records: the link between a project and one spatial table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dataset::{DatasetInfo, Extent, GeometryType};

/// Visibility flags of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerVisibility {
  pub published: bool,
  pub public:    bool,
  /// The layer was created by the application rather than by hand.
  pub is_app:    bool,
}

impl LayerVisibility {
  /// Flags of a freshly imported layer: closed, application-managed.
  pub fn imported() -> Self {
    Self { published: false, public: false, is_app: true }
  }
}

/// Input to [`crate::store::ProjectStore::register_layer`].
#[derive(Debug, Clone)]
pub struct NewLayer {
  pub project_name:      String,
  pub display_name:      String,
  pub source_table_name: String,
  pub info:              DatasetInfo,
}

/// A persisted layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerRecord {
  pub layer_id:          Uuid,
  pub project_name:      String,
  pub display_name:      String,
  pub source_table_name: String,
  pub geometry_type:     GeometryType,
  pub feature_count:     u64,
  pub extent:            Extent,
  #[serde(flatten)]
  pub visibility:        LayerVisibility,
  pub created_at:        DateTime<Utc>,
}
