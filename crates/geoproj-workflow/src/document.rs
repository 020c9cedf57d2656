//! The project document and its two serialisations.
//!
//! A [`ProjectDocument`] is built once per run from the registered layers.
//! `<project>.qgs` (QGIS project XML) and `tree.json` (the layer tree the
//! map client reads) are both rendered from it, so they always name the
//! same layers.

use std::{
  io::{Cursor, ErrorKind},
  path::{Path, PathBuf},
};

use quick_xml::{
  Writer,
  events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use geoproj_core::{
  dataset::{Crs, Extent, GeometryType},
  layer::{LayerRecord, LayerVisibility},
  project::{ProjectArtifacts, ProjectRecord},
  spatial::{LayerSource, SpatialDatabase},
};

use crate::error::AssemblyError;

/// File name of the layer tree inside a project's artifact directory.
pub const TREE_FILE: &str = "tree.json";

/// QGIS version the project XML claims to be written by.
const QGIS_VERSION: &str = "3.34.0-Prizren";

/// Opacity of a freshly imported layer, 0-255.
const DEFAULT_OPACITY: u8 = 255;

// ─── Layer ids ───────────────────────────────────────────────────────────────

/// Deterministic layer id: the table name followed by the first 16 hex
/// digits of `sha256("<project>/<table>")`.
pub fn layer_id(project: &str, table: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(project.as_bytes());
  hasher.update(b"/");
  hasher.update(table.as_bytes());
  let digest = hex::encode(hasher.finalize());
  format!("{table}_{}", &digest[..16])
}

// ─── Document ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLayer {
  pub id:            String,
  pub table_name:    String,
  pub display_name:  String,
  pub source:        LayerSource,
  pub geometry_type: GeometryType,
  pub feature_count: u64,
  pub extent:        Extent,
  pub visibility:    LayerVisibility,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDocument {
  pub project_name: String,
  pub title:        String,
  pub crs:          Crs,
  pub layers:       Vec<DocumentLayer>,
}

impl ProjectDocument {
  /// Layers keep the order they were registered in.
  pub fn new<D: SpatialDatabase>(
    project: &ProjectRecord,
    crs: &Crs,
    layers: &[LayerRecord],
    spatial: &D,
  ) -> Self {
    let layers = layers
      .iter()
      .map(|l| DocumentLayer {
        id:            layer_id(&project.project_name, &l.source_table_name),
        table_name:    l.source_table_name.clone(),
        display_name:  l.display_name.clone(),
        source:        spatial.layer_source(&project.project_name, &l.source_table_name),
        geometry_type: l.geometry_type,
        feature_count: l.feature_count,
        extent:        l.extent,
        visibility:    l.visibility,
      })
      .collect();

    Self {
      project_name: project.project_name.clone(),
      title: project.display_name.clone(),
      crs: crs.clone(),
      layers,
    }
  }

  pub fn table_names(&self) -> impl Iterator<Item = &str> {
    self.layers.iter().map(|l| l.table_name.as_str())
  }

  pub fn qgs_file_name(&self) -> String { format!("{}.qgs", self.project_name) }

  // ── tree.json ─────────────────────────────────────────────────────────────

  pub fn to_tree(&self) -> LayerTree {
    let group_id = format!("{}_group", self.project_name);
    let children = self
      .layers
      .iter()
      .map(|l| TreeNode::VectorLayer {
        name:          l.display_name.clone(),
        id:            l.id.clone(),
        table:         l.table_name.clone(),
        visible:       true,
        public:        l.visibility.public,
        published:     l.visibility.published,
        app:           l.visibility.is_app,
        parent:        group_id.clone(),
        extent:        l.extent,
        geometry:      l.geometry_type,
        feature_count: l.feature_count,
        opacity:       DEFAULT_OPACITY,
      })
      .collect();

    LayerTree {
      children: vec![TreeNode::Group {
        name: self.title.clone(),
        id: group_id,
        visible: true,
        children,
      }],
    }
  }

  // ── <project>.qgs ─────────────────────────────────────────────────────────

  pub fn to_qgs(&self) -> Result<Vec<u8>, AssemblyError> {
    let mut w = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    let crs = &self.crs;

    write_event(&mut w, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write_event(
      &mut w,
      Event::Start(BytesStart::new("qgis").with_attributes([
        ("projectname", self.title.as_str()),
        ("version", QGIS_VERSION),
      ])),
    )?;
    write_text_elem(&mut w, "title", &self.title)?;

    write_start(&mut w, "projectCrs")?;
    write_srs(&mut w, crs)?;
    write_end(&mut w, "projectCrs")?;

    // Layer tree: one group named after the project holding every layer.
    write_event(
      &mut w,
      Event::Start(
        BytesStart::new("layer-tree-group")
          .with_attributes([("name", ""), ("checked", "Qt::Checked"), ("expanded", "1")]),
      ),
    )?;
    write_event(
      &mut w,
      Event::Start(BytesStart::new("layer-tree-group").with_attributes([
        ("name", self.title.as_str()),
        ("checked", "Qt::Checked"),
        ("expanded", "1"),
      ])),
    )?;
    for layer in &self.layers {
      write_event(
        &mut w,
        Event::Empty(BytesStart::new("layer-tree-layer").with_attributes([
          ("id", layer.id.as_str()),
          ("name", layer.display_name.as_str()),
          ("source", layer.source.datasource.as_str()),
          ("providerKey", layer.source.provider.as_str()),
          ("checked", "Qt::Checked"),
          ("expanded", "1"),
        ])),
      )?;
    }
    write_end(&mut w, "layer-tree-group")?;
    write_end(&mut w, "layer-tree-group")?;

    write_start(&mut w, "projectlayers")?;
    for layer in &self.layers {
      let feature_count = layer.feature_count.to_string();
      write_event(
        &mut w,
        Event::Start(BytesStart::new("maplayer").with_attributes([
          ("type", "vector"),
          ("geometry", layer.geometry_type.as_str()),
          ("featureCount", feature_count.as_str()),
        ])),
      )?;
      write_text_elem(&mut w, "id", &layer.id)?;
      write_text_elem(&mut w, "layername", &layer.display_name)?;
      write_text_elem(&mut w, "datasource", &layer.source.datasource)?;
      write_text_elem(&mut w, "provider", &layer.source.provider)?;

      write_start(&mut w, "extent")?;
      let e = layer.extent;
      for (tag, value) in [("xmin", e.xmin), ("ymin", e.ymin), ("xmax", e.xmax), ("ymax", e.ymax)] {
        write_text_elem(&mut w, tag, &value.to_string())?;
      }
      write_end(&mut w, "extent")?;

      write_start(&mut w, "srs")?;
      write_srs(&mut w, crs)?;
      write_end(&mut w, "srs")?;
      write_end(&mut w, "maplayer")?;
    }
    write_end(&mut w, "projectlayers")?;

    write_end(&mut w, "qgis")?;
    Ok(w.into_inner().into_inner())
  }
}

// ─── Layer tree ──────────────────────────────────────────────────────────────

/// The contents of `tree.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerTree {
  pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TreeNode {
  #[serde(rename = "group")]
  Group {
    name:     String,
    id:       String,
    visible:  bool,
    children: Vec<TreeNode>,
  },
  VectorLayer {
    name:          String,
    id:            String,
    table:         String,
    visible:       bool,
    public:        bool,
    published:     bool,
    app:           bool,
    parent:        String,
    extent:        Extent,
    geometry:      GeometryType,
    feature_count: u64,
    opacity:       u8,
  },
}

impl LayerTree {
  /// Table names of every layer node, depth first.
  pub fn table_names(&self) -> Vec<&str> {
    fn walk<'t>(nodes: &'t [TreeNode], out: &mut Vec<&'t str>) {
      for node in nodes {
        match node {
          TreeNode::Group { children, .. } => walk(children, out),
          TreeNode::VectorLayer { table, .. } => out.push(table),
        }
      }
    }
    let mut out = Vec::new();
    walk(&self.children, &mut out);
    out
  }
}

// ─── Writing ─────────────────────────────────────────────────────────────────

/// Write both artifacts into `<artifact_dir>/<project>/`.
///
/// The files are first written to a sibling staging directory which is then
/// renamed into place, so readers see either no directory or a complete one.
/// An existing directory for the same project is replaced.
pub async fn write_artifacts(
  doc: &ProjectDocument,
  artifact_dir: &Path,
) -> Result<ProjectArtifacts, AssemblyError> {
  let qgs  = doc.to_qgs()?;
  let tree = serde_json::to_vec_pretty(&doc.to_tree())?;

  tokio::fs::create_dir_all(artifact_dir).await?;
  let target  = artifact_dir_for(artifact_dir, &doc.project_name);
  let staging = staging_dir_for(artifact_dir, &doc.project_name);

  remove_dir_if_present(&staging).await?;
  let written = async {
    tokio::fs::create_dir(&staging).await?;
    tokio::fs::write(staging.join(doc.qgs_file_name()), &qgs).await?;
    tokio::fs::write(staging.join(TREE_FILE), &tree).await?;

    if tokio::fs::try_exists(&target).await? {
      tracing::warn!(dir = %target.display(), "replacing stale artifact directory");
      tokio::fs::remove_dir_all(&target).await?;
    }
    tokio::fs::rename(&staging, &target).await
  };
  if let Err(e) = written.await {
    let _ = remove_dir_if_present(&staging).await;
    return Err(e.into());
  }

  Ok(artifact_paths(&target, doc))
}

fn artifact_paths(dir: &Path, doc: &ProjectDocument) -> ProjectArtifacts {
  ProjectArtifacts {
    qgs_path:  dir.join(doc.qgs_file_name()),
    tree_path: dir.join(TREE_FILE),
  }
}

/// The directory [`write_artifacts`] writes `doc` to.
pub fn artifact_dir_for(artifact_dir: &Path, project: &str) -> PathBuf {
  artifact_dir.join(project)
}

/// The hidden sibling `write_artifacts` assembles `project`'s files in.
pub fn staging_dir_for(artifact_dir: &Path, project: &str) -> PathBuf {
  artifact_dir.join(format!(".{project}.staging"))
}

pub(crate) async fn remove_dir_if_present(dir: &Path) -> std::io::Result<()> {
  match tokio::fs::remove_dir_all(dir).await {
    Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
    _ => Ok(()),
  }
}

// ─── XML writer helpers ──────────────────────────────────────────────────────

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn write_event(w: &mut XmlWriter, event: Event<'_>) -> Result<(), AssemblyError> {
  w.write_event(event).map_err(|e| AssemblyError::Xml(e.to_string()))
}

fn write_start(w: &mut XmlWriter, tag: &str) -> Result<(), AssemblyError> {
  write_event(w, Event::Start(BytesStart::new(tag)))
}

fn write_end(w: &mut XmlWriter, tag: &str) -> Result<(), AssemblyError> {
  write_event(w, Event::End(BytesEnd::new(tag)))
}

fn write_text_elem(w: &mut XmlWriter, tag: &str, text: &str) -> Result<(), AssemblyError> {
  write_start(w, tag)?;
  write_event(w, Event::Text(BytesText::new(text)))?;
  write_end(w, tag)
}

/// `<spatialrefsys>` with the authority id, plus `<srid>` for EPSG codes.
fn write_srs(w: &mut XmlWriter, crs: &Crs) -> Result<(), AssemblyError> {
  write_start(w, "spatialrefsys")?;
  write_text_elem(w, "authid", crs.as_str())?;
  if let Some(code) = crs.epsg() {
    write_text_elem(w, "srid", &code.to_string())?;
  }
  write_end(w, "spatialrefsys")
}
