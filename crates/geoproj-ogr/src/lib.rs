//! A [`GeometryEngine`] backed by the GDAL/OGR command-line tools.
//!
//! `ogrinfo -json` reports a dataset summary; `ogr2ogr` converts it to
//! GeoJSON in the requested CRS. Both programs must be on `PATH` unless
//! explicit locations are configured.
//!
//! Both are run with `SHAPE_RESTORE_SHX=YES` so a `.shp` uploaded without
//! its `.shx` index still opens.

pub mod error;

use std::{
  ffi::OsString,
  path::{Path, PathBuf},
};

use serde::Deserialize;
use tokio::process::Command;

pub use error::{Error, Result};
use geoproj_core::{
  dataset::{Crs, DatasetInfo, Extent, GeometryType},
  engine::GeometryEngine,
};

/// GDAL options passed to every invocation.
const GDAL_CONFIG: [(&str, &str); 1] = [("SHAPE_RESTORE_SHX", "YES")];

fn config_args() -> impl Iterator<Item = OsString> {
  GDAL_CONFIG
    .into_iter()
    .flat_map(|(key, value)| ["--config", key, value])
    .map(OsString::from)
}

// ─── Engine ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct OgrEngine {
  ogrinfo: PathBuf,
  ogr2ogr: PathBuf,
}

impl Default for OgrEngine {
  fn default() -> Self { Self::new("ogrinfo", "ogr2ogr") }
}

impl OgrEngine {
  pub fn new(ogrinfo: impl Into<PathBuf>, ogr2ogr: impl Into<PathBuf>) -> Self {
    Self { ogrinfo: ogrinfo.into(), ogr2ogr: ogr2ogr.into() }
  }

  async fn run(&self, program: &Path, args: Vec<OsString>) -> Result<Vec<u8>> {
    let name = program.display().to_string();
    tracing::debug!(program = %name, ?args, "running");

    let output = Command::new(program)
      .args(&args)
      .kill_on_drop(true)
      .output()
      .await
      .map_err(|source| Error::Spawn { program: name.clone(), source })?;

    if !output.status.success() {
      return Err(Error::Failed {
        program: name,
        status:  output.status.to_string(),
        stderr:  String::from_utf8_lossy(&output.stderr).trim().to_owned(),
      });
    }
    Ok(output.stdout)
  }
}

impl GeometryEngine for OgrEngine {
  type Error = Error;

  async fn open(&self, path: &Path) -> Result<DatasetInfo> {
    let stdout = self.run(&self.ogrinfo, open_args(path)).await?;
    parse_summary(&stdout)
  }

  async fn convert(&self, source: &Path, dest: &Path, crs: &Crs) -> Result<()> {
    let has_projection = tokio::fs::try_exists(source.with_extension("prj"))
      .await
      .unwrap_or(false);
    let args = convert_args(source, dest, crs, has_projection);
    self.run(&self.ogr2ogr, args).await?;
    Ok(())
  }
}

/// Arguments for `ogrinfo`.
fn open_args(path: &Path) -> Vec<OsString> {
  config_args()
    .chain(["-json", "-so", "-al"].map(OsString::from))
    .chain([path.as_os_str().to_owned()])
    .collect()
}

/// Arguments for `ogr2ogr`. Data without a projection file is assumed to
/// already be in `crs`.
fn convert_args(
  source: &Path,
  dest: &Path,
  crs: &Crs,
  has_projection: bool,
) -> Vec<OsString> {
  let mut args: Vec<OsString> = config_args().collect();
  args.extend(["-f", "GeoJSON", "-t_srs", crs.as_str()].map(OsString::from));
  if !has_projection {
    args.push("-s_srs".into());
    args.push(crs.as_str().into());
  }
  args.push(dest.as_os_str().to_owned());
  args.push(source.as_os_str().to_owned());
  args
}

// ─── ogrinfo -json ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct Summary {
  #[serde(default)]
  layers: Vec<LayerSummary>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayerSummary {
  #[serde(default)]
  feature_count:   Option<u64>,
  #[serde(default)]
  geometry_fields: Vec<GeometryField>,
}

#[derive(Deserialize)]
struct GeometryField {
  #[serde(rename = "type")]
  kind:   String,
  #[serde(default)]
  extent: Option<[f64; 4]>,
}

/// Read the first layer of an `ogrinfo -json` document.
///
/// Layers without a geometry column report [`GeometryType::NoGeometry`];
/// a missing extent (empty layer) is all zeros.
pub fn parse_summary(json: &[u8]) -> Result<DatasetInfo> {
  let summary: Summary = serde_json::from_slice(json)?;
  let layer = summary.layers.into_iter().next().ok_or(Error::NoLayer)?;

  let (geometry_type, extent) = match layer.geometry_fields.into_iter().next() {
    Some(field) => {
      let Ok(kind) = field.kind.parse::<GeometryType>();
      (kind, field.extent.unwrap_or_default())
    }
    None => (GeometryType::NoGeometry, [0.0; 4]),
  };

  Ok(DatasetInfo {
    geometry_type,
    feature_count: layer.feature_count.unwrap_or(0),
    extent: Extent::from(extent),
  })
}
