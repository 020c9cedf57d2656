//! A scripted [`GeometryEngine`] for tests.
//!
//! The primary file's content is the script: `features=<n>;type=<geometry>;
//! extent=<xmin>,<ymin>,<xmax>,<ymax>` describes a valid dataset (every key
//! optional), `invalid` fails `open` and `unconvertible` fails `convert`.

use std::path::Path;

use geoproj_core::{
  dataset::{Crs, DatasetInfo, Extent, GeometryType},
  engine::GeometryEngine,
};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct FakeError(String);

#[derive(Debug, Default, Clone)]
pub struct FakeEngine;

impl FakeEngine {
  /// A primary file the engine accepts.
  pub fn dataset(features: u64, extent: [f64; 4]) -> Vec<u8> {
    let [a, b, c, d] = extent;
    format!("features={features};type=Polygon;extent={a},{b},{c},{d}").into_bytes()
  }
}

fn parse(script: &str) -> Result<DatasetInfo, FakeError> {
  let mut info = DatasetInfo {
    geometry_type: GeometryType::Point,
    feature_count: 1,
    extent:        Extent::from([0.0; 4]),
  };
  for part in script.trim().split(';').filter(|p| !p.is_empty()) {
    let (key, value) = part
      .split_once('=')
      .ok_or_else(|| FakeError(format!("not a dataset: {script}")))?;
    match key {
      "features" => {
        info.feature_count = value.parse().map_err(|_| FakeError(part.into()))?;
      }
      "type" => {
        let Ok(kind) = value.parse::<GeometryType>();
        info.geometry_type = kind;
      }
      "extent" => {
        let nums: Vec<f64> = value
          .split(',')
          .map(str::parse)
          .collect::<Result<_, _>>()
          .map_err(|_| FakeError(part.into()))?;
        let arr: [f64; 4] = nums.try_into().map_err(|_| FakeError(part.into()))?;
        info.extent = Extent::from(arr);
      }
      _ => return Err(FakeError(format!("unknown key {key}"))),
    }
  }
  Ok(info)
}

impl GeometryEngine for FakeEngine {
  type Error = FakeError;

  async fn open(&self, path: &Path) -> Result<DatasetInfo, FakeError> {
    let script = tokio::fs::read_to_string(path)
      .await
      .map_err(|e| FakeError(e.to_string()))?;
    match script.trim() {
      "invalid" => Err(FakeError("not a shapefile".into())),
      "unconvertible" => Ok(parse("")?),
      s => parse(s),
    }
  }

  async fn convert(&self, source: &Path, dest: &Path, _: &Crs) -> Result<(), FakeError> {
    let script = tokio::fs::read_to_string(source)
      .await
      .map_err(|e| FakeError(e.to_string()))?;
    if script.trim() == "unconvertible" {
      return Err(FakeError("conversion failed".into()));
    }
    let info = parse(&script)?;

    let features: Vec<_> = (0..info.feature_count)
      .map(|i| {
        serde_json::json!({
          "type": "Feature",
          "geometry": { "type": "Point", "coordinates": [i, i] },
          "properties": { "n": i },
        })
      })
      .collect();
    let collection = serde_json::json!({ "type": "FeatureCollection", "features": features });
    tokio::fs::write(dest, collection.to_string())
      .await
      .map_err(|e| FakeError(e.to_string()))
  }
}
