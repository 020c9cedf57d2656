//! Uploaded datasets and the summary the geometry engine reports for them.

use std::{collections::BTreeMap, fmt, str::FromStr};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// File extension of the mandatory primary file.
pub const PRIMARY_EXTENSION: &str = "shp";

// ─── Sidecars ────────────────────────────────────────────────────────────────

/// The optional files that may accompany a primary file.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum SidecarRole {
  /// Geometry index (`.shx`).
  Index,
  /// Attribute table (`.dbf`).
  Attributes,
  /// Projection definition (`.prj`).
  Projection,
  /// Encoding hint (`.cpg`).
  Encoding,
  /// Alternate projection (`.qpj`).
  AltProjection,
}

impl SidecarRole {
  pub const ALL: [SidecarRole; 5] = [
    Self::Index,
    Self::Attributes,
    Self::Projection,
    Self::Encoding,
    Self::AltProjection,
  ];

  /// File extension used when the sidecar is written next to the primary.
  pub fn extension(self) -> &'static str {
    match self {
      Self::Index => "shx",
      Self::Attributes => "dbf",
      Self::Projection => "prj",
      Self::Encoding => "cpg",
      Self::AltProjection => "qpj",
    }
  }

  /// Suffix of the request field carrying this sidecar
  /// (`datasets[N].<field>`).
  pub fn field_name(self) -> &'static str {
    match self {
      Self::Index => "indexSidecar",
      Self::Attributes => "attributeSidecar",
      Self::Projection => "projectionSidecar",
      Self::Encoding => "encodingSidecar",
      Self::AltProjection => "altProjectionSidecar",
    }
  }

  pub fn from_field_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|r| r.field_name() == name)
  }

  pub fn from_extension(ext: &str) -> Option<Self> {
    Self::ALL
      .into_iter()
      .find(|r| r.extension().eq_ignore_ascii_case(ext))
  }
}

// ─── Asset group ─────────────────────────────────────────────────────────────

/// One uploaded file, held in memory for the duration of a request.
#[derive(Debug, Clone)]
pub struct StagedFile {
  /// Client-side file name, informational only; never used as a path.
  pub file_name: Option<String>,
  pub content:   Bytes,
}

impl StagedFile {
  pub fn new(content: impl Into<Bytes>) -> Self {
    Self { file_name: None, content: content.into() }
  }
}

/// One logical dataset: a mandatory primary file plus optional sidecars.
///
/// Holding a `StagedFile` in `primary` is what makes a group valid; groups
/// without one are never constructed.
#[derive(Debug, Clone)]
pub struct AssetGroup {
  /// Position in the request, starting at 0.
  pub index:    usize,
  /// Display name; defaults to [`AssetGroup::default_name`].
  pub name:     String,
  pub primary:  StagedFile,
  pub sidecars: BTreeMap<SidecarRole, StagedFile>,
}

impl AssetGroup {
  pub fn new(index: usize, name: Option<String>, primary: StagedFile) -> Self {
    let name = name
      .map(|n| n.trim().to_owned())
      .filter(|n| !n.is_empty())
      .unwrap_or_else(|| Self::default_name(index));
    Self { index, name, primary, sidecars: BTreeMap::new() }
  }

  /// Placeholder name for a group submitted without one.
  pub fn default_name(index: usize) -> String { format!("layer_{index}") }

  pub fn with_sidecar(mut self, role: SidecarRole, file: StagedFile) -> Self {
    self.sidecars.insert(role, file);
    self
  }

  pub fn sidecar(&self, role: SidecarRole) -> Option<&StagedFile> {
    self.sidecars.get(&role)
  }
}

// ─── Geometry summary ────────────────────────────────────────────────────────

/// The geometry type of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryType {
  Point,
  LineString,
  Polygon,
  MultiPoint,
  MultiLineString,
  MultiPolygon,
  NoGeometry,
  Unknown,
}

impl GeometryType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Point => "Point",
      Self::LineString => "LineString",
      Self::Polygon => "Polygon",
      Self::MultiPoint => "MultiPoint",
      Self::MultiLineString => "MultiLineString",
      Self::MultiPolygon => "MultiPolygon",
      Self::NoGeometry => "NoGeometry",
      Self::Unknown => "Unknown",
    }
  }
}

impl fmt::Display for GeometryType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for GeometryType {
  type Err = std::convert::Infallible;

  /// Lenient parse of engine-reported names: accepts `"Multi Polygon"`,
  /// `"3D Point"`, `"LineString Z"`, `"Polygon25D"` and so on. Anything
  /// unrecognised is [`GeometryType::Unknown`].
  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    let compact: String = s
      .chars()
      .filter(|c| !c.is_whitespace())
      .collect::<String>()
      .to_ascii_lowercase();
    let compact = compact.strip_prefix("3d").unwrap_or(&compact);
    let base = ["25d", "zm", "z", "m"]
      .iter()
      .find_map(|suffix| compact.strip_suffix(suffix))
      .unwrap_or(compact);

    Ok(match base {
      "point" => Self::Point,
      "linestring" => Self::LineString,
      "polygon" => Self::Polygon,
      "multipoint" => Self::MultiPoint,
      "multilinestring" => Self::MultiLineString,
      "multipolygon" => Self::MultiPolygon,
      "none" | "nogeometry" => Self::NoGeometry,
      _ => Self::Unknown,
    })
  }
}

/// A bounding box. Serialised as `[xmin, ymin, xmax, ymax]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Extent {
  pub xmin: f64,
  pub ymin: f64,
  pub xmax: f64,
  pub ymax: f64,
}

impl From<[f64; 4]> for Extent {
  fn from([xmin, ymin, xmax, ymax]: [f64; 4]) -> Self {
    Self { xmin, ymin, xmax, ymax }
  }
}

impl From<Extent> for [f64; 4] {
  fn from(e: Extent) -> Self { [e.xmin, e.ymin, e.xmax, e.ymax] }
}

/// What the geometry engine reports about a validated dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
  pub geometry_type: GeometryType,
  pub feature_count: u64,
  pub extent:        Extent,
}

// ─── CRS ─────────────────────────────────────────────────────────────────────

/// A coordinate reference system identifier of the form `AUTHORITY:CODE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs(String);

impl Crs {
  /// The CRS every import is written in unless configured otherwise.
  pub const DEFAULT: &'static str = "EPSG:3857";

  pub fn as_str(&self) -> &str { &self.0 }

  /// The numeric code when the authority is EPSG.
  pub fn epsg(&self) -> Option<u32> {
    self.0.strip_prefix("EPSG:").and_then(|c| c.parse().ok())
  }
}

impl Default for Crs {
  fn default() -> Self { Self(Self::DEFAULT.to_owned()) }
}

impl fmt::Display for Crs {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl FromStr for Crs {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let (authority, code) = s
      .trim()
      .split_once(':')
      .ok_or_else(|| Error::InvalidCrs(s.to_owned()))?;
    let authority_ok =
      !authority.is_empty() && authority.bytes().all(|b| b.is_ascii_alphabetic());
    let code_ok = !code.is_empty() && code.bytes().all(|b| b.is_ascii_alphanumeric());
    if !authority_ok || !code_ok {
      return Err(Error::InvalidCrs(s.to_owned()));
    }
    Ok(Self(format!("{}:{code}", authority.to_ascii_uppercase())))
  }
}

impl TryFrom<String> for Crs {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { s.parse() }
}

impl From<Crs> for String {
  fn from(c: Crs) -> Self { c.0 }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn geometry_type_parses_engine_spellings() {
    let cases = [
      ("Polygon", GeometryType::Polygon),
      ("Multi Polygon", GeometryType::MultiPolygon),
      ("3D Point", GeometryType::Point),
      ("LineString Z", GeometryType::LineString),
      ("Line String", GeometryType::LineString),
      ("MultiLineString25D", GeometryType::MultiLineString),
      ("Point M", GeometryType::Point),
      ("None", GeometryType::NoGeometry),
      ("Unknown (any)", GeometryType::Unknown),
    ];
    for (raw, expected) in cases {
      assert_eq!(raw.parse::<GeometryType>().unwrap(), expected, "{raw}");
    }
  }

  #[test]
  fn extent_serialises_as_array() {
    let e = Extent::from([0.0, 0.0, 100.0, 100.0]);
    assert_eq!(serde_json::to_string(&e).unwrap(), "[0.0,0.0,100.0,100.0]");
    let back: Extent = serde_json::from_str("[1,2,3,4]").unwrap();
    assert_eq!(back.xmax, 3.0);
  }

  #[test]
  fn crs_parsing() {
    let crs: Crs = "epsg:2180".parse().unwrap();
    assert_eq!(crs.as_str(), "EPSG:2180");
    assert_eq!(crs.epsg(), Some(2180));
    assert_eq!(Crs::default().epsg(), Some(3857));
    assert!("2180".parse::<Crs>().is_err());
    assert!("EPSG:".parse::<Crs>().is_err());
    assert!("EPSG:21 80".parse::<Crs>().is_err());
  }

  #[test]
  fn group_name_defaults_to_index() {
    let g = AssetGroup::new(3, Some("  ".into()), StagedFile::new(&b"x"[..]));
    assert_eq!(g.name, "layer_3");
    let g = AssetGroup::new(0, Some(" Parks ".into()), StagedFile::new(&b"x"[..]));
    assert_eq!(g.name, "Parks");
  }

  #[test]
  fn sidecar_lookups() {
    assert_eq!(SidecarRole::from_field_name("projectionSidecar"), Some(SidecarRole::Projection));
    assert_eq!(SidecarRole::from_extension("DBF"), Some(SidecarRole::Attributes));
    assert_eq!(SidecarRole::from_extension("shp"), None);
  }
}
