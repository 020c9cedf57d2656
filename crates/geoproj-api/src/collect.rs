//! Collecting project metadata and asset groups from a multipart body.
//!
//! Dataset files arrive in indexed fields:
//!
//! | field | content |
//! |-------|---------|
//! | `datasets[N].primary` | the `.shp` file (required) |
//! | `datasets[N].indexSidecar`, `attributeSidecar`, `projectionSidecar`, `encodingSidecar`, `altProjectionSidecar` | optional sidecars |
//! | `datasets[N].name` | display name (text) |
//!
//! Older clients send `shapefiles[N].<ext>` (`shp`, `shx`, `dbf`, `prj`,
//! `cpg`, `qpj`) and `shapefiles[N].name` instead; both forms are accepted.

use std::collections::{BTreeMap, HashMap};

use axum::extract::Multipart;
use geoproj_core::{
  dataset::{AssetGroup, PRIMARY_EXTENSION, SidecarRole, StagedFile},
  project::ProjectForm,
};

use crate::error::ApiError;

/// Everything a create request carries.
#[derive(Debug, Default)]
pub struct CreateRequest {
  pub form:   ProjectForm,
  pub groups: Vec<AssetGroup>,
}

/// What an indexed dataset field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetField {
  Primary,
  Sidecar(SidecarRole),
  Name,
}

/// Parse `datasets[N].<field>` or `shapefiles[N].<ext>`.
pub fn parse_dataset_key(key: &str) -> Option<(usize, DatasetField)> {
  let (legacy, rest) = if let Some(rest) = key.strip_prefix("datasets[") {
    (false, rest)
  } else {
    (true, key.strip_prefix("shapefiles[")?)
  };
  let (index, field) = rest.split_once("].")?;
  let index = index.parse().ok()?;

  let field = match field {
    "name" => DatasetField::Name,
    "primary" if !legacy => DatasetField::Primary,
    ext if legacy && ext.eq_ignore_ascii_case(PRIMARY_EXTENSION) => DatasetField::Primary,
    ext if legacy => DatasetField::Sidecar(SidecarRole::from_extension(ext)?),
    other => DatasetField::Sidecar(SidecarRole::from_field_name(other)?),
  };
  Some((index, field))
}

/// Files and name collected for one index.
#[derive(Debug, Default)]
pub struct Slot {
  pub name:     Option<String>,
  pub primary:  Option<StagedFile>,
  pub sidecars: BTreeMap<SidecarRole, StagedFile>,
}

/// Accumulates multipart fields in arrival order.
#[derive(Debug, Default)]
pub struct Collector {
  text:  HashMap<String, String>,
  slots: BTreeMap<usize, Slot>,
}

impl Collector {
  pub fn add_text(&mut self, key: &str, value: String) {
    match parse_dataset_key(key) {
      Some((index, DatasetField::Name)) => {
        self.slots.entry(index).or_default().name = Some(value);
      }
      Some(_) => {}
      None => {
        self.text.insert(key.to_owned(), value);
      }
    }
  }

  /// Record a file field. Empty parts (a file input left blank) are ignored.
  pub fn add_file(&mut self, key: &str, file: StagedFile) {
    if file.content.is_empty() {
      return;
    }
    let Some((index, field)) = parse_dataset_key(key) else {
      return;
    };
    let slot = self.slots.entry(index).or_default();
    match field {
      DatasetField::Primary => slot.primary = Some(file),
      DatasetField::Sidecar(role) => {
        slot.sidecars.insert(role, file);
      }
      DatasetField::Name => {}
    }
  }

  pub fn form(&self) -> ProjectForm {
    let get = |k: &str| self.text.get(k).cloned();
    ProjectForm {
      project:             get("project"),
      domain:              get("domain"),
      project_description: get("projectDescription"),
      keywords:            get("keywords"),
      categories:          get("categories"),
    }
  }

  /// Groups for indices 0, 1, 2, ... up to the first index without a
  /// primary file. Later indices are ignored.
  pub fn collect_groups(&mut self) -> Vec<AssetGroup> {
    let mut groups = Vec::new();
    for index in 0.. {
      let Some(Slot { name, primary: Some(primary), sidecars }) = self.slots.remove(&index)
      else {
        break;
      };
      let group = sidecars
        .into_iter()
        .fold(AssetGroup::new(index, name, primary), |g, (role, file)| {
          g.with_sidecar(role, file)
        });
      groups.push(group);
    }
    groups
  }

  pub fn finish(mut self) -> CreateRequest {
    let groups = self.collect_groups();
    CreateRequest { form: self.form(), groups }
  }
}

/// Drain a multipart body into a [`CreateRequest`].
pub async fn read_multipart(mut multipart: Multipart) -> Result<CreateRequest, ApiError> {
  let mut collector = Collector::default();

  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
  {
    let Some(key) = field.name().map(str::to_owned) else {
      continue;
    };
    let file_name = field.file_name().map(str::to_owned);
    let content = field
      .bytes()
      .await
      .map_err(|e| ApiError::BadRequest(format!("could not read field {key:?}: {e}")))?;

    match file_name {
      Some(file_name) => {
        let file = StagedFile { file_name: Some(file_name), content };
        collector.add_file(&key, file);
      }
      None => {
        let text = String::from_utf8(content.to_vec())
          .map_err(|_| ApiError::BadRequest(format!("field {key:?} is not UTF-8 text")))?;
        collector.add_text(&key, text);
      }
    }
  }

  let request = collector.finish();
  tracing::debug!(groups = request.groups.len(), "collected upload");
  Ok(request)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn file(bytes: &'static [u8]) -> StagedFile { StagedFile::new(bytes) }

  #[test]
  fn dataset_keys() {
    use DatasetField::*;
    assert_eq!(parse_dataset_key("datasets[0].primary"), Some((0, Primary)));
    assert_eq!(
      parse_dataset_key("datasets[12].projectionSidecar"),
      Some((12, Sidecar(SidecarRole::Projection)))
    );
    assert_eq!(parse_dataset_key("datasets[3].name"), Some((3, Name)));
    assert_eq!(parse_dataset_key("shapefiles[1].shp"), Some((1, Primary)));
    assert_eq!(
      parse_dataset_key("shapefiles[1].dbf"),
      Some((1, Sidecar(SidecarRole::Attributes)))
    );

    assert_eq!(parse_dataset_key("datasets[0].shp"), None);
    assert_eq!(parse_dataset_key("shapefiles[0].primary"), None);
    assert_eq!(parse_dataset_key("datasets[x].primary"), None);
    assert_eq!(parse_dataset_key("datasets[-1].primary"), None);
    assert_eq!(parse_dataset_key("project"), None);
  }

  #[test]
  fn groups_stop_at_first_gap() {
    let mut c = Collector::default();
    c.add_file("datasets[0].primary", file(b"a"));
    c.add_text("datasets[0].name", "Trees".into());
    c.add_file("datasets[0].attributeSidecar", file(b"dbf"));
    c.add_file("datasets[1].primary", file(b"b"));
    c.add_file("datasets[2].indexSidecar", file(b"shx"));
    c.add_file("datasets[3].primary", file(b"d"));

    let groups = c.collect_groups();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].name, "Trees");
    assert!(groups[0].sidecar(SidecarRole::Attributes).is_some());
    assert_eq!(groups[1].name, "layer_1");
    assert!(groups[1].sidecars.is_empty());
  }

  #[test]
  fn no_primary_at_zero_is_empty() {
    let mut c = Collector::default();
    c.add_file("datasets[1].primary", file(b"b"));
    c.add_file("datasets[0].primary", StagedFile::new(&b""[..]));
    assert!(c.collect_groups().is_empty());
  }

  #[test]
  fn form_fields_are_kept_by_name() {
    let mut c = Collector::default();
    c.add_text("project", "Parkplan".into());
    c.add_text("projectDescription", "Parks".into());
    c.add_text("keywords", "a, b".into());
    c.add_text("shapefiles[0].name", "Trees".into());
    c.add_file("shapefiles[0].shp", file(b"a"));

    let request = c.finish();
    assert_eq!(request.form.project.as_deref(), Some("Parkplan"));
    assert_eq!(request.form.project_description.as_deref(), Some("Parks"));
    assert_eq!(request.form.domain, None);
    assert_eq!(request.groups[0].name, "Trees");
  }
}
