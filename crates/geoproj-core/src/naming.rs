//! Derivation of project and table names.
//!
//! Both functions are pure: the same input always yields the same name.
//! Uniqueness is enforced by the store (projects) and the import pipeline
//! (tables), not here.

use crate::{Error, Result};

/// Upper bound on the length of a project slug, before any `_N` suffix.
pub const MAX_SLUG_LEN: usize = 40;

/// Table names starting with this are reserved by SQLite.
const RESERVED_PREFIX: &str = "sqlite";

/// Derive the base project name from a display name.
///
/// ASCII letters and digits are kept (lowercased); every other run of
/// characters becomes a single `_`. Slugs starting with a digit or with
/// `sqlite` get a `p_` prefix, since the slug also starts every table name.
pub fn project_slug(display_name: &str) -> String {
  let mut slug = String::with_capacity(display_name.len());
  for c in display_name.chars() {
    if c.is_ascii_alphanumeric() {
      slug.push(c.to_ascii_lowercase());
    } else if !slug.ends_with('_') {
      slug.push('_');
    }
  }

  let mut slug = slug.trim_matches('_').to_owned();
  if slug.is_empty() {
    slug.push_str("project");
  }
  if slug.starts_with(|c: char| c.is_ascii_digit()) || slug.starts_with(RESERVED_PREFIX) {
    slug.insert_str(0, "p_");
  }
  slug.truncate(MAX_SLUG_LEN);
  slug.trim_end_matches('_').to_owned()
}

/// The `attempt`-th candidate for `base`: `base`, `base_1`, `base_2`, ...
pub fn candidate_name(base: &str, attempt: u32) -> String {
  match attempt {
    0 => base.to_owned(),
    n => format!("{base}_{n}"),
  }
}

/// Fold spaces and hyphens of a layer display name to `_`.
pub fn normalize_layer_name(display_name: &str) -> String {
  display_name
    .trim()
    .chars()
    .map(|c| if c == ' ' || c == '-' { '_' } else { c })
    .collect()
}

/// The spatial table name for a layer of `project`.
pub fn table_name(project_name: &str, display_name: &str) -> Result<String> {
  let normalized = normalize_layer_name(display_name);
  if normalized.is_empty() {
    return Err(Error::InvalidLayerName(display_name.to_owned()));
  }
  Ok(format!("{project_name}_{normalized}").replace('-', "_"))
}
