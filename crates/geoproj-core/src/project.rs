//! Project metadata: the raw request form, its validated form, and the
//! persisted project record.

use std::{collections::BTreeMap, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category assigned when the request does not name one.
pub const DEFAULT_CATEGORY: &str = "Other";

const MAX_DISPLAY_NAME_LEN: usize = 100;
const MAX_DOMAIN_LEN: usize = 63;
const MAX_DESCRIPTION_LEN: usize = 1000;
const MAX_KEYWORDS_LEN: usize = 500;
const MAX_CATEGORY_LEN: usize = 50;

/// Per-field validation messages, keyed by the request field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

// ─── Form ────────────────────────────────────────────────────────────────────

/// Project metadata exactly as submitted. Field names follow the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectForm {
  pub project:             Option<String>,
  pub domain:              Option<String>,
  #[serde(rename = "projectDescription")]
  pub project_description: Option<String>,
  /// Comma-separated keyword list.
  pub keywords:            Option<String>,
  pub categories:          Option<String>,
}

impl ProjectForm {
  /// Check every field and return the validated metadata, or all field
  /// errors at once.
  pub fn validate(&self) -> Result<ProjectMeta, FieldErrors> {
    let mut errors = FieldErrors::new();

    let display_name = required(&mut errors, "project", self.project.as_deref());
    if let Some(name) = &display_name
      && name.chars().count() > MAX_DISPLAY_NAME_LEN
    {
      push(
        &mut errors,
        "project",
        format!("Ensure this field has no more than {MAX_DISPLAY_NAME_LEN} characters."),
      );
    }

    let domain = required(&mut errors, "domain", self.domain.as_deref());
    if let Some(domain) = &domain
      && let Err(msg) = check_domain(domain)
    {
      push(&mut errors, "domain", msg);
    }

    let description = self
      .project_description
      .as_deref()
      .map(str::trim)
      .unwrap_or_default()
      .to_owned();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
      push(
        &mut errors,
        "projectDescription",
        format!("Ensure this field has no more than {MAX_DESCRIPTION_LEN} characters."),
      );
    }

    let raw_keywords = self.keywords.as_deref().unwrap_or_default();
    if raw_keywords.chars().count() > MAX_KEYWORDS_LEN {
      push(
        &mut errors,
        "keywords",
        format!("Ensure this field has no more than {MAX_KEYWORDS_LEN} characters."),
      );
    }
    let keywords = raw_keywords
      .split(',')
      .map(str::trim)
      .filter(|k| !k.is_empty())
      .map(str::to_owned)
      .collect();

    let category = match self.categories.as_deref().map(str::trim) {
      Some(c) if !c.is_empty() => c.to_owned(),
      _ => DEFAULT_CATEGORY.to_owned(),
    };
    if category.chars().count() > MAX_CATEGORY_LEN {
      push(
        &mut errors,
        "categories",
        format!("Ensure this field has no more than {MAX_CATEGORY_LEN} characters."),
      );
    }

    match (display_name, domain) {
      (Some(display_name), Some(domain)) if errors.is_empty() => Ok(ProjectMeta {
        display_name,
        domain,
        description,
        keywords,
        category,
      }),
      _ => Err(errors),
    }
  }
}

fn required(errors: &mut FieldErrors, field: &str, value: Option<&str>) -> Option<String> {
  match value.map(str::trim) {
    Some(v) if !v.is_empty() => Some(v.to_owned()),
    Some(_) => {
      push(errors, field, "This field may not be blank.".to_owned());
      None
    }
    None => {
      push(errors, field, "This field is required.".to_owned());
      None
    }
  }
}

fn push(errors: &mut FieldErrors, field: &str, msg: String) {
  errors.entry(field.to_owned()).or_default().push(msg);
}

/// A domain is a single DNS label: lowercase ASCII letters, digits and
/// inner hyphens.
fn check_domain(domain: &str) -> Result<(), String> {
  if domain.len() > MAX_DOMAIN_LEN {
    return Err(format!(
      "Ensure this field has no more than {MAX_DOMAIN_LEN} characters."
    ));
  }
  let valid_chars = domain
    .bytes()
    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
  if !valid_chars || domain.starts_with('-') || domain.ends_with('-') {
    return Err(
      "Use lowercase letters, digits and inner hyphens only.".to_owned(),
    );
  }
  Ok(())
}

// ─── Validated metadata ──────────────────────────────────────────────────────

/// Project metadata that passed [`ProjectForm::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMeta {
  /// User-supplied name; the canonical project name is derived from it.
  pub display_name: String,
  pub domain:       String,
  pub description:  String,
  pub keywords:     Vec<String>,
  pub category:     String,
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// Locations of the two durable artifacts written for a committed project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectArtifacts {
  pub qgs_path:  PathBuf,
  pub tree_path: PathBuf,
}

/// A provisioned project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecord {
  /// Canonical, globally unique identifier (slug plus optional `_N` suffix).
  pub project_name: String,
  pub display_name: String,
  /// Username of the owning user.
  pub owner:        String,
  pub domain:       String,
  pub description:  String,
  pub keywords:     Vec<String>,
  pub category:     String,
  pub created_at:   DateTime<Utc>,
  /// Set when the project is committed.
  pub artifacts:    Option<ProjectArtifacts>,
}
