//! The response envelope and the API error type.
//!
//! Every body this API returns, success or failure, is an [`Envelope`]:
//!
//! ```json
//! { "success": false, "message": "...", "errors": { "category": "import" } }
//! ```

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use geoproj_workflow::{ErrorCategory, WorkflowError};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

// ─── Envelope ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
  pub success: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub data:    Option<T>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub errors:  Option<Value>,
}

/// A successful response: `status` with `data` wrapped in an envelope.
pub fn success<T: Serialize>(
  status: StatusCode,
  message: impl Into<String>,
  data: T,
) -> Response {
  let body = Envelope {
    success: true,
    message: message.into(),
    data:    Some(data),
    errors:  None,
  };
  (status, Json(body)).into_response()
}

fn failure(status: StatusCode, message: String, errors: Value) -> Response {
  let body = Envelope::<()> {
    success: false,
    message,
    data: None,
    errors: Some(errors),
  };
  (status, Json(body)).into_response()
}

// ─── ApiError ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("authentication required")]
  Unauthorized,

  #[error("missing project name")]
  MissingProject,

  #[error("project {0:?} not found")]
  ProjectNotFound(String),

  #[error("you do not own project {0:?}")]
  NotOwner(String),

  #[error("error checking permissions")]
  PermissionCheck(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("{0}")]
  BadRequest(String),

  #[error(transparent)]
  Workflow(#[from] WorkflowError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("could not read project artifact: {0}")]
  Artifact(String),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      Self::Unauthorized => StatusCode::UNAUTHORIZED,
      Self::MissingProject | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::ProjectNotFound(_) => StatusCode::NOT_FOUND,
      Self::NotOwner(_) => StatusCode::FORBIDDEN,
      Self::Workflow(e) if e.category() == ErrorCategory::Validation => {
        StatusCode::BAD_REQUEST
      }
      Self::PermissionCheck(_) | Self::Workflow(_) | Self::Store(_) | Self::Artifact(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }

  pub fn category(&self) -> ErrorCategory {
    match self {
      Self::Workflow(e) => e.category(),
      Self::MissingProject | Self::BadRequest(_) => ErrorCategory::Validation,
      _ => ErrorCategory::Unknown,
    }
  }

  fn details(&self) -> Value {
    let mut errors = json!({ "category": self.category() });
    if let Self::Workflow(e) = self {
      if let Some(fields) = e.field_errors() {
        errors["fields"] = json!(fields);
      }
      if let Some((index, name)) = e.dataset() {
        errors["dataset"] = json!({ "index": index, "name": name });
      }
    }
    errors
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }

    let mut res = failure(status, self.to_string(), self.details());
    if matches!(self, Self::Unauthorized) {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"geoproj\""),
      );
    }
    res
  }
}
