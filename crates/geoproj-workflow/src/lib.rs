//! The project import workflow.
//!
//! [`ProjectWorkflow::create_project`] validates the request, provisions a
//! project, imports every [`AssetGroup`](geoproj_core::dataset::AssetGroup)
//! through the [`pipeline`], writes the [`document`] artifacts and commits.
//! A failure at any step rolls back everything the run created.

pub mod document;
pub mod error;
pub mod pipeline;
pub mod state;
mod transaction;
mod workflow;

#[cfg(test)]
mod fake;

pub use error::{AssemblyError, ErrorCategory, ImportError, WorkflowError};
pub use pipeline::ImportedLayer;
pub use state::WorkflowState;
pub use workflow::{
  CreatedProject, DEFAULT_MAX_NAME_ATTEMPTS, ProjectWorkflow, WorkflowSettings,
};
