//! Run states of [`ProjectWorkflow`](crate::ProjectWorkflow).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
  Validating,
  Provisioning,
  /// Importing dataset `index` (0-based) of `total`.
  Importing { index: usize, total: usize },
  Assembling,
  Committed,
  Aborted,
}

impl WorkflowState {
  pub fn is_terminal(self) -> bool { matches!(self, Self::Committed | Self::Aborted) }

  /// Whether `next` may directly follow `self`.
  pub fn can_advance_to(self, next: Self) -> bool {
    use WorkflowState::*;
    match (self, next) {
      (from, Aborted) => !from.is_terminal(),
      (Validating, Provisioning) => true,
      (Provisioning, Importing { index: 0, .. }) => true,
      (Importing { index: i, total }, Importing { index: j, total: t }) => {
        j == i + 1 && t == total && j < total
      }
      (Importing { index, total }, Assembling) => index + 1 == total,
      (Assembling, Committed) => true,
      _ => false,
    }
  }
}

impl fmt::Display for WorkflowState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Validating => f.write_str("validating"),
      Self::Provisioning => f.write_str("provisioning"),
      Self::Importing { index, total } => write!(f, "importing {} of {total}", index + 1),
      Self::Assembling => f.write_str("assembling"),
      Self::Committed => f.write_str("committed"),
      Self::Aborted => f.write_str("aborted"),
    }
  }
}

/// The current state of one run, logging every transition.
#[derive(Debug)]
pub(crate) struct Progress {
  state:   WorkflowState,
  project: Option<String>,
}

impl Progress {
  pub(crate) fn new() -> Self {
    Self { state: WorkflowState::Validating, project: None }
  }

  pub(crate) fn state(&self) -> WorkflowState { self.state }

  pub(crate) fn set_project(&mut self, project: &str) {
    self.project = Some(project.to_owned());
  }

  pub(crate) fn advance(&mut self, next: WorkflowState) {
    debug_assert!(
      self.state.can_advance_to(next),
      "illegal transition {} -> {next}",
      self.state
    );
    tracing::debug!(
      project = self.project.as_deref().unwrap_or("-"),
      from = %self.state,
      to = %next,
      "workflow transition"
    );
    self.state = next;
  }
}

#[cfg(test)]
mod tests {
  use super::WorkflowState::*;

  #[test]
  fn happy_path_is_linear() {
    let path = [
      Validating,
      Provisioning,
      Importing { index: 0, total: 2 },
      Importing { index: 1, total: 2 },
      Assembling,
      Committed,
    ];
    for pair in path.windows(2) {
      assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
    }
  }

  #[test]
  fn abort_only_from_live_states() {
    assert!(Validating.can_advance_to(Aborted));
    assert!(Importing { index: 1, total: 3 }.can_advance_to(Aborted));
    assert!(!Committed.can_advance_to(Aborted));
    assert!(!Aborted.can_advance_to(Aborted));
  }

  #[test]
  fn no_skipping() {
    assert!(!Validating.can_advance_to(Assembling));
    assert!(!Importing { index: 0, total: 3 }.can_advance_to(Assembling));
    assert!(!Importing { index: 0, total: 3 }.can_advance_to(Importing { index: 2, total: 3 }));
    assert!(!Provisioning.can_advance_to(Committed));
  }
}
