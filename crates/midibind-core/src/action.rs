//! Interface to the application's command executor.

use thiserror::Error;

/// Failure reported by an [`ActionInvoker`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ActionError(pub String);

impl ActionError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl From<String> for ActionError {
    fn from(reason: String) -> Self {
        Self(reason)
    }
}

impl From<&str> for ActionError {
    fn from(reason: &str) -> Self {
        Self(reason.to_string())
    }
}

/// Executes application commands by id.
///
/// Called synchronously from the dispatch thread, one action at a time, in
/// device order. Failures are reported, never retried.
pub trait ActionInvoker: Send + Sync {
    fn invoke(&self, action_id: &str) -> Result<(), ActionError>;
}

impl<F> ActionInvoker for F
where
    F: Fn(&str) -> Result<(), ActionError> + Send + Sync,
{
    fn invoke(&self, action_id: &str) -> Result<(), ActionError> {
        self(action_id)
    }
}
