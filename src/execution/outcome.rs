//! How a single invocation can end.

use miette::Diagnostic;
use thiserror::Error;

use crate::extension::ParameterResolutionError;
use crate::marker::MarkerError;

/// Failure raised by a test body or hook.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum TestFailure {
    /// The invocation ran and its expectations did not hold. Reported as `Failed`.
    #[error("{0}")]
    #[diagnostic(code(trellis::test::assertion))]
    Assertion(String),

    /// The invocation gave up because a precondition did not hold. Reported as `Aborted`.
    #[error("{0}")]
    #[diagnostic(code(trellis::test::aborted))]
    Aborted(String),
}

impl TestFailure {
    pub fn is_aborted(&self) -> bool {
        matches!(self, TestFailure::Aborted(_))
    }
}

/// Everything that can go wrong while invoking one executable (a test body or a hook).
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum InvocationError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolution(#[from] ParameterResolutionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Failure(#[from] TestFailure),

    #[error("{executable} panicked: {message}")]
    #[diagnostic(code(trellis::test::panicked))]
    Panicked { executable: String, message: String },

    #[error("{executable} has no executable body")]
    #[diagnostic(code(trellis::test::missing_body))]
    MissingBody { executable: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Marker(#[from] MarkerError),
}

impl InvocationError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, InvocationError::Failure(failure) if failure.is_aborted())
    }

    /// Build a [`InvocationError::Panicked`] from a caught panic payload.
    pub(crate) fn from_panic(executable: &str, payload: &(dyn std::any::Any + Send)) -> Self {
        InvocationError::Panicked {
            executable: executable.to_string(),
            message: panic_message(payload),
        }
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
