//! Assertion helpers for test bodies and hooks.
//!
//! Bodies return `Result<(), TestFailure>`, so these helpers report instead of panicking and compose with `?`:
//!
//! ```
//! use trellis::testing::{ensure, ensure_eq};
//! use trellis::execution::TestFailure;
//!
//! fn body() -> Result<(), TestFailure> {
//!     ensure_eq(2 + 2, 4)?;
//!     ensure(true, "always holds")
//! }
//! assert!(body().is_ok());
//! ```

use std::fmt::Debug;

use crate::execution::TestFailure;

/// Fail with `message` unless `condition` holds.
pub fn ensure(condition: bool, message: impl Into<String>) -> Result<(), TestFailure> {
    if condition {
        Ok(())
    } else {
        Err(TestFailure::Assertion(message.into()))
    }
}

/// Fail unless `left == right`.
pub fn ensure_eq<T: PartialEq + Debug>(left: T, right: T) -> Result<(), TestFailure> {
    if left == right {
        Ok(())
    } else {
        Err(TestFailure::Assertion(format!(
            "assertion failed: left != right\n  left:  {left:?}\n  right: {right:?}"
        )))
    }
}

/// Fail unless `left != right`.
pub fn ensure_ne<T: PartialEq + Debug>(left: T, right: T) -> Result<(), TestFailure> {
    if left != right {
        Ok(())
    } else {
        Err(TestFailure::Assertion(format!(
            "assertion failed: left == right\n  left:  {left:?}\n  right: {right:?}"
        )))
    }
}

/// Explicitly fail with a message.
pub fn fail(message: impl Into<String>) -> Result<(), TestFailure> {
    Err(TestFailure::Assertion(message.into()))
}

/// Abort unless `assumption` holds; the test is reported as aborted, not failed.
pub fn assume(assumption: bool, message: impl Into<String>) -> Result<(), TestFailure> {
    if assumption {
        Ok(())
    } else {
        Err(TestFailure::Aborted(message.into()))
    }
}
