//! Programmer-error signals shared by the tree and the engine.
//!
//! An [`InvariantViolation`] always indicates a bug in a resolver, visitor or embedder. Callers propagate it with
//! `?` up to the engine boundary; it is never converted into a test outcome and never retried.

use miette::Diagnostic;
use thiserror::Error;

use crate::tree::NodeId;
use crate::unique_id::UniqueId;

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum InvariantViolation {
    #[error("cannot remove the root of a hierarchy ({0})")]
    #[diagnostic(code(trellis::invariant::root_removal))]
    RootRemoval(UniqueId),

    #[error("node {0:?} is not part of the tree")]
    #[diagnostic(code(trellis::invariant::unknown_node))]
    UnknownNode(NodeId),

    #[error("resolver registry used before initialize()")]
    #[diagnostic(code(trellis::invariant::registry_not_initialized))]
    RegistryNotInitialized,

    #[error("resolver registry initialized twice")]
    #[diagnostic(code(trellis::invariant::registry_initialized_twice))]
    RegistryInitializedTwice,
}
