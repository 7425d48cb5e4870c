//! Discovery: from selectors to a descriptor tree.
//!
//! ## Pipeline
//!
//! 1. A [`DiscoveryRequest`] lists [`Selector`]s.
//! 2. The [`TestResolverRegistry`] hands each selector to the first registered resolver that supports it. The
//!    built-in resolvers are [`ContainerResolver`], [`MemberResolver`] and [`UniqueIdResolver`], in that order.
//! 3. Resolvers attach nodes to the [`DiscoverySession`]'s tree, merging ids that are already present, and may send
//!    nested selectors back through the registry.
//! 4. [`filter::apply`] removes tests the configuration excludes and prunes containers left without tests.
//!
//! ## Failure scope
//!
//! A selector nothing is found for is reported, not fatal. A resolver failure ([`DiscoveryError`]) is recorded on
//! the parent node and in the [`DiscoveryReport`], and sibling selectors still resolve. Only an
//! [`InvariantViolation`] aborts discovery.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod filter;
pub mod registry;
pub mod resolvers;
pub mod selector;
pub mod session;

use miette::Diagnostic;
use thiserror::Error;
use trellis_core::{InvariantViolation, UniqueIdParseError};

use crate::marker::MarkerError;

pub use registry::{TestResolver, TestResolverRegistry};
pub use resolvers::{ContainerResolver, MemberResolver, UniqueIdResolver};
pub use selector::{DiscoveryRequest, Selector};
pub use session::{DiscoveryReport, DiscoverySession, SelectorOutcome};

/// Segment kind of the engine root.
pub const ENGINE_SEGMENT: &str = "engine";
/// Segment kind of a top-level container.
pub const CONTAINER_SEGMENT: &str = "container";
/// Segment kind of a container nested in another container.
pub const NESTED_CONTAINER_SEGMENT: &str = "nested-container";
/// Segment kind of a test member; its value is the member signature.
pub const MEMBER_SEGMENT: &str = "member";

/// A resolver failed while expanding one selector.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum DiscoveryError {
    #[error("invalid unique id: {0}")]
    #[diagnostic(code(trellis::discovery::invalid_unique_id))]
    InvalidUniqueId(#[from] UniqueIdParseError),

    #[error(transparent)]
    #[diagnostic(code(trellis::discovery::marker))]
    Marker(#[from] MarkerError),

    #[error("unique id '{unique_id}' has a segment of unknown kind '{kind}'")]
    #[diagnostic(
        code(trellis::discovery::unknown_segment),
        help("segments below the engine root must be 'container', 'nested-container' or 'member'")
    )]
    UnknownSegment { unique_id: String, kind: String },

    #[error("resolver '{name}' is not registered")]
    #[diagnostic(code(trellis::discovery::missing_resolver))]
    MissingResolver { name: &'static str },

    #[error("container '{container}' is enclosed in itself")]
    #[diagnostic(code(trellis::discovery::enclosing_cycle))]
    EnclosingCycle { container: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Invariant(#[from] InvariantViolation),
}
