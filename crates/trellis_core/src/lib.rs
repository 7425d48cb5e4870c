//! Provide the shared, engine-independent model of the Trellis test engine.
//!
//! This crate holds the pieces that both discovery and execution agree on:
//! - [`UniqueId`]: the hierarchical, string-serializable address of a node,
//! - [`TestDescriptor`] and [`DescriptorTree`]: the addressable tree of containers and tests,
//! - [`ExecutionEvent`] and [`EventRecorder`]: the append-only log of lifecycle transitions.
//!
//! ## Notes
//!
//! - This is a “model” crate: **no IO**, no global state, and no knowledge of selectors, resolvers or extensions.
//! - Structural misuse of the tree is reported as [`InvariantViolation`], never as a panic.

pub mod descriptor;
pub mod errors;
pub mod event;
pub mod tree;
pub mod unique_id;

pub use descriptor::{DescriptorKind, TestDescriptor, TestSource};
pub use errors::InvariantViolation;
pub use event::{EventCounts, EventKind, EventPayload, EventRecorder, EventSink, ExecutionEvent, EventLogViolation};
pub use tree::{DescriptorTree, DiscoveryFailure, NodeId, RemovalRequest, Visitor};
pub use unique_id::{Segment, UniqueId, UniqueIdParseError};
