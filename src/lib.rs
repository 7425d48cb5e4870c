#![forbid(unsafe_code)]
//! Trellis: a test discovery-and-execution engine
//!
//! Given selectors (by container, by member, or by unique id), Trellis builds a rooted tree of test descriptors,
//! then walks that tree, resolving each invocation's declared inputs through parameter-resolver extensions and
//! reporting every lifecycle transition as an execution event.
//!
//! ## Layout
//!
//! - [`marker`]: the [`TestMarker`](marker::TestMarker) capability and the in-memory [`TestCatalog`](marker::TestCatalog)
//! - [`discovery`]: selectors, the resolver registry and built-in resolvers, post-discovery filtering
//! - [`extension`]: parameter resolvers and the per-invocation resolution protocol
//! - [`execution`]: the depth-first walk, lifecycle hooks and event emission
//! - [`engine`]: the facade tying discovery and execution together
//!
//! The shared model (unique ids, the descriptor tree, events) lives in `trellis_core` and is re-exported here.
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `discovery`, `execution`,
//!   `extension` and `marker` modules enforce `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **Test bodies**: panics inside a test body or hook are caught at the node boundary and reported as a failed
//!   event; they never abort the run.
//!
//! - **True invariants**: If a panic represents an engine bug (logic error), use `unreachable!("INVARIANT: reason")`
//!   with a clear explanation.

pub mod config;
pub mod discovery;
pub mod engine;
pub mod execution;
pub mod extension;
pub mod marker;
pub mod testing;

pub use trellis_core::{
    DescriptorKind, DescriptorTree, DiscoveryFailure, EventCounts, EventKind, EventLogViolation, EventPayload,
    EventRecorder, EventSink, ExecutionEvent, InvariantViolation, NodeId, RemovalRequest, Segment, TestDescriptor,
    TestSource, UniqueId, UniqueIdParseError, Visitor,
};

pub use config::EngineConfig;
pub use discovery::{DiscoveryError, DiscoveryReport, DiscoveryRequest, Selector};
pub use engine::{Discovery, Engine};
pub use execution::{ExecutionSummary, InvocationError, TestFailure};
pub use extension::{
    ExtensionContext, ExtensionFailure, ParamDecl, ParameterContext, ParameterResolutionError, ParameterResolver,
    TestInfo, Value, ValueType,
};
pub use marker::{Arguments, ContainerSpec, Hook, HookKind, MemberSpec, TestCatalog, TestMarker};
