//! Parameter-resolver extensions and the per-invocation resolution protocol.
//!
//! - [`value`]: the values resolvers produce and the declared types they are checked against.
//! - [`resolver`]: the [`ParameterResolver`] extension point and the built-in `TestInfo` resolver.
//! - [`registry`]: layered visibility (engine built-ins, enclosing containers, the member itself).
//! - [`resolution`]: [`resolve_parameters`], the exactly-one-match and type-compatibility rules.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod registry;
pub mod resolution;
pub mod resolver;
pub mod value;

pub use registry::ExtensionRegistry;
pub use resolution::{ParameterResolutionError, resolve_parameters};
pub use resolver::{
    ExtensionContext, ExtensionFailure, FnParameterResolver, ParamDecl, ParameterContext, ParameterResolver,
    TestInfoParameterResolver,
};
pub use value::{CustomValue, TestInfo, Value, ValueType};
