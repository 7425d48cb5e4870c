//! Argument resolution for one invocation.
//!
//! Each declared input is resolved on its own, left to right: exactly one visible resolver must support it, and
//! the value it produces must be assignable to the declared type. The first input that cannot be resolved fails the
//! whole invocation; nothing is partially bound.
//!
//! Resolvers are third-party code. A panic in `supports` or `resolve` is caught here and reported as a
//! [`ParameterResolutionError::ResolverFailed`] naming the resolver, so it fails only the invocation.

use std::panic::{AssertUnwindSafe, catch_unwind};

use miette::Diagnostic;
use thiserror::Error;

use super::registry::ExtensionRegistry;
use super::resolver::{ExtensionContext, ParamDecl, ParameterContext};
use super::value::Value;
use crate::execution::outcome::panic_message;

/// Invocation-scoped failure to produce an argument.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ParameterResolutionError {
    #[error("No ParameterResolver registered for parameter [{parameter}] in executable [{executable}].")]
    #[diagnostic(
        code(trellis::parameter::no_resolver),
        help("register a ParameterResolver on the enclosing container or on the test itself")
    )]
    NoResolverFound { parameter: String, executable: String },

    #[error(
        "Discovered multiple competing ParameterResolvers for parameter [{parameter}] in executable [{executable}]: {}",
        .resolvers.join(", ")
    )]
    #[diagnostic(code(trellis::parameter::ambiguous))]
    AmbiguousResolver {
        parameter: String,
        executable: String,
        resolvers: Vec<String>,
    },

    #[error(
        "ParameterResolver [{resolver}] resolved a value of type [{produced}] for parameter [{parameter}] in executable [{executable}], but a value assignment compatible with [{required}] is required."
    )]
    #[diagnostic(code(trellis::parameter::type_mismatch))]
    TypeMismatch {
        resolver: String,
        produced: String,
        required: String,
        parameter: String,
        executable: String,
    },

    #[error(
        "ParameterResolver [{resolver}] failed to resolve parameter [{parameter}] in executable [{executable}]: {message}"
    )]
    #[diagnostic(code(trellis::parameter::resolver_failed))]
    ResolverFailed {
        resolver: String,
        parameter: String,
        executable: String,
        message: String,
    },
}

/// Resolve every declared input of `executable`, in declaration order.
pub fn resolve_parameters(
    executable: &str,
    container: &str,
    params: &[ParamDecl],
    registry: &ExtensionRegistry,
    extension: &ExtensionContext,
) -> Result<Vec<Value>, ParameterResolutionError> {
    params
        .iter()
        .enumerate()
        .map(|(index, param)| {
            let parameter = ParameterContext {
                index,
                param,
                executable,
                container,
            };
            resolve_one(&parameter, registry, extension)
        })
        .collect()
}

fn resolve_one(
    parameter: &ParameterContext<'_>,
    registry: &ExtensionRegistry,
    extension: &ExtensionContext,
) -> Result<Value, ParameterResolutionError> {
    let mut supporting = Vec::new();
    for resolver in registry.visible() {
        if guarded(resolver.name(), parameter, || resolver.supports(parameter, extension))? {
            supporting.push(resolver);
        }
    }

    let resolver = match supporting.as_slice() {
        [] => {
            return Err(ParameterResolutionError::NoResolverFound {
                parameter: parameter.to_string(),
                executable: parameter.executable.to_string(),
            });
        }
        [only] => *only,
        many => {
            return Err(ParameterResolutionError::AmbiguousResolver {
                parameter: parameter.to_string(),
                executable: parameter.executable.to_string(),
                resolvers: many.iter().map(|r| r.name().to_string()).collect(),
            });
        }
    };

    tracing::trace!(
        resolver = resolver.name(),
        parameter = %parameter,
        executable = parameter.executable,
        "resolving parameter"
    );

    let value = guarded(resolver.name(), parameter, || resolver.resolve(parameter, extension))?.map_err(|failure| {
        ParameterResolutionError::ResolverFailed {
            resolver: resolver.name().to_string(),
            parameter: parameter.to_string(),
            executable: parameter.executable.to_string(),
            message: failure.message,
        }
    })?;

    let produced = value.value_type();
    if !parameter.param.ty.is_assignable_from(&produced) {
        return Err(ParameterResolutionError::TypeMismatch {
            resolver: resolver.name().to_string(),
            produced: produced.to_string(),
            required: parameter.param.ty.to_string(),
            parameter: parameter.to_string(),
            executable: parameter.executable.to_string(),
        });
    }
    Ok(value)
}

/// Run one resolver callback, turning a panic into [`ParameterResolutionError::ResolverFailed`].
fn guarded<T>(
    resolver: &str,
    parameter: &ParameterContext<'_>,
    call: impl FnOnce() -> T,
) -> Result<T, ParameterResolutionError> {
    catch_unwind(AssertUnwindSafe(call)).map_err(|payload| {
        tracing::debug!(resolver, parameter = %parameter, "resolver panicked");
        ParameterResolutionError::ResolverFailed {
            resolver: resolver.to_string(),
            parameter: parameter.to_string(),
            executable: parameter.executable.to_string(),
            message: format!("panicked: {}", panic_message(payload.as_ref())),
        }
    })
}
