//! The parameter-resolver extension point.
//!
//! A [`ParameterResolver`] is consulted once per formal input of an invocation: first `supports`, then (if it is
//! the only supporter) `resolve`. Resolvers see exactly one input at a time through [`ParameterContext`], plus the
//! shared, read-only [`ExtensionContext`] of the invocation.

use std::collections::BTreeSet;
use std::fmt;

use miette::Diagnostic;
use thiserror::Error;
use trellis_core::{TestDescriptor, UniqueId};

use super::value::{TestInfo, Value, ValueType};

/// One declared input of a test or hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub name: String,
    pub ty: ValueType,
    /// Free-form markers attached to the input, e.g. `"custom-annotation"`.
    pub qualifiers: Vec<String>,
}

impl ParamDecl {
    pub fn new(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty,
            qualifiers: Vec::new(),
        }
    }

    pub fn qualified(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifiers.push(qualifier.into());
        self
    }

    pub fn has_qualifier(&self, qualifier: &str) -> bool {
        self.qualifiers.iter().any(|q| q == qualifier)
    }
}

impl fmt::Display for ParamDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for q in &self.qualifiers {
            write!(f, "@{q} ")?;
        }
        write!(f, "{} {}", self.ty, self.name)
    }
}

/// The single input currently being resolved.
#[derive(Debug, Clone, Copy)]
pub struct ParameterContext<'a> {
    pub index: usize,
    pub param: &'a ParamDecl,
    /// Signature of the test or hook declaring the input, e.g. `overloaded(CustomType)`.
    pub executable: &'a str,
    pub container: &'a str,
}

impl fmt::Display for ParameterContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.index, self.param)
    }
}

/// Per-invocation context shared by every resolver call of that invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionContext {
    pub display_name: String,
    pub unique_id: UniqueId,
    pub tags: BTreeSet<String>,
}

impl ExtensionContext {
    pub fn for_descriptor(descriptor: &TestDescriptor) -> Self {
        Self {
            display_name: descriptor.display_name().to_string(),
            unique_id: descriptor.unique_id().clone(),
            tags: descriptor.tags().clone(),
        }
    }

    pub fn test_info(&self) -> TestInfo {
        TestInfo {
            display_name: self.display_name.clone(),
            unique_id: self.unique_id.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Error raised by a resolver's own `resolve` step.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(trellis::extension::failure))]
pub struct ExtensionFailure {
    pub message: String,
}

impl ExtensionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Extension that supplies values for declared inputs.
pub trait ParameterResolver: Send + Sync {
    /// Stable identity used in error messages and for de-duplicating registrations.
    fn name(&self) -> &str;

    fn supports(&self, parameter: &ParameterContext<'_>, extension: &ExtensionContext) -> bool;

    fn resolve(&self, parameter: &ParameterContext<'_>, extension: &ExtensionContext)
    -> Result<Value, ExtensionFailure>;
}

/// Built-in resolver for inputs declared as [`ValueType::TestInfo`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TestInfoParameterResolver;

impl TestInfoParameterResolver {
    pub const NAME: &'static str = "TestInfoParameterResolver";
}

impl ParameterResolver for TestInfoParameterResolver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn supports(&self, parameter: &ParameterContext<'_>, _extension: &ExtensionContext) -> bool {
        parameter.param.ty == ValueType::TestInfo
    }

    fn resolve(
        &self,
        _parameter: &ParameterContext<'_>,
        extension: &ExtensionContext,
    ) -> Result<Value, ExtensionFailure> {
        Ok(Value::TestInfo(extension.test_info()))
    }
}

/// Closure-backed resolver, convenient for one-off extensions.
pub struct FnParameterResolver<S, R> {
    name: String,
    supports: S,
    resolve: R,
}

impl<S, R> FnParameterResolver<S, R>
where
    S: Fn(&ParameterContext<'_>) -> bool + Send + Sync,
    R: Fn(&ParameterContext<'_>, &ExtensionContext) -> Result<Value, ExtensionFailure> + Send + Sync,
{
    pub fn new(name: impl Into<String>, supports: S, resolve: R) -> Self {
        Self {
            name: name.into(),
            supports,
            resolve,
        }
    }
}

impl<S, R> ParameterResolver for FnParameterResolver<S, R>
where
    S: Fn(&ParameterContext<'_>) -> bool + Send + Sync,
    R: Fn(&ParameterContext<'_>, &ExtensionContext) -> Result<Value, ExtensionFailure> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, parameter: &ParameterContext<'_>, _extension: &ExtensionContext) -> bool {
        (self.supports)(parameter)
    }

    fn resolve(
        &self,
        parameter: &ParameterContext<'_>,
        extension: &ExtensionContext,
    ) -> Result<Value, ExtensionFailure> {
        (self.resolve)(parameter, extension)
    }
}
