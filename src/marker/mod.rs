//! The test-marker capability.
//!
//! How test units are *marked* in source (attributes, naming conventions, registration calls) is not the engine's
//! business. Discovery and execution only ask a [`TestMarker`] questions about named containers and their members:
//! is this a test container, which members are tests, what do they declare, how are they invoked.
//!
//! [`TestCatalog`] is the in-memory implementation used by embedders and tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod catalog;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;

use crate::execution::TestFailure;
use crate::extension::{ParamDecl, ParameterResolver, TestInfo, Value};

pub use catalog::{ContainerSpec, MemberSpec, TestCatalog};

/// Executable body of a test or hook.
pub type Body = Arc<dyn Fn(&Arguments) -> Result<(), TestFailure> + Send + Sync>;

/// Resolved arguments handed to a [`Body`], in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Arguments(Vec<Value>);

impl Arguments {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn int(&self, index: usize) -> Result<i64, TestFailure> {
        self.get(index)
            .and_then(Value::as_int)
            .ok_or_else(|| mismatch(index, "Int"))
    }

    pub fn float(&self, index: usize) -> Result<f64, TestFailure> {
        self.get(index)
            .and_then(Value::as_float)
            .ok_or_else(|| mismatch(index, "Float"))
    }

    pub fn str(&self, index: usize) -> Result<&str, TestFailure> {
        self.get(index)
            .and_then(Value::as_str)
            .ok_or_else(|| mismatch(index, "Str"))
    }

    pub fn test_info(&self, index: usize) -> Result<&TestInfo, TestFailure> {
        self.get(index)
            .and_then(Value::as_test_info)
            .ok_or_else(|| mismatch(index, "TestInfo"))
    }

    pub fn custom<T: std::any::Any>(&self, index: usize) -> Result<&T, TestFailure> {
        self.get(index)
            .and_then(Value::downcast_custom::<T>)
            .ok_or_else(|| mismatch(index, std::any::type_name::<T>()))
    }
}

fn mismatch(index: usize, expected: &str) -> TestFailure {
    TestFailure::Assertion(format!("argument {index} is not a {expected}"))
}

/// A member of a container: a test or a helper, identified by its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub name: String,
    pub params: Vec<ParamDecl>,
}

impl MemberInfo {
    pub fn new(name: impl Into<String>, params: Vec<ParamDecl>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// `name(T1, T2)`; distinguishes overloads that share a name.
    pub fn signature(&self) -> String {
        signature(&self.name, &self.params)
    }
}

pub(crate) fn signature(name: &str, params: &[ParamDecl]) -> String {
    let types: Vec<String> = params.iter().map(|p| p.ty.to_string()).collect();
    format!("{name}({})", types.join(", "))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    BeforeAll,
    AfterAll,
    BeforeEach,
    AfterEach,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HookKind::BeforeAll => "before-all",
            HookKind::AfterAll => "after-all",
            HookKind::BeforeEach => "before-each",
            HookKind::AfterEach => "after-each",
        };
        f.write_str(s)
    }
}

/// Lifecycle hook declared on a container.
#[derive(Clone)]
pub struct Hook {
    pub kind: HookKind,
    pub name: String,
    pub params: Vec<ParamDecl>,
    pub body: Body,
}

impl Hook {
    pub fn new<F>(kind: HookKind, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Arguments) -> Result<(), TestFailure> + Send + Sync + 'static,
    {
        Self {
            kind,
            name: name.into(),
            params: Vec::new(),
            body: Arc::new(body),
        }
    }

    pub fn param(mut self, param: ParamDecl) -> Self {
        self.params.push(param);
        self
    }

    pub fn signature(&self) -> String {
        signature(&self.name, &self.params)
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("kind", &self.kind)
            .field("signature", &self.signature())
            .finish()
    }
}

/// The marker could not introspect a container.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("cannot introspect container '{container}': {message}")]
#[diagnostic(code(trellis::marker::introspection))]
pub struct MarkerError {
    pub container: String,
    pub message: String,
}

/// Read-only questions the engine asks about marked test units.
///
/// Containers are addressed by name; members by `(container, signature)`.
pub trait TestMarker {
    /// Whether `container` holds tests directly or through nested containers. Unknown containers are not test
    /// containers.
    fn is_test_container(&self, container: &str) -> Result<bool, MarkerError>;

    /// Name of the container `container` is nested in, if any.
    fn enclosing_container(&self, container: &str) -> Option<String>;

    /// All members of `container`, tests and helpers alike, in declaration order.
    fn members(&self, container: &str) -> Result<Vec<MemberInfo>, MarkerError>;

    fn is_test(&self, container: &str, signature: &str) -> bool;

    /// Containers nested directly in `container`, in declaration order.
    fn nested_containers(&self, container: &str) -> Result<Vec<String>, MarkerError>;

    fn container_display_name(&self, container: &str) -> String;

    fn member_display_name(&self, container: &str, member: &MemberInfo) -> String;

    /// Tags of a container (`member == None`) or of one of its members.
    fn tags(&self, container: &str, member: Option<&str>) -> BTreeSet<String>;

    fn hooks(&self, container: &str) -> Vec<Hook>;

    fn container_extensions(&self, container: &str) -> Vec<Arc<dyn ParameterResolver>>;

    fn member_extensions(&self, container: &str, signature: &str) -> Vec<Arc<dyn ParameterResolver>>;

    /// Why a container (`member == None`) or member must not run, if it is disabled.
    fn skip_reason(&self, container: &str, member: Option<&str>) -> Option<String>;

    fn body(&self, container: &str, signature: &str) -> Option<Body>;
}
