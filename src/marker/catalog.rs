//! In-memory [`TestMarker`]: containers and members registered through builders.
//!
//! ```
//! use trellis::marker::{ContainerSpec, TestCatalog, TestMarker};
//!
//! let catalog = TestCatalog::new()
//!     .container(ContainerSpec::new("LocalTestCase").test("test1", |_| Ok(())).helper("setup_data"));
//! assert!(catalog.is_test_container("LocalTestCase").unwrap());
//! assert!(catalog.is_test("LocalTestCase", "test1()"));
//! assert!(!catalog.is_test("LocalTestCase", "setup_data()"));
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use super::{Arguments, Body, Hook, MarkerError, MemberInfo, TestMarker};
use crate::execution::TestFailure;
use crate::extension::{ParamDecl, ParameterResolver};

/// Builder for one member of a [`ContainerSpec`].
#[derive(Clone)]
pub struct MemberSpec {
    name: String,
    params: Vec<ParamDecl>,
    body: Option<Body>,
    display_name: Option<String>,
    tags: BTreeSet<String>,
    extensions: Vec<Arc<dyn ParameterResolver>>,
    skip_reason: Option<String>,
}

impl MemberSpec {
    /// A test member.
    pub fn test<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Arguments) -> Result<(), TestFailure> + Send + Sync + 'static,
    {
        Self {
            body: Some(Arc::new(body)),
            ..Self::helper(name)
        }
    }

    /// A member that is not a test.
    pub fn helper(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            body: None,
            display_name: None,
            tags: BTreeSet::new(),
            extensions: Vec::new(),
            skip_reason: None,
        }
    }

    pub fn param(mut self, param: ParamDecl) -> Self {
        self.params.push(param);
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Register a resolver visible only to this member.
    pub fn extend_with(mut self, resolver: Arc<dyn ParameterResolver>) -> Self {
        self.extensions.push(resolver);
        self
    }

    pub fn skip(mut self, reason: impl Into<String>) -> Self {
        self.skip_reason = Some(reason.into());
        self
    }

    fn info(&self) -> MemberInfo {
        MemberInfo::new(self.name.clone(), self.params.clone())
    }

    fn signature(&self) -> String {
        super::signature(&self.name, &self.params)
    }

    fn is_test(&self) -> bool {
        self.body.is_some()
    }
}

/// Builder for one container of a [`TestCatalog`].
#[derive(Clone)]
pub struct ContainerSpec {
    name: String,
    enclosing: Option<String>,
    display_name: Option<String>,
    tags: BTreeSet<String>,
    members: Vec<MemberSpec>,
    hooks: Vec<Hook>,
    extensions: Vec<Arc<dyn ParameterResolver>>,
    skip_reason: Option<String>,
    unreadable: Option<String>,
}

impl ContainerSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enclosing: None,
            display_name: None,
            tags: BTreeSet::new(),
            members: Vec::new(),
            hooks: Vec::new(),
            extensions: Vec::new(),
            skip_reason: None,
            unreadable: None,
        }
    }

    /// Shorthand for a parameterless test member.
    pub fn test<F>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Arguments) -> Result<(), TestFailure> + Send + Sync + 'static,
    {
        self.member(MemberSpec::test(name, body))
    }

    /// Shorthand for a parameterless non-test member.
    pub fn helper(self, name: impl Into<String>) -> Self {
        self.member(MemberSpec::helper(name))
    }

    pub fn member(mut self, member: MemberSpec) -> Self {
        self.members.push(member);
        self
    }

    pub fn nested_in(mut self, enclosing: impl Into<String>) -> Self {
        self.enclosing = Some(enclosing.into());
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Register a resolver visible to every member and nested container.
    pub fn extend_with(mut self, resolver: Arc<dyn ParameterResolver>) -> Self {
        self.extensions.push(resolver);
        self
    }

    pub fn hook(mut self, hook: Hook) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn skip(mut self, reason: impl Into<String>) -> Self {
        self.skip_reason = Some(reason.into());
        self
    }

    /// Make every introspection of this container fail with `reason`.
    pub fn unreadable(mut self, reason: impl Into<String>) -> Self {
        self.unreadable = Some(reason.into());
        self
    }

    fn readable(&self) -> Result<&Self, MarkerError> {
        match &self.unreadable {
            Some(reason) => Err(MarkerError {
                container: self.name.clone(),
                message: reason.clone(),
            }),
            None => Ok(self),
        }
    }

    fn find_member(&self, signature: &str) -> Option<&MemberSpec> {
        self.members.iter().find(|m| m.signature() == signature)
    }
}

/// [`TestMarker`] backed by registered [`ContainerSpec`]s, in registration order.
#[derive(Clone, Default)]
pub struct TestCatalog {
    containers: Vec<ContainerSpec>,
}

impl TestCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a container. A later registration with the same name replaces the earlier one.
    pub fn container(mut self, spec: ContainerSpec) -> Self {
        match self.containers.iter_mut().find(|c| c.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.containers.push(spec),
        }
        self
    }

    pub fn container_names(&self) -> impl Iterator<Item = &str> {
        self.containers.iter().map(|c| c.name.as_str())
    }

    fn find(&self, name: &str) -> Option<&ContainerSpec> {
        self.containers.iter().find(|c| c.name == name)
    }

    fn find_member(&self, container: &str, signature: &str) -> Option<&MemberSpec> {
        self.find(container).and_then(|c| c.find_member(signature))
    }

    /// Tags of `container` and every container enclosing it.
    fn inherited_tags(&self, container: &str) -> BTreeSet<String> {
        let mut tags = BTreeSet::new();
        let mut current = self.find(container);
        let mut seen = BTreeSet::new();
        while let Some(spec) = current {
            if !seen.insert(spec.name.as_str()) {
                break;
            }
            tags.extend(spec.tags.iter().cloned());
            current = spec.enclosing.as_deref().and_then(|outer| self.find(outer));
        }
        tags
    }

    fn holds_tests(&self, spec: &ContainerSpec, depth: usize) -> Result<bool, MarkerError> {
        let spec = spec.readable()?;
        if spec.members.iter().any(MemberSpec::is_test) {
            return Ok(true);
        }
        // Guards against enclosing-container cycles.
        if depth > self.containers.len() {
            return Ok(false);
        }
        for nested in self.containers.iter().filter(|c| c.enclosing.as_deref() == Some(spec.name.as_str())) {
            match self.holds_tests(nested, depth + 1) {
                Ok(false) => {}
                // An unreadable nested container may hold tests; its error surfaces when that branch resolves.
                Ok(true) | Err(_) => return Ok(true),
            }
        }
        Ok(false)
    }
}

impl TestMarker for TestCatalog {
    fn is_test_container(&self, container: &str) -> Result<bool, MarkerError> {
        match self.find(container) {
            Some(spec) => self.holds_tests(spec, 0),
            None => Ok(false),
        }
    }

    fn enclosing_container(&self, container: &str) -> Option<String> {
        self.find(container).and_then(|c| c.enclosing.clone())
    }

    fn members(&self, container: &str) -> Result<Vec<MemberInfo>, MarkerError> {
        match self.find(container) {
            Some(spec) => Ok(spec.readable()?.members.iter().map(MemberSpec::info).collect()),
            None => Ok(Vec::new()),
        }
    }

    fn is_test(&self, container: &str, signature: &str) -> bool {
        self.find_member(container, signature).is_some_and(MemberSpec::is_test)
    }

    fn nested_containers(&self, container: &str) -> Result<Vec<String>, MarkerError> {
        if let Some(spec) = self.find(container) {
            spec.readable()?;
        }
        Ok(self
            .containers
            .iter()
            .filter(|c| c.enclosing.as_deref() == Some(container))
            .map(|c| c.name.clone())
            .collect())
    }

    fn container_display_name(&self, container: &str) -> String {
        self.find(container)
            .and_then(|c| c.display_name.clone())
            .unwrap_or_else(|| container.to_string())
    }

    fn member_display_name(&self, container: &str, member: &MemberInfo) -> String {
        self.find_member(container, &member.signature())
            .and_then(|m| m.display_name.clone())
            .unwrap_or_else(|| member.signature())
    }

    fn tags(&self, container: &str, member: Option<&str>) -> BTreeSet<String> {
        let mut tags = self.inherited_tags(container);
        if let Some(m) = member.and_then(|sig| self.find_member(container, sig)) {
            tags.extend(m.tags.iter().cloned());
        }
        tags
    }

    fn hooks(&self, container: &str) -> Vec<Hook> {
        self.find(container).map(|c| c.hooks.clone()).unwrap_or_default()
    }

    fn container_extensions(&self, container: &str) -> Vec<Arc<dyn ParameterResolver>> {
        self.find(container).map(|c| c.extensions.clone()).unwrap_or_default()
    }

    fn member_extensions(&self, container: &str, signature: &str) -> Vec<Arc<dyn ParameterResolver>> {
        self.find_member(container, signature)
            .map(|m| m.extensions.clone())
            .unwrap_or_default()
    }

    fn skip_reason(&self, container: &str, member: Option<&str>) -> Option<String> {
        match member {
            None => self.find(container).and_then(|c| c.skip_reason.clone()),
            Some(sig) => self.find_member(container, sig).and_then(|m| m.skip_reason.clone()),
        }
    }

    fn body(&self, container: &str, signature: &str) -> Option<Body> {
        self.find_member(container, signature).and_then(|m| m.body.clone())
    }
}
