//! Test descriptors: the payload stored in each node of the descriptor tree.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::unique_id::UniqueId;

/// Whether a descriptor is the engine root, a grouping container, or a runnable test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    Engine,
    Container,
    Test,
}

impl DescriptorKind {
    pub fn is_container(self) -> bool {
        matches!(self, DescriptorKind::Engine | DescriptorKind::Container)
    }

    pub fn is_test(self) -> bool {
        matches!(self, DescriptorKind::Test)
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorKind::Engine => write!(f, "engine"),
            DescriptorKind::Container => write!(f, "container"),
            DescriptorKind::Test => write!(f, "test"),
        }
    }
}

/// Human-readable origin of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestSource {
    pub container: String,
    pub member: Option<String>,
}

impl TestSource {
    pub fn container(name: impl Into<String>) -> Self {
        Self {
            container: name.into(),
            member: None,
        }
    }

    pub fn member(container: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            member: Some(signature.into()),
        }
    }
}

impl fmt::Display for TestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.member {
            Some(member) => write!(f, "{}::{}", self.container, member),
            None => write!(f, "{}", self.container),
        }
    }
}

/// One node of the discovery tree.
///
/// Identity is the [`UniqueId`] alone: equality and hashing ignore display name, source and tags, so two
/// descriptors with the same id are the same node.
#[derive(Debug, Clone)]
pub struct TestDescriptor {
    unique_id: UniqueId,
    display_name: String,
    kind: DescriptorKind,
    source: Option<TestSource>,
    tags: BTreeSet<String>,
}

impl TestDescriptor {
    pub fn new(unique_id: UniqueId, display_name: impl Into<String>, kind: DescriptorKind) -> Self {
        Self {
            unique_id,
            display_name: display_name.into(),
            kind,
            source: None,
            tags: BTreeSet::new(),
        }
    }

    /// Root descriptor for an engine; its id is `engine:<engine_id>`.
    pub fn engine(engine_id: &str) -> Self {
        Self::new(UniqueId::root("engine", engine_id), engine_id, DescriptorKind::Engine)
    }

    pub fn with_source(mut self, source: TestSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn unique_id(&self) -> &UniqueId {
        &self.unique_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn kind(&self) -> DescriptorKind {
        self.kind
    }

    pub fn source(&self) -> Option<&TestSource> {
        self.source.as_ref()
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn is_test(&self) -> bool {
        self.kind.is_test()
    }

    pub fn is_container(&self) -> bool {
        self.kind.is_container()
    }
}

impl PartialEq for TestDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.unique_id == other.unique_id
    }
}

impl Eq for TestDescriptor {}

impl Hash for TestDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.unique_id.hash(state);
    }
}

impl fmt::Display for TestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.unique_id)
    }
}
