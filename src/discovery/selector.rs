//! What a discovery request asks for.

use std::fmt;

/// One request to find tests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Every test in a container, including nested containers.
    Container(String),
    /// One member of a container, addressed by signature (e.g. `test(Int)`).
    Member { container: String, signature: String },
    /// The serialized [`UniqueId`](trellis_core::UniqueId) of a container or test.
    UniqueId(String),
}

impl Selector {
    pub fn container(name: impl Into<String>) -> Self {
        Selector::Container(name.into())
    }

    pub fn member(container: impl Into<String>, signature: impl Into<String>) -> Self {
        Selector::Member {
            container: container.into(),
            signature: signature.into(),
        }
    }

    pub fn unique_id(id: impl Into<String>) -> Self {
        Selector::UniqueId(id.into())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Container(name) => write!(f, "container [{name}]"),
            Selector::Member { container, signature } => write!(f, "member [{container}#{signature}]"),
            Selector::UniqueId(id) => write!(f, "unique id [{id}]"),
        }
    }
}

/// Ordered selectors of one discovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryRequest {
    selectors: Vec<Selector>,
}

impl DiscoveryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, selector: Selector) -> Self {
        self.selectors.push(selector);
        self
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}

impl FromIterator<Selector> for DiscoveryRequest {
    fn from_iter<I: IntoIterator<Item = Selector>>(iter: I) -> Self {
        Self {
            selectors: iter.into_iter().collect(),
        }
    }
}
