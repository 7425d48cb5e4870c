//! Engine configuration
//!
//! Controls the engine id, fail-fast behaviour and which discovered tests survive filtering.

use std::collections::BTreeSet;

use trellis_core::TestDescriptor;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Value of the root `engine` segment of every unique id
    pub engine_id: String,
    /// Skip every remaining test after the first failure
    pub fail_fast: bool,
    /// Keep only tests whose display name or signature contains this keyword
    pub name_filter: Option<String>,
    /// Keep only tests carrying at least one of these tags (empty: no restriction)
    pub include_tags: BTreeSet<String>,
    /// Drop tests carrying any of these tags
    pub exclude_tags: BTreeSet<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine_id: "trellis".to_string(),
            fail_fast: false,
            name_filter: None,
            include_tags: BTreeSet::new(),
            exclude_tags: BTreeSet::new(),
        }
    }
}

impl EngineConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the engine id
    pub fn with_engine_id(mut self, engine_id: impl Into<String>) -> Self {
        self.engine_id = engine_id.into();
        self
    }

    /// Enable or disable fail-fast
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Set the name keyword filter
    pub fn with_name_filter(mut self, keyword: impl Into<String>) -> Self {
        self.name_filter = Some(keyword.into());
        self
    }

    /// Add a tag that tests must carry
    pub fn with_include_tag(mut self, tag: impl Into<String>) -> Self {
        self.include_tags.insert(tag.into());
        self
    }

    /// Add a tag that excludes tests
    pub fn with_exclude_tag(mut self, tag: impl Into<String>) -> Self {
        self.exclude_tags.insert(tag.into());
        self
    }

    /// Whether any filter is configured
    pub fn has_filters(&self) -> bool {
        self.name_filter.is_some() || !self.include_tags.is_empty() || !self.exclude_tags.is_empty()
    }

    /// Whether a test descriptor passes every configured filter
    pub fn admits(&self, descriptor: &TestDescriptor) -> bool {
        if let Some(keyword) = &self.name_filter {
            let in_signature = descriptor
                .source()
                .and_then(|s| s.member.as_deref())
                .is_some_and(|sig| sig.contains(keyword.as_str()));
            if !descriptor.display_name().contains(keyword.as_str()) && !in_signature {
                return false;
            }
        }
        let tags = descriptor.tags();
        if !self.include_tags.is_empty() && self.include_tags.is_disjoint(tags) {
            return false;
        }
        self.exclude_tags.is_disjoint(tags)
    }
}
