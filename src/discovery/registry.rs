//! Ordered, pluggable resolvers and the dispatch loop that hands selectors to them.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use trellis_core::{InvariantViolation, NodeId};

use super::DiscoveryError;
use super::selector::{DiscoveryRequest, Selector};
use super::session::{DiscoverySession, SelectorOutcome};

/// Turns one kind of selector into descriptor nodes.
pub trait TestResolver: Any {
    fn name(&self) -> &'static str;

    /// One-time preparation before the first request.
    fn initialize(&mut self) {}

    fn supports(&self, selector: &Selector) -> bool;

    /// Attach the nodes `selector` stands for. `Ok(false)` means nothing was found.
    ///
    /// `parent` is where a failure of this resolution gets recorded. Nested selectors go back through `registry`.
    fn resolve(
        &self,
        selector: &Selector,
        parent: NodeId,
        registry: &TestResolverRegistry,
        session: &mut DiscoverySession<'_>,
    ) -> Result<bool, DiscoveryError>;

    fn as_any(&self) -> &dyn Any;
}

/// Resolvers in registration order; the first one that supports a selector claims it.
#[derive(Default)]
pub struct TestResolverRegistry {
    resolvers: Vec<Box<dyn TestResolver>>,
    by_type: HashMap<TypeId, usize>,
    initialized: bool,
}

impl TestResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<R: TestResolver>(&mut self, resolver: R) -> &mut Self {
        tracing::debug!(resolver = resolver.name(), position = self.resolvers.len(), "registered resolver");
        self.resolvers.push(Box::new(resolver));
        self
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Prepare every resolver and build the typed lookup index. Must run exactly once, before discovery.
    pub fn initialize(&mut self) -> Result<(), InvariantViolation> {
        if self.initialized {
            return Err(InvariantViolation::RegistryInitializedTwice);
        }
        for (position, resolver) in self.resolvers.iter_mut().enumerate() {
            resolver.initialize();
            // The first registration of a type wins the lookup.
            self.by_type.entry(resolver.as_any().type_id()).or_insert(position);
        }
        self.initialized = true;
        Ok(())
    }

    /// Registered resolver of type `R`, if any.
    pub fn lookup_test_resolver<R: TestResolver>(&self) -> Option<&R> {
        let position = *self.by_type.get(&TypeId::of::<R>())?;
        self.resolvers.get(position)?.as_any().downcast_ref::<R>()
    }

    /// Resolve every selector of `request` under `parent`.
    ///
    /// Unmatched selectors and resolver failures are recorded in the session; only invariant violations abort.
    pub fn notify_resolvers(
        &self,
        parent: NodeId,
        request: &DiscoveryRequest,
        session: &mut DiscoverySession<'_>,
    ) -> Result<(), InvariantViolation> {
        if !self.initialized {
            return Err(InvariantViolation::RegistryNotInitialized);
        }
        for selector in request.selectors() {
            if self.resolve_selector(selector, parent, session)? == SelectorOutcome::Unmatched {
                session.record_unmatched(selector);
            }
        }
        Ok(())
    }

    /// Hand one selector to the first resolver that supports it.
    ///
    /// A selector already handled in this session is not handed out again; its earlier outcome is returned.
    pub fn resolve_selector(
        &self,
        selector: &Selector,
        parent: NodeId,
        session: &mut DiscoverySession<'_>,
    ) -> Result<SelectorOutcome, InvariantViolation> {
        if !self.initialized {
            return Err(InvariantViolation::RegistryNotInitialized);
        }
        if let Some(outcome) = session.outcome(selector) {
            tracing::trace!(%selector, ?outcome, "selector already handled");
            return Ok(outcome);
        }
        // Marks the selector as taken while it is in flight, so re-entrant requests cannot loop.
        session.record_outcome(selector, SelectorOutcome::Resolved);

        let Some(resolver) = self.resolvers.iter().find(|r| r.supports(selector)) else {
            session.record_outcome(selector, SelectorOutcome::Unmatched);
            return Ok(SelectorOutcome::Unmatched);
        };

        let outcome = match resolver.resolve(selector, parent, self, session) {
            Ok(true) => SelectorOutcome::Resolved,
            Ok(false) => SelectorOutcome::Unmatched,
            Err(DiscoveryError::Invariant(violation)) => return Err(violation),
            Err(error) => {
                session.record_failure(parent, selector, &error)?;
                SelectorOutcome::Failed
            }
        };
        tracing::debug!(resolver = resolver.name(), %selector, ?outcome, "resolved selector");
        session.record_outcome(selector, outcome);
        Ok(outcome)
    }
}

impl std::fmt::Debug for TestResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestResolverRegistry")
            .field("resolvers", &self.names())
            .field("initialized", &self.initialized)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use trellis_core::{DescriptorKind, TestDescriptor};

    use super::*;
    use crate::marker::TestCatalog;

    /// Claims container selectors and attaches one node per selector.
    struct Recording {
        name: &'static str,
        calls: Cell<usize>,
    }

    impl Recording {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                calls: Cell::new(0),
            }
        }
    }

    impl TestResolver for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        fn supports(&self, selector: &Selector) -> bool {
            matches!(selector, Selector::Container(_))
        }

        fn resolve(
            &self,
            selector: &Selector,
            parent: NodeId,
            _registry: &TestResolverRegistry,
            session: &mut DiscoverySession<'_>,
        ) -> Result<bool, DiscoveryError> {
            self.calls.set(self.calls.get() + 1);
            let Selector::Container(name) = selector else {
                return Ok(false);
            };
            if name == "Missing" {
                return Ok(false);
            }
            let id = session.tree().descriptor(parent)?.unique_id().append("container", name.as_str());
            session
                .tree_mut()
                .add_child(parent, TestDescriptor::new(id, name.as_str(), DescriptorKind::Container))?;
            Ok(true)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Other;

    impl TestResolver for Other {
        fn name(&self) -> &'static str {
            "Other"
        }

        fn supports(&self, _selector: &Selector) -> bool {
            true
        }

        fn resolve(
            &self,
            _selector: &Selector,
            _parent: NodeId,
            _registry: &TestResolverRegistry,
            _session: &mut DiscoverySession<'_>,
        ) -> Result<bool, DiscoveryError> {
            Ok(true)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    // ========================================
    // Lifecycle
    // ========================================

    #[test]
    fn test_notify_before_initialize_is_invariant_violation() {
        let mut registry = TestResolverRegistry::new();
        registry.register(Recording::new("first"));
        let catalog = TestCatalog::new();
        let mut session = DiscoverySession::new("trellis", &catalog);
        let root = session.root();
        let request = DiscoveryRequest::new().select(Selector::container("A"));
        assert_eq!(
            registry.notify_resolvers(root, &request, &mut session),
            Err(InvariantViolation::RegistryNotInitialized)
        );
    }

    #[test]
    fn test_initialize_twice_fails() {
        let mut registry = TestResolverRegistry::new();
        registry.initialize().unwrap();
        assert_eq!(registry.initialize(), Err(InvariantViolation::RegistryInitializedTwice));
    }

    // ========================================
    // Dispatch
    // ========================================

    #[test]
    fn test_first_supporting_resolver_wins() {
        let mut registry = TestResolverRegistry::new();
        registry.register(Recording::new("first")).register(Other);
        registry.initialize().unwrap();
        assert_eq!(registry.names(), vec!["first", "Other"]);

        let catalog = TestCatalog::new();
        let mut session = DiscoverySession::new("trellis", &catalog);
        let root = session.root();
        let request = DiscoveryRequest::new()
            .select(Selector::container("A"))
            .select(Selector::member("A", "t()"));
        registry.notify_resolvers(root, &request, &mut session).unwrap();

        let first = registry.lookup_test_resolver::<Recording>().unwrap();
        assert_eq!(first.calls.get(), 1);
        assert_eq!(session.tree().node_count(), 2);
    }

    #[test]
    fn test_selector_is_not_handed_out_twice() {
        let mut registry = TestResolverRegistry::new();
        registry.register(Recording::new("first"));
        registry.initialize().unwrap();

        let catalog = TestCatalog::new();
        let mut session = DiscoverySession::new("trellis", &catalog);
        let root = session.root();
        let request = DiscoveryRequest::new()
            .select(Selector::container("A"))
            .select(Selector::container("A"));
        registry.notify_resolvers(root, &request, &mut session).unwrap();

        assert_eq!(registry.lookup_test_resolver::<Recording>().unwrap().calls.get(), 1);
        assert_eq!(session.outcome(&Selector::container("A")), Some(SelectorOutcome::Resolved));
    }

    #[test]
    fn test_unmatched_is_reported_not_fatal() {
        let mut registry = TestResolverRegistry::new();
        registry.register(Recording::new("first"));
        registry.initialize().unwrap();

        let catalog = TestCatalog::new();
        let mut session = DiscoverySession::new("trellis", &catalog);
        let root = session.root();
        let request = DiscoveryRequest::new()
            .select(Selector::container("Missing"))
            .select(Selector::unique_id("engine:trellis"))
            .select(Selector::container("B"));
        registry.notify_resolvers(root, &request, &mut session).unwrap();

        let (tree, report) = session.finish();
        assert_eq!(tree.node_count(), 2);
        assert_eq!(
            report.messages(),
            vec![
                "nothing found for selector container [Missing]",
                "nothing found for selector unique id [engine:trellis]",
            ]
        );
    }

    #[test]
    fn test_lookup_of_unregistered_type() {
        let mut registry = TestResolverRegistry::new();
        registry.register(Other);
        registry.initialize().unwrap();
        assert!(registry.lookup_test_resolver::<Recording>().is_none());
        assert!(registry.lookup_test_resolver::<Other>().is_some());
    }
}
