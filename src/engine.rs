//! The engine facade: discovery followed by execution.

use trellis_core::{DescriptorTree, EventSink, InvariantViolation};

use crate::config::EngineConfig;
use crate::discovery::filter::{self, FilterStats};
use crate::discovery::{
    ContainerResolver, DiscoveryReport, DiscoveryRequest, DiscoverySession, MemberResolver, TestResolverRegistry,
    UniqueIdResolver,
};
use crate::execution::{self, ExecutionSummary};
use crate::marker::TestMarker;

/// Result of one discovery run.
#[derive(Debug)]
pub struct Discovery {
    pub tree: DescriptorTree,
    pub report: DiscoveryReport,
    pub filtered: FilterStats,
}

/// A test engine bound to one marker capability.
pub struct Engine {
    marker: Box<dyn TestMarker>,
    config: EngineConfig,
    registry: TestResolverRegistry,
}

impl Engine {
    /// Engine with the built-in resolvers, registered and initialized.
    pub fn new(marker: impl TestMarker + 'static, config: EngineConfig) -> Result<Self, InvariantViolation> {
        let mut registry = TestResolverRegistry::new();
        registry
            .register(ContainerResolver)
            .register(MemberResolver)
            .register(UniqueIdResolver);
        Self::with_registry(marker, config, registry)
    }

    /// Engine with a caller-assembled resolver registry. The registry is initialized here.
    pub fn with_registry(
        marker: impl TestMarker + 'static,
        config: EngineConfig,
        mut registry: TestResolverRegistry,
    ) -> Result<Self, InvariantViolation> {
        registry.initialize()?;
        Ok(Self {
            marker: Box::new(marker),
            config,
            registry,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &TestResolverRegistry {
        &self.registry
    }

    pub fn marker(&self) -> &dyn TestMarker {
        self.marker.as_ref()
    }

    /// Build the descriptor tree for `request`, then apply the configured filters.
    #[tracing::instrument(skip_all, fields(engine = %self.config.engine_id, selectors = request.selectors().len()))]
    pub fn discover(&self, request: &DiscoveryRequest) -> Result<Discovery, InvariantViolation> {
        let mut session = DiscoverySession::new(&self.config.engine_id, self.marker.as_ref());
        let root = session.root();
        self.registry.notify_resolvers(root, request, &mut session)?;
        let (mut tree, report) = session.finish();
        let filtered = filter::apply(&mut tree, &self.config)?;
        tracing::debug!(
            nodes = tree.node_count(),
            unmatched = report.unmatched().len(),
            failures = report.failures().len(),
            "discovery finished"
        );
        Ok(Discovery { tree, report, filtered })
    }

    /// Execute a discovered tree, reporting every lifecycle transition to `sink`.
    pub fn execute(&self, tree: &DescriptorTree, sink: &mut dyn EventSink) -> Result<ExecutionSummary, InvariantViolation> {
        execution::execute(tree, self.marker.as_ref(), &self.config, sink)
    }

    /// Discover and execute in one go.
    pub fn run(
        &self,
        request: &DiscoveryRequest,
        sink: &mut dyn EventSink,
    ) -> Result<(Discovery, ExecutionSummary), InvariantViolation> {
        let discovery = self.discover(request)?;
        let summary = self.execute(&discovery.tree, sink)?;
        Ok((discovery, summary))
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::discovery::Selector;
    use crate::marker::{ContainerSpec, TestCatalog};
    use trellis_core::EventRecorder;

    fn catalog() -> TestCatalog {
        TestCatalog::new().container(ContainerSpec::new("A").test("t", |_| Ok(())))
    }

    #[test]
    fn test_builtin_resolver_order() {
        let engine = Engine::new(catalog(), EngineConfig::new()).unwrap();
        assert_eq!(
            engine.registry().names(),
            vec![ContainerResolver::NAME, MemberResolver::NAME, UniqueIdResolver::NAME]
        );
        assert!(engine.registry().is_initialized());
    }

    #[test]
    fn test_preinitialized_registry_is_rejected() {
        let mut registry = TestResolverRegistry::new();
        registry.initialize().unwrap();
        let err = Engine::with_registry(catalog(), EngineConfig::new(), registry).unwrap_err();
        assert_eq!(err, InvariantViolation::RegistryInitializedTwice);
    }

    #[test]
    fn test_run_discovers_then_executes() {
        let engine = Engine::new(catalog(), EngineConfig::new()).unwrap();
        let mut recorder = EventRecorder::new();
        let request = DiscoveryRequest::new().select(Selector::container("A"));
        let (discovery, summary) = engine.run(&request, &mut recorder).unwrap();
        assert_eq!(discovery.tree.node_count(), 3);
        assert!(discovery.report.is_clean());
        assert_eq!(summary.test_counts.succeeded, 1);
        assert!(summary.is_success());
        assert!(recorder.verify().is_ok());
    }
}
