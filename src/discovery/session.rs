//! State of one discovery run.

use std::collections::HashMap;

use trellis_core::{DescriptorTree, DiscoveryFailure, InvariantViolation, NodeId, TestDescriptor};

use super::DiscoveryError;
use super::selector::Selector;
use crate::marker::TestMarker;

/// What became of a selector handed to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorOutcome {
    /// At least one node was attached (or merged) for it.
    Resolved,
    /// No resolver produced anything for it.
    Unmatched,
    /// A resolver failed; the failure is recorded on the parent node and in the report.
    Failed,
}

/// Non-fatal problems found while resolving a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    unmatched: Vec<Selector>,
    failures: Vec<DiscoveryFailure>,
}

impl DiscoveryReport {
    /// Top-level selectors nothing was found for, in request order.
    pub fn unmatched(&self) -> &[Selector] {
        &self.unmatched
    }

    pub fn failures(&self) -> &[DiscoveryFailure] {
        &self.failures
    }

    pub fn is_clean(&self) -> bool {
        self.unmatched.is_empty() && self.failures.is_empty()
    }

    /// Human-readable summary, one line per problem.
    pub fn messages(&self) -> Vec<String> {
        let unmatched = self.unmatched.iter().map(|s| format!("nothing found for selector {s}"));
        let failures = self
            .failures
            .iter()
            .map(|f| format!("failed to resolve {}: {}", f.selector, f.message));
        unmatched.chain(failures).collect()
    }
}

/// Tree under construction plus everything resolvers share while building it.
///
/// Created per request and consumed by [`DiscoverySession::finish`].
pub struct DiscoverySession<'m> {
    tree: DescriptorTree,
    marker: &'m dyn TestMarker,
    outcomes: HashMap<Selector, SelectorOutcome>,
    report: DiscoveryReport,
}

impl<'m> DiscoverySession<'m> {
    pub fn new(engine_id: &str, marker: &'m dyn TestMarker) -> Self {
        Self {
            tree: DescriptorTree::new(TestDescriptor::engine(engine_id)),
            marker,
            outcomes: HashMap::new(),
            report: DiscoveryReport::default(),
        }
    }

    pub fn tree(&self) -> &DescriptorTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut DescriptorTree {
        &mut self.tree
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// The marker outlives the session, so resolvers can hold on to it while mutating the tree.
    pub fn marker(&self) -> &'m dyn TestMarker {
        self.marker
    }

    pub fn outcome(&self, selector: &Selector) -> Option<SelectorOutcome> {
        self.outcomes.get(selector).copied()
    }

    pub(crate) fn record_outcome(&mut self, selector: &Selector, outcome: SelectorOutcome) {
        self.outcomes.insert(selector.clone(), outcome);
    }

    pub(crate) fn record_unmatched(&mut self, selector: &Selector) {
        tracing::warn!(%selector, "nothing found for selector");
        self.report.unmatched.push(selector.clone());
    }

    /// Attach `error` to `parent` as a discovery-failure marker and add it to the report.
    pub(crate) fn record_failure(
        &mut self,
        parent: NodeId,
        selector: &Selector,
        error: &DiscoveryError,
    ) -> Result<(), InvariantViolation> {
        tracing::warn!(%selector, error = %error, "resolver failed");
        let failure = DiscoveryFailure {
            selector: selector.to_string(),
            code: miette::Diagnostic::code(error).map(|c| c.to_string()),
            message: error.to_string(),
        };
        self.tree.mark_discovery_failure(parent, failure.clone())?;
        self.report.failures.push(failure);
        Ok(())
    }

    pub fn finish(self) -> (DescriptorTree, DiscoveryReport) {
        (self.tree, self.report)
    }
}
