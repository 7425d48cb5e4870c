//! Post-discovery filtering and pruning.
//!
//! Both passes run as tree visitors, so removals go through the traversal's removal request and never disturb
//! sibling iteration.

use trellis_core::{DescriptorTree, InvariantViolation, NodeId, RemovalRequest};

use crate::config::EngineConfig;

/// What the filter passes removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub tests_removed: usize,
    pub containers_pruned: usize,
}

/// Remove tests `config` does not admit, then prune containers left without tests.
///
/// Containers carrying discovery-failure markers are kept even when empty, so the failure stays reportable.
pub fn apply(tree: &mut DescriptorTree, config: &EngineConfig) -> Result<FilterStats, InvariantViolation> {
    let mut stats = FilterStats::default();
    let root = tree.root();

    if config.has_filters() {
        let mut filter = |tree: &DescriptorTree, node: NodeId, removal: &mut RemovalRequest| {
            let Some(descriptor) = tree.get(node) else { return };
            if descriptor.is_test() && !config.admits(descriptor) {
                tracing::trace!(unique_id = %descriptor.unique_id(), "filtered out");
                stats.tests_removed += 1;
                removal.remove();
            }
        };
        tree.accept(root, &mut filter)?;
    }

    let mut prune = |tree: &DescriptorTree, node: NodeId, removal: &mut RemovalRequest| {
        let Some(descriptor) = tree.get(node) else { return };
        if tree.is_root(node) || !descriptor.is_container() || has_tests_or_failures(tree, node) {
            return;
        }
        tracing::trace!(unique_id = %descriptor.unique_id(), "pruned empty container");
        stats.containers_pruned += 1;
        removal.remove();
    };
    tree.accept(root, &mut prune)?;

    tracing::debug!(
        tests_removed = stats.tests_removed,
        containers_pruned = stats.containers_pruned,
        "applied discovery filters"
    );
    Ok(stats)
}

fn has_tests_or_failures(tree: &DescriptorTree, node: NodeId) -> bool {
    !tree.discovery_failures(node).is_empty()
        || tree
            .descendants(node)
            .into_iter()
            .any(|d| tree.get(d).is_some_and(|x| x.is_test()) || !tree.discovery_failures(d).is_empty())
}
