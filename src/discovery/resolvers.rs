//! The built-in resolvers.
//!
//! Ids are derived from the marker's names: `engine:<id>`, then `container:<outermost>`, then one
//! `nested-container:<name>` per nesting level, then `member:<signature>` for tests. Because signatures include
//! parameter types, overloads get distinct ids.

use std::any::Any;
use std::collections::HashSet;

use trellis_core::{DescriptorKind, NodeId, TestDescriptor, TestSource, UniqueId};

use super::registry::{TestResolver, TestResolverRegistry};
use super::selector::Selector;
use super::session::{DiscoverySession, SelectorOutcome};
use super::{CONTAINER_SEGMENT, DiscoveryError, MEMBER_SEGMENT, NESTED_CONTAINER_SEGMENT};
use crate::marker::{MemberInfo, TestMarker};

// ============================================================================
// Containers
// ============================================================================

/// Resolves [`Selector::Container`]: the container node, its enclosing chain, its tests and nested containers.
#[derive(Debug, Default)]
pub struct ContainerResolver;

impl ContainerResolver {
    pub const NAME: &'static str = "ContainerResolver";

    /// Ensure `container` and every container enclosing it are in the tree; returns the container's node.
    ///
    /// Returns `None` when `container` holds no tests.
    pub fn ensure_container(
        &self,
        container: &str,
        session: &mut DiscoverySession<'_>,
    ) -> Result<Option<NodeId>, DiscoveryError> {
        let marker = session.marker();
        if !marker.is_test_container(container)? {
            return Ok(None);
        }

        // Innermost first.
        let mut chain = vec![container.to_string()];
        let mut seen: HashSet<String> = HashSet::from([container.to_string()]);
        while let Some(outer) = chain.last().and_then(|inner| marker.enclosing_container(inner)) {
            if !seen.insert(outer.clone()) {
                return Err(DiscoveryError::EnclosingCycle { container: outer });
            }
            chain.push(outer);
        }

        let mut parent = session.root();
        for (depth, name) in chain.iter().rev().enumerate() {
            let kind = if depth == 0 {
                CONTAINER_SEGMENT
            } else {
                NESTED_CONTAINER_SEGMENT
            };
            let id = session.tree().descriptor(parent)?.unique_id().append(kind, name.as_str());
            let descriptor = TestDescriptor::new(id, marker.container_display_name(name), DescriptorKind::Container)
                .with_source(TestSource::container(name.as_str()))
                .with_tags(marker.tags(name, None));
            parent = session.tree_mut().add_child(parent, descriptor)?;
        }
        Ok(Some(parent))
    }

    /// Attach every test member of `container` and resolve its nested containers under `node`.
    fn expand(
        &self,
        container: &str,
        node: NodeId,
        registry: &TestResolverRegistry,
        session: &mut DiscoverySession<'_>,
    ) -> Result<(), DiscoveryError> {
        let marker = session.marker();
        let members = registry
            .lookup_test_resolver::<MemberResolver>()
            .ok_or(DiscoveryError::MissingResolver {
                name: MemberResolver::NAME,
            })?;

        for member in marker.members(container)? {
            if marker.is_test(container, &member.signature()) {
                members.attach_member(container, node, &member, session)?;
            }
        }

        // Nested containers go through the registry so a failure stays scoped to its own branch.
        for nested in marker.nested_containers(container)? {
            let outcome = registry.resolve_selector(&Selector::Container(nested.clone()), node, session)?;
            if outcome == SelectorOutcome::Unmatched {
                tracing::trace!(container, nested = %nested, "nested container holds no tests");
            }
        }
        Ok(())
    }
}

impl TestResolver for ContainerResolver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn supports(&self, selector: &Selector) -> bool {
        matches!(selector, Selector::Container(_))
    }

    fn resolve(
        &self,
        selector: &Selector,
        _parent: NodeId,
        registry: &TestResolverRegistry,
        session: &mut DiscoverySession<'_>,
    ) -> Result<bool, DiscoveryError> {
        let Selector::Container(container) = selector else {
            return Ok(false);
        };
        let Some(node) = self.ensure_container(container, session)? else {
            return Ok(false);
        };
        self.expand(container, node, registry, session)?;
        Ok(true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Members
// ============================================================================

/// Resolves [`Selector::Member`]: one test plus the container chain it lives in.
#[derive(Debug, Default)]
pub struct MemberResolver;

impl MemberResolver {
    pub const NAME: &'static str = "MemberResolver";

    /// Attach `member` under the container node `container_node`; merges when it is already present.
    pub fn attach_member(
        &self,
        container: &str,
        container_node: NodeId,
        member: &MemberInfo,
        session: &mut DiscoverySession<'_>,
    ) -> Result<NodeId, DiscoveryError> {
        let marker = session.marker();
        let signature = member.signature();
        let id = session
            .tree()
            .descriptor(container_node)?
            .unique_id()
            .append(MEMBER_SEGMENT, signature.as_str());
        let descriptor = TestDescriptor::new(id, marker.member_display_name(container, member), DescriptorKind::Test)
            .with_source(TestSource::member(container, signature.as_str()))
            .with_tags(marker.tags(container, Some(signature.as_str())));
        Ok(session.tree_mut().add_child(container_node, descriptor)?)
    }
}

impl TestResolver for MemberResolver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn supports(&self, selector: &Selector) -> bool {
        matches!(selector, Selector::Member { .. })
    }

    fn resolve(
        &self,
        selector: &Selector,
        _parent: NodeId,
        registry: &TestResolverRegistry,
        session: &mut DiscoverySession<'_>,
    ) -> Result<bool, DiscoveryError> {
        let Selector::Member { container, signature } = selector else {
            return Ok(false);
        };
        let marker = session.marker();
        let member = marker
            .members(container)?
            .into_iter()
            .find(|m| &m.signature() == signature && marker.is_test(container, signature));
        let Some(member) = member else {
            return Ok(false);
        };

        let containers = registry
            .lookup_test_resolver::<ContainerResolver>()
            .ok_or(DiscoveryError::MissingResolver {
                name: ContainerResolver::NAME,
            })?;
        let Some(container_node) = containers.ensure_container(container, session)? else {
            return Ok(false);
        };
        self.attach_member(container, container_node, &member, session)?;
        Ok(true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Unique ids
// ============================================================================

/// Resolves [`Selector::UniqueId`] by translating the id back into a container or member selector.
#[derive(Debug, Default)]
pub struct UniqueIdResolver;

impl UniqueIdResolver {
    pub const NAME: &'static str = "UniqueIdResolver";

    /// Translate `unique_id` into a selector plus the container chain it names, outermost first.
    fn translate(unique_id: &UniqueId) -> Result<Option<(Selector, Vec<&str>)>, DiscoveryError> {
        let mut containers = Vec::new();
        let mut selector = None;
        for segment in unique_id.segments().iter().skip(1) {
            if selector.is_some() {
                // Nothing lives below a member.
                return Ok(None);
            }
            match segment.kind() {
                CONTAINER_SEGMENT if containers.is_empty() => containers.push(segment.value()),
                NESTED_CONTAINER_SEGMENT if !containers.is_empty() => containers.push(segment.value()),
                MEMBER_SEGMENT => match containers.last() {
                    Some(c) => selector = Some(Selector::member(*c, segment.value())),
                    None => return Ok(None),
                },
                CONTAINER_SEGMENT | NESTED_CONTAINER_SEGMENT => return Ok(None),
                other => {
                    return Err(DiscoveryError::UnknownSegment {
                        unique_id: unique_id.to_string(),
                        kind: other.to_string(),
                    });
                }
            }
        }
        let selector = selector.or_else(|| containers.last().map(|c| Selector::container(*c)));
        Ok(selector.map(|s| (s, containers)))
    }

    /// Whether the marker nests `chain` (outermost first) exactly as the id claims.
    fn chain_matches(chain: &[&str], marker: &dyn TestMarker) -> bool {
        let mut expected: Option<&str> = None;
        for name in chain {
            if marker.enclosing_container(name).as_deref() != expected {
                return false;
            }
            expected = Some(*name);
        }
        true
    }
}

impl TestResolver for UniqueIdResolver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn supports(&self, selector: &Selector) -> bool {
        matches!(selector, Selector::UniqueId(_))
    }

    fn resolve(
        &self,
        selector: &Selector,
        parent: NodeId,
        registry: &TestResolverRegistry,
        session: &mut DiscoverySession<'_>,
    ) -> Result<bool, DiscoveryError> {
        let Selector::UniqueId(serialized) = selector else {
            return Ok(false);
        };
        let unique_id = UniqueId::parse(serialized)?;

        let root_id = session.tree().descriptor(session.root())?.unique_id().clone();
        if !root_id.is_prefix_of(&unique_id) {
            tracing::debug!(%unique_id, engine = %root_id, "unique id belongs to another engine");
            return Ok(false);
        }
        if unique_id == root_id {
            return Ok(true);
        }

        let Some((translated, chain)) = Self::translate(&unique_id)? else {
            return Ok(false);
        };
        if !Self::chain_matches(&chain, session.marker()) {
            tracing::debug!(%unique_id, "unique id does not match the container nesting");
            return Ok(false);
        }
        tracing::trace!(%unique_id, selector = %translated, "translated unique id");
        registry.resolve_selector(&translated, parent, session)?;
        Ok(session.tree().lookup(&unique_id).is_some())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
