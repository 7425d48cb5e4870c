//! The descriptor tree: an arena of parent-linked, addressable nodes.
//!
//! ## Ownership
//!
//! The tree exclusively owns every [`TestDescriptor`]. Nodes are addressed by [`NodeId`], an index into the arena;
//! a node's parent link is just another `NodeId` (lookup only, never owning). Ids are never reused, so a `NodeId`
//! that outlives its node stays dangling instead of silently aliasing a newer node.
//!
//! ## Policies
//!
//! - **Duplicate add merges.** Adding a descriptor whose [`UniqueId`] is already live anywhere in the tree inserts
//!   nothing and returns the existing node.
//! - **Not-found removal is a no-op.** [`DescriptorTree::remove_child`] returns `Ok(None)` when the child is not
//!   attached to the given parent.
//! - **The root is never removable.** Any attempt yields [`InvariantViolation::RootRemoval`].
//!
//! Detaching a node removes it from its parent's children and clears its own children; the descendants are
//! discarded with the subtree and can no longer be found or visited.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::descriptor::TestDescriptor;
use crate::errors::InvariantViolation;
use crate::unique_id::UniqueId;

/// Index of a node inside a [`DescriptorTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A resolver failure recorded on the node it was resolving under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryFailure {
    /// Rendered selector that was being resolved.
    pub selector: String,
    /// Diagnostic code of the underlying error, if it had one.
    pub code: Option<String>,
    pub message: String,
}

#[derive(Debug)]
struct Slot {
    descriptor: TestDescriptor,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    failures: Vec<DiscoveryFailure>,
}

impl Slot {
    fn new(descriptor: TestDescriptor, parent: Option<NodeId>) -> Self {
        Self {
            descriptor,
            parent,
            children: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Zero-argument "remove this node" capability handed to a [`Visitor`].
///
/// The visitor never mutates the tree itself. The traversal honours the request at the safe point between
/// visiting the node and visiting its children.
#[derive(Debug, Default)]
pub struct RemovalRequest {
    requested: bool,
}

impl RemovalRequest {
    pub fn remove(&mut self) {
        self.requested = true;
    }

    pub fn is_requested(&self) -> bool {
        self.requested
    }
}

/// Pre-order visitor for [`DescriptorTree::accept`].
pub trait Visitor {
    fn visit(&mut self, tree: &DescriptorTree, node: NodeId, removal: &mut RemovalRequest);
}

impl<F> Visitor for F
where
    F: FnMut(&DescriptorTree, NodeId, &mut RemovalRequest),
{
    fn visit(&mut self, tree: &DescriptorTree, node: NodeId, removal: &mut RemovalRequest) {
        self(tree, node, removal)
    }
}

/// Arena-backed, rooted n-ary tree of [`TestDescriptor`]s.
///
/// `slots` only grows: a removed node leaves a `None` tombstone, so a [`NodeId`] is never reused and a stale id can
/// never alias a newer node. A tree lives for one discovery and execution run.
#[derive(Debug)]
pub struct DescriptorTree {
    slots: Vec<Option<Slot>>,
    index: HashMap<UniqueId, NodeId>,
    root: NodeId,
}

impl DescriptorTree {
    /// Create a tree holding only `root`.
    pub fn new(root: TestDescriptor) -> Self {
        let root_id = NodeId(0);
        let mut index = HashMap::new();
        index.insert(root.unique_id().clone(), root_id);
        Self {
            slots: vec![Some(Slot::new(root, None))],
            index,
            root: root_id,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn is_root(&self, node: NodeId) -> bool {
        node == self.root
    }

    /// Whether `node` is live (not removed, not discarded with a removed subtree).
    pub fn contains(&self, node: NodeId) -> bool {
        self.slot(node).is_some()
    }

    /// Number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.index.len()
    }

    pub fn get(&self, node: NodeId) -> Option<&TestDescriptor> {
        self.slot(node).map(|slot| &slot.descriptor)
    }

    pub fn descriptor(&self, node: NodeId) -> Result<&TestDescriptor, InvariantViolation> {
        self.get(node).ok_or(InvariantViolation::UnknownNode(node))
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.slot(node).and_then(|slot| slot.parent)
    }

    /// Children in insertion order; empty for unknown nodes.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.slot(node).map(|slot| slot.children.as_slice()).unwrap_or(&[])
    }

    /// Constant-time lookup through the identity index.
    pub fn lookup(&self, unique_id: &UniqueId) -> Option<NodeId> {
        self.index.get(unique_id).copied()
    }

    /// Attach `descriptor` as the last child of `parent`.
    ///
    /// Returns the new node, or the existing node when a descriptor with the same id is already live.
    pub fn add_child(&mut self, parent: NodeId, descriptor: TestDescriptor) -> Result<NodeId, InvariantViolation> {
        if !self.contains(parent) {
            return Err(InvariantViolation::UnknownNode(parent));
        }
        if let Some(existing) = self.lookup(descriptor.unique_id()) {
            tracing::trace!(unique_id = %descriptor.unique_id(), "merged duplicate descriptor");
            return Ok(existing);
        }

        let node = NodeId(self.slots.len());
        self.index.insert(descriptor.unique_id().clone(), node);
        self.slots.push(Some(Slot::new(descriptor, Some(parent))));
        self.slot_mut(parent)?.children.push(node);
        Ok(node)
    }

    /// Detach `child` from `parent`, discarding the child's subtree.
    ///
    /// Returns the detached descriptor, or `None` when `child` is not a child of `parent`.
    pub fn remove_child(
        &mut self,
        parent: NodeId,
        child: NodeId,
    ) -> Result<Option<TestDescriptor>, InvariantViolation> {
        let siblings = &mut self.slot_mut(parent)?.children;
        let Some(position) = siblings.iter().position(|c| *c == child) else {
            return Ok(None);
        };
        siblings.remove(position);
        Ok(Some(self.discard(child)))
    }

    /// Detach `node` from its parent. Fails for the root.
    pub fn remove_from_hierarchy(&mut self, node: NodeId) -> Result<TestDescriptor, InvariantViolation> {
        let descriptor = self.descriptor(node)?;
        let Some(parent) = self.parent(node) else {
            return Err(InvariantViolation::RootRemoval(descriptor.unique_id().clone()));
        };
        self.remove_child(parent, node)?
            .ok_or(InvariantViolation::UnknownNode(node))
    }

    /// Depth-first, pre-order search below (and including) `start`.
    pub fn find_by_unique_id(&self, start: NodeId, unique_id: &UniqueId) -> Option<NodeId> {
        let slot = self.slot(start)?;
        if slot.descriptor.unique_id() == unique_id {
            return Some(start);
        }
        slot.children
            .iter()
            .find_map(|child| self.find_by_unique_id(*child, unique_id))
    }

    /// All nodes below `start` in pre-order, excluding `start`.
    pub fn descendants(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(start).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Pre-order traversal starting at `start`.
    ///
    /// Each node is visited before its children. If the visitor requests removal, the node is detached right
    /// after its visit and its children are not visited. Children are iterated from a snapshot, so removals never
    /// disturb sibling iteration.
    pub fn accept<V>(&mut self, start: NodeId, visitor: &mut V) -> Result<(), InvariantViolation>
    where
        V: Visitor + ?Sized,
    {
        if !self.contains(start) {
            return Err(InvariantViolation::UnknownNode(start));
        }
        self.accept_node(start, visitor)
    }

    fn accept_node<V>(&mut self, node: NodeId, visitor: &mut V) -> Result<(), InvariantViolation>
    where
        V: Visitor + ?Sized,
    {
        let mut removal = RemovalRequest::default();
        visitor.visit(self, node, &mut removal);
        if removal.is_requested() {
            self.remove_from_hierarchy(node)?;
            return Ok(());
        }

        let snapshot = self.children(node).to_vec();
        for child in snapshot {
            if self.contains(child) {
                self.accept_node(child, visitor)?;
            }
        }
        Ok(())
    }

    pub fn mark_discovery_failure(
        &mut self,
        node: NodeId,
        failure: DiscoveryFailure,
    ) -> Result<(), InvariantViolation> {
        self.slot_mut(node)?.failures.push(failure);
        Ok(())
    }

    pub fn discovery_failures(&self, node: NodeId) -> &[DiscoveryFailure] {
        self.slot(node).map(|slot| slot.failures.as_slice()).unwrap_or(&[])
    }

    /// Indented outline of display names, one node per line.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![(self.root, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            if let Some(descriptor) = self.get(node) {
                let _ = writeln!(out, "{}{}", "  ".repeat(depth), descriptor.display_name());
            }
            stack.extend(self.children(node).iter().rev().map(|child| (*child, depth + 1)));
        }
        out
    }

    fn slot(&self, node: NodeId) -> Option<&Slot> {
        self.slots.get(node.0).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, node: NodeId) -> Result<&mut Slot, InvariantViolation> {
        self.slots
            .get_mut(node.0)
            .and_then(Option::as_mut)
            .ok_or(InvariantViolation::UnknownNode(node))
    }

    /// Free `node` and everything below it. The caller has already unlinked `node` from its parent.
    fn discard(&mut self, node: NodeId) -> TestDescriptor {
        let mut pending = vec![node];
        let mut detached = None;
        while let Some(current) = pending.pop() {
            let Some(slot) = self.slots.get_mut(current.0).and_then(Option::take) else {
                continue;
            };
            self.index.remove(slot.descriptor.unique_id());
            pending.extend(slot.children);
            if current == node {
                detached = Some(slot.descriptor);
            } else {
                tracing::trace!(unique_id = %slot.descriptor.unique_id(), "discarded with removed subtree");
            }
        }
        // `node` was live when unlinked, so its slot was taken above.
        detached.unwrap_or_else(|| unreachable!("INVARIANT: discarded node {node:?} had no slot"))
    }
}
