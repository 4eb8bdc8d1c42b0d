//! Parent-pointer arena of view nodes
//!
//! The tree mirrors the structure of the rendered UI without owning any native view. Each node
//! may carry one declared [`Context`] plus the context handed over by navigation, and the tree
//! is what scope resolution walks.

use std::fmt;

use crate::context::{is_reserved, Context, NAVIGATION_CONTEXT_ID};
use crate::error::{Error, ErrorKind};
use crate::json::DynamicValue;
use crate::result::Result;

/// Handle to a node of the [`Tree`]
///
/// Handles are generational: once a node is removed its handle never refers to another node,
/// even if the slot gets reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Default)]
struct NodeData {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    context: Option<Context>,
    navigation: Option<Context>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<NodeData>,
}

#[derive(Debug, Default)]
pub struct Tree {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, data: NodeData) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation += 1;
            slot.node = Some(data);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(data),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn existing_mut(&mut self, id: NodeId) -> Result<&mut NodeData> {
        self.node_mut(id).ok_or_else(|| Error::node_not_found(id))
    }

    /// Create a node without a parent
    pub fn create_root(&mut self) -> NodeId {
        self.insert(NodeData::default())
    }

    /// Create a node as the last child of `parent`
    pub fn add_child(&mut self, parent: NodeId) -> Result<NodeId> {
        if !self.contains(parent) {
            return Err(Error::node_not_found(parent));
        }
        let child = self.insert(NodeData {
            parent: Some(parent),
            ..Default::default()
        });
        self.existing_mut(parent)?.children.push(child);
        Ok(child)
    }

    /// Returns true if the handle refers to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    /// Iterate from `id` up to its root, `id` included
    ///
    /// The iterator is empty if the node does not exist.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.contains(id).then_some(id),
        }
    }

    /// Attach a context to a node
    ///
    /// Fails if the node already declares a context or if the id is reserved.
    pub fn declare_context(&mut self, id: NodeId, context: Context) -> Result<()> {
        if is_reserved(&context.id) {
            return Err(Error::new(
                ErrorKind::ReservedContext,
                format!("context id '{}' cannot be declared by a node", context.id),
            ));
        }
        let node = self.existing_mut(id)?;
        if let Some(existing) = &node.context {
            return Err(Error::new(
                ErrorKind::ContextAlreadyDeclared,
                format!("node {id} already declares context '{}'", existing.id),
            ));
        }
        node.context = Some(context);
        Ok(())
    }

    /// Returns the context with the given id owned by the node, if any
    pub fn context(&self, id: NodeId, context_id: &str) -> Option<&Context> {
        let node = self.node(id)?;
        if context_id == NAVIGATION_CONTEXT_ID {
            return node.navigation.as_ref();
        }
        node.context.as_ref().filter(|c| c.id == context_id)
    }

    /// Returns the value of the context owned by the node for mutation
    pub(crate) fn context_value_mut(
        &mut self,
        id: NodeId,
        context_id: &str,
    ) -> Option<&mut DynamicValue> {
        let node = self.node_mut(id)?;
        let context = if context_id == NAVIGATION_CONTEXT_ID {
            node.navigation.as_mut()
        } else {
            node.context.as_mut().filter(|c| c.id == context_id)
        };
        context.map(|c| &mut c.value)
    }

    /// Returns the navigation context slot of a node, creating an empty context if needed
    pub(crate) fn navigation_context_mut(&mut self, id: NodeId) -> Result<&mut DynamicValue> {
        let node = self.existing_mut(id)?;
        let context = node
            .navigation
            .get_or_insert_with(|| Context::new(NAVIGATION_CONTEXT_ID, DynamicValue::Null));
        Ok(&mut context.value)
    }

    /// List a node and all its descendants, descendants first
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        if !self.contains(id) {
            return nodes;
        }

        let mut pending = vec![(id, false)];
        while let Some((current, visited)) = pending.pop() {
            if visited {
                nodes.push(current);
                continue;
            }
            pending.push((current, true));
            for child in self.children(current).iter().rev() {
                pending.push((*child, false));
            }
        }
        nodes
    }

    /// Remove a node together with its whole subtree
    ///
    /// Returns the removed handles, descendants first. Removing a missing node returns an
    /// empty list.
    pub fn remove(&mut self, id: NodeId) -> Vec<NodeId> {
        let removed = self.subtree(id);
        if let Some(parent) = self.parent(id).and_then(|p| self.node_mut(p)) {
            parent.children.retain(|child| *child != id);
        }
        for node in removed.iter() {
            if let Some(slot) = self.slots.get_mut(node.index as usize) {
                slot.node = None;
                self.free.push(node.index);
            }
        }
        removed
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Iterator over a node and its ancestors, see [`Tree::ancestors`]
pub struct Ancestors<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn it_walks_ancestors_from_self_to_root() {
        let mut tree = Tree::new();
        let root = tree.create_root();
        let child = tree.add_child(root).unwrap();
        let grandchild = tree.add_child(child).unwrap();

        assert_eq!(
            tree.ancestors(grandchild).collect::<Vec<_>>(),
            vec![grandchild, child, root]
        );
        assert_eq!(tree.parent(root), None);
    }

    #[test]
    fn it_removes_whole_subtrees() {
        let mut tree = Tree::new();
        let root = tree.create_root();
        let a = tree.add_child(root).unwrap();
        let b = tree.add_child(a).unwrap();
        let c = tree.add_child(root).unwrap();

        assert_eq!(tree.remove(a), vec![b, a]);
        assert!(!tree.contains(a));
        assert!(!tree.contains(b));
        assert_eq!(tree.children(root), &[c]);
        assert_eq!(tree.len(), 2);

        // removing again is harmless
        assert_eq!(tree.remove(a), vec![]);
    }

    #[test]
    fn it_does_not_reuse_handles_of_removed_nodes() {
        let mut tree = Tree::new();
        let old = tree.create_root();
        tree.remove(old);
        let new = tree.create_root();

        assert_ne!(old, new);
        assert!(!tree.contains(old));
        assert!(tree.ancestors(old).next().is_none());
    }

    #[test]
    fn it_allows_a_single_declared_context() {
        let mut tree = Tree::new();
        let root = tree.create_root();
        tree.declare_context(root, Context::new("x", 1)).unwrap();

        let err = tree.declare_context(root, Context::new("y", 2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContextAlreadyDeclared);
        assert_eq!(
            tree.context(root, "x").map(|c| &c.value),
            Some(&DynamicValue::Int(1))
        );
        assert!(tree.context(root, "y").is_none());
    }

    #[test]
    fn it_rejects_reserved_context_ids() {
        let mut tree = Tree::new();
        let root = tree.create_root();
        for id in ["global", "navigationContext"] {
            let err = tree.declare_context(root, Context::new(id, 1)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ReservedContext);
        }
    }

    #[test]
    fn it_keeps_the_navigation_context_next_to_the_declared_one() {
        let mut tree = Tree::new();
        let root = tree.create_root();
        tree.declare_context(root, Context::new("x", 1)).unwrap();
        *tree.navigation_context_mut(root).unwrap() = DynamicValue::from("neo");

        assert_eq!(
            tree.context(root, NAVIGATION_CONTEXT_ID).map(|c| &c.value),
            Some(&DynamicValue::from("neo"))
        );
        assert!(tree.context(root, "x").is_some());
    }

    #[test]
    fn it_fails_to_add_children_to_missing_nodes() {
        let mut tree = Tree::new();
        let root = tree.create_root();
        tree.remove(root);
        let err = tree.add_child(root).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NodeNotFound);
    }
}
