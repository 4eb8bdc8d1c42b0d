use std::collections::HashMap;

use super::{Context, ContextLocation, GLOBAL_CONTEXT_ID};
use crate::expression::Resolver;
use crate::json::DynamicValue;
use crate::tree::{NodeId, Tree};

/// Find the context instance that answers `id` when looked up from `from`
///
/// The walk starts at `from` itself and moves outward, so the nearest declaration wins. The
/// global context is only reachable through its reserved id.
pub fn resolve_location(tree: &Tree, id: &str, from: NodeId) -> Option<ContextLocation> {
    if id == GLOBAL_CONTEXT_ID {
        return Some(ContextLocation::Global);
    }
    tree.ancestors(from)
        .find(|node| tree.context(*node, id).is_some())
        .map(ContextLocation::Node)
}

/// Memoized resolution of a single context id for many nodes
///
/// Every node visited on a walk is cached with the location found, so resolving a whole
/// subtree visits each node once.
pub(crate) struct Resolutions<'a> {
    tree: &'a Tree,
    id: &'a str,
    cache: HashMap<NodeId, Option<ContextLocation>>,
}

impl<'a> Resolutions<'a> {
    pub fn new(tree: &'a Tree, id: &'a str) -> Self {
        Self {
            tree,
            id,
            cache: HashMap::new(),
        }
    }

    pub fn location(&mut self, from: NodeId) -> Option<ContextLocation> {
        if self.id == GLOBAL_CONTEXT_ID {
            return Some(ContextLocation::Global);
        }

        let mut walked = Vec::new();
        let mut found = None;
        for node in self.tree.ancestors(from) {
            if let Some(cached) = self.cache.get(&node) {
                found = Some(*cached);
                break;
            }
            walked.push(node);
            if self.tree.context(node, self.id).is_some() {
                found = Some(Some(ContextLocation::Node(node)));
                break;
            }
        }

        let location = found.flatten();
        for node in walked {
            self.cache.insert(node, location);
        }
        location
    }
}

/// The set of contexts visible from a node
///
/// Implicit contexts, such as the value of the event that triggered an action, are looked up
/// before the tree.
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    tree: &'a Tree,
    global: &'a DynamicValue,
    node: NodeId,
    implicit: &'a [Context],
}

impl<'a> Scope<'a> {
    pub fn new(tree: &'a Tree, global: &'a DynamicValue, node: NodeId) -> Self {
        Self {
            tree,
            global,
            node,
            implicit: &[],
        }
    }

    pub fn with_implicit(self, implicit: &'a [Context]) -> Self {
        Self { implicit, ..self }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Find the context answering `id`, see [`resolve_location`]
    pub fn location(&self, id: &str) -> Option<ContextLocation> {
        resolve_location(self.tree, id, self.node)
    }

    /// Value of the context `id`, borrowed from the tree rather than the scope
    pub fn get(&self, id: &str) -> Option<&'a DynamicValue> {
        if let Some(context) = self.implicit.iter().find(|c| c.id == id) {
            return Some(&context.value);
        }
        match self.location(id)? {
            ContextLocation::Global => Some(self.global),
            ContextLocation::Node(node) => self.tree.context(node, id).map(|c| &c.value),
        }
    }
}

impl Resolver for Scope<'_> {
    fn resolve(&self, id: &str) -> Option<&DynamicValue> {
        self.get(id)
    }
}
