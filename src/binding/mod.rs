//! Subscription registry and update propagation
//!
//! A subscription ties a parsed [`Template`] to the node that displays it and to a callback
//! that receives every new value. Subscriptions are indexed by the context ids their template
//! reads, so a mutation only re-evaluates the templates that may have changed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{instrument, trace};

use crate::context::{ContextLocation, Resolutions, Scope};
use crate::expression::Template;
use crate::json::DynamicValue;
use crate::tree::{NodeId, Tree};

/// Callback receiving the new value of a bound template
pub type Callback = Box<dyn FnMut(&DynamicValue)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Subscription {
    node: NodeId,
    template: Arc<Template>,
    /// last value delivered to the callback
    last: DynamicValue,
    on_update: Callback,
}

#[derive(Default)]
pub struct Subscriptions {
    next_id: u64,
    by_id: HashMap<SubscriptionId, Subscription>,
    by_context: HashMap<String, Vec<SubscriptionId>>,
    by_node: HashMap<NodeId, Vec<SubscriptionId>>,
}

impl fmt::Debug for Subscriptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriptions")
            .field("len", &self.by_id.len())
            .finish()
    }
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Number of live subscriptions owned by a node
    pub fn count(&self, node: NodeId) -> usize {
        self.by_node.get(&node).map(Vec::len).unwrap_or(0)
    }

    /// Register a subscription
    ///
    /// `initial` is the value already delivered to the subscriber, later updates are only
    /// delivered when the value differs from it.
    pub fn insert(
        &mut self,
        node: NodeId,
        template: Arc<Template>,
        initial: DynamicValue,
        on_update: Callback,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        for context_id in template.context_ids() {
            self.by_context
                .entry(context_id.clone())
                .or_default()
                .push(id);
        }
        self.by_node.entry(node).or_default().push(id);
        trace!(subscription = %id, node = %node, template = %template, "subscription created");

        self.by_id.insert(
            id,
            Subscription {
                node,
                template,
                last: initial,
                on_update,
            },
        );
        id
    }

    /// Remove a single subscription, returns false if it did not exist
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let Some(subscription) = self.by_id.remove(&id) else {
            return false;
        };

        for context_id in subscription.template.context_ids() {
            if let Some(ids) = self.by_context.get_mut(context_id) {
                ids.retain(|other| *other != id);
                if ids.is_empty() {
                    self.by_context.remove(context_id);
                }
            }
        }
        if let Some(ids) = self.by_node.get_mut(&subscription.node) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.by_node.remove(&subscription.node);
            }
        }
        trace!(subscription = %id, node = %subscription.node, "subscription removed");
        true
    }

    /// Remove every subscription owned by a node
    pub fn remove_node(&mut self, node: NodeId) -> usize {
        let ids = self.by_node.get(&node).cloned().unwrap_or_default();
        ids.into_iter().filter(|id| self.remove(*id)).count()
    }

    /// Re-evaluate the subscriptions affected by a change of the context `id` living at
    /// `location`
    ///
    /// A subscription is affected if its template reads `id` and the nearest declaration of
    /// `id` visible from its node is the one that changed. Callbacks only run when the new value
    /// differs from the last one delivered. Returns the number of callbacks invoked.
    #[instrument(level = "trace", skip(self, tree, global))]
    pub fn notify(
        &mut self,
        tree: &Tree,
        global: &DynamicValue,
        id: &str,
        location: ContextLocation,
    ) -> usize {
        let Some(candidates) = self.by_context.get(id) else {
            return 0;
        };

        let mut resolutions = Resolutions::new(tree, id);
        let mut delivered = 0;
        for subscription_id in candidates.iter() {
            let Some(subscription) = self.by_id.get_mut(subscription_id) else {
                continue;
            };

            // torn down nodes resolve nowhere and never match
            if resolutions.location(subscription.node) != Some(location) {
                continue;
            }

            let value = subscription
                .template
                .evaluate(&Scope::new(tree, global, subscription.node));
            if value == subscription.last {
                continue;
            }

            trace!(subscription = %subscription_id, value = %value, "delivering update");
            subscription.last = value;
            (subscription.on_update)(&subscription.last);
            delivered += 1;
        }
        delivered
    }
}
