//! The binding engine
//!
//! [`Engine`] owns the view [`Tree`], the global context and the subscription registry. Every
//! read of a context goes through scope resolution and every write goes through
//! [`Engine::set_context`], which takes care of propagating the change to the subscriptions in
//! scope.
//!
//! ```rust
//! use trellis::context::Context;
//! use trellis::engine::Engine;
//! use trellis::expression::Template;
//! use trellis::json::DynamicValue;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use std::sync::Arc;
//!
//! # fn main() -> trellis::result::Result<()> {
//! let mut engine = Engine::new();
//! let root = engine.create_root();
//! engine.declare_context(root, Context::new("counter", 1))?;
//!
//! let label = engine.add_child(root)?;
//! let text = Rc::new(RefCell::new(String::new()));
//! let sink = text.clone();
//! engine.subscribe(
//!     label,
//!     Arc::new(Template::parse("Count: @{counter}")?),
//!     move |value| *sink.borrow_mut() = value.to_text(),
//! )?;
//! assert_eq!(*text.borrow(), "Count: 1");
//!
//! engine.set_context("counter", None, DynamicValue::Int(2), label)?;
//! assert_eq!(*text.borrow(), "Count: 2");
//! # Ok(())
//! # }
//! ```

use json_patch::{diff, Patch};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

use crate::action::Form;
use crate::binding::{SubscriptionId, Subscriptions};
use crate::context::{resolve_location, Context, ContextLocation, Scope, NAVIGATION_CONTEXT_ID};
use crate::error::{Error, ErrorKind};
use crate::expression::{convert, Expression, Template};
use crate::json::{DynamicValue, Path};
use crate::result::Result;
use crate::tree::{NodeId, Tree};

#[derive(Clone, Debug, Default)]
pub struct Opts {
    /// Base for relative screen URLs. Defaults to none, meaning URLs are compared as given
    base_url: Option<String>,
    /// Initial value of the global context. Defaults to `null`
    global_context: DynamicValue,
}

impl Opts {
    pub fn base_url(self, base_url: impl Into<String>) -> Self {
        let mut opts = self;
        opts.base_url = Some(base_url.into());
        opts
    }

    pub fn global_context(self, value: impl Into<DynamicValue>) -> Self {
        let mut opts = self;
        opts.global_context = value.into();
        opts
    }
}

#[derive(Debug, Default)]
pub struct Engine {
    tree: Tree,
    global: DynamicValue,
    subscriptions: Subscriptions,
    forms: HashMap<NodeId, Form>,
    base_url: Option<String>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_opts(opts: Opts) -> Self {
        Self {
            global: opts.global_context,
            base_url: opts.base_url,
            ..Default::default()
        }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    /// Value of the global context
    pub fn global(&self) -> &DynamicValue {
        &self.global
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn create_root(&mut self) -> NodeId {
        self.tree.create_root()
    }

    pub fn add_child(&mut self, parent: NodeId) -> Result<NodeId> {
        self.tree.add_child(parent)
    }

    pub fn declare_context(&mut self, node: NodeId, context: Context) -> Result<()> {
        trace!(node = %node, context = %context.id, "context declared");
        self.tree.declare_context(node, context)
    }

    /// Register `node` as a form enclosing its subtree
    ///
    /// Declaring a form again on the same node replaces its handlers.
    pub fn declare_form(&mut self, node: NodeId, form: Form) -> Result<()> {
        if !self.tree.contains(node) {
            return Err(Error::node_not_found(node));
        }
        trace!(node = %node, "form declared");
        self.forms.insert(node, form);
        Ok(())
    }

    /// Find the nearest form enclosing `node`, `node` included
    pub fn enclosing_form(&self, node: NodeId) -> Option<(NodeId, &Form)> {
        self.tree
            .ancestors(node)
            .find_map(|ancestor| self.forms.get(&ancestor).map(|form| (ancestor, form)))
    }

    /// Tear down a node and its subtree
    ///
    /// Subscriptions owned by the removed nodes are dropped before the nodes themselves, so
    /// they can never be invoked again. Returns the removed nodes.
    pub fn destroy(&mut self, node: NodeId) -> Vec<NodeId> {
        let subtree = self.tree.subtree(node);
        for removed in subtree.iter() {
            self.subscriptions.remove_node(*removed);
            self.forms.remove(removed);
        }
        let removed = self.tree.remove(node);
        if !removed.is_empty() {
            trace!(node = %node, removed = removed.len(), "subtree destroyed");
        }
        removed
    }

    /// The set of contexts visible from a node
    pub fn scope(&self, node: NodeId) -> Scope<'_> {
        Scope::new(&self.tree, &self.global, node)
    }

    /// Resolve the value of the context `id` as seen from `from`
    pub fn resolve(&self, id: &str, from: NodeId) -> Option<&DynamicValue> {
        Scope::new(&self.tree, &self.global, from).get(id)
    }

    /// Find which context instance answers `id` when looked up from `from`
    pub fn resolve_context(&self, id: &str, from: NodeId) -> Option<ContextLocation> {
        resolve_location(&self.tree, id, from)
    }

    /// Evaluate a template in the scope of a node
    pub fn evaluate(&self, template: &Template, node: NodeId) -> DynamicValue {
        template.evaluate(&self.scope(node))
    }

    /// Evaluate a template and keep it up to date
    ///
    /// The callback is invoked right away with the current value, then again every time a
    /// context mutation changes the value.
    pub fn subscribe<F>(
        &mut self,
        node: NodeId,
        template: Arc<Template>,
        mut on_update: F,
    ) -> Result<SubscriptionId>
    where
        F: FnMut(&DynamicValue) + 'static,
    {
        if !self.tree.contains(node) {
            return Err(Error::node_not_found(node));
        }
        let value = self.evaluate(&template, node);
        on_update(&value);
        Ok(self
            .subscriptions
            .insert(node, template, value, Box::new(on_update)))
    }

    /// Bind a typed attribute to a node
    ///
    /// Literal expressions are delivered once and create no subscription. Bound values that
    /// cannot be converted to `T` are not delivered.
    pub fn bind<T, F>(
        &mut self,
        node: NodeId,
        expression: &Expression<T>,
        mut on_update: F,
    ) -> Result<Option<SubscriptionId>>
    where
        T: Clone + DeserializeOwned + 'static,
        F: FnMut(T) + 'static,
    {
        match expression {
            Expression::Value(value) => {
                on_update(value.clone());
                Ok(None)
            }
            Expression::Binding(template) => self
                .subscribe(node, template.clone(), move |value| {
                    if let Some(converted) = convert::<T>(value.clone()) {
                        on_update(converted);
                    }
                })
                .map(Some),
        }
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(id)
    }

    /// Change the value of the context `id` visible from `from`
    ///
    /// Without a path the whole value is replaced, otherwise only the leaf at `path` is set,
    /// creating missing intermediate values. The change is then propagated to every
    /// subscription in scope of the mutated context.
    ///
    /// Returns an [`ErrorKind::UnresolvedContext`] error if no context `id` is visible, and an
    /// [`ErrorKind::StructuralConflict`] error if the path crosses a value of the wrong kind.
    /// In both cases nothing changes.
    #[instrument(level = "trace", skip(self, value))]
    pub fn set_context(
        &mut self,
        id: &str,
        path: Option<&Path>,
        value: DynamicValue,
        from: NodeId,
    ) -> Result<()> {
        let path = path.filter(|p| !p.is_root());

        let location = self
            .resolve_context(id, from)
            .ok_or_else(|| Error::unresolved(id))?;
        let target = match location {
            ContextLocation::Global => &mut self.global,
            ContextLocation::Node(node) => self
                .tree
                .context_value_mut(node, id)
                .ok_or_else(|| Error::unresolved(id))?,
        };

        let current = match path {
            Some(p) => p.get(target),
            None => Some(&*target),
        };
        if current == Some(&value) {
            trace!("value unchanged");
            return Ok(());
        }

        let previous = tracing::enabled!(tracing::Level::DEBUG).then(|| target.clone());
        match path {
            Some(p) => p
                .set(target, value)
                .map_err(|e| Error::new(ErrorKind::StructuralConflict, e))?,
            None => *target = value,
        }

        // Show the changes at debug level
        if let Some(previous) = previous {
            let Patch(changes) = diff(&previous.into(), &target.clone().into());
            debug!(context = id, at = %location, "context changed");
            for change in changes {
                debug!("- {}", change);
            }
        }

        self.notify(id, location);
        Ok(())
    }

    /// Propagate a change of the context `id` living at `location`
    ///
    /// Returns the number of subscriptions that received a new value.
    pub fn notify(&mut self, id: &str, location: ContextLocation) -> usize {
        self.subscriptions
            .notify(&self.tree, &self.global, id, location)
    }

    /// Seed the navigation context of a freshly created screen root
    pub(crate) fn seed_navigation_context(
        &mut self,
        root: NodeId,
        path: Option<&Path>,
        value: DynamicValue,
    ) -> Result<()> {
        let target = self.tree.navigation_context_mut(root)?;
        match path.filter(|p| !p.is_root()) {
            Some(p) => p
                .set(target, value)
                .map_err(|e| Error::new(ErrorKind::StructuralConflict, e))?,
            None => *target = value,
        }
        trace!(node = %root, "navigation context seeded");
        self.notify(NAVIGATION_CONTEXT_ID, ContextLocation::Node(root));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn template(raw: &str) -> Arc<Template> {
        Arc::new(Template::parse(raw).unwrap())
    }

    fn record(
        engine: &mut Engine,
        node: NodeId,
        raw: &str,
    ) -> Rc<RefCell<Vec<DynamicValue>>> {
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = received.clone();
        engine
            .subscribe(node, template(raw), move |value| {
                sink.borrow_mut().push(value.clone())
            })
            .unwrap();
        received
    }

    #[test]
    fn it_updates_a_path_leaving_siblings_untouched() {
        let mut engine = Engine::new();
        let root = engine.create_root();
        engine
            .declare_context(root, Context::new("ctx", json!({"a": {"b": 1, "c": 2}})))
            .unwrap();

        let path = Path::parse("a.b").unwrap();
        engine
            .set_context("ctx", Some(&path), DynamicValue::Int(9), root)
            .unwrap();
        assert_eq!(
            engine.resolve("ctx", root),
            Some(&DynamicValue::from(json!({"a": {"b": 9, "c": 2}})))
        );
    }

    #[test]
    fn it_rejects_updates_through_values_of_the_wrong_kind() {
        let mut engine = Engine::new();
        let root = engine.create_root();
        engine
            .declare_context(root, Context::new("ctx", json!({"a": "text"})))
            .unwrap();
        let values = record(&mut engine, root, "@{ctx}");

        let path = Path::parse("a.b").unwrap();
        let err = engine
            .set_context("ctx", Some(&path), DynamicValue::Int(9), root)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralConflict);
        assert!(err.is_recoverable());
        assert_eq!(
            engine.resolve("ctx", root),
            Some(&DynamicValue::from(json!({"a": "text"})))
        );
        assert_eq!(values.borrow().len(), 1);
    }

    #[test]
    fn it_reports_unresolved_contexts() {
        let mut engine = Engine::new();
        let root = engine.create_root();
        let err = engine
            .set_context("missing", None, DynamicValue::Int(1), root)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedContext);
    }

    #[test]
    fn it_skips_propagation_of_equal_values() {
        let mut engine = Engine::new();
        let root = engine.create_root();
        engine.declare_context(root, Context::new("x", 1)).unwrap();
        let values = record(&mut engine, root, "@{x}");

        engine
            .set_context("x", None, DynamicValue::Int(1), root)
            .unwrap();
        engine
            .set_context("x", None, DynamicValue::Int(2), root)
            .unwrap();
        assert_eq!(
            *values.borrow(),
            vec![DynamicValue::Int(1), DynamicValue::Int(2)]
        );
    }

    #[test]
    fn it_routes_the_global_context_to_the_process_store() {
        let mut engine = Engine::with_opts(Opts::default().global_context(json!({"theme": "dark"})));
        let first = engine.create_root();
        let second = engine.create_root();
        let values = record(&mut engine, second, "@{global.theme}");

        let path = Path::parse("theme").unwrap();
        engine
            .set_context("global", Some(&path), "light".into(), first)
            .unwrap();

        engine.destroy(first);
        assert_eq!(
            engine.global(),
            &DynamicValue::from(json!({"theme": "light"}))
        );
        assert_eq!(
            *values.borrow(),
            vec![DynamicValue::from("dark"), DynamicValue::from("light")]
        );
    }

    #[test]
    fn it_drops_subscriptions_on_destroy() {
        let mut engine = Engine::new();
        let root = engine.create_root();
        engine.declare_context(root, Context::new("x", 1)).unwrap();
        let child = engine.add_child(root).unwrap();
        let grandchild = engine.add_child(child).unwrap();
        let values = record(&mut engine, grandchild, "@{x}");

        assert_eq!(engine.destroy(child), vec![grandchild, child]);
        assert!(engine.subscriptions().is_empty());

        engine
            .set_context("x", None, DynamicValue::Int(2), root)
            .unwrap();
        assert_eq!(*values.borrow(), vec![DynamicValue::Int(1)]);
    }

    #[test]
    fn it_finds_the_nearest_enclosing_form() {
        let mut engine = Engine::new();
        let root = engine.create_root();
        let outer = engine.add_child(root).unwrap();
        let inner = engine.add_child(outer).unwrap();
        let button = engine.add_child(inner).unwrap();
        engine.declare_form(outer, Form::default()).unwrap();
        engine.declare_form(inner, Form::default()).unwrap();

        assert_eq!(engine.enclosing_form(button).map(|(node, _)| node), Some(inner));
        assert_eq!(engine.enclosing_form(outer).map(|(node, _)| node), Some(outer));
        assert!(engine.enclosing_form(root).is_none());

        engine.destroy(inner);
        assert!(engine.enclosing_form(inner).is_none());
        assert!(engine.forms.get(&inner).is_none());
    }

    #[test]
    fn it_binds_typed_attributes() {
        let mut engine = Engine::new();
        let root = engine.create_root();
        engine
            .declare_context(root, Context::new("form", json!({"enabled": false})))
            .unwrap();

        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = received.clone();
        let expression: Expression<bool> = Expression::binding("@{form.enabled}").unwrap();
        engine
            .bind(root, &expression, move |enabled| sink.borrow_mut().push(enabled))
            .unwrap();

        let path = Path::parse("enabled").unwrap();
        engine
            .set_context("form", Some(&path), true.into(), root)
            .unwrap();
        assert_eq!(*received.borrow(), vec![false, true]);
    }

    #[test]
    fn it_fails_to_subscribe_on_missing_nodes() {
        let mut engine = Engine::new();
        let root = engine.create_root();
        engine.destroy(root);
        let err = engine
            .subscribe(root, template("@{x}"), |_| {})
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NodeNotFound);
    }
}
