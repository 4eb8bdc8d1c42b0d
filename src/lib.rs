#![cfg_attr(docsrs, feature(doc_cfg))]
//! trellis is the context and expression binding engine of a server-driven UI runtime.
//!
//! Screens are described by a server as documents. Their attributes may embed expressions such
//! as `"Hello @{user.name}"` that read named, mutable data containers called contexts. The
//! engine keeps every bound attribute up to date as contexts change, and carries data across
//! screens when the user navigates.
//!
//! # Features
//!
//! - A small expression language. Bindings support property and index access, arithmetic,
//!   comparison, logical operators and the ternary operator.
//! - Tree-scoped contexts. A context declared by a node is visible to its whole subtree, and
//!   the nearest declaration wins.
//! - Fine-grained propagation. A context change only reaches the subscriptions that read it
//!   from the mutated instance, and only if their value actually changed.
//! - Navigation. A stack of stacks of screens with data hand-off through the reserved
//!   `navigationContext` context.
//! - Observable. The library reports through the [tracing crate](https://crates.io/crates/tracing),
//!   and context changes are logged at debug level as [JSON Patch](https://datatracker.ietf.org/doc/html/rfc6902)
//!   operations.
//!
//! # Contexts
//!
//! Each node of the view tree may declare one context. Looking up a context id from a node
//! walks up the ancestors, starting at the node itself, and stops at the first declaration. The
//! reserved id `global` is always answered by a single process-wide context.
//!
//! ```rust
//! use trellis::context::Context;
//! use trellis::engine::Engine;
//! use trellis::expression::Template;
//! use trellis::json::DynamicValue;
//!
//! # fn main() -> trellis::result::Result<()> {
//! let mut engine = Engine::new();
//! let root = engine.create_root();
//! engine.declare_context(root, Context::new("user", serde_json::json!({"name": "Ana"})))?;
//! let child = engine.add_child(root)?;
//! engine.declare_context(child, Context::new("user", serde_json::json!({"name": "Bo"})))?;
//!
//! let greeting = Template::parse("Hello @{user.name}")?;
//! assert_eq!(engine.evaluate(&greeting, root), DynamicValue::from("Hello Ana"));
//! assert_eq!(engine.evaluate(&greeting, child), DynamicValue::from("Hello Bo"));
//! # Ok(())
//! # }
//! ```
//!
//! # Actions
//!
//! The document changes state through [actions](`action::Action`). A
//! [Runtime](`action::Runtime`) executes them in the scope of the node that triggered them,
//! and talks to the host application through the [Platform](`action::Platform`) trait, which
//! builds screens, sends requests and opens external destinations.
//!
//! Only `SetContext` mutates contexts. It replaces the whole value of a context, or only the
//! leaf at a path such as `address.lines[0]`, creating missing intermediate values along the
//! way.
//!
//! # Navigation
//!
//! Each screen is a tree of its own and sees no contexts from other screens, except `global`.
//! A navigation action may carry a `navigationContext`, evaluated from the node that triggered
//! it and made available to the destination screen under the same name:
//!
//! ```text
//! {
//!   "_action_": "navigate",
//!   "type": "pushView",
//!   "route": { "url": "/greeting" },
//!   "navigationContext": { "value": "@{form.name}" }
//! }
//! ```
//!
//! The destination can then read `@{navigationContext}` as soon as it is built. Screens
//! dismissed by a navigation are torn down along with all their subscriptions.
//!
//! # Logging
//!
//! Hosts that do not install a subscriber of their own may enable the `logging` feature and
//! call `logging::init`.

pub mod action;
pub mod binding;
pub mod context;
pub mod engine;
pub mod error;
pub mod expression;
pub mod json;
pub mod navigation;
pub mod result;
pub mod tree;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;
