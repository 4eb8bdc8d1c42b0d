//! Named values attached to the view tree
//!
//! A [`Context`] is declared by a node and is visible to that node and every descendant, unless
//! a closer node declares a context with the same id. One process-wide context, with the
//! reserved id [`GLOBAL_CONTEXT_ID`], is visible from everywhere.

use serde::{Deserialize, Serialize};
use std::fmt;

mod scope;

pub use scope::*;

use crate::json::DynamicValue;
use crate::tree::NodeId;

/// Id of the process-wide context
pub const GLOBAL_CONTEXT_ID: &str = "global";

/// Id of the context seeded on the root of a screen by the navigation that opened it
pub const NAVIGATION_CONTEXT_ID: &str = "navigationContext";

/// Returns true if the id is managed by the engine and cannot be declared by a node
pub fn is_reserved(id: &str) -> bool {
    id == GLOBAL_CONTEXT_ID || id == NAVIGATION_CONTEXT_ID
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub id: String,
    #[serde(default)]
    pub value: DynamicValue,
}

impl Context {
    pub fn new(id: impl Into<String>, value: impl Into<DynamicValue>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
        }
    }
}

/// Where a context instance lives
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContextLocation {
    Node(NodeId),
    Global,
}

impl fmt::Display for ContextLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextLocation::Node(node) => write!(f, "node {node}"),
            ContextLocation::Global => f.write_str("global"),
        }
    }
}
