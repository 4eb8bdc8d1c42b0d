use indexmap::IndexMap;
use std::fmt;

use super::HttpMethod;
use crate::engine::Engine;
use crate::json::DynamicValue;
use crate::navigation::{Destination, NativeRoute};
use crate::tree::NodeId;

/// Ticket identifying a request sent through the [`Platform`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub(crate) u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request produced by a SendRequest action, with every expression evaluated
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub url: String,
    pub method: HttpMethod,
    pub headers: IndexMap<String, String>,
    pub body: Option<DynamicValue>,
}

/// A successful response
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Response {
    pub data: DynamicValue,
    pub status: u16,
    pub status_text: String,
}

/// A failed request
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestError {
    pub data: DynamicValue,
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub message: String,
}

/// The host side of the engine
///
/// The platform renders screens, talks to the network and opens whatever lives outside the
/// server-driven screens. Calls happen synchronously on the thread driving the [`Runtime`],
/// and long-running work such as requests must be completed later through
/// [`Runtime::complete_request`].
///
/// [`Runtime`]: super::Runtime
/// [`Runtime::complete_request`]: super::Runtime::complete_request
pub trait Platform {
    /// Build the screen for `destination` under `root`
    ///
    /// The root is created by the navigator and already holds the navigation context of the
    /// transition. The platform creates the rest of the tree through the engine and subscribes
    /// its bound attributes.
    fn build_screen(
        &mut self,
        engine: &mut Engine,
        root: NodeId,
        destination: &Destination,
    ) -> anyhow::Result<()>;

    /// Start a request, to be completed later with the same id
    fn send_request(&mut self, id: RequestId, request: Request) -> anyhow::Result<()>;

    fn open_external_url(&mut self, url: &str) -> anyhow::Result<()>;

    fn open_native_route(&mut self, route: &NativeRoute) -> anyhow::Result<()>;

    /// Check the inputs of the form rooted at `form` before it is submitted
    ///
    /// Returns false if any input shows a validation error.
    fn validate_form(&mut self, _engine: &Engine, _form: NodeId) -> bool {
        true
    }

    /// Called before the tree of a dismissed screen is torn down
    fn dismiss_screen(&mut self, _root: NodeId) {}
}
