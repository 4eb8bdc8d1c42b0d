//! Screen navigation
//!
//! Navigation actions move between screens, each screen being a tree of its own that shares
//! no context with the others. The only data crossing a navigation is the optional
//! [`NavigationContext`] of the action. Its value is evaluated in the scope of the node that
//! triggered the navigation, then seeded on the root of the destination under the reserved id
//! `navigationContext` before the destination is rendered.
//!
//! ```text
//! {
//!   "_action_": "navigate",
//!   "type": "pushView",
//!   "route": { "url": "/profile" },
//!   "navigationContext": { "path": "user", "value": "@{form.name}" }
//! }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

mod router;
mod stack;

pub use router::*;
pub use stack::*;

use crate::action::HttpMethod;
use crate::expression::{DynamicExpression, Expression, Resolver};
use crate::json::{DynamicValue, Path};

/// Value handed over to the destination of a navigation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NavigationContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Path>,
    #[serde(default)]
    pub value: DynamicExpression,
}

/// Extra data for the request of a remote screen
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpAdditionalData {
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<DynamicExpression>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRoute {
    pub url: Expression<String>,
    #[serde(default)]
    pub should_prefetch: bool,
    /// Screen rendered if the remote screen cannot be fetched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<DynamicValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_additional_data: Option<HttpAdditionalData>,
}

/// Where a navigation leads
///
/// A route with a `screen` is declarative, anything else is remote.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Route {
    Declarative { screen: DynamicValue },
    Remote(RemoteRoute),
}

impl Route {
    pub fn remote(url: impl Into<String>) -> Self {
        Route::Remote(RemoteRoute {
            url: Expression::Value(url.into()),
            should_prefetch: false,
            fallback: None,
            http_additional_data: None,
        })
    }

    pub fn declarative(screen: impl Into<DynamicValue>) -> Self {
        Route::Declarative {
            screen: screen.into(),
        }
    }

    /// Evaluate the route in a scope
    ///
    /// Relative remote URLs are made absolute with `base_url`. Returns `None` if the URL
    /// binding does not evaluate to text.
    pub fn destination<R: Resolver + ?Sized>(
        &self,
        resolver: &R,
        base_url: Option<&str>,
    ) -> Option<Destination> {
        match self {
            Route::Declarative { screen } => Some(Destination::Declarative {
                screen: screen.clone(),
            }),
            Route::Remote(remote) => {
                let url = remote.url.evaluate(resolver)?;
                let request = remote
                    .http_additional_data
                    .as_ref()
                    .map(|data| ScreenRequest {
                        method: data.method,
                        headers: data.headers.clone(),
                        body: data.body.as_ref().map(|body| body.evaluate(resolver)),
                    });
                Some(Destination::Remote {
                    url: absolute_url(base_url, &url),
                    should_prefetch: remote.should_prefetch,
                    fallback: remote.fallback.clone(),
                    request,
                })
            }
        }
    }
}

/// Request parameters of a remote screen, after evaluation
#[derive(Clone, Debug, PartialEq)]
pub struct ScreenRequest {
    pub method: HttpMethod,
    pub headers: IndexMap<String, String>,
    pub body: Option<DynamicValue>,
}

/// An evaluated [`Route`], handed to the platform to build a screen
#[derive(Clone, Debug, PartialEq)]
pub enum Destination {
    Remote {
        url: String,
        should_prefetch: bool,
        fallback: Option<DynamicValue>,
        request: Option<ScreenRequest>,
    },
    Declarative {
        screen: DynamicValue,
    },
}

impl Destination {
    pub fn url(&self) -> Option<&str> {
        match self {
            Destination::Remote { url, .. } => Some(url),
            Destination::Declarative { .. } => None,
        }
    }

    /// Identifier declared by a declarative screen document
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Destination::Declarative { screen } => {
                screen.get("identifier").and_then(DynamicValue::as_str)
            }
            Destination::Remote { .. } => None,
        }
    }
}

/// A native screen reached through a deep link
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenNativeRoute {
    pub route: Expression<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub data: IndexMap<String, String>,
    #[serde(default)]
    pub should_reset_application: bool,
}

/// Resolved deep link, handed to the platform
#[derive(Clone, Debug, PartialEq)]
pub struct NativeRoute {
    /// Name the native screen was registered with
    pub screen: String,
    /// Explicit data of the action merged with the route parameters
    pub data: IndexMap<String, String>,
    pub should_reset_application: bool,
}

/// Navigation actions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Navigate {
    /// Open a URL outside of the application
    OpenExternalUrl { url: Expression<String> },
    OpenNativeRoute(OpenNativeRoute),
    /// Replace every stack with a new one starting at `route`
    ResetApplication {
        route: Route,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        controller_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        navigation_context: Option<NavigationContext>,
    },
    /// Replace the current stack with a new one starting at `route`
    ResetStack {
        route: Route,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        navigation_context: Option<NavigationContext>,
    },
    /// Present `route` in a new stack
    PushStack {
        route: Route,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        controller_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        navigation_context: Option<NavigationContext>,
    },
    PopStack {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        navigation_context: Option<NavigationContext>,
    },
    PushView {
        route: Route,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        navigation_context: Option<NavigationContext>,
    },
    PopView {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        navigation_context: Option<NavigationContext>,
    },
    /// Go back to the screen with the given URL or identifier
    PopToView {
        route: Expression<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        navigation_context: Option<NavigationContext>,
    },
}

impl Navigate {
    pub fn navigation_context(&self) -> Option<&NavigationContext> {
        match self {
            Navigate::OpenExternalUrl { .. } | Navigate::OpenNativeRoute(_) => None,
            Navigate::ResetApplication {
                navigation_context, ..
            }
            | Navigate::ResetStack {
                navigation_context, ..
            }
            | Navigate::PushStack {
                navigation_context, ..
            }
            | Navigate::PopStack { navigation_context }
            | Navigate::PushView {
                navigation_context, ..
            }
            | Navigate::PopView { navigation_context }
            | Navigate::PopToView {
                navigation_context, ..
            } => navigation_context.as_ref(),
        }
    }

    /// Name of the transition, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Navigate::OpenExternalUrl { .. } => "openExternalUrl",
            Navigate::OpenNativeRoute(_) => "openNativeRoute",
            Navigate::ResetApplication { .. } => "resetApplication",
            Navigate::ResetStack { .. } => "resetStack",
            Navigate::PushStack { .. } => "pushStack",
            Navigate::PopStack { .. } => "popStack",
            Navigate::PushView { .. } => "pushView",
            Navigate::PopView { .. } => "popView",
            Navigate::PopToView { .. } => "popToView",
        }
    }
}
