//! Actions triggered by the UI
//!
//! Actions are the only way the server-driven document changes the state of the engine.
//! They are decoded as a closed [`Action`] enum and executed by a [`Runtime`], which
//! evaluates their expressions in the scope of the node that triggered them.
//!
//! ```text
//! { "_action_": "setContext", "contextId": "form", "path": "name", "value": "@{onChange.value}" }
//! { "_action_": "condition", "condition": "@{form.valid}", "onTrue": [...], "onFalse": [...] }
//! { "_action_": "sendRequest", "url": "/submit", "method": "POST", "data": "@{form}", "onSuccess": [...] }
//! { "_action_": "navigate", "type": "popView" }
//! { "_action_": "submitForm" }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

mod platform;
mod runtime;

pub use platform::*;
pub use runtime::*;

use crate::context::Context;
use crate::expression::{DynamicExpression, Expression};
use crate::json::{DynamicValue, Path};
use crate::navigation::Navigate;

/// Change the value of a context, or part of it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetContext {
    pub context_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Path>,
    #[serde(default)]
    pub value: DynamicExpression,
}

/// Run one of two lists of actions depending on a boolean expression
///
/// If the condition does not evaluate to a boolean neither list runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub condition: Expression<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_true: Vec<Action>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_false: Vec<Action>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

/// Send a request through the platform
///
/// The request does not block. When the platform completes it, either `onSuccess` or
/// `onError` runs with an implicit context of the same name describing the response, then
/// `onFinish` runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub url: Expression<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<Expression<HttpMethod>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Expression<IndexMap<String, String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DynamicExpression>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_success: Vec<Action>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_error: Vec<Action>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_finish: Vec<Action>,
}

/// The handlers of a form, declared on the node that encloses its inputs
///
/// A `submitForm` action triggered anywhere inside the form runs `onSubmit` if every input is
/// valid and `onValidationError` otherwise. Validity is decided by the [`Platform`], which owns
/// the inputs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_submit: Vec<Action>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_validation_error: Vec<Action>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_action_", rename_all = "camelCase")]
pub enum Action {
    SetContext(SetContext),
    Condition(Condition),
    SendRequest(SendRequest),
    Navigate(Navigate),
    SubmitForm,
}

impl Action {
    pub fn set_context(
        context_id: impl Into<String>,
        path: Option<Path>,
        value: impl Into<DynamicExpression>,
    ) -> Self {
        Action::SetContext(SetContext {
            context_id: context_id.into(),
            path,
            value: value.into(),
        })
    }

    /// Name of the action, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Action::SetContext(_) => "setContext",
            Action::Condition(_) => "condition",
            Action::SendRequest(_) => "sendRequest",
            Action::Navigate(navigate) => navigate.kind(),
            Action::SubmitForm => "submitForm",
        }
    }
}

impl From<Navigate> for Action {
    fn from(navigate: Navigate) -> Self {
        Action::Navigate(navigate)
    }
}

/// A UI event carrying a value, e.g. `onChange` of a text input
///
/// The actions run for the event can read the value through an implicit context named after
/// the event.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub name: String,
    pub value: DynamicValue,
}

impl Event {
    pub fn new(name: impl Into<String>, value: impl Into<DynamicValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl From<Event> for Context {
    fn from(event: Event) -> Self {
        Context::new(event.name, event.value)
    }
}
