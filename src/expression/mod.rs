//! The `@{...}` binding language
//!
//! Any string received from the server may embed bindings. A binding reads a value out of a
//! context, identified by the leading name of its path, and optionally combines it with
//! literals through a closed set of operators.
//!
//! ```text
//! @{user.name}
//! @{cart.items[0]['unit price'] * cart.items[0].quantity}
//! @{logged && count > 0 ? 'Welcome back' : 'Hello'}
//! Hello, @{user.name}!
//! ```
//!
//! A string made of exactly one binding evaluates to the raw [`DynamicValue`]. A string mixing
//! text and bindings evaluates to a string, with each binding converted to text and inserted in
//! place. A literal `@{` can be written as `\@{`.
//!
//! Strings are parsed once, when the document is decoded, into a [`Template`]. Evaluation only
//! walks the parsed tree.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

mod ast;
mod dynamic;
mod eval;
mod lexer;
mod parser;

pub use ast::*;
pub use dynamic::*;
pub use eval::{evaluate, Resolver};

use crate::json::DynamicValue;

/// Malformed expression text
///
/// Offsets are byte offsets into the template string.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("unterminated binding starting at offset {offset}")]
    Unterminated { offset: usize },

    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("unbalanced brackets at offset {offset}")]
    UnbalancedBrackets { offset: usize },

    #[error("unknown operator '{operator}' at offset {offset}")]
    UnknownOperator { operator: String, offset: usize },

    #[error("malformed path at offset {offset}: {reason}")]
    MalformedPath { offset: usize, reason: &'static str },

    #[error("unexpected {found} at offset {offset}")]
    UnexpectedToken { found: String, offset: usize },

    #[error("empty binding at offset {offset}")]
    Empty { offset: usize },

    #[error("invalid number '{text}' at offset {offset}")]
    InvalidNumber { text: String, offset: usize },

    #[error("binding nested too deeply at offset {offset}")]
    TooDeep { offset: usize },
}

const OPEN: &str = "@{";
const ESCAPED_OPEN: &str = "\\@{";

/// Returns true if the string contains at least one unescaped `@{`
pub fn contains_binding(raw: &str) -> bool {
    raw.match_indices(OPEN)
        .any(|(i, _)| !raw[..i].ends_with('\\'))
}

#[derive(Clone, Debug, PartialEq)]
enum Part {
    Text(String),
    Binding(Node),
}

/// A parsed string with zero or more embedded bindings
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    raw: String,
    parts: Vec<Part>,
    context_ids: Vec<String>,
}

impl Template {
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let mut parts = Vec::new();
        let mut text = String::new();
        let mut pos = 0;

        while pos < raw.len() {
            let rest = &raw[pos..];
            if rest.starts_with(ESCAPED_OPEN) {
                text.push_str(OPEN);
                pos += ESCAPED_OPEN.len();
            } else if rest.starts_with(OPEN) {
                if !text.is_empty() {
                    parts.push(Part::Text(std::mem::take(&mut text)));
                }
                let (node, end) = parser::parse_binding(raw, pos)?;
                parts.push(Part::Binding(node));
                pos = end;
            } else {
                let c = rest.chars().next().unwrap_or_default();
                text.push(c);
                pos += c.len_utf8().max(1);
            }
        }
        if !text.is_empty() {
            parts.push(Part::Text(text));
        }

        let mut context_ids = Vec::new();
        for part in parts.iter() {
            if let Part::Binding(node) = part {
                node.collect_context_ids(&mut context_ids);
            }
        }

        Ok(Self {
            raw: raw.to_owned(),
            parts,
            context_ids,
        })
    }

    /// The original text
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Ids of every context read by the template
    pub fn context_ids(&self) -> &[String] {
        &self.context_ids
    }

    pub fn references(&self, context_id: &str) -> bool {
        self.context_ids.iter().any(|id| id == context_id)
    }

    /// Returns true if the template has at least one binding
    pub fn has_bindings(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::Binding(_)))
    }

    /// Evaluate the template
    ///
    /// A template that is exactly one binding yields the raw value of the binding. Otherwise
    /// the result is always a string.
    pub fn evaluate<R: Resolver + ?Sized>(&self, resolver: &R) -> DynamicValue {
        if let [Part::Binding(node)] = self.parts.as_slice() {
            return evaluate(node, resolver);
        }

        let text = self
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => text.clone(),
                Part::Binding(node) => evaluate(node, resolver).to_text(),
            })
            .collect::<String>();
        DynamicValue::String(text)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Convert an evaluated value into the type expected by an attribute
///
/// Conversion goes through serde. Scalars that cannot be converted directly are retried as
/// text, so an `Expression<String>` bound to a number yields its text form and enums decode
/// from their string names.
pub fn convert<T: DeserializeOwned>(value: DynamicValue) -> Option<T> {
    let scalar = !matches!(
        value,
        DynamicValue::Null | DynamicValue::Array(_) | DynamicValue::Map(_)
    );
    let text = scalar.then(|| value.to_text());
    match serde_json::from_value::<T>(serde_json::Value::from(value)) {
        Ok(converted) => Some(converted),
        Err(e) => {
            let retried = text.and_then(|t| serde_json::from_value(serde_json::Value::String(t)).ok());
            if retried.is_none() {
                trace!("cannot convert bound value: {e}");
            }
            retried
        }
    }
}

/// An attribute value that is either a literal or a binding
#[derive(Clone, Debug, PartialEq)]
pub enum Expression<T> {
    Value(T),
    Binding(Arc<Template>),
}

impl<T> Expression<T> {
    pub fn binding(raw: &str) -> Result<Self, ParseError> {
        Template::parse(raw).map(|template| Expression::Binding(Arc::new(template)))
    }

    /// Ids of the contexts read by the expression, empty for literals
    pub fn context_ids(&self) -> &[String] {
        match self {
            Expression::Value(_) => &[],
            Expression::Binding(template) => template.context_ids(),
        }
    }

    /// Evaluate the expression, converting a bound value into `T`
    ///
    /// Returns `None` if the bound value cannot be converted.
    pub fn evaluate<R: Resolver + ?Sized>(&self, resolver: &R) -> Option<T>
    where
        T: Clone + DeserializeOwned,
    {
        match self {
            Expression::Value(value) => Some(value.clone()),
            Expression::Binding(template) => convert(template.evaluate(resolver)),
        }
    }
}

impl Expression<String> {
    /// Create a string expression, which is a binding only if the text contains one
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        if contains_binding(raw) {
            Expression::binding(raw)
        } else {
            Ok(Expression::Value(raw.replace(ESCAPED_OPEN, OPEN)))
        }
    }
}

impl<T> From<T> for Expression<T> {
    fn from(value: T) -> Self {
        Expression::Value(value)
    }
}

impl<T: Serialize> Serialize for Expression<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Expression::Value(value) => value.serialize(serializer),
            Expression::Binding(template) => serializer.serialize_str(template.as_str()),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Expression<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut value = serde_json::Value::deserialize(deserializer)?;
        if let serde_json::Value::String(raw) = &mut value {
            if contains_binding(raw) {
                return Expression::binding(raw).map_err(serde::de::Error::custom);
            }
            if raw.contains(ESCAPED_OPEN) {
                *raw = raw.replace(ESCAPED_OPEN, OPEN);
            }
        }
        serde_json::from_value(value)
            .map(Expression::Value)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::json::Map;

    fn contexts(value: serde_json::Value) -> Map {
        match DynamicValue::from(value) {
            DynamicValue::Map(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn it_returns_the_raw_value_for_a_single_binding() {
        let template = Template::parse("@{user.tags}").unwrap();
        let value = template.evaluate(&contexts(json!({"user": {"tags": ["a", "b"]}})));
        assert_eq!(value, DynamicValue::from(json!(["a", "b"])));
    }

    #[test]
    fn it_interpolates_bindings_inside_text() {
        let template = Template::parse("Hi @{user.name}, you have @{count} messages").unwrap();
        let value = template.evaluate(&contexts(json!({"user": {"name": "neo"}, "count": 3})));
        assert_eq!(value, DynamicValue::from("Hi neo, you have 3 messages"));
    }

    #[test]
    fn it_interpolates_missing_values_as_empty_text() {
        let template = Template::parse("[@{missing}]").unwrap();
        assert_eq!(
            template.evaluate(&Map::new()),
            DynamicValue::from("[]")
        );
    }

    #[test]
    fn it_keeps_escaped_bindings_as_text() {
        let template = Template::parse(r"\@{not} @{a}").unwrap();
        assert_eq!(template.context_ids(), &["a".to_string()]);
        assert_eq!(
            template.evaluate(&contexts(json!({"a": 1}))),
            DynamicValue::from("@{not} 1")
        );
        assert!(!contains_binding(r"\@{not}"));
    }

    #[test]
    fn it_collects_referenced_context_ids() {
        let template = Template::parse("@{a.x} @{b[c]} @{a.y}").unwrap();
        assert_eq!(
            template.context_ids(),
            &["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(template.references("c"));
        assert!(!template.references("x"));
    }

    #[test]
    fn it_handles_braces_inside_string_literals() {
        let template = Template::parse("@{'}'}!").unwrap();
        assert_eq!(template.evaluate(&Map::new()), DynamicValue::from("}!"));
    }

    #[test]
    fn it_reports_parse_errors_with_offsets() {
        assert_eq!(
            Template::parse("text @{a.b"),
            Err(ParseError::Unterminated { offset: 5 })
        );
    }

    #[test]
    fn it_deserializes_literals_and_bindings() {
        let literal: Expression<i64> = serde_json::from_value(json!(5)).unwrap();
        assert_eq!(literal, Expression::Value(5));

        let bound: Expression<i64> = serde_json::from_value(json!("@{count}")).unwrap();
        assert_eq!(bound.context_ids(), &["count".to_string()]);
        assert_eq!(bound.evaluate(&contexts(json!({"count": 7}))), Some(7));
    }

    #[test]
    fn it_unescapes_deserialized_literals() {
        let literal: Expression<String> = serde_json::from_value(json!(r"\@{x}")).unwrap();
        assert_eq!(literal, Expression::Value("@{x}".to_string()));
    }

    #[test]
    fn it_fails_to_deserialize_malformed_bindings() {
        let result: Result<Expression<String>, _> = serde_json::from_value(json!("@{a."));
        assert!(result.is_err());
    }

    #[test]
    fn it_converts_scalars_to_text_for_string_expressions() {
        let expr = Expression::<String>::parse("@{count}").unwrap();
        assert_eq!(
            expr.evaluate(&contexts(json!({"count": 7}))),
            Some("7".to_string())
        );
    }

    #[test]
    fn it_returns_none_when_the_value_cannot_be_converted() {
        let expr: Expression<bool> = Expression::binding("@{list}").unwrap();
        assert_eq!(expr.evaluate(&contexts(json!({"list": [1]}))), None);
    }

    #[test]
    fn it_decodes_enums_from_bound_strings() {
        #[derive(Clone, Debug, PartialEq, Deserialize)]
        #[serde(rename_all = "UPPERCASE")]
        enum Alignment {
            Left,
            Center,
        }

        let expr: Expression<Alignment> = Expression::binding("@{align}").unwrap();
        assert_eq!(
            expr.evaluate(&contexts(json!({"align": "CENTER"}))),
            Some(Alignment::Center)
        );
        assert_eq!(
            Expression::<Alignment>::Value(Alignment::Left).evaluate(&Map::new()),
            Some(Alignment::Left)
        );
    }
}
