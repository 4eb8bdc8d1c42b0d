use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

use super::{contains_binding, ParseError, Resolver, Template, ESCAPED_OPEN, OPEN};
use crate::json::{DynamicValue, Map};

/// A JSON-like value whose strings may hold bindings at any depth
///
/// Used where the server sends free-form data, such as the value of a SetContext action or the
/// body of a request. Subtrees without bindings are kept as plain values.
#[derive(Clone, Debug, PartialEq)]
pub enum DynamicExpression {
    Value(DynamicValue),
    Binding(Arc<Template>),
    Array(Vec<DynamicExpression>),
    Map(IndexMap<String, DynamicExpression>),
}

impl Default for DynamicExpression {
    fn default() -> Self {
        DynamicExpression::Value(DynamicValue::Null)
    }
}

impl DynamicExpression {
    /// Parse every string in the value looking for bindings
    pub fn parse(value: DynamicValue) -> Result<Self, ParseError> {
        let expr = match value {
            DynamicValue::String(raw) if contains_binding(&raw) => {
                DynamicExpression::Binding(Arc::new(Template::parse(&raw)?))
            }
            DynamicValue::String(raw) if raw.contains(ESCAPED_OPEN) => {
                DynamicExpression::Value(raw.replace(ESCAPED_OPEN, OPEN).into())
            }
            DynamicValue::Array(items) => {
                let items = items
                    .into_iter()
                    .map(DynamicExpression::parse)
                    .collect::<Result<Vec<_>, _>>()?;
                if items.iter().all(DynamicExpression::is_value) {
                    DynamicExpression::Value(DynamicValue::Array(
                        items.into_iter().map(DynamicExpression::into_value).collect(),
                    ))
                } else {
                    DynamicExpression::Array(items)
                }
            }
            DynamicValue::Map(entries) => {
                let entries = entries
                    .into_iter()
                    .map(|(k, v)| DynamicExpression::parse(v).map(|v| (k, v)))
                    .collect::<Result<IndexMap<_, _>, _>>()?;
                if entries.values().all(DynamicExpression::is_value) {
                    DynamicExpression::Value(DynamicValue::Map(
                        entries
                            .into_iter()
                            .map(|(k, v)| (k, v.into_value()))
                            .collect(),
                    ))
                } else {
                    DynamicExpression::Map(entries)
                }
            }
            value => DynamicExpression::Value(value),
        };
        Ok(expr)
    }

    fn is_value(&self) -> bool {
        matches!(self, DynamicExpression::Value(_))
    }

    fn into_value(self) -> DynamicValue {
        match self {
            DynamicExpression::Value(value) => value,
            _ => DynamicValue::Null,
        }
    }

    /// Returns true if no binding appears anywhere in the value
    pub fn is_constant(&self) -> bool {
        self.is_value()
    }

    /// Ids of every context read by the expression, without duplicates
    pub fn context_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        self.collect_context_ids(&mut ids);
        ids
    }

    fn collect_context_ids(&self, ids: &mut Vec<String>) {
        match self {
            DynamicExpression::Value(_) => {}
            DynamicExpression::Binding(template) => {
                for id in template.context_ids() {
                    if !ids.contains(id) {
                        ids.push(id.clone());
                    }
                }
            }
            DynamicExpression::Array(items) => {
                items.iter().for_each(|item| item.collect_context_ids(ids))
            }
            DynamicExpression::Map(entries) => entries
                .values()
                .for_each(|value| value.collect_context_ids(ids)),
        }
    }

    /// Evaluate every binding, returning a plain value
    pub fn evaluate<R: Resolver + ?Sized>(&self, resolver: &R) -> DynamicValue {
        match self {
            DynamicExpression::Value(value) => value.clone(),
            DynamicExpression::Binding(template) => template.evaluate(resolver),
            DynamicExpression::Array(items) => DynamicValue::Array(
                items.iter().map(|item| item.evaluate(resolver)).collect(),
            ),
            DynamicExpression::Map(entries) => DynamicValue::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.evaluate(resolver)))
                    .collect::<Map>(),
            ),
        }
    }
}

impl From<DynamicValue> for DynamicExpression {
    fn from(value: DynamicValue) -> Self {
        DynamicExpression::Value(value)
    }
}

impl Serialize for DynamicExpression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DynamicExpression::Value(value) => value.serialize(serializer),
            DynamicExpression::Binding(template) => serializer.serialize_str(template.as_str()),
            DynamicExpression::Array(items) => items.serialize(serializer),
            DynamicExpression::Map(entries) => entries.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for DynamicExpression {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = DynamicValue::deserialize(deserializer)?;
        DynamicExpression::parse(value).map_err(serde::de::Error::custom)
    }
}
