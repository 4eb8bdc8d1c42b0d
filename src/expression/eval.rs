use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::trace;

use super::ast::{Accessor, BinaryOp, Node, UnaryOp};
use crate::json::{DynamicValue, Map, Segment};

/// Source of root values for the context ids referenced by an expression
///
/// Returning `None` means the id is not visible. The evaluator treats it as `Null`.
pub trait Resolver {
    fn resolve(&self, id: &str) -> Option<&DynamicValue>;
}

impl<R: Resolver + ?Sized> Resolver for &R {
    fn resolve(&self, id: &str) -> Option<&DynamicValue> {
        (**self).resolve(id)
    }
}

impl Resolver for HashMap<String, DynamicValue> {
    fn resolve(&self, id: &str) -> Option<&DynamicValue> {
        self.get(id)
    }
}

impl Resolver for Map {
    fn resolve(&self, id: &str) -> Option<&DynamicValue> {
        self.get(id)
    }
}

/// Evaluate an expression tree
///
/// Evaluation never fails: missing contexts, missing fields, out of range indexes and
/// operators applied to incompatible kinds all produce `Null`.
pub fn evaluate<R: Resolver + ?Sized>(node: &Node, resolver: &R) -> DynamicValue {
    match node {
        Node::Literal(value) => value.clone(),
        Node::Path { context, accessors } => {
            path(context, accessors, resolver).unwrap_or_default()
        }
        Node::Unary { op, operand } => unary(*op, evaluate(operand, resolver)),
        Node::Binary { op, lhs, rhs } => binary(*op, lhs, rhs, resolver),
        Node::Conditional {
            condition,
            then,
            otherwise,
        } => match evaluate(condition, resolver) {
            DynamicValue::Bool(true) => evaluate(then, resolver),
            DynamicValue::Bool(false) => evaluate(otherwise, resolver),
            _ => DynamicValue::Null,
        },
    }
}

fn path<R: Resolver + ?Sized>(
    context: &str,
    accessors: &[Accessor],
    resolver: &R,
) -> Option<DynamicValue> {
    let Some(root) = resolver.resolve(context) else {
        trace!(context, "unresolved context");
        return None;
    };

    let mut current = root;
    for accessor in accessors {
        current = match accessor {
            Accessor::Static(Segment::Key(key)) => current.get(key)?,
            Accessor::Static(Segment::Index(i)) => current.at(*i)?,
            Accessor::Dynamic(node) => match evaluate(node, resolver) {
                DynamicValue::Int(i) => current.at(usize::try_from(i).ok()?)?,
                DynamicValue::String(key) => current.get(&key)?,
                _ => return None,
            },
        };
    }
    Some(current.clone())
}

fn unary(op: UnaryOp, value: DynamicValue) -> DynamicValue {
    match (op, value) {
        (UnaryOp::Not, DynamicValue::Bool(b)) => DynamicValue::Bool(!b),
        (UnaryOp::Neg, DynamicValue::Int(i)) => i.checked_neg().map(DynamicValue::Int).into(),
        (UnaryOp::Neg, DynamicValue::Double(d)) => DynamicValue::Double(-d),
        _ => DynamicValue::Null,
    }
}

fn binary<R: Resolver + ?Sized>(op: BinaryOp, lhs: &Node, rhs: &Node, resolver: &R) -> DynamicValue {
    use DynamicValue::*;

    // logical operators short-circuit but still require booleans on both sides
    match op {
        BinaryOp::And | BinaryOp::Or => {
            let Bool(left) = evaluate(lhs, resolver) else {
                return Null;
            };
            if (op == BinaryOp::And && !left) || (op == BinaryOp::Or && left) {
                return Bool(left);
            }
            return match evaluate(rhs, resolver) {
                Bool(right) => Bool(right),
                _ => Null,
            };
        }
        _ => {}
    }

    let left = evaluate(lhs, resolver);
    let right = evaluate(rhs, resolver);
    match op {
        BinaryOp::Eq => equals(&left, &right).map(Bool).into(),
        BinaryOp::Ne => equals(&left, &right).map(|eq| Bool(!eq)).into(),
        BinaryOp::Lt => compare(&left, &right).map(|o| Bool(o.is_lt())).into(),
        BinaryOp::Le => compare(&left, &right).map(|o| Bool(o.is_le())).into(),
        BinaryOp::Gt => compare(&left, &right).map(|o| Bool(o.is_gt())).into(),
        BinaryOp::Ge => compare(&left, &right).map(|o| Bool(o.is_ge())).into(),
        BinaryOp::Add => match (left, right) {
            (String(a), String(b)) => String(a + &b),
            (a, b) => arithmetic(&a, &b, i64::checked_add, |a, b| a + b),
        },
        BinaryOp::Sub => arithmetic(&left, &right, i64::checked_sub, |a, b| a - b),
        BinaryOp::Mul => arithmetic(&left, &right, i64::checked_mul, |a, b| a * b),
        BinaryOp::Div => match (&left, &right) {
            (_, Int(0)) => Null,
            // integer division only when exact
            (Int(a), Int(b)) if a.checked_rem(*b) == Some(0) => a.checked_div(*b).map(Int).into(),
            (Int(a), Int(b)) => number(*a as f64 / *b as f64),
            _ => arithmetic(&left, &right, |_, _| None, |a, b| a / b),
        },
        BinaryOp::Rem => match (&left, &right) {
            (_, Int(0)) => Null,
            _ => arithmetic(&left, &right, i64::checked_rem, |a, b| a % b),
        },
        BinaryOp::And | BinaryOp::Or => unreachable!("logical operators are handled above"),
    }
}

/// Equality with `Int`/`Double` coercion
///
/// `Null` compares against anything. Other mismatched kinds cannot be compared and yield `None`.
fn equals(left: &DynamicValue, right: &DynamicValue) -> Option<bool> {
    use DynamicValue::*;
    match (left, right) {
        (Null, _) | (_, Null) => Some(left == right),
        (Int(a), Int(b)) => Some(a == b),
        (Int(_) | Double(_), Int(_) | Double(_)) => Some(left.as_f64() == right.as_f64()),
        (a, b) if a.kind() == b.kind() => Some(a == b),
        _ => None,
    }
}

/// Ordering between two numbers or two strings
fn compare(left: &DynamicValue, right: &DynamicValue) -> Option<Ordering> {
    use DynamicValue::*;
    match (left, right) {
        (Int(a), Int(b)) => Some(a.cmp(b)),
        (Int(_) | Double(_), Int(_) | Double(_)) => left.as_f64()?.partial_cmp(&right.as_f64()?),
        (String(a), String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn arithmetic(
    left: &DynamicValue,
    right: &DynamicValue,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> DynamicValue {
    use DynamicValue::*;
    match (left, right) {
        // integer overflow falls back to floating point
        (Int(a), Int(b)) => int_op(*a, *b)
            .map(Int)
            .unwrap_or_else(|| number(float_op(*a as f64, *b as f64))),
        (Int(_) | Double(_), Int(_) | Double(_)) => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => number(float_op(a, b)),
            _ => Null,
        },
        _ => Null,
    }
}

/// NaN and infinities have no JSON form and degrade to `Null`
fn number(value: f64) -> DynamicValue {
    if value.is_finite() {
        DynamicValue::Double(value)
    } else {
        DynamicValue::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::expression::parser::parse_binding;

    fn eval(src: &str, contexts: serde_json::Value) -> DynamicValue {
        let resolver: Map = match DynamicValue::from(contexts) {
            DynamicValue::Map(map) => map,
            _ => Map::new(),
        };
        let (node, _) = parse_binding(src, 0).unwrap();
        evaluate(&node, &resolver)
    }

    #[test]
    fn it_reads_nested_paths() {
        let contexts = json!({"user": {"name": "neo", "tags": ["a", "b"]}});
        assert_eq!(eval("@{user.name}", contexts.clone()), DynamicValue::from("neo"));
        assert_eq!(eval("@{user.tags[1]}", contexts.clone()), DynamicValue::from("b"));
        assert_eq!(eval("@{user['name']}", contexts), DynamicValue::from("neo"));
    }

    #[test]
    fn it_degrades_missing_values_to_null() {
        let contexts = json!({"user": {"name": "neo", "tags": ["a"]}});
        assert_eq!(eval("@{nobody}", contexts.clone()), DynamicValue::Null);
        assert_eq!(eval("@{user.age}", contexts.clone()), DynamicValue::Null);
        assert_eq!(eval("@{user.tags[5]}", contexts.clone()), DynamicValue::Null);
        assert_eq!(eval("@{user.name.first}", contexts.clone()), DynamicValue::Null);
        assert_eq!(eval("@{user[0]}", contexts), DynamicValue::Null);
    }

    #[test]
    fn it_resolves_dynamic_accessors() {
        let contexts = json!({"list": ["x", "y", "z"], "index": 2, "field": "k", "m": {"k": 1}});
        assert_eq!(eval("@{list[index]}", contexts.clone()), DynamicValue::from("z"));
        assert_eq!(eval("@{list[index - 1]}", contexts.clone()), DynamicValue::from("y"));
        assert_eq!(eval("@{m[field]}", contexts), DynamicValue::Int(1));
    }

    #[test]
    fn it_coerces_numbers_in_comparisons() {
        let contexts = json!({"a": 1, "b": 1.0, "c": 2.5});
        assert_eq!(eval("@{a == b}", contexts.clone()), DynamicValue::Bool(true));
        assert_eq!(eval("@{a < c}", contexts.clone()), DynamicValue::Bool(true));
        assert_eq!(eval("@{a + c}", contexts.clone()), DynamicValue::Double(3.5));
        assert_eq!(eval("@{a + 1}", contexts), DynamicValue::Int(2));
    }

    #[test]
    fn it_returns_null_for_incompatible_kinds() {
        let contexts = json!({"s": "text", "list": [1]});
        assert_eq!(eval("@{s == list}", contexts.clone()), DynamicValue::Null);
        assert_eq!(eval("@{s < list}", contexts.clone()), DynamicValue::Null);
        assert_eq!(eval("@{s + 1}", contexts.clone()), DynamicValue::Null);
        assert_eq!(eval("@{!s}", contexts.clone()), DynamicValue::Null);
        assert_eq!(eval("@{s && true}", contexts), DynamicValue::Null);
    }

    #[test]
    fn it_compares_against_null() {
        let contexts = json!({"a": null, "b": 1});
        assert_eq!(eval("@{a == null}", contexts.clone()), DynamicValue::Bool(true));
        assert_eq!(eval("@{b != null}", contexts.clone()), DynamicValue::Bool(true));
        assert_eq!(eval("@{missing == null}", contexts), DynamicValue::Bool(true));
    }

    #[test]
    fn it_evaluates_logic_and_conditionals() {
        let contexts = json!({"logged": true, "count": 3});
        assert_eq!(
            eval("@{logged && count > 2 ? 'many' : 'few'}", contexts.clone()),
            DynamicValue::from("many")
        );
        assert_eq!(eval("@{!logged || count == 3}", contexts.clone()), DynamicValue::Bool(true));
        assert_eq!(eval("@{count ? 1 : 2}", contexts), DynamicValue::Null);
    }

    #[test]
    fn it_short_circuits_logical_operators() {
        let contexts = json!({"off": false, "on": true, "s": "text"});
        assert_eq!(eval("@{off && s}", contexts.clone()), DynamicValue::Bool(false));
        assert_eq!(eval("@{on || s}", contexts), DynamicValue::Bool(true));
    }

    #[test]
    fn it_does_arithmetic() {
        let contexts = json!({"a": 7, "b": 2});
        assert_eq!(eval("@{a - b * 2}", contexts.clone()), DynamicValue::Int(3));
        assert_eq!(eval("@{a / b}", contexts.clone()), DynamicValue::Double(3.5));
        assert_eq!(eval("@{(a + 1) / b}", contexts.clone()), DynamicValue::Int(4));
        assert_eq!(eval("@{a % b}", contexts.clone()), DynamicValue::Int(1));
        assert_eq!(eval("@{a / 0}", contexts.clone()), DynamicValue::Null);
        assert_eq!(eval("@{-a}", contexts), DynamicValue::Int(-7));
    }

    #[test]
    fn it_never_produces_non_finite_numbers() {
        let contexts = json!({"a": 7, "x": 1.5});
        assert_eq!(eval("@{a % 0.0}", contexts.clone()), DynamicValue::Null);
        assert_eq!(eval("@{x / 0.0}", contexts.clone()), DynamicValue::Null);
        assert_eq!(eval("@{x % 0}", contexts.clone()), DynamicValue::Null);
        assert_eq!(
            eval("@{a % 0.0}", contexts.clone()),
            eval("@{a % 0.0}", contexts)
        );
    }

    #[test]
    fn it_concatenates_strings() {
        let contexts = json!({"first": "Thomas", "last": "Anderson"});
        assert_eq!(
            eval("@{first + ' ' + last}", contexts),
            DynamicValue::from("Thomas Anderson")
        );
    }

    #[test]
    fn it_is_idempotent() {
        let contexts: Map = match DynamicValue::from(json!({"a": {"b": [1, 2]}, "c": 3})) {
            DynamicValue::Map(map) => map,
            _ => unreachable!(),
        };
        let (node, _) = parse_binding("@{a.b[1] + c > 4 ? a : c}", 0).unwrap();
        assert_eq!(evaluate(&node, &contexts), evaluate(&node, &contexts));
    }
}
