use pretty_assertions::assert_eq;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use tracing_subscriber::{prelude::*, EnvFilter};

use trellis::context::Context;
use trellis::engine::Engine;
use trellis::error::ErrorKind;
use trellis::expression::{Resolver, Template};
use trellis::json::{DynamicValue, Map, Path};
use trellis::tree::NodeId;

fn init() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(EnvFilter::from_default_env())
        .try_init()
        .unwrap_or(());
}

fn record(engine: &mut Engine, node: NodeId, raw: &str) -> Rc<RefCell<Vec<DynamicValue>>> {
    let received = Rc::new(RefCell::new(Vec::new()));
    let sink = received.clone();
    engine
        .subscribe(node, Arc::new(Template::parse(raw).unwrap()), move |value| {
            sink.borrow_mut().push(value.clone())
        })
        .unwrap();
    received
}

#[test]
fn test_evaluation_is_repeatable() {
    let mut contexts = Map::new();
    contexts.insert(
        "order".into(),
        json!({"items": [{"price": 2.5, "qty": 2}, {"price": 1, "qty": 3}], "coupon": null}).into(),
    );

    for raw in [
        "@{order.items[0].price * order.items[0].qty + order.items[1].price * order.items[1].qty}",
        "Total: @{order.items[1].qty > 2 ? 'bulk' : 'single'}",
        "@{order.coupon == null && !(order.items[0].qty < 1)}",
        "@{order.missing.field}",
    ] {
        let template = Template::parse(raw).unwrap();
        let first = template.evaluate(&contexts);
        let second = template.evaluate(&contexts);
        assert_eq!(first, second, "{raw}");
    }

    let total = Template::parse("@{order.items[0].price * order.items[0].qty}").unwrap();
    assert_eq!(total.evaluate(&contexts), DynamicValue::Double(5.0));
    assert_eq!(contexts.resolve("missing"), None);
}

#[test]
fn test_nearest_declaration_shadows_ancestors() {
    init();
    let mut engine = Engine::new();
    let root = engine.create_root();
    let child = engine.add_child(root).unwrap();
    let grandchild = engine.add_child(child).unwrap();
    let sibling = engine.add_child(root).unwrap();
    engine.declare_context(root, Context::new("x", 1)).unwrap();
    engine.declare_context(child, Context::new("x", 2)).unwrap();

    assert_eq!(engine.resolve("x", grandchild), Some(&DynamicValue::Int(2)));
    assert_eq!(engine.resolve("x", child), Some(&DynamicValue::Int(2)));
    assert_eq!(engine.resolve("x", sibling), Some(&DynamicValue::Int(1)));

    // only subscriptions reading the mutated instance are updated
    let inner = record(&mut engine, grandchild, "@{x}");
    let outer = record(&mut engine, sibling, "@{x}");
    engine
        .set_context("x", None, DynamicValue::Int(3), sibling)
        .unwrap();
    assert_eq!(*inner.borrow(), vec![DynamicValue::Int(2)]);
    assert_eq!(
        *outer.borrow(),
        vec![DynamicValue::Int(1), DynamicValue::Int(3)]
    );

    engine
        .set_context("x", None, DynamicValue::Int(4), grandchild)
        .unwrap();
    assert_eq!(
        *inner.borrow(),
        vec![DynamicValue::Int(2), DynamicValue::Int(4)]
    );
    assert_eq!(engine.resolve("x", root), Some(&DynamicValue::Int(3)));
}

#[test]
fn test_path_updates_leave_siblings_untouched() {
    init();
    let mut engine = Engine::new();
    let root = engine.create_root();
    engine
        .declare_context(root, Context::new("ctx", json!({"a": {"b": 1, "c": 2}})))
        .unwrap();
    let c = record(&mut engine, root, "@{ctx.a.c}");
    let b = record(&mut engine, root, "@{ctx.a.b}");

    engine
        .set_context(
            "ctx",
            Some(&Path::parse("a.b").unwrap()),
            DynamicValue::Int(9),
            root,
        )
        .unwrap();

    assert_eq!(
        engine.resolve("ctx", root),
        Some(&DynamicValue::from(json!({"a": {"b": 9, "c": 2}})))
    );
    assert_eq!(*c.borrow(), vec![DynamicValue::Int(2)]);
    assert_eq!(*b.borrow(), vec![DynamicValue::Int(1), DynamicValue::Int(9)]);
}

#[test]
fn test_path_updates_create_intermediate_values() {
    let mut engine = Engine::new();
    let root = engine.create_root();
    engine
        .declare_context(root, Context::new("ctx", json!({})))
        .unwrap();

    engine
        .set_context(
            "ctx",
            Some(&Path::parse("address.lines[1]").unwrap()),
            "second".into(),
            root,
        )
        .unwrap();

    assert_eq!(
        engine.resolve("ctx", root),
        Some(&DynamicValue::from(
            json!({"address": {"lines": [null, "second"]}})
        ))
    );
}

#[test]
fn test_conflicting_paths_are_a_no_op() {
    init();
    let mut engine = Engine::new();
    let root = engine.create_root();
    engine
        .declare_context(root, Context::new("ctx", json!({"a": "text"})))
        .unwrap();
    let values = record(&mut engine, root, "@{ctx.a}");

    let err = engine
        .set_context(
            "ctx",
            Some(&Path::parse("a.b").unwrap()),
            DynamicValue::Int(9),
            root,
        )
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StructuralConflict);
    assert_eq!(
        engine.resolve("ctx", root),
        Some(&DynamicValue::from(json!({"a": "text"})))
    );
    assert_eq!(*values.borrow(), vec![DynamicValue::from("text")]);
}

#[test]
fn test_equal_values_do_not_notify() {
    init();
    let mut engine = Engine::new();
    let root = engine.create_root();
    engine.declare_context(root, Context::new("x", 1)).unwrap();
    let values = record(&mut engine, root, "@{x}");

    engine
        .set_context("x", None, DynamicValue::Int(1), root)
        .unwrap();
    assert_eq!(*values.borrow(), vec![DynamicValue::Int(1)]);

    engine
        .set_context("x", None, DynamicValue::Int(2), root)
        .unwrap();
    assert_eq!(
        *values.borrow(),
        vec![DynamicValue::Int(1), DynamicValue::Int(2)]
    );
}

#[test]
fn test_unchanged_results_do_not_notify() {
    let mut engine = Engine::new();
    let root = engine.create_root();
    engine
        .declare_context(root, Context::new("user", json!({"name": "neo", "age": 30})))
        .unwrap();
    let name = record(&mut engine, root, "Name: @{user.name}");

    engine
        .set_context(
            "user",
            Some(&Path::parse("age").unwrap()),
            DynamicValue::Int(31),
            root,
        )
        .unwrap();
    assert_eq!(*name.borrow(), vec![DynamicValue::from("Name: neo")]);
}

#[test]
fn test_destroyed_subtrees_receive_no_updates() {
    init();
    let mut engine = Engine::new();
    let root = engine.create_root();
    engine.declare_context(root, Context::new("shared", 1)).unwrap();
    let child = engine.add_child(root).unwrap();
    engine.declare_context(child, Context::new("local", 1)).unwrap();
    let leaf = engine.add_child(child).unwrap();
    let local = record(&mut engine, leaf, "@{local}");
    let shared = record(&mut engine, leaf, "@{shared}");

    let removed = engine.destroy(child);
    assert_eq!(removed, vec![leaf, child]);
    assert!(!engine.tree().contains(leaf));
    assert!(engine.subscriptions().is_empty());

    engine
        .set_context("shared", None, DynamicValue::Int(2), root)
        .unwrap();
    assert_eq!(*shared.borrow(), vec![DynamicValue::Int(1)]);
    assert_eq!(*local.borrow(), vec![DynamicValue::Int(1)]);

    // the torn down context is no longer reachable
    let err = engine
        .set_context("local", None, DynamicValue::Int(2), leaf)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedContext);
}

#[test]
fn test_undefined_arithmetic_does_not_notify() {
    let mut engine = Engine::new();
    let root = engine.create_root();
    engine
        .declare_context(root, Context::new("ctx", json!({"x": 3, "other": 0})))
        .unwrap();
    let values = record(&mut engine, root, "@{ctx.x % 0.0}");

    engine
        .set_context(
            "ctx",
            Some(&Path::parse("other").unwrap()),
            DynamicValue::Int(1),
            root,
        )
        .unwrap();
    assert_eq!(*values.borrow(), vec![DynamicValue::Null]);
}
