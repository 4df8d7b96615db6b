//! Integration tests for the component factory's construction protocol

mod common;

use std::rc::Rc;
use std::time::Duration;

use common::{Behavior, FakeEngine, FakeTemplate, ScriptedPump};
use nodelink_factory::{
    AttachmentState, AttributeSet, CompileMode, CompileStatus, ComponentFactory, ContainerRef,
    Context, FactoryConfig, FactoryError, Ownership, SceneNode, Value,
};
use pretty_assertions::assert_eq;

const BASE: &str = "base:/Views/";
const FOO: &str = "base:/Views/Foo.tmpl";

fn config() -> FactoryConfig {
    FactoryConfig::new()
        .with_base_path(BASE)
        .with_compile_mode(CompileMode::Synchronous)
        .with_ready_timeout(Duration::from_millis(100))
        .with_poll_slice(Duration::from_millis(10))
}

fn factory_with(engine: &Rc<FakeEngine>) -> ComponentFactory {
    ComponentFactory::new(config())
        .with_engine(engine.clone())
        .with_event_pump(ScriptedPump::idle())
}

fn scene() -> (Rc<std::cell::RefCell<SceneNode>>, ContainerRef) {
    let root = SceneNode::new("root").shared();
    let container: ContainerRef = root.clone();
    (root, container)
}

fn none() -> AttributeSet {
    AttributeSet::new()
}

#[test]
fn test_same_template_compiled_once() {
    let engine = FakeEngine::new();
    engine.add(FOO, FakeTemplate::ready(Behavior::Visual));
    let mut factory = factory_with(&engine);
    let (_root, container) = scene();

    factory
        .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Delegated)
        .unwrap();
    factory
        .create(Some(&container), FOO, &none(), &none(), Ownership::Delegated)
        .unwrap();

    assert_eq!(engine.compiles(), 1);
    assert_eq!(factory.cache().uris(), vec![FOO]);
}

#[test]
fn test_immediate_compile_error_is_retried() {
    let engine = FakeEngine::new();
    let mut factory = factory_with(&engine);
    let (_root, container) = scene();

    let err = factory
        .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Delegated)
        .unwrap_err();
    assert!(matches!(err, FactoryError::Compile { ref uri, .. } if uri == FOO));
    assert!(!factory.cache().contains(FOO));

    engine.add(FOO, FakeTemplate::ready(Behavior::Visual));
    factory
        .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Delegated)
        .unwrap();
    assert_eq!(engine.compiles(), 2);
}

#[test]
fn test_contextual_attributes_visible_during_construction() {
    let engine = FakeEngine::new();
    let template = engine.add(FOO, FakeTemplate::ready(Behavior::Visual));
    let mut factory = factory_with(&engine);
    let (_root, container) = scene();

    let contextual = AttributeSet::new().with("title", "X");
    let direct = AttributeSet::new().with("model", 5);
    let instance = factory
        .create(Some(&container), "Foo.tmpl", &contextual, &direct, Ownership::Delegated)
        .unwrap();

    let observed = template.observed.borrow()[0].clone();
    assert_eq!(observed.title, Some(Value::from("X")));
    // direct attributes are never written into the context
    assert_eq!(observed.model, None);
    assert_eq!(instance.property("model"), Some(Value::Int(5)));
    assert_eq!(
        instance.context().unwrap().property("title"),
        Some(Value::from("X"))
    );
}

#[test]
fn test_construction_context_inherits_container_context() {
    let engine = FakeEngine::new();
    let template = engine.add(FOO, FakeTemplate::ready(Behavior::Visual));
    let mut factory = factory_with(&engine);

    let scene_context = Context::root();
    scene_context.set_property("theme", Value::from("dark"));
    let root = SceneNode::new("root")
        .with_context(Rc::clone(&scene_context))
        .shared();
    let container: ContainerRef = root.clone();

    factory
        .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Delegated)
        .unwrap();

    assert_eq!(template.observed.borrow()[0].theme, Some(Value::from("dark")));
}

#[test]
fn test_root_context_used_without_container_context() {
    let engine = FakeEngine::new();
    let template = engine.add(FOO, FakeTemplate::ready(Behavior::Visual));
    let mut factory = factory_with(&engine);
    factory
        .root_context()
        .set_property("theme", Value::from("light"));
    let (_root, container) = scene();

    factory
        .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Delegated)
        .unwrap();

    assert_eq!(template.observed.borrow()[0].theme, Some(Value::from("light")));
}

#[test]
fn test_direct_attribute_tiers() {
    let engine = FakeEngine::new();
    engine.add(FOO, FakeTemplate::ready(Behavior::Visual));
    let strict_uri = "base:/Views/Strict.tmpl";
    engine.add(strict_uri, FakeTemplate::strict());
    let mut factory = factory_with(&engine);
    let (_root, container) = scene();

    let direct = AttributeSet::new()
        .with("width", 20)
        .with("tag", "extra")
        .with("color", "red");

    let loose = factory
        .create(Some(&container), "Foo.tmpl", &none(), &direct, Ownership::Delegated)
        .unwrap();
    assert_eq!(loose.property("width"), Some(Value::Int(20)));
    assert_eq!(loose.property("tag"), Some(Value::from("extra")));

    let strict = factory
        .create(Some(&container), "Strict.tmpl", &none(), &direct, Ownership::Delegated)
        .unwrap();
    assert_eq!(strict.property("width"), Some(Value::Int(20)));
    assert_eq!(strict.property("color"), Some(Value::from("red")));
    // no reflective tier: the undeclared attribute is dropped
    assert_eq!(strict.property("tag"), None);
}

#[test]
fn test_rejected_typed_write_is_dropped() {
    let engine = FakeEngine::new();
    engine.add(FOO, FakeTemplate::ready(Behavior::Visual));
    let mut factory = factory_with(&engine);
    let (_root, container) = scene();

    // width is an int; a string is refused by the typed setter
    let direct = AttributeSet::new().with("width", "wide").with("tag", "kept");
    let instance = factory
        .create(Some(&container), "Foo.tmpl", &none(), &direct, Ownership::Delegated)
        .unwrap();

    assert_eq!(instance.property("width"), Some(Value::Int(10)));
    let widths: Vec<_> = instance
        .properties()
        .into_iter()
        .filter(|(name, _)| name == "width")
        .collect();
    assert_eq!(widths, vec![("width".to_string(), Value::Int(10))]);
    assert_eq!(instance.property("tag"), Some(Value::from("kept")));
}

#[test]
fn test_incompatible_type_releases_object_and_context() {
    let engine = FakeEngine::new();
    let template = engine.add(FOO, FakeTemplate::ready(Behavior::NonVisual));
    let mut factory = factory_with(&engine);
    let (root, container) = scene();

    let err = factory
        .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Tracked)
        .unwrap_err();

    assert_eq!(
        err,
        FactoryError::IncompatibleType {
            uri: FOO.to_string(),
            type_name: "FakeModel".to_string(),
        }
    );
    assert_eq!(template.drops.get(), 1);
    assert_eq!(template.contexts.borrow().len(), 1);
    assert_eq!(template.live_contexts(), 0);
    assert!(root.borrow().children().is_empty());
    assert!(factory.tracker().is_empty());
}

#[test]
fn test_no_object_is_construction_failure() {
    let engine = FakeEngine::new();
    let template = engine.add(FOO, FakeTemplate::ready(Behavior::NoObject));
    let mut factory = factory_with(&engine);
    let (_root, container) = scene();

    let err = factory
        .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Delegated)
        .unwrap_err();

    assert_eq!(err, FactoryError::ConstructionFailed { uri: FOO.to_string() });
    assert_eq!(template.live_contexts(), 0);
}

#[test]
fn test_completion_failure_reports_detail() {
    let engine = FakeEngine::new();
    let template = engine.add(
        FOO,
        FakeTemplate::ready(Behavior::FailCompletion("binding loop".to_string())),
    );
    let mut factory = factory_with(&engine);
    let (root, container) = scene();

    let err = factory
        .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Delegated)
        .unwrap_err();

    assert_eq!(
        err,
        FactoryError::CompletionFailed {
            uri: FOO.to_string(),
            detail: "binding loop".to_string(),
        }
    );
    assert_eq!(template.drops.get(), 1);
    assert_eq!(template.live_contexts(), 0);
    assert!(root.borrow().children().is_empty());
}

#[test]
fn test_missing_container() {
    let engine = FakeEngine::new();
    engine.add(FOO, FakeTemplate::ready(Behavior::Visual));
    let mut factory = factory_with(&engine);

    let err = factory
        .create(None, "Foo.tmpl", &none(), &none(), Ownership::Delegated)
        .unwrap_err();

    assert_eq!(err, FactoryError::NoContainer);
    assert_eq!(engine.compiles(), 0);
}

#[test]
fn test_engine_not_bound() {
    let mut factory = ComponentFactory::new(config());
    let (_root, container) = scene();

    let err = factory
        .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Delegated)
        .unwrap_err();
    assert_eq!(err, FactoryError::EngineNotBound);
}

#[test]
fn test_engine_bound_from_container() {
    let engine = FakeEngine::new();
    engine.add(FOO, FakeTemplate::ready(Behavior::Visual));
    let mut factory = ComponentFactory::new(config()).with_event_pump(ScriptedPump::idle());
    let root = SceneNode::new("root").with_engine(engine.clone()).shared();
    let container: ContainerRef = root.clone();

    assert!(!factory.is_bound());
    factory
        .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Delegated)
        .unwrap();
    assert!(factory.is_bound());
}

#[test]
fn test_loading_template_waits_for_event_loop() {
    let engine = FakeEngine::new();
    let template = engine.add(FOO, FakeTemplate::new(CompileStatus::Loading, Behavior::Visual));
    let pump = ScriptedPump::finishing(&template, 3, CompileStatus::Ready);
    let calls = Rc::clone(&pump.calls);
    let mut factory = ComponentFactory::new(config())
        .with_engine(engine.clone())
        .with_event_pump(pump);
    let (_root, container) = scene();

    let instance = factory
        .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Delegated)
        .unwrap();

    assert!(calls.get() >= 3);
    assert_eq!(instance.state(), AttachmentState::Attached);
}

#[test]
fn test_timeout_keeps_template_cached() {
    let engine = FakeEngine::new();
    let template = engine.add(FOO, FakeTemplate::new(CompileStatus::Loading, Behavior::Visual));
    let mut factory = factory_with(&engine);
    let (_root, container) = scene();

    let err = factory
        .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Delegated)
        .unwrap_err();
    assert_eq!(
        err,
        FactoryError::Timeout {
            uri: FOO.to_string(),
            waited: Duration::from_millis(100),
        }
    );
    assert!(factory.cache().contains(FOO));

    // compilation finishing later is picked up without recompiling
    template.set_status(CompileStatus::Ready);
    factory
        .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Delegated)
        .unwrap();
    assert_eq!(engine.compiles(), 1);
}

#[test]
fn test_zero_poll_slice_still_times_out() {
    let engine = FakeEngine::new();
    engine.add(FOO, FakeTemplate::new(CompileStatus::Loading, Behavior::Visual));
    let config = config()
        .with_ready_timeout(Duration::from_millis(20))
        .with_poll_slice(Duration::ZERO);
    let mut factory = ComponentFactory::new(config).with_engine(engine.clone());
    let (_root, container) = scene();

    let err = factory
        .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Delegated)
        .unwrap_err();
    assert!(matches!(err, FactoryError::Timeout { .. }));
}

#[test]
fn test_error_while_loading_evicts_template() {
    let engine = FakeEngine::new();
    let template = engine.add(FOO, FakeTemplate::new(CompileStatus::Loading, Behavior::Visual));
    let pump = ScriptedPump::finishing(&template, 2, CompileStatus::Error("syntax".to_string()));
    let mut factory = ComponentFactory::new(config())
        .with_engine(engine.clone())
        .with_event_pump(pump);
    let (_root, container) = scene();

    let err = factory
        .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Delegated)
        .unwrap_err();
    assert_eq!(
        err,
        FactoryError::Compile {
            uri: FOO.to_string(),
            detail: "syntax".to_string(),
        }
    );
    assert!(!factory.cache().contains(FOO));

    engine.add(FOO, FakeTemplate::ready(Behavior::Visual));
    factory
        .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Delegated)
        .unwrap();
    assert_eq!(engine.compiles(), 2);
}

#[test]
fn test_batch_skips_incompatible_element() {
    let engine = FakeEngine::new();
    engine.add(FOO, FakeTemplate::ready(Behavior::Visual));
    let mut factory = factory_with(&engine);
    let (root, container) = scene();

    let values: Vec<Value> = (1..=5).map(Value::from).collect();
    let created = factory.create_many(
        "model",
        &values,
        Some(&container),
        "Foo.tmpl",
        &none(),
        Ownership::Delegated,
    );

    let models: Vec<_> = created.iter().map(|i| i.property("model")).collect();
    assert_eq!(
        models,
        vec![
            Some(Value::Int(1)),
            Some(Value::Int(2)),
            Some(Value::Int(4)),
            Some(Value::Int(5))
        ]
    );
    assert_eq!(root.borrow().children().len(), 4);
    assert_eq!(engine.compiles(), 1);
}

#[test]
fn test_batch_value_overrides_base() {
    let engine = FakeEngine::new();
    engine.add(FOO, FakeTemplate::ready(Behavior::Visual));
    let mut factory = factory_with(&engine);
    let (_root, container) = scene();

    let base = AttributeSet::new().with("model", 0).with("color", "red");
    let created = factory.create_many(
        "model",
        &[Value::Int(7), Value::Int(8)],
        Some(&container),
        "Foo.tmpl",
        &base,
        Ownership::Tracked,
    );

    assert_eq!(created.len(), 2);
    for (instance, expected) in created.iter().zip([7, 8]) {
        assert_eq!(instance.property("model"), Some(Value::Int(expected)));
        assert_eq!(instance.property("color"), Some(Value::from("red")));
    }
    assert_eq!(factory.tracker().len(), 2);
}

#[test]
fn test_batch_without_values_or_container() {
    let engine = FakeEngine::new();
    engine.add(FOO, FakeTemplate::ready(Behavior::Visual));
    let mut factory = factory_with(&engine);
    let (_root, container) = scene();

    let created = factory.create_many(
        "model",
        &[],
        Some(&container),
        "Foo.tmpl",
        &none(),
        Ownership::Delegated,
    );
    assert!(created.is_empty());

    let created = factory.create_many(
        "model",
        &[Value::Int(1)],
        None,
        "Foo.tmpl",
        &none(),
        Ownership::Delegated,
    );
    assert!(created.is_empty());
    assert_eq!(engine.compiles(), 0);
}

#[test]
fn test_batch_with_missing_template_is_empty() {
    let engine = FakeEngine::new();
    let mut factory = factory_with(&engine);
    let (_root, container) = scene();

    let created = factory.create_many(
        "model",
        &[Value::Int(1), Value::Int(2)],
        Some(&container),
        "Missing.tmpl",
        &none(),
        Ownership::Delegated,
    );
    assert!(created.is_empty());
}

#[test]
fn test_tracked_destroy_is_idempotent() {
    let engine = FakeEngine::new();
    let template = engine.add(FOO, FakeTemplate::ready(Behavior::Visual));
    let mut factory = factory_with(&engine);
    let (root, container) = scene();

    let instance = factory
        .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Tracked)
        .unwrap();
    let id = instance.id();
    assert!(factory.tracker().is_tracked(id));

    assert!(factory.destroy(id));
    assert!(!factory.destroy(id));
    assert_eq!(factory.flush_releases(), 1);

    assert_eq!(template.drops.get(), 1);
    assert_eq!(template.live_contexts(), 0);
    assert_eq!(instance.state(), AttachmentState::Destroyed);
    assert!(root.borrow().children().is_empty());

    assert_eq!(factory.destroy_all(&[id, id]), 0);
    assert_eq!(factory.flush_releases(), 0);
    assert_eq!(template.drops.get(), 1);
}

#[test]
fn test_destroyed_instances_released_on_next_create() {
    let engine = FakeEngine::new();
    let template = engine.add(FOO, FakeTemplate::ready(Behavior::Visual));
    let mut factory = factory_with(&engine);
    let (root, container) = scene();

    let first = factory
        .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Tracked)
        .unwrap();
    factory.destroy(first.id());
    assert_eq!(factory.tracker().pending_len(), 1);

    factory
        .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Tracked)
        .unwrap();
    assert_eq!(factory.tracker().pending_len(), 0);
    assert_eq!(template.drops.get(), 1);
    assert_eq!(root.borrow().children().len(), 1);
}

#[test]
fn test_delegated_instance_goes_with_its_container() {
    let engine = FakeEngine::new();
    let template = engine.add(FOO, FakeTemplate::ready(Behavior::Visual));
    let mut factory = factory_with(&engine);
    let (root, container) = scene();

    let instance = factory
        .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Delegated)
        .unwrap();
    assert!(!factory.tracker().is_tracked(instance.id()));
    assert!(instance.parent().is_some());

    drop(instance);
    drop(container);
    drop(root);

    assert_eq!(template.drops.get(), 1);
    assert_eq!(template.live_contexts(), 0);
}

#[test]
fn test_teardown_releases_everything() {
    let engine = FakeEngine::new();
    let template = engine.add(FOO, FakeTemplate::ready(Behavior::Visual));
    let mut factory = factory_with(&engine);
    let (root, container) = scene();

    for _ in 0..3 {
        factory
            .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Tracked)
            .unwrap();
    }
    factory
        .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Delegated)
        .unwrap();

    factory.teardown();

    assert_eq!(template.drops.get(), 3);
    assert_eq!(root.borrow().children().len(), 1);
    assert!(factory.tracker().is_empty());
    assert!(factory.cache().is_empty());
    assert!(!factory.is_bound());
}

#[test]
fn test_dropping_factory_releases_tracked_instances() {
    let engine = FakeEngine::new();
    let template = engine.add(FOO, FakeTemplate::ready(Behavior::Visual));
    let (root, container) = scene();

    {
        let mut factory = factory_with(&engine);
        factory
            .create(Some(&container), "Foo.tmpl", &none(), &none(), Ownership::Tracked)
            .unwrap();
    }

    assert_eq!(template.drops.get(), 1);
    assert!(root.borrow().children().is_empty());
}
