// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Freeze and clone over object graphs.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use understory_dependency::{
    ChangeKind, ChangedHandler, ClassId, DependencyObject, Freezable, PropertyError, PropertyId,
    PropertyMetadataBuilder, PropertyRegistry, Value, ValueType,
};

struct Brushes {
    registry: Arc<PropertyRegistry>,
    brush: ClassId,
    color: PropertyId,
    inner: PropertyId,
}

fn brushes() -> Brushes {
    let registry = Arc::new(PropertyRegistry::new());
    let brush = registry
        .register_class("Brush", Some(ClassId::FREEZABLE))
        .unwrap();
    let color = registry
        .register("Color", ValueType::INT64, brush, None, None)
        .unwrap();
    let inner = registry
        .register("Inner", ValueType::Class(brush), brush, None, None)
        .unwrap();
    Brushes {
        registry,
        brush,
        color,
        inner,
    }
}

#[test]
fn nested_freeze_keeps_the_same_child() {
    let b = brushes();
    let a = Freezable::new(&b.registry, b.brush).unwrap();
    let child = Freezable::new(&b.registry, b.brush).unwrap();
    a.set_value(b.inner, &child).unwrap();

    a.freeze().unwrap();
    assert!(a.is_frozen());
    assert!(child.is_frozen());
    let held = a.get_value(b.inner).unwrap().as_freezable().unwrap();
    assert!(held.ptr_eq(&child));
}

#[test]
fn nested_clone_copies_the_child() {
    let b = brushes();
    let a = Freezable::new(&b.registry, b.brush).unwrap();
    let child = Freezable::new(&b.registry, b.brush).unwrap();
    child.set_value(b.color, 0xff00ff_i64).unwrap();
    a.set_value(b.inner, &child).unwrap();

    let copy = a.clone_freezable().unwrap();
    assert!(!copy.is_frozen());
    let copied = copy.get_value(b.inner).unwrap().as_freezable().unwrap();
    assert!(!copied.ptr_eq(&child));
    assert!(!copied.is_frozen());
    assert_eq!(
        copied.read_local_value(b.color).unwrap(),
        child.read_local_value(b.color).unwrap()
    );
}

#[test]
fn failed_freeze_changes_nothing() {
    let b = brushes();
    let any = b
        .registry
        .register("Tag", ValueType::Any, b.brush, None, None)
        .unwrap();
    let element = b
        .registry
        .register_class("Element", Some(ClassId::DEPENDENCY_OBJECT))
        .unwrap();

    let a = Freezable::new(&b.registry, b.brush).unwrap();
    let child = Freezable::new(&b.registry, b.brush).unwrap();
    a.set_value(b.inner, &child).unwrap();
    child
        .set_value(any, DependencyObject::new(&b.registry, element).unwrap())
        .unwrap();

    let notified = Arc::new(AtomicUsize::new(0));
    let seen = notified.clone();
    a.add_changed_handler(Some(&ChangedHandler::new(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    })))
    .unwrap();

    let err = a.freeze().unwrap_err();
    assert!(matches!(err, PropertyError::InvalidOperation(_)));
    assert!(!a.is_frozen());
    assert!(!child.is_frozen());
    assert_eq!(notified.load(Ordering::SeqCst), 0);

    // Removing the blocker makes the graph freezable again.
    child.clear_value(any).unwrap();
    a.freeze().unwrap();
    assert!(child.is_frozen());
}

#[test]
fn frozen_notification_is_last_and_single() {
    let b = brushes();
    let a = Freezable::new(&b.registry, b.brush).unwrap();
    let kinds = Arc::new(std::sync::Mutex::new(Vec::new()));
    let log = kinds.clone();
    a.add_changed_handler(Some(&ChangedHandler::new(move |args| {
        let label = match args.kind {
            ChangeKind::Property(_) => "property",
            ChangeKind::SubPropertyChanged => "sub",
            ChangeKind::Frozen => "frozen",
        };
        log.lock().unwrap().push(label);
    })))
    .unwrap();

    a.set_value(b.color, 1_i64).unwrap();
    a.freeze().unwrap();
    a.freeze().unwrap();
    assert!(a.set_value(b.color, 2_i64).is_err());

    assert_eq!(*kinds.lock().unwrap(), vec!["property", "frozen"]);
}

#[test]
fn child_changes_bubble_to_host() {
    let b = brushes();
    let a = Freezable::new(&b.registry, b.brush).unwrap();
    let child = Freezable::new(&b.registry, b.brush).unwrap();
    a.set_value(b.inner, &child).unwrap();

    let subs = Arc::new(AtomicUsize::new(0));
    let seen = subs.clone();
    a.add_changed_handler(Some(&ChangedHandler::new(move |args| {
        if matches!(args.kind, ChangeKind::SubPropertyChanged) {
            seen.fetch_add(1, Ordering::SeqCst);
        }
    })))
    .unwrap();

    child.set_value(b.color, 3_i64).unwrap();
    child.set_value(b.color, 4_i64).unwrap();
    assert_eq!(subs.load(Ordering::SeqCst), 2);
}

#[test]
fn frozen_graph_is_readable_everywhere() {
    let b = brushes();
    let a = Freezable::new(&b.registry, b.brush).unwrap();
    let child = Freezable::new(&b.registry, b.brush).unwrap();
    child.set_value(b.color, 9_i64).unwrap();
    a.set_value(b.inner, &child).unwrap();
    a.freeze().unwrap();

    let (color, inner) = (b.color, b.inner);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let a = a.clone();
            std::thread::spawn(move || {
                let child = a.get_value(inner).unwrap().as_freezable().unwrap();
                child.get_value(color).unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), Value::Int64(9));
    }
}

#[test]
fn mutable_freezables_stay_thread_bound() {
    let b = brushes();
    let a = Freezable::new(&b.registry, b.brush).unwrap();
    let remote = a.clone();
    let color = b.color;
    std::thread::spawn(move || {
        assert!(matches!(
            remote.get_value(color),
            Err(PropertyError::ThreadAffinity)
        ));
        assert!(matches!(
            remote.freeze(),
            Err(PropertyError::ThreadAffinity)
        ));
        assert!(matches!(
            remote.get_as_frozen(),
            Err(PropertyError::ThreadAffinity)
        ));
        assert!(!remote.is_frozen());
    })
    .join()
    .unwrap();
}

#[test]
fn clone_on_another_thread_is_owned_there() {
    let b = brushes();
    let a = Freezable::new(&b.registry, b.brush).unwrap();
    a.set_value(b.color, 5_i64).unwrap();
    a.freeze().unwrap();

    let color = b.color;
    let remote = a.clone();
    let copy_owner = std::thread::spawn(move || {
        let copy = remote.clone_freezable().unwrap();
        copy.set_value(color, 6_i64).unwrap();
        copy.owner_thread()
    })
    .join()
    .unwrap();
    assert!(copy_owner.is_some());
    assert_ne!(copy_owner, Some(a.registry().thread_context().current()));
}

#[test]
fn current_value_clones_and_frozen_copies() {
    let b = brushes();
    let level = b
        .registry
        .register(
            "Level",
            ValueType::INT64,
            b.brush,
            Some(
                PropertyMetadataBuilder::new()
                    .coerce(|_, base| Ok(Value::from(base.as_i64().unwrap_or(0).min(3))))
                    .build(),
            ),
            None,
        )
        .unwrap();
    let a = Freezable::new(&b.registry, b.brush).unwrap();
    a.set_value(level, 8_i64).unwrap();

    let frozen_base = a.get_as_frozen().unwrap();
    assert!(frozen_base.is_frozen());
    assert_eq!(frozen_base.read_local_value(level).unwrap(), Value::Int64(8));
    assert_eq!(frozen_base.get_value(level).unwrap(), Value::Int64(3));

    let frozen_current = a.get_current_value_as_frozen().unwrap();
    assert_eq!(frozen_current.read_local_value(level).unwrap(), Value::Int64(3));
    assert!(!a.is_frozen());
}
