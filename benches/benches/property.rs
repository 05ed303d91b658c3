// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for `understory_dependency`.

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::{Arc, Once};

use understory_dependency::{
    ChangedHandler, ClassId, DependencyObject, EffectiveValueStore, Freezable, PropertyId,
    PropertyMetadata, PropertyMetadataBuilder, PropertyRegistry, Value, ValueType,
};

struct Fixture {
    registry: Arc<PropertyRegistry>,
    element: ClassId,
    brush: ClassId,
    width: PropertyId,
    width_cb: PropertyId,
    text: PropertyId,
    opacity: PropertyId,
    inner: PropertyId,
}

fn fixture() -> Fixture {
    let registry = Arc::new(PropertyRegistry::new());
    let element = registry
        .register_class("Element", Some(ClassId::DEPENDENCY_OBJECT))
        .unwrap();
    let brush = registry
        .register_class("Brush", Some(ClassId::FREEZABLE))
        .unwrap();
    let width = registry
        .register(
            "Width",
            ValueType::FLOAT64,
            element,
            Some(PropertyMetadata::new(0.0)),
            None,
        )
        .unwrap();
    let width_cb = registry
        .register(
            "ClampedWidth",
            ValueType::FLOAT64,
            element,
            Some(
                PropertyMetadataBuilder::new()
                    .coerce(|_, base| Ok(Value::from(base.as_f64().unwrap_or(0.0).max(0.0))))
                    .on_changed(|_, _| Ok(()))
                    .build(),
            ),
            None,
        )
        .unwrap();
    let text = registry
        .register("Text", ValueType::String, element, None, None)
        .unwrap();
    let opacity = registry
        .register("Opacity", ValueType::FLOAT64, brush, None, None)
        .unwrap();
    let inner = registry
        .register("Inner", ValueType::Class(brush), brush, None, None)
        .unwrap();
    Fixture {
        registry,
        element,
        brush,
        width,
        width_cb,
        text,
        opacity,
        inner,
    }
}

/// Builds a chain of `depth` brushes, each holding the next.
fn brush_chain(fx: &Fixture, depth: usize) -> Freezable {
    let root = Freezable::new(&fx.registry, fx.brush).unwrap();
    let mut tail = root.clone();
    for i in 0..depth {
        let next = Freezable::new(&fx.registry, fx.brush).unwrap();
        next.set_value(fx.opacity, i as f64).unwrap();
        tail.set_value(fx.inner, &next).unwrap();
        tail = next;
    }
    root
}

fn bench_property(c: &mut Criterion) {
    static PRINT_SIZES: Once = Once::new();
    PRINT_SIZES.call_once(|| {
        eprintln!(
            "sizes: EffectiveValueStore={} Value={}",
            size_of::<EffectiveValueStore>(),
            size_of::<Value>(),
        );
    });

    let fx = fixture();

    let mut group = c.benchmark_group("property/read");

    group.bench_function("local", |b| {
        let element = DependencyObject::new(&fx.registry, fx.element).unwrap();
        element.set_value(fx.width, 100.0).unwrap();
        b.iter(|| black_box(element.get_value(fx.width).unwrap()));
    });

    group.bench_function("default", |b| {
        let element = DependencyObject::new(&fx.registry, fx.element).unwrap();
        b.iter(|| black_box(element.get_value(fx.width).unwrap()));
    });

    group.bench_function("frozen", |b| {
        let brush = Freezable::new(&fx.registry, fx.brush).unwrap();
        brush.set_value(fx.opacity, 0.5).unwrap();
        brush.freeze().unwrap();
        b.iter(|| black_box(brush.get_value(fx.opacity).unwrap()));
    });

    group.finish();

    let mut group = c.benchmark_group("property/mutate");

    group.bench_function("set_value/f64/no_callback", |b| {
        b.iter_batched(
            || DependencyObject::new(&fx.registry, fx.element).unwrap(),
            |element| {
                element.set_value(fx.width, 123.0).unwrap();
                black_box(element);
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("set_value/f64/with_callbacks", |b| {
        b.iter_batched(
            || DependencyObject::new(&fx.registry, fx.element).unwrap(),
            |element| {
                element.set_value(fx.width_cb, 123.0).unwrap();
                black_box(element);
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("set_value/f64/with_handler", |b| {
        let handler = ChangedHandler::new(|args| {
            black_box(&args.kind);
        });
        b.iter_batched(
            || {
                let element = DependencyObject::new(&fx.registry, fx.element).unwrap();
                element.add_changed_handler(Some(&handler)).unwrap();
                element
            },
            |element| {
                element.set_value(fx.width, 123.0).unwrap();
                black_box(element);
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("set_value/string", |b| {
        b.iter_batched(
            || DependencyObject::new(&fx.registry, fx.element).unwrap(),
            |element| {
                element.set_value(fx.text, "hello world").unwrap();
                black_box(element);
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();

    let mut group = c.benchmark_group("freezable");

    for depth in [1_usize, 8, 32] {
        group.bench_function(BenchmarkId::new("freeze", depth), |b| {
            b.iter_batched(
                || brush_chain(&fx, depth),
                |root| {
                    root.freeze().unwrap();
                    black_box(root);
                },
                BatchSize::SmallInput,
            );
        });

        group.bench_function(BenchmarkId::new("clone", depth), |b| {
            let root = brush_chain(&fx, depth);
            b.iter(|| black_box(root.clone_freezable().unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_property);
criterion_main!(benches);
