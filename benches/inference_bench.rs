//! End-to-end inference benchmarks.
//!
//! Scenes are generated: a chain of methods handing an object down, and a
//! fan of callers passing differently shaped objects to one callee.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tsinfer::ir::{ClassBuilder, ClassSignature, EtsType, MethodBuilder, MethodSignature, SceneBuilder, Value};
use tsinfer::{InferenceOptions, Scene, TypeInferenceManager};

fn call_static(name: &str, args: Vec<Value>) -> Value {
    Value::StaticCall {
        method: MethodSignature::new(ClassSignature::new("Chain", "main.ts"), name),
        args,
    }
}

/// `step0(x) { x.f0 = 0; return step1(x); } .. stepN(x) { return x.fN; }`
fn chain_scene(length: usize) -> Scene {
    let mut class = ClassBuilder::new("Chain");
    for i in 0..length {
        let mut m = MethodBuilder::new(&format!("step{i}")).param("x");
        m.assign(Value::local("x"), Value::Parameter { index: 0 });
        m.assign(
            Value::field(Value::local("x"), &format!("f{i}")),
            Value::number(i as f64),
        );
        if i + 1 < length {
            m.assign(
                Value::local("r"),
                call_static(&format!("step{}", i + 1), vec![Value::local("x")]),
            );
        } else {
            m.assign(Value::local("r"), Value::field(Value::local("x"), "f0"));
        }
        m.ret(Some(Value::local("r")));
        class = class.method(m);
    }

    let mut main = MethodBuilder::new("main");
    main.assign(
        Value::local("o"),
        Value::New {
            ty: EtsType::class("Obj", "main.ts"),
        },
    );
    main.assign(Value::local("v"), call_static("step0", vec![Value::local("o")]));
    main.ret(Some(Value::local("v")));

    SceneBuilder::new()
        .class(class.method(main))
        .class(ClassBuilder::new("Obj"))
        .build()
        .unwrap_or_default()
}

/// `width` callers each pass an object with a distinct field to `sink`.
fn fan_scene(width: usize) -> Scene {
    let mut class = ClassBuilder::new("Chain");
    let mut sink = MethodBuilder::new("sink").param("x");
    sink.assign(Value::local("x"), Value::Parameter { index: 0 });
    sink.ret(Some(Value::local("x")));
    class = class.method(sink);

    for i in 0..width {
        let mut caller = MethodBuilder::new(&format!("caller{i}"));
        caller.assign(
            Value::local("o"),
            Value::New {
                ty: EtsType::class("Obj", "main.ts"),
            },
        );
        caller.assign(
            Value::field(Value::local("o"), &format!("g{i}")),
            Value::string("s"),
        );
        caller.call(call_static("sink", vec![Value::local("o")]));
        caller.ret(None);
        class = class.method(caller);
    }

    SceneBuilder::new()
        .class(class)
        .class(ClassBuilder::new("Obj"))
        .build()
        .unwrap_or_default()
}

fn entries_named(scene: &Scene, prefix: &str) -> Vec<tsinfer::MethodId> {
    scene
        .methods()
        .iter()
        .filter(|m| m.name().starts_with(prefix))
        .map(|m| m.id)
        .collect()
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("inference_chain");
    for length in [4, 16, 64] {
        let scene = chain_scene(length);
        let entries = entries_named(&scene, "main");
        group.bench_with_input(BenchmarkId::new("analyze", length), &length, |b, _| {
            b.iter(|| {
                let manager = TypeInferenceManager::new(&scene, InferenceOptions::default());
                black_box(manager.analyze(&entries, None))
            });
        });
    }
    group.finish();
}

fn bench_fan(c: &mut Criterion) {
    let mut group = c.benchmark_group("inference_fan");
    for width in [4, 16, 64] {
        let scene = fan_scene(width);
        let entries = entries_named(&scene, "caller");
        group.bench_with_input(BenchmarkId::new("analyze", width), &width, |b, _| {
            b.iter(|| {
                let manager = TypeInferenceManager::new(&scene, InferenceOptions::default());
                black_box(manager.analyze(&entries, None))
            });
        });
    }
    group.finish();
}

criterion_group!(inference_benches, bench_chain, bench_fan);
criterion_main!(inference_benches);
