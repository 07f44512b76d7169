//! Whole-pipeline scenarios: backward requirements, forward observations,
//! refinement and guessing on small hand-built scenes.

use std::collections::HashSet;
use tsinfer::infer::BackwardFact;
use tsinfer::ir::{
    BinaryOp, ClassBuilder, ClassSignature, EtsType, MethodBuilder, MethodSignature, SceneBuilder,
    Value,
};
use tsinfer::{AccessPathBase, InferenceOptions, Scene, TypeFact, TypeInferenceManager};

fn no_guessing() -> InferenceOptions {
    InferenceOptions {
        guess_types: false,
        ..InferenceOptions::default()
    }
}

fn t_type() -> EtsType {
    EtsType::class("T", "main.ts")
}

// class A {
//   callee(x) { return x.f; }
//   caller() { let o = new T(); o.f = 5; return A.callee(o); }
// }
// class T {}
fn caller_callee_scene() -> Scene {
    let mut callee = MethodBuilder::new("callee").param("x");
    callee.assign(Value::local("x"), Value::Parameter { index: 0 });
    callee.assign(Value::local("r"), Value::field(Value::local("x"), "f"));
    callee.ret(Some(Value::local("r")));

    let mut caller = MethodBuilder::new("caller");
    caller.assign(Value::local("o"), Value::New { ty: t_type() });
    caller.assign(Value::field(Value::local("o"), "f"), Value::number(5.0));
    caller.assign(
        Value::local("v"),
        Value::StaticCall {
            method: MethodSignature::new(ClassSignature::new("A", "main.ts"), "callee"),
            args: vec![Value::local("o")],
        },
    );
    caller.ret(Some(Value::local("v")));

    SceneBuilder::new()
        .class(ClassBuilder::new("A").method(callee).method(caller))
        .class(ClassBuilder::new("T"))
        .build()
        .unwrap()
}

#[test]
fn callee_argument_takes_the_shape_its_caller_passes() {
    let scene = caller_callee_scene();
    let caller = scene.find_method("A", "caller").unwrap();
    let callee = scene.find_method("A", "callee").unwrap();
    let manager = TypeInferenceManager::new(&scene, no_guessing());

    let result = manager.analyze(&[caller], None).unwrap();

    let requirement = BackwardFact::typed(
        AccessPathBase::Arg(0),
        TypeFact::object_with(None, [("f", TypeFact::Unknown)]),
    );
    assert!(
        manager
            .backward_summaries_of(callee)
            .iter()
            .any(|summary| summary.exit.fact == requirement),
        "callee should require an object with `f`"
    );

    let arg = result
        .type_of(callee, &AccessPathBase::Arg(0))
        .and_then(TypeFact::as_object)
        .expect("argument inferred as an object");
    assert_eq!(arg.cls, Some(t_type()));
    assert_eq!(arg.property("f"), Some(&TypeFact::Number));
    assert_eq!(result.return_type_of(callee), Some(&TypeFact::Number));
}

// f(x) { if (typeof x === "number") return x + 1; else return x; }
fn typeof_scene() -> Scene {
    let mut m = MethodBuilder::new("f").param("x");
    m.assign(Value::local("x"), Value::Parameter { index: 0 });
    m.assign(
        Value::local("t"),
        Value::Typeof {
            arg: Box::new(Value::local("x")),
        },
    );
    let branch = m.branch(Value::binary(
        BinaryOp::StrictEq,
        Value::local("t"),
        Value::string("number"),
    ));
    let then = m.assign(
        Value::local("r"),
        Value::binary(BinaryOp::Add, Value::local("x"), Value::number(1.0)),
    );
    m.ret(Some(Value::local("r")));
    let otherwise = m.ret(Some(Value::local("x")));
    m.branch_targets(branch, otherwise, then);

    SceneBuilder::new()
        .class(ClassBuilder::new("G").method(m))
        .build()
        .unwrap()
}

#[test]
fn typeof_test_guards_the_argument_requirement() {
    let scene = typeof_scene();
    let f = scene.find_method("G", "f").unwrap();
    let manager = TypeInferenceManager::new(&scene, no_guessing());

    manager.analyze(&[f], None).unwrap();

    let on_arg: HashSet<TypeFact> = manager
        .backward_summaries_of(f)
        .into_iter()
        .filter_map(|summary| match summary.exit.fact {
            BackwardFact::TypedVariable {
                base: AccessPathBase::Arg(0),
                ty,
            } => Some(ty),
            _ => None,
        })
        .collect();

    // `x := arg0` reads the argument on every path; each branch adds its
    // own requirement under the guard that selects it.
    let expected: HashSet<TypeFact> = [
        TypeFact::Unknown,
        TypeFact::Unknown.with_guard(TypeFact::Number, false).unwrap(),
        TypeFact::Unknown.with_guard(TypeFact::Number, true).unwrap(),
    ]
    .into_iter()
    .collect();
    assert_eq!(on_arg, expected);
}

// class Point { x: number; y: number }
// class M { len(p) { return p.x + p.y; } }
#[test]
fn anonymous_argument_shape_is_guessed_as_the_declaring_class() {
    let mut len = MethodBuilder::new("len").param("p");
    len.assign(Value::local("p"), Value::Parameter { index: 0 });
    len.assign(Value::local("a"), Value::field(Value::local("p"), "x"));
    len.assign(Value::local("b"), Value::field(Value::local("p"), "y"));
    len.assign(
        Value::local("s"),
        Value::binary(BinaryOp::Add, Value::local("a"), Value::local("b")),
    );
    len.ret(Some(Value::local("s")));

    let scene = SceneBuilder::new()
        .class(
            ClassBuilder::new("Point")
                .field("x", EtsType::Number)
                .field("y", EtsType::Number),
        )
        .class(ClassBuilder::new("M").method(len))
        .build()
        .unwrap();
    let len = scene.find_method("M", "len").unwrap();

    let guessed = TypeInferenceManager::new(&scene, InferenceOptions::default())
        .analyze(&[len], None)
        .unwrap();
    let arg = guessed
        .type_of(len, &AccessPathBase::Arg(0))
        .and_then(TypeFact::as_object)
        .unwrap();
    assert_eq!(arg.cls, Some(EtsType::class("Point", "main.ts")));
    assert_eq!(arg.property("x"), Some(&TypeFact::Number));

    let anonymous = TypeInferenceManager::new(&scene, no_guessing())
        .analyze(&[len], None)
        .unwrap();
    let arg = anonymous
        .type_of(len, &AccessPathBase::Arg(0))
        .and_then(TypeFact::as_object)
        .unwrap();
    assert_eq!(arg.cls, None);
    assert!(arg.property("x").is_some() && arg.property("y").is_some());
}
