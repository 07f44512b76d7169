use super::*;
use crate::builder::{ClassBuilder, MethodBuilder, SceneBuilder};
use crate::scene::Scene;

// 0: x := 1
// 1: y := x
// 2: x := 2
// 3: return y
fn program() -> Scene {
    let mut m = MethodBuilder::new("m");
    m.assign(Value::local("x"), Value::number(1.0));
    m.assign(Value::local("y"), Value::local("x"));
    m.assign(Value::local("x"), Value::number(2.0));
    m.ret(Some(Value::local("y")));
    SceneBuilder::new()
        .class(ClassBuilder::new("C").method(m))
        .build()
        .expect("scene")
}

#[test]
fn test_dead_store_is_not_alive() {
    let scene = program();
    let live = MethodLiveness::compute(&scene.methods()[0]);
    assert!(live.is_alive_at("x", 0));
    assert!(live.is_alive_at("x", 1));
    // The second store to `x` is never read.
    assert!(!live.is_alive_at("x", 2));
    assert!(!live.is_alive_at("x", 3));
    assert!(live.is_alive_at("y", 2));
    assert!(live.is_alive_at("y", 3));
    assert!(!live.is_alive_at("y", 0));
}

#[test]
fn test_unknown_locals_and_entry_are_alive() {
    let scene = program();
    let live = MethodLiveness::compute(&scene.methods()[0]);
    assert!(live.is_alive_at("never_mentioned", 2));
    assert!(live.is_alive_at("x", -1));
    assert!(AlwaysAlive.is_alive_at("x", 3));
}

#[test]
fn test_field_write_reads_base() {
    let mut m = MethodBuilder::new("m");
    m.assign(Value::local("o"), Value::New { ty: crate::model::EtsType::Unknown });
    m.assign(Value::field(Value::local("o"), "f"), Value::number(1.0));
    m.ret(None);
    let scene = SceneBuilder::new()
        .class(ClassBuilder::new("C").method(m))
        .build()
        .expect("scene");
    let live = MethodLiveness::compute(&scene.methods()[0]);
    assert!(live.is_alive_at("o", 0));
    assert!(live.is_alive_at("o", 1));
    assert!(!live.is_alive_at("o", 2));
}
