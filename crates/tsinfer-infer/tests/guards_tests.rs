use super::*;
use tsinfer_ir::{BinaryOp, ClassBuilder, MethodBuilder, Scene, SceneBuilder};

fn scene_of(method: MethodBuilder) -> Scene {
    SceneBuilder::new()
        .class(ClassBuilder::new("A").method(method))
        .build()
        .unwrap()
}

fn resolve(scene: &Scene, branch: i32) -> Option<TypeGuard> {
    let method = &scene.methods()[0];
    let dominators = Dominators::compute(method);
    GuardResolver::new(method, &dominators).resolve(branch)
}

fn typeof_x() -> Value {
    Value::Typeof {
        arg: Box::new(Value::local("x")),
    }
}

// 0: t := typeof x
// 1: if (t <op> "number")  -> [false: 4, true: 2]
// 2: r := 1
// 3: return r
// 4: return 0
fn typeof_branch(op: BinaryOp, tag_first: bool) -> Scene {
    let mut m = MethodBuilder::new("f").param("x");
    m.assign(Value::local("t"), typeof_x());
    let condition = if tag_first {
        Value::binary(op, Value::string("number"), Value::local("t"))
    } else {
        Value::binary(op, Value::local("t"), Value::string("number"))
    };
    let branch = m.branch(condition);
    let then = m.assign(Value::local("r"), Value::number(1.0));
    m.ret(Some(Value::local("r")));
    let otherwise = m.ret(Some(Value::number(0.0)));
    m.branch_targets(branch, otherwise, then);
    scene_of(m)
}

#[test]
fn typeof_equality_guards_the_tested_local() {
    let scene = typeof_branch(BinaryOp::StrictEq, false);
    let guard = resolve(&scene, 1).unwrap();
    assert_eq!(guard.base, AccessPathBase::Local("x".into()));
    assert_eq!(guard.guard, TypeFact::Number);
    assert!(!guard.negated);
}

#[test]
fn typeof_tag_may_come_first() {
    let scene = typeof_branch(BinaryOp::Eq, true);
    let guard = resolve(&scene, 1).unwrap();
    assert_eq!(guard.guard, TypeFact::Number);
    assert!(!guard.negated);
}

#[test]
fn inequality_flips_polarity() {
    let scene = typeof_branch(BinaryOp::StrictNotEq, false);
    let guard = resolve(&scene, 1).unwrap();
    assert!(guard.negated);
}

#[test]
fn unknown_typeof_tag_is_not_a_guard() {
    let mut m = MethodBuilder::new("f").param("x");
    m.assign(Value::local("t"), typeof_x());
    let branch = m.branch(Value::binary(
        BinaryOp::Eq,
        Value::local("t"),
        Value::string("bigint"),
    ));
    let then = m.ret(None);
    let otherwise = m.ret(None);
    m.branch_targets(branch, otherwise, then);
    assert_eq!(resolve(&scene_of(m), 1), None);
}

#[test]
fn in_test_against_zero_guards_the_object() {
    let mut m = MethodBuilder::new("f").param("o");
    m.assign(
        Value::local("c"),
        Value::In {
            property: Box::new(Value::string("name")),
            object: Box::new(Value::local("o")),
        },
    );
    m.assign(Value::local("d"), Value::local("c"));
    let branch = m.branch(Value::binary(
        BinaryOp::Eq,
        Value::local("d"),
        Value::number(0.0),
    ));
    let then = m.ret(None);
    let otherwise = m.ret(None);
    m.branch_targets(branch, otherwise, then);

    let guard = resolve(&scene_of(m), 2).unwrap();
    assert_eq!(guard.base, AccessPathBase::Local("o".into()));
    assert_eq!(
        guard.guard,
        TypeFact::object_with(None, [("name", TypeFact::Unknown)])
    );
    assert!(!guard.negated);
}

#[test]
fn boolean_local_holding_a_typeof_test() {
    let mut m = MethodBuilder::new("f").param("x");
    m.assign(Value::local("t"), typeof_x());
    m.assign(
        Value::local("c"),
        Value::binary(BinaryOp::Eq, Value::local("t"), Value::string("string")),
    );
    let branch = m.branch(Value::local("c"));
    let then = m.ret(None);
    let otherwise = m.ret(None);
    m.branch_targets(branch, otherwise, then);

    let guard = resolve(&scene_of(m), 2).unwrap();
    assert_eq!(guard.guard, TypeFact::String);
}

#[test]
fn definitions_behind_a_join_are_not_followed() {
    // 0: if p -> [false: 1, true: 3]
    // 1: t := typeof x
    // 2: goto 4
    // 3: t := typeof x
    // 4: if (t == "number") -> [5, 6]
    let mut m = MethodBuilder::new("f").param("x");
    let first = m.branch(Value::local("p"));
    let left = m.assign(Value::local("t"), typeof_x());
    let goto = m.push(Stmt::Nop);
    let right = m.assign(Value::local("t"), typeof_x());
    let second = m.branch(Value::binary(
        BinaryOp::Eq,
        Value::local("t"),
        Value::string("number"),
    ));
    let a = m.ret(None);
    let b = m.ret(None);
    m.branch_targets(first, left, right);
    m.jump(goto, second);
    m.branch_targets(second, a, b);

    assert_eq!(resolve(&scene_of(m), second as i32), None);
}

#[test]
fn reachability_follows_successors() {
    let scene = typeof_branch(BinaryOp::Eq, false);
    let method = &scene.methods()[0];
    assert!(is_reachable(method, 2, 3));
    assert!(is_reachable(method, 4, 4));
    assert!(!is_reachable(method, 4, 3));
    assert!(!is_reachable(method, 2, 4));
    assert!(is_reachable(method, 0, 4));
}
