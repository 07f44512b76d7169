use super::*;
use tsinfer_common::diagnostic_codes;
use tsinfer_ifds::Vertex;
use tsinfer_ir::{
    BinaryOp, ClassBuilder, ClassSignature, MethodBuilder, MethodSignature, Scene, SceneBuilder,
};

fn scene_of(method: MethodBuilder) -> Scene {
    SceneBuilder::new()
        .class(ClassBuilder::new("A").method(method))
        .build()
        .unwrap()
}

fn with_flow(scene: &Scene, check: impl FnOnce(&BackwardFlowFunctions<'_>, &DiagnosticSink)) {
    let graph = EtsApplicationGraph::new(scene);
    let cache = AnalysisCache::new();
    let sink = DiagnosticSink::new();
    let flow = BackwardFlowFunctions::new(&graph, &cache, &sink);
    check(&flow, &sink);
}

fn at(index: i32) -> StmtRef {
    StmtRef::new(MethodId(0), index)
}

fn local(name: &str) -> AccessPathBase {
    AccessPathBase::Local(name.into())
}

fn with_f(ty: TypeFact) -> TypeFact {
    TypeFact::object_with(None, [("f", ty)])
}

fn call(receiver: &str, name: &str, args: Vec<Value>) -> Value {
    Value::InstanceCall {
        instance: Box::new(Value::local(receiver)),
        method: MethodSignature::new(ClassSignature::new("A", "main.ts"), name),
        args,
    }
}

// 0: x := arg0
// 1: r := x.f
// 2: return r
fn field_read() -> Scene {
    let mut m = MethodBuilder::new("get").param("x");
    m.assign(Value::local("x"), Value::Parameter { index: 0 });
    m.assign(Value::local("r"), Value::field(Value::local("x"), "f"));
    m.ret(Some(Value::local("r")));
    scene_of(m)
}

#[test]
fn returned_local_must_hold_a_value() {
    with_flow(&field_read(), |flow, _| {
        let facts = flow.sequent(at(2), at(1), &BackwardFact::Zero).unwrap();
        assert_eq!(
            facts,
            vec![BackwardFact::Zero, BackwardFact::typed(local("r"), TypeFact::Unknown)]
        );
    });
}

#[test]
fn field_read_requires_the_property() {
    with_flow(&field_read(), |flow, _| {
        let facts = flow.sequent(at(1), at(0), &BackwardFact::Zero).unwrap();
        assert_eq!(
            facts,
            vec![
                BackwardFact::Zero,
                BackwardFact::typed(local("x"), with_f(TypeFact::Unknown)),
            ]
        );
    });
}

#[test]
fn field_read_wraps_the_result_requirement() {
    with_flow(&field_read(), |flow, _| {
        let fact = BackwardFact::typed(local("r"), TypeFact::Number);
        let facts = flow.sequent(at(1), at(0), &fact).unwrap();
        assert_eq!(
            facts,
            vec![fact, BackwardFact::typed(local("x"), with_f(TypeFact::Number))]
        );
    });
}

#[test]
fn field_read_into_a_local_already_holding_the_field_is_not_carried() {
    with_flow(&field_read(), |flow, _| {
        let fact = BackwardFact::typed(local("r"), with_f(TypeFact::Number));
        let facts = flow.sequent(at(1), at(0), &fact).unwrap();
        assert_eq!(facts, vec![fact]);

        let other = BackwardFact::typed(local("r"), TypeFact::object_with(None, [("g", TypeFact::Number)]));
        let facts = flow.sequent(at(1), at(0), &other).unwrap();
        assert_eq!(
            facts,
            vec![
                other.clone(),
                BackwardFact::typed(
                    local("x"),
                    with_f(TypeFact::object_with(None, [("g", TypeFact::Number)]))
                ),
            ]
        );
    });
}

#[test]
fn parameter_copy_moves_requirement_to_the_argument() {
    with_flow(&field_read(), |flow, _| {
        let fact = BackwardFact::typed(local("x"), with_f(TypeFact::Number));
        let facts = flow.sequent(at(0), at(-1), &fact).unwrap();
        assert_eq!(
            facts,
            vec![
                fact,
                BackwardFact::typed(AccessPathBase::Arg(0), with_f(TypeFact::Number)),
            ]
        );
    });
}

#[test]
fn field_write_hands_the_property_type_to_the_source() {
    let mut m = MethodBuilder::new("set").param("y");
    m.assign(Value::field(Value::local("o"), "f"), Value::local("y"));
    m.ret(None);
    let scene = scene_of(m);

    with_flow(&scene, |flow, _| {
        let required = TypeFact::object_with(None, [("f", TypeFact::Number), ("g", TypeFact::String)]);
        let facts = flow
            .sequent(at(0), at(-1), &BackwardFact::typed(local("o"), required))
            .unwrap();
        assert_eq!(
            facts,
            vec![
                BackwardFact::typed(local("o"), TypeFact::object_with(None, [("g", TypeFact::String)])),
                BackwardFact::typed(local("y"), TypeFact::Number),
            ]
        );
    });
}

#[test]
fn field_write_through_a_union_is_reported() {
    let mut m = MethodBuilder::new("set").param("y");
    m.assign(Value::field(Value::local("o"), "f"), Value::local("y"));
    m.ret(None);
    let scene = scene_of(m);

    with_flow(&scene, |flow, sink| {
        let union = TypeFact::mk_union([with_f(TypeFact::Number), TypeFact::String]).unwrap();
        let fact = BackwardFact::typed(local("o"), union);
        let facts = flow.sequent(at(0), at(-1), &fact).unwrap();
        assert_eq!(facts, vec![fact]);
        let reported = sink.take();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].code, diagnostic_codes::UNSUPPORTED_CONSTRUCT);
    });
}

#[test]
fn element_read_requires_an_array() {
    let mut m = MethodBuilder::new("first").param("a");
    m.assign(
        Value::local("r"),
        Value::element(Value::local("a"), Value::number(0.0)),
    );
    m.ret(Some(Value::local("r")));
    let scene = scene_of(m);

    with_flow(&scene, |flow, _| {
        let fact = BackwardFact::typed(local("r"), TypeFact::String);
        let facts = flow.sequent(at(0), at(-1), &fact).unwrap();
        assert_eq!(
            facts,
            vec![fact, BackwardFact::typed(local("a"), TypeFact::array(TypeFact::String))]
        );
    });
}

#[test]
fn allocation_remembers_requirements_per_class() {
    let ty = EtsType::class("T", "main.ts");
    let mut m = MethodBuilder::new("make");
    m.assign(Value::local("o"), Value::New { ty: ty.clone() });
    m.ret(Some(Value::local("o")));
    let scene = scene_of(m);

    with_flow(&scene, |flow, _| {
        let fact = BackwardFact::typed(local("o"), with_f(TypeFact::Unknown));
        flow.sequent(at(0), at(-1), &fact).unwrap();
        assert_eq!(flow.saved_types(), vec![(ty, vec![with_f(TypeFact::Unknown)])]);
    });
}

// 0: x := arg0
// 1: t := typeof x
// 2: if (t === "number") -> [false: 5, true: 3]
// 3: r := x + 1
// 4: return r
// 5: return x
fn typeof_branch() -> Scene {
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
    scene_of(m)
}

#[test]
fn operand_under_typeof_test_is_guarded() {
    with_flow(&typeof_branch(), |flow, _| {
        let facts = flow.sequent(at(3), at(2), &BackwardFact::Zero).unwrap();
        let guarded = TypeFact::Unknown.with_guard(TypeFact::Number, false).unwrap();
        assert_eq!(
            facts,
            vec![BackwardFact::Zero, BackwardFact::typed(local("x"), guarded)]
        );
    });
}

#[test]
fn else_branch_carries_the_negated_guard() {
    with_flow(&typeof_branch(), |flow, _| {
        let facts = flow.sequent(at(5), at(2), &BackwardFact::Zero).unwrap();
        let negated = TypeFact::Unknown.with_guard(TypeFact::Number, true).unwrap();
        assert_eq!(
            facts,
            vec![BackwardFact::Zero, BackwardFact::typed(local("x"), negated)]
        );
    });
}

#[test]
fn unrelated_locals_are_not_guarded() {
    with_flow(&typeof_branch(), |flow, _| {
        let facts = flow.sequent(at(4), at(3), &BackwardFact::Zero).unwrap();
        assert_eq!(
            facts,
            vec![BackwardFact::Zero, BackwardFact::typed(local("r"), TypeFact::Unknown)]
        );
    });
}

// 0: xs := arg0
// 1: t := typeof xs
// 2: if (t === "string") -> [false: 4, true: 3]
// 3: return
// 4: xs[0] := v
// 5: return
#[test]
fn element_write_under_typeof_test_is_guarded() {
    let mut m = MethodBuilder::new("fill").param("xs");
    m.assign(Value::local("xs"), Value::Parameter { index: 0 });
    m.assign(
        Value::local("t"),
        Value::Typeof {
            arg: Box::new(Value::local("xs")),
        },
    );
    let branch = m.branch(Value::binary(
        BinaryOp::StrictEq,
        Value::local("t"),
        Value::string("string"),
    ));
    let then = m.ret(None);
    let otherwise = m.assign(
        Value::element(Value::local("xs"), Value::number(0.0)),
        Value::local("v"),
    );
    m.ret(None);
    m.branch_targets(branch, otherwise, then);
    let scene = scene_of(m);

    with_flow(&scene, |flow, _| {
        let facts = flow.sequent(at(4), at(2), &BackwardFact::Zero).unwrap();
        let array = TypeFact::array(TypeFact::Unknown)
            .with_guard(TypeFact::String, true)
            .unwrap();
        assert_eq!(
            facts,
            vec![
                BackwardFact::Zero,
                BackwardFact::typed(local("v"), TypeFact::Unknown),
                BackwardFact::typed(local("xs"), array),
            ]
        );
    });
}

#[test]
fn method_call_requires_a_function_property() {
    let mut m = MethodBuilder::new("run");
    m.call(call("o", "go", Vec::new()));
    m.ret(None);
    let scene = scene_of(m);

    with_flow(&scene, |flow, _| {
        let facts = flow
            .call_to_return_site(at(0), at(1), &BackwardFact::Zero)
            .unwrap();
        assert!(facts.contains(&BackwardFact::typed(
            local("o"),
            TypeFact::object_with(None, [("go", TypeFact::Function)])
        )));
    });
}

#[test]
fn call_result_requirement_does_not_bypass_the_callee() {
    let mut m = MethodBuilder::new("run");
    m.assign(Value::local("r"), call("o", "go", Vec::new()));
    m.ret(Some(Value::local("r")));
    let scene = scene_of(m);

    with_flow(&scene, |flow, _| {
        let result = BackwardFact::typed(local("r"), TypeFact::Number);
        assert!(flow.call_to_return_site(at(0), at(1), &result).unwrap().is_empty());

        let other = BackwardFact::typed(local("q"), TypeFact::Number);
        assert_eq!(
            flow.call_to_return_site(at(0), at(1), &other).unwrap(),
            vec![other]
        );
    });
}

#[test]
fn callee_argument_requirement_lands_on_the_actual() {
    let mut m = MethodBuilder::new("run");
    m.call(call("o", "go", vec![Value::local("a"), Value::local("b")]));
    m.ret(None);
    let scene = scene_of(m);

    with_flow(&scene, |flow, _| {
        let fact = BackwardFact::typed(AccessPathBase::Arg(1), TypeFact::String);
        let facts = flow
            .exit_to_return_site(at(0), at(1), at(-1), &fact)
            .unwrap();
        assert_eq!(facts, vec![BackwardFact::typed(local("b"), TypeFact::String)]);

        let this = BackwardFact::typed(AccessPathBase::This, with_f(TypeFact::Unknown));
        let facts = flow
            .exit_to_return_site(at(0), at(1), at(-1), &this)
            .unwrap();
        assert_eq!(facts, vec![BackwardFact::typed(local("o"), with_f(TypeFact::Unknown))]);
    });
}

#[test]
fn summaries_are_emitted_at_the_synthetic_entry_only() {
    let scene = field_read();
    let graph = EtsApplicationGraph::new(&scene);
    let cache = AnalysisCache::new();
    let sink = DiagnosticSink::new();
    let analyzer = BackwardAnalyzer::new(BackwardFlowFunctions::new(&graph, &cache, &sink));

    let start = Vertex::new(at(2), BackwardFact::Zero);
    let inner = Edge::new(
        start.clone(),
        Vertex::new(at(1), BackwardFact::typed(local("x"), TypeFact::Unknown)),
    );
    assert!(analyzer.handle_new_edge(&inner).is_empty());

    let exit = Vertex::new(
        StmtRef::entry(MethodId(0)),
        BackwardFact::typed(AccessPathBase::Arg(0), TypeFact::Unknown),
    );
    let events = analyzer.handle_new_edge(&Edge::new(start.clone(), exit.clone()));
    assert_eq!(
        events,
        vec![AnalyzerEvent::Backward(Summary {
            method: MethodId(0),
            initial: start,
            exit,
        })]
    );
}
