use super::*;
use tsinfer_ifds::Vertex;
use tsinfer_ir::{ClassBuilder, ClassSignature, MethodBuilder, MethodSignature, Scene, SceneBuilder};

#[derive(Default)]
struct Seeds {
    scheme: FxHashMap<MethodId, MethodTypeScheme>,
    type_info: FxHashMap<EtsType, TypeFact>,
}

fn without_liveness() -> InferenceOptions {
    InferenceOptions {
        live_variables: false,
        ..InferenceOptions::default()
    }
}

fn with_flow(
    scene: &Scene,
    options: InferenceOptions,
    seeds: &Seeds,
    check: impl FnOnce(&ForwardFlowFunctions<'_>, &DiagnosticSink),
) {
    let graph = EtsApplicationGraph::new(scene);
    let cache = AnalysisCache::new();
    let sink = DiagnosticSink::new();
    let flow = ForwardFlowFunctions::new(
        &graph,
        &options,
        &seeds.scheme,
        &seeds.type_info,
        &cache,
        &sink,
    );
    check(&flow, &sink);
}

fn scene_of(method: MethodBuilder) -> Scene {
    SceneBuilder::new()
        .class(ClassBuilder::new("A").method(method))
        .build()
        .unwrap()
}

fn at(index: i32) -> StmtRef {
    StmtRef::new(MethodId(0), index)
}

fn path(base: &str, fields: &[&str]) -> AccessPath {
    AccessPath::new(
        AccessPathBase::Local(base.into()),
        fields.iter().map(|f| Accessor::field(f)),
    )
}

fn typed(base: &str, fields: &[&str], ty: TypeFact) -> ForwardFact {
    ForwardFact::typed(path(base, fields), ty)
}

fn call(receiver: &str, name: &str, args: Vec<Value>) -> Value {
    Value::InstanceCall {
        instance: Box::new(Value::local(receiver)),
        method: MethodSignature::new(ClassSignature::new("A", "main.ts"), name),
        args,
    }
}

#[test]
fn constants_type_their_target() {
    let mut m = MethodBuilder::new("m");
    m.assign(Value::local("x"), Value::number(5.0));
    m.assign(Value::local("s"), Value::string("five"));
    m.ret(Some(Value::local("x")));
    let scene = scene_of(m);

    with_flow(&scene, without_liveness(), &Seeds::default(), |flow, _| {
        let facts = flow.sequent(at(0), at(1), &ForwardFact::Zero).unwrap();
        assert_eq!(facts, vec![ForwardFact::Zero, typed("x", &[], TypeFact::Number)]);
        let facts = flow.sequent(at(1), at(2), &ForwardFact::Zero).unwrap();
        assert!(facts.contains(&typed("s", &[], TypeFact::String)));
    });
}

#[test]
fn plus_may_produce_a_string_or_a_number() {
    let mut m = MethodBuilder::new("m").param("a");
    m.assign(
        Value::local("x"),
        Value::binary(BinaryOp::Add, Value::local("a"), Value::number(1.0)),
    );
    m.ret(Some(Value::local("x")));
    let scene = scene_of(m);

    with_flow(&scene, without_liveness(), &Seeds::default(), |flow, _| {
        let facts = flow.sequent(at(0), at(1), &ForwardFact::Zero).unwrap();
        assert!(facts.contains(&typed("x", &[], TypeFact::String)));
        assert!(facts.contains(&typed("x", &[], TypeFact::Number)));
    });
}

#[test]
fn allocation_prefers_collected_requirements_over_declared_fields() {
    let t = EtsType::class("T", "main.ts");
    let mut m = MethodBuilder::new("m");
    m.assign(Value::local("o"), Value::New { ty: t.clone() });
    m.ret(Some(Value::local("o")));
    let scene = SceneBuilder::new()
        .class(ClassBuilder::new("A").method(m))
        .class(ClassBuilder::new("T").field("n", EtsType::Number))
        .build()
        .unwrap();

    with_flow(&scene, without_liveness(), &Seeds::default(), |flow, _| {
        let facts = flow.sequent(at(0), at(1), &ForwardFact::Zero).unwrap();
        let declared = TypeFact::object_with(Some(t.clone()), [("n", TypeFact::Number)]);
        assert!(facts.contains(&typed("o", &[], declared)));
    });

    let collected = TypeFact::object_with(Some(t.clone()), [("f", TypeFact::Unknown)]);
    let seeds = Seeds {
        type_info: [(t, collected.clone())].into_iter().collect(),
        ..Seeds::default()
    };
    with_flow(&scene, without_liveness(), &seeds, |flow, _| {
        let facts = flow.sequent(at(0), at(1), &ForwardFact::Zero).unwrap();
        assert!(facts.contains(&typed("o", &[], collected)));
    });
}

#[test]
fn copy_moves_nested_facts_and_kills_the_target() {
    let mut m = MethodBuilder::new("m").param("x");
    m.assign(Value::local("y"), Value::local("x"));
    m.ret(Some(Value::local("y")));
    let scene = scene_of(m);

    with_flow(&scene, without_liveness(), &Seeds::default(), |flow, _| {
        let nested = typed("x", &["f"], TypeFact::Number);
        let facts = flow.sequent(at(0), at(1), &nested).unwrap();
        assert_eq!(facts, vec![nested, typed("y", &["f"], TypeFact::Number)]);

        let stale = typed("y", &["g"], TypeFact::String);
        assert!(flow.sequent(at(0), at(1), &stale).unwrap().is_empty());
    });
}

#[test]
fn cast_narrows_the_copied_type() {
    let mut m = MethodBuilder::new("m").param("x");
    m.assign(
        Value::local("y"),
        Value::Cast {
            arg: Box::new(Value::local("x")),
            ty: EtsType::Number,
        },
    );
    m.ret(Some(Value::local("y")));
    let scene = scene_of(m);

    with_flow(&scene, without_liveness(), &Seeds::default(), |flow, _| {
        let facts = flow
            .sequent(at(0), at(1), &typed("x", &[], TypeFact::Unknown))
            .unwrap();
        assert!(facts.contains(&typed("y", &[], TypeFact::Number)));

        // A contradicting cast keeps what was observed.
        let facts = flow
            .sequent(at(0), at(1), &typed("x", &[], TypeFact::String))
            .unwrap();
        assert!(facts.contains(&typed("y", &[], TypeFact::String)));
    });
}

// 0: a := new T
// 1: b := a
// 2: b.f := y
// 3: return a
fn aliased_write() -> Scene {
    let mut m = MethodBuilder::new("m").param("y");
    m.assign(
        Value::local("a"),
        Value::New {
            ty: EtsType::class("T", "main.ts"),
        },
    );
    m.assign(Value::local("b"), Value::local("a"));
    m.assign(Value::field(Value::local("b"), "f"), Value::local("y"));
    m.ret(Some(Value::local("a")));
    scene_of(m)
}

#[test]
fn field_write_reaches_must_aliases() {
    let scene = aliased_write();
    with_flow(&scene, without_liveness(), &Seeds::default(), |flow, _| {
        let facts = flow
            .sequent(at(2), at(3), &typed("y", &[], TypeFact::String))
            .unwrap();
        assert!(facts.contains(&typed("b", &["f"], TypeFact::String)));
        assert!(facts.contains(&typed("a", &["f"], TypeFact::String)));

        // The old value of `a.f` is overwritten through `b`.
        let old = typed("a", &["f"], TypeFact::Number);
        assert!(flow.sequent(at(2), at(3), &old).unwrap().is_empty());
    });
}

#[test]
fn field_write_stays_local_without_alias_analysis() {
    let scene = aliased_write();
    let options = InferenceOptions {
        alias_analysis: false,
        ..without_liveness()
    };
    with_flow(&scene, options, &Seeds::default(), |flow, _| {
        let facts = flow
            .sequent(at(2), at(3), &typed("y", &[], TypeFact::String))
            .unwrap();
        assert!(facts.contains(&typed("b", &["f"], TypeFact::String)));
        assert!(!facts.contains(&typed("a", &["f"], TypeFact::String)));
    });
}

#[test]
fn facts_on_dead_locals_are_dropped() {
    let mut m = MethodBuilder::new("m");
    m.assign(Value::local("x"), Value::number(1.0));
    m.assign(Value::local("y"), Value::number(2.0));
    m.ret(Some(Value::local("y")));
    let scene = scene_of(m);
    let dead = typed("x", &[], TypeFact::Number);

    with_flow(&scene, InferenceOptions::default(), &Seeds::default(), |flow, _| {
        assert!(flow.sequent(at(1), at(2), &dead).unwrap().is_empty());
    });
    with_flow(&scene, without_liveness(), &Seeds::default(), |flow, _| {
        assert_eq!(flow.sequent(at(1), at(2), &dead).unwrap(), vec![dead.clone()]);
    });
}

#[test]
fn paths_looping_over_one_field_are_dropped() {
    let mut m = MethodBuilder::new("m").param("x");
    m.assign(Value::local("y"), Value::local("x"));
    m.ret(Some(Value::local("y")));
    let scene = scene_of(m);

    with_flow(&scene, without_liveness(), &Seeds::default(), |flow, _| {
        let looping = typed("x", &["next", "next", "next", "next"], TypeFact::Number);
        assert!(flow.sequent(at(0), at(1), &looping).unwrap().is_empty());
    });
}

#[test]
fn start_facts_expand_the_scheme_per_path() {
    let mut m = MethodBuilder::new("m")
        .param("x")
        .local("%0", EtsType::String);
    m.ret(None);
    let scene = scene_of(m);

    let scheme: MethodTypeScheme = [
        (
            AccessPathBase::Arg(0),
            TypeFact::object_with(None, [("f", TypeFact::Number)]),
        ),
        (AccessPathBase::This, TypeFact::Unknown),
    ]
    .into_iter()
    .collect();
    let seeds = Seeds {
        scheme: [(MethodId(0), scheme)].into_iter().collect(),
        ..Seeds::default()
    };

    with_flow(&scene, without_liveness(), &seeds, |flow, _| {
        let facts = flow.obtain_possible_start_facts(MethodId(0));
        let arg = AccessPath::from_base(AccessPathBase::Arg(0));
        assert!(facts.contains(&ForwardFact::Zero));
        assert!(facts.contains(&ForwardFact::typed(
            &arg + Accessor::field("f"),
            TypeFact::Number
        )));
        assert!(facts.contains(&ForwardFact::typed(arg, TypeFact::empty_object())));
        assert!(facts.contains(&ForwardFact::typed(
            AccessPath::from_base(AccessPathBase::This),
            TypeFact::Any
        )));
        assert!(facts.contains(&typed("%0", &[], TypeFact::String)));
    });
}

#[test]
fn call_arguments_are_rebased_onto_the_callee() {
    let mut m = MethodBuilder::new("run");
    m.assign(Value::local("r"), call("o", "go", vec![Value::local("a")]));
    m.ret(Some(Value::local("r")));
    let scene = scene_of(m);

    with_flow(&scene, without_liveness(), &Seeds::default(), |flow, _| {
        let facts = flow
            .call_to_start(at(0), at(0), &typed("a", &["f"], TypeFact::Number))
            .unwrap();
        assert_eq!(
            facts,
            vec![ForwardFact::typed(
                AccessPath::new(AccessPathBase::Arg(0), [Accessor::field("f")]),
                TypeFact::Number
            )]
        );

        let facts = flow
            .call_to_start(at(0), at(0), &typed("o", &[], TypeFact::empty_object()))
            .unwrap();
        assert_eq!(
            facts,
            vec![ForwardFact::typed(
                AccessPath::from_base(AccessPathBase::This),
                TypeFact::empty_object()
            )]
        );
    });
}

#[test]
fn returned_facts_land_on_the_call_result() {
    let mut run = MethodBuilder::new("run");
    run.assign(Value::local("r"), call("o", "go", Vec::new()));
    run.ret(Some(Value::local("r")));
    let mut go = MethodBuilder::new("go");
    go.assign(Value::local("v"), Value::number(1.0));
    go.ret(Some(Value::local("v")));
    let scene = SceneBuilder::new()
        .class(ClassBuilder::new("A").method(run).method(go))
        .build()
        .unwrap();
    let go = scene.find_method("A", "go").unwrap();

    with_flow(&scene, without_liveness(), &Seeds::default(), |flow, _| {
        let exit = StmtRef::new(go, 1);
        let facts = flow
            .exit_to_return_site(at(0), at(1), exit, &typed("v", &[], TypeFact::Number))
            .unwrap();
        assert_eq!(facts, vec![typed("r", &[], TypeFact::Number)]);

        // Callee locals other than the returned one stay behind.
        let facts = flow
            .exit_to_return_site(at(0), at(1), exit, &typed("w", &[], TypeFact::Number))
            .unwrap();
        assert!(facts.is_empty());
    });
}

#[test]
fn unresolved_calls_are_reported_and_bypassed() {
    let mut m = MethodBuilder::new("run");
    m.call(call("o", "missing", Vec::new()));
    m.ret(None);
    let scene = scene_of(m);

    with_flow(&scene, without_liveness(), &Seeds::default(), |flow, sink| {
        let facts = flow
            .call_to_return_site(at(0), at(1), &ForwardFact::Zero)
            .unwrap();
        assert_eq!(facts, vec![ForwardFact::Zero]);

        let receiver = typed("o", &["f"], TypeFact::Number);
        let facts = flow.call_to_return_site(at(0), at(1), &receiver).unwrap();
        assert_eq!(facts, vec![receiver]);

        let reported = sink.take();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].code, diagnostic_codes::UNRESOLVED_CALL);
    });
}

#[test]
fn summaries_are_emitted_at_exits() {
    let mut m = MethodBuilder::new("m");
    m.assign(Value::local("x"), Value::number(5.0));
    m.ret(Some(Value::local("x")));
    let scene = scene_of(m);
    let graph = EtsApplicationGraph::new(&scene);
    let options = InferenceOptions::default();
    let (scheme, type_info) = (FxHashMap::default(), FxHashMap::default());
    let cache = AnalysisCache::new();
    let sink = DiagnosticSink::new();
    let analyzer = ForwardAnalyzer::new(ForwardFlowFunctions::new(
        &graph, &options, &scheme, &type_info, &cache, &sink,
    ));

    let start = Vertex::new(StmtRef::entry(MethodId(0)), ForwardFact::Zero);
    let inner = Edge::new(start.clone(), Vertex::new(at(0), ForwardFact::Zero));
    assert!(analyzer.handle_new_edge(&inner).is_empty());

    let exit = Vertex::new(at(1), typed("x", &[], TypeFact::Number));
    let events = analyzer.handle_new_edge(&Edge::new(start.clone(), exit.clone()));
    assert_eq!(
        events,
        vec![AnalyzerEvent::Forward(Summary {
            method: MethodId(0),
            initial: start,
            exit,
        })]
    );
}
