use super::*;
use crate::model::Value;

const SCENE_JSON: &str = r#"{
  "classes": [
    {
      "signature": { "name": "Point", "file": "geo.ts" },
      "fields": [ { "name": "x", "ty": { "kind": "number" } } ],
      "methods": [
        {
          "name": "norm",
          "stmts": [
            { "kind": "assign",
              "lhv": { "kind": "local", "name": "t" },
              "rhv": { "kind": "instance_field",
                       "instance": { "kind": "this" },
                       "field": { "name": "x" } } },
            { "kind": "return", "value": { "kind": "local", "name": "t" } }
          ]
        }
      ]
    }
  ]
}"#;

#[test]
fn test_scene_from_json_builds_fall_through_cfg() {
    let scene = Scene::from_json(SCENE_JSON).expect("valid scene");
    assert_eq!(scene.classes().len(), 1);
    let id = scene.find_method("Point", "norm").expect("method");
    let method = scene.method(id);
    assert_eq!(method.len(), 2);
    assert_eq!(method.successors(SYNTHETIC_ENTRY).as_slice(), &[0]);
    assert_eq!(method.successors(0).as_slice(), &[1]);
    assert!(method.successors(1).is_empty());
    assert_eq!(method.predecessors(0).as_slice(), &[SYNTHETIC_ENTRY]);
    assert_eq!(method.exits().as_slice(), &[1]);
    assert_eq!(scene.class_of(id).field("x").map(|f| &f.ty), Some(&EtsType::Number));
}

#[test]
fn test_synthetic_entry_is_nop() {
    let scene = Scene::from_json(SCENE_JSON).expect("valid scene");
    let id = scene.find_method("Point", "norm").expect("method");
    assert_eq!(scene.stmt(StmtRef::entry(id)), &Stmt::Nop);
    assert!(StmtRef::entry(id).is_synthetic_entry());
}

#[test]
fn test_branch_without_targets_is_rejected() {
    let decl = SceneDecl {
        classes: vec![ClassDecl {
            signature: ClassSignature::new("C", "c.ts"),
            super_class: None,
            fields: Vec::new(),
            methods: vec![MethodDecl {
                name: "m".into(),
                parameters: Vec::new(),
                return_type: EtsType::Unknown,
                locals: Vec::new(),
                stmts: vec![
                    Stmt::If {
                        condition: Value::local("c"),
                    },
                    Stmt::Return { value: None },
                ],
                successors: None,
            }],
        }],
    };
    let err = Scene::from_decl(decl).expect_err("branch needs targets");
    assert!(matches!(err, IrError::MissingBranchTargets { index: 0, .. }));
}

#[test]
fn test_out_of_range_successor_is_rejected() {
    let decl = SceneDecl {
        classes: vec![ClassDecl {
            signature: ClassSignature::new("C", "c.ts"),
            super_class: None,
            fields: Vec::new(),
            methods: vec![MethodDecl {
                name: "m".into(),
                parameters: Vec::new(),
                return_type: EtsType::Unknown,
                locals: Vec::new(),
                stmts: vec![Stmt::Nop],
                successors: Some(vec![vec![7]]),
            }],
        }],
    };
    let err = Scene::from_decl(decl).expect_err("bad successor");
    assert!(matches!(err, IrError::InvalidSuccessor { target: 7, .. }));
}

#[test]
fn test_resolve_class_tolerates_unknown_file() {
    let scene = Scene::from_json(SCENE_JSON).expect("valid scene");
    let partial = ClassSignature::new("Point", "");
    assert_eq!(
        scene.resolve_class(&partial).map(|c| c.signature.file.to_string()),
        Some("geo.ts".to_string())
    );
    assert!(scene.resolve_class(&ClassSignature::new("Point", "other.ts")).is_none());
    assert!(scene.resolve_class(&ClassSignature::new("", "")).is_none());
}
