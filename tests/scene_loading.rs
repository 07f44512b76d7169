//! Scenes and options read from disk, run through to the rendered report.

use std::io::Write;
use tsinfer::config::{load_options, load_scene, resolve_entries};
use tsinfer::TypeInferenceManager;

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
    },
    {
      "signature": { "name": "User", "file": "app.ts" },
      "methods": [
        {
          "name": "show",
          "parameters": [ { "name": "p" } ],
          "stmts": [
            { "kind": "assign",
              "lhv": { "kind": "local", "name": "p" },
              "rhv": { "kind": "parameter", "index": 0 } },
            { "kind": "assign",
              "lhv": { "kind": "local", "name": "v" },
              "rhv": { "kind": "instance_field",
                       "instance": { "kind": "local", "name": "p" },
                       "field": { "name": "x" } } },
            { "kind": "return", "value": { "kind": "local", "name": "v" } }
          ]
        }
      ]
    }
  ]
}"#;

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn scene_file_is_analyzed_into_a_report() {
    let scene_file = write_temp(SCENE_JSON);
    let options_file = write_temp(r#"{ "guess_types": false }"#);

    let scene = load_scene(scene_file.path()).unwrap();
    let options = load_options(options_file.path()).unwrap();
    let entries = resolve_entries(&scene, &[]).unwrap();
    assert_eq!(entries.len(), 2);

    let manager = TypeInferenceManager::new(&scene, options);
    let report = manager.analyze(&entries, None).unwrap().report(&scene);

    let show = &report.methods["User::show"];
    assert!(show.types["arg(0)"].contains("x"));
    let norm = &report.methods["Point::norm"];
    assert!(norm.types["<this>"].contains("x"));

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["methods"]["User::show"]["types"]["arg(0)"].is_string());
}

#[test]
fn guessing_names_the_declaring_class_in_the_report() {
    let scene_file = write_temp(SCENE_JSON);
    let scene = load_scene(scene_file.path()).unwrap();
    let show = resolve_entries(&scene, &["User::show".to_string()]).unwrap();

    let manager = TypeInferenceManager::new(&scene, Default::default());
    let report = manager.analyze(&show, None).unwrap().report(&scene);

    assert!(report.methods["User::show"].types["arg(0)"].starts_with("Point"));
}

#[test]
fn malformed_scene_reports_the_file() {
    let scene_file = write_temp(r#"{ "classes": [ { "methods": 3 } ] }"#);
    let error = load_scene(scene_file.path()).unwrap_err();
    assert!(format!("{error:#}").contains("invalid scene"));
}
