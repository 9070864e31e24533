use confdelta::delta::{Delta, Update};
use confdelta::patch::PatchError;
use confdelta::path::Path;
use confdelta::{apply, diff, store};
use serde_json::{Value, json};

fn p(s: &str) -> Path {
    Path::decode(s).unwrap()
}

fn roundtrip(base: &Value, patched: &Value) -> Delta {
    let delta = diff(base, patched).unwrap();
    let applied = apply(base, &delta).unwrap();
    assert_eq!(&applied.document, patched);
    assert!(applied.warnings.is_empty());
    delta
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn nested_addition_and_update() {
    let base = json!({"a": 1, "b": {"c": 2}});
    let patched = json!({"a": 1, "b": {"c": 3, "d": 4}, "e": 5});
    let delta = roundtrip(&base, &patched);

    assert_eq!(
        store::to_value(&delta),
        json!({
            "additions": {"b.d": 4, "e": 5},
            "deletions": {},
            "updates": {"b.c": {"old_value": 2, "new_value": 3}}
        })
    );
}

#[test]
fn top_level_deletion() {
    let base = json!({"a": 1, "b": 2});
    let patched = json!({"a": 1});
    let delta = roundtrip(&base, &patched);

    assert!(delta.additions.is_empty());
    assert!(delta.updates.is_empty());
    assert_eq!(delta.deletions[&p("b")], json!(2));
}

#[test]
fn type_mismatch_collapses_to_single_update() {
    let base = json!({"x": {"y": 1}});
    let patched = json!({"x": 2});
    let delta = roundtrip(&base, &patched);

    assert_eq!(delta.len(), 1);
    assert_eq!(delta.updates[&p("x")], Update::new(json!({"y": 1}), json!(2)));
    assert!(!delta.updates.contains_key(&p("x.y")));
}

#[test]
fn addition_through_scalar_conflicts() {
    let mut delta = Delta::new();
    delta.additions.insert(p("p.q"), json!(1));
    let err = apply(&json!({"p": 5}), &delta).unwrap_err();
    assert!(matches!(err, PatchError::PathConflict { .. }));
    assert_eq!(
        err.to_string(),
        "cannot apply change at p.q: p is a number, not a mapping"
    );
}

// ---------------------------------------------------------------------------
// Deep documents
// ---------------------------------------------------------------------------

fn bts_config() -> Value {
    json!({
        "BTS": {
            "name": "",
            "id": 0,
            "MGMT": {
                "MetricJob": {"enabled": false, "period": 0},
                "CPLANE": {}
            },
            "HWE": {"RU": {"serial": "", "port": 0}},
            "COMM": {}
        }
    })
}

#[test]
fn deep_changes_keep_full_paths() {
    let base = bts_config();
    let mut patched = bts_config();
    patched["BTS"]["MGMT"]["MetricJob"]["enabled"] = json!(true);
    patched["BTS"]["HWE"]["RU"]["serial"] = json!("RU-0042");
    patched["BTS"]["COMM"]["vlan"] = json!({"id": 12, "tagged": true});
    patched["BTS"]["MGMT"]
        .as_object_mut()
        .unwrap()
        .remove("CPLANE");

    let delta = roundtrip(&base, &patched);
    let keys: Vec<String> = delta.paths().map(|(_, path)| path.to_string()).collect();
    assert_eq!(
        keys,
        vec![
            "BTS.COMM.vlan",
            "BTS.MGMT.CPLANE",
            "BTS.HWE.RU.serial",
            "BTS.MGMT.MetricJob.enabled",
        ]
    );
}

#[test]
fn delta_survives_persistence_and_applies_to_same_base() {
    let base = bts_config();
    let mut patched = bts_config();
    patched["BTS"]["id"] = json!(7);
    patched["BTS"]["HWE"]["RU"]["port"] = json!({"a": 1});

    let delta = diff(&base, &patched).unwrap();
    let mut buf = Vec::new();
    store::save(&delta, &mut buf).unwrap();
    let loaded = store::load(buf.as_slice()).unwrap();
    assert_eq!(loaded, delta);
    assert_eq!(apply(&base, &loaded).unwrap().document, patched);
}

#[test]
fn delta_applies_to_drifted_base_with_warnings() {
    let base = json!({"a": {"b": 1}, "c": 1});
    let patched = json!({"a": {"b": 2}, "c": 1, "n": true});
    let delta = diff(&base, &patched).unwrap();

    let drifted = json!({"a": {"b": 5}, "c": 3, "extra": [1]});
    let out = apply(&drifted, &delta).unwrap();
    assert_eq!(
        out.document,
        json!({"a": {"b": 2}, "c": 3, "extra": [1], "n": true})
    );
    assert_eq!(out.warnings.len(), 1);
    assert_eq!(out.warnings[0].path, p("a.b"));
    assert_eq!(out.warnings[0].found, Some(json!(5)));
}

#[test]
fn invert_restores_base() {
    let base = bts_config();
    let mut patched = bts_config();
    patched["BTS"]["name"] = json!("site");
    patched["BTS"]["new"] = json!({"k": [1, 2]});
    patched["BTS"].as_object_mut().unwrap().remove("HWE");

    let delta = diff(&base, &patched).unwrap();
    let undone = apply(&patched, &delta.invert()).unwrap();
    assert_eq!(undone.document, base);
    assert!(undone.warnings.is_empty());
}

#[test]
fn keys_containing_separator_roundtrip_through_store() {
    let base = json!({"net.v4": {"addr": "10.0.0.1"}, "a\\b": 1});
    let patched = json!({"net.v4": {"addr": "10.0.0.2"}, "a\\b": 2});
    let delta = diff(&base, &patched).unwrap();

    let text = store::to_string_pretty(&delta).unwrap();
    let loaded = store::load(text.as_bytes()).unwrap();
    assert_eq!(apply(&base, &loaded).unwrap().document, patched);
}
