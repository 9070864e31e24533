// Tree patcher.
//
// Applies a delta to a copy of a base document. Sections are applied in a
// fixed order (additions, deletions, updates), each in path order, so the
// result is deterministic. The base is never modified; on error nothing is
// returned.

use serde_json::{Map, Value};

use crate::delta::{Delta, Update};
use crate::document::{self, Document, InvalidDocument};
use crate::path::Path;

// ---------------------------------------------------------------------------
// Errors and warnings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatchError {
    #[error(transparent)]
    InvalidDocument(#[from] InvalidDocument),
    /// An intermediate node on the way to `path` is a leaf.
    #[error("cannot apply change at {path}: {at} is a {found}, not a mapping")]
    PathConflict {
        path: Path,
        at: Path,
        found: &'static str,
    },
}

/// The base value at an update's path was not the value the delta recorded.
///
/// The new value is applied anyway.
#[derive(Debug, Clone, PartialEq)]
pub struct StalePatchWarning {
    pub path: Path,
    /// `old_value` recorded in the delta.
    pub expected: Value,
    /// What the base held, `None` when the path was absent.
    pub found: Option<Value>,
}

impl std::fmt::Display for StalePatchWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.found {
            Some(found) => write!(
                f,
                "stale update at {}: expected {}, found {}",
                self.path, self.expected, found
            ),
            None => write!(
                f,
                "stale update at {}: expected {}, path was absent",
                self.path, self.expected
            ),
        }
    }
}

/// Result of a successful [`apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct Patched {
    pub document: Document,
    pub warnings: Vec<StalePatchWarning>,
}

impl Patched {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

/// Apply `delta` to `base`, returning the patched copy.
pub fn apply(base: &Document, delta: &Delta) -> Result<Patched, PatchError> {
    document::root_object(base, "base")?;

    let mut doc = base.clone();
    let mut warnings = Vec::new();
    {
        let root = doc
            .as_object_mut()
            .ok_or_else(|| InvalidDocument::new("base document root must be an object"))?;

        for (path, value) in &delta.additions {
            let parent = walk_create(root, path)?;
            parent.insert(path.last().to_string(), value.clone());
        }

        for path in delta.deletions.keys() {
            if let Some(parent) = walk_existing(root, path) {
                parent.remove(path.last());
            }
        }

        for (path, update) in &delta.updates {
            let parent = walk_create(root, path)?;
            if let Some(warning) = check_stale(path, update, parent.get(path.last())) {
                warnings.push(warning);
            }
            parent.insert(path.last().to_string(), update.new_value.clone());
        }
    }

    Ok(Patched {
        document: doc,
        warnings,
    })
}

/// Descend to the mapping that holds `path`'s final segment, creating empty
/// mappings for missing intermediates.
fn walk_create<'a>(
    root: &'a mut Map<String, Value>,
    path: &Path,
) -> Result<&'a mut Map<String, Value>, PatchError> {
    let mut current = root;
    for (depth, segment) in path.intermediates().iter().enumerate() {
        let node = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        current = match node {
            Value::Object(map) => map,
            other => {
                return Err(PatchError::PathConflict {
                    path: path.clone(),
                    at: prefix(path, depth + 1),
                    found: document::kind(other),
                });
            }
        };
    }
    Ok(current)
}

/// Descend to the mapping that holds `path`'s final segment without
/// creating anything. `None` if an intermediate is absent or a leaf.
fn walk_existing<'a>(
    root: &'a mut Map<String, Value>,
    path: &Path,
) -> Option<&'a mut Map<String, Value>> {
    let mut current = root;
    for segment in path.intermediates() {
        current = current.get_mut(segment)?.as_object_mut()?;
    }
    Some(current)
}

fn check_stale(
    path: &Path,
    update: &Update,
    current: Option<&Value>,
) -> Option<StalePatchWarning> {
    if current == Some(&update.old_value) {
        return None;
    }
    Some(StalePatchWarning {
        path: path.clone(),
        expected: update.old_value.clone(),
        found: current.cloned(),
    })
}

fn prefix(path: &Path, len: usize) -> Path {
    // `len` is at least 1 and at most the path depth.
    Path::new(path.segments()[..len].iter().cloned()).unwrap_or_else(|_| path.clone())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(s: &str) -> Path {
        Path::decode(s).unwrap()
    }

    #[test]
    fn addition_creates_intermediates() {
        let mut d = Delta::new();
        d.additions.insert(p("a.b.c"), json!(1));
        let out = apply(&json!({}), &d).unwrap();
        assert_eq!(out.document, json!({"a": {"b": {"c": 1}}}));
        assert!(out.is_clean());
    }

    #[test]
    fn addition_through_leaf_conflicts() {
        let mut d = Delta::new();
        d.additions.insert(p("p.q"), json!(1));
        let err = apply(&json!({"p": 5}), &d).unwrap_err();
        assert_eq!(
            err,
            PatchError::PathConflict {
                path: p("p.q"),
                at: p("p"),
                found: "number",
            }
        );
    }

    #[test]
    fn conflict_reports_deepest_blocking_node() {
        let mut d = Delta::new();
        d.additions.insert(p("a.b.c.d"), json!(1));
        let err = apply(&json!({"a": {"b": [1]}}), &d).unwrap_err();
        assert!(matches!(
            err,
            PatchError::PathConflict { ref at, found: "array", .. } if *at == p("a.b")
        ));
    }

    #[test]
    fn deletion_of_missing_path_is_noop() {
        let mut d = Delta::new();
        d.deletions.insert(p("x.y.z"), json!(1));
        d.deletions.insert(p("a.b"), json!(1));
        d.deletions.insert(p("gone"), json!(1));
        let base = json!({"a": 3, "k": true});
        let out = apply(&base, &d).unwrap();
        assert_eq!(out.document, base);
    }

    #[test]
    fn deletion_leaves_empty_mapping() {
        let mut d = Delta::new();
        d.deletions.insert(p("a.b"), json!(1));
        let out = apply(&json!({"a": {"b": 1}}), &d).unwrap();
        assert_eq!(out.document, json!({"a": {}}));
    }

    #[test]
    fn update_sets_value() {
        let mut d = Delta::new();
        d.updates.insert(p("a.b"), Update::new(json!(1), json!(2)));
        let out = apply(&json!({"a": {"b": 1}}), &d).unwrap();
        assert_eq!(out.document, json!({"a": {"b": 2}}));
        assert!(out.is_clean());
    }

    #[test]
    fn stale_update_warns_but_applies() {
        let mut d = Delta::new();
        d.updates.insert(p("a.b"), Update::new(json!(1), json!(2)));
        d.updates.insert(p("c"), Update::new(json!("x"), json!("y")));
        let out = apply(&json!({"a": {"b": 7}}), &d).unwrap();
        assert_eq!(out.document, json!({"a": {"b": 2}, "c": "y"}));
        assert_eq!(
            out.warnings,
            vec![
                StalePatchWarning {
                    path: p("a.b"),
                    expected: json!(1),
                    found: Some(json!(7)),
                },
                StalePatchWarning {
                    path: p("c"),
                    expected: json!("x"),
                    found: None,
                },
            ]
        );
        assert_eq!(
            out.warnings[0].to_string(),
            "stale update at a.b: expected 1, found 7"
        );
    }

    #[test]
    fn update_through_leaf_conflicts() {
        let mut d = Delta::new();
        d.updates.insert(p("a.b"), Update::new(json!(1), json!(2)));
        assert!(matches!(
            apply(&json!({"a": "s"}), &d),
            Err(PatchError::PathConflict { .. })
        ));
    }

    #[test]
    fn base_is_not_modified() {
        let base = json!({"a": 1});
        let mut d = Delta::new();
        d.additions.insert(p("b"), json!(2));
        d.deletions.insert(p("a"), json!(1));
        let out = apply(&base, &d).unwrap();
        assert_eq!(base, json!({"a": 1}));
        assert_eq!(out.document, json!({"b": 2}));
    }

    #[test]
    fn failed_apply_returns_nothing_partial() {
        let mut d = Delta::new();
        d.additions.insert(p("a"), json!(1));
        d.additions.insert(p("z.q"), json!(1));
        let base = json!({"z": 0});
        assert!(apply(&base, &d).is_err());
        assert_eq!(base, json!({"z": 0}));
    }

    #[test]
    fn non_object_base_rejected() {
        assert!(matches!(
            apply(&json!([1]), &Delta::new()),
            Err(PatchError::InvalidDocument(_))
        ));
    }

    #[test]
    fn apply_is_idempotent() {
        let mut d = Delta::new();
        d.additions.insert(p("n.m"), json!({"k": 1}));
        d.deletions.insert(p("old"), json!(0));
        d.updates.insert(p("v"), Update::new(json!(1), json!(2)));
        let base = json!({"old": 0, "v": 1});
        let once = apply(&base, &d).unwrap();
        let twice = apply(&once.document, &d).unwrap();
        assert_eq!(once.document, twice.document);
        assert_eq!(twice.warnings.len(), 1);
    }
}
