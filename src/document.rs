// Document helpers shared by the differ and the patcher.
//
// A document is any JSON value whose root is an object. Objects are the
// interior nodes; every other value (arrays included) is a leaf.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Deepest container nesting accepted when parsing JSON text.
///
/// Sits above `DEFAULT_MAX_DEPTH` so the differ's own limit is the one a
/// caller normally meets, with room for the wrapper levels of a delta file.
pub const MAX_NESTING: usize = 1024;

/// A configuration snapshot.
pub type Document = Value;

/// Error for inputs that are not well-formed documents.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid document: {reason}")]
pub struct InvalidDocument {
    pub reason: String,
}

impl InvalidDocument {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Borrow the root mapping of `doc`, or fail if the root is a leaf.
pub fn root_object<'a>(
    doc: &'a Document,
    role: &str,
) -> Result<&'a Map<String, Value>, InvalidDocument> {
    doc.as_object().ok_or_else(|| {
        InvalidDocument::new(format!(
            "{role} document root must be an object, found {}",
            kind(doc)
        ))
    })
}

/// Short name of a value's JSON type, for messages.
pub fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Leaf equality with optional order-insensitive array comparison.
///
/// With `ignore_array_order` set, two arrays are equal when one is a
/// permutation of the other, applied recursively to nested arrays and
/// objects.
pub fn values_equal(a: &Value, b: &Value, ignore_array_order: bool) -> bool {
    if !ignore_array_order {
        return a == b;
    }
    match (a, b) {
        (Value::Array(xs), Value::Array(ys)) => {
            if xs.len() != ys.len() {
                return false;
            }
            let mut used = vec![false; ys.len()];
            xs.iter().all(|x| {
                let found = ys
                    .iter()
                    .enumerate()
                    .position(|(i, y)| !used[i] && values_equal(x, y, true));
                match found {
                    Some(i) => {
                        used[i] = true;
                        true
                    }
                    None => false,
                }
            })
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y, true)))
        }
        _ => a == b,
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Failure to turn JSON text into a document.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    InvalidDocument(#[from] InvalidDocument),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Parse JSON text nested at most [`MAX_NESTING`] containers deep.
///
/// serde_json's recursion guard stops at 128 levels. It is disabled here and
/// replaced by a scan of the raw text that rejects deeper input before any
/// recursive parsing starts.
pub fn parse(bytes: &[u8]) -> Result<Value, ParseError> {
    check_nesting(bytes, MAX_NESTING)?;
    let mut de = serde_json::Deserializer::from_slice(bytes);
    de.disable_recursion_limit();
    let value = Value::deserialize(&mut de)?;
    de.end()?;
    Ok(value)
}

fn check_nesting(bytes: &[u8], limit: usize) -> Result<(), InvalidDocument> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for &b in bytes {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                if depth > limit {
                    return Err(InvalidDocument::new(format!("nesting deeper than {limit} levels")));
                }
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Compaction
// ---------------------------------------------------------------------------

/// Return a copy of `doc` with empty mappings removed.
///
/// Pruning is bottom-up, so a mapping that only contained empty mappings is
/// removed too. The root itself is kept even when it ends up empty.
pub fn compact(doc: &Document) -> Document {
    match doc {
        Value::Object(map) => Value::Object(compact_map(map)),
        other => other.clone(),
    }
}

fn compact_map(map: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in map {
        match value {
            Value::Object(child) => {
                let child = compact_map(child);
                if !child.is_empty() {
                    out.insert(key.clone(), Value::Object(child));
                }
            }
            other => {
                out.insert(key.clone(), other.clone());
            }
        }
    }
    out
}
