// Delta persistence.
//
// A delta is stored as one JSON object with three sections:
//
//   {
//     "additions": { "<path>": <value>, ... },
//     "deletions": { "<path>": <value>, ... },
//     "updates":   { "<path>": {"old_value": <v>, "new_value": <v>}, ... }
//   }
//
// Keys are encoded paths. Output is pretty-printed with a four-space indent.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

use crate::delta::{Delta, DeltaConflict, Section, Update};
use crate::document::{self, ParseError};
use crate::path::{Path, PathError};

/// Indent used for every JSON file this crate writes.
pub const JSON_INDENT: &[u8] = b"    ";

const OLD_VALUE: &str = "old_value";
const NEW_VALUE: &str = "new_value";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed delta: {0}")]
    MalformedDelta(String),
    #[error("malformed delta: bad key in {section}: {source}")]
    MalformedPath {
        section: Section,
        #[source]
        source: PathError,
    },
}

impl From<DeltaConflict> for StoreError {
    fn from(e: DeltaConflict) -> Self {
        Self::MalformedDelta(e.to_string())
    }
}

impl From<ParseError> for StoreError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::Json(e) => Self::Json(e),
            ParseError::InvalidDocument(e) => Self::MalformedDelta(e.reason),
        }
    }
}

// ---------------------------------------------------------------------------
// Value conversion
// ---------------------------------------------------------------------------

/// Persisted form of `delta`.
pub fn to_value(delta: &Delta) -> Value {
    let additions = delta
        .additions
        .iter()
        .map(|(path, value)| (path.encode(), value.clone()))
        .collect::<Map<_, _>>();
    let deletions = delta
        .deletions
        .iter()
        .map(|(path, value)| (path.encode(), value.clone()))
        .collect::<Map<_, _>>();
    let updates = delta
        .updates
        .iter()
        .map(|(path, update)| {
            let mut entry = Map::new();
            entry.insert(OLD_VALUE.to_string(), update.old_value.clone());
            entry.insert(NEW_VALUE.to_string(), update.new_value.clone());
            (path.encode(), Value::Object(entry))
        })
        .collect::<Map<_, _>>();

    let mut root = Map::new();
    root.insert(Section::Additions.name().to_string(), Value::Object(additions));
    root.insert(Section::Deletions.name().to_string(), Value::Object(deletions));
    root.insert(Section::Updates.name().to_string(), Value::Object(updates));
    Value::Object(root)
}

/// Parse the persisted form back into a delta.
///
/// All three sections must be present. The loaded delta must satisfy the
/// section invariants checked by [`Delta::validate`].
pub fn from_value(value: Value) -> Result<Delta, StoreError> {
    let Value::Object(mut root) = value else {
        return Err(StoreError::MalformedDelta(
            "top level must be an object".into(),
        ));
    };

    let additions = section(&mut root, Section::Additions)?;
    let deletions = section(&mut root, Section::Deletions)?;
    let updates = section(&mut root, Section::Updates)?
        .into_iter()
        .map(|(path, entry)| -> Result<_, StoreError> {
            let update = parse_update(&path, entry)?;
            Ok((path, update))
        })
        .collect::<Result<BTreeMap<_, _>, StoreError>>()?;

    let delta = Delta {
        additions,
        deletions,
        updates,
    };
    delta.validate()?;
    Ok(delta)
}

fn section(
    root: &mut Map<String, Value>,
    section: Section,
) -> Result<BTreeMap<Path, Value>, StoreError> {
    let entries = match root.remove(section.name()) {
        Some(Value::Object(entries)) => entries,
        Some(_) => {
            return Err(StoreError::MalformedDelta(format!(
                "section {section} must be an object"
            )));
        }
        None => {
            return Err(StoreError::MalformedDelta(format!(
                "missing section {section}"
            )));
        }
    };

    entries
        .into_iter()
        .map(|(key, value)| -> Result<_, StoreError> {
            let path = Path::decode(&key)
                .map_err(|source| StoreError::MalformedPath { section, source })?;
            Ok((path, value))
        })
        .collect()
}

fn parse_update(path: &Path, entry: Value) -> Result<Update, StoreError> {
    let Value::Object(mut fields) = entry else {
        return Err(StoreError::MalformedDelta(format!(
            "update {path} must be an object"
        )));
    };
    let mut take = |name: &str| {
        fields.remove(name).ok_or_else(|| {
            StoreError::MalformedDelta(format!("update {path} is missing {name}"))
        })
    };
    let old_value = take(OLD_VALUE)?;
    let new_value = take(NEW_VALUE)?;
    Ok(Update {
        old_value,
        new_value,
    })
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

/// Write any JSON value with the crate's four-space indent.
pub fn write_pretty<W: Write>(mut writer: W, value: &Value) -> Result<(), StoreError> {
    let formatter = PrettyFormatter::with_indent(JSON_INDENT);
    let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
    value.serialize(&mut ser)?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Serialize `delta` to `writer`.
pub fn save<W: Write>(delta: &Delta, writer: W) -> Result<(), StoreError> {
    write_pretty(writer, &to_value(delta))
}

/// Deserialize a delta from `reader`.
///
/// Accepts the same nesting depth as document parsing, so a delta recorded
/// against a deep document loads back.
pub fn load<R: Read>(mut reader: R) -> Result<Delta, StoreError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    from_value(document::parse(&bytes)?)
}

/// Pretty-printed persisted form.
pub fn to_string_pretty(delta: &Delta) -> Result<String, StoreError> {
    let mut out = Vec::new();
    save(delta, &mut out)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}
