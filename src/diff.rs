// Tree differ.
//
// Walks two documents in lockstep from the root and classifies every
// differing position into exactly one delta section:
//   - key only in the patched mapping -> addition (whole subtree)
//   - key only in the base mapping    -> deletion (whole subtree)
//   - leaf vs leaf, unequal           -> update
//   - mapping vs leaf                 -> update (whole subtrees, no recursion)
// Equal subtrees are skipped without descending.

use serde_json::{Map, Value};

use crate::delta::{Delta, Update};
use crate::document::{self, InvalidDocument};
use crate::path::Path;

/// Default nesting limit for [`DiffOptions::max_depth`].
pub const DEFAULT_MAX_DEPTH: usize = 512;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for [`diff_with_options`].
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Deepest mapping nesting the differ will descend into.
    pub max_depth: usize,
    /// Compare arrays as multisets instead of sequences.
    ///
    /// Reordered arrays then produce no update, so reapplying the delta
    /// keeps the base order.
    pub ignore_array_order: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            ignore_array_order: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    #[error(transparent)]
    InvalidDocument(#[from] InvalidDocument),
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Compute the delta that turns `base` into `patched`.
pub fn diff(base: &Value, patched: &Value) -> Result<Delta, DiffError> {
    diff_with_options(base, patched, &DiffOptions::default())
}

/// Compute a delta with custom options.
pub fn diff_with_options(
    base: &Value,
    patched: &Value,
    opts: &DiffOptions,
) -> Result<Delta, DiffError> {
    let base = document::root_object(base, "base")?;
    let patched = document::root_object(patched, "patched")?;

    let mut differ = Differ {
        opts,
        delta: Delta::new(),
        stack: Vec::new(),
    };
    differ.diff_maps(base, patched)?;
    Ok(differ.delta)
}

// ---------------------------------------------------------------------------
// Walker
// ---------------------------------------------------------------------------

struct Differ<'a> {
    opts: &'a DiffOptions,
    delta: Delta,
    /// Segments of the mapping currently being compared.
    stack: Vec<String>,
}

impl Differ<'_> {
    fn path_to(&self, key: &str) -> Result<Path, InvalidDocument> {
        Path::new(self.stack.iter().cloned().chain(std::iter::once(key.to_string())))
            .map_err(|_| self.empty_key())
    }

    fn empty_key(&self) -> InvalidDocument {
        InvalidDocument::new(format!(
            "empty key below {:?} cannot be addressed",
            document_location(&self.stack)
        ))
    }

    fn diff_maps(
        &mut self,
        base: &Map<String, Value>,
        patched: &Map<String, Value>,
    ) -> Result<(), InvalidDocument> {
        if self.stack.len() >= self.opts.max_depth {
            return Err(InvalidDocument::new(format!(
                "nesting deeper than {} at {:?}",
                self.opts.max_depth,
                document_location(&self.stack)
            )));
        }

        for (key, new) in patched {
            match base.get(key) {
                None => {
                    let path = self.path_to(key)?;
                    self.delta.additions.insert(path, new.clone());
                }
                Some(old) => self.diff_values(key, old, new)?,
            }
        }

        for (key, old) in base {
            if !patched.contains_key(key) {
                let path = self.path_to(key)?;
                self.delta.deletions.insert(path, old.clone());
            }
        }
        Ok(())
    }

    fn diff_values(
        &mut self,
        key: &str,
        old: &Value,
        new: &Value,
    ) -> Result<(), InvalidDocument> {
        match (old, new) {
            (Value::Object(old_map), Value::Object(new_map)) => {
                if old_map == new_map {
                    return Ok(());
                }
                if key.is_empty() {
                    return Err(self.empty_key());
                }
                self.stack.push(key.to_string());
                let result = self.diff_maps(old_map, new_map);
                self.stack.pop();
                result
            }
            _ => {
                if document::values_equal(old, new, self.opts.ignore_array_order) {
                    return Ok(());
                }
                let path = self.path_to(key)?;
                self.delta.updates.insert(path, Update::new(old.clone(), new.clone()));
                Ok(())
            }
        }
    }
}

fn document_location(stack: &[String]) -> String {
    if stack.is_empty() {
        "<root>".to_string()
    } else {
        crate::path::encode(stack)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
