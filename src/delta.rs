// Delta model.
//
// A delta is three path-keyed sections: additions, deletions and updates.
// The differ builds one; the store persists it; the patcher applies it.
// Once built a delta is never modified in place.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::path::Path;

/// An update entry: the value before and after.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub old_value: Value,
    pub new_value: Value,
}

impl Update {
    pub fn new(old_value: Value, new_value: Value) -> Self {
        Self {
            old_value,
            new_value,
        }
    }

    /// The same update, reversed.
    pub fn inverted(&self) -> Self {
        Self {
            old_value: self.new_value.clone(),
            new_value: self.old_value.clone(),
        }
    }
}

/// Which section of a delta an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    Additions,
    Deletions,
    Updates,
}

impl Section {
    /// Key of this section in the persisted form.
    pub fn name(self) -> &'static str {
        match self {
            Self::Additions => "additions",
            Self::Deletions => "deletions",
            Self::Updates => "updates",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Invariant violations
// ---------------------------------------------------------------------------

/// A delta whose sections overlap.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeltaConflict {
    /// The same path appears in two sections.
    #[error("path {path} appears in both {first} and {second}")]
    Duplicate {
        path: Path,
        first: Section,
        second: Section,
    },
    /// A structural change overlaps a change in another section.
    #[error("{outer} entry {prefix} overlaps {inner} entry {path}")]
    Overlap {
        prefix: Path,
        outer: Section,
        path: Path,
        inner: Section,
    },
}

// ---------------------------------------------------------------------------
// Delta
// ---------------------------------------------------------------------------

/// Per-section entry counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaSummary {
    pub additions: usize,
    pub deletions: usize,
    pub updates: usize,
}

impl DeltaSummary {
    pub fn total(&self) -> usize {
        self.additions + self.deletions + self.updates
    }
}

/// The set of changes that turns one document into another.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    /// Values present only in the patched document.
    pub additions: BTreeMap<Path, Value>,
    /// Values present only in the base document.
    pub deletions: BTreeMap<Path, Value>,
    /// Leaves (or type-mismatched subtrees) whose value changed.
    pub updates: BTreeMap<Path, Update>,
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty() && self.updates.is_empty()
    }

    /// Total number of entries across all sections.
    pub fn len(&self) -> usize {
        self.additions.len() + self.deletions.len() + self.updates.len()
    }

    pub fn summary(&self) -> DeltaSummary {
        DeltaSummary {
            additions: self.additions.len(),
            deletions: self.deletions.len(),
            updates: self.updates.len(),
        }
    }

    /// Every entry's section and path, section by section in path order.
    pub fn paths(&self) -> impl Iterator<Item = (Section, &Path)> {
        let additions = self.additions.keys().map(|p| (Section::Additions, p));
        let deletions = self.deletions.keys().map(|p| (Section::Deletions, p));
        let updates = self.updates.keys().map(|p| (Section::Updates, p));
        additions.chain(deletions).chain(updates)
    }

    /// The delta that undoes this one.
    ///
    /// Additions become deletions and vice versa; every update swaps its old
    /// and new values. Inverting twice gives back the original.
    pub fn invert(&self) -> Self {
        Self {
            additions: self.deletions.clone(),
            deletions: self.additions.clone(),
            updates: self
                .updates
                .iter()
                .map(|(path, update)| (path.clone(), update.inverted()))
                .collect(),
        }
    }

    /// Check that sections are disjoint and that no addition or deletion
    /// overlaps an entry in a different section.
    pub fn validate(&self) -> Result<(), DeltaConflict> {
        let mut index: BTreeMap<&Path, Section> = BTreeMap::new();
        for (section, path) in self.paths() {
            if let Some(first) = index.insert(path, section) {
                return Err(DeltaConflict::Duplicate {
                    path: path.clone(),
                    first,
                    second: section,
                });
            }
        }

        for (&path, &inner) in &index {
            for prefix in path.ancestors() {
                let Some(&outer) = index.get(&prefix) else {
                    continue;
                };
                let structural = |s: Section| s != Section::Updates;
                if outer != inner && (structural(outer) || structural(inner)) {
                    return Err(DeltaConflict::Overlap {
                        prefix,
                        outer,
                        path: path.clone(),
                        inner,
                    });
                }
            }
        }
        Ok(())
    }
}
