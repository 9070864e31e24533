//! Confdelta: structural deltas for hierarchical JSON configuration documents.
//!
//! The crate provides:
//! - A path codec for addressing nodes at any depth (`path`)
//! - A tree differ producing additions, deletions and updates (`diff`)
//! - The delta model and its invariants (`delta`)
//! - A patcher that reapplies a delta to a base document (`patch`)
//! - JSON persistence for deltas (`store`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use serde_json::json;
//!
//! let base = json!({"a": 1, "b": {"c": 2}});
//! let patched = json!({"a": 1, "b": {"c": 3, "d": 4}, "e": 5});
//!
//! let delta = confdelta::diff(&base, &patched).unwrap();
//! assert_eq!(delta.additions.len(), 2);
//! assert_eq!(delta.updates.len(), 1);
//!
//! let result = confdelta::apply(&base, &delta).unwrap();
//! assert_eq!(result.document, patched);
//! assert!(result.warnings.is_empty());
//! ```

pub mod delta;
pub mod diff;
pub mod document;
pub mod io;
pub mod patch;
pub mod path;
pub mod store;

#[cfg(feature = "cli")]
pub mod cli;

pub use delta::{Delta, DeltaSummary, Section, Update};
pub use diff::{DiffError, DiffOptions, diff, diff_with_options};
pub use document::{Document, InvalidDocument};
pub use patch::{PatchError, Patched, StalePatchWarning, apply};
pub use path::{Path, PathError};
pub use store::StoreError;
