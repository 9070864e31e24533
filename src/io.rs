// File-level helpers for computing and applying deltas.
//
// Provides `diff_files()` and `apply_file()` convenience functions that wrap
// the in-memory differ and patcher with buffered I/O. Optionally computes
// SHA-256 digests of the documents involved (feature-gated behind `file-io`).

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use log::{debug, warn};
use serde_json::Value;

use crate::delta::{Delta, DeltaSummary};
use crate::diff::{self, DiffError, DiffOptions};
use crate::document::{self, Document, InvalidDocument, ParseError};
use crate::patch::{self, PatchError, StalePatchWarning};
use crate::store::{self, StoreError};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `diff_files()`.
#[derive(Debug, Clone)]
pub struct DiffStats {
    /// Base document size in bytes.
    pub base_size: u64,
    /// Patched document size in bytes.
    pub patched_size: u64,
    /// Delta output size in bytes.
    pub delta_size: u64,
    /// Entry counts per section.
    pub summary: DeltaSummary,
    /// SHA-256 of the base file (if `file-io` feature is enabled).
    pub base_sha256: Option<[u8; 32]>,
    /// SHA-256 of the patched file (if `file-io` feature is enabled).
    pub patched_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `apply_file()`.
#[derive(Debug, Clone)]
pub struct ApplyStats {
    /// Base document size in bytes.
    pub base_size: u64,
    /// Delta file size in bytes.
    pub delta_size: u64,
    /// Written document size in bytes.
    pub output_size: u64,
    /// Entry counts of the applied delta.
    pub summary: DeltaSummary,
    /// Updates whose recorded old value did not match the base.
    pub warnings: Vec<StalePatchWarning>,
    /// SHA-256 of the written document (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

/// Options for `apply_file()`.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Prune empty mappings from the result before writing.
    pub compact: bool,
    /// Refuse to write the result when any update is stale.
    pub strict: bool,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// I/O error (file open, read, write).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A document file is not valid JSON.
    #[error("{path}: invalid JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// A document file parses but cannot be handled, e.g. it nests too deeply.
    #[error("{path}: {source}")]
    Document {
        path: String,
        #[source]
        source: InvalidDocument,
    },
    #[error("diff error: {0}")]
    Diff(#[from] DiffError),
    #[error("patch error: {0}")]
    Patch(#[from] PatchError),
    #[error("delta error: {0}")]
    Store(#[from] StoreError),
    /// Strict apply found stale updates; nothing was written.
    #[error("{} stale update(s), output not written", .0.len())]
    Stale(Vec<StalePatchWarning>),
}

// ---------------------------------------------------------------------------
// Buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Read and parse a JSON document.
pub fn read_document(path: &Path) -> Result<Document, IoError> {
    let bytes = std::fs::read(path)?;
    parse_document(path, &bytes)
}

fn parse_document(path: &Path, bytes: &[u8]) -> Result<Document, IoError> {
    let path = path.display().to_string();
    document::parse(bytes).map_err(|e| match e {
        ParseError::Json(source) => IoError::Json { path, source },
        ParseError::InvalidDocument(source) => IoError::Document { path, source },
    })
}

/// Write a JSON document with the crate's four-space indent.
///
/// Returns the number of bytes written.
pub fn write_document(path: &Path, doc: &Value) -> Result<u64, IoError> {
    let mut buf = Vec::new();
    store::write_pretty(&mut buf, doc)?;
    let mut writer = BufWriter::with_capacity(BUF_SIZE, File::create(path)?);
    writer.write_all(&buf)?;
    writer.flush()?;
    Ok(buf.len() as u64)
}

/// Load a delta file.
pub fn read_delta(path: &Path) -> Result<Delta, IoError> {
    let reader = BufReader::with_capacity(BUF_SIZE, File::open(path)?);
    Ok(store::load(reader)?)
}

/// Save a delta file, returning the number of bytes written.
pub fn write_delta(path: &Path, delta: &Delta) -> Result<u64, IoError> {
    write_document(path, &store::to_value(delta))
}

// ---------------------------------------------------------------------------
// diff_files
// ---------------------------------------------------------------------------

/// Compute the delta between two document files, writing it to `delta_path`.
pub fn diff_files(
    base_path: &Path,
    patched_path: &Path,
    delta_path: &Path,
    opts: &DiffOptions,
) -> Result<DiffStats, IoError> {
    let base_bytes = std::fs::read(base_path)?;
    let patched_bytes = std::fs::read(patched_path)?;
    let base = parse_document(base_path, &base_bytes)?;
    let patched = parse_document(patched_path, &patched_bytes)?;

    let delta = diff::diff_with_options(&base, &patched, opts)?;
    let summary = delta.summary();
    debug!(
        "diff {} -> {}: {} additions, {} deletions, {} updates",
        base_path.display(),
        patched_path.display(),
        summary.additions,
        summary.deletions,
        summary.updates
    );

    let delta_size = write_delta(delta_path, &delta)?;

    Ok(DiffStats {
        base_size: base_bytes.len() as u64,
        patched_size: patched_bytes.len() as u64,
        delta_size,
        summary,
        base_sha256: sha256(&base_bytes),
        patched_sha256: sha256(&patched_bytes),
    })
}

// ---------------------------------------------------------------------------
// apply_file
// ---------------------------------------------------------------------------

/// Apply a delta file to a base document file, writing to `output_path`.
///
/// Stale updates are logged and returned in the stats. With
/// `ApplyOptions::strict` they abort before anything is written.
pub fn apply_file(
    base_path: &Path,
    delta_path: &Path,
    output_path: &Path,
    opts: &ApplyOptions,
) -> Result<ApplyStats, IoError> {
    let base_bytes = std::fs::read(base_path)?;
    let base = parse_document(base_path, &base_bytes)?;
    let delta_size = std::fs::metadata(delta_path)?.len();
    let delta = read_delta(delta_path)?;

    let patched = patch::apply(&base, &delta)?;
    for w in &patched.warnings {
        warn!("{w}");
    }
    if opts.strict && !patched.is_clean() {
        return Err(IoError::Stale(patched.warnings));
    }

    let document = if opts.compact {
        document::compact(&patched.document)
    } else {
        patched.document
    };

    let mut out = Vec::new();
    store::write_pretty(&mut out, &document)?;
    let mut writer = BufWriter::with_capacity(BUF_SIZE, File::create(output_path)?);
    writer.write_all(&out)?;
    writer.flush()?;
    debug!(
        "applied {} entries to {}, wrote {} bytes",
        delta.len(),
        base_path.display(),
        out.len()
    );

    Ok(ApplyStats {
        base_size: base_bytes.len() as u64,
        delta_size,
        output_size: out.len() as u64,
        summary: delta.summary(),
        warnings: patched.warnings,
        output_sha256: sha256(&out),
    })
}

// ---------------------------------------------------------------------------
// Digests
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
fn sha256(data: &[u8]) -> Option<[u8; 32]> {
    use sha2::Digest;
    Some(sha2::Sha256::digest(data).into())
}

#[cfg(not(feature = "file-io"))]
fn sha256(_data: &[u8]) -> Option<[u8; 32]> {
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
