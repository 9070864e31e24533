// Path codec: locations inside a document tree.
//
// A `Path` is an ordered, non-empty sequence of non-empty key segments.
// Its persisted form joins segments with `.`; a literal `.` or `\` inside a
// segment is backslash-escaped so decoding is unambiguous at any depth.

use std::fmt;
use std::str::FromStr;

/// Segment separator in the encoded form.
pub const SEPARATOR: char = '.';
/// Escape character in the encoded form.
pub const ESCAPE: char = '\\';

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error produced when a path cannot be built or decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// The encoded string is not a valid path.
    #[error("malformed path {input:?}: {reason}")]
    Malformed { input: String, reason: &'static str },
    /// A path was built from no segments.
    #[error("path must have at least one segment")]
    Empty,
    /// A path segment was the empty string.
    #[error("empty segment at position {index}")]
    EmptySegment { index: usize },
}

impl PathError {
    fn malformed(input: &str, reason: &'static str) -> Self {
        Self::Malformed {
            input: input.to_string(),
            reason,
        }
    }
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

/// Encode a segment sequence as a single dot-joined string.
pub fn encode<S: AsRef<str>>(segments: &[S]) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            out.push(SEPARATOR);
        }
        for c in segment.as_ref().chars() {
            if c == SEPARATOR || c == ESCAPE {
                out.push(ESCAPE);
            }
            out.push(c);
        }
    }
    out
}

/// Decode a dot-joined string into its segments.
///
/// Fails on the empty string, on empty segments (leading, trailing or
/// doubled separators), and on escapes other than `\.` and `\\`.
pub fn decode(input: &str) -> Result<Vec<String>, PathError> {
    if input.is_empty() {
        return Err(PathError::malformed(input, "empty path"));
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            ESCAPE => match chars.next() {
                Some(next @ (SEPARATOR | ESCAPE)) => current.push(next),
                Some(_) => return Err(PathError::malformed(input, "invalid escape sequence")),
                None => return Err(PathError::malformed(input, "dangling escape")),
            },
            SEPARATOR => {
                if current.is_empty() {
                    return Err(PathError::malformed(input, "empty segment"));
                }
                segments.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }

    if current.is_empty() {
        return Err(PathError::malformed(input, "empty segment"));
    }
    segments.push(current);
    Ok(segments)
}

// ---------------------------------------------------------------------------
// Path
// ---------------------------------------------------------------------------

/// A location inside a document, addressed from the root.
///
/// Ordering is lexicographic over segments, so collections keyed by `Path`
/// iterate parents before their descendants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Build a path from segments, rejecting an empty list or empty segments.
    pub fn new<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(PathError::Empty);
        }
        if let Some(index) = segments.iter().position(String::is_empty) {
            return Err(PathError::EmptySegment { index });
        }
        Ok(Self { segments })
    }

    /// Decode from the persisted string form.
    pub fn decode(input: &str) -> Result<Self, PathError> {
        Ok(Self {
            segments: decode(input)?,
        })
    }

    /// Encode to the persisted string form.
    pub fn encode(&self) -> String {
        encode(&self.segments)
    }

    /// Path of `key` below this one.
    pub fn child(&self, key: impl Into<String>) -> Result<Self, PathError> {
        let key = key.into();
        if key.is_empty() {
            return Err(PathError::EmptySegment {
                index: self.segments.len(),
            });
        }
        let mut segments = self.segments.clone();
        segments.push(key);
        Ok(Self { segments })
    }

    /// Enclosing path, or `None` for a top-level key.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Final segment.
    pub fn last(&self) -> &str {
        // Non-empty by construction.
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Intermediate segments, i.e. everything but the last.
    pub fn intermediates(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// `true` if `prefix` equals this path or is one of its ancestors.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// `true` if this path is an ancestor of `other` (and not equal to it).
    pub fn is_strict_prefix_of(&self, other: &Path) -> bool {
        self.segments.len() < other.segments.len() && other.starts_with(self)
    }

    /// Every strict ancestor, shortest first.
    pub fn ancestors(&self) -> impl Iterator<Item = Path> + '_ {
        (1..self.segments.len()).map(|n| Path {
            segments: self.segments[..n].to_vec(),
        })
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
