//! Parse issue types
//!
//! A failed parse yields an [`Issues`] collection; each [`Issue`] names the
//! offending location with a dotted path (`"items.0.name"`, empty for the root).

use std::fmt;

use crate::config::UnknownKeys;

// ============================================================================
// Parse Result
// ============================================================================

/// Parse result type
pub type ParseResult<T> = Result<T, Issues>;

// ============================================================================
// Issues Collection
// ============================================================================

/// Ordered collection of parse issues, in the order they were detected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Issues {
    pub issues: Vec<Issue>,
}

impl Issues {
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn add(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn merge(&mut self, other: Issues) {
        self.issues.extend(other.issues);
    }

    pub fn as_slice(&self) -> &[Issue] {
        &self.issues
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Issue> {
        self.issues.iter()
    }
}

impl IntoIterator for Issues {
    type Item = Issue;
    type IntoIter = std::vec::IntoIter<Issue>;

    fn into_iter(self) -> Self::IntoIter {
        self.issues.into_iter()
    }
}

impl fmt::Display for Issues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation issue(s)", self.issues.len())?;
        if let Some(first) = self.issues.first() {
            write!(f, ": {}", first)?;
        }
        Ok(())
    }
}

impl std::error::Error for Issues {}

// ============================================================================
// Single Issue
// ============================================================================

/// A single problem found while parsing a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    /// Path segments from the root to the offending value
    pub path: Vec<String>,
    /// Human-readable message
    pub message: String,
    pub code: IssueCode,
}

impl Issue {
    pub fn new(path: Vec<String>, message: impl Into<String>, code: IssueCode) -> Self {
        Self {
            path,
            message: message.into(),
            code,
        }
    }

    /// Dotted path, empty for the root value.
    pub fn path_string(&self) -> String {
        self.path.join(".")
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{} [{}]", self.message, self.code)
        } else {
            write!(f, "{}: {} [{}]", self.path_string(), self.message, self.code)
        }
    }
}

// ============================================================================
// Issue Classification
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueCode {
    /// Type mismatch (e.g., expected string, got integer)
    InvalidType,
    /// Constraint violation (length, range, pattern)
    InvalidValue,
    /// Required field missing
    Missing,
    /// Keys present that the object does not declare
    UnrecognizedKeys,
    /// Invalid format (e.g., invalid email, malformed UUID)
    InvalidFormat,
    /// No union variant matched
    InvalidUnion,
    /// A refinement or custom check rejected the value
    Custom,
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidType => "invalid_type",
            Self::InvalidValue => "invalid_value",
            Self::Missing => "missing",
            Self::UnrecognizedKeys => "unrecognized_keys",
            Self::InvalidFormat => "invalid_format",
            Self::InvalidUnion => "invalid_union",
            Self::Custom => "custom",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Parse Context
// ============================================================================

/// Tracks the current location while walking nested values.
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
    path: Vec<String>,
    /// Unknown-key policy forced onto the top-level object only
    root_keys: Option<UnknownKeys>,
}

impl ParseContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root_keys(policy: UnknownKeys) -> Self {
        Self {
            path: Vec::new(),
            root_keys: Some(policy),
        }
    }

    pub fn push(&mut self, segment: impl Into<String>) {
        self.path.push(segment.into());
    }

    pub fn pop(&mut self) {
        self.path.pop();
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    pub fn current_path(&self) -> String {
        self.path.join(".")
    }

    /// Policy for unknown keys of the object at the current location.
    pub fn unknown_keys(&self, declared: UnknownKeys) -> UnknownKeys {
        match self.root_keys {
            Some(forced) if self.is_root() => forced,
            _ => declared,
        }
    }

    /// Build an issue located at the current path.
    pub fn issue(&self, message: impl Into<String>, code: IssueCode) -> Issue {
        Issue::new(self.path.clone(), message, code)
    }
}
