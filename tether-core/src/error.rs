//! Error types.
//!
//! Runtime races (stale views, faulty subscribers, double disposal) are never
//! reported through these types; they are absorbed where they happen and
//! logged. The errors here cover caller mistakes that can be detected up
//! front, such as a malformed path string or an unreadable configuration.

use thiserror::Error;

/// A path string could not be parsed into accessor steps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path was empty where a property was required.
    #[error("path is empty")]
    Empty,

    /// A `.` was not followed by a property name.
    #[error("empty segment at byte {offset} in `{path}`")]
    EmptySegment { path: String, offset: usize },

    /// A `[` was never closed.
    #[error("unclosed `[` at byte {offset} in `{path}`")]
    UnclosedBracket { path: String, offset: usize },

    /// The contents of `[...]` were not a non-negative integer.
    #[error("invalid index `{index}` in `{path}`")]
    InvalidIndex { path: String, index: String },

    /// A character that cannot start a segment, such as a stray `]`.
    #[error("unexpected `{found}` at byte {offset} in `{path}`")]
    Unexpected {
        path: String,
        offset: usize,
        found: char,
    },
}

/// Configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON document was malformed or had the wrong shape.
    #[error("invalid engine configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field had a value outside its allowed range.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors returned by the binding entry points.
#[derive(Debug, Error)]
pub enum BindError {
    /// The bound path could not be parsed.
    #[error(transparent)]
    Path(#[from] PathError),

    /// A filter template did not contain exactly one placeholder.
    #[error("filter template `{template}` must contain exactly one `{placeholder}`")]
    Filter {
        template: String,
        placeholder: String,
    },
}
