//! Accessor keys.

use std::fmt;

use smallvec::SmallVec;

/// A sequence of accessor steps.
///
/// Most bound paths are a handful of steps deep, so they stay inline.
pub type Steps = SmallVec<[PathKey; 8]>;

/// One accessor step: a named property or an array position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathKey {
    /// A named property (`.name`).
    Field(String),
    /// An array position (`[n]`).
    Index(usize),
}

impl PathKey {
    /// Build a key from a string, treating canonical integers as indices.
    pub fn new(key: &str) -> Self {
        match parse_index(key) {
            Some(index) => Self::Index(index),
            None => Self::Field(key.to_owned()),
        }
    }

    /// The key as it appears in a JSON object.
    ///
    /// Indices used against an object become their decimal spelling, which
    /// is the same key a numeric string would have produced.
    pub fn as_field(&self) -> String {
        match self {
            Self::Field(name) => name.clone(),
            Self::Index(index) => index.to_string(),
        }
    }

    /// The array position, if the key is one.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Field(_) => None,
        }
    }
}

/// Parse `key` as a canonical array index: ASCII digits without a leading
/// zero (except `"0"` itself).
pub(crate) fn parse_index(key: &str) -> Option<usize> {
    let bytes = key.as_bytes();
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return None;
    }
    key.parse().ok()
}

impl From<&str> for PathKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for PathKey {
    fn from(key: String) -> Self {
        match parse_index(&key) {
            Some(index) => Self::Index(index),
            None => Self::Field(key),
        }
    }
}

impl From<usize> for PathKey {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}
