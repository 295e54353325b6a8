//! Path resolution and parsing.

use crate::error::PathError;

use super::key::{parse_index, PathKey, Steps};

/// Resolve one accessor step against a parent path.
///
/// ```
/// use tether_core::path::{resolve, PathKey};
///
/// assert_eq!(resolve("", &PathKey::from("items")), "items");
/// assert_eq!(resolve("items", &PathKey::from(2)), "items[2]");
/// assert_eq!(resolve("items[2]", &PathKey::from("name")), "items[2].name");
/// assert_eq!(resolve("items", &PathKey::from("2")), "items[2]");
/// ```
pub fn resolve(parent: &str, key: &PathKey) -> String {
    match key {
        PathKey::Index(index) => format!("{parent}[{index}]"),
        PathKey::Field(name) if parent.is_empty() => name.clone(),
        PathKey::Field(name) => format!("{parent}.{name}"),
    }
}

/// Resolve a whole step sequence from the root.
pub fn resolve_all<'a, I>(steps: I) -> String
where
    I: IntoIterator<Item = &'a PathKey>,
{
    steps
        .into_iter()
        .fold(String::new(), |path, key| resolve(&path, key))
}

/// Parse a path string back into accessor steps.
///
/// Accepts both bracket and dotted indices (`items[0].name`,
/// `items.0.name`). The empty string is the root and parses to no steps.
pub fn parse(path: &str) -> Result<Steps, PathError> {
    let bytes = path.as_bytes();
    let mut steps = Steps::new();
    let mut i = 0;
    // True at the start and right after a `.`.
    let mut expect_segment = true;

    while i < bytes.len() {
        match bytes[i] {
            b'[' => {
                if expect_segment && !steps.is_empty() {
                    return Err(PathError::EmptySegment {
                        path: path.to_owned(),
                        offset: i,
                    });
                }
                let close = path[i + 1..]
                    .find(']')
                    .map(|rel| i + 1 + rel)
                    .ok_or_else(|| PathError::UnclosedBracket {
                        path: path.to_owned(),
                        offset: i,
                    })?;
                let inner = &path[i + 1..close];
                let index = parse_index(inner).ok_or_else(|| PathError::InvalidIndex {
                    path: path.to_owned(),
                    index: inner.to_owned(),
                })?;
                steps.push(PathKey::Index(index));
                expect_segment = false;
                i = close + 1;
            }
            b'.' => {
                if expect_segment {
                    return Err(PathError::EmptySegment {
                        path: path.to_owned(),
                        offset: i,
                    });
                }
                expect_segment = true;
                i += 1;
            }
            b']' => {
                return Err(PathError::Unexpected {
                    path: path.to_owned(),
                    offset: i,
                    found: ']',
                });
            }
            _ => {
                if !expect_segment {
                    let found = path[i..].chars().next().unwrap_or_default();
                    return Err(PathError::Unexpected {
                        path: path.to_owned(),
                        offset: i,
                        found,
                    });
                }
                let start = i;
                while i < bytes.len() && !matches!(bytes[i], b'.' | b'[' | b']') {
                    i += 1;
                }
                steps.push(PathKey::from(&path[start..i]));
                expect_segment = false;
            }
        }
    }

    if expect_segment && !path.is_empty() {
        return Err(PathError::EmptySegment {
            path: path.to_owned(),
            offset: path.len(),
        });
    }

    Ok(steps)
}

/// Whether `path` lies strictly below `ancestor`.
///
/// The empty path is the root, so every non-empty path descends from it.
pub fn is_descendant(ancestor: &str, path: &str) -> bool {
    if ancestor.is_empty() {
        return !path.is_empty();
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && matches!(path.as_bytes()[ancestor.len()], b'.' | b'[')
}
