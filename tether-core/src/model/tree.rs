//! Navigation over the backing JSON tree.
//!
//! These helpers never create intermediate containers: a step that lands on
//! a missing slot or on a scalar ends the walk.

use serde_json::Value;

use crate::path::PathKey;

/// Widest run of `null` padding a single array write may add.
pub(crate) const MAX_ARRAY_GAP: usize = 4096;

/// Follow one step for reading.
pub(crate) fn step<'a>(value: &'a Value, key: &PathKey) -> Option<&'a Value> {
    match (value, key) {
        (Value::Array(items), PathKey::Index(index)) => items.get(*index),
        (Value::Object(map), key) => map.get(&key.as_field()),
        _ => None,
    }
}

/// Follow one step for writing.
pub(crate) fn step_mut<'a>(value: &'a mut Value, key: &PathKey) -> Option<&'a mut Value> {
    match (value, key) {
        (Value::Array(items), PathKey::Index(index)) => items.get_mut(*index),
        (Value::Object(map), key) => map.get_mut(&key.as_field()),
        _ => None,
    }
}

/// Follow a sequence of steps for reading.
pub(crate) fn lookup<'a>(value: &'a Value, steps: &[PathKey]) -> Option<&'a Value> {
    steps.iter().try_fold(value, |current, key| step(current, key))
}

/// Follow a sequence of steps for writing.
pub(crate) fn lookup_mut<'a>(value: &'a mut Value, steps: &[PathKey]) -> Option<&'a mut Value> {
    steps.iter().try_fold(value, |current, key| step_mut(current, key))
}

/// Store `value` under `key` in `parent`.
///
/// Arrays written past their end are padded with `null`, up to
/// [`MAX_ARRAY_GAP`] slots. Returns `false` if `parent` cannot hold `key`: a
/// scalar, a named key on an array, or an index too far past the end.
pub(crate) fn assign(parent: &mut Value, key: &PathKey, value: Value) -> bool {
    match (parent, key) {
        (Value::Array(items), PathKey::Index(index)) => {
            if *index < items.len() {
                items[*index] = value;
            } else {
                if *index - items.len() > MAX_ARRAY_GAP {
                    return false;
                }
                items.resize(*index, Value::Null);
                items.push(value);
            }
            true
        }
        (Value::Object(map), key) => {
            map.insert(key.as_field(), value);
            true
        }
        _ => false,
    }
}

/// Remove `key` from `parent`, returning the removed value.
pub(crate) fn detach(parent: &mut Value, key: &PathKey) -> Option<Value> {
    match (parent, key) {
        (Value::Array(items), PathKey::Index(index)) if *index < items.len() => {
            Some(items.remove(*index))
        }
        (Value::Object(map), key) => map.shift_remove(&key.as_field()),
        _ => None,
    }
}

/// Whether a value is a container that reads hand out as views.
pub(crate) fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}
