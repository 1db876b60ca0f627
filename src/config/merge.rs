//! Layer overlay
//!
//! Tables merge key by key. Any other value in a later layer, arrays
//! included, replaces what the earlier layers held.

use serde_json::Value;

/// Apply `layer` on top of `base` in place.
pub fn overlay(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(table), Value::Object(entries)) => {
            for (key, value) in entries {
                overlay(table.entry(key).or_insert(Value::Null), value);
            }
        }
        (slot, value) => *slot = value,
    }
}
