//! Override merging of compose documents
//!
//! Later files override earlier ones field by field:
//! - scalars and plain lists (`command`, `entrypoint`, ...) are replaced
//! - `ports`, `expose` and `volumes` are concatenated, a later entry replacing
//!   an earlier one with the same key (container port + protocol, or target)
//! - `environment`, `labels`, `deploy` and other mappings merge per key;
//!   list-form `environment`/`labels` are turned into mappings first
//! - `depends_on`, `cap_add` and `cap_drop` are unioned
//!
//! Merging happens on the raw documents, before normalization.

use serde_yaml::{Mapping, Value};

use crate::ports::{port_key, volume_key};

/// Fields merged as keyed lists
const KEYED_LISTS: &[&str] = &["ports", "expose", "volumes"];

/// Fields merged as `KEY=VALUE` lists or mappings
const KEY_VALUE_FIELDS: &[&str] = &["environment", "labels"];

/// Fields merged as sets
const UNION_LISTS: &[&str] = &["depends_on", "cap_add", "cap_drop"];

/// Merge `overlay` into `base`, both full compose documents
pub fn merge_documents(base: &mut Mapping, overlay: &Mapping) {
    for (key, value) in overlay {
        let is_services = key.as_str() == Some("services");
        match (base.get_mut(key), value) {
            (Some(Value::Mapping(base_map)), Value::Mapping(overlay_map)) => {
                if is_services {
                    merge_services(base_map, overlay_map);
                } else {
                    deep_merge(base_map, overlay_map);
                }
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

fn merge_services(base: &mut Mapping, overlay: &Mapping) {
    for (name, service) in overlay {
        match (base.get_mut(name), service) {
            (Some(Value::Mapping(base_service)), Value::Mapping(overlay_service)) => {
                merge_service(base_service, overlay_service);
            }
            _ => {
                base.insert(name.clone(), service.clone());
            }
        }
    }
}

/// Merge one service definition into another
pub fn merge_service(base: &mut Mapping, overlay: &Mapping) {
    for (key, value) in overlay {
        let field = key.as_str().unwrap_or_default();
        let Some(existing) = base.get_mut(key) else {
            base.insert(key.clone(), value.clone());
            continue;
        };

        if KEYED_LISTS.contains(&field) {
            merge_keyed_list(field, existing, value);
        } else if KEY_VALUE_FIELDS.contains(&field) {
            let mut merged = to_key_value_mapping(existing);
            for (k, v) in to_key_value_mapping(value) {
                merged.insert(k, v);
            }
            *existing = Value::Mapping(merged);
        } else if UNION_LISTS.contains(&field) {
            merge_union(existing, value);
        } else {
            match (existing, value) {
                (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
                    deep_merge(base_map, overlay_map)
                }
                (existing, value) => *existing = value.clone(),
            }
        }
    }
}

fn deep_merge(base: &mut Mapping, overlay: &Mapping) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Mapping(base_map)), Value::Mapping(overlay_map)) => {
                deep_merge(base_map, overlay_map)
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

fn merge_keyed_list(field: &str, existing: &mut Value, overlay: &Value) {
    let (Value::Sequence(base_items), Value::Sequence(overlay_items)) = (&mut *existing, overlay)
    else {
        *existing = overlay.clone();
        return;
    };

    for item in overlay_items {
        let key = entry_key(field, item);
        let position = key
            .as_ref()
            .and_then(|k| base_items.iter().position(|b| entry_key(field, b).as_ref() == Some(k)));
        match position {
            Some(index) => base_items[index] = item.clone(),
            None => base_items.push(item.clone()),
        }
    }
}

/// Identity of a list entry for override purposes
fn entry_key(field: &str, item: &Value) -> Option<String> {
    match (field, item) {
        ("volumes", Value::String(spec)) => volume_key(spec),
        ("volumes", Value::Mapping(map)) => map
            .get("target")
            .and_then(Value::as_str)
            .map(str::to_string),
        (_, Value::Mapping(map)) => {
            let target = map.get("target").and_then(scalar_to_string)?;
            let protocol = map
                .get("protocol")
                .and_then(Value::as_str)
                .unwrap_or("tcp")
                .to_ascii_lowercase();
            Some(format!("{}/{}", target, protocol))
        }
        (_, value) => {
            let spec = scalar_to_string(value)?;
            port_key(&spec).map(|(port, proto)| format!("{}/{}", port, proto))
        }
    }
}

fn merge_union(existing: &mut Value, overlay: &Value) {
    match (&mut *existing, overlay) {
        (Value::Sequence(base_items), Value::Sequence(overlay_items)) => {
            for item in overlay_items {
                if !base_items.contains(item) {
                    base_items.push(item.clone());
                }
            }
        }
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => deep_merge(base_map, overlay_map),
        (existing, overlay) => *existing = overlay.clone(),
    }
}

/// Convert `KEY=VALUE` lists and mappings to one mapping shape
///
/// Bare `KEY` entries map to null, like a mapping entry without a value.
pub fn to_key_value_mapping(value: &Value) -> Mapping {
    match value {
        Value::Mapping(map) => map.clone(),
        Value::Sequence(items) => items
            .iter()
            .filter_map(scalar_to_string)
            .map(|entry| match entry.split_once('=') {
                Some((k, v)) => (Value::String(k.to_string()), Value::String(v.to_string())),
                None => (Value::String(entry), Value::Null),
            })
            .collect(),
        _ => Mapping::new(),
    }
}

/// Render a scalar YAML value as a string
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
