//! Generic JSON config-tree navigation and mutation.
//!
//! The working representation of the device configuration during a Set is a
//! plain JSON mapping tree: maps are containers, arrays of maps are keyed
//! YANG lists. Everything here operates on that shape; schema awareness is
//! limited to gating child lookups on schema membership.

use serde_json::Map;
use serde_json::Number;
use serde_json::Value;
use std::collections::HashMap;
use tonic::Status;
use tracing::error;

use crate::model::SchemaNode;
use crate::proto::gnmi::update_result::Operation;
use crate::proto::gnmi::PathElem;


/// Map keys that carry a data-type classification; empty ones are removed
/// when pruning by type.
const DATA_TYPE_KEYS: [&str; 3] = ["config", "state", "operational"];

/// Renders a stored JSON scalar the way list-key matching compares it: an
/// integral float prints without a fractional part, so a key duck-stored as
/// f64 still matches its wire string.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if n.as_i64().is_none() && n.as_u64().is_none() {
                if let Some(f) = n.as_f64() {
                    if f.fract() == 0.0 && f.abs() < 9.0e15 {
                        return format!("{}", f as i64);
                    }
                }
            }
            n.to_string()
        }
        other => other.to_string(),
    }
}

/// JSON value for a list-key string: numeric-parseable values are stored as
/// f64 alongside their string form elsewhere in the tree.
fn key_leaf_value(value: &str) -> Value {
    match value.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(n) => Value::Number(n),
        None => Value::String(value.to_string()),
    }
}

fn new_list_entry(keys: &HashMap<String, String>) -> Map<String, Value> {
    let mut entry = Map::new();
    for (k, v) in keys {
        entry.insert(k.clone(), key_leaf_value(v));
    }
    entry
}

/// True when every key of `elem` is present in `entry` and textually equal.
/// A missing key leaf is reported as `None` so callers can stop searching.
fn entry_matches(entry: &Map<String, Value>, elem: &PathElem) -> Option<bool> {
    for (k, v) in &elem.key {
        let stored = entry.get(k)?;
        if value_text(stored) != *v {
            return Some(false);
        }
    }
    Some(true)
}

/// Finds the keyed list entry in `node` matching the name and keys of
/// `elem`. If no entry matches and `create` is set, an empty entry seeded
/// with the element keys is appended (the list itself is created when
/// necessary).
pub(crate) fn keyed_list_entry<'a>(
    node: &'a mut Map<String, Value>,
    elem: &PathElem,
    create: bool,
) -> Option<&'a mut Map<String, Value>> {
    if !node.contains_key(&elem.name) {
        if !create {
            return None;
        }
        node.insert(
            elem.name.clone(),
            Value::Array(vec![Value::Object(new_list_entry(&elem.key))]),
        );
        return node
            .get_mut(&elem.name)?
            .as_array_mut()?
            .last_mut()?
            .as_object_mut();
    }

    let list = match node.get_mut(&elem.name)? {
        Value::Array(list) => list,
        _ => return None,
    };
    let mut matched = None;
    for (i, item) in list.iter().enumerate() {
        let Some(entry) = item.as_object() else {
            error!("wrong keyed list entry type: {item:?}");
            return None;
        };
        match entry_matches(entry, elem) {
            None => return None,
            Some(true) => {
                matched = Some(i);
                break;
            }
            Some(false) => {}
        }
    }
    match matched {
        Some(i) => list[i].as_object_mut(),
        None if create => {
            list.push(Value::Object(new_list_entry(&elem.key)));
            list.last_mut()?.as_object_mut()
        }
        None => None,
    }
}

/// Deletes the keyed list entry matching `elem`. A sole entry removes the
/// entire list from the parent, so the container disappears; otherwise the
/// last entry is swapped into the matched slot. Returns whether an entry
/// was deleted.
pub(crate) fn delete_keyed_list_entry(node: &mut Map<String, Value>, elem: &PathElem) -> bool {
    let list = match node.get_mut(&elem.name) {
        Some(Value::Array(list)) => list,
        _ => return false,
    };
    let mut matched = None;
    for (i, item) in list.iter().enumerate() {
        let Some(entry) = item.as_object() else {
            error!("wrong keyed list entry type: {item:?}");
            return false;
        };
        match entry_matches(entry, elem) {
            None => return false,
            Some(true) => {
                matched = Some(i);
                break;
            }
            Some(false) => {}
        }
    }
    let Some(i) = matched else {
        return false;
    };
    if list.len() == 1 {
        node.remove(&elem.name);
    } else {
        list.swap_remove(i);
    }
    true
}

/// Descends one level during mutation: the schema must know the child, a
/// missing keyless child is created as an empty map when `create` is set,
/// and keyed elements go through keyed-list matching. Returns `None` when
/// the schema has no such child or the child is not a container shape.
pub(crate) fn child_container<'a>(
    node: &'a mut Map<String, Value>,
    schema: &'a SchemaNode,
    elem: &PathElem,
    create: bool,
) -> Option<(&'a mut Map<String, Value>, &'a SchemaNode)> {
    let next_schema = schema.child(&elem.name)?;
    if elem.key.is_empty() {
        if !node.contains_key(&elem.name) {
            if !create {
                return None;
            }
            node.insert(elem.name.clone(), Value::Object(Map::new()));
        }
        return node
            .get_mut(&elem.name)?
            .as_object_mut()
            .map(|m| (m, next_schema));
    }
    keyed_list_entry(node, elem, create).map(|m| (m, next_schema))
}

/// Read-only lookup of the node addressed by `elems`, returning the value
/// and its schema node. Keyed elements resolve through textual key
/// matching; any miss returns `None`.
pub(crate) fn find_node<'a>(
    root: &'a Map<String, Value>,
    schema: &'a SchemaNode,
    elems: &[PathElem],
) -> Option<(&'a Value, &'a SchemaNode)> {
    let mut node = root;
    let mut node_schema = schema;
    for (i, elem) in elems.iter().enumerate() {
        let next_schema = node_schema.child(&elem.name)?;
        let value = if elem.key.is_empty() {
            node.get(&elem.name)?
        } else {
            find_keyed_entry(node.get(&elem.name)?.as_array()?, elem)?
        };
        if i + 1 == elems.len() {
            return Some((value, next_schema));
        }
        node = value.as_object()?;
        node_schema = next_schema;
    }
    None
}

fn find_keyed_entry<'a>(list: &'a [Value], elem: &PathElem) -> Option<&'a Value> {
    for item in list {
        let entry = item.as_object()?;
        match entry_matches(entry, elem) {
            None => return None,
            Some(true) => return Some(item),
            Some(false) => {}
        }
    }
    None
}

/// Replaces or updates the child of `node` indexed by a keyed path element.
/// REPLACE clears the matched entry before writing; UPDATE merges. An
/// incoming field whose name equals a key but whose value differs from the
/// path-supplied key value is invalid config data.
pub(crate) fn set_path_with_attribute(
    op: Operation,
    node: &mut Map<String, Value>,
    elem: &PathElem,
    value: Value,
) -> Result<(), Status> {
    let Value::Object(value_map) = value else {
        return Err(Status::invalid_argument(format!(
            "expect a JSON map for a keyed list entry, received {}",
            json_type_name(&value)
        )));
    };
    let Some(entry) = keyed_list_entry(node, elem, true) else {
        return Err(Status::not_found(format!(
            "path elem not found: {}",
            elem.name
        )));
    };
    if op == Operation::Replace {
        entry.clear();
    }
    for (k, v) in &elem.key {
        entry.insert(k.clone(), key_leaf_value(v));
        if let Some(field) = value_map.get(k) {
            if value_text(field) != *v {
                return Err(Status::invalid_argument(format!(
                    "invalid config data: {k} is a path attribute"
                )));
            }
        }
    }
    for (k, v) in value_map {
        entry.insert(k, v);
    }
    Ok(())
}

/// Replaces or updates the child of `node` indexed by a keyless path
/// element. REPLACE, a missing child, or a scalar value assigns outright;
/// UPDATE of a map onto a map merges one level deep.
pub(crate) fn set_path_without_attribute(
    op: Operation,
    node: &mut Map<String, Value>,
    elem: &PathElem,
    value: Value,
) -> Result<(), Status> {
    if op == Operation::Replace || !node.contains_key(&elem.name) || !value.is_object() {
        node.insert(elem.name.clone(), value);
        return Ok(());
    }
    let target = match node.get_mut(&elem.name) {
        Some(Value::Object(target)) => target,
        Some(other) => {
            return Err(Status::internal(format!(
                "error in setting path: expect a map to update, got {}",
                json_type_name(other)
            )));
        }
        None => return Ok(()),
    };
    if let Value::Object(value_map) = value {
        for (k, v) in value_map {
            target.insert(k, v);
        }
    }
    Ok(())
}

/// Prunes a JSON tree by requested data type. A key containing the type
/// keyword keeps its whole subtree; a key naming a different data class is
/// dropped; everything else is recursed into, and branches that become
/// empty are removed. `"all"` retains everything.
pub(crate) fn prune_by_type(node: &mut Map<String, Value>, data_type: &str) {
    if data_type == "all" {
        return;
    }
    let keys: Vec<String> = node.keys().cloned().collect();
    for key in keys {
        if key.contains(data_type) {
            continue;
        }
        if DATA_TYPE_KEYS.contains(&key.as_str()) {
            node.remove(&key);
            continue;
        }
        let empty = match node.get_mut(&key) {
            Some(Value::Object(child)) => {
                prune_by_type(child, data_type);
                child.is_empty()
            }
            Some(Value::Array(entries)) => {
                for item in entries.iter_mut() {
                    if let Value::Object(entry) = item {
                        prune_by_type(entry, data_type);
                    }
                }
                entries.retain(|item| !matches!(item, Value::Object(m) if m.is_empty()));
                entries.is_empty()
            }
            _ => false,
        };
        if empty {
            node.remove(&key);
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
