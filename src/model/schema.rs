use serde_json::Map;
use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::HashSet;

use crate::errors::SchemaError;
use crate::tree::value_text;

/// What a schema node describes.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    Container,
    /// A YANG list and the names of its key leaves.
    List { keys: &'static [&'static str] },
    Leaf(LeafKind),
}

/// The value space of a leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafKind {
    String,
    Int,
    Uint,
    Bool,
    Decimal,
    /// Named enumeration; the slice doubles as the name table, indexed by
    /// the enum's integer value.
    Enumeration(&'static [&'static str]),
}

/// One node of the schema tree.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    name: &'static str,
    module: Option<&'static str>,
    kind: SchemaKind,
    children: BTreeMap<&'static str, SchemaNode>,
}

impl SchemaNode {
    pub fn container(name: &'static str) -> Self {
        Self {
            name,
            module: None,
            kind: SchemaKind::Container,
            children: BTreeMap::new(),
        }
    }

    pub fn list(name: &'static str, keys: &'static [&'static str]) -> Self {
        Self {
            name,
            module: None,
            kind: SchemaKind::List { keys },
            children: BTreeMap::new(),
        }
    }

    pub fn leaf(name: &'static str, kind: LeafKind) -> Self {
        Self {
            name,
            module: None,
            kind: SchemaKind::Leaf(kind),
            children: BTreeMap::new(),
        }
    }

    /// Tags this node with the YANG module it belongs to; used when
    /// emitting module-qualified IETF JSON.
    pub fn with_module(mut self, module: &'static str) -> Self {
        self.module = Some(module);
        self
    }

    pub fn with_children(mut self, children: Vec<SchemaNode>) -> Self {
        for child in children {
            self.children.insert(child.name, child);
        }
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn module(&self) -> Option<&'static str> {
        self.module
    }

    pub fn kind(&self) -> &SchemaKind {
        &self.kind
    }

    pub fn child(&self, name: &str) -> Option<&SchemaNode> {
        self.children.get(name)
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, SchemaKind::Leaf(_))
    }

    pub fn leaf_kind(&self) -> Option<&LeafKind> {
        match &self.kind {
            SchemaKind::Leaf(kind) => Some(kind),
            _ => None,
        }
    }
}

/// A configuration tree that passed schema validation. The store treats
/// this as the source of truth and materializes working JSON trees from it
/// on demand.
#[derive(Debug, Clone)]
pub struct ValidatedTree {
    root: Map<String, Value>,
}

impl ValidatedTree {
    pub(crate) fn new(root: Map<String, Value>) -> Self {
        Self { root }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    /// Materializes a mutable working copy of the tree.
    pub fn to_json_tree(&self) -> Map<String, Value> {
        self.root.clone()
    }
}

/// Validates the children of a container (or the fields of a list entry),
/// stripping module prefixes from keys and normalizing values.
pub(super) fn validate_container(
    schema: &SchemaNode,
    map: &Map<String, Value>,
    path: &str,
) -> Result<Map<String, Value>, SchemaError> {
    let mut out = Map::new();
    for (key, value) in map {
        let bare = strip_module(key, schema);
        let Some(child) = schema.child(bare) else {
            return Err(SchemaError::UnknownNode {
                path: format!("{path}/{key}"),
            });
        };
        let child_path = format!("{path}/{bare}");
        out.insert(bare.to_string(), validate_node(child, value, &child_path)?);
    }
    Ok(out)
}

pub(super) fn validate_node(
    schema: &SchemaNode,
    value: &Value,
    path: &str,
) -> Result<Value, SchemaError> {
    match schema.kind() {
        SchemaKind::Container => {
            let Value::Object(map) = value else {
                return Err(SchemaError::TypeMismatch {
                    path: path.to_string(),
                    expected: "container",
                });
            };
            Ok(Value::Object(validate_container(schema, map, path)?))
        }
        SchemaKind::List { keys } => {
            let Value::Array(entries) = value else {
                return Err(SchemaError::TypeMismatch {
                    path: path.to_string(),
                    expected: "list",
                });
            };
            let mut out = Vec::with_capacity(entries.len());
            let mut seen = HashSet::new();
            for entry in entries {
                let Value::Object(map) = entry else {
                    return Err(SchemaError::TypeMismatch {
                        path: path.to_string(),
                        expected: "list entry object",
                    });
                };
                let normalized = validate_container(schema, map, path)?;
                let mut tuple = Vec::with_capacity(keys.len());
                for key in *keys {
                    let Some(key_value) = normalized.get(*key) else {
                        return Err(SchemaError::MissingListKey {
                            path: path.to_string(),
                            key,
                        });
                    };
                    tuple.push(value_text(key_value));
                }
                if !seen.insert(tuple) {
                    return Err(SchemaError::DuplicateListEntry {
                        path: path.to_string(),
                    });
                }
                out.push(Value::Object(normalized));
            }
            Ok(Value::Array(out))
        }
        SchemaKind::Leaf(kind) => validate_leaf(kind, value, path),
    }
}

fn validate_leaf(kind: &LeafKind, value: &Value, path: &str) -> Result<Value, SchemaError> {
    let mismatch = |expected| SchemaError::TypeMismatch {
        path: path.to_string(),
        expected,
    };
    match kind {
        LeafKind::String => value
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| mismatch("string")),
        LeafKind::Bool => value
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| mismatch("boolean")),
        LeafKind::Int => int_value(value)
            .map(Value::from)
            .ok_or_else(|| mismatch("integer")),
        LeafKind::Uint => uint_value(value)
            .map(Value::from)
            .ok_or_else(|| mismatch("unsigned integer")),
        LeafKind::Decimal => {
            if value.is_number() {
                Ok(value.clone())
            } else {
                Err(mismatch("decimal"))
            }
        }
        LeafKind::Enumeration(names) => match value {
            Value::String(s) if names.contains(&s.as_str()) => Ok(value.clone()),
            Value::Number(n) => n
                .as_u64()
                .and_then(|i| names.get(i as usize))
                .map(|name| Value::String((*name).to_string()))
                .ok_or_else(|| SchemaError::InvalidEnumValue {
                    path: path.to_string(),
                    value: value_text(value),
                }),
            _ => Err(SchemaError::InvalidEnumValue {
                path: path.to_string(),
                value: value_text(value),
            }),
        },
    }
}

/// Accepts i64/u64 numbers, integral floats (duck-typed list keys) and
/// numeric strings.
fn int_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn uint_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f < 9.0e15)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn strip_module<'a>(key: &'a str, schema: &SchemaNode) -> &'a str {
    match key.split_once(':') {
        Some((_, bare)) if schema.child(bare).is_some() => bare,
        _ => key,
    }
}
