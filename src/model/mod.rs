//! The schema provider backing the config store.
//!
//! Replaces YANG code generation with a declarative schema tree: the tree
//! drives validation of incoming IETF-JSON configs, child lookups during
//! path navigation, enum-name mapping, and the model metadata advertised by
//! Capabilities.

mod openconfig;
mod schema;

pub use openconfig::openconfig_model;
pub use openconfig::OPENCONFIG_INTERFACES_MODEL;
pub use openconfig::OPENCONFIG_OPENFLOW_MODEL;
pub use openconfig::OPENCONFIG_PLATFORM_MODEL;
pub use openconfig::OPENCONFIG_SYSTEM_MODEL;
pub use schema::LeafKind;
pub use schema::SchemaKind;
pub use schema::SchemaNode;
pub use schema::ValidatedTree;


use serde_json::Map;
use serde_json::Value;

use crate::errors::SchemaError;
use crate::proto::gnmi::ModelData;

/// A device model: schema tree plus the metadata of the modules it covers.
pub struct Model {
    model_data: Vec<ModelData>,
    root: SchemaNode,
}

impl Model {
    pub fn new(model_data: Vec<ModelData>, root: SchemaNode) -> Self {
        Self { model_data, root }
    }

    /// Metadata of the supported schema modules.
    pub fn model_data(&self) -> &[ModelData] {
        &self.model_data
    }

    /// Root of the schema tree (the device container).
    pub fn schema_root(&self) -> &SchemaNode {
        &self.root
    }

    /// Unmarshals IETF-JSON bytes into a validated configuration tree.
    ///
    /// Missing or empty input yields an empty tree. Module prefixes on map
    /// keys are stripped, every node is checked against the schema, and
    /// integral floats are normalized to integers so duck-typed list keys
    /// re-materialize canonically.
    pub fn new_config(&self, data: Option<&[u8]>) -> Result<ValidatedTree, SchemaError> {
        let root = match data {
            None => Map::new(),
            Some(bytes) if bytes.is_empty() => Map::new(),
            Some(bytes) => {
                let value: Value = serde_json::from_slice(bytes)?;
                let Value::Object(map) = value else {
                    return Err(SchemaError::TypeMismatch {
                        path: "/".to_string(),
                        expected: "container",
                    });
                };
                schema::validate_container(&self.root, &map, "")?
            }
        };
        Ok(ValidatedTree::new(root))
    }

    /// Validates a subtree value against the schema node it is destined
    /// for, returning the normalized value.
    pub fn validate_subtree(
        &self,
        schema: &SchemaNode,
        value: &Value,
        path: &str,
    ) -> Result<Value, SchemaError> {
        schema::validate_node(schema, value, path)
    }

    /// Validates the content of one keyed-list entry (the fields, not the
    /// surrounding array) against a list schema node.
    pub fn validate_list_entry(
        &self,
        schema: &SchemaNode,
        value: &Value,
        path: &str,
    ) -> Result<Value, SchemaError> {
        let Value::Object(map) = value else {
            return Err(SchemaError::TypeMismatch {
                path: path.to_string(),
                expected: "list entry object",
            });
        };
        Ok(Value::Object(schema::validate_container(schema, map, path)?))
    }

    /// Clones a bare-named tree with its top-level containers qualified by
    /// their module names, per RFC 7951. Deeper nodes stay unqualified
    /// (every demo model is a root-level module).
    pub fn to_ietf_json(&self, tree: &Map<String, Value>) -> Map<String, Value> {
        let mut out = Map::new();
        for (k, v) in tree {
            let key = match self.root.child(k).and_then(SchemaNode::module) {
                Some(module) => format!("{module}:{k}"),
                None => k.clone(),
            };
            out.insert(key, v.clone());
        }
        out
    }
}
