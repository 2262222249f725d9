//! Set-side of the config store: ordered delete/replace/update application
//! with schema re-validation and callback rollback.

use serde_json::Map;
use serde_json::Value;
use tonic::Status;

use super::now_ns;
use super::ConfigStore;
use crate::model::SchemaKind;
use crate::model::SchemaNode;
use crate::model::ValidatedTree;
use crate::path::full_path;
use crate::path::uses_legacy_elements;
use crate::path::xpath;
use crate::proto::gnmi::typed_value;
use crate::proto::gnmi::update_result::Operation;
use crate::proto::gnmi::Path;
use crate::proto::gnmi::SetRequest;
use crate::proto::gnmi::SetResponse;
use crate::proto::gnmi::TypedValue;
use crate::proto::gnmi::Update;
use crate::proto::gnmi::UpdateResult;
use crate::tree::child_container;
use crate::tree::delete_keyed_list_entry;
use crate::tree::set_path_with_attribute;
use crate::tree::set_path_without_attribute;

impl ConfigStore {
    /// Applies a SetRequest under the exclusive lock: all deletes, then
    /// all replaces, then all updates, in request order. Every structural
    /// change re-validates the tree and runs the two-phase device
    /// callback; any failure aborts the whole Set and leaves the store
    /// unchanged. On success the validated tree is swapped in atomically
    /// and one config-update event per operation is published.
    pub fn set(&self, req: &SetRequest) -> Result<SetResponse, Status> {
        let mut results = Vec::new();
        let mut events: Vec<Update> = Vec::new();
        let prefix = req.prefix.as_ref();

        {
            let mut guard = self.state.write();
            let state = &mut *guard;
            let mut json_tree = state.config.to_json_tree();
            let mut pending: Option<ValidatedTree> = None;

            for path in &req.delete {
                results.push(self.do_delete(
                    &mut json_tree,
                    prefix,
                    path,
                    &state.config,
                    &mut pending,
                )?);
                events.push(Update {
                    path: Some(full_path(prefix, path)),
                    val: None,
                    duplicates: 0,
                });
            }
            for replace in &req.replace {
                let path = replace
                    .path
                    .as_ref()
                    .ok_or_else(|| Status::invalid_argument("replace operation without a path"))?;
                results.push(self.do_replace_or_update(
                    &mut json_tree,
                    Operation::Replace,
                    prefix,
                    path,
                    replace.val.as_ref(),
                    &state.config,
                    &mut pending,
                )?);
                events.push(Update {
                    path: Some(full_path(prefix, path)),
                    val: replace.val.clone(),
                    duplicates: 0,
                });
            }
            for update in &req.update {
                let path = update
                    .path
                    .as_ref()
                    .ok_or_else(|| Status::invalid_argument("update operation without a path"))?;
                results.push(self.do_replace_or_update(
                    &mut json_tree,
                    Operation::Update,
                    prefix,
                    path,
                    update.val.as_ref(),
                    &state.config,
                    &mut pending,
                )?);
                events.push(Update {
                    path: Some(full_path(prefix, path)),
                    val: update.val.clone(),
                    duplicates: 0,
                });
            }

            state.config = match pending {
                Some(config) => config,
                None => self.revalidate(&json_tree)?,
            };
        }

        for event in events {
            self.events.publish(event);
        }
        Ok(SetResponse {
            prefix: req.prefix.clone(),
            response: results,
            timestamp: now_ns(),
        })
    }

    /// Deletes the path from the working tree. A root path clears every
    /// top-level key. Deleting something that is not there is not an
    /// error; the operation simply reports without a structural change.
    fn do_delete(
        &self,
        json_tree: &mut Map<String, Value>,
        prefix: Option<&Path>,
        path: &Path,
        rollback: &ValidatedTree,
        pending: &mut Option<ValidatedTree>,
    ) -> Result<UpdateResult, Status> {
        let full = full_path(prefix, path);
        if uses_legacy_elements(&full) {
            return Err(Status::unimplemented(
                "deprecated path element type is unsupported",
            ));
        }

        let mut path_deleted = false;
        if full.elem.is_empty() {
            path_deleted = !json_tree.is_empty();
            json_tree.clear();
        } else if let Some((parent, last_elem)) = self.parent_of(json_tree, &full, false) {
            if last_elem.key.is_empty() {
                parent.remove(&last_elem.name);
                path_deleted = true;
            } else {
                path_deleted = delete_keyed_list_entry(parent, last_elem);
            }
        }

        if path_deleted {
            let candidate = self.revalidate(json_tree)?;
            self.apply_callback(&candidate, rollback)?;
            *pending = Some(candidate);
        }
        Ok(UpdateResult {
            path: Some(path.clone()),
            op: Operation::Delete as i32,
        })
    }

    /// Validates and writes one replace or update operation into the
    /// working tree, then re-validates and applies the device callback.
    pub(crate) fn do_replace_or_update(
        &self,
        json_tree: &mut Map<String, Value>,
        op: Operation,
        prefix: Option<&Path>,
        path: &Path,
        val: Option<&TypedValue>,
        rollback: &ValidatedTree,
        pending: &mut Option<ValidatedTree>,
    ) -> Result<UpdateResult, Status> {
        let full = full_path(prefix, path);
        if uses_legacy_elements(&full) {
            return Err(Status::unimplemented(
                "deprecated path element type is unsupported",
            ));
        }
        let Some(val) = val else {
            return Err(Status::invalid_argument(format!(
                "operation on {} carries no value",
                xpath(&full)
            )));
        };

        // Build the node value the way the schema describes the target:
        // scalars for leaves, validated JSON documents for everything else.
        let Some(target_schema) = schema_at(self.model.schema_root(), &full) else {
            return Err(Status::not_found(format!(
                "path {} is not found in the config structure",
                xpath(&full)
            )));
        };
        let node_val = self.node_value(target_schema, &full, val)?;

        if full.elem.is_empty() {
            // Replace/Update root.
            if op == Operation::Update {
                return Err(Status::unimplemented(
                    "update the root of config tree is unsupported",
                ));
            }
            let Value::Object(tree) = node_val else {
                return Err(Status::invalid_argument(
                    "expect a tree to replace the root, got a scalar value",
                ));
            };
            json_tree.clear();
            for (k, v) in tree {
                json_tree.insert(k, v);
            }
        } else {
            let Some((parent, last_elem)) = self.parent_of(json_tree, &full, true) else {
                return Err(Status::not_found(format!(
                    "path elem not found: {}",
                    xpath(&full)
                )));
            };
            if last_elem.key.is_empty() {
                set_path_without_attribute(op, parent, last_elem, node_val)?;
            } else {
                set_path_with_attribute(op, parent, last_elem, node_val)?;
            }
        }

        let candidate = self.revalidate(json_tree)?;
        self.apply_callback(&candidate, rollback)?;
        *pending = Some(candidate);
        Ok(UpdateResult {
            path: Some(path.clone()),
            op: op as i32,
        })
    }

    /// Walks the working tree to the parent of the last path element,
    /// creating intermediate containers when asked to. Returns the parent
    /// map and the final element.
    fn parent_of<'a>(
        &'a self,
        json_tree: &'a mut Map<String, Value>,
        full: &'a Path,
        create: bool,
    ) -> Option<(&'a mut Map<String, Value>, &'a crate::proto::gnmi::PathElem)> {
        let (last_elem, parents) = full.elem.split_last()?;
        let mut node = json_tree;
        let mut schema = self.model.schema_root();
        for elem in parents {
            let (next, next_schema) = child_container(node, schema, elem, create)?;
            node = next;
            schema = next_schema;
        }
        Some((node, last_elem))
    }

    /// Materializes the incoming TypedValue for the schema node it is
    /// destined for.
    fn node_value(
        &self,
        schema: &SchemaNode,
        full: &Path,
        val: &TypedValue,
    ) -> Result<Value, Status> {
        if schema.is_leaf() {
            return typed_value_to_scalar(val);
        }

        let bytes = match &val.value {
            Some(typed_value::Value::JsonIetfVal(bytes)) => bytes,
            Some(typed_value::Value::JsonVal(bytes)) => bytes,
            _ => {
                return Err(Status::invalid_argument(format!(
                    "expect a JSON-IETF value for non-leaf path {}",
                    xpath(full)
                )));
            }
        };
        let parsed: Value = serde_json::from_slice(bytes).map_err(|e| {
            Status::invalid_argument(format!(
                "unmarshaling json data to config struct fails: {e}"
            ))
        })?;

        let addressed_entry = matches!(schema.kind(), SchemaKind::List { .. })
            && full.elem.last().is_some_and(|elem| !elem.key.is_empty());
        let validated = if addressed_entry {
            self.model
                .validate_list_entry(schema, &parsed, &xpath(full))
        } else {
            self.model.validate_subtree(schema, &parsed, &xpath(full))
        };
        validated.map_err(|e| Status::invalid_argument(format!("config data validation fails: {e}")))
    }
}

/// Walks the schema only; `None` when any element is unknown.
fn schema_at<'a>(root: &'a SchemaNode, full: &Path) -> Option<&'a SchemaNode> {
    let mut schema = root;
    for elem in &full.elem {
        schema = schema.child(&elem.name)?;
    }
    Some(schema)
}

/// Converts a scalar TypedValue into its JSON representation for the
/// working tree. JSON-encoded scalars are accepted for leaves as well.
fn typed_value_to_scalar(val: &TypedValue) -> Result<Value, Status> {
    match &val.value {
        Some(typed_value::Value::StringVal(s)) => Ok(Value::String(s.clone())),
        Some(typed_value::Value::AsciiVal(s)) => Ok(Value::String(s.clone())),
        Some(typed_value::Value::IntVal(i)) => Ok(Value::from(*i)),
        Some(typed_value::Value::UintVal(u)) => Ok(Value::from(*u)),
        Some(typed_value::Value::BoolVal(b)) => Ok(Value::Bool(*b)),
        Some(typed_value::Value::FloatVal(f)) => serde_json::Number::from_f64(f64::from(*f))
            .map(Value::Number)
            .ok_or_else(|| Status::internal("cannot convert leaf node to scalar type")),
        Some(typed_value::Value::JsonIetfVal(bytes)) | Some(typed_value::Value::JsonVal(bytes)) => {
            let parsed: Value = serde_json::from_slice(bytes).map_err(|e| {
                Status::invalid_argument(format!("unmarshaling json leaf value fails: {e}"))
            })?;
            if parsed.is_object() || parsed.is_array() {
                return Err(Status::invalid_argument(
                    "expect a scalar value for a leaf node",
                ));
            }
            Ok(parsed)
        }
        Some(typed_value::Value::BytesVal(_)) | None => {
            Err(Status::internal("cannot convert leaf node to scalar type"))
        }
    }
}
