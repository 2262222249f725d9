//! Get-side of the config store: snapshot reads of leaves and subtrees.

use serde_json::Map;
use serde_json::Value;
use tonic::Status;

use super::check_encoding_and_model;
use super::now_ns;
use super::ConfigStore;
use crate::constants::TELEMETRY_PATH;
use crate::model::LeafKind;
use crate::model::SchemaNode;
use crate::path::full_path;
use crate::path::uses_legacy_elements;
use crate::path::xpath;
use crate::proto::gnmi::get_request::DataType;
use crate::proto::gnmi::typed_value;
use crate::proto::gnmi::Encoding;
use crate::proto::gnmi::GetRequest;
use crate::proto::gnmi::GetResponse;
use crate::proto::gnmi::Notification;
use crate::proto::gnmi::Path;
use crate::proto::gnmi::TypedValue;
use crate::proto::gnmi::Update;
use crate::tree::find_node;
use crate::tree::prune_by_type;

impl ConfigStore {
    /// Serves a GetRequest against the current configuration snapshot.
    /// Holds the read lock for the duration of the handler.
    pub fn get(&self, req: &GetRequest) -> Result<GetResponse, Status> {
        let data_type = req.r#type();
        check_encoding_and_model(req.encoding(), &req.use_models, &self.model)?;

        let prefix = req.prefix.as_ref();
        let state = self.state.read();

        // No paths requested: emit the whole tree pruned by type.
        if req.path.is_empty() {
            let update = self.subtree_update(
                &Path::default(),
                state.config.as_map(),
                true,
                req.encoding(),
                data_type,
            )?;
            return Ok(GetResponse {
                notification: vec![notification(req.prefix.clone(), update)],
            });
        }

        let mut notifications = Vec::with_capacity(req.path.len());
        for path in &req.path {
            let full = full_path(prefix, path);
            if uses_legacy_elements(&full) {
                return Err(Status::unimplemented(
                    "deprecated path element type is unsupported",
                ));
            }

            // A controller reading the synthetic-telemetry path gets the
            // last produced value; before the producer ever ran, the
            // stored tree answers instead.
            if xpath(&full) == TELEMETRY_PATH {
                if let Some(update) = state.telemetry_cache.clone() {
                    notifications.push(notification(req.prefix.clone(), update));
                    continue;
                }
            }

            if full.elem.is_empty() {
                if !req.use_models.is_empty() {
                    return Err(use_models_unimplemented(req));
                }
                let update = self.subtree_update(
                    path,
                    state.config.as_map(),
                    true,
                    req.encoding(),
                    data_type,
                )?;
                notifications.push(notification(req.prefix.clone(), update));
                continue;
            }

            let Some((node, schema)) =
                find_node(state.config.as_map(), self.model.schema_root(), &full.elem)
            else {
                return Err(Status::not_found(format!(
                    "path {} not found",
                    xpath(&full)
                )));
            };

            if schema.is_leaf() {
                if data_type != DataType::All {
                    let keyword = data_type_keyword(data_type);
                    if !full.elem.iter().any(|elem| elem.name == keyword) {
                        return Err(Status::internal("The requested dataType is not valid"));
                    }
                }
                let val = typed_value_for_leaf(node, schema, &full)?;
                let update = Update {
                    path: Some(path.clone()),
                    val: Some(val),
                    duplicates: 0,
                };
                notifications.push(notification(req.prefix.clone(), update));
                continue;
            }

            if !req.use_models.is_empty() {
                return Err(use_models_unimplemented(req));
            }
            let Some(map) = node.as_object() else {
                return Err(Status::not_found(format!(
                    "path {} not found",
                    xpath(&full)
                )));
            };
            let update = self.subtree_update(path, map, false, req.encoding(), data_type)?;
            notifications.push(notification(req.prefix.clone(), update));
        }

        Ok(GetResponse {
            notification: notifications,
        })
    }

    /// Re-fetches one subscription path from the current tree; used by the
    /// ONCE/POLL collector, the sample ticker and the on-change re-fetch.
    /// A miss reports `NotFound` so the caller can emit a delete
    /// notification.
    pub fn get_update(&self, prefix: Option<&Path>, path: &Path) -> Result<Update, Status> {
        let full = full_path(prefix, path);
        if uses_legacy_elements(&full) {
            return Err(Status::unimplemented(
                "deprecated path element type is unsupported",
            ));
        }

        let state = self.state.read();
        if full.elem.is_empty() {
            return Ok(Update {
                path: Some(path.clone()),
                val: Some(json_ietf_value(state.config.as_map())?),
                duplicates: 0,
            });
        }
        let Some((node, schema)) =
            find_node(state.config.as_map(), self.model.schema_root(), &full.elem)
        else {
            return Err(Status::not_found(format!(
                "path {} not found",
                xpath(&full)
            )));
        };
        let val = if schema.is_leaf() {
            typed_value_for_leaf(node, schema, &full)?
        } else {
            let Some(map) = node.as_object() else {
                return Err(Status::not_found(format!(
                    "path {} not found",
                    xpath(&full)
                )));
            };
            json_ietf_value(map)?
        };
        Ok(Update {
            path: Some(path.clone()),
            val: Some(val),
            duplicates: 0,
        })
    }

    fn subtree_update(
        &self,
        request_path: &Path,
        node: &Map<String, Value>,
        is_root: bool,
        encoding: Encoding,
        data_type: DataType,
    ) -> Result<Update, Status> {
        let mut map = node.clone();
        prune_by_type(&mut map, data_type_keyword(data_type));
        // IETF JSON qualifies names at module boundaries; internal JSON
        // stays bare.
        let map = if is_root && encoding != Encoding::Json {
            self.model.to_ietf_json(&map)
        } else {
            map
        };
        let bytes = serde_json::to_vec(&Value::Object(map)).map_err(|e| {
            Status::internal(format!("error in marshaling JSON tree to bytes: {e}"))
        })?;
        let value = if encoding == Encoding::Json {
            typed_value::Value::JsonVal(bytes)
        } else {
            typed_value::Value::JsonIetfVal(bytes)
        };
        Ok(Update {
            path: Some(request_path.clone()),
            val: Some(TypedValue { value: Some(value) }),
            duplicates: 0,
        })
    }
}

fn notification(prefix: Option<Path>, update: Update) -> Notification {
    Notification {
        timestamp: now_ns(),
        prefix,
        update: vec![update],
        delete: Vec::new(),
    }
}

fn use_models_unimplemented(req: &GetRequest) -> Status {
    Status::unimplemented(format!(
        "filtering Get using use_models is unsupported, got {} models",
        req.use_models.len()
    ))
}

fn data_type_keyword(data_type: DataType) -> &'static str {
    match data_type {
        DataType::All => "all",
        DataType::Config => "config",
        DataType::State => "state",
        DataType::Operational => "operational",
    }
}

fn json_ietf_value(map: &Map<String, Value>) -> Result<TypedValue, Status> {
    let bytes = serde_json::to_vec(&Value::Object(map.clone()))
        .map_err(|e| Status::internal(format!("error in marshaling JSON tree to bytes: {e}")))?;
    Ok(TypedValue {
        value: Some(typed_value::Value::JsonIetfVal(bytes)),
    })
}

/// Encodes a stored leaf as a TypedValue. Enum-typed leaves emit the
/// enumeration name as a string value.
pub(crate) fn typed_value_for_leaf(
    node: &Value,
    schema: &SchemaNode,
    full: &Path,
) -> Result<TypedValue, Status> {
    let unrepresentable = || {
        Status::internal(format!(
            "leaf node {} does not contain a scalar type value",
            xpath(full)
        ))
    };
    let Some(kind) = schema.leaf_kind() else {
        return Err(unrepresentable());
    };
    let value = match kind {
        LeafKind::Enumeration(names) => match node {
            Value::String(s) => typed_value::Value::StringVal(s.clone()),
            Value::Number(n) => {
                let name = n
                    .as_u64()
                    .and_then(|i| names.get(i as usize))
                    .ok_or_else(|| Status::internal("not a known enumeration value"))?;
                typed_value::Value::StringVal((*name).to_string())
            }
            _ => return Err(unrepresentable()),
        },
        LeafKind::String => match node.as_str() {
            Some(s) => typed_value::Value::StringVal(s.to_string()),
            None => return Err(unrepresentable()),
        },
        LeafKind::Bool => match node.as_bool() {
            Some(b) => typed_value::Value::BoolVal(b),
            None => return Err(unrepresentable()),
        },
        LeafKind::Int => match node.as_i64() {
            Some(i) => typed_value::Value::IntVal(i),
            None => return Err(unrepresentable()),
        },
        LeafKind::Uint => match node.as_u64() {
            Some(u) => typed_value::Value::UintVal(u),
            None => return Err(unrepresentable()),
        },
        LeafKind::Decimal => match node.as_f64() {
            Some(f) => typed_value::Value::FloatVal(f as f32),
            None => return Err(unrepresentable()),
        },
    };
    Ok(TypedValue { value: Some(value) })
}
