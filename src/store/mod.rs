//! The configuration store.
//!
//! Holds the schema-validated device configuration behind a single
//! readers/writer lock and serves the data-plane side of every RPC:
//! capabilities metadata, Get, Set with callback rollback, the re-fetch
//! used by subscription collectors, and the datetime heartbeat write. All
//! lock-holding regions are bounded; nothing awaits under the lock.

mod datetime;
mod get;
mod set;

#[cfg(test)]
mod get_test;

use parking_lot::RwLock;
use serde_json::Map;
use serde_json::Value;
use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;
use tonic::Status;

use crate::constants::GNMI_SERVICE_VERSION;
use crate::errors::Error;
use crate::errors::Result;
use crate::events::ConfigUpdateBus;
use crate::model::Model;
use crate::model::ValidatedTree;
use crate::proto::gnmi::CapabilityResponse;
use crate::proto::gnmi::Encoding;
use crate::proto::gnmi::ModelData;
use crate::proto::gnmi::Update;

/// Signature of the function applying a validated config to the device
/// hardware. For a real device, push the configuration down in this
/// callback and return an error if the hardware rejects it.
pub type ConfigCallback = Arc<
    dyn Fn(&ValidatedTree) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>
        + Send
        + Sync,
>;

pub(crate) const SUPPORTED_ENCODINGS: [Encoding; 2] = [Encoding::Json, Encoding::JsonIetf];

struct StoreState {
    config: ValidatedTree,
    /// Last value emitted by the synthetic telemetry producer. `None`
    /// until the producer runs; Get falls through to the stored tree then.
    telemetry_cache: Option<Update>,
}

/// The device configuration store.
pub struct ConfigStore {
    model: Arc<Model>,
    callback: Option<ConfigCallback>,
    state: RwLock<StoreState>,
    events: ConfigUpdateBus,
}

impl ConfigStore {
    /// Creates a store from an optional IETF-JSON startup config. When a
    /// startup config and a callback are both present, the callback is
    /// applied once with the initial validated tree.
    pub fn new(
        model: Arc<Model>,
        startup_config: Option<&[u8]>,
        callback: Option<ConfigCallback>,
        event_capacity: usize,
    ) -> Result<Self> {
        let config = model.new_config(startup_config)?;
        if startup_config.is_some() {
            if let Some(callback) = &callback {
                callback(&config).map_err(|e| Error::Callback(e.to_string()))?;
            }
        }
        Ok(Self {
            model,
            callback,
            state: RwLock::new(StoreState {
                config,
                telemetry_cache: None,
            }),
            events: ConfigUpdateBus::new(event_capacity),
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The config-update ring; subscription consumers attach here.
    pub fn events(&self) -> &ConfigUpdateBus {
        &self.events
    }

    /// Supported models, encodings and protocol version.
    pub fn capabilities(&self) -> CapabilityResponse {
        CapabilityResponse {
            supported_models: self.model.model_data().to_vec(),
            supported_encodings: SUPPORTED_ENCODINGS.iter().map(|e| *e as i32).collect(),
            g_nmi_version: GNMI_SERVICE_VERSION.to_string(),
        }
    }

    /// Caches the most recent synthetic telemetry value; consulted by Get
    /// on the telemetry path.
    pub fn cache_telemetry_update(&self, update: Update) {
        self.state.write().telemetry_cache = Some(update);
    }

    /// Clones the current configuration as a working JSON tree.
    pub fn snapshot_json(&self) -> Map<String, Value> {
        self.state.read().config.to_json_tree()
    }

    /// Re-materializes a working tree into a validated structure; the
    /// store is left untouched on failure.
    fn revalidate(&self, json_tree: &Map<String, Value>) -> std::result::Result<ValidatedTree, Status> {
        let bytes = serde_json::to_vec(&Value::Object(json_tree.clone())).map_err(|e| {
            Status::internal(format!("error in marshaling IETF JSON tree to bytes: {e}"))
        })?;
        self.model
            .new_config(Some(&bytes))
            .map_err(|e| Status::invalid_argument(format!("config data validation fails: {e}")))
    }

    /// Two-phase apply: push the new config through the device callback;
    /// on failure re-apply the previous one. A failed rollback is
    /// unrecoverable.
    fn apply_callback(
        &self,
        new_config: &ValidatedTree,
        rollback: &ValidatedTree,
    ) -> std::result::Result<(), Status> {
        let Some(callback) = &self.callback else {
            return Ok(());
        };
        if let Err(apply_err) = callback(new_config) {
            if let Err(rollback_err) = callback(rollback) {
                return Err(Status::internal(format!(
                    "error in rollback the failed operation ({apply_err}): {rollback_err}"
                )));
            }
            return Err(Status::aborted(format!(
                "error in applying operation to device: {apply_err}"
            )));
        }
        Ok(())
    }
}

fn check_encoding_and_model(
    encoding: Encoding,
    models: &[ModelData],
    model: &Model,
) -> std::result::Result<(), Status> {
    if !SUPPORTED_ENCODINGS.contains(&encoding) {
        return Err(Status::unimplemented(format!(
            "unsupported encoding: {}",
            encoding.as_str_name()
        )));
    }
    for m in models {
        if !model.model_data().contains(m) {
            return Err(Status::unimplemented(format!(
                "unsupported model: {} {}",
                m.name, m.version
            )));
        }
    }
    Ok(())
}

pub(crate) fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or_default()
}
