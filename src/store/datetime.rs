//! The once-per-second wall-clock write into the configuration tree.

use chrono::Local;
use tonic::Status;

use super::ConfigStore;
use crate::constants::DATETIME_FORMAT;
use crate::constants::DATETIME_PATH;
use crate::path::parse_xpath;
use crate::proto::gnmi::typed_value;
use crate::proto::gnmi::update_result::Operation;
use crate::proto::gnmi::TypedValue;
use crate::proto::gnmi::Update;

impl ConfigStore {
    /// Overwrites `/system/state/current-datetime` with the current
    /// wall-clock time under the exclusive lock, re-validates, swaps the
    /// store and publishes one update on the config-update ring.
    pub fn write_datetime(&self) -> Result<Update, Status> {
        let path = parse_xpath(DATETIME_PATH)
            .map_err(|e| Status::internal(format!("invalid datetime path: {e}")))?;
        let val = TypedValue {
            value: Some(typed_value::Value::StringVal(
                Local::now().format(DATETIME_FORMAT).to_string(),
            )),
        };

        {
            let mut guard = self.state.write();
            let state = &mut *guard;
            let mut json_tree = state.config.to_json_tree();
            let mut pending = None;
            self.do_replace_or_update(
                &mut json_tree,
                Operation::Update,
                None,
                &path,
                Some(&val),
                &state.config,
                &mut pending,
            )?;
            if let Some(config) = pending {
                state.config = config;
            }
        }

        let update = Update {
            path: Some(path),
            val: Some(val),
            duplicates: 0,
        };
        self.events.publish(update.clone());
        Ok(update)
    }
}
