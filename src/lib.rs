//! # gnmi-target
//!
//! A gNMI target simulator: an OpenConfig-modeled device with in-memory
//! configuration and streaming telemetry.
//!
//! ## Features
//! - **Full gNMI surface**: Capabilities, Get, Set and Subscribe (ONCE,
//!   POLL and STREAM modes)
//! - **Schema-validated store**: typed path-addressed reads, writes and
//!   deletes with rollback on callback failure
//! - **Streaming engine**: on-change fan-out, sampled collection and
//!   synthetic telemetry with bounded back-pressure
//! - **Runtime Agnostic**: built for `tokio`
//!
//! ## Quick Start
//! ```no_run
//! use gnmi_target::config::TargetConfig;
//! use gnmi_target::model::openconfig_model;
//! use gnmi_target::{start_rpc_server, ConfigStore, TargetService};
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> gnmi_target::Result<()> {
//!     let settings = TargetConfig::new()?;
//!     let store = Arc::new(ConfigStore::new(
//!         Arc::new(openconfig_model()),
//!         None,
//!         None,
//!         settings.limits.config_event_ring_capacity,
//!     )?);
//!     let (_graceful_tx, graceful_rx) = watch::channel(());
//!     let service = TargetService::new(store, &settings);
//!     start_rpc_server(service, settings.server.listen_address()?, graceful_rx).await
//! }
//! ```

pub mod config;
pub mod model;
pub mod proto;

mod constants;
mod errors;
mod events;
mod path;
mod server;
mod store;
mod telemetry;
mod tree;

pub use constants::GNMI_SERVICE_VERSION;
pub use constants::MIN_SAMPLE_INTERVAL_NS;
pub use errors::*;
pub use events::Dispatcher;
pub use events::Event;
pub use events::EventKind;
pub use path::parse_xpath;
pub use path::xpath;
pub use server::start_rpc_server;
pub use server::Authorizer;
pub use server::TargetService;
pub use store::ConfigCallback;
pub use store::ConfigStore;
pub use telemetry::spawn_datetime_heartbeat;
