use std::time::Duration;

/// gNMI protocol version advertised by Capabilities.
pub const GNMI_SERVICE_VERSION: &str = "0.7.0";

// -
// Special paths

/// Leaf overwritten once per second by the datetime heartbeat.
pub(crate) const DATETIME_PATH: &str = "/system/state/current-datetime";

/// Path served by the synthetic random-telemetry producer.
pub(crate) const TELEMETRY_PATH: &str =
    "/system/openflow/controllers/controller[name=main]/connections/connection[aux-id=0]/state/address";

// -
// Resource limits

/// Per-client update queue capacity.
pub(crate) const CLIENT_QUEUE_CAPACITY: usize = 100;

/// Capacity of the config-update ring carrying events from writers to
/// stream consumers.
pub(crate) const CONFIG_EVENT_RING_CAPACITY: usize = 100;

/// Smallest sample interval a STREAM subscription may request, in
/// nanoseconds. Requests between zero and this floor are rejected; zero
/// selects the floor.
pub const MIN_SAMPLE_INTERVAL_NS: u64 = 5_000_000_000;

// -
// Background task cadence

pub(crate) const DATETIME_WRITE_INTERVAL: Duration = Duration::from_secs(1);
pub(crate) const RANDOM_EVENT_INTERVAL: Duration = Duration::from_secs(5);

/// Wall-clock layout written into `/system/state/current-datetime`,
/// e.g. `2023-04-01T09:30:00Z+02:00`.
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ%:z";
