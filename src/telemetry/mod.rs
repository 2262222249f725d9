//! Background writer tasks exercising the streaming path: the datetime
//! heartbeat and the synthetic random-telemetry producer.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use log::debug;
use log::info;
use log::warn;

use crate::constants::TELEMETRY_PATH;
use crate::events::Dispatcher;
use crate::events::Event;
use crate::events::EventKind;
use crate::path::parse_xpath;
use crate::proto::gnmi::typed_value;
use crate::proto::gnmi::SubscriptionList;
use crate::proto::gnmi::TypedValue;
use crate::proto::gnmi::Update;
use crate::server::QueueItem;
use crate::store::ConfigStore;

#[cfg(test)]
mod telemetry_test;

/// Runs the once-per-second datetime write until the shutdown signal
/// fires.
pub fn spawn_datetime_heartbeat(
    store: Arc<ConfigStore>,
    mut shutdown_signal: watch::Receiver<()>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = shutdown_signal.changed() => {
                    info!("datetime heartbeat stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = store.write_datetime() {
                        warn!("failed to write current-datetime: {e}");
                    }
                }
            }
        }
    })
}

/// Starts the synthetic telemetry producer for one stream client: every
/// interval, one fake address per subscription is cached in the store and
/// dispatched (kind `Random`) to the client's listener, which feeds the
/// client queue. Deliveries never block; overflow drops.
pub(crate) fn spawn_random_telemetry(
    store: Arc<ConfigStore>,
    dispatcher: Arc<Dispatcher>,
    client_id: u64,
    list: SubscriptionList,
    queue_tx: mpsc::Sender<QueueItem>,
    cancel: CancellationToken,
    interval: Duration,
) {
    let telemetry_path = match parse_xpath(TELEMETRY_PATH) {
        Ok(path) => path,
        Err(e) => {
            warn!("invalid telemetry path: {e}");
            return;
        }
    };

    // Listener side: dispatcher events scoped to this client become queue
    // updates.
    let (event_tx, mut event_rx) = mpsc::channel::<Event>(crate::constants::CLIENT_QUEUE_CAPACITY);
    dispatcher.register_listener(EventKind::Random, event_tx);
    let listener_path = telemetry_path.clone();
    let listener_cancel = cancel.clone();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = listener_cancel.cancelled() => break,
                event = event_rx.recv() => event,
            };
            match event {
                None => break,
                Some(event) if event.client == Some(client_id) => {
                    let update = Update {
                        path: Some(listener_path.clone()),
                        val: Some(TypedValue {
                            value: Some(typed_value::Value::StringVal(event.value)),
                        }),
                        duplicates: 0,
                    };
                    if queue_tx.try_send(QueueItem::Update(update)).is_err() {
                        debug!("dropping random telemetry update: queue full");
                    }
                }
                Some(_) => {} // another client's event
            }
        }
    });

    // Producer side.
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // the zeroth tick fires immediately
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    for _ in &list.subscription {
                        let address = random_address();
                        store.cache_telemetry_update(Update {
                            path: Some(telemetry_path.clone()),
                            val: Some(TypedValue {
                                value: Some(typed_value::Value::StringVal(address.clone())),
                            }),
                            duplicates: 0,
                        });
                        dispatcher.dispatch(&Event {
                            kind: EventKind::Random,
                            subject: TELEMETRY_PATH.to_string(),
                            time: SystemTime::now(),
                            value: address,
                            client: Some(client_id),
                        });
                    }
                }
            }
        }
    });
}

fn random_address() -> String {
    format!("192.168.1.{}", rand::thread_rng().gen_range(0..255))
}
