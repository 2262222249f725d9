use super::*;
use crate::config::TargetConfig;
use crate::model::openconfig_model;
use crate::proto::gnmi::Subscription;
use crate::server::TargetService;
use std::time::Duration;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

fn new_store() -> Arc<ConfigStore> {
    Arc::new(
        ConfigStore::new(Arc::new(openconfig_model()), None, None, 100)
            .expect("store from empty config"),
    )
}

fn telemetry_list() -> SubscriptionList {
    SubscriptionList {
        prefix: None,
        subscription: vec![Subscription {
            path: Some(parse_xpath(TELEMETRY_PATH).expect("valid path")),
            mode: 0,
            sample_interval: 0,
            suppress_redundant: false,
            heartbeat_interval: 0,
        }],
        mode: 0,
        encoding: 0,
    }
}

#[tokio::test]
async fn test_datetime_heartbeat_writes_until_shutdown() {
    let store = new_store();
    let mut events = store.events().subscribe();
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let handle = spawn_datetime_heartbeat(store.clone(), shutdown_rx, Duration::from_millis(10));

    let event = timeout(RECV_TIMEOUT, events.recv())
        .await
        .expect("event within timeout")
        .expect("ring open");
    assert_eq!(
        crate::path::xpath(event.path.as_ref().expect("event path")),
        crate::constants::DATETIME_PATH
    );

    shutdown_tx.send(()).expect("signal shutdown");
    timeout(RECV_TIMEOUT, handle)
        .await
        .expect("heartbeat stops on shutdown")
        .expect("task joins cleanly");
}

#[tokio::test]
async fn test_random_telemetry_feeds_queue_and_cache() {
    let store = new_store();
    let service = TargetService::new(store.clone(), &TargetConfig::default());
    let (queue_tx, mut queue_rx) = mpsc::channel(100);
    let cancel = CancellationToken::new();

    spawn_random_telemetry(
        store.clone(),
        service.dispatcher.clone(),
        7,
        telemetry_list(),
        queue_tx,
        cancel.clone(),
        Duration::from_millis(10),
    );

    let item = timeout(RECV_TIMEOUT, queue_rx.recv())
        .await
        .expect("update within timeout")
        .expect("queue open");
    let QueueItem::Update(update) = item else {
        panic!("expected an update item, got {item:?}");
    };
    match update.val.as_ref().and_then(|v| v.value.as_ref()) {
        Some(typed_value::Value::StringVal(address)) => {
            let suffix = address
                .strip_prefix("192.168.1.")
                .unwrap_or_else(|| panic!("unexpected address {address}"));
            let octet: u16 = suffix.parse().expect("numeric last octet");
            assert!(octet <= 254);
        }
        other => panic!("expected a string value, got {other:?}"),
    }

    // The last value is cached and served by Get on the same path even
    // though the stored tree itself is empty.
    let req = crate::proto::gnmi::GetRequest {
        path: vec![parse_xpath(TELEMETRY_PATH).expect("valid path")],
        ..Default::default()
    };
    let resp = store.get(&req).expect("cached telemetry value");
    match resp.notification[0].update[0]
        .val
        .as_ref()
        .and_then(|v| v.value.as_ref())
    {
        Some(typed_value::Value::StringVal(address)) => {
            assert!(address.starts_with("192.168.1."), "got {address}");
        }
        other => panic!("expected a string value, got {other:?}"),
    }

    cancel.cancel();
}

#[tokio::test]
async fn test_random_telemetry_ignores_other_clients_events() {
    let store = new_store();
    let service = TargetService::new(store.clone(), &TargetConfig::default());
    let (queue_tx, mut queue_rx) = mpsc::channel(100);
    let cancel = CancellationToken::new();

    spawn_random_telemetry(
        store,
        service.dispatcher.clone(),
        7,
        telemetry_list(),
        queue_tx,
        cancel.clone(),
        Duration::from_millis(50),
    );

    // An event scoped to a different client never reaches this queue.
    service.dispatcher.dispatch(&Event {
        kind: EventKind::Random,
        subject: TELEMETRY_PATH.to_string(),
        time: SystemTime::now(),
        value: "10.0.0.1".to_string(),
        client: Some(99),
    });

    let item = timeout(RECV_TIMEOUT, queue_rx.recv())
        .await
        .expect("producer update within timeout")
        .expect("queue open");
    let QueueItem::Update(update) = item else {
        panic!("expected an update item, got {item:?}");
    };
    match update.val.as_ref().and_then(|v| v.value.as_ref()) {
        Some(typed_value::Value::StringVal(address)) => {
            assert!(address.starts_with("192.168.1."), "got {address}");
        }
        other => panic!("expected a string value, got {other:?}"),
    }

    cancel.cancel();
}
