use super::dispatcher::Event;
use super::Dispatcher;
use super::EventKind;
use std::time::SystemTime;
use tokio::sync::mpsc;

fn random_event(value: &str, client: Option<u64>) -> Event {
    Event {
        kind: EventKind::Random,
        subject: "/system".to_string(),
        time: SystemTime::now(),
        value: value.to_string(),
        client,
    }
}

#[tokio::test]
async fn test_register_event_is_idempotent_guarded() {
    let dispatcher = Dispatcher::new();
    assert!(dispatcher.register_event(EventKind::Random));
    assert!(!dispatcher.register_event(EventKind::Random));
}

#[tokio::test]
async fn test_register_listener_requires_registered_kind() {
    let dispatcher = Dispatcher::new();
    let (tx, _rx) = mpsc::channel(1);
    assert!(!dispatcher.register_listener(EventKind::Configuration, tx.clone()));
    dispatcher.register_event(EventKind::Configuration);
    assert!(dispatcher.register_listener(EventKind::Configuration, tx));
}

#[tokio::test]
async fn test_dispatch_clones_event_to_every_listener() {
    let dispatcher = Dispatcher::new();
    dispatcher.register_event(EventKind::Random);
    let (tx1, mut rx1) = mpsc::channel(4);
    let (tx2, mut rx2) = mpsc::channel(4);
    dispatcher.register_listener(EventKind::Random, tx1);
    dispatcher.register_listener(EventKind::Random, tx2);

    assert!(dispatcher.dispatch(&random_event("192.168.1.7", Some(1))));

    let first = rx1.recv().await.expect("listener one receives");
    let second = rx2.recv().await.expect("listener two receives");
    assert_eq!(first.value, "192.168.1.7");
    assert_eq!(second.value, "192.168.1.7");
    assert_eq!(first.client, Some(1));
}

#[tokio::test]
async fn test_dispatch_unregistered_kind_reports_false() {
    let dispatcher = Dispatcher::new();
    assert!(!dispatcher.dispatch(&random_event("x", None)));
}

#[tokio::test]
async fn test_dispatch_drops_when_listener_full() {
    let dispatcher = Dispatcher::new();
    dispatcher.register_event(EventKind::Random);
    let (tx, mut rx) = mpsc::channel(1);
    dispatcher.register_listener(EventKind::Random, tx);

    dispatcher.dispatch(&random_event("one", None));
    dispatcher.dispatch(&random_event("two", None));

    assert_eq!(rx.recv().await.expect("first kept").value, "one");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_dispatch_purges_closed_listeners() {
    let dispatcher = Dispatcher::new();
    dispatcher.register_event(EventKind::Random);
    let (closed_tx, closed_rx) = mpsc::channel(1);
    let (live_tx, mut live_rx) = mpsc::channel(4);
    dispatcher.register_listener(EventKind::Random, closed_tx);
    dispatcher.register_listener(EventKind::Random, live_tx);
    drop(closed_rx);

    dispatcher.dispatch(&random_event("one", None));
    dispatcher.dispatch(&random_event("two", None));

    assert_eq!(live_rx.recv().await.expect("delivered").value, "one");
    assert_eq!(live_rx.recv().await.expect("delivered").value, "two");
}
