use super::*;
use crate::model::openconfig_model;
use crate::path::parse_xpath;
use crate::proto::gnmi::subscribe_request;
use crate::proto::gnmi::subscribe_response;
use crate::proto::gnmi::subscription_list::Mode;
use crate::proto::gnmi::typed_value;
use crate::proto::gnmi::Poll;
use crate::proto::gnmi::SubscriptionList;
use crate::proto::gnmi::SubscriptionMode;
use crate::proto::gnmi::TypedValue;
use crate::proto::gnmi::Update;
use std::time::Duration;
use tokio::time::timeout;
use tonic::Code;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

fn new_service() -> TargetService {
    let store = Arc::new(
        ConfigStore::new(Arc::new(openconfig_model()), None, None, 100)
            .expect("store from empty config"),
    );
    TargetService::new(store, &TargetConfig::default())
}

type RequestSender = mpsc::Sender<std::result::Result<SubscribeRequest, Status>>;
type ResponseReceiver = mpsc::Receiver<std::result::Result<SubscribeResponse, Status>>;

fn start_stream(service: &TargetService) -> (RequestSender, ResponseReceiver) {
    let (req_tx, req_rx) = mpsc::channel(8);
    let (resp_tx, resp_rx) = mpsc::channel(100);
    service.spawn_stream_driver(ReceiverStream::new(req_rx), resp_tx);
    (req_tx, resp_rx)
}

fn subscription_list(
    mode: Mode,
    subscriptions: &[(&str, SubscriptionMode, u64)],
) -> SubscribeRequest {
    SubscribeRequest {
        request: Some(subscribe_request::Request::Subscribe(SubscriptionList {
            prefix: None,
            subscription: subscriptions
                .iter()
                .map(|(path, sub_mode, interval)| crate::proto::gnmi::Subscription {
                    path: Some(parse_xpath(path).expect("valid path")),
                    mode: *sub_mode as i32,
                    sample_interval: *interval,
                    suppress_redundant: false,
                    heartbeat_interval: 0,
                })
                .collect(),
            mode: mode as i32,
            encoding: 0,
        })),
    }
}

fn poll_request() -> SubscribeRequest {
    SubscribeRequest {
        request: Some(subscribe_request::Request::Poll(Poll {})),
    }
}

fn string_val(s: &str) -> TypedValue {
    TypedValue {
        value: Some(typed_value::Value::StringVal(s.to_string())),
    }
}

fn seed_hostname(service: &TargetService, hostname: &str) {
    let req = crate::proto::gnmi::SetRequest {
        replace: vec![Update {
            path: Some(parse_xpath("/system/config/hostname").expect("valid path")),
            val: Some(string_val(hostname)),
            duplicates: 0,
        }],
        ..Default::default()
    };
    service.store.set(&req).expect("seed hostname");
}

async fn next_response(resp_rx: &mut ResponseReceiver) -> SubscribeResponse {
    next_response_within(resp_rx, RECV_TIMEOUT).await
}

async fn next_response_within(
    resp_rx: &mut ResponseReceiver,
    duration: Duration,
) -> SubscribeResponse {
    timeout(duration, resp_rx.recv())
        .await
        .expect("response within timeout")
        .expect("stream still open")
        .expect("ok response")
}

fn update_string_value(response: &SubscribeResponse) -> String {
    match &response.response {
        Some(subscribe_response::Response::Update(notification)) => {
            match notification.update[0].val.as_ref().and_then(|v| v.value.as_ref()) {
                Some(typed_value::Value::StringVal(s)) => s.clone(),
                other => panic!("expected a string update, got {other:?}"),
            }
        }
        other => panic!("expected an update notification, got {other:?}"),
    }
}

fn assert_sync_response(response: &SubscribeResponse) {
    match &response.response {
        Some(subscribe_response::Response::SyncResponse(true)) => {}
        other => panic!("expected sync_response=true, got {other:?}"),
    }
}

async fn wait_for_registration(service: &TargetService, path: &str) {
    for _ in 0..100 {
        if service.registry.subscriber_count(path) > 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("subscription for {path} never registered");
}

#[tokio::test]
async fn test_once_subscription_emits_update_sync_then_closes() {
    let service = new_service();
    seed_hostname(&service, "r1");
    let (req_tx, mut resp_rx) = start_stream(&service);

    req_tx
        .send(Ok(subscription_list(
            Mode::Once,
            &[("/system/config/hostname", SubscriptionMode::TargetDefined, 0)],
        )))
        .await
        .expect("send subscription");

    let first = next_response(&mut resp_rx).await;
    assert_eq!(update_string_value(&first), "r1");
    assert_sync_response(&next_response(&mut resp_rx).await);

    // ONCE closes the stream from the server side.
    let closed = timeout(RECV_TIMEOUT, resp_rx.recv())
        .await
        .expect("closure within timeout");
    assert!(closed.is_none());
}

#[tokio::test]
async fn test_once_subscription_on_datetime_leaf() {
    let service = new_service();
    service.store.write_datetime().expect("heartbeat write");
    let (req_tx, mut resp_rx) = start_stream(&service);

    req_tx
        .send(Ok(subscription_list(
            Mode::Once,
            &[(
                crate::constants::DATETIME_PATH,
                SubscriptionMode::TargetDefined,
                0,
            )],
        )))
        .await
        .expect("send subscription");

    let first = next_response(&mut resp_rx).await;
    let value = update_string_value(&first);
    assert!(value.contains('T') && value.contains('Z'), "got {value}");
    assert_sync_response(&next_response(&mut resp_rx).await);
}

#[tokio::test]
async fn test_poll_subscription_repeats_rounds() {
    let service = new_service();
    seed_hostname(&service, "r1");
    let (req_tx, mut resp_rx) = start_stream(&service);

    req_tx
        .send(Ok(subscription_list(
            Mode::Poll,
            &[("/system/config/hostname", SubscriptionMode::TargetDefined, 0)],
        )))
        .await
        .expect("send subscription");
    assert_eq!(update_string_value(&next_response(&mut resp_rx).await), "r1");
    assert_sync_response(&next_response(&mut resp_rx).await);

    seed_hostname(&service, "r2");
    req_tx.send(Ok(poll_request())).await.expect("send poll");
    assert_eq!(update_string_value(&next_response(&mut resp_rx).await), "r2");
    assert_sync_response(&next_response(&mut resp_rx).await);

    // The stream stays open between rounds; client EOF closes it.
    drop(req_tx);
    let closed = timeout(RECV_TIMEOUT, resp_rx.recv())
        .await
        .expect("closure within timeout");
    assert!(closed.is_none());
}

#[tokio::test]
async fn test_poll_without_subscription_list_is_invalid() {
    let service = new_service();
    let (req_tx, mut resp_rx) = start_stream(&service);

    req_tx.send(Ok(poll_request())).await.expect("send poll");
    let status = timeout(RECV_TIMEOUT, resp_rx.recv())
        .await
        .expect("response within timeout")
        .expect("stream still open")
        .expect_err("poll with nothing to poll");
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn test_stream_on_change_reports_set_and_purges_on_eof() {
    let service = new_service();
    seed_hostname(&service, "r1");
    let (req_tx, mut resp_rx) = start_stream(&service);

    req_tx
        .send(Ok(subscription_list(
            Mode::Stream,
            &[("/system/config/hostname", SubscriptionMode::OnChange, 0)],
        )))
        .await
        .expect("send subscription");
    wait_for_registration(&service, "/system/config/hostname").await;

    // Concurrent Set: the client sees the post-Set value, then the marker.
    let req = crate::proto::gnmi::SetRequest {
        update: vec![Update {
            path: Some(parse_xpath("/system/config/hostname").expect("valid path")),
            val: Some(string_val("r2")),
            duplicates: 0,
        }],
        ..Default::default()
    };
    service.store.set(&req).expect("concurrent set");

    assert_eq!(update_string_value(&next_response(&mut resp_rx).await), "r2");
    assert_sync_response(&next_response(&mut resp_rx).await);

    // Client EOF purges the registry entry.
    drop(req_tx);
    for _ in 0..100 {
        if service.registry.subscriber_count("/system/config/hostname") == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("stream client was not purged on EOF");
}

#[tokio::test]
async fn test_stream_on_change_reports_vanished_path_as_delete() {
    let service = new_service();
    seed_hostname(&service, "r1");
    let (req_tx, mut resp_rx) = start_stream(&service);

    req_tx
        .send(Ok(subscription_list(
            Mode::Stream,
            &[("/system/config/hostname", SubscriptionMode::OnChange, 0)],
        )))
        .await
        .expect("send subscription");
    wait_for_registration(&service, "/system/config/hostname").await;

    let req = crate::proto::gnmi::SetRequest {
        delete: vec![parse_xpath("/system/config/hostname").expect("valid path")],
        ..Default::default()
    };
    service.store.set(&req).expect("delete hostname");

    let first = next_response(&mut resp_rx).await;
    match &first.response {
        Some(subscribe_response::Response::Update(notification)) => {
            assert!(notification.update.is_empty());
            assert_eq!(
                crate::path::xpath(&notification.delete[0]),
                "/system/config/hostname"
            );
        }
        other => panic!("expected a delete notification, got {other:?}"),
    }
    assert_sync_response(&next_response(&mut resp_rx).await);
}

#[tokio::test]
async fn test_stream_target_defined_behaves_like_on_change() {
    let service = new_service();
    seed_hostname(&service, "r1");
    let (req_tx, mut resp_rx) = start_stream(&service);

    req_tx
        .send(Ok(subscription_list(
            Mode::Stream,
            &[(
                "/system/config/hostname",
                SubscriptionMode::TargetDefined,
                0,
            )],
        )))
        .await
        .expect("send subscription");
    wait_for_registration(&service, "/system/config/hostname").await;

    seed_hostname(&service, "r3");
    assert_eq!(update_string_value(&next_response(&mut resp_rx).await), "r3");
    assert_sync_response(&next_response(&mut resp_rx).await);
}

#[tokio::test]
async fn test_stream_sample_below_floor_is_rejected() {
    let service = new_service();
    let (req_tx, mut resp_rx) = start_stream(&service);

    req_tx
        .send(Ok(subscription_list(
            Mode::Stream,
            &[("/system/config/hostname", SubscriptionMode::Sample, 1_000_000)],
        )))
        .await
        .expect("send subscription");

    let status = timeout(RECV_TIMEOUT, resp_rx.recv())
        .await
        .expect("response within timeout")
        .expect("stream still open")
        .expect_err("interval below floor");
    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(
        status.message().contains("5000000000"),
        "message should name the floor: {}",
        status.message()
    );
}

#[tokio::test(start_paused = true)]
async fn test_stream_sample_emits_periodic_updates() {
    let service = new_service();
    seed_hostname(&service, "r1");
    let (req_tx, mut resp_rx) = start_stream(&service);

    req_tx
        .send(Ok(subscription_list(
            Mode::Stream,
            &[(
                "/system/config/hostname",
                SubscriptionMode::Sample,
                crate::constants::MIN_SAMPLE_INTERVAL_NS,
            )],
        )))
        .await
        .expect("send subscription");

    // Virtual time auto-advances through two sampling ticks; the timeout
    // must outlast the 5 s sample interval.
    let long = Duration::from_secs(30);
    for _ in 0..2 {
        let update = next_response_within(&mut resp_rx, long).await;
        assert_eq!(update_string_value(&update), "r1");
        assert_sync_response(&next_response_within(&mut resp_rx, long).await);
    }
}

#[tokio::test]
async fn test_request_without_list_or_poll_is_invalid() {
    let service = new_service();
    let (req_tx, mut resp_rx) = start_stream(&service);

    req_tx
        .send(Ok(SubscribeRequest { request: None }))
        .await
        .expect("send empty request");
    let status = timeout(RECV_TIMEOUT, resp_rx.recv())
        .await
        .expect("response within timeout")
        .expect("stream still open")
        .expect_err("empty request");
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn test_authorize_hook_denies_and_allows() {
    let service = new_service().with_authorizer(Arc::new(|metadata: &MetadataMap| {
        match metadata.get("authorization") {
            Some(_) => (true, String::new()),
            None => (false, "no credentials supplied".to_string()),
        }
    }));

    let denied = service
        .authorize(&MetadataMap::new())
        .expect_err("no credentials");
    assert_eq!(denied.code(), Code::PermissionDenied);
    assert!(denied.message().contains("no credentials"));

    let mut metadata = MetadataMap::new();
    metadata.insert("authorization", "Bearer token".parse().expect("ascii"));
    service.authorize(&metadata).expect("credentials accepted");
}

#[tokio::test]
async fn test_authorize_defaults_to_allow() {
    let service = new_service();
    service.authorize(&MetadataMap::new()).expect("open target");
}
