//! The subscription engine.
//!
//! Every Subscribe RPC gets one driver task reading client messages, one
//! bounded update queue, and one listener task translating queue items into
//! `SubscribeResponse`s, each update immediately followed by its
//! `sync_response` marker. ONCE and POLL run collector rounds over the
//! store; STREAM registers the client, attaches it to the config-update
//! ring and starts sample tickers and the synthetic telemetry producer as
//! requested.

use futures::Stream;
use futures::StreamExt;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::TargetService;
use crate::constants::MIN_SAMPLE_INTERVAL_NS;
use crate::constants::TELEMETRY_PATH;
use crate::path::full_path;
use crate::path::xpath;
use crate::proto::gnmi::subscribe_request;
use crate::proto::gnmi::subscribe_response;
use crate::proto::gnmi::subscription_list::Mode;
use crate::proto::gnmi::Notification;
use crate::proto::gnmi::Path;
use crate::proto::gnmi::SubscribeRequest;
use crate::proto::gnmi::SubscribeResponse;
use crate::proto::gnmi::SubscriptionList;
use crate::proto::gnmi::SubscriptionMode;
use crate::proto::gnmi::Update;
use crate::store::now_ns;
use tonic::Status;

/// One entry of a client's update queue.
#[derive(Debug)]
pub(crate) enum QueueItem {
    Update(Update),
    /// The subscribed path disappeared; reported as a delete notification.
    Delete(Path),
    /// Ends the stream after the queue drained (ONCE).
    Finish,
}

pub(crate) type ResponseSender = mpsc::Sender<Result<SubscribeResponse, Status>>;

impl TargetService {
    /// Spawns the driver task owning the inbound request stream. Generic
    /// over the stream so the engine can be driven without a socket.
    pub(crate) fn spawn_stream_driver<St>(&self, in_stream: St, resp_tx: ResponseSender)
    where
        St: Stream<Item = Result<SubscribeRequest, Status>> + Send + Unpin + 'static,
    {
        let service = self.clone();
        tokio::spawn(async move {
            service.drive_stream(in_stream, resp_tx).await;
        });
    }

    async fn drive_stream<St>(&self, mut in_stream: St, resp_tx: ResponseSender)
    where
        St: Stream<Item = Result<SubscribeRequest, Status>> + Send + Unpin + 'static,
    {
        let client_id = self.next_client_id();
        let cancel = CancellationToken::new();
        let (queue_tx, queue_rx) = mpsc::channel(self.queue_capacity);
        tokio::spawn(listen_for_updates(
            queue_rx,
            resp_tx.clone(),
            cancel.clone(),
        ));

        let mut current: Option<SubscriptionList> = None;
        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = in_stream.next() => message,
            };
            let request = match message {
                None => break, // client closed its side
                Some(Err(e)) => {
                    debug!("subscribe stream receive error for client {client_id}: {e}");
                    break;
                }
                Some(Ok(request)) => request,
            };

            match request.request {
                Some(subscribe_request::Request::Poll(_)) => {
                    let Some(list) = current.clone() else {
                        let _ = resp_tx
                            .send(Err(Status::invalid_argument(
                                "poll without a preceding subscription list",
                            )))
                            .await;
                        break;
                    };
                    self.spawn_collector(list, queue_tx.clone(), false);
                }
                Some(subscribe_request::Request::Subscribe(list)) => {
                    let mode = list.mode();
                    current = Some(list.clone());
                    match mode {
                        Mode::Once => {
                            self.spawn_collector(list, queue_tx.clone(), true);
                        }
                        Mode::Poll => {
                            self.spawn_collector(list, queue_tx.clone(), false);
                        }
                        Mode::Stream => {
                            if let Err(status) = self.start_stream_subscriptions(
                                client_id,
                                &list,
                                &queue_tx,
                                &cancel,
                            ) {
                                let _ = resp_tx.send(Err(status)).await;
                                break;
                            }
                        }
                    }
                }
                None => {
                    let _ = resp_tx
                        .send(Err(Status::invalid_argument(
                            "subscribe request carries neither a subscription list nor a poll",
                        )))
                        .await;
                    break;
                }
            }
        }

        cancel.cancel();
        self.registry.purge(client_id);
        debug!("subscribe stream for client {client_id} finished");
    }

    /// Collector round for ONCE and POLL: one re-fetch per subscription
    /// path, pushed into the client queue. `finish` closes the stream once
    /// the round drained.
    fn spawn_collector(&self, list: SubscriptionList, queue_tx: mpsc::Sender<QueueItem>, finish: bool) {
        let store = self.store.clone();
        tokio::spawn(async move {
            for subscription in &list.subscription {
                let Some(path) = subscription.path.as_ref() else {
                    continue;
                };
                match store.get_update(list.prefix.as_ref(), path) {
                    Ok(update) => {
                        if queue_tx.send(QueueItem::Update(update)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        info!("error while collecting data for subscribe once or poll: {e}");
                    }
                }
            }
            if finish {
                let _ = queue_tx.send(QueueItem::Finish).await;
            }
        });
    }

    /// Registers a STREAM subscription list and starts its long-lived
    /// tasks. A sample interval between zero and the floor fails the whole
    /// RPC.
    fn start_stream_subscriptions(
        &self,
        client_id: u64,
        list: &SubscriptionList,
        queue_tx: &mpsc::Sender<QueueItem>,
        cancel: &CancellationToken,
    ) -> Result<(), Status> {
        for subscription in &list.subscription {
            if subscription.mode() == SubscriptionMode::Sample
                && subscription.sample_interval > 0
                && subscription.sample_interval < MIN_SAMPLE_INTERVAL_NS
            {
                return Err(Status::invalid_argument(format!(
                    "sample_interval {} is below the minimum supported interval {}",
                    subscription.sample_interval, MIN_SAMPLE_INTERVAL_NS
                )));
            }
        }

        let prefix = list.prefix.as_ref();
        let mut registered_paths = Vec::new();
        let mut on_change_paths = HashSet::new();
        for subscription in &list.subscription {
            let Some(path) = subscription.path.as_ref() else {
                continue;
            };
            let path_string = xpath(&full_path(prefix, path));
            if matches!(
                subscription.mode(),
                SubscriptionMode::OnChange | SubscriptionMode::TargetDefined
            ) {
                // TARGET_DEFINED is pinned to on-change until per-leaf
                // classification is available.
                on_change_paths.insert(path_string.clone());
            }
            registered_paths.push(path_string);
        }
        // Attach to the ring before the registration becomes visible, so
        // no event published after registration can be missed.
        let config_events = if on_change_paths.is_empty() {
            None
        } else {
            Some(self.store.events().subscribe())
        };
        self.registry.register(client_id, &registered_paths);

        if let Some(events) = config_events {
            self.spawn_config_event_consumer(
                client_id,
                on_change_paths,
                events,
                queue_tx.clone(),
                cancel.clone(),
            );
        }

        for subscription in &list.subscription {
            if subscription.mode() != SubscriptionMode::Sample {
                continue;
            }
            let Some(path) = subscription.path.as_ref() else {
                continue;
            };
            let interval = if subscription.sample_interval == 0 {
                MIN_SAMPLE_INTERVAL_NS
            } else {
                subscription.sample_interval
            };
            self.spawn_sample_ticker(
                list.prefix.clone(),
                path.clone(),
                Duration::from_nanos(interval),
                queue_tx.clone(),
                cancel.clone(),
            );
        }

        if registered_paths.iter().any(|p| p == TELEMETRY_PATH) {
            crate::telemetry::spawn_random_telemetry(
                self.store.clone(),
                self.dispatcher.clone(),
                client_id,
                list.clone(),
                queue_tx.clone(),
                cancel.clone(),
                self.random_event_interval,
            );
        }
        Ok(())
    }

    /// One consumer per STREAM client with on-change subscriptions: drains
    /// the config-update ring, re-fetches matching paths so notifications
    /// reflect post-Set state, and reports vanished paths as deletes.
    fn spawn_config_event_consumer(
        &self,
        client_id: u64,
        paths: HashSet<String>,
        mut events: broadcast::Receiver<Update>,
        queue_tx: mpsc::Sender<QueueItem>,
        cancel: CancellationToken,
    ) {
        let store = self.store.clone();
        let registry = self.registry.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => event,
                };
                match event {
                    Ok(update) => {
                        let Some(event_path) = update.path.as_ref() else {
                            continue;
                        };
                        let path_string = xpath(event_path);
                        if !paths.contains(&path_string)
                            || !registry.is_subscribed(&path_string, client_id)
                        {
                            continue;
                        }
                        // Event paths are absolute; no prefix to compose.
                        let item = match store.get_update(None, event_path) {
                            Ok(fresh) => QueueItem::Update(fresh),
                            Err(_) => QueueItem::Delete(event_path.clone()),
                        };
                        if queue_tx.try_send(item).is_err() {
                            debug!("dropping config event for client {client_id}: queue full");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("config event consumer for client {client_id} lagged, skipped {skipped} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Periodic re-collection of one SAMPLE subscription path.
    fn spawn_sample_ticker(
        &self,
        prefix: Option<Path>,
        path: Path,
        interval: Duration,
        queue_tx: mpsc::Sender<QueueItem>,
        cancel: CancellationToken,
    ) {
        let store = self.store.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // the zeroth tick fires immediately
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        match store.get_update(prefix.as_ref(), &path) {
                            Ok(update) => {
                                if queue_tx.try_send(QueueItem::Update(update)).is_err() {
                                    debug!("dropping sampled update: queue full");
                                }
                            }
                            Err(e) => debug!("sample collection failed: {e}"),
                        }
                    }
                }
            }
        });
    }
}

/// Listener: translates queue items into responses. Every update is
/// followed by its sync marker before the next item is taken.
async fn listen_for_updates(
    mut queue_rx: mpsc::Receiver<QueueItem>,
    resp_tx: ResponseSender,
    cancel: CancellationToken,
) {
    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => break,
            item = queue_rx.recv() => item,
        };
        let notification = match item {
            None => break,
            Some(QueueItem::Finish) => {
                cancel.cancel();
                break;
            }
            Some(QueueItem::Update(update)) => Notification {
                timestamp: now_ns(),
                prefix: None,
                update: vec![update],
                delete: Vec::new(),
            },
            Some(QueueItem::Delete(path)) => Notification {
                timestamp: now_ns(),
                prefix: None,
                update: Vec::new(),
                delete: vec![path],
            },
        };
        if send_response(
            &resp_tx,
            subscribe_response::Response::Update(notification),
        )
        .await
        .is_err()
            || send_response(&resp_tx, subscribe_response::Response::SyncResponse(true))
                .await
                .is_err()
        {
            warn!("error in sending response to client; closing stream");
            cancel.cancel();
            break;
        }
    }
}

async fn send_response(
    resp_tx: &ResponseSender,
    response: subscribe_response::Response,
) -> Result<(), ()> {
    resp_tx
        .send(Ok(SubscribeResponse {
            response: Some(response),
        }))
        .await
        .map_err(|_| ())
}
