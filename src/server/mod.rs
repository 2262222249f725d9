//! The gNMI service implementation and server bootstrap.

mod registry;
mod subscribe;

pub(crate) use registry::SubscriberRegistry;
pub(crate) use subscribe::QueueItem;

#[cfg(test)]
mod registry_test;
#[cfg(test)]
mod subscribe_test;

use futures::FutureExt;
use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio_stream::wrappers::ReceiverStream;
use tonic::metadata::MetadataMap;
use tonic::Request;
use tonic::Response;
use tonic::Status;
use tonic::Streaming;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::config::TargetConfig;
use crate::errors::Result;
use crate::events::Dispatcher;
use crate::events::EventKind;
use crate::proto::gnmi::g_nmi_server::GNmi;
use crate::proto::gnmi::g_nmi_server::GNmiServer;
use crate::proto::gnmi::CapabilityRequest;
use crate::proto::gnmi::CapabilityResponse;
use crate::proto::gnmi::GetRequest;
use crate::proto::gnmi::GetResponse;
use crate::proto::gnmi::SetRequest;
use crate::proto::gnmi::SetResponse;
use crate::proto::gnmi::SubscribeRequest;
use crate::proto::gnmi::SubscribeResponse;
use crate::store::ConfigStore;

/// Authorization hook consulted once per Subscribe call: returns whether
/// the caller is allowed plus a message for denials.
pub type Authorizer = Arc<dyn Fn(&MetadataMap) -> (bool, String) + Send + Sync>;

/// The gNMI target service. Capabilities, Get and Set delegate to the
/// config store; Subscribe runs the subscription engine.
#[derive(Clone)]
pub struct TargetService {
    pub(crate) store: Arc<ConfigStore>,
    pub(crate) registry: Arc<SubscriberRegistry>,
    pub(crate) dispatcher: Arc<Dispatcher>,
    authorizer: Option<Authorizer>,
    pub(crate) queue_capacity: usize,
    pub(crate) random_event_interval: Duration,
    client_ids: Arc<AtomicU64>,
}

impl TargetService {
    pub fn new(store: Arc<ConfigStore>, settings: &TargetConfig) -> Self {
        let dispatcher = Arc::new(Dispatcher::new());
        dispatcher.register_event(EventKind::Random);
        Self {
            store,
            registry: Arc::new(SubscriberRegistry::new()),
            dispatcher,
            authorizer: None,
            queue_capacity: settings.limits.client_queue_capacity,
            random_event_interval: Duration::from_secs(
                settings.telemetry.random_event_interval_secs,
            ),
            client_ids: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Installs the authorization hook applied to every Subscribe call.
    pub fn with_authorizer(mut self, authorizer: Authorizer) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    pub(crate) fn next_client_id(&self) -> u64 {
        self.client_ids.fetch_add(1, Ordering::Relaxed)
    }

    /// Consults the authorization hook, once per RPC call.
    fn authorize(&self, metadata: &MetadataMap) -> std::result::Result<(), Status> {
        if let Some(authorize) = &self.authorizer {
            let (ok, msg) = authorize(metadata);
            if !ok {
                info!("denied a Subscribe request: {msg}");
                return Err(Status::permission_denied(msg));
            }
        }
        Ok(())
    }
}

#[tonic::async_trait]
impl GNmi for TargetService {
    async fn capabilities(
        &self,
        _request: Request<CapabilityRequest>,
    ) -> std::result::Result<Response<CapabilityResponse>, Status> {
        Ok(Response::new(self.store.capabilities()))
    }

    async fn get(
        &self,
        request: Request<GetRequest>,
    ) -> std::result::Result<Response<GetResponse>, Status> {
        debug!("Get::Received: {:?}", request.get_ref());
        self.store.get(request.get_ref()).map(Response::new)
    }

    async fn set(
        &self,
        request: Request<SetRequest>,
    ) -> std::result::Result<Response<SetResponse>, Status> {
        debug!("Set::Received: {:?}", request.get_ref());
        self.store.set(request.get_ref()).map(Response::new)
    }

    type SubscribeStream = ReceiverStream<std::result::Result<SubscribeResponse, Status>>;

    async fn subscribe(
        &self,
        request: Request<Streaming<SubscribeRequest>>,
    ) -> std::result::Result<Response<Self::SubscribeStream>, Status> {
        self.authorize(request.metadata())?;
        let in_stream = request.into_inner();
        let (resp_tx, resp_rx) = mpsc::channel(self.queue_capacity);
        self.spawn_stream_driver(in_stream, resp_tx);
        Ok(Response::new(ReceiverStream::new(resp_rx)))
    }
}

/// Runs the gNMI gRPC server until the shutdown signal fires.
pub async fn start_rpc_server(
    service: TargetService,
    listen_address: SocketAddr,
    mut shutdown_signal: watch::Receiver<()>,
) -> Result<()> {
    info!("starting gNMI target to listen on {listen_address}");
    tonic::transport::Server::builder()
        .add_service(GNmiServer::new(service))
        .serve_with_shutdown(
            listen_address,
            shutdown_signal.changed().map(move |_| {
                warn!("stopping gNMI server on {listen_address}");
            }),
        )
        .await
        .map_err(|e| {
            error!("error to start gNMI rpc server: {e:?}");
            e
        })?;
    debug!("gNMI rpc service finished");
    Ok(())
}
