//! # Generic gRPC Client
//!
//! This module wraps a standard `tonic` client to provide the [`Client`] capability used by
//! the call orchestrator. It is agnostic to the specific Protobuf messages being exchanged.
//!
//! ## How it works
//!
//! The [`GrpcClient`] utilizes the [`super::codec::DynamicCodec`] to handle serialization.
//! The request descriptor travels with each `DynamicMessage`, and the response descriptor is
//! taken from the resolved [`RpcDescriptor`].
//!
//! ## Features
//!
//! * **Dynamic Pathing**: Constructs the HTTP/2 path (e.g., `/package.Service/Method`) at runtime.
//! * **Streaming**: Client and bidirectional calls run on a spawned task fed through a channel,
//!   so requests flow to the server while the caller is still producing them.
use super::codec::DynamicCodec;
use crate::{
    BoxError,
    call::transport::{Client, ClientStream, StreamReceiver, StreamSender},
    descriptor::RpcDescriptor,
};
use http_body::Body as HttpBody;
use prost_reflect::DynamicMessage;
use std::str::FromStr;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{
    Response, Status, Streaming,
    client::{Grpc, GrpcService},
    metadata::MetadataMap,
    transport::{Channel, Endpoint},
};

/// Requests buffered between the caller and the spawned call task.
const REQUEST_BUFFER: usize = 100;

/// Errors that can occur when connecting to a gRPC server.
#[derive(Debug, thiserror::Error)]
pub enum ClientConnectError {
    #[error("Invalid URL '{0}': {1}")]
    InvalidUrl(String, #[source] tonic::transport::Error),
    #[error("Failed to connect to '{0}': {1}")]
    ConnectionFailed(String, #[source] tonic::transport::Error),
}

/// A generic gRPC client exchanging `DynamicMessage`s.
#[derive(Debug, Clone)]
pub struct GrpcClient<S = Channel> {
    client: Grpc<S>,
}

/// Opens a channel to a gRPC server.
///
/// The channel is cheap to clone, so a reflection client and a [`GrpcClient`] can share it.
///
/// # Arguments
///
/// * `addr` - The server URI (e.g., `http://localhost:50051`).
pub async fn connect(addr: &str) -> Result<Channel, ClientConnectError> {
    let endpoint = Endpoint::new(addr.to_string())
        .map_err(|e| ClientConnectError::InvalidUrl(addr.to_string(), e))?;

    endpoint
        .connect()
        .await
        .map_err(|e| ClientConnectError::ConnectionFailed(addr.to_string(), e))
}

impl GrpcClient<Channel> {
    /// Connects to a gRPC server.
    pub async fn connect(addr: &str) -> Result<Self, ClientConnectError> {
        Ok(Self::new(connect(addr).await?))
    }
}

impl<S> GrpcClient<S> {
    /// Creates a client from an existing Tonic service/channel.
    pub fn new(service: S) -> Self {
        Self {
            client: Grpc::new(service),
        }
    }
}

impl<S> Client for GrpcClient<S>
where
    S: GrpcService<tonic::body::Body> + Clone + Send + Sync + 'static,
    S::Future: Send,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    type ClientStream = GrpcClientStream;
    type ServerStream = GrpcReceiver;
    type BidiSender = GrpcSender;
    type BidiReceiver = GrpcReceiver;

    async fn invoke(
        &mut self,
        rpc: &RpcDescriptor,
        metadata: MetadataMap,
        request: DynamicMessage,
    ) -> Result<DynamicMessage, Status> {
        let path = http_path(rpc)?;
        let codec = DynamicCodec::new(rpc.response_type());

        ready(&mut self.client).await?;
        let response = self
            .client
            .unary(build_request(request, metadata), path, codec)
            .await?;

        Ok(response.into_inner())
    }

    async fn open_client_stream(
        &mut self,
        rpc: &RpcDescriptor,
        metadata: MetadataMap,
    ) -> Result<Self::ClientStream, Status> {
        let path = http_path(rpc)?;
        let codec = DynamicCodec::new(rpc.response_type());
        let (tx, rx) = mpsc::channel(REQUEST_BUFFER);
        let request = build_request(ReceiverStream::new(rx), metadata);
        let mut grpc = self.client.clone();

        let call = tokio::spawn(async move {
            ready(&mut grpc).await?;
            grpc.client_streaming(request, path, codec).await
        });

        Ok(GrpcClientStream {
            sender: GrpcSender { tx },
            call: Some(call),
        })
    }

    async fn open_server_stream(
        &mut self,
        rpc: &RpcDescriptor,
        metadata: MetadataMap,
        request: DynamicMessage,
    ) -> Result<Self::ServerStream, Status> {
        let path = http_path(rpc)?;
        let codec = DynamicCodec::new(rpc.response_type());

        ready(&mut self.client).await?;
        let response = self
            .client
            .server_streaming(build_request(request, metadata), path, codec)
            .await?;

        Ok(GrpcReceiver {
            pending: None,
            stream: Some(response.into_inner()),
        })
    }

    async fn open_bidi_stream(
        &mut self,
        rpc: &RpcDescriptor,
        metadata: MetadataMap,
    ) -> Result<(Self::BidiSender, Self::BidiReceiver), Status> {
        let path = http_path(rpc)?;
        let codec = DynamicCodec::new(rpc.response_type());
        let (tx, rx) = mpsc::channel(REQUEST_BUFFER);
        let request = build_request(ReceiverStream::new(rx), metadata);
        let mut grpc = self.client.clone();

        // Some servers only answer with headers once the first request arrived, so the
        // call must not be awaited before the caller starts sending.
        let call = tokio::spawn(async move {
            ready(&mut grpc).await?;
            grpc.streaming(request, path, codec).await
        });

        let receiver = GrpcReceiver {
            pending: Some(call),
            stream: None,
        };
        Ok((GrpcSender { tx }, receiver))
    }
}

/// The request half of a streaming call.
#[derive(Debug)]
pub struct GrpcSender {
    tx: mpsc::Sender<DynamicMessage>,
}

impl StreamSender for GrpcSender {
    async fn send(&mut self, request: DynamicMessage) -> Result<(), Status> {
        self.tx
            .send(request)
            .await
            .map_err(|_| stream_closed())
    }

    async fn close_send(self) -> Result<(), Status> {
        drop(self.tx);
        Ok(())
    }
}

/// The request side of a client streaming call.
///
/// Once the call task has ended, sending fails with the status the server answered with.
#[derive(Debug)]
pub struct GrpcClientStream {
    sender: GrpcSender,
    call: Option<JoinHandle<Result<Response<DynamicMessage>, Status>>>,
}

impl GrpcClientStream {
    /// Waits for the call task and returns why the request stream was closed.
    async fn closed_by_server(&mut self) -> Status {
        let Some(call) = self.call.take() else {
            return stream_closed();
        };

        match call.await {
            Ok(Err(status)) => status,
            Ok(Ok(_)) => stream_closed(),
            Err(err) => task_failed(err),
        }
    }
}

impl ClientStream for GrpcClientStream {
    async fn send(&mut self, request: DynamicMessage) -> Result<(), Status> {
        if self.sender.tx.send(request).await.is_ok() {
            return Ok(());
        }
        Err(self.closed_by_server().await)
    }

    async fn close_and_receive(mut self) -> Result<DynamicMessage, Status> {
        let Some(call) = self.call.take() else {
            return Err(stream_closed());
        };
        self.sender.close_send().await?;

        let response = call.await.map_err(task_failed)??;
        Ok(response.into_inner())
    }
}

/// The response half of a streaming call.
#[derive(Debug)]
pub struct GrpcReceiver {
    pending: Option<JoinHandle<Result<Response<Streaming<DynamicMessage>>, Status>>>,
    stream: Option<Streaming<DynamicMessage>>,
}

impl StreamReceiver for GrpcReceiver {
    async fn receive(&mut self) -> Result<Option<DynamicMessage>, Status> {
        if let Some(call) = self.pending.take() {
            let response = call.await.map_err(task_failed)??;
            self.stream = Some(response.into_inner());
        }

        match self.stream.as_mut() {
            Some(stream) => stream.message().await,
            None => Ok(None),
        }
    }
}

async fn ready<S>(client: &mut Grpc<S>) -> Result<(), Status>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
{
    client
        .ready()
        .await
        .map_err(|e| Status::unknown(format!("Service was not ready: {}", e.into())))
}

fn stream_closed() -> Status {
    Status::aborted("The request stream was closed by the server")
}

fn task_failed(err: tokio::task::JoinError) -> Status {
    Status::internal(format!("The call task failed: {err}"))
}

fn http_path(rpc: &RpcDescriptor) -> Result<http::uri::PathAndQuery, Status> {
    let path = rpc.path();
    http::uri::PathAndQuery::from_str(&path)
        .map_err(|e| Status::invalid_argument(format!("Invalid gRPC path '{path}': {e}")))
}

fn build_request<T>(payload: T, metadata: MetadataMap) -> tonic::Request<T> {
    let mut request = tonic::Request::new(payload);
    *request.metadata_mut() = metadata;
    request
}
