//! # Reflection Client
//!
//! Discovers a server's schema through `grpc.reflection.v1`.
//!
//! Everything a [`PoolSource`] needs is fetched over one reflection stream, one request at
//! a time: the service list, the file declaring each service, then every import that has
//! not been seen yet. Files shared by several services are fetched once.
//!
//! ## References
//!
//! * [gRPC Server Reflection Protocol](https://github.com/grpc/grpc/blob/master/doc/server-reflection.md)
use crate::{BoxError, descriptor::PoolSource};
use http_body::Body as HttpBody;
use prost::Message;
use prost_reflect::DescriptorPool;
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Code, Status, Streaming, client::GrpcService, transport::Channel};
use tonic_reflection::pb::v1::{
    ServerReflectionRequest, ServerReflectionResponse,
    server_reflection_client::ServerReflectionClient, server_reflection_request::MessageRequest,
    server_reflection_response::MessageResponse,
};

/// Requests are answered one by one, so the channel never holds more than one.
const REQUEST_BUFFER: usize = 1;

#[derive(Debug, thiserror::Error)]
pub enum ReflectionError {
    #[error(
        "Failed to open a reflection stream, the server might not support reflection: '{0}'"
    )]
    Unsupported(#[source] Status),

    #[error("The reflection service failed: '{0}'")]
    Server(#[source] Status),

    #[error("Reflection stream closed unexpectedly")]
    StreamClosed,

    #[error("Unexpected reflection response, expected {expected}")]
    UnexpectedResponse { expected: &'static str },

    #[error("Failed to decode a reflected file descriptor: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("The reflected descriptors do not form a valid schema: {0}")]
    InvalidSchema(#[from] prost_reflect::DescriptorError),
}

pub struct ReflectionClient<S = Channel> {
    client: ServerReflectionClient<S>,
}

impl<S> ReflectionClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        Self {
            client: ServerReflectionClient::new(service),
        }
    }

    /// Lists the fully qualified names of the services the server exposes.
    pub async fn list_services(&mut self) -> Result<Vec<String>, ReflectionError> {
        self.open().await?.list_services().await
    }

    /// Fetches the file declaring `symbol` together with everything it imports.
    pub async fn file_descriptor_set(
        &mut self,
        symbol: &str,
    ) -> Result<FileDescriptorSet, ReflectionError> {
        let mut stream = self.open().await?;
        let mut files = Files::default();

        stream.resolve(symbol, &mut files).await?;
        Ok(files.into_set())
    }

    /// Builds a descriptor source covering every service the server exposes.
    pub async fn pool_source(&mut self) -> Result<PoolSource, ReflectionError> {
        let mut stream = self.open().await?;
        let mut files = Files::default();

        for service in stream.list_services().await? {
            tracing::debug!(service = %service, "resolving service through reflection");
            stream.resolve(&service, &mut files).await?;
        }

        let pool = DescriptorPool::from_file_descriptor_set(files.into_set())?;
        tracing::debug!(files = pool.files().count(), "reflected schema loaded");

        Ok(PoolSource::new(pool))
    }

    async fn open(&mut self) -> Result<ReflectionStream, ReflectionError> {
        let (tx, rx) = mpsc::channel(REQUEST_BUFFER);

        let responses = self
            .client
            .server_reflection_info(ReceiverStream::new(rx))
            .await
            .map_err(ReflectionError::Unsupported)?
            .into_inner();

        Ok(ReflectionStream { tx, responses })
    }
}

struct ReflectionStream {
    tx: mpsc::Sender<ServerReflectionRequest>,
    responses: Streaming<ServerReflectionResponse>,
}

impl ReflectionStream {
    async fn request(&mut self, request: MessageRequest) -> Result<MessageResponse, ReflectionError> {
        // The host field is optional and servers ignore it.
        let request = ServerReflectionRequest {
            host: String::new(),
            message_request: Some(request),
        };

        if self.tx.send(request).await.is_err() {
            return Err(match self.responses.message().await {
                Err(status) => ReflectionError::Server(status),
                Ok(_) => ReflectionError::StreamClosed,
            });
        }

        let response = self
            .responses
            .message()
            .await
            .map_err(ReflectionError::Server)?
            .ok_or(ReflectionError::StreamClosed)?;

        match response.message_response {
            Some(MessageResponse::ErrorResponse(err)) => Err(ReflectionError::Server(
                Status::new(Code::from(err.error_code), err.error_message),
            )),
            Some(response) => Ok(response),
            None => Err(ReflectionError::UnexpectedResponse {
                expected: "a message response",
            }),
        }
    }

    async fn list_services(&mut self) -> Result<Vec<String>, ReflectionError> {
        match self
            .request(MessageRequest::ListServices(String::new()))
            .await?
        {
            MessageResponse::ListServicesResponse(list) => {
                Ok(list.service.into_iter().map(|s| s.name).collect())
            }
            _ => Err(ReflectionError::UnexpectedResponse {
                expected: "a service list",
            }),
        }
    }

    /// Adds the file declaring `symbol` and its missing imports to `files`.
    async fn resolve(&mut self, symbol: &str, files: &mut Files) -> Result<(), ReflectionError> {
        let mut pending = VecDeque::new();

        let response = self
            .request(MessageRequest::FileContainingSymbol(symbol.to_string()))
            .await?;
        files.add(response, &mut pending)?;

        while let Some(name) = pending.pop_front() {
            if files.contains(&name) {
                continue;
            }
            let response = self.request(MessageRequest::FileByFilename(name)).await?;
            files.add(response, &mut pending)?;
        }

        Ok(())
    }
}

/// Files collected so far, by name.
#[derive(Default)]
struct Files {
    by_name: HashMap<String, FileDescriptorProto>,
    requested: HashSet<String>,
}

impl Files {
    fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Stores the files of a descriptor response and queues the imports still missing.
    fn add(
        &mut self,
        response: MessageResponse,
        pending: &mut VecDeque<String>,
    ) -> Result<(), ReflectionError> {
        let MessageResponse::FileDescriptorResponse(batch) = response else {
            return Err(ReflectionError::UnexpectedResponse {
                expected: "file descriptors",
            });
        };

        for raw in batch.file_descriptor_proto {
            let file = FileDescriptorProto::decode(raw.as_slice())?;
            if self.contains(file.name()) {
                continue;
            }

            for import in &file.dependency {
                if !self.contains(import) && self.requested.insert(import.clone()) {
                    pending.push_back(import.clone());
                }
            }
            self.by_name.insert(file.name().to_string(), file);
        }

        Ok(())
    }

    fn into_set(self) -> FileDescriptorSet {
        FileDescriptorSet {
            file: self.by_name.into_values().collect(),
        }
    }
}
