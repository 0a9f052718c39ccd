//! # Transport Capability
//!
//! The orchestrator never talks to the network directly; it drives a [`Client`].
//! [`crate::grpc::client::GrpcClient`] is the tonic-backed implementation, tests use
//! in-memory ones.
//!
//! Bidirectional streams are opened as two owned halves. The send half and the receive
//! half are used from two concurrently progressing futures, so an implementation must
//! allow one half to make progress while the other is suspended.
use crate::descriptor::RpcDescriptor;
use prost_reflect::DynamicMessage;
use std::future::Future;
use tonic::{Status, metadata::MetadataMap};

pub trait Client {
    type ClientStream: ClientStream;
    type ServerStream: StreamReceiver;
    type BidiSender: StreamSender;
    type BidiReceiver: StreamReceiver;

    /// Sends one request and waits for the single response.
    fn invoke(
        &mut self,
        rpc: &RpcDescriptor,
        metadata: MetadataMap,
        request: DynamicMessage,
    ) -> impl Future<Output = Result<DynamicMessage, Status>> + Send;

    fn open_client_stream(
        &mut self,
        rpc: &RpcDescriptor,
        metadata: MetadataMap,
    ) -> impl Future<Output = Result<Self::ClientStream, Status>> + Send;

    /// Sends the only request of a server streaming call.
    fn open_server_stream(
        &mut self,
        rpc: &RpcDescriptor,
        metadata: MetadataMap,
        request: DynamicMessage,
    ) -> impl Future<Output = Result<Self::ServerStream, Status>> + Send;

    fn open_bidi_stream(
        &mut self,
        rpc: &RpcDescriptor,
        metadata: MetadataMap,
    ) -> impl Future<Output = Result<(Self::BidiSender, Self::BidiReceiver), Status>> + Send;
}

/// The request side of a client streaming call.
pub trait ClientStream {
    fn send(&mut self, request: DynamicMessage)
    -> impl Future<Output = Result<(), Status>> + Send;

    /// Closes the request side and waits for the single response.
    fn close_and_receive(self) -> impl Future<Output = Result<DynamicMessage, Status>> + Send;
}

pub trait StreamSender {
    fn send(&mut self, request: DynamicMessage)
    -> impl Future<Output = Result<(), Status>> + Send;

    fn close_send(self) -> impl Future<Output = Result<(), Status>> + Send;
}

pub trait StreamReceiver {
    /// `Ok(None)` once the server has finished the stream.
    fn receive(&mut self) -> impl Future<Output = Result<Option<DynamicMessage>, Status>> + Send;
}
