//! # Grepl Core
//!
//! `grepl-core` is the library powering the Grepl interactive gRPC client. Given a schema
//! known only at runtime, it builds request messages field by field from a stream of user
//! input, drives calls of all four RPC shapes, and renders the responses.
//!
//! ## Key Components
//!
//! * **[`fill`]:** The message filler. [`fill::InteractiveFiller`] walks a message schema and
//!   asks a [`fill::Prompt`] for every field, handling nested and repeated messages, maps,
//!   oneofs, enums and recursive types. [`fill::JsonFiller`] reads whole JSON documents instead.
//! * **[`call`]:** The streaming orchestrator. [`call::call_rpc`] dispatches on the shape of
//!   an RPC, feeds requests from a filler and hands every response to a [`present::Presenter`].
//! * **[`descriptor`] & [`header`]:** The read-only schema model and the user-controlled
//!   outgoing metadata.
//! * **[`session::Session`]:** Bundles the above with the current package and service selection.
//!
//! ## Transports
//!
//! * **[`grpc::client::GrpcClient`]:** A dynamic gRPC client exchanging `DynamicMessage`s.
//! * **[`reflection::client::ReflectionClient`]:** A gRPC Reflection client able to build a
//!   descriptor source from a live server.
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect`, `tonic` and `tokio-util` to ensure that
//! consumers use compatible versions of these underlying dependencies.
pub mod call;
pub mod descriptor;
pub mod fill;
pub mod grpc;
pub mod header;
pub mod present;
pub mod reflection;
pub mod session;

// Re-exports
pub use prost;
pub use prost_reflect;
pub use tokio_util;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
