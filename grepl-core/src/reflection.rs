//! # Server Reflection
//!
//! This module contains the logic necessary to interact with the gRPC Server Reflection Protocol.
//!
//! It lets a session query a server for its own Protobuf schema at runtime, so calls can be
//! made without a pre-compiled descriptor set.
pub mod client;
