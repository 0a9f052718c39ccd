//! # Generic gRPC Transport
//!
//! This module contains the tonic-backed implementation of the
//! [`crate::call::transport::Client`] capability.
//!
//! Unlike standard `tonic` clients which are strongly typed (e.g., `HelloRequest`),
//! the components here exchange `prost_reflect::DynamicMessage` values, whose schema is
//! resolved at runtime.
pub mod client;
pub mod codec;
