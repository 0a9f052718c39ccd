//! # Descriptor Model
//!
//! Read-mostly schema metadata used by the rest of the crate.
//!
//! * **[`RpcDescriptor`]**: a resolved method, carrying its request/response message
//!   descriptors and its streaming shape.
//! * **[`Descriptor`]**: whatever a fully qualified symbol resolves to (service, message or enum).
//! * **[`DescriptorSource`]**: the capability that turns names into descriptors. The
//!   [`PoolSource`] implementation is backed by an in-memory `DescriptorPool`, which can be
//!   loaded from an encoded `FileDescriptorSet` or assembled through server reflection.
mod pool;

pub use pool::PoolSource;

use prost_reflect::{EnumDescriptor, MessageDescriptor, MethodDescriptor, ServiceDescriptor};

/// Errors raised while resolving names against a [`DescriptorSource`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("No package selected")]
    PackageUnselected,
    #[error("No service selected")]
    ServiceUnselected,
    #[error("Package '{0}' not found")]
    UnknownPackage(String),
    #[error("Service '{0}' not found")]
    UnknownService(String),
    #[error("RPC '{0}' not found")]
    UnknownRpc(String),
    #[error("Symbol '{0}' not found")]
    UnknownSymbol(String),
    #[error("Invalid fully qualified method name '{0}', expected 'package.Service.Method'")]
    InvalidMethodName(String),
}

/// The four exchange shapes a gRPC method can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcShape {
    Unary,
    ClientStreaming,
    ServerStreaming,
    Bidirectional,
}

/// A resolved RPC. Immutable once built.
#[derive(Debug, Clone)]
pub struct RpcDescriptor {
    method: MethodDescriptor,
}

impl RpcDescriptor {
    pub fn new(method: MethodDescriptor) -> Self {
        Self { method }
    }

    /// Short method name (e.g. `SayHello`).
    pub fn name(&self) -> &str {
        self.method.name()
    }

    /// Dot-joined `package.Service.Method`.
    pub fn fully_qualified_name(&self) -> &str {
        self.method.full_name()
    }

    pub fn request_type(&self) -> MessageDescriptor {
        self.method.input()
    }

    pub fn response_type(&self) -> MessageDescriptor {
        self.method.output()
    }

    pub fn is_client_streaming(&self) -> bool {
        self.method.is_client_streaming()
    }

    pub fn is_server_streaming(&self) -> bool {
        self.method.is_server_streaming()
    }

    pub fn shape(&self) -> RpcShape {
        match (self.is_client_streaming(), self.is_server_streaming()) {
            (false, false) => RpcShape::Unary,
            (true, false) => RpcShape::ClientStreaming,
            (false, true) => RpcShape::ServerStreaming,
            (true, true) => RpcShape::Bidirectional,
        }
    }

    /// The HTTP/2 path of the method (`/package.Service/Method`).
    pub fn path(&self) -> String {
        format!(
            "/{}/{}",
            self.method.parent_service().full_name(),
            self.method.name()
        )
    }

    pub fn method_descriptor(&self) -> &MethodDescriptor {
        &self.method
    }
}

impl From<MethodDescriptor> for RpcDescriptor {
    fn from(method: MethodDescriptor) -> Self {
        Self::new(method)
    }
}

/// A generic wrapper for different types of Protobuf descriptors.
///
/// This enum allows the source to return a single type when resolving symbols,
/// regardless of whether the symbol points to a Service, a Message, or an Enum.
#[derive(Debug, Clone)]
pub enum Descriptor {
    MessageDescriptor(MessageDescriptor),
    ServiceDescriptor(ServiceDescriptor),
    EnumDescriptor(EnumDescriptor),
}

impl Descriptor {
    /// Returns the name (e.g.,`MyMessage`) of the inner descriptor
    pub fn name(&self) -> &str {
        match self {
            Descriptor::MessageDescriptor(v) => v.name(),
            Descriptor::ServiceDescriptor(v) => v.name(),
            Descriptor::EnumDescriptor(v) => v.name(),
        }
    }

    /// Returns the full_name (e.g.,`my.package.v1.MyMessage`) of the inner descriptor
    pub fn full_name(&self) -> &str {
        match self {
            Descriptor::MessageDescriptor(v) => v.full_name(),
            Descriptor::ServiceDescriptor(v) => v.full_name(),
            Descriptor::EnumDescriptor(v) => v.full_name(),
        }
    }
}

/// Resolves names into descriptors.
///
/// A `None` package or service means "nothing selected yet"; `Some("")` is the default
/// (empty) protobuf package.
pub trait DescriptorSource {
    /// Fully qualified names of every known service.
    fn service_names(&self) -> Vec<String>;

    /// Every package that declares at least one service.
    fn package_names(&self) -> Vec<String>;

    fn rpc(
        &self,
        package: Option<&str>,
        service: Option<&str>,
        name: &str,
    ) -> Result<RpcDescriptor, SourceError>;

    fn find_symbol(&self, fq_name: &str) -> Result<Descriptor, SourceError>;
}

/// Joins a package and a service name, omitting the separator for the default package.
pub fn fully_qualified_service_name(package: &str, service: &str) -> String {
    if package.is_empty() {
        service.to_string()
    } else {
        format!("{package}.{service}")
    }
}

/// Splits `package.Service.Method` at the last `.` into the service's fully qualified
/// name and the method name.
pub fn parse_fully_qualified_method_name(name: &str) -> Result<(String, String), SourceError> {
    match name.rsplit_once('.') {
        Some((service, method)) if !service.is_empty() && !method.is_empty() => {
            Ok((service.to_string(), method.to_string()))
        }
        _ => Err(SourceError::InvalidMethodName(name.to_string())),
    }
}
