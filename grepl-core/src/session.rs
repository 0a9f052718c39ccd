//! # Session
//!
//! A [`Session`] bundles everything a call needs: where descriptors come from, the
//! transport, the filler producing requests, the presenter rendering responses, the
//! outgoing headers and the current package/service selection. Independent sessions can
//! coexist; nothing is process-wide.
//!
//! ## Example
//!
//! ```rust,no_run
//! use grepl_core::{
//!     descriptor::PoolSource,
//!     fill::JsonFiller,
//!     grpc::client::GrpcClient,
//!     present::JsonPresenter,
//!     session::Session,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let source = PoolSource::decode(&std::fs::read("descriptor.bin")?)?;
//! let client = GrpcClient::connect("http://localhost:50051").await?;
//! let filler = JsonFiller::new(std::io::stdin());
//!
//! let mut session = Session::new(source, client, filler, JsonPresenter::new());
//! session.use_package("helloworld")?;
//! session.use_service("Greeter")?;
//! session.headers_mut().add("x-request-id", "42")?;
//!
//! let token = CancellationToken::new();
//! session.call_rpc(&token, &mut std::io::stdout(), "SayHello").await?;
//! # Ok(())
//! # }
//! ```
use crate::{
    call::{CallContext, CallError, call_rpc, transport::Client},
    descriptor::{
        DescriptorSource, RpcDescriptor, SourceError, fully_qualified_service_name,
        parse_fully_qualified_method_name,
    },
    fill::Fill,
    header::Headers,
    present::Presenter,
};
use std::{io::Write, sync::Arc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub struct Session<D, C, F, P> {
    source: D,
    client: C,
    filler: Arc<Mutex<F>>,
    presenter: P,
    headers: Headers,
    package: Option<String>,
    service: Option<String>,
}

impl<D, C, F, P> Session<D, C, F, P>
where
    D: DescriptorSource,
    C: Client,
    F: Fill + Send + 'static,
    P: Presenter,
{
    pub fn new(source: D, client: C, filler: F, presenter: P) -> Self {
        Self {
            source,
            client,
            filler: Arc::new(Mutex::new(filler)),
            presenter,
            headers: Headers::new(),
            package: None,
            service: None,
        }
    }

    pub fn source(&self) -> &D {
        &self.source
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    /// Selects a package. Any previously selected service is cleared.
    pub fn use_package(&mut self, package: &str) -> Result<(), SourceError> {
        if !self.source.package_names().iter().any(|p| p == package) {
            return Err(SourceError::UnknownPackage(package.to_string()));
        }
        self.package = Some(package.to_string());
        self.service = None;
        Ok(())
    }

    /// Selects a service of the current package.
    pub fn use_service(&mut self, service: &str) -> Result<(), SourceError> {
        let package = self
            .package
            .as_deref()
            .ok_or(SourceError::PackageUnselected)?;
        let service_name = fully_qualified_service_name(package, service);

        if !self.source.service_names().contains(&service_name) {
            return Err(SourceError::UnknownService(service_name));
        }
        self.service = Some(service.to_string());
        Ok(())
    }

    /// Resolves `name`, either a method of the selected service or a fully qualified
    /// `package.Service.Method`.
    pub fn resolve(&self, name: &str) -> Result<RpcDescriptor, SourceError> {
        if !name.contains('.') {
            return self
                .source
                .rpc(self.package.as_deref(), self.service.as_deref(), name);
        }

        let (service_name, method) = parse_fully_qualified_method_name(name)?;
        let (package, service) = service_name
            .rsplit_once('.')
            .unwrap_or(("", service_name.as_str()));

        self.source.rpc(Some(package), Some(service), &method)
    }

    /// Calls the RPC named `rpc_name`, filling its request(s) with the session's filler
    /// and writing every formatted response to `out`.
    pub async fn call_rpc<W: Write>(
        &mut self,
        token: &CancellationToken,
        out: &mut W,
        rpc_name: &str,
    ) -> Result<(), CallError> {
        let rpc = self.resolve(rpc_name)?;
        let metadata = self.headers.to_metadata()?;

        let ctx = CallContext {
            client: &mut self.client,
            filler: &self.filler,
            presenter: &self.presenter,
            metadata,
            token,
        };

        call_rpc(ctx, &rpc, out).await
    }
}
