//! # Pool Source
//!
//! A [`DescriptorSource`] backed by a local, in-memory `DescriptorPool`.
use super::{
    Descriptor, DescriptorSource, RpcDescriptor, SourceError, fully_qualified_service_name,
};
use prost_reflect::{DescriptorError, DescriptorPool};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct PoolSource {
    pool: DescriptorPool,
}

impl PoolSource {
    pub fn new(pool: DescriptorPool) -> Self {
        Self { pool }
    }

    /// Creates a source from a raw byte buffer containing an encoded `FileDescriptorSet`.
    ///
    /// # Returns
    ///
    /// * `Ok(PoolSource)` - The initialized source.
    /// * `Err(DescriptorError)` - If the bytes are not a valid descriptor set.
    pub fn decode(file_descriptor: &[u8]) -> Result<Self, DescriptorError> {
        let pool = DescriptorPool::decode(file_descriptor)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }

    fn has_package(&self, package: &str) -> bool {
        self.pool.files().any(|f| f.package_name() == package)
    }
}

impl DescriptorSource for PoolSource {
    fn service_names(&self) -> Vec<String> {
        self.pool
            .services()
            .map(|s| s.full_name().to_string())
            .collect()
    }

    fn package_names(&self) -> Vec<String> {
        self.pool
            .services()
            .map(|s| s.package_name().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn rpc(
        &self,
        package: Option<&str>,
        service: Option<&str>,
        name: &str,
    ) -> Result<RpcDescriptor, SourceError> {
        let package = package.ok_or(SourceError::PackageUnselected)?;
        let service = service.ok_or(SourceError::ServiceUnselected)?;

        if !self.has_package(package) {
            return Err(SourceError::UnknownPackage(package.to_string()));
        }

        let service_name = fully_qualified_service_name(package, service);

        self.pool
            .get_service_by_name(&service_name)
            .ok_or(SourceError::UnknownService(service_name))?
            .methods()
            .find(|m| m.name() == name)
            .map(RpcDescriptor::new)
            .ok_or_else(|| SourceError::UnknownRpc(name.to_string()))
    }

    fn find_symbol(&self, fq_name: &str) -> Result<Descriptor, SourceError> {
        if let Some(descriptor) = self.pool.get_service_by_name(fq_name) {
            return Ok(Descriptor::ServiceDescriptor(descriptor));
        }
        if let Some(descriptor) = self.pool.get_message_by_name(fq_name) {
            return Ok(Descriptor::MessageDescriptor(descriptor));
        }
        if let Some(descriptor) = self.pool.get_enum_by_name(fq_name) {
            return Ok(Descriptor::EnumDescriptor(descriptor));
        }
        Err(SourceError::UnknownSymbol(fq_name.to_string()))
    }
}
