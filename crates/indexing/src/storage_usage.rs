//! Per-tenant document storage accounting.

use tracing::{info, instrument};

use ragworks_core::DocumentStatus;

use crate::error::IndexingError;
use crate::messages::CalculateStorageUsageMessage;
use crate::services::IndexingServices;

pub struct CalculateStorageUsage {
    services: IndexingServices,
}

impl CalculateStorageUsage {
    pub fn new(services: IndexingServices) -> Self {
        Self { services }
    }

    /// Recompute and persist the tenant's storage total. Returns the new total in bytes.
    #[instrument(skip(self, message), fields(tenant_id = %message.tenant_id))]
    pub fn execute(&self, message: &CalculateStorageUsageMessage) -> Result<u64, IndexingError> {
        let services = &self.services;
        let mut tenant = services.load_tenant(message.tenant_id)?;

        let total: u64 = services
            .documents
            .find_by_tenant_id(tenant.id)?
            .iter()
            .filter(|document| document.status != DocumentStatus::Deleting)
            .map(|document| document.file_size)
            .sum();

        if tenant.document_storage_bytes != total {
            tenant.document_storage_bytes = total;
            services.tenants.update(&tenant)?;
        }

        info!(bytes = total, "storage usage recalculated");
        Ok(total)
    }
}
