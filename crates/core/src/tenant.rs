//! Tenants and the search service they are provisioned on.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::id::TenantId;

/// Location of a tenant's search index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchTarget {
    pub endpoint: String,
    pub index_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub search_service_endpoint: String,
    pub index_name: String,
    /// Total size of the tenant's live documents, maintained by storage accounting.
    #[serde(default)]
    pub document_storage_bytes: u64,
}

impl Tenant {
    pub fn new(
        name: impl Into<String>,
        search_service_endpoint: impl Into<String>,
        index_name: impl Into<String>,
    ) -> Self {
        Self {
            id: TenantId::new(),
            name: name.into(),
            search_service_endpoint: search_service_endpoint.into(),
            index_name: index_name.into(),
            document_storage_bytes: 0,
        }
    }

    pub fn search_target(&self) -> SearchTarget {
        SearchTarget {
            endpoint: self.search_service_endpoint.clone(),
            index_name: self.index_name.clone(),
        }
    }
}

impl Entity for Tenant {
    type Id = TenantId;

    fn id(&self) -> TenantId {
        self.id
    }
}
