// src/services/storage_gateway.rs
use std::{fmt::Debug, sync::Arc};

use futures::TryStreamExt;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::storage::{
    AzureStorage, BlobListing, BlobStore, ConnectionString, ConnectionStringError, EntityLookup,
    StorageError, TableEntityView, TableStore,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Storage connection string not configured")]
    NotConfigured,
    #[error("Container '{0}' not found")]
    ContainerNotFound(String),
    #[error("Entity not found with PartitionKey: {partition_key}, RowKey: {row_key}")]
    EntityNotFound {
        partition_key: String,
        row_key: String,
    },
    #[error("Error: {0}")]
    Provider(String),
}

impl From<StorageError> for GatewayError {
    fn from(e: StorageError) -> Self {
        GatewayError::Provider(e.to_string())
    }
}

/// Read-only access to blob and table storage, translated into the
/// HTTP-facing result shapes.
#[derive(Clone, Default)]
pub struct StorageGateway {
    blobs: Option<Arc<dyn BlobStore>>,
    tables: Option<Arc<dyn TableStore>>,
}

impl Debug for StorageGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageGateway")
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl StorageGateway {
    pub fn new(blobs: Arc<dyn BlobStore>, tables: Arc<dyn TableStore>) -> Self {
        Self {
            blobs: Some(blobs),
            tables: Some(tables),
        }
    }

    /// Every storage call answers with [`GatewayError::NotConfigured`].
    pub fn unconfigured() -> Self {
        Self::default()
    }

    /// Build an Azure-backed gateway; `None` or a blank string yields an
    /// unconfigured gateway.
    pub fn from_connection_string(raw: Option<&str>) -> Result<Self, ConnectionStringError> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => {
                let azure = Arc::new(AzureStorage::new(ConnectionString::parse(raw)?));
                Ok(Self::new(azure.clone(), azure))
            }
            None => Ok(Self::unconfigured()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.blobs.is_some() && self.tables.is_some()
    }

    pub async fn list_blobs(&self, container: &str) -> Result<BlobListing, GatewayError> {
        let Some(blobs) = &self.blobs else {
            error!(container, "blob listing requested but storage is not configured");
            return Err(GatewayError::NotConfigured);
        };

        info!(container, "listing blobs");
        let not_found = || {
            warn!(container, "container not found");
            GatewayError::ContainerNotFound(container.to_string())
        };

        match blobs.container_exists(container).await {
            Ok(true) => {}
            Ok(false) | Err(StorageError::NotFound) => return Err(not_found()),
            Err(e) => return Err(provider_failure("listing blobs", container, e)),
        }

        // Drained in full; no cap on listing size.
        let names = match blobs.list_blobs(container).try_collect::<Vec<String>>().await {
            Ok(names) => names,
            Err(StorageError::NotFound) => return Err(not_found()),
            Err(e) => return Err(provider_failure("listing blobs", container, e)),
        };

        info!(container, count = names.len(), "listed blobs");
        Ok(BlobListing::new(container, names))
    }

    /// Fetch one entity with "not found" normalized across provider behaviors.
    pub async fn lookup_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<EntityLookup, GatewayError> {
        let Some(tables) = &self.tables else {
            error!(table, "table lookup requested but storage is not configured");
            return Err(GatewayError::NotConfigured);
        };
        Ok(tables.get_entity(table, partition_key, row_key).await.into())
    }

    pub async fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<TableEntityView, GatewayError> {
        info!(table, partition_key, row_key, "reading table entity");

        match self.lookup_entity(table, partition_key, row_key).await? {
            EntityLookup::Found(entity) => {
                info!(table, "retrieved entity");
                Ok(TableEntityView::new(table, entity))
            }
            EntityLookup::NotFound => {
                warn!(table, partition_key, row_key, "entity not found");
                Err(GatewayError::EntityNotFound {
                    partition_key: partition_key.to_string(),
                    row_key: row_key.to_string(),
                })
            }
            EntityLookup::ProviderError(message) => {
                error!(table, error = %message, "error retrieving entity");
                Err(GatewayError::Provider(message))
            }
        }
    }
}

fn provider_failure(action: &str, resource: &str, e: StorageError) -> GatewayError {
    error!(resource, error = %e, "storage provider failed while {action}");
    e.into()
}
