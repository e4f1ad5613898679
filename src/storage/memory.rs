use std::collections::HashMap;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use tokio::sync::RwLock;

use super::{BlobNames, BlobStore, StorageError, TableEntity, TableStore};

type EntityKey = (String, String, String);

/// In-process provider, handy for tests and local demos.
#[derive(Debug, Default)]
pub struct MemoryStore {
    containers: RwLock<HashMap<String, Vec<String>>>,
    entities: RwLock<HashMap<EntityKey, TableEntity>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a container holding `blobs` in the given order.
    pub async fn put_container<I, S>(&self, name: &str, blobs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let blobs = blobs.into_iter().map(Into::into).collect();
        self.containers.write().await.insert(name.to_string(), blobs);
    }

    pub async fn put_entity(&self, table: &str, entity: TableEntity) {
        let key = (
            table.to_string(),
            entity.partition_key.clone(),
            entity.row_key.clone(),
        );
        self.entities.write().await.insert(key, entity);
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn container_exists(&self, container: &str) -> Result<bool, StorageError> {
        Ok(self.containers.read().await.contains_key(container))
    }

    fn list_blobs<'a>(&'a self, container: &'a str) -> BlobNames<'a> {
        stream::once(async move {
            let items: Vec<Result<String, StorageError>> =
                match self.containers.read().await.get(container) {
                    Some(names) => names.iter().cloned().map(Ok).collect(),
                    None => vec![Err(StorageError::NotFound)],
                };
            stream::iter(items)
        })
        .flatten()
        .boxed()
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<TableEntity>, StorageError> {
        let key = (table.to_string(), partition_key.to_string(), row_key.to_string());
        Ok(self.entities.read().await.get(&key).cloned())
    }
}
