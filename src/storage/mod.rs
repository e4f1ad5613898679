//! Storage providers behind the blob and table read paths.
//!
//! The gateway only ever talks to [`BlobStore`] and [`TableStore`]; the
//! Azure REST implementation and the in-memory one are interchangeable.

pub mod azure;
pub mod connection;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub use azure::AzureStorage;
pub use connection::{ConnectionString, ConnectionStringError, Credential};
pub use memory::MemoryStore;

pub const PARTITION_KEY: &str = "PartitionKey";
pub const ROW_KEY: &str = "RowKey";
pub const TIMESTAMP: &str = "Timestamp";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("resource not found")]
    NotFound,
    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("storage service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to authorize storage request: {0}")]
    Auth(String),
    #[error("unexpected storage response: {0}")]
    Decode(String),
}

/// Lazily produced blob names, in provider order.
pub type BlobNames<'a> = BoxStream<'a, Result<String, StorageError>>;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn container_exists(&self, container: &str) -> Result<bool, StorageError>;

    /// Names are fetched page by page as the stream is polled.
    fn list_blobs<'a>(&'a self, container: &'a str) -> BlobNames<'a>;
}

#[async_trait]
pub trait TableStore: Send + Sync {
    /// `Ok(None)` and `Err(StorageError::NotFound)` both mean "no such entity";
    /// providers report whichever is natural to them.
    async fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<TableEntity>, StorageError>;
}

/// A single table row as returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct TableEntity {
    pub partition_key: String,
    pub row_key: String,
    pub timestamp: DateTime<Utc>,
    pub properties: Map<String, Value>,
}

impl TableEntity {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            timestamp: Utc::now(),
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Split a flat JSON entity into its key fields and the remaining properties.
    /// OData annotations (`name@odata.type`) are dropped.
    pub fn from_json(value: Value) -> Result<Self, StorageError> {
        let Value::Object(mut fields) = value else {
            return Err(StorageError::Decode("entity is not a JSON object".into()));
        };

        let partition_key = take_string(&mut fields, PARTITION_KEY)?;
        let row_key = take_string(&mut fields, ROW_KEY)?;
        let raw_timestamp = take_string(&mut fields, TIMESTAMP)?;
        let timestamp = DateTime::parse_from_rfc3339(&raw_timestamp)
            .map_err(|e| StorageError::Decode(format!("invalid Timestamp '{raw_timestamp}': {e}")))?
            .with_timezone(&Utc);

        fields.retain(|name, _| !name.contains("@odata."));

        Ok(Self {
            partition_key,
            row_key,
            timestamp,
            properties: fields,
        })
    }
}

fn take_string(fields: &mut Map<String, Value>, name: &str) -> Result<String, StorageError> {
    match fields.remove(name) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(StorageError::Decode(format!("{name} is not a string: {other}"))),
        None => Err(StorageError::Decode(format!("entity has no {name}"))),
    }
}

/// Outcome of a single-entity lookup once provider quirks are normalized away.
#[derive(Debug)]
pub enum EntityLookup {
    Found(TableEntity),
    NotFound,
    ProviderError(String),
}

impl From<Result<Option<TableEntity>, StorageError>> for EntityLookup {
    fn from(result: Result<Option<TableEntity>, StorageError>) -> Self {
        match result {
            Ok(Some(entity)) => EntityLookup::Found(entity),
            Ok(None) | Err(StorageError::NotFound) => EntityLookup::NotFound,
            Err(e) => EntityLookup::ProviderError(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlobListing {
    pub container_name: String,
    pub blob_count: usize,
    pub blobs: Vec<String>,
}

impl BlobListing {
    pub fn new(container_name: impl Into<String>, blobs: Vec<String>) -> Self {
        Self {
            container_name: container_name.into(),
            blob_count: blobs.len(),
            blobs,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableEntityView {
    pub table_name: String,
    pub partition_key: String,
    pub row_key: String,
    pub timestamp: DateTime<Utc>,
    pub properties: Map<String, Value>,
}

impl TableEntityView {
    pub fn new(table_name: impl Into<String>, entity: TableEntity) -> Self {
        Self {
            table_name: table_name.into(),
            partition_key: entity.partition_key,
            row_key: entity.row_key,
            timestamp: entity.timestamp,
            properties: entity.properties,
        }
    }
}
