use copilot_starter::routes::create_router;
use copilot_starter::services::storage_gateway::{GatewayError, StorageGateway};
use copilot_starter::state::AppState;
use copilot_starter::storage::{
    BlobNames, BlobStore, EntityLookup, MemoryStore, StorageError, TableEntity, TableStore,
};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::{StreamExt, stream};
use std::sync::Arc;
use tower::util::ServiceExt;

async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.put_container("docs", ["b.txt", "a.txt"]).await;
    store.put_container("empty", Vec::<String>::new()).await;
    store
        .put_entity(
            "people",
            TableEntity::new("staff", "001")
                .with_property("Name", "Ada")
                .with_property("Active", true),
        )
        .await;
    store
}

async fn app_with(gateway: StorageGateway) -> Router {
    create_router("public").with_state(Arc::new(AppState::new(gateway)))
}

async fn seeded_app() -> Router {
    let store = seeded_store().await;
    app_with(StorageGateway::new(store.clone(), store)).await
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

/// Provider that reports a missing entity as a fault and fails everything else.
struct FaultyStore;

#[async_trait]
impl BlobStore for FaultyStore {
    async fn container_exists(&self, _container: &str) -> Result<bool, StorageError> {
        Ok(true)
    }

    fn list_blobs<'a>(&'a self, _container: &'a str) -> BlobNames<'a> {
        stream::iter(vec![
            Ok("first".to_string()),
            Err(StorageError::Decode("truncated page".into())),
        ])
        .boxed()
    }
}

#[async_trait]
impl TableStore for FaultyStore {
    async fn get_entity(
        &self,
        _table: &str,
        _partition_key: &str,
        row_key: &str,
    ) -> Result<Option<TableEntity>, StorageError> {
        match row_key {
            "missing" => Err(StorageError::NotFound),
            _ => Err(StorageError::Auth("signature mismatch".into())),
        }
    }
}

#[tokio::test]
async fn test_list_blobs() {
    let (status, body) = get(seeded_app().await, "/api/blobs/docs").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["containerName"], "docs");
    assert_eq!(json["blobCount"], 2);

    // Provider order, not sorted.
    assert_eq!(json["blobs"], serde_json::json!(["b.txt", "a.txt"]));
}

#[tokio::test]
async fn test_list_empty_container() {
    let (status, body) = get(seeded_app().await, "/api/blobs/empty").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["blobCount"], 0);
    assert_eq!(json["blobs"], serde_json::json!([]));
}

#[tokio::test]
async fn test_missing_container_is_not_found() {
    let (status, body) = get(seeded_app().await, "/api/blobs/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn test_get_entity() {
    let (status, body) = get(seeded_app().await, "/api/table/people/staff/001").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["tableName"], "people");
    assert_eq!(json["partitionKey"], "staff");
    assert_eq!(json["rowKey"], "001");
    assert!(json["timestamp"].is_string());
    assert_eq!(json["properties"]["Name"], "Ada");
    assert_eq!(json["properties"]["Active"], true);
    assert!(json["properties"].get("PartitionKey").is_none());
}

#[tokio::test]
async fn test_missing_entity_is_not_found() {
    let (status, body) = get(seeded_app().await, "/api/table/people/staff/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("999"));
}

#[tokio::test]
async fn test_unconfigured_storage_is_server_error() {
    let app = app_with(StorageGateway::unconfigured()).await;

    let (status, body) = get(app.clone(), "/api/blobs/docs").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "Storage connection string not configured");

    let (status, _) = get(app, "/api/table/people/staff/001").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_provider_faults() {
    let faulty = Arc::new(FaultyStore);
    let app = app_with(StorageGateway::new(faulty.clone(), faulty)).await;

    let (status, body) = get(app.clone(), "/api/blobs/docs").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("truncated page"));

    let (status, _) = get(app.clone(), "/api/table/people/staff/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = get(app, "/api/table/people/staff/001").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("signature mismatch"));
}

#[tokio::test]
async fn test_gateway_lookup_variants() {
    let store = seeded_store().await;
    let gateway = StorageGateway::new(store.clone(), store);

    assert!(matches!(
        gateway.lookup_entity("people", "staff", "001").await,
        Ok(EntityLookup::Found(_))
    ));
    assert!(matches!(
        gateway.lookup_entity("people", "staff", "002").await,
        Ok(EntityLookup::NotFound)
    ));
    assert_eq!(
        StorageGateway::unconfigured()
            .lookup_entity("people", "staff", "001")
            .await
            .unwrap_err(),
        GatewayError::NotConfigured
    );
}

#[test]
fn test_gateway_from_connection_string() {
    assert!(!StorageGateway::from_connection_string(None).unwrap().is_configured());
    assert!(!StorageGateway::from_connection_string(Some(" ")).unwrap().is_configured());
    assert!(
        StorageGateway::from_connection_string(Some("UseDevelopmentStorage=true"))
            .unwrap()
            .is_configured()
    );
    assert!(StorageGateway::from_connection_string(Some("AccountName=x")).is_err());
}
