//! Search index composed with the content stores over the bus
//!
//! search → candidate keys → batchGet on whichever store owns them →
//! compacted entities.

use std::sync::Arc;

use oddstore::constants::{CMD_INDEX, CMD_QUERY, CMD_SET};
use oddstore::store::{register_catalog_store, search, DynamoStore, SearchIndexStore, SimDynamoClient};
use oddstore::{Bus, Pattern, StoreConfig, StoreError, StoreService};
use serde_json::{json, Value};

async fn seeded_service() -> StoreService {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("oddstore=debug")
        .with_test_writer()
        .try_init();

    let service = StoreService::start(StoreConfig::default()).await.unwrap();
    service
        .seed(vec![
            json!({"type": "channel", "id": "oddnews", "title": "Odd News"}),
            json!({"type": "video", "id": "v1", "channel": "oddnews", "title": "Rocket launch", "description": "Liftoff"}),
            json!({"type": "video", "id": "v2", "channel": "oddnews", "title": "Launch recap"}),
            json!({"type": "collection", "id": "c1", "channel": "oddnews", "title": "Rocket week"}),
            json!({"type": "video", "id": "v9", "channel": "other", "title": "Rocket launch"}),
        ])
        .await
        .unwrap();
    service
}

async fn search_ids(service: &StoreService, args: Value) -> Vec<String> {
    let found = service
        .bus()
        .query(&Pattern::store(CMD_QUERY), args)
        .await
        .unwrap();
    found
        .as_array()
        .cloned()
        .unwrap_or_default()
        .iter()
        .filter_map(|r| r["id"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn test_ranked_and_materialized_in_channel() {
    let service = seeded_service().await;

    // v1 matches both tokens; v2 and c1 one each, in index order.
    let ids = search_ids(&service, json!({"query": "rocket launch", "channel": "oddnews"})).await;
    assert_eq!(ids, vec!["v1", "v2", "c1"]);

    // v9 is a candidate but lives in another channel, so batchGet drops it.
    assert!(!ids.contains(&"v9".to_string()));
}

#[tokio::test]
async fn test_type_filter() {
    let service = seeded_service().await;
    let ids = search_ids(
        &service,
        json!({"query": "rocket", "type": "collection", "channel": "oddnews"}),
    )
    .await;
    assert_eq!(ids, vec!["c1"]);
}

#[tokio::test]
async fn test_materialized_records_are_full_entities() {
    let service = seeded_service().await;
    let found = service
        .bus()
        .query(&Pattern::store(CMD_QUERY), json!({"query": "liftoff", "channel": "oddnews"}))
        .await
        .unwrap();
    assert_eq!(found[0]["title"], json!("Rocket launch"));
    assert_eq!(found[0]["type"], json!("video"));
}

#[tokio::test]
async fn test_empty_text_unindexes() {
    let service = seeded_service().await;
    service
        .bus()
        .command(&Pattern::store(CMD_INDEX).with_type("video"), json!({"id": "v2", "text": ""}))
        .await
        .unwrap();

    let ids = search_ids(&service, json!({"query": "recap", "channel": "oddnews"})).await;
    assert!(ids.is_empty());
}

#[tokio::test]
async fn test_query_parameter_errors() {
    let service = seeded_service().await;
    let err = service
        .bus()
        .query(&Pattern::store(CMD_QUERY), json!({"type": "video"}))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::MissingParameter { .. }));

    let err = service
        .bus()
        .command(&Pattern::store(CMD_INDEX).with_type("video"), json!({"id": "v1", "text": 7}))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidParameter { .. }));
}

#[tokio::test]
async fn test_store_scoped_target() {
    // The index materializes through the DynamoDB store by name.
    let bus = Bus::new();
    let types = vec!["video".to_string()];

    let primary_client = SimDynamoClient::new();
    let primary = DynamoStore::new(Arc::new(primary_client.clone()));
    primary_client.create_table(primary.table_schema("video"));
    register_catalog_store(&bus, Arc::new(primary), &types, 10).await;

    let index = Arc::new(SearchIndexStore::new(&types).with_target_store("dynamodb"));
    search::register(&bus, Arc::clone(&index)).await;

    bus.command(
        &Pattern::store(CMD_SET).with_type("video"),
        json!({"id": "v1", "channel": "oddnews", "title": "Launch"}),
    )
    .await
    .unwrap();
    // Indexing can ride a fire-and-forget command.
    bus.send(
        Pattern::store(CMD_INDEX).with_type("video"),
        json!({"id": "v1", "text": "Launch"}),
    )
    .await
    .unwrap();

    let found = bus
        .query(&Pattern::store(CMD_QUERY), json!({"query": "launch", "channel": "oddnews"}))
        .await
        .unwrap();
    assert_eq!(found.as_array().map(Vec::len), Some(1));
}

#[test]
fn test_search_without_catalog_store_is_no_handler() {
    tokio_test::block_on(async {
        let config = StoreConfig {
            backend: oddstore::BackendKind::Memory,
            ..StoreConfig::default()
        };
        let service = StoreService::start(config).await.unwrap();
        service
            .seed(vec![json!({"type": "video", "id": "v1", "channel": "oddnews", "title": "Launch"})])
            .await
            .unwrap();

        let err = service
            .bus()
            .query(&Pattern::store(CMD_QUERY), json!({"query": "launch"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NoHandler { .. }));
    });
}
