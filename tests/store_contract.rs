//! Store contract tests, run through the bus against every full backend
//!
//! Each property runs against DynamoDB (promise and callback clients) and
//! Riak. The memory adapter covers what its reduced contract offers.

use oddstore::constants::{CMD_BATCH_GET, CMD_GET, CMD_REMOVE, CMD_SCAN, CMD_SET};
use oddstore::{BackendKind, DynamoClientShape, Pattern, StoreConfig, StoreError, StoreService};
use serde_json::{json, Value};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("oddstore=debug")
        .with_test_writer()
        .try_init();
}

async fn full_backends() -> Vec<(&'static str, StoreService)> {
    init_logging();
    let configs = [
        ("dynamodb-promise", BackendKind::Dynamodb, DynamoClientShape::Promise),
        ("dynamodb-callback", BackendKind::Dynamodb, DynamoClientShape::Callback),
        ("riak", BackendKind::Riak, DynamoClientShape::Promise),
    ];

    let mut services = Vec::new();
    for (name, backend, shape) in configs {
        let config = StoreConfig {
            backend,
            dynamo_client_shape: shape,
            ..StoreConfig::default()
        };
        services.push((name, StoreService::start(config).await.unwrap()));
    }
    services
}

async fn memory_backend() -> StoreService {
    init_logging();
    let config = StoreConfig {
        backend: BackendKind::Memory,
        ..StoreConfig::default()
    };
    StoreService::start(config).await.unwrap()
}

async fn set(service: &StoreService, entity_type: &str, payload: Value) -> Result<Value, StoreError> {
    service
        .bus()
        .command(&Pattern::store(CMD_SET).with_type(entity_type), payload)
        .await
}

async fn get(service: &StoreService, entity_type: &str, args: Value) -> Result<Value, StoreError> {
    service
        .bus()
        .query(&Pattern::store(CMD_GET).with_type(entity_type), args)
        .await
}

async fn scan(service: &StoreService, entity_type: &str, args: Value) -> Vec<Value> {
    let found = service
        .bus()
        .query(&Pattern::store(CMD_SCAN).with_type(entity_type), args)
        .await
        .unwrap();
    found.as_array().cloned().unwrap_or_default()
}

fn ids(records: &[Value]) -> Vec<&str> {
    records.iter().filter_map(|r| r["id"].as_str()).collect()
}

// =============================================================================
// Round trip
// =============================================================================

#[tokio::test]
async fn test_round_trip_preserves_every_field() {
    let mut services = full_backends().await;
    services.push(("memory", memory_backend().await));

    for (name, service) in &services {
        let input = json!({
            "type": "video",
            "channel": "oddnews",
            "title": "Launch",
            "duration": 120,
            "rating": 4.5,
            "tags": ["space", "news"],
            "meta": {"live": false, "poster": null},
            "relationships": {
                "collection": {"type": "collection", "id": "c1"},
                "related": [{"type": "video", "id": "v2"}, {"type": "video", "id": "v3"}]
            }
        });

        let stored = set(service, "video", input.clone()).await.unwrap();
        let id = stored["id"].as_str().expect("assigned id").to_string();
        let mut expected = input.clone();
        expected["id"] = json!(id);
        assert_eq!(stored, expected, "{name}");

        let args = json!({"id": id, "channel": "oddnews"});
        let fetched = get(service, "video", args.clone()).await.unwrap();
        assert_eq!(fetched, expected, "{name}");

        // A second cycle keeps the id and every field.
        let again = set(service, "video", fetched).await.unwrap();
        assert_eq!(again["id"], json!(id), "{name}");
        assert_eq!(get(service, "video", args).await.unwrap(), expected, "{name}");
    }
}

#[tokio::test]
async fn test_set_is_full_replace() {
    for (name, service) in full_backends().await {
        set(&service, "video", json!({"id": "v1", "channel": "oddnews", "title": "A", "extra": 1}))
            .await
            .unwrap();
        set(&service, "video", json!({"id": "v1", "channel": "oddnews", "title": "B"}))
            .await
            .unwrap();

        let fetched = get(&service, "video", json!({"id": "v1", "channel": "oddnews"}))
            .await
            .unwrap();
        assert_eq!(fetched["title"], json!("B"), "{name}");
        assert!(fetched.get("extra").is_none(), "{name}");
    }
}

#[tokio::test]
async fn test_missing_record_is_null() {
    let mut services = full_backends().await;
    services.push(("memory", memory_backend().await));

    for (name, service) in &services {
        let found = get(service, "video", json!({"id": "nope", "channel": "oddnews"}))
            .await
            .unwrap();
        assert_eq!(found, Value::Null, "{name}");
    }
}

// =============================================================================
// Channel requirement
// =============================================================================

#[tokio::test]
async fn test_channel_required_except_for_channels() {
    let mut services = full_backends().await;
    services.push(("memory", memory_backend().await));

    for (name, service) in &services {
        let err = set(service, "video", json!({"title": "x"})).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingParameter { .. }), "{name}: {err}");

        let err = set(service, "video", json!({"title": "x", "channel": 42})).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidParameter { .. }), "{name}: {err}");

        let err = get(service, "video", json!({"id": "v1"})).await.unwrap_err();
        assert!(err.is_client_error(), "{name}: {err}");

        let stored = set(service, "channel", json!({"id": "oddnews"})).await.unwrap();
        assert_eq!(stored["id"], json!("oddnews"), "{name}");
        let found = get(service, "channel", json!({"id": "oddnews"})).await.unwrap();
        assert_eq!(found["id"], json!("oddnews"), "{name}");
    }
}

#[tokio::test]
async fn test_reserved_separator_rejected() {
    for (name, service) in full_backends().await {
        let err = set(&service, "video", json!({"id": "a:b", "channel": "oddnews"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidParameter { .. }), "{name}");
    }
}

// =============================================================================
// Scan
// =============================================================================

#[tokio::test]
async fn test_scan_default_and_limit() {
    for (name, service) in full_backends().await {
        for n in 0..20 {
            set(&service, "video", json!({"id": format!("v{n:02}"), "channel": "oddnews"}))
                .await
                .unwrap();
        }

        assert_eq!(scan(&service, "video", json!({"channel": "oddnews"})).await.len(), 10, "{name}");
        assert_eq!(scan(&service, "video", json!({"channel": "oddnews", "limit": 3})).await.len(), 3, "{name}");
        assert_eq!(scan(&service, "video", json!({"channel": "oddnews", "limit": 20})).await.len(), 20, "{name}");

        // Same snapshot, same order.
        let first = scan(&service, "video", json!({"channel": "oddnews", "limit": 20})).await;
        let second = scan(&service, "video", json!({"channel": "oddnews", "limit": 20})).await;
        assert_eq!(ids(&first), ids(&second), "{name}");
    }
}

#[tokio::test]
async fn test_scan_channel_isolation() {
    for (name, service) in full_backends().await {
        for n in 0..4 {
            set(&service, "video", json!({"id": format!("a{n}"), "channel": "A"}))
                .await
                .unwrap();
        }
        set(&service, "video", json!({"id": "b0", "channel": "B"})).await.unwrap();

        let in_b = scan(&service, "video", json!({"channel": "B", "limit": 100})).await;
        assert_eq!(ids(&in_b), vec!["b0"], "{name}");
        assert!(in_b.iter().all(|r| r["channel"] == json!("B")), "{name}");
    }
}

#[tokio::test]
async fn test_remove_then_scan() {
    for (name, service) in full_backends().await {
        for id in ["v1", "v2", "v3"] {
            set(&service, "video", json!({"id": id, "channel": "oddnews"})).await.unwrap();
        }
        assert_eq!(scan(&service, "video", json!({"channel": "oddnews"})).await.len(), 3, "{name}");

        let pattern = Pattern::store(CMD_REMOVE).with_type("video");
        let removed = service
            .bus()
            .command(&pattern, json!({"id": "v2", "channel": "oddnews"}))
            .await
            .unwrap();
        assert_eq!(removed, json!(true), "{name}");
        let again = service
            .bus()
            .command(&pattern, json!({"id": "v2", "channel": "oddnews"}))
            .await
            .unwrap();
        assert_eq!(again, json!(false), "{name}");

        let remaining = scan(&service, "video", json!({"channel": "oddnews"})).await;
        assert_eq!(remaining.len(), 2, "{name}");
        assert!(!ids(&remaining).contains(&"v2"), "{name}");
        let gone = get(&service, "video", json!({"id": "v2", "channel": "oddnews"})).await.unwrap();
        assert_eq!(gone, Value::Null, "{name}");
    }
}

#[tokio::test]
async fn test_scan_channels_without_channel() {
    for (name, service) in full_backends().await {
        for id in ["c1", "c2"] {
            set(&service, "channel", json!({"id": id})).await.unwrap();
        }
        assert_eq!(scan(&service, "channel", json!({})).await.len(), 2, "{name}");
    }
}

// =============================================================================
// Batch get
// =============================================================================

#[tokio::test]
async fn test_batch_get_tolerates_bad_keys() {
    for (name, service) in full_backends().await {
        for id in ["v1", "v2", "v3"] {
            set(&service, "video", json!({"id": id, "channel": "oddnews"})).await.unwrap();
        }

        let keys = json!([
            {"type": "video", "id": "v3"},
            {"type": "video", "id": "missing"},
            {"type": "video", "id": "v1"},
            {"type": "promotion", "id": "v2"},
            {"type": "video", "id": "v2"}
        ]);
        let found = service
            .bus()
            .query(&Pattern::store(CMD_BATCH_GET), json!({"channel": "oddnews", "keys": keys}))
            .await
            .unwrap();
        let found = found.as_array().cloned().unwrap_or_default();
        assert_eq!(ids(&found), vec!["v3", "v1", "v2"], "{name}");
    }
}

#[tokio::test]
async fn test_batch_get_drops_malformed_keys() {
    for (name, service) in full_backends().await {
        for id in ["v1", "v2"] {
            set(&service, "video", json!({"id": id, "channel": "oddnews"})).await.unwrap();
        }

        let keys = json!([
            {"type": "video", "id": "v1"},
            {"type": "video", "id": 42},
            {"type": "video"},
            {"id": "v2"},
            {"type": ["video"], "id": "v2"},
            "video/v2",
            null,
            {"type": "video", "id": "v2"}
        ]);
        let found = service
            .bus()
            .query(&Pattern::store(CMD_BATCH_GET), json!({"channel": "oddnews", "keys": keys}))
            .await
            .unwrap();
        let found = found.as_array().cloned().unwrap_or_default();
        assert_eq!(ids(&found), vec!["v1", "v2"], "{name}");
    }
}

#[tokio::test]
async fn test_batch_get_accepts_large_batches() {
    for (name, service) in full_backends().await {
        for id in ["v1", "v2", "v3"] {
            set(&service, "video", json!({"id": id, "channel": "oddnews"})).await.unwrap();
        }

        let mut keys: Vec<Value> = (0..600)
            .map(|n| json!({"type": "video", "id": format!("absent{n}")}))
            .collect();
        for id in ["v1", "v2", "v3"] {
            keys.push(json!({"type": "video", "id": id}));
        }
        let found = service
            .bus()
            .query(&Pattern::store(CMD_BATCH_GET), json!({"channel": "oddnews", "keys": keys}))
            .await
            .unwrap();
        let found = found.as_array().cloned().unwrap_or_default();
        assert_eq!(ids(&found), vec!["v1", "v2", "v3"], "{name}");
    }
}

#[tokio::test]
async fn test_batch_get_rejects_non_sequence_keys() {
    for (name, service) in full_backends().await {
        let err = service
            .bus()
            .query(&Pattern::store(CMD_BATCH_GET), json!({"channel": "oddnews", "keys": "v1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidParameter { .. }), "{name}");
    }
}

#[tokio::test]
async fn test_store_scoped_and_channel_batch_get() {
    for (name, service) in full_backends().await {
        for id in ["c1", "c2"] {
            set(&service, "channel", json!({"id": id})).await.unwrap();
        }
        let store = if name == "riak" { "riak" } else { "dynamodb" };

        let scoped = service
            .bus()
            .query(
                &Pattern::store(CMD_BATCH_GET).with_store(store),
                json!({"keys": [{"type": "channel", "id": "c2"}]}),
            )
            .await
            .unwrap();
        assert_eq!(scoped.as_array().map(Vec::len), Some(1), "{name}");

        // The channel variant takes keys without a type.
        let channels = service
            .bus()
            .query(
                &Pattern::store(CMD_BATCH_GET).with_type("channel"),
                json!({"keys": [{"id": "c1"}, {"id": "gone"}, {"id": "c2"}]}),
            )
            .await
            .unwrap();
        let channels = channels.as_array().cloned().unwrap_or_default();
        assert_eq!(ids(&channels), vec!["c1", "c2"], "{name}");
    }
}

// =============================================================================
// Relationships
// =============================================================================

#[tokio::test]
async fn test_include_expands_resolvable_references() {
    for (name, service) in full_backends().await {
        set(&service, "collection", json!({"id": "c1", "channel": "oddnews", "title": "Space"}))
            .await
            .unwrap();
        set(
            &service,
            "video",
            json!({
                "id": "v1",
                "channel": "oddnews",
                "relationships": {
                    "collections": [
                        {"type": "collection", "id": "c1"},
                        {"type": "collection", "id": "nope"}
                    ]
                }
            }),
        )
        .await
        .unwrap();

        let fetched = get(
            &service,
            "video",
            json!({"id": "v1", "channel": "oddnews", "include": ["collections"]}),
        )
        .await
        .unwrap();
        let included = fetched["included"].as_array().cloned().unwrap_or_default();
        assert_eq!(ids(&included), vec!["c1"], "{name}");
        assert_eq!(included[0]["title"], json!("Space"), "{name}");

        let unrelated = get(
            &service,
            "video",
            json!({"id": "v1", "channel": "oddnews", "include": ["promotions"]}),
        )
        .await
        .unwrap();
        assert_eq!(unrelated["included"], json!([]), "{name}");

        // Expansion is never stored.
        let plain = get(&service, "video", json!({"id": "v1", "channel": "oddnews"})).await.unwrap();
        assert!(plain.get("included").is_none(), "{name}");
    }
}

#[tokio::test]
async fn test_include_single_reference_and_channel_relations() {
    for (name, service) in full_backends().await {
        set(&service, "collection", json!({"id": "c1", "channel": "oddnews", "title": "Space"}))
            .await
            .unwrap();
        set(
            &service,
            "video",
            json!({
                "id": "v1",
                "channel": "oddnews",
                "relationships": {"collection": {"type": "collection", "id": "c1"}}
            }),
        )
        .await
        .unwrap();
        set(
            &service,
            "channel",
            json!({
                "id": "oddnews",
                "relationships": {"featured": {"type": "collection", "id": "c1"}}
            }),
        )
        .await
        .unwrap();

        let video = get(
            &service,
            "video",
            json!({"id": "v1", "channel": "oddnews", "include": ["collection"]}),
        )
        .await
        .unwrap();
        let included = video["included"].as_array().cloned().unwrap_or_default();
        assert_eq!(ids(&included), vec!["c1"], "{name}");
        // A single reference stays a single reference in the stored record.
        assert_eq!(video["relationships"]["collection"]["id"], json!("c1"), "{name}");

        let channel = get(&service, "channel", json!({"id": "oddnews", "include": ["featured"]}))
            .await
            .unwrap();
        let included = channel["included"].as_array().cloned().unwrap_or_default();
        assert_eq!(ids(&included), vec!["c1"], "{name}");
        assert_eq!(included[0]["title"], json!("Space"), "{name}");
    }
}

#[tokio::test]
async fn test_include_accepts_many_relation_names() {
    for (name, service) in full_backends().await {
        set(&service, "video", json!({"id": "v1", "channel": "oddnews"})).await.unwrap();
        let include: Vec<String> = (0..40).map(|n| format!("relation{n}")).collect();
        let fetched = get(
            &service,
            "video",
            json!({"id": "v1", "channel": "oddnews", "include": include}),
        )
        .await
        .unwrap();
        assert_eq!(fetched["included"], json!([]), "{name}");
    }
}

#[tokio::test]
async fn test_scan_rejects_separator_in_channel() {
    for (name, service) in full_backends().await {
        let err = service
            .bus()
            .query(&Pattern::store(CMD_SCAN).with_type("video"), json!({"channel": "odd:news"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidParameter { .. }), "{name}");
    }
}

#[tokio::test]
async fn test_include_must_be_sequence() {
    for (name, service) in full_backends().await {
        let err = get(
            &service,
            "video",
            json!({"id": "v1", "channel": "oddnews", "include": "collections"}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::InvalidParameter { .. }), "{name}");
    }
}

// =============================================================================
// Routing
// =============================================================================

#[tokio::test]
async fn test_unregistered_type_is_not_not_found() {
    let mut services = full_backends().await;
    services.push(("memory", memory_backend().await));

    for (name, service) in &services {
        let err = get(service, "podcast", json!({"id": "p1", "channel": "oddnews"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NoHandler { .. }), "{name}");
        assert!(!err.is_client_error(), "{name}");
        assert!(err.to_string().contains("podcast"), "{name}");
    }
}

#[tokio::test]
async fn test_riak_get_without_id_lists_channel() {
    let config = StoreConfig {
        backend: BackendKind::Riak,
        ..StoreConfig::default()
    };
    let service = StoreService::start(config).await.unwrap();
    for (id, channel) in [("v1", "oddnews"), ("v2", "oddnews"), ("v3", "other")] {
        set(&service, "video", json!({"id": id, "channel": channel})).await.unwrap();
    }

    let listed = get(&service, "video", json!({"channel": "oddnews"})).await.unwrap();
    let listed = listed.as_array().cloned().unwrap_or_default();
    assert_eq!(ids(&listed), vec!["v1", "v2"]);

    let err = get(&service, "video", json!({"channel": "odd:news"})).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidParameter { .. }));

    // The same request on DynamoDB needs an id.
    let dynamo = StoreService::start(StoreConfig::default()).await.unwrap();
    let err = get(&dynamo, "video", json!({"channel": "oddnews"})).await.unwrap_err();
    assert!(matches!(err, StoreError::MissingParameter { .. }));
}
