//! TileJSON synthesis tests.

use serde_json::{json, Value};

use super::test_utils::{
    mock_source, ArchiveBuilder, TrackingMockLoader, ARCHIVE_URL, HEADER_PREFIX, REQUEST_URL,
    TILE_TYPE_MLT,
};

fn document(data: Option<bytes::Bytes>) -> Value {
    serde_json::from_slice(&data.expect("metadata response has a body")).unwrap()
}

#[tokio::test]
async fn test_metadata_is_fetched_once() {
    let archive = ArchiveBuilder::new()
        .gzip()
        .metadata(r#"{"name": "world"}"#)
        .tile(0, 0, 0, b"t")
        .build();
    let metadata_range = archive.metadata;
    let loader = TrackingMockLoader::new(ARCHIVE_URL, archive.data);
    let source = mock_source(&loader);

    let first = source.request_metadata(REQUEST_URL).await.unwrap();
    let second = source.request_metadata(REQUEST_URL).await.unwrap();

    assert_eq!(first.data, second.data);
    assert_eq!(first.content_type, Some("application/json"));
    assert_eq!(loader.count_range(metadata_range).await, 1);
    assert_eq!(loader.count_range(HEADER_PREFIX).await, 1);
    // The second request was served without any I/O
    assert_eq!(loader.request_count(), 2);
}

#[tokio::test]
async fn test_embedded_metadata_merged_with_header_fields() {
    let archive = ArchiveBuilder::new()
        .gzip()
        .zoom_range(0, 14)
        .metadata(
            r#"{
                "name": "world",
                "attribution": "(c) contributors",
                "vector_layers": [{"id": "water", "fields": {}}],
                "maxzoom": 3,
                "scheme": "tms"
            }"#,
        )
        .tile(0, 0, 0, b"t")
        .build();
    let loader = TrackingMockLoader::new(ARCHIVE_URL, archive.data);
    let source = mock_source(&loader);

    let doc = document(source.request_metadata(REQUEST_URL).await.unwrap().data);

    assert_eq!(doc["name"], "world");
    assert_eq!(doc["attribution"], "(c) contributors");
    assert_eq!(doc["vector_layers"][0]["id"], "water");
    assert_eq!(doc["tilejson"], "3.0.0");
    assert_eq!(doc["scheme"], "xyz");
    assert_eq!(doc["format"], "pbf");
    assert_eq!(doc["tiles"], json!([REQUEST_URL]));
    assert_eq!(doc["minzoom"], 0);
    assert_eq!(doc["maxzoom"], 14);
    assert_eq!(doc["bounds"], json!([-180.0, -85.0511287, 180.0, 85.0511287]));
    assert_eq!(doc["center"], json!([11.25, 43.5, 2]));
}

#[tokio::test]
async fn test_zero_length_metadata_yields_header_fields_only() {
    let archive = ArchiveBuilder::new().zoom_range(2, 9).tile(2, 0, 0, b"t").build();
    assert_eq!(archive.metadata.length, 0);
    let loader = TrackingMockLoader::new(ARCHIVE_URL, archive.data);
    let source = mock_source(&loader);

    let doc = document(source.request_metadata(REQUEST_URL).await.unwrap().data);
    let object = doc.as_object().unwrap();

    let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        vec!["bounds", "center", "format", "maxzoom", "minzoom", "scheme", "tilejson", "tiles"]
    );
    assert_eq!(doc["minzoom"], 2);
    assert_eq!(doc["maxzoom"], 9);
    // Only the header prefix was read
    assert_eq!(loader.request_count(), 1);
}

#[tokio::test]
async fn test_malformed_embedded_metadata_is_tolerated() {
    let archive = ArchiveBuilder::new()
        .metadata("{ this is not json")
        .tile(0, 0, 0, b"t")
        .build();
    let loader = TrackingMockLoader::new(ARCHIVE_URL, archive.data);
    let source = mock_source(&loader);

    let doc = document(source.request_metadata(REQUEST_URL).await.unwrap().data);
    assert_eq!(doc["tilejson"], "3.0.0");
    assert!(doc.get("name").is_none());
}

#[tokio::test]
async fn test_mlt_archive_declares_encoding() {
    let archive = ArchiveBuilder::new()
        .tile_type(TILE_TYPE_MLT)
        .tile(0, 0, 0, b"t")
        .build();
    let loader = TrackingMockLoader::new(ARCHIVE_URL, archive.data);
    let source = mock_source(&loader);

    let doc = document(source.request_metadata(REQUEST_URL).await.unwrap().data);
    assert_eq!(doc["encoding"], "mlt");

    let tile = source.request_tile(REQUEST_URL, 0, 0, 0).await.unwrap();
    assert_eq!(tile.content_type, Some("application/vnd.maplibre-tile"));
}

#[tokio::test]
async fn test_metadata_and_tiles_share_the_header() {
    let archive = ArchiveBuilder::new()
        .metadata(r#"{"name": "shared"}"#)
        .tile(1, 0, 1, b"t")
        .build();
    let loader = TrackingMockLoader::new(ARCHIVE_URL, archive.data);
    let source = mock_source(&loader);

    source.request_tile(REQUEST_URL, 1, 0, 1).await.unwrap();
    source.request_metadata(REQUEST_URL).await.unwrap();

    assert_eq!(loader.count_range(HEADER_PREFIX).await, 1);
    let stats = source.stats(REQUEST_URL).await.unwrap();
    assert!(stats.header_loaded);
    assert!(stats.metadata_cached);
}
