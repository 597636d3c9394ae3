//! Directory cache and request sharing tests.
//!
//! These tests verify that:
//! - The header and root directory are fetched once per archive
//! - Leaf directories are cached with LRU eviction at the configured cap
//! - Concurrent misses on the header or a directory share one fetch
//! - Archives get independent sessions

use pmtiles_streamer::archive::SessionOptions;
use pmtiles_streamer::format::{tile_id_to_zxy, zxy_to_tile_id, TileCoord};
use pmtiles_streamer::RequestHandle;

use super::test_utils::{
    mock_source, mock_source_with, ArchiveBuilder, BuiltArchive, TrackingMockLoader, ARCHIVE_URL,
    HEADER_PREFIX, REQUEST_URL,
};

/// Archive with `count` consecutive zoom 7 tiles, one leaf directory each.
fn one_tile_per_leaf(count: u64) -> (BuiltArchive, Vec<TileCoord>) {
    let base = zxy_to_tile_id(7, 0, 0).unwrap();
    let mut builder = ArchiveBuilder::new().leaf_size(1);
    let mut coords = Vec::new();
    for i in 0..count {
        builder = builder.tile_run(base + i, 1, format!("tile {}", i).as_bytes());
        coords.push(tile_id_to_zxy(base + i).unwrap());
    }
    (builder.build(), coords)
}

async fn fetch_tile(source: &pmtiles_streamer::ArchiveFileSource, coord: TileCoord) -> Vec<u8> {
    source
        .request_tile(REQUEST_URL, coord.z, coord.x, coord.y)
        .await
        .unwrap()
        .data
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn test_header_fetched_once_across_tiles() {
    let archive = ArchiveBuilder::new()
        .tile(3, 0, 0, b"a")
        .tile(3, 1, 0, b"b")
        .tile(3, 2, 0, b"c")
        .build();
    let loader = TrackingMockLoader::new(ARCHIVE_URL, archive.data);
    let source = mock_source(&loader);

    for x in 0..3 {
        source.request_tile(REQUEST_URL, 3, x, 0).await.unwrap();
    }

    assert_eq!(loader.count_range(HEADER_PREFIX).await, 1);
    assert_eq!(loader.request_count(), 4);
}

#[tokio::test]
async fn test_directory_cache_evicts_least_recently_used() {
    // Root directory plus 100 leaves: 101 distinct directories
    let (archive, coords) = one_tile_per_leaf(100);
    let leaves = archive.leaves.clone();
    let loader = TrackingMockLoader::new(ARCHIVE_URL, archive.data);
    let source = mock_source(&loader);

    for (i, coord) in coords.iter().enumerate() {
        assert_eq!(fetch_tile(&source, *coord).await, format!("tile {}", i).into_bytes());
    }

    let stats = source.stats(REQUEST_URL).await.unwrap();
    assert_eq!(stats.cached_directories, 100);
    assert_eq!(stats.directory_evictions, 1);

    // The root is touched by every lookup, so the oldest leaf went first
    let before = loader.request_count();
    fetch_tile(&source, coords[1]).await;
    assert_eq!(loader.request_count(), before + 1);
    assert_eq!(loader.count_range(leaves[1]).await, 1);

    fetch_tile(&source, coords[0]).await;
    assert_eq!(loader.request_count(), before + 3);
    assert_eq!(loader.count_range(leaves[0]).await, 2);
}

#[tokio::test]
async fn test_evicted_root_directory_is_refetched() {
    let (archive, coords) = one_tile_per_leaf(2);
    let root = archive.root;
    let loader = TrackingMockLoader::new(ARCHIVE_URL, archive.data);
    let options = SessionOptions {
        directory_cache_capacity: 1,
        ..SessionOptions::default()
    };
    let source = mock_source_with(&loader, options);

    assert_eq!(fetch_tile(&source, coords[0]).await, b"tile 0");
    assert_eq!(fetch_tile(&source, coords[1]).await, b"tile 1");

    // First root came with the header prefix, the second needed its own fetch
    assert_eq!(loader.count_range(HEADER_PREFIX).await, 1);
    assert_eq!(loader.count_range(root).await, 1);
    let stats = source.stats(REQUEST_URL).await.unwrap();
    assert_eq!(stats.cached_directories, 1);
}

#[tokio::test]
async fn test_concurrent_requests_share_header_fetch() {
    let mut builder = ArchiveBuilder::new();
    for x in 0..8u32 {
        builder = builder.tile(3, x, 3, format!("row 3 col {}", x).as_bytes());
    }
    let loader = TrackingMockLoader::new(ARCHIVE_URL, builder.build().data);
    let source = mock_source(&loader);

    let handles: Vec<RequestHandle> = (0..8u32)
        .map(|x| source.request_tile(REQUEST_URL, 3, x, 3))
        .collect();
    for (x, handle) in handles.into_iter().enumerate() {
        let response = handle.await.unwrap();
        assert_eq!(
            response.data.unwrap().as_ref(),
            format!("row 3 col {}", x).as_bytes()
        );
    }

    assert_eq!(loader.count_range(HEADER_PREFIX).await, 1);
}

#[tokio::test]
async fn test_concurrent_misses_share_directory_fetch() {
    let mut builder = ArchiveBuilder::new().gzip().leaf_size(8);
    let base = zxy_to_tile_id(6, 0, 0).unwrap();
    for i in 0..8 {
        builder = builder.tile_run(base + i, 1, b"same leaf");
    }
    let archive = builder.build();
    let leaf = archive.leaves[0];
    let loader = TrackingMockLoader::new(ARCHIVE_URL, archive.data);
    let source = mock_source(&loader);

    let handles: Vec<RequestHandle> = (0..8)
        .map(|i| {
            let coord = tile_id_to_zxy(base + i).unwrap();
            source.request_tile(REQUEST_URL, coord.z, coord.x, coord.y)
        })
        .collect();
    for handle in handles {
        assert!(!handle.await.unwrap().is_no_content());
    }

    assert_eq!(loader.count_range(leaf).await, 1);
    // Requests that waited on the shared fetch end with a hit, not a miss
    let stats = source.stats(REQUEST_URL).await.unwrap();
    assert_eq!(stats.directory_misses, 1);
    assert_eq!(stats.directory_hits, 8 + 7);
}

#[tokio::test]
async fn test_archives_have_independent_sessions() {
    let a = ArchiveBuilder::new().tile(0, 0, 0, b"archive a").build();
    let b = ArchiveBuilder::new().tile(0, 0, 0, b"archive b").build();
    let loader = TrackingMockLoader::with_archives(vec![
        ("https://a.example.com/a.pmtiles".to_string(), a.data),
        ("https://b.example.com/b.pmtiles".to_string(), b.data),
    ]);
    let source = mock_source(&loader);

    let tile_a = source
        .request_tile("pmtiles://https://a.example.com/a.pmtiles", 0, 0, 0)
        .await
        .unwrap();
    let tile_b = source
        .request_tile("pmtiles://https://b.example.com/b.pmtiles", 0, 0, 0)
        .await
        .unwrap();

    assert_eq!(tile_a.data.unwrap().as_ref(), b"archive a");
    assert_eq!(tile_b.data.unwrap().as_ref(), b"archive b");
    assert!(source.stats("https://a.example.com/a.pmtiles").await.is_some());
    assert!(source.stats(REQUEST_URL).await.is_none());
}
