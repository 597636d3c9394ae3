//! Tile retrieval tests.

use std::io::Write;

use pmtiles_streamer::format::{tile_id_to_zxy, zxy_to_tile_id};
use pmtiles_streamer::io::ByteRange;
use pmtiles_streamer::{ArchiveError, ArchiveFileSource, Resource};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::test_utils::{
    directory_chain, mock_source, ArchiveBuilder, TrackingMockLoader, ARCHIVE_URL, ETAG,
    HEADER_PREFIX, LAST_MODIFIED, REQUEST_URL,
};

#[tokio::test]
async fn test_gzip_tile_is_decompressed() {
    let archive = ArchiveBuilder::new()
        .gzip()
        .zoom_range(0, 14)
        .tile(10, 5, 5, b"vector tile 10/5/5")
        .tile(10, 5, 6, b"vector tile 10/5/6")
        .build();
    let loader = TrackingMockLoader::new(ARCHIVE_URL, archive.data);
    let source = mock_source(&loader);

    let response = source.request_tile(REQUEST_URL, 10, 5, 5).await.unwrap();

    assert_eq!(response.data.unwrap().as_ref(), b"vector tile 10/5/5");
    assert_eq!(response.content_type, Some("application/x-protobuf"));
    assert_eq!(response.modified.as_deref(), Some(LAST_MODIFIED));
    assert_eq!(response.etag.as_deref(), Some(ETAG));
    // Header prefix (root directory included) and the tile itself
    assert_eq!(loader.request_count(), 2);
}

#[tokio::test]
async fn test_every_tile_up_to_zoom_5_resolves() {
    let mut builder = ArchiveBuilder::new().gzip().leaf_size(64);
    for z in 0..=5u8 {
        let n = 1u32 << z;
        for x in 0..n {
            for y in 0..n {
                builder = builder.tile(z, x, y, format!("{}/{}/{}", z, x, y).as_bytes());
            }
        }
    }
    let loader = TrackingMockLoader::new(ARCHIVE_URL, builder.build().data);
    let source = mock_source(&loader);

    for z in 0..=5u8 {
        let n = 1u32 << z;
        for x in 0..n {
            for y in 0..n {
                let response = source.request_tile(REQUEST_URL, z, x, y).await.unwrap();
                assert_eq!(
                    response.data.unwrap().as_ref(),
                    format!("{}/{}/{}", z, x, y).as_bytes()
                );
            }
        }
    }
}

#[tokio::test]
async fn test_zoom_outside_range_reads_only_the_header() {
    let archive = ArchiveBuilder::new()
        .zoom_range(0, 14)
        .tile(14, 0, 0, b"deepest")
        .build();
    let loader = TrackingMockLoader::new(ARCHIVE_URL, archive.data);
    let source = mock_source(&loader);

    let response = source.request_tile(REQUEST_URL, 15, 0, 0).await.unwrap();
    assert!(response.is_no_content());

    let requests = loader.get_requests().await;
    assert_eq!(requests, vec![(ARCHIVE_URL.to_string(), HEADER_PREFIX)]);
}

#[tokio::test]
async fn test_zoom_below_minimum_is_no_content() {
    let archive = ArchiveBuilder::new()
        .zoom_range(4, 10)
        .tile(4, 0, 0, b"a")
        .build();
    let loader = TrackingMockLoader::new(ARCHIVE_URL, archive.data);
    let source = mock_source(&loader);

    let response = source.request_tile(REQUEST_URL, 3, 0, 0).await.unwrap();
    assert!(response.is_no_content());
    assert_eq!(loader.request_count(), 1);
}

#[tokio::test]
async fn test_missing_tile_is_no_content() {
    let archive = ArchiveBuilder::new().tile(3, 1, 1, b"present").build();
    let loader = TrackingMockLoader::new(ARCHIVE_URL, archive.data);
    let source = mock_source(&loader);

    let response = source.request_tile(REQUEST_URL, 3, 2, 2).await.unwrap();
    assert!(response.is_no_content());
    assert!(response.content_type.is_none());
}

#[tokio::test]
async fn test_unrecognized_tile_type_is_served_as_octet_stream() {
    let archive = ArchiveBuilder::new()
        .tile_type(42)
        .tile(1, 1, 0, b"opaque")
        .build();
    let loader = TrackingMockLoader::new(ARCHIVE_URL, archive.data);
    let source = mock_source(&loader);

    let response = source.request_tile(REQUEST_URL, 1, 1, 0).await.unwrap();
    assert_eq!(response.data.unwrap().as_ref(), b"opaque");
    assert_eq!(response.content_type, Some("application/octet-stream"));
}

#[tokio::test]
async fn test_invalid_coordinate_is_an_error() {
    let archive = ArchiveBuilder::new().tile(3, 1, 1, b"present").build();
    let loader = TrackingMockLoader::new(ARCHIVE_URL, archive.data);
    let source = mock_source(&loader);

    let err = source.request_tile(REQUEST_URL, 3, 8, 0).await.unwrap_err();
    assert!(matches!(err, ArchiveError::InvalidTile(_)));
    assert!(err.to_string().starts_with("invalid tile"));
}

#[tokio::test]
async fn test_every_tile_of_a_run_resolves_to_the_same_range() {
    let first = zxy_to_tile_id(4, 0, 0).unwrap();
    let archive = ArchiveBuilder::new()
        .tile_run(first, 5, b"ocean")
        .tile_run(first + 5, 1, b"coast")
        .build();
    let tile_data_offset = archive.tile_data_offset;
    let loader = TrackingMockLoader::new(ARCHIVE_URL, archive.data);
    let source = mock_source(&loader);

    for tile_id in first..first + 5 {
        let coord = tile_id_to_zxy(tile_id).unwrap();
        let response = source
            .request(Resource::tile(REQUEST_URL, coord.z, coord.x, coord.y))
            .await
            .unwrap();
        assert_eq!(response.data.unwrap().as_ref(), b"ocean");
    }

    let tile_ranges: Vec<ByteRange> = loader
        .get_requests()
        .await
        .into_iter()
        .map(|(_, range)| range)
        .filter(|range| range.offset >= tile_data_offset)
        .collect();
    assert_eq!(tile_ranges.len(), 5);
    assert!(tile_ranges.iter().all(|r| *r == tile_ranges[0]));

    let coast = tile_id_to_zxy(first + 5).unwrap();
    let response = source
        .request_tile(REQUEST_URL, coast.z, coast.x, coast.y)
        .await
        .unwrap();
    assert_eq!(response.data.unwrap().as_ref(), b"coast");
}

#[tokio::test]
async fn test_tiles_behind_leaf_directories() {
    let mut builder = ArchiveBuilder::new().gzip().leaf_size(4);
    for x in 0..20u32 {
        builder = builder.tile(5, x, 0, format!("tile 5/{}/0", x).as_bytes());
    }
    let archive = builder.build();
    assert_eq!(archive.leaves.len(), 5);
    let leaves = archive.leaves.clone();

    let loader = TrackingMockLoader::new(ARCHIVE_URL, archive.data);
    let source = mock_source(&loader);

    for x in 0..20u32 {
        let response = source.request_tile(REQUEST_URL, 5, x, 0).await.unwrap();
        assert_eq!(
            response.data.unwrap().as_ref(),
            format!("tile 5/{}/0", x).as_bytes()
        );
    }

    // Each leaf is fetched once and then served from the directory cache
    for leaf in leaves {
        assert_eq!(loader.count_range(leaf).await, 1);
    }
    assert_eq!(loader.count_range(HEADER_PREFIX).await, 1);
}

#[tokio::test]
async fn test_root_directory_outside_header_prefix() {
    let archive = ArchiveBuilder::new()
        .root_padding(20_000)
        .tile(2, 1, 1, b"far away root")
        .build();
    let root = archive.root;
    assert!(root.offset > HEADER_PREFIX.length);

    let loader = TrackingMockLoader::new(ARCHIVE_URL, archive.data);
    let source = mock_source(&loader);

    let response = source.request_tile(REQUEST_URL, 2, 1, 1).await.unwrap();
    assert_eq!(response.data.unwrap().as_ref(), b"far away root");

    let requests: Vec<ByteRange> = loader
        .get_requests()
        .await
        .into_iter()
        .map(|(_, range)| range)
        .collect();
    assert_eq!(requests[0], HEADER_PREFIX);
    assert_eq!(requests[1], root);
    assert_eq!(requests.len(), 3);
}

#[tokio::test]
async fn test_three_leaf_levels_resolve() {
    let archive = directory_chain(3, b"deep tile");
    let loader = TrackingMockLoader::new(ARCHIVE_URL, archive.data);
    let source = mock_source(&loader);

    let response = source.request_tile(REQUEST_URL, 0, 0, 0).await.unwrap();
    assert_eq!(response.data.unwrap().as_ref(), b"deep tile");
}

#[tokio::test]
async fn test_directory_chain_past_depth_limit_fails() {
    for levels in [4, 5] {
        let archive = directory_chain(levels, b"unreachable");
        let loader = TrackingMockLoader::new(ARCHIVE_URL, archive.data);
        let source = mock_source(&loader);

        let err = source.request_tile(REQUEST_URL, 0, 0, 0).await.unwrap_err();
        assert!(
            matches!(err, ArchiveError::DepthExceeded { depth: 4 }),
            "unexpected error for {} levels: {}",
            levels,
            err
        );
        assert!(err.to_string().contains("maximum directory depth exceeded"));
    }
}

#[tokio::test]
async fn test_local_file_archive() {
    let archive = ArchiveBuilder::new()
        .gzip()
        .tile(1, 1, 0, b"from disk")
        .build();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&archive.data).unwrap();
    file.flush().unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let source = ArchiveFileSource::new().unwrap();

    let with_scheme = format!("pmtiles://file://{}", path);
    let response = source.request_tile(&with_scheme, 1, 1, 0).await.unwrap();
    assert_eq!(response.data.unwrap().as_ref(), b"from disk");
    assert!(response.modified.is_some());

    let bare_path = format!("pmtiles://{}", path);
    let response = source.request_tile(&bare_path, 1, 1, 0).await.unwrap();
    assert_eq!(response.data.unwrap().as_ref(), b"from disk");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_http_archive() {
    let archive = ArchiveBuilder::new()
        .gzip()
        .tile(6, 10, 20, b"over http")
        .build();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/world.pmtiles"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(archive.data)
                .insert_header("ETag", "\"abc\""),
        )
        .mount(&server)
        .await;

    let source = ArchiveFileSource::new().unwrap();
    let url = format!("pmtiles://{}/world.pmtiles", server.uri());

    let response = source.request_tile(&url, 6, 10, 20).await.unwrap();
    assert_eq!(response.data.unwrap().as_ref(), b"over http");
    assert_eq!(response.etag.as_deref(), Some("\"abc\""));

    let missing = source.request_tile(&url, 6, 11, 20).await.unwrap();
    assert!(missing.is_no_content());
}
