//! # PMTiles Streamer
//!
//! Serve map tiles and TileJSON straight out of a single PMTiles archive.
//!
//! An archive is one static file holding a header, a tree of directories,
//! optional JSON metadata and the tile data. This crate resolves tile
//! requests to byte ranges inside the archive and fetches only those ranges,
//! from an HTTP(S) server or the local file system. No tile server is
//! involved.
//!
//! ## Features
//!
//! - **Range-based reads**: the header, directories and each tile are fetched
//!   with their own range request
//! - **Directory caching**: decoded directories are kept per archive with LRU
//!   eviction
//! - **TileJSON synthesis**: embedded metadata merged with header-derived
//!   fields
//! - **Cancellation**: dropping a request handle aborts its pending fetch
//!
//! ## Architecture
//!
//! - [`io`] - `RangeLoader` trait with HTTP and file backends
//! - [`mod@format`] - header, directory and tile id decoding
//! - [`archive`] - per-archive sessions, caches and the request pipeline
//! - [`source`] - public request surface running sessions on a worker thread
//! - [`config`] - CLI configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use pmtiles_streamer::{ArchiveFileSource, Resource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = ArchiveFileSource::new()?;
//!     let url = "pmtiles://https://example.com/world.pmtiles";
//!
//!     let tilejson = source.request_metadata(url).await?;
//!     let tile = source.request(Resource::tile(url, 4, 8, 5)).await?;
//!
//!     println!("{:?} {:?}", tilejson.content_type, tile.data.map(|d| d.len()));
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod source;

// Re-export commonly used types
pub use archive::{
    synthesize_tilejson, ArchiveSession, DirectoryCache, PendingTasks, RequestContext, RequestId,
    SessionOptions, SessionStats, MAX_DIRECTORY_CACHE_ENTRIES,
};
pub use config::{Cli, Command, Config, InfoConfig, MetadataConfig, TileConfig};
pub use error::{ArchiveError, DecodeError, FormatError, IoError, Stage};
pub use format::{
    decode_directory, find_entry, tile_id_to_zxy, zxy_to_tile_id, Compression, DirectoryEntry,
    Header, TileCoord, TileType,
};
pub use io::{ByteRange, DefaultLoader, FetchResponse, FileLoader, HttpLoader, LoaderOptions, RangeLoader};
pub use source::{
    can_handle, ArchiveFileSource, RequestHandle, Resource, ResourceKind, Response, PMTILES_SCHEME,
};
