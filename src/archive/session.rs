//! Per-archive session.
//!
//! An [`ArchiveSession`] owns everything known about one archive URL: the
//! parsed header, the directory cache, the synthesized metadata document and
//! the fetches each request is waiting on. Sessions live on a single-threaded
//! `LocalSet`; state sits in a `RefCell` and no borrow is ever held across an
//! `.await`, so every step between two fetches runs without interruption.
//!
//! # Request pipeline
//!
//! ```text
//!   tile(z, x, y)                       metadata()
//!        │                                  │
//!        ▼                                  ▼
//!   ensure_header ◄──── singleflight ───► ensure_header
//!        │  (prefix fetch, root directory)  │
//!        ▼                                  ▼
//!   resolve_tile_address               fetch embedded JSON
//!        │  root → leaf → leaf …            │
//!        ▼                                  ▼
//!   fetch tile bytes                   synthesize TileJSON
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Notify;
use tracing::{debug, info};

use super::cache::{DirectoryCache, DirectoryCacheStats, DirectoryKey, MAX_DIRECTORY_CACHE_ENTRIES};
use super::metadata::synthesize_tilejson;
use super::pending::{PendingTasks, RequestId};
use crate::error::{ArchiveError, IoError, Stage};
use crate::format::{decode_directory, decompress, find_entry, DirectoryEntry, Header, TileCoord};
use crate::io::{ByteRange, FetchResponse, RangeLoader};
use crate::source::Response;

// =============================================================================
// Configuration
// =============================================================================

/// Bytes fetched from the start of an archive to read the header.
///
/// Writers place the root directory right after the header, so one request
/// usually covers both.
pub const DEFAULT_HEADER_PREFIX_LENGTH: u64 = 16384;

/// Leaf levels followed below the root directory.
pub const DEFAULT_MAX_DIRECTORY_DEPTH: u32 = 3;

/// Tuning knobs fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Directories cached per archive.
    pub directory_cache_capacity: usize,
    /// Length of the initial range request.
    pub header_prefix_length: u64,
    /// Deepest leaf level accepted; the root directory is depth 0.
    pub max_directory_depth: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            directory_cache_capacity: MAX_DIRECTORY_CACHE_ENTRIES,
            header_prefix_length: DEFAULT_HEADER_PREFIX_LENGTH,
            max_directory_depth: DEFAULT_MAX_DIRECTORY_DEPTH,
        }
    }
}

/// Diagnostic counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub directory_hits: u64,
    pub directory_misses: u64,
    pub directory_evictions: u64,
    pub cached_directories: usize,
    pub header_loaded: bool,
    pub metadata_cached: bool,
    pub pending_fetches: usize,
}

/// What a request brings along into the session.
#[derive(Clone)]
pub struct RequestContext {
    pub id: RequestId,
    pub loader: Arc<dyn RangeLoader>,
}

// =============================================================================
// Singleflight
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FlightKey {
    Header,
    Directory(DirectoryKey),
}

struct SessionState {
    header: Option<Header>,
    directories: DirectoryCache,
    metadata: Option<Arc<str>>,
    in_flight: HashMap<FlightKey, Rc<Notify>>,
}

/// Held by the request loading a shared resource.
///
/// Dropping it, on success, failure or cancellation, wakes every waiter so
/// one of them can take over if the resource is still missing.
struct FlightGuard<'a> {
    state: &'a RefCell<SessionState>,
    key: FlightKey,
}

impl<'a> FlightGuard<'a> {
    fn lead(state: &'a RefCell<SessionState>, key: FlightKey) -> Self {
        state.borrow_mut().in_flight.insert(key, Rc::new(Notify::new()));
        Self { state, key }
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(notify) = self.state.borrow_mut().in_flight.remove(&self.key) {
            notify.notify_waiters();
        }
    }
}

// =============================================================================
// ArchiveSession
// =============================================================================

/// State and request pipeline for one archive.
pub struct ArchiveSession {
    url: String,
    options: SessionOptions,
    state: RefCell<SessionState>,
    tasks: RefCell<PendingTasks>,
}

impl ArchiveSession {
    /// Create a session for the archive at `url` (without the `pmtiles://` prefix).
    pub fn new(url: impl Into<String>, options: SessionOptions) -> Self {
        Self {
            url: url.into(),
            options,
            state: RefCell::new(SessionState {
                header: None,
                directories: DirectoryCache::with_capacity(options.directory_cache_capacity),
                metadata: None,
                in_flight: HashMap::new(),
            }),
            tasks: RefCell::new(PendingTasks::new()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// The parsed header, once loaded.
    pub fn header(&self) -> Option<Header> {
        self.state.borrow().header
    }

    pub fn stats(&self) -> SessionStats {
        let state = self.state.borrow();
        let DirectoryCacheStats {
            hits,
            misses,
            evictions,
        } = state.directories.stats();
        SessionStats {
            directory_hits: hits,
            directory_misses: misses,
            directory_evictions: evictions,
            cached_directories: state.directories.len(),
            header_loaded: state.header.is_some(),
            metadata_cached: state.metadata.is_some(),
            pending_fetches: self.tasks.borrow().len(),
        }
    }

    /// Whether the directory at `range` is currently cached.
    pub fn is_directory_cached(&self, range: ByteRange) -> bool {
        self.state.borrow().directories.contains(&DirectoryKey::from(range))
    }

    /// Abort the fetch request `id` is waiting on and forget it.
    pub fn cancel(&self, id: RequestId) {
        if self.tasks.borrow_mut().remove(id) {
            debug!(url = %self.url, request = %id, "cancelled pending fetch");
        }
    }

    /// Forget the fetch record of a request that has completed.
    pub fn finish(&self, id: RequestId) {
        self.tasks.borrow_mut().remove(id);
    }

    /// Fetch `range` of the archive as a tracked sub-task of request `ctx.id`.
    ///
    /// The fetch replaces (and aborts) whatever fetch the request had
    /// recorded before, and is aborted itself when the request is cancelled.
    async fn fetch(&self, ctx: &RequestContext, range: ByteRange) -> Result<FetchResponse, IoError> {
        let loader = Arc::clone(&ctx.loader);
        let url = self.url.clone();
        let task = tokio::task::spawn_local(async move { loader.fetch(&url, Some(range)).await });

        if self.tasks.borrow_mut().register(ctx.id, task.abort_handle()) {
            debug!(url = %self.url, request = %ctx.id, "superseded running fetch");
        }

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(IoError::Cancelled),
            Err(e) => Err(IoError::Io(format!("fetch task failed: {}", e))),
        }
    }

    /// Decompress and decode a raw directory block.
    fn decode_block(
        raw: Bytes,
        header: &Header,
        stage: Stage,
    ) -> Result<Vec<DirectoryEntry>, ArchiveError> {
        let bytes = decompress(raw, header.internal_compression).map_err(ArchiveError::decode(stage))?;
        decode_directory(&bytes).map_err(ArchiveError::decode(stage))
    }

    /// Wait for a shared load of `key` if one is running.
    ///
    /// Returns false when no load is running and the caller should lead.
    async fn wait_for_flight(&self, key: FlightKey) -> bool {
        let notify = match self.state.borrow().in_flight.get(&key) {
            Some(notify) => Rc::clone(notify),
            None => return false,
        };
        notify.notified().await;
        true
    }

    // -------------------------------------------------------------------------
    // Header and root directory
    // -------------------------------------------------------------------------

    /// Make sure the header and root directory are loaded.
    ///
    /// Concurrent callers share one load. A cached header returns immediately.
    pub async fn ensure_header(&self, ctx: &RequestContext) -> Result<Header, ArchiveError> {
        loop {
            if let Some(header) = self.header() {
                return Ok(header);
            }
            if !self.wait_for_flight(FlightKey::Header).await {
                break;
            }
        }

        let _flight = FlightGuard::lead(&self.state, FlightKey::Header);
        self.load_header(ctx).await
    }

    async fn load_header(&self, ctx: &RequestContext) -> Result<Header, ArchiveError> {
        let stage = Stage::HeaderAndRootDirectory;
        debug!(url = %self.url, length = self.options.header_prefix_length, "fetching header");

        let prefix = self
            .fetch(ctx, ByteRange::new(0, self.options.header_prefix_length))
            .await
            .map_err(ArchiveError::fetch(stage))?;

        let header = Header::parse(&prefix.data).map_err(ArchiveError::format(stage))?;
        header.check_compression().map_err(ArchiveError::format(stage))?;

        let root = header.root_directory();
        let raw_root = if root.end() <= prefix.data.len() as u64 {
            prefix.data.slice(root.offset as usize..root.end() as usize)
        } else {
            debug!(
                url = %self.url,
                offset = root.offset,
                length = root.length,
                "root directory outside header prefix, fetching separately"
            );
            self.fetch(ctx, root)
                .await
                .map_err(ArchiveError::fetch(stage))?
                .data
        };
        let entries = Self::decode_block(raw_root, &header, stage)?;
        let root_entries = entries.len();

        {
            let mut state = self.state.borrow_mut();
            state.directories.insert(DirectoryKey::from(root), entries);
            state.header = Some(header);
        }

        info!(
            url = %self.url,
            min_zoom = header.min_zoom,
            max_zoom = header.max_zoom,
            tile_type = ?header.tile_type,
            root_entries,
            "archive header loaded"
        );
        Ok(header)
    }

    // -------------------------------------------------------------------------
    // Directories
    // -------------------------------------------------------------------------

    /// Get the directory at `range`, fetching and decoding it on a cache miss.
    pub async fn directory(
        &self,
        ctx: &RequestContext,
        range: ByteRange,
    ) -> Result<Arc<[DirectoryEntry]>, ArchiveError> {
        let key = DirectoryKey::from(range);
        loop {
            // Waiters only count the hit they end with, never their misses
            let cached = {
                let mut state = self.state.borrow_mut();
                if state.directories.contains(&key) {
                    state.directories.get(&key)
                } else {
                    None
                }
            };
            if let Some(entries) = cached {
                debug!(url = %self.url, offset = range.offset, length = range.length, "directory cache hit");
                return Ok(entries);
            }
            if !self.wait_for_flight(FlightKey::Directory(key)).await {
                break;
            }
        }

        self.state.borrow_mut().directories.record_miss();
        let _flight = FlightGuard::lead(&self.state, FlightKey::Directory(key));
        let header = self.ensure_header(ctx).await?;

        debug!(url = %self.url, offset = range.offset, length = range.length, "fetching directory");
        let raw = self
            .fetch(ctx, range)
            .await
            .map_err(ArchiveError::fetch(Stage::Directory))?
            .data;
        let entries = Self::decode_block(raw, &header, Stage::Directory)?;

        let (entries, evicted) = self.state.borrow_mut().directories.insert(key, entries);
        if let Some(evicted) = evicted {
            debug!(
                url = %self.url,
                offset = evicted.offset,
                length = evicted.length,
                "evicted directory"
            );
        }
        Ok(entries)
    }

    /// Walk the directory tree from `directory` down to the entry holding `tile_id`.
    ///
    /// Returns the absolute byte range of the tile data, or `None` when no
    /// entry covers the tile. `depth` is the level of `directory`, 0 for the
    /// root.
    pub async fn resolve_tile_address(
        &self,
        ctx: &RequestContext,
        tile_id: u64,
        directory: ByteRange,
        depth: u32,
    ) -> Result<Option<ByteRange>, ArchiveError> {
        let header = self.ensure_header(ctx).await?;
        let (mut directory, mut depth) = (directory, depth);

        loop {
            if depth > self.options.max_directory_depth {
                return Err(ArchiveError::DepthExceeded { depth });
            }

            let entries = self.directory(ctx, directory).await?;
            let entry = match find_entry(&entries, tile_id) {
                Some(entry) => *entry,
                None => {
                    debug!(url = %self.url, tile_id, depth, "no directory entry covers tile");
                    return Ok(None);
                }
            };

            if entry.length == 0 {
                return Ok(None);
            }

            if !entry.is_leaf_pointer() {
                let offset = header.tile_data_offset.saturating_add(entry.offset);
                return Ok(Some(ByteRange::new(offset, u64::from(entry.length))));
            }

            directory = ByteRange::new(
                header.leaf_directories_offset.saturating_add(entry.offset),
                u64::from(entry.length),
            );
            depth += 1;
            debug!(url = %self.url, tile_id, depth, offset = directory.offset, "descending into leaf directory");
        }
    }

    // -------------------------------------------------------------------------
    // Requests
    // -------------------------------------------------------------------------

    /// Serve one tile.
    ///
    /// Zoom levels outside the archive's range and tiles no directory entry
    /// covers yield a no-content response.
    pub async fn tile(&self, ctx: &RequestContext, coord: TileCoord) -> Result<Response, ArchiveError> {
        let header = self.ensure_header(ctx).await?;

        if !header.contains_zoom(coord.z) {
            debug!(url = %self.url, z = coord.z, "zoom outside archive range");
            return Ok(Response::no_content());
        }

        let tile_id = coord.tile_id().map_err(ArchiveError::InvalidTile)?;
        let range = match self
            .resolve_tile_address(ctx, tile_id, header.root_directory(), 0)
            .await?
        {
            Some(range) => range,
            None => return Ok(Response::no_content()),
        };

        let fetched = self
            .fetch(ctx, range)
            .await
            .map_err(ArchiveError::fetch(Stage::Tile))?;
        let data = decompress(fetched.data, header.tile_compression)
            .map_err(ArchiveError::decode(Stage::Tile))?;

        debug!(url = %self.url, tile_id, bytes = data.len(), "tile served");
        Ok(Response {
            data: Some(data),
            modified: fetched.modified,
            expires: fetched.expires,
            etag: fetched.etag,
            content_type: Some(header.tile_type.media_type()),
        })
    }

    /// Serve the TileJSON document, synthesizing it on first use.
    pub async fn metadata(&self, ctx: &RequestContext) -> Result<Arc<str>, ArchiveError> {
        let cached = self.state.borrow().metadata.clone();
        if let Some(doc) = cached {
            return Ok(doc);
        }

        let header = self.ensure_header(ctx).await?;
        let embedded = if header.metadata_length > 0 {
            let fetched = self
                .fetch(ctx, header.metadata())
                .await
                .map_err(ArchiveError::fetch(Stage::Metadata))?;
            Some(
                decompress(fetched.data, header.internal_compression)
                    .map_err(ArchiveError::decode(Stage::Metadata))?,
            )
        } else {
            None
        };

        let doc: Arc<str> = synthesize_tilejson(&header, embedded.as_deref(), &self.url).into();
        info!(url = %self.url, bytes = doc.len(), "metadata synthesized");

        // A concurrent request may have finished first; keep the first document
        let mut state = self.state.borrow_mut();
        Ok(Arc::clone(state.metadata.get_or_insert(doc)))
    }

    /// [`metadata`](Self::metadata) wrapped as a response.
    pub async fn metadata_response(&self, ctx: &RequestContext) -> Result<Response, ArchiveError> {
        let doc = self.metadata(ctx).await?;
        Ok(Response {
            data: Some(Bytes::copy_from_slice(doc.as_bytes())),
            content_type: Some("application/json"),
            ..Response::default()
        })
    }
}
