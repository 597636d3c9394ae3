//! Archive sessions and their caches.
//!
//! One [`ArchiveSession`] exists per archive URL. It owns:
//!
//! - the parsed [`Header`](crate::format::Header), loaded once,
//! - a [`DirectoryCache`] of decoded directories with LRU eviction,
//! - the synthesized TileJSON document, built once,
//! - a [`PendingTasks`] registry of the fetch each request waits on.
//!
//! Sessions are not `Send`. They live on the file source's worker thread and
//! are driven by its `LocalSet`.

mod cache;
mod metadata;
mod pending;
mod session;

pub use cache::{DirectoryCache, DirectoryCacheStats, DirectoryKey, MAX_DIRECTORY_CACHE_ENTRIES};
pub use metadata::{synthesize_tilejson, TILEJSON_VERSION};
pub use pending::{AbortOnDrop, PendingTasks, RequestId};
pub use session::{
    ArchiveSession, RequestContext, SessionOptions, SessionStats, DEFAULT_HEADER_PREFIX_LENGTH,
    DEFAULT_MAX_DIRECTORY_DEPTH,
};
