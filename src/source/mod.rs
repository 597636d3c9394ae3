//! Public request surface.
//!
//! [`ArchiveFileSource`] accepts [`Resource`] requests for `pmtiles://` URLs
//! from any thread and hands back a [`RequestHandle`]. The requests are
//! dispatched to per-archive sessions on a dedicated worker thread.
//!
//! ```text
//!  caller thread(s)                     worker thread ("ArchiveFileSource")
//!  ────────────────                     ───────────────────────────────────
//!  request(resource) ──Command::Request──►  Dispatcher
//!        │                                    │ session per archive URL
//!  RequestHandle ◄──────── oneshot ───────    ▼
//!        │ drop                             spawn_local(tile / metadata)
//!        └──────────Command::Cancel──────►  abort task + pending fetch
//! ```

mod file_source;
mod handle;
mod resource;

pub use file_source::{ArchiveFileSource, WORKER_THREAD_NAME};
pub use handle::RequestHandle;
pub use resource::{
    archive_url, can_handle, Resource, ResourceKind, Response, FILE_SCHEME, PMTILES_SCHEME,
};
