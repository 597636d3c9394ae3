use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::LocalSet;
use tracing::{debug, error, info, warn};

use super::handle::RequestHandle;
use super::resource::{archive_url, can_handle, Resource, ResourceKind, Response};
use crate::archive::{AbortOnDrop, ArchiveSession, RequestContext, RequestId, SessionOptions, SessionStats};
use crate::error::{ArchiveError, IoError, Stage};
use crate::io::{DefaultLoader, LoaderOptions, RangeLoader};

/// Name of the worker thread running all archive sessions.
pub const WORKER_THREAD_NAME: &str = "ArchiveFileSource";

/// Messages from the public handles to the worker thread.
pub(crate) enum Command {
    Request {
        id: RequestId,
        resource: Resource,
        reply: oneshot::Sender<Result<Response, ArchiveError>>,
    },
    Cancel(RequestId),
    Stats {
        url: String,
        reply: oneshot::Sender<Option<SessionStats>>,
    },
    Shutdown,
}

/// Loader options shared with the worker, versioned so the worker notices changes.
#[derive(Debug)]
struct SharedOptions {
    loader: LoaderOptions,
    generation: u64,
}

/// The loader requests are dispatched with.
enum LoaderSlot {
    /// Supplied by the caller, used as is
    Fixed(Arc<dyn RangeLoader>),
    /// Built from the shared options, rebuilt when they change
    Default {
        options: Arc<Mutex<SharedOptions>>,
        built: Option<(u64, Arc<dyn RangeLoader>)>,
    },
}

impl LoaderSlot {
    fn current(&mut self) -> Result<Arc<dyn RangeLoader>, IoError> {
        match self {
            LoaderSlot::Fixed(loader) => Ok(Arc::clone(loader)),
            LoaderSlot::Default { options, built } => {
                let (generation, loader_options) = {
                    let shared = options.lock();
                    (shared.generation, shared.loader.clone())
                };
                if let Some((built_generation, loader)) = built {
                    if *built_generation == generation {
                        return Ok(Arc::clone(loader));
                    }
                }

                debug!(generation, user_agent = %loader_options.user_agent, "building default loader");
                let loader: Arc<dyn RangeLoader> = Arc::new(DefaultLoader::new(&loader_options)?);
                *built = Some((generation, Arc::clone(&loader)));
                Ok(loader)
            }
        }
    }
}

// =============================================================================
// Worker
// =============================================================================

struct ActiveRequest {
    session: Rc<ArchiveSession>,
    _task: AbortOnDrop,
}

/// Owns every session; runs on the worker thread only.
struct Dispatcher {
    sessions: HashMap<String, Rc<ArchiveSession>>,
    requests: HashMap<RequestId, ActiveRequest>,
    loader: LoaderSlot,
    session_options: SessionOptions,
}

impl Dispatcher {
    fn new(loader: LoaderSlot, session_options: SessionOptions) -> Self {
        Self {
            sessions: HashMap::new(),
            requests: HashMap::new(),
            loader,
            session_options,
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Request { id, resource, reply } => self.dispatch(id, resource, reply),
                Command::Cancel(id) => self.cancel(id),
                Command::Stats { url, reply } => {
                    let stats = self.sessions.get(&url).map(|session| session.stats());
                    let _ = reply.send(stats);
                }
                Command::Shutdown => break,
            }
        }
        debug!(sessions = self.sessions.len(), "archive file source worker stopping");
    }

    fn session(&mut self, url: &str) -> Rc<ArchiveSession> {
        let options = self.session_options;
        let session = self.sessions.entry(url.to_string()).or_insert_with(|| {
            info!(url, "opening archive session");
            Rc::new(ArchiveSession::new(url, options))
        });
        Rc::clone(session)
    }

    fn dispatch(
        &mut self,
        id: RequestId,
        resource: Resource,
        reply: oneshot::Sender<Result<Response, ArchiveError>>,
    ) {
        let url = match archive_url(&resource.url) {
            Some(url) => url.to_string(),
            None => {
                let _ = reply.send(Err(ArchiveError::UnsupportedUrl(resource.url)));
                return;
            }
        };

        let loader = match self.loader.current() {
            Ok(loader) => loader,
            Err(e) => {
                warn!(url = %url, error = %e, "loader unavailable");
                let _ = reply.send(Err(ArchiveError::fetch(Stage::HeaderAndRootDirectory)(e)));
                return;
            }
        };

        let session = self.session(&url);
        let task_session = Rc::clone(&session);
        let ctx = RequestContext { id, loader };
        debug!(url = %url, request = %id, kind = ?resource.kind, "dispatching request");

        let task = tokio::task::spawn_local(async move {
            let result = match (resource.kind, resource.tile) {
                (ResourceKind::Tile, Some(coord)) => task_session.tile(&ctx, coord).await,
                (ResourceKind::Tile, None) => Err(ArchiveError::InvalidRequest(
                    "tile request without coordinates".to_string(),
                )),
                (ResourceKind::Metadata, _) => task_session.metadata_response(&ctx).await,
            };
            task_session.finish(id);

            if let Err(e) = &result {
                warn!(url = %task_session.url(), request = %id, error = %e, "request failed");
            }
            let _ = reply.send(result);
        });

        self.requests.insert(
            id,
            ActiveRequest {
                session,
                _task: AbortOnDrop::new(task.abort_handle()),
            },
        );
    }

    fn cancel(&mut self, id: RequestId) {
        // Dropping the record aborts the request task if it is still running
        if let Some(request) = self.requests.remove(&id) {
            request.session.cancel(id);
        }
    }
}

// =============================================================================
// ArchiveFileSource
// =============================================================================

/// Serves tiles and TileJSON out of archives addressed by `pmtiles://` URLs.
///
/// All sessions live on one dedicated worker thread running a
/// single-threaded runtime, so per-archive state is never touched
/// concurrently. Requests can be issued from any thread; each returns a
/// [`RequestHandle`] to await or drop.
///
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use pmtiles_streamer::ArchiveFileSource;
///
/// let source = ArchiveFileSource::new()?;
/// let tile = source
///     .request_tile("pmtiles://https://example.com/world.pmtiles", 3, 4, 2)
///     .await?;
/// if let Some(bytes) = tile.data {
///     println!("{} bytes", bytes.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct ArchiveFileSource {
    commands: mpsc::UnboundedSender<Command>,
    options: Arc<Mutex<SharedOptions>>,
    next_id: AtomicU64,
    worker: Option<thread::JoinHandle<()>>,
}

impl ArchiveFileSource {
    /// Create a file source with default options and the default loader.
    pub fn new() -> std::io::Result<Self> {
        Self::with_options(SessionOptions::default(), LoaderOptions::default())
    }

    /// Create a file source whose default loader is built from `loader_options`.
    pub fn with_options(
        session_options: SessionOptions,
        loader_options: LoaderOptions,
    ) -> std::io::Result<Self> {
        let options = Arc::new(Mutex::new(SharedOptions {
            loader: loader_options,
            generation: 0,
        }));
        let slot = LoaderSlot::Default {
            options: Arc::clone(&options),
            built: None,
        };
        Self::spawn(slot, session_options, options)
    }

    /// Create a file source that fetches every byte range through `loader`.
    ///
    /// Loader options set on such a source are stored but have no effect.
    pub fn with_loader(
        loader: Arc<dyn RangeLoader>,
        session_options: SessionOptions,
    ) -> std::io::Result<Self> {
        let options = Arc::new(Mutex::new(SharedOptions {
            loader: LoaderOptions::default(),
            generation: 0,
        }));
        Self::spawn(LoaderSlot::Fixed(loader), session_options, options)
    }

    fn spawn(
        loader: LoaderSlot,
        session_options: SessionOptions,
        options: Arc<Mutex<SharedOptions>>,
    ) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (commands, receiver) = mpsc::unbounded_channel();

        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let local = LocalSet::new();
                let dispatcher = Dispatcher::new(loader, session_options);
                local.block_on(&runtime, dispatcher.run(receiver));
            })?;

        Ok(Self {
            commands,
            options,
            next_id: AtomicU64::new(1),
            worker: Some(worker),
        })
    }

    /// Whether this source serves `resource`.
    pub fn can_request(&self, resource: &Resource) -> bool {
        can_handle(&resource.url)
    }

    /// Start a request.
    ///
    /// URLs without the `pmtiles://` prefix fail with
    /// [`ArchiveError::UnsupportedUrl`].
    pub fn request(&self, resource: Resource) -> RequestHandle {
        let id = RequestId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (reply, receiver) = oneshot::channel();

        // If the worker is gone the reply sender is dropped with the command
        // and the handle resolves to `SessionClosed`
        let _ = self.commands.send(Command::Request { id, resource, reply });

        RequestHandle::new(id, receiver, self.commands.clone())
    }

    /// Request tile `(z, x, y)` of the archive at `url`.
    pub fn request_tile(&self, url: &str, z: u8, x: u32, y: u32) -> RequestHandle {
        self.request(Resource::tile(url, z, x, y))
    }

    /// Request the TileJSON document of the archive at `url`.
    pub fn request_metadata(&self, url: &str) -> RequestHandle {
        self.request(Resource::metadata(url))
    }

    /// Replace the options the default loader is built from.
    ///
    /// Requests dispatched afterwards use a loader built from the new
    /// options; requests already running keep theirs.
    pub fn set_loader_options(&self, loader_options: LoaderOptions) {
        let mut shared = self.options.lock();
        shared.loader = loader_options;
        shared.generation += 1;
    }

    pub fn loader_options(&self) -> LoaderOptions {
        self.options.lock().loader.clone()
    }

    /// Diagnostics for the session of `url`, if one has been opened.
    ///
    /// Accepts the archive address with or without the `pmtiles://` prefix.
    pub async fn stats(&self, url: &str) -> Option<SessionStats> {
        let url = archive_url(url).unwrap_or(url).to_string();
        let (reply, receiver) = oneshot::channel();
        self.commands.send(Command::Stats { url, reply }).ok()?;
        receiver.await.ok().flatten()
    }
}

impl Drop for ArchiveFileSource {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("archive file source worker panicked");
            }
        }
    }
}
