//! Outstanding sub-fetches per request.
//!
//! Every fetch a request issues runs as its own local task. The session
//! records the task's abort handle under the request id; at most one fetch is
//! recorded per request, since a request only waits on one fetch at a time.

use std::collections::HashMap;
use std::fmt;

use tokio::task::AbortHandle;

/// Identifier of one client request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub(crate) u64);

impl RequestId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Aborts the wrapped task when dropped.
#[derive(Debug)]
pub struct AbortOnDrop(AbortHandle);

impl AbortOnDrop {
    pub fn new(handle: AbortHandle) -> Self {
        Self(handle)
    }

    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Registry of the fetch each request is currently waiting on.
#[derive(Debug, Default)]
pub struct PendingTasks {
    tasks: HashMap<RequestId, AbortOnDrop>,
}

impl PendingTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the fetch `id` now waits on.
    ///
    /// A previously recorded fetch for the same request is aborted. Returns
    /// true when that previous fetch was still running.
    pub fn register(&mut self, id: RequestId, handle: AbortHandle) -> bool {
        match self.tasks.insert(id, AbortOnDrop::new(handle)) {
            Some(previous) => !previous.is_finished(),
            None => false,
        }
    }

    /// Drop the record for `id`, aborting its fetch if still running.
    ///
    /// Returns false when nothing was recorded for `id`.
    pub fn remove(&mut self, id: RequestId) -> bool {
        self.tasks.remove(&id).is_some()
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.tasks.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
