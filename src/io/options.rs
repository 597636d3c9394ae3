use std::time::Duration;

/// Default `User-Agent` sent by the HTTP loader.
pub const DEFAULT_USER_AGENT: &str = concat!("pmtiles-streamer/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout for the HTTP loader (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Options the default loader is built from.
///
/// These are the only settings touched from outside the session thread; see
/// [`ArchiveFileSource::set_loader_options`](crate::ArchiveFileSource::set_loader_options).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOptions {
    /// `User-Agent` header for HTTP range requests
    pub user_agent: String,

    /// Timeout for a single HTTP range request
    pub timeout: Duration,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl LoaderOptions {
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
