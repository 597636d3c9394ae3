use bytes::Bytes;

use crate::format::TileCoord;

/// URL prefix marking a resource as served out of an archive.
pub const PMTILES_SCHEME: &str = "pmtiles://";

/// URL prefix for local archives.
pub const FILE_SCHEME: &str = "file://";

/// Whether `url` addresses an archive-backed resource.
pub fn can_handle(url: &str) -> bool {
    url.starts_with(PMTILES_SCHEME)
}

/// The archive address behind an archive-backed URL.
///
/// `pmtiles://https://host/world.pmtiles` yields `https://host/world.pmtiles`.
pub fn archive_url(url: &str) -> Option<&str> {
    url.strip_prefix(PMTILES_SCHEME).filter(|rest| !rest.is_empty())
}

/// What a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Tile,
    Metadata,
}

/// A request for a tile or for the TileJSON document of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub kind: ResourceKind,
    /// `pmtiles://` followed by the archive address
    pub url: String,
    /// Required for [`ResourceKind::Tile`]
    pub tile: Option<TileCoord>,
}

impl Resource {
    pub fn tile(url: impl Into<String>, z: u8, x: u32, y: u32) -> Self {
        Self {
            kind: ResourceKind::Tile,
            url: url.into(),
            tile: Some(TileCoord::new(z, x, y)),
        }
    }

    pub fn metadata(url: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::Metadata,
            url: url.into(),
            tile: None,
        }
    }
}

/// Result of a successful request.
///
/// `data == None` means "no content": the archive has no such tile. This is
/// a normal outcome, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub data: Option<Bytes>,
    pub modified: Option<String>,
    pub expires: Option<String>,
    pub etag: Option<String>,
    pub content_type: Option<&'static str>,
}

impl Response {
    pub fn no_content() -> Self {
        Self::default()
    }

    pub fn is_no_content(&self) -> bool {
        self.data.is_none()
    }
}
