use std::fmt;

use thiserror::Error;

/// I/O errors reported by a byte-range loader
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Remote server answered with a non-success status
    #[error("HTTP status {status} for {url}")]
    Http { status: u16, url: String },

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Archive could not be found
    #[error("{0}")]
    NotFound(String),

    /// Requested range starts past the end of the resource
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Local file system error
    #[error("I/O error: {0}")]
    Io(String),

    /// The fetch was dropped before it completed
    #[error("request cancelled")]
    Cancelled,

    /// No loader understands this URL
    #[error("unsupported URL: {0}")]
    UnsupportedUrl(String),
}

impl IoError {
    /// Build a not-found error naming what was missing.
    ///
    /// Local paths are reported as paths, everything else as URLs.
    pub fn not_found(url: &str) -> Self {
        match url.strip_prefix(crate::source::FILE_SCHEME) {
            Some(path) => IoError::NotFound(format!("path not found: {}", path)),
            None => IoError::NotFound(format!("url not found: {}", url)),
        }
    }
}

impl From<std::io::Error> for IoError {
    fn from(err: std::io::Error) -> Self {
        IoError::Io(err.to_string())
    }
}

/// Errors in the fixed archive wire format
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// Fewer bytes than a header needs
    #[error("header too short: need {required} bytes, got {actual}")]
    HeaderTooShort { required: usize, actual: usize },

    /// The magic bytes are not `PMTiles`
    #[error("invalid magic bytes: not a PMTiles archive")]
    InvalidMagic,

    /// Only version 3 archives are understood
    #[error("unsupported spec version: {0}")]
    UnsupportedVersion(u8),

    /// Compression byte outside the known range
    #[error("unknown compression type: {0}")]
    UnknownCompression(u8),

    /// Compression is known but cannot be decoded here
    #[error("compression method not supported: {0}")]
    UnsupportedCompression(&'static str),

    /// Zoom level too deep for a 64-bit tile id
    #[error("tile zoom {0} exceeds 64-bit limit")]
    ZoomTooLarge(u8),

    /// x or y outside the grid of the zoom level
    #[error("tile x/y outside zoom level bounds: z={z} x={x} y={y}")]
    TileOutOfBounds { z: u8, x: u32, y: u32 },

    /// Tile id outside the range addressable by zoom levels 0..=31
    #[error("tile id {0} exceeds 64-bit zoom limit")]
    TileIdOutOfRange(u64),
}

/// Errors turning fetched bytes into directories, metadata or tile payloads
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// gzip stream could not be inflated
    #[error("decompression failed: {0}")]
    Decompress(String),

    /// A varint ran past the end of the buffer or past 64 bits
    #[error("malformed varint at byte {0}")]
    Varint(usize),

    /// Directory ended early or declared impossible values
    #[error("malformed directory: {0}")]
    Directory(String),
}

/// Pipeline stage used to prefix errors so failures are traceable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    HeaderAndRootDirectory,
    Directory,
    Metadata,
    Tile,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::HeaderAndRootDirectory => "header and root directory",
            Stage::Directory => "directory",
            Stage::Metadata => "metadata",
            Stage::Tile => "tile",
        })
    }
}

/// Errors delivered to the caller of a tile or metadata request.
///
/// "Not found" is never an error; it is a response without content.
#[derive(Debug, Clone, Error)]
pub enum ArchiveError {
    /// The loader failed while fetching bytes for a stage
    #[error("fetching {stage} failed: {source}")]
    Fetch { stage: Stage, source: IoError },

    /// The fetched bytes violate the wire format
    #[error("parsing {stage} failed: {source}")]
    Format { stage: Stage, source: FormatError },

    /// Decompression or directory decoding failed
    #[error("decoding {stage} failed: {source}")]
    Decode { stage: Stage, source: DecodeError },

    /// (z, x, y) cannot be linearized
    #[error("invalid tile: {0}")]
    InvalidTile(FormatError),

    /// Directory nesting went past the allowed depth
    #[error("resolving tile address failed: maximum directory depth exceeded ({depth})")]
    DepthExceeded { depth: u32 },

    /// Request URL does not use the archive scheme
    #[error("unsupported URL: {0}")]
    UnsupportedUrl(String),

    /// Resource is missing the information its kind requires
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The file source shut down before answering
    #[error("archive file source closed")]
    SessionClosed,
}

impl ArchiveError {
    pub(crate) fn fetch(stage: Stage) -> impl FnOnce(IoError) -> Self {
        move |source| ArchiveError::Fetch { stage, source }
    }

    pub(crate) fn format(stage: Stage) -> impl FnOnce(FormatError) -> Self {
        move |source| ArchiveError::Format { stage, source }
    }

    pub(crate) fn decode(stage: Stage) -> impl FnOnce(DecodeError) -> Self {
        move |source| ArchiveError::Decode { stage, source }
    }

    /// The stage that produced the error, if it belongs to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ArchiveError::Fetch { stage, .. }
            | ArchiveError::Format { stage, .. }
            | ArchiveError::Decode { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether the underlying loader reported the archive as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ArchiveError::Fetch {
                source: IoError::NotFound(_),
                ..
            }
        )
    }
}
