use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

/// A contiguous byte range inside a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

impl ByteRange {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// One past the last byte of the range.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Value for an HTTP `Range` header: "bytes=start-end" (inclusive on both ends).
    ///
    /// Returns `None` for an empty range, which has no inclusive form.
    pub fn http_header(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(format!("bytes={}-{}", self.offset, self.end() - 1))
    }
}

/// Bytes delivered by a loader, with the cache metadata of the underlying
/// resource.
///
/// `modified` and `expires` carry the loader's own textual representation
/// (an HTTP-date for HTTP loaders).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
    pub data: Bytes,
    pub modified: Option<String>,
    pub expires: Option<String>,
    pub etag: Option<String>,
}

impl FetchResponse {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }
}

/// Trait for fetching byte ranges of archives addressed by URL.
///
/// The archive session never reads an archive any other way. Implementations
/// own their timeout and retry policy; dropping the returned future must
/// abandon the fetch.
///
/// A range reaching past the end of the resource is truncated to the bytes
/// that exist, the way an HTTP server answers such a request.
#[async_trait]
pub trait RangeLoader: Send + Sync {
    /// Fetch `range` of the resource at `url`, or the whole resource for `None`.
    async fn fetch(&self, url: &str, range: Option<ByteRange>) -> Result<FetchResponse, IoError>;
}

// =============================================================================
// Little-Endian Helper Functions
// =============================================================================
//
// Every fixed-width field of the archive header is little-endian.

/// Read a little-endian i32 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 4 bytes.
#[inline]
pub fn read_i32_le(bytes: &[u8]) -> i32 {
    i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Read a little-endian u64 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 8 bytes.
#[inline]
pub fn read_u64_le(bytes: &[u8]) -> u64 {
    u64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

/// Slice `range` out of `data`, truncating at the end of the buffer.
///
/// Used by loaders that hold a larger buffer than was asked for.
pub(crate) fn slice_range(data: &Bytes, range: ByteRange) -> Result<Bytes, IoError> {
    let size = data.len() as u64;
    if range.offset > size || (range.offset == size && !range.is_empty()) {
        return Err(IoError::RangeOutOfBounds {
            offset: range.offset,
            requested: range.length,
            size,
        });
    }
    let end = range.end().min(size);
    Ok(data.slice(range.offset as usize..end as usize))
}
