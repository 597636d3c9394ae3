use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::range_reader::{ByteRange, FetchResponse, RangeLoader};
use crate::error::IoError;
use crate::source::FILE_SCHEME;

/// Local file implementation of [`RangeLoader`].
///
/// Accepts `file://` URLs and bare paths. Every fetch opens the file, seeks to
/// the range start and reads until the range or the file ends.
#[derive(Debug, Clone, Default)]
pub struct FileLoader;

impl FileLoader {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a `file://` URL or plain path to a file system path.
    pub fn path_for(url: &str) -> Result<PathBuf, IoError> {
        if url.starts_with(FILE_SCHEME) {
            // Prefer proper URL decoding (percent escapes, hosts), fall back to the raw suffix
            if let Ok(path) = url::Url::parse(url).map_err(|_| ()).and_then(|u| u.to_file_path()) {
                return Ok(path);
            }
            return Ok(PathBuf::from(&url[FILE_SCHEME.len()..]));
        }
        Ok(PathBuf::from(url))
    }
}

/// Format a timestamp the way HTTP servers send `Last-Modified`.
pub(crate) fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

#[async_trait]
impl RangeLoader for FileLoader {
    async fn fetch(&self, url: &str, range: Option<ByteRange>) -> Result<FetchResponse, IoError> {
        let path = Self::path_for(url)?;

        let mut file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IoError::not_found(url));
            }
            Err(e) => return Err(e.into()),
        };

        let metadata = file.metadata().await?;
        let size = metadata.len();
        let modified = metadata.modified().ok().map(http_date);

        let range = range.unwrap_or(ByteRange::new(0, size));
        if range.offset > size || (range.offset == size && !range.is_empty()) {
            return Err(IoError::RangeOutOfBounds {
                offset: range.offset,
                requested: range.length,
                size,
            });
        }

        let len = (range.end().min(size) - range.offset) as usize;
        let mut buf = BytesMut::zeroed(len);
        if len > 0 {
            file.seek(SeekFrom::Start(range.offset)).await?;
            file.read_exact(&mut buf).await?;
        }

        Ok(FetchResponse {
            data: buf.freeze(),
            modified,
            expires: None,
            etag: None,
        })
    }
}
