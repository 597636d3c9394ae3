use async_trait::async_trait;

use super::file_loader::FileLoader;
use super::http_loader::HttpLoader;
use super::options::LoaderOptions;
use super::range_reader::{ByteRange, FetchResponse, RangeLoader};
use crate::error::IoError;

/// Loader that picks a backend from the archive URL's scheme.
///
/// `http://` and `https://` go to [`HttpLoader`]; `file://` URLs and bare
/// paths go to [`FileLoader`]. Any other scheme is rejected.
pub struct DefaultLoader {
    http: HttpLoader,
    file: FileLoader,
}

impl DefaultLoader {
    pub fn new(options: &LoaderOptions) -> Result<Self, IoError> {
        Ok(Self {
            http: HttpLoader::new(options)?,
            file: FileLoader::new(),
        })
    }
}

/// Whether `url` names a local file rather than a remote resource.
fn is_local(url: &str) -> bool {
    match url.split_once("://") {
        Some((scheme, _)) => scheme.eq_ignore_ascii_case("file"),
        None => true,
    }
}

#[async_trait]
impl RangeLoader for DefaultLoader {
    async fn fetch(&self, url: &str, range: Option<ByteRange>) -> Result<FetchResponse, IoError> {
        let lower = url.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            self.http.fetch(url, range).await
        } else if is_local(url) {
            self.file.fetch(url, range).await
        } else {
            Err(IoError::UnsupportedUrl(url.to_string()))
        }
    }
}
