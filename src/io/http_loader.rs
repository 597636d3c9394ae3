use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, CONTENT_RANGE, ETAG, EXPIRES, LAST_MODIFIED, RANGE};
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::options::LoaderOptions;
use super::range_reader::{slice_range, ByteRange, FetchResponse, RangeLoader};
use crate::error::IoError;

/// HTTP(S) implementation of [`RangeLoader`].
///
/// Issues one `GET` with a `Range` header per fetch. A `206 Partial Content`
/// body is returned as-is; servers that ignore the header and answer `200`
/// with the full object have the requested range sliced out of the body.
#[derive(Clone)]
pub struct HttpLoader {
    client: Client,
}

impl HttpLoader {
    /// Create a loader with a client configured from `options`.
    pub fn new(options: &LoaderOptions) -> Result<Self, IoError> {
        let client = Client::builder()
            .user_agent(options.user_agent.as_str())
            .timeout(options.timeout)
            .build()
            .map_err(|e| IoError::Connection(e.to_string()))?;
        Ok(Self { client })
    }

    /// Create a loader around an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RangeLoader for HttpLoader {
    async fn fetch(&self, url: &str, range: Option<ByteRange>) -> Result<FetchResponse, IoError> {
        // Zero-length reads never touch the network
        if range.is_some_and(|r| r.is_empty()) {
            return Ok(FetchResponse::default());
        }

        let mut request = self.client.get(url);
        if let Some(header) = range.and_then(|r| r.http_header()) {
            request = request.header(RANGE, header);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?;

        let status = resp.status();
        match status {
            StatusCode::NOT_FOUND => return Err(IoError::not_found(url)),
            StatusCode::RANGE_NOT_SATISFIABLE => {
                let range = range.unwrap_or(ByteRange::new(0, 0));
                return Err(IoError::RangeOutOfBounds {
                    offset: range.offset,
                    requested: range.length,
                    size: content_range_total(resp.headers()).unwrap_or(0),
                });
            }
            s if !s.is_success() => {
                return Err(IoError::Http {
                    status: s.as_u16(),
                    url: url.to_string(),
                })
            }
            _ => {}
        }

        let modified = header_string(resp.headers(), LAST_MODIFIED);
        let expires = header_string(resp.headers(), EXPIRES);
        let etag = header_string(resp.headers(), ETAG);

        let body = resp
            .bytes()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?;

        let data = match range {
            Some(range) if status == StatusCode::OK => {
                debug!(url, offset = range.offset, "server ignored range header");
                slice_range(&body, range)?
            }
            _ => body,
        };

        Ok(FetchResponse {
            data,
            modified,
            expires,
            etag,
        })
    }
}

fn header_string(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Total object size from a `Content-Range: bytes */1234` style header.
fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    header_string(headers, CONTENT_RANGE)?
        .rsplit('/')
        .next()
        .and_then(|total| total.trim().parse().ok())
}
